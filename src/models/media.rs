use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UploadUrlRequest {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,

    #[validate(length(min = 3, max = 100))]
    pub content_type: String,
}

/// 预签名上传地址：客户端直接向该URL PUT文件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresignedUpload {
    pub url: String,
    pub file_key: String,
}
