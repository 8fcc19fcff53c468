/// 邮箱统一小写并去掉首尾空白后再入库和查询
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
