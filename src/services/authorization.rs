//! 无状态的授权判定。只做决策，不做任何修改；
//! 变更一律由仓储在判定通过后执行。

/// 编辑只允许作者本人。管理员标志不放行编辑——管理员可以删除
/// 有害内容，但不能以作者身份改写内容，这是刻意保留的不对称。
pub fn can_edit(actor_id: &str, owner_id: &str) -> bool {
    actor_id == owner_id
}

/// 删除允许作者本人或管理员
pub fn can_delete(actor_id: &str, owner_id: &str, admin: bool) -> bool {
    admin || actor_id == owner_id
}

/// 举报处理（清零/强制删除）只看版主或管理员能力，与所有权无关
pub fn can_moderate(moderator: bool) -> bool {
    moderator
}
