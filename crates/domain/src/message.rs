use serde::{Deserialize, Serialize};

use crate::value_objects::{ChatId, MessageId, Timestamp, UserId};

/// 聊天消息。
///
/// 仅追加：由 Chat Directory 在每个被接受的入站帧上创建，核心层永不修改或删除。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: Timestamp,
    pub is_read: bool,
}

/// 待持久化的新消息，id 与时间戳由服务端分配。
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: Timestamp,
}
