//! HTTP / WebSocket 载荷定义。

use domain::{ChatId, Message, MessageId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// WebSocket 入站帧：`{"content": string}`。
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// WebSocket 出站帧，广播给房间内全部会话。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: Timestamp,
}

impl From<&Message> for MessageResponse {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            chat_id: message.chat_id,
            sender_id: message.sender_id,
            content: message.content.clone(),
            created_at: message.created_at,
        }
    }
}

/// REST 创建会话载荷：对方用户 id。
#[derive(Debug, Deserialize)]
pub struct CreateChatPayload {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
