use serde::{Deserialize, Serialize};

use crate::value_objects::{ChatId, Timestamp, UserId};

/// 两人会话。
///
/// 创建后不可变：成员集合在创建时固定为两个参与者，核心层永不修改或删除。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub created_at: Timestamp,
}

/// 会话参与者，用于成员资格检查。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatParticipant {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub joined_at: Timestamp,
}
