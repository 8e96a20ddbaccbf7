//! 领域模型错误定义

use thiserror::Error;

/// 领域业务错误。
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DomainError {
    /// 不能和自己创建会话
    #[error("cannot create chat with yourself")]
    SelfChat,

    /// 两个用户之间的会话已存在（查找对用户顺序对称）
    #[error("chat already exists between these users")]
    ChatAlreadyExists,

    /// 对方用户不存在
    #[error("peer user not found")]
    PeerNotFound,

    /// 用户不是会话参与者
    #[error("user is not a participant of this chat")]
    NotParticipant,
}

/// 持久化层错误。
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("requested record not found")]
    NotFound,

    /// 唯一性约束冲突
    #[error("record already exists")]
    Conflict,

    #[error("storage error: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
