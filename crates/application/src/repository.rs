//! 持久化网关契约。
//!
//! 聊天目录只依赖这些 trait；具体实现（Postgres）在 infrastructure crate。

use async_trait::async_trait;
use domain::{
    Chat, ChatId, ChatParticipant, Message, NewMessage, Pagination, RepositoryError, Timestamp,
    UserId,
};

#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// 原子创建两人会话。
    ///
    /// 实现必须在同一事务内完成对称的重复检查与三条写入（会话 + 两条参与者），
    /// 已存在时返回 [`RepositoryError::Conflict`]。不允许出现参与者少于两人的会话。
    async fn create_two_party(
        &self,
        initiator: UserId,
        peer: UserId,
        now: Timestamp,
    ) -> Result<Chat, RepositoryError>;

    async fn list_by_user(
        &self,
        user_id: UserId,
        page: Pagination,
    ) -> Result<Vec<Chat>, RepositoryError>;
}

#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    async fn find(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<Option<ChatParticipant>, RepositoryError>;

    async fn list_by_chat(
        &self,
        chat_id: ChatId,
        page: Pagination,
    ) -> Result<Vec<ChatParticipant>, RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 持久化消息并返回带服务端分配 id 的完整记录。
    async fn create(&self, message: NewMessage) -> Result<Message, RepositoryError>;

    async fn list_by_chat(
        &self,
        chat_id: ChatId,
        page: Pagination,
    ) -> Result<Vec<Message>, RepositoryError>;
}

/// 用户目录只读视图，创建会话前用于确认对方存在。
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn exists(&self, user_id: UserId) -> Result<bool, RepositoryError>;
}
