use std::sync::Arc;

use domain::{
    Chat, ChatId, ChatParticipant, DomainError, Message, NewMessage, Pagination, RepositoryError,
    UserId,
};

use crate::{
    clock::Clock,
    error::ApplicationError,
    repository::{ChatRepository, MessageRepository, ParticipantRepository, UserDirectory},
};

pub struct ChatServiceDependencies {
    pub chat_repository: Arc<dyn ChatRepository>,
    pub participant_repository: Arc<dyn ParticipantRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub user_directory: Arc<dyn UserDirectory>,
    pub clock: Arc<dyn Clock>,
}

/// 聊天目录：会话创建、授权检查与消息持久化的薄编排层。
pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    /// 创建两人会话。
    ///
    /// 重复检查与写入由仓库在同一事务内完成，两个并发的对称调用最多创建一个会话。
    pub async fn create_chat(
        &self,
        initiator: UserId,
        peer: UserId,
    ) -> Result<Chat, ApplicationError> {
        if initiator == peer {
            return Err(DomainError::SelfChat.into());
        }

        if !self.deps.user_directory.exists(peer).await? {
            return Err(DomainError::PeerNotFound.into());
        }

        let now = self.deps.clock.now();
        match self
            .deps
            .chat_repository
            .create_two_party(initiator, peer, now)
            .await
        {
            Ok(chat) => Ok(chat),
            Err(RepositoryError::Conflict) => Err(DomainError::ChatAlreadyExists.into()),
            Err(err) => Err(err.into()),
        }
    }

    /// 唯一的授权入口：实时升级与历史消息读取前都必须通过。
    pub async fn is_participant(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<(), ApplicationError> {
        self.deps
            .participant_repository
            .find(chat_id, user_id)
            .await?
            .ok_or(DomainError::NotParticipant)?;
        Ok(())
    }

    /// 持久化消息，时间戳由服务端分配。
    ///
    /// 不做参与者检查，调用方必须已经通过 [`Self::is_participant`] 授权。
    pub async fn create_message(
        &self,
        chat_id: ChatId,
        sender_id: UserId,
        content: String,
    ) -> Result<Message, ApplicationError> {
        let message = self
            .deps
            .message_repository
            .create(NewMessage {
                chat_id,
                sender_id,
                content,
                created_at: self.deps.clock.now(),
            })
            .await?;

        Ok(message)
    }

    pub async fn list_chats_by_user(
        &self,
        user_id: UserId,
        page: Pagination,
    ) -> Result<Vec<Chat>, ApplicationError> {
        Ok(self.deps.chat_repository.list_by_user(user_id, page).await?)
    }

    pub async fn list_participants(
        &self,
        chat_id: ChatId,
        page: Pagination,
    ) -> Result<Vec<ChatParticipant>, ApplicationError> {
        Ok(self
            .deps
            .participant_repository
            .list_by_chat(chat_id, page)
            .await?)
    }

    pub async fn list_messages(
        &self,
        chat_id: ChatId,
        page: Pagination,
    ) -> Result<Vec<Message>, ApplicationError> {
        Ok(self
            .deps
            .message_repository
            .list_by_chat(chat_id, page)
            .await?)
    }
}
