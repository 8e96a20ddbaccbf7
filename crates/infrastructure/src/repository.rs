//! Postgres 持久化实现。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use application::repository::{
    ChatRepository, MessageRepository, ParticipantRepository, UserDirectory,
};
use domain::{
    Chat, ChatId, ChatParticipant, Message, MessageId, NewMessage, Pagination, RepositoryError,
    Timestamp, UserId,
};

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict;
        }
    }
    RepositoryError::storage(err.to_string())
}

#[derive(Debug, FromRow)]
struct ChatRecord {
    id: i64,
    created_at: DateTime<Utc>,
}

impl From<ChatRecord> for Chat {
    fn from(value: ChatRecord) -> Self {
        Chat {
            id: ChatId::from(value.id),
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ParticipantRecord {
    chat_id: i64,
    user_id: i64,
    joined_at: DateTime<Utc>,
}

impl From<ParticipantRecord> for ChatParticipant {
    fn from(value: ParticipantRecord) -> Self {
        ChatParticipant {
            chat_id: ChatId::from(value.chat_id),
            user_id: UserId::from(value.user_id),
            joined_at: value.joined_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: i64,
    chat_id: i64,
    sender_id: i64,
    content: String,
    created_at: DateTime<Utc>,
    is_read: bool,
}

impl From<MessageRecord> for Message {
    fn from(value: MessageRecord) -> Self {
        Message {
            id: MessageId::from(value.id),
            chat_id: ChatId::from(value.chat_id),
            sender_id: UserId::from(value.sender_id),
            content: value.content,
            created_at: value.created_at,
            is_read: value.is_read,
        }
    }
}

#[derive(Clone)]
pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn create_two_party(
        &self,
        initiator: UserId,
        peer: UserId,
        now: Timestamp,
    ) -> Result<Chat, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        // 事务级咨询锁串行化同一用户对的并发创建，检查与写入之间不会被插队
        sqlx::query(
            "SELECT pg_advisory_xact_lock(hashint8(least($1::bigint, $2::bigint)), hashint8(greatest($1::bigint, $2::bigint)))",
        )
        .bind(i64::from(initiator))
        .bind(i64::from(peer))
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        let existing = sqlx::query_as::<_, ChatRecord>(
            r#"
            SELECT c.id, c.created_at
            FROM chats c
            JOIN chat_participants p1 ON p1.chat_id = c.id AND p1.user_id = $1
            JOIN chat_participants p2 ON p2.chat_id = c.id AND p2.user_id = $2
            "#,
        )
        .bind(i64::from(initiator))
        .bind(i64::from(peer))
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        if existing.is_some() {
            return Err(RepositoryError::Conflict);
        }

        let record = sqlx::query_as::<_, ChatRecord>(
            "INSERT INTO chats (created_at) VALUES ($1) RETURNING id, created_at",
        )
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        sqlx::query(
            r#"
            INSERT INTO chat_participants (chat_id, user_id, joined_at)
            VALUES ($1, $2, $4), ($1, $3, $4)
            "#,
        )
        .bind(record.id)
        .bind(i64::from(initiator))
        .bind(i64::from(peer))
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;

        Ok(Chat::from(record))
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
        page: Pagination,
    ) -> Result<Vec<Chat>, RepositoryError> {
        let records = sqlx::query_as::<_, ChatRecord>(
            r#"
            SELECT c.id, c.created_at
            FROM chats c
            JOIN chat_participants p ON p.chat_id = c.id
            WHERE p.user_id = $1
            ORDER BY c.created_at DESC, c.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(i64::from(user_id))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(Chat::from).collect())
    }
}

#[derive(Clone)]
pub struct PgParticipantRepository {
    pool: PgPool,
}

impl PgParticipantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParticipantRepository for PgParticipantRepository {
    async fn find(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<Option<ChatParticipant>, RepositoryError> {
        let record = sqlx::query_as::<_, ParticipantRecord>(
            r#"
            SELECT chat_id, user_id, joined_at
            FROM chat_participants
            WHERE chat_id = $1 AND user_id = $2
            "#,
        )
        .bind(i64::from(chat_id))
        .bind(i64::from(user_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(ChatParticipant::from))
    }

    async fn list_by_chat(
        &self,
        chat_id: ChatId,
        page: Pagination,
    ) -> Result<Vec<ChatParticipant>, RepositoryError> {
        let records = sqlx::query_as::<_, ParticipantRecord>(
            r#"
            SELECT chat_id, user_id, joined_at
            FROM chat_participants
            WHERE chat_id = $1
            ORDER BY joined_at, user_id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(i64::from(chat_id))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(ChatParticipant::from).collect())
    }
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO messages (chat_id, sender_id, content, created_at, is_read)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING id, chat_id, sender_id, content, created_at, is_read
            "#,
        )
        .bind(i64::from(message.chat_id))
        .bind(i64::from(message.sender_id))
        .bind(&message.content)
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(Message::from(record))
    }

    async fn list_by_chat(
        &self,
        chat_id: ChatId,
        page: Pagination,
    ) -> Result<Vec<Message>, RepositoryError> {
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, chat_id, sender_id, content, created_at, is_read
            FROM messages
            WHERE chat_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(i64::from(chat_id))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(Message::from).collect())
    }
}

/// 用户表的只读视图，仅用于确认对方用户存在。
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn exists(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(i64::from(user_id))
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        Ok(exists.0)
    }
}
