//! 基础设施层：持久化网关的 Postgres 实现。

pub mod db;
pub mod repository;

pub use db::create_pg_pool;
pub use repository::{PgChatRepository, PgMessageRepository, PgParticipantRepository, PgUserDirectory};
