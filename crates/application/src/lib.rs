//! 应用层：聊天目录服务与持久化网关契约。

pub mod clock;
pub mod error;
pub mod repository;
pub mod services;

pub use clock::{Clock, SystemClock};
pub use error::ApplicationError;
pub use repository::{ChatRepository, MessageRepository, ParticipantRepository, UserDirectory};
pub use services::{ChatService, ChatServiceDependencies};
