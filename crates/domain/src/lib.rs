//! 聊天系统核心领域模型
//!
//! 包含会话、参与者、消息等核心实体，以及分页和错误类型。

pub mod chat;
pub mod errors;
pub mod message;
pub mod value_objects;

// 重新导出常用类型
pub use chat::*;
pub use errors::*;
pub use message::*;
pub use value_objects::*;
