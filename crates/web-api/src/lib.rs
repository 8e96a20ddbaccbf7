//! Web API 层：HTTP/WebSocket 网关、连接注册表与会话生命周期。

pub mod auth;
pub mod dto;
pub mod error;
pub mod hub;
pub mod routes;
pub mod state;
pub mod ws_connection;

pub use auth::JwtService;
pub use error::ApiError;
pub use hub::{ChatHub, SessionHandle};
pub use routes::router;
pub use state::AppState;
