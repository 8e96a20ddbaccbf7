use std::sync::Arc;

use application::ChatService;

use crate::{hub::ChatHub, JwtService};

#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub hub: Arc<ChatHub>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    pub fn new(
        chat_service: Arc<ChatService>,
        hub: Arc<ChatHub>,
        jwt_service: Arc<JwtService>,
    ) -> Self {
        Self {
            chat_service,
            hub,
            jwt_service,
        }
    }
}
