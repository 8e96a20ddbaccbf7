//! 集成测试支撑：内存持久化网关 + 绑定真实端口的测试服务。

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use domain::{
    Chat, ChatId, ChatParticipant, Message, MessageId, NewMessage, Pagination, RepositoryError,
    Timestamp, UserId,
};

use application::{
    ChatRepository, ChatService, ChatServiceDependencies, MessageRepository,
    ParticipantRepository, SystemClock, UserDirectory,
};
use config::JwtConfig;
use web_api::{router, AppState, ChatHub, JwtService};

/// 内存持久化网关，对称重复检查与 Postgres 实现一致。
#[derive(Default)]
pub struct InMemoryStore {
    users: Mutex<Vec<i64>>,
    chats: Mutex<Vec<Chat>>,
    participants: Mutex<Vec<ChatParticipant>>,
    messages: Mutex<Vec<Message>>,
    next_chat_id: AtomicI64,
    next_message_id: AtomicI64,
}

impl InMemoryStore {
    pub fn with_users(users: &[i64]) -> Arc<Self> {
        let store = Self {
            next_chat_id: AtomicI64::new(1),
            next_message_id: AtomicI64::new(1),
            ..Self::default()
        };
        *store.users.lock().unwrap() = users.to_vec();
        Arc::new(store)
    }
}

#[async_trait]
impl ChatRepository for InMemoryStore {
    async fn create_two_party(
        &self,
        initiator: UserId,
        peer: UserId,
        now: Timestamp,
    ) -> Result<Chat, RepositoryError> {
        let mut chats = self.chats.lock().unwrap();
        let mut participants = self.participants.lock().unwrap();

        for chat in chats.iter() {
            let members: Vec<UserId> = participants
                .iter()
                .filter(|p| p.chat_id == chat.id)
                .map(|p| p.user_id)
                .collect();
            if members.contains(&initiator) && members.contains(&peer) {
                return Err(RepositoryError::Conflict);
            }
        }

        let chat = Chat {
            id: ChatId(self.next_chat_id.fetch_add(1, Ordering::SeqCst)),
            created_at: now,
        };
        chats.push(chat.clone());
        for user_id in [initiator, peer] {
            participants.push(ChatParticipant {
                chat_id: chat.id,
                user_id,
                joined_at: now,
            });
        }

        Ok(chat)
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
        page: Pagination,
    ) -> Result<Vec<Chat>, RepositoryError> {
        let chats = self.chats.lock().unwrap();
        let participants = self.participants.lock().unwrap();
        Ok(chats
            .iter()
            .filter(|chat| {
                participants
                    .iter()
                    .any(|p| p.chat_id == chat.id && p.user_id == user_id)
            })
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ParticipantRepository for InMemoryStore {
    async fn find(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<Option<ChatParticipant>, RepositoryError> {
        Ok(self
            .participants
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.chat_id == chat_id && p.user_id == user_id)
            .cloned())
    }

    async fn list_by_chat(
        &self,
        chat_id: ChatId,
        page: Pagination,
    ) -> Result<Vec<ChatParticipant>, RepositoryError> {
        Ok(self
            .participants
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.chat_id == chat_id)
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn create(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let stored = Message {
            id: MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst)),
            chat_id: message.chat_id,
            sender_id: message.sender_id,
            content: message.content,
            created_at: message.created_at,
            is_read: false,
        };
        self.messages.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn list_by_chat(
        &self,
        chat_id: ChatId,
        page: Pagination,
    ) -> Result<Vec<Message>, RepositoryError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn exists(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        Ok(self.users.lock().unwrap().contains(&user_id.0))
    }
}

pub struct TestApp {
    pub addr: SocketAddr,
    jwt_service: Arc<JwtService>,
}

impl TestApp {
    pub fn token_for(&self, user_id: i64) -> String {
        self.jwt_service
            .generate_token(UserId(user_id))
            .expect("token generation should succeed")
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, chat_id: i64, token: &str) -> String {
        format!(
            "ws://{}/api/v1/chats/{}/ws?token={}",
            self.addr, chat_id, token
        )
    }
}

/// 在随机端口上启动完整服务，持久化网关为内存实现。
pub async fn spawn_app(users: &[i64]) -> TestApp {
    let store = InMemoryStore::with_users(users);
    let chat_service = ChatService::new(ChatServiceDependencies {
        chat_repository: store.clone(),
        participant_repository: store.clone(),
        message_repository: store.clone(),
        user_directory: store,
        clock: Arc::new(SystemClock),
    });

    let jwt_service = Arc::new(JwtService::new(JwtConfig {
        secret: "integration-test-secret".to_string(),
        expiration_hours: 1,
    }));

    let state = AppState::new(
        Arc::new(chat_service),
        Arc::new(ChatHub::new()),
        jwt_service.clone(),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("read local addr");

    tokio::spawn(async move {
        axum::serve(listener, router(state))
            .await
            .expect("test server failed");
    });

    TestApp { addr, jwt_service }
}
