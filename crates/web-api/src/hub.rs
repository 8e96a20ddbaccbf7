//! 连接注册表（Hub）
//!
//! 按房间跟踪当前存活的 WebSocket 会话并做扇出。注册表是核心中唯一的共享可变状态，
//! 全部访问都经过这里的读写锁：广播走共享锁，注册/注销走排他锁。

use std::collections::HashMap;

use domain::{ChatId, UserId};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::dto::MessageResponse;

pub type SessionId = Uuid;

/// 一个存活会话在注册表中的句柄。
///
/// 身份以 `SessionId` 为键，同一会话重复注册不会产生重复投递；
/// `sender` 指向会话自己的发送任务，Hub 从不直接触碰对方的流。
#[derive(Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub user_id: UserId,
    pub chat_id: ChatId,
    sender: mpsc::UnboundedSender<String>,
}

impl SessionHandle {
    pub fn new(user_id: UserId, chat_id: ChatId) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                id: Uuid::new_v4(),
                user_id,
                chat_id,
                sender,
            },
            receiver,
        )
    }

    fn deliver(&self, frame: String) -> bool {
        self.sender.send(frame).is_ok()
    }
}

#[derive(Default)]
pub struct ChatHub {
    rooms: RwLock<HashMap<ChatId, HashMap<SessionId, SessionHandle>>>,
}

impl ChatHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 将会话加入其房间的集合，房间不存在时创建。
    pub async fn register(&self, handle: SessionHandle) {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(handle.chat_id)
            .or_default()
            .insert(handle.id, handle);
    }

    /// 将会话从其房间移除；集合变空时删除房间条目，注册表不保留空集。
    ///
    /// 幂等：对未注册的会话调用是空操作。
    pub async fn unregister(&self, handle: &SessionHandle) {
        let mut rooms = self.rooms.write().await;
        if let Some(sessions) = rooms.get_mut(&handle.chat_id) {
            sessions.remove(&handle.id);
            if sessions.is_empty() {
                rooms.remove(&handle.chat_id);
            }
        }
    }

    /// 把消息扇出给房间内全部会话。
    ///
    /// 只序列化一次；没有监听者时是空操作。单个会话投递失败（接收端已关闭）
    /// 只记录日志，不中断对其余会话的投递，也不在这里注销该会话——
    /// 注销由会话自己的读循环在退出时完成。
    pub async fn broadcast(&self, chat_id: ChatId, message: &MessageResponse) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(error = %err, chat_id = %chat_id, "failed to serialize broadcast message");
                return;
            }
        };

        let rooms = self.rooms.read().await;
        let Some(sessions) = rooms.get(&chat_id) else {
            return;
        };

        for handle in sessions.values() {
            if !handle.deliver(payload.clone()) {
                tracing::warn!(
                    user_id = %handle.user_id,
                    chat_id = %chat_id,
                    "failed to deliver broadcast to session"
                );
            }
        }
    }

    /// 当前房间内存活会话数。
    pub async fn room_sessions(&self, chat_id: ChatId) -> usize {
        self.rooms
            .read()
            .await
            .get(&chat_id)
            .map(|sessions| sessions.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use domain::MessageId;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;

    fn message(chat_id: ChatId, content: &str) -> MessageResponse {
        MessageResponse {
            id: MessageId(1),
            chat_id,
            sender_id: UserId(1),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    fn recv_content(rx: &mut UnboundedReceiver<String>) -> String {
        let frame = rx.try_recv().expect("expected a delivered frame");
        serde_json::from_str::<MessageResponse>(&frame)
            .expect("frame should be a message response")
            .content
    }

    #[tokio::test]
    async fn broadcast_reaches_every_room_session_exactly_once() {
        let hub = ChatHub::new();
        let room = ChatId(7);
        let (s1, mut rx1) = SessionHandle::new(UserId(1), room);
        let (s2, mut rx2) = SessionHandle::new(UserId(2), room);

        hub.register(s1).await;
        hub.register(s2).await;
        hub.broadcast(room, &message(room, "hi")).await;

        assert_eq!(recv_content(&mut rx1), "hi");
        assert_eq!(recv_content(&mut rx2), "hi");
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn repeated_registration_does_not_duplicate_delivery() {
        let hub = ChatHub::new();
        let room = ChatId(7);
        let (s1, mut rx1) = SessionHandle::new(UserId(1), room);

        hub.register(s1.clone()).await;
        hub.register(s1).await;
        hub.broadcast(room, &message(room, "once")).await;

        assert_eq!(recv_content(&mut rx1), "once");
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_to_empty_room_is_a_noop() {
        let hub = ChatHub::new();
        hub.broadcast(ChatId(9), &message(ChatId(9), "void")).await;
        assert_eq!(hub.room_sessions(ChatId(9)).await, 0);
    }

    #[tokio::test]
    async fn unregister_is_idempotent_and_isolated() {
        let hub = ChatHub::new();
        let (s1, _rx1) = SessionHandle::new(UserId(1), ChatId(7));
        let (s2, mut rx2) = SessionHandle::new(UserId(2), ChatId(8));
        let (never_registered, _rx3) = SessionHandle::new(UserId(3), ChatId(7));

        hub.register(s1.clone()).await;
        hub.register(s2).await;

        hub.unregister(&s1).await;
        hub.unregister(&s1).await;
        hub.unregister(&never_registered).await;

        // 其它房间不受影响
        assert_eq!(hub.room_sessions(ChatId(8)).await, 1);
        hub.broadcast(ChatId(8), &message(ChatId(8), "still here")).await;
        assert_eq!(recv_content(&mut rx2), "still here");
    }

    #[tokio::test]
    async fn empty_rooms_leave_no_residual_entries() {
        let hub = ChatHub::new();

        for cycle in 0..100 {
            let room = ChatId(cycle % 5);
            let (handle, _rx) = SessionHandle::new(UserId(1), room);
            hub.register(handle.clone()).await;
            hub.unregister(&handle).await;
        }

        assert!(hub.rooms.read().await.is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_does_not_affect_siblings() {
        let hub = ChatHub::new();
        let room = ChatId(7);
        let (dead, rx_dead) = SessionHandle::new(UserId(1), room);
        let (alive, mut rx_alive) = SessionHandle::new(UserId(2), room);

        hub.register(dead.clone()).await;
        hub.register(alive).await;
        drop(rx_dead); // 接收端关闭，模拟写失败

        hub.broadcast(room, &message(room, "hi")).await;

        assert_eq!(recv_content(&mut rx_alive), "hi");
        // 失败的会话仍由其自己的读循环负责注销
        assert_eq!(hub.room_sessions(room).await, 2);
    }

    #[tokio::test]
    async fn sessions_never_receive_other_rooms_broadcasts() {
        let hub = ChatHub::new();
        let (s7, mut rx7) = SessionHandle::new(UserId(1), ChatId(7));
        let (s8, mut rx8) = SessionHandle::new(UserId(2), ChatId(8));

        hub.register(s7).await;
        hub.register(s8).await;

        hub.broadcast(ChatId(7), &message(ChatId(7), "room7")).await;
        hub.broadcast(ChatId(8), &message(ChatId(8), "room8")).await;

        assert_eq!(recv_content(&mut rx7), "room7");
        assert!(rx7.try_recv().is_err());
        assert_eq!(recv_content(&mut rx8), "room8");
        assert!(rx8.try_recv().is_err());
    }

    #[tokio::test]
    async fn concurrent_churn_keeps_live_sessions_reachable() {
        let hub = Arc::new(ChatHub::new());
        let mut tasks = Vec::new();

        // 多房间并发注册/广播/注销
        for room in 0..4i64 {
            for user in 0..8i64 {
                let hub = hub.clone();
                tasks.push(tokio::spawn(async move {
                    let room = ChatId(room);
                    let (handle, mut rx) = SessionHandle::new(UserId(user), room);
                    hub.register(handle.clone()).await;
                    hub.broadcast(room, &message(room, "churn")).await;
                    // 自己注册后自己广播，至少能收到自己那一次
                    assert!(rx.recv().await.is_some());
                    hub.unregister(&handle).await;
                }));
            }
        }

        for task in tasks {
            task.await.expect("hub task should not panic");
        }

        // 全部注销后注册表无残留，新会话依然可达
        assert!(hub.rooms.read().await.is_empty());
        let (probe, mut rx) = SessionHandle::new(UserId(99), ChatId(2));
        hub.register(probe.clone()).await;
        hub.broadcast(ChatId(2), &message(ChatId(2), "probe")).await;
        assert_eq!(recv_content(&mut rx), "probe");
    }
}
