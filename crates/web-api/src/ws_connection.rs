//! WebSocket 会话
//!
//! 每个被接受的连接一个任务，端到端拥有这条连接：
//! `Authorized → Registered → Reading ⇄ (Persist → Broadcast) → Closing → Closed`。
//! 只有通过参与者检查的连接才会走到这里；注销保证在所有退出路径上执行。

use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::{ChatId, UserId};
use futures_util::{SinkExt, StreamExt};

use crate::{
    dto::{MessageResponse, SendMessageRequest},
    hub::SessionHandle,
    state::AppState,
};

pub struct WsSession;

impl WsSession {
    /// 运行会话主循环直到连接关闭。
    pub async fn run(socket: WebSocket, state: AppState, user_id: UserId, chat_id: ChatId) {
        let (handle, mut outbound) = SessionHandle::new(user_id, chat_id);
        state.hub.register(handle.clone()).await;
        tracing::info!(user_id = %user_id, chat_id = %chat_id, "WebSocket 会话已注册");

        let (mut sender, mut incoming) = socket.split();

        // 发送任务：把 Hub 投递的帧写入自己的流，Hub 不直接接触 socket
        let send_task = tokio::spawn(async move {
            while let Some(frame) = outbound.recv().await {
                if sender.send(WsMessage::Text(frame.into())).await.is_err() {
                    break;
                }
            }
        });

        // 读循环：会话唯一的挂起点
        while let Some(result) = incoming.next().await {
            match result {
                Ok(WsMessage::Text(text)) => {
                    Self::handle_frame(&state, &handle, text.as_str()).await;
                }
                Ok(WsMessage::Close(_)) => {
                    tracing::debug!(user_id = %user_id, "peer closed websocket");
                    break;
                }
                // Ping/Pong 由协议层自动应答，二进制帧不支持
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, user_id = %user_id, "websocket read failed");
                    break;
                }
            }
        }

        // 所有退出路径都经过这里：注销并终止发送任务，不留半开连接
        state.hub.unregister(&handle).await;
        send_task.abort();
        tracing::info!(user_id = %user_id, chat_id = %chat_id, "WebSocket 会话已关闭");
    }

    /// 处理一个入站文本帧：解析、持久化、广播。
    ///
    /// 坏帧与持久化失败都只丢弃当前帧，会话继续存活。
    async fn handle_frame(state: &AppState, handle: &SessionHandle, text: &str) {
        let request: SendMessageRequest = match serde_json::from_str(text) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(error = %err, "invalid websocket message payload");
                return;
            }
        };

        // 空白内容静默丢弃：不持久化也不广播
        if request.content.trim().is_empty() {
            return;
        }

        let message = match state
            .chat_service
            .create_message(handle.chat_id, handle.user_id, request.content)
            .await
        {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(error = %err, chat_id = %handle.chat_id, "failed to create message");
                return;
            }
        };

        state
            .hub
            .broadcast(handle.chat_id, &MessageResponse::from(&message))
            .await;
    }
}
