use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use domain::{Chat, ChatId, ChatParticipant, Message, Pagination, UserId};

use crate::{
    dto::{CreateChatPayload, PageQuery},
    error::ApiError,
    state::AppState,
    ws_connection::WsSession,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/chats", post(create_chat).get(list_chats))
        .route("/chats/{chat_id}/participants", get(list_participants))
        .route("/chats/{chat_id}/messages", get(list_messages))
        .route("/chats/{chat_id}/ws", get(websocket_upgrade))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn create_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateChatPayload>,
) -> Result<(StatusCode, Json<Chat>), ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;

    let chat = state
        .chat_service
        .create_chat(user_id, UserId::from(payload.user_id))
        .await?;

    Ok((StatusCode::CREATED, Json(chat)))
}

async fn list_chats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Chat>>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;

    let chats = state
        .chat_service
        .list_chats_by_user(user_id, Pagination::new(query.limit, query.offset))
        .await?;

    Ok(Json(chats))
}

async fn list_participants(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chat_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<ChatParticipant>>, ApiError> {
    state.jwt_service.extract_user_from_headers(&headers)?;

    let participants = state
        .chat_service
        .list_participants(ChatId::from(chat_id), Pagination::new(query.limit, query.offset))
        .await?;

    Ok(Json(participants))
}

async fn list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chat_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let chat_id = ChatId::from(chat_id);

    // 历史消息与实时升级共用同一个授权入口
    state.chat_service.is_participant(chat_id, user_id).await?;

    let messages = state
        .chat_service
        .list_messages(chat_id, Pagination::new(query.limit, query.offset))
        .await?;

    Ok(Json(messages))
}

/// WebSocket 连接查询参数（浏览器无法为升级请求设置 Authorization 头）
#[derive(Debug, Deserialize)]
struct WsQuery {
    token: String,
}

/// 升级入口：认证与参与者授权都发生在升级之前，
/// 未授权的连接不会分配任何会话资源。
async fn websocket_upgrade(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user_id = state.jwt_service.verify_token(&query.token)?.user_id;
    let chat_id = ChatId::from(chat_id);

    state.chat_service.is_participant(chat_id, user_id).await?;

    Ok(ws.on_upgrade(move |socket| WsSession::run(socket, state, user_id, chat_id)))
}
