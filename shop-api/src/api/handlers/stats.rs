use crate::auth::AdminUser;
use crate::server::AppState;
use crate::services::UserService;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::StreamExt;
use serde::Serialize;
use shop_storage::Context;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upgrades to a WebSocket that first sends the counter snapshot and then
/// every counter update as it is published.
pub async fn activity_stats_ws(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ws: WebSocketUpgrade,
) -> Response {
    info!("API: {} subscribed to activity stats", admin.sub);
    let users = state.user_service.clone();
    ws.on_upgrade(move |socket| stream_activity(socket, users))
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> bool {
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "failed to encode activity payload");
            return false;
        }
    };
    socket.send(Message::Text(payload.into())).await.is_ok()
}

async fn stream_activity(mut socket: WebSocket, users: Arc<UserService>) {
    let token = CancellationToken::new();
    // ends the subscription on every exit path
    let _cancel_on_exit = token.clone().drop_guard();
    let ctx = Context::with_cancellation(token);

    let (snapshot, mut updates) = match users.watch_activity(&ctx).await {
        Ok(watch) => watch,
        Err(e) => {
            warn!(error = %e, "activity stats unavailable");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    if !send_json(&mut socket, &snapshot).await {
        return;
    }

    loop {
        tokio::select! {
            update = updates.next() => match update {
                Some(stat) => {
                    if !send_json(&mut socket, &stat).await {
                        break;
                    }
                }
                None => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("activity stats subscriber disconnected");
}
