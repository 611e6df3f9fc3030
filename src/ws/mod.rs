pub mod handlers;
mod host;
mod player;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::error::GameError;
use crate::protocol::{ClientMessage, ServerMessage, PROTOCOL_VERSION};
use crate::state::AppState;
use crate::types::Role;

pub use handlers::ConnectionCtx;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Session id or game code
    pub game: String,
    pub role: Option<String>,
    pub token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!(
        "WebSocket connection request: game={}, role={:?}",
        params.game,
        params.role
    );

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

fn parse_role(role: Option<&str>) -> Role {
    match role {
        Some("host") => Role::Host,
        Some("player") => Role::Player,
        _ => Role::Audience,
    }
}

/// Resolve who this connection is before any message is exchanged
async fn connect(params: &WsQuery, state: &AppState) -> Result<ConnectionCtx, GameError> {
    let role = parse_role(params.role.as_deref());
    let handle = state.handle(&params.game).await?;

    let host_id = match role {
        Role::Host => {
            let token = params.token.as_deref().unwrap_or_default();
            Some(state.verify_host(&handle.id, token).await?)
        }
        _ => None,
    };

    Ok(ConnectionCtx {
        session_id: handle.id.clone(),
        role,
        host_id,
        player_id: None,
    })
}

async fn send_json(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize message: {}", e);
            true
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut ctx = match connect(&params, &state).await {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::warn!("Rejected WebSocket for game {}: {}", params.game, e);
            send_json(&mut sender, &ServerMessage::error(&e)).await;
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    // Subscribe before the snapshot so nothing falls between the two
    let mut events = match state.subscribe(&ctx.session_id).await {
        Ok(rx) => rx,
        Err(e) => {
            send_json(&mut sender, &ServerMessage::error(&e)).await;
            return;
        }
    };
    let snapshot = match state.snapshot(&ctx.session_id).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            send_json(&mut sender, &ServerMessage::error(&e)).await;
            return;
        }
    };

    let welcome = ServerMessage::Welcome {
        protocol: PROTOCOL_VERSION.to_string(),
        role: ctx.role,
        server_now: chrono::Utc::now().to_rfc3339(),
        state: snapshot,
    };
    if !send_json(&mut sender, &welcome).await {
        tracing::error!("Failed to send welcome message");
        return;
    }

    tracing::info!(
        "WebSocket joined session {} as {:?}",
        ctx.session_id,
        ctx.role
    );

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(msg) => {
                        if !send_json(&mut sender, &msg).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Connection lagged, skipped {} events", skipped);
                    }
                    // Session was deleted
                    Err(RecvError::Closed) => {
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handlers::handle_message(client_msg, &mut ctx, &state).await
                            }
                            Err(e) => {
                                tracing::warn!("Failed to parse client message: {}", e);
                                Some(ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                })
                            }
                        };
                        if let Some(reply) = reply {
                            if !send_json(&mut sender, &reply).await {
                                tracing::error!("Failed to send response");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state
        .handle_disconnect(&ctx.session_id, ctx.role, ctx.player_id.as_deref())
        .await;
    tracing::info!(
        "WebSocket connection closed for {:?} in {}",
        ctx.role,
        ctx.session_id
    );
}
