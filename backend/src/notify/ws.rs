//! WebSocket endpoint for live notification delivery.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use meetsync_common::{ClientMessage, NotificationDraft, ServerMessage};

use super::ChannelHandle;
use crate::store::UserStore;
use crate::AppState;

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    tracing::debug!("Live channel connection attempt from {}", addr);
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, addr: SocketAddr) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let registration_timeout = Duration::from_secs(state.config.realtime.registration_timeout_secs);
    let user_id = match timeout(registration_timeout, ws_rx.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Register { user_id }) => user_id,
            Ok(_) => {
                tracing::warn!("Expected register message from {}, got different type", addr);
                let _ = send_error(&mut ws_tx, "PROTOCOL_ERROR", "Expected register message").await;
                return;
            }
            Err(e) => {
                tracing::warn!("Failed to parse registration from {}: {}", addr, e);
                let _ = send_error(&mut ws_tx, "PARSE_ERROR", &e.to_string()).await;
                return;
            }
        },
        Ok(Some(Ok(_))) => {
            tracing::warn!("Expected text message for registration from {}", addr);
            let _ = send_error(&mut ws_tx, "PROTOCOL_ERROR", "Expected text message").await;
            return;
        }
        Ok(Some(Err(e))) => {
            tracing::warn!("WebSocket error during registration from {}: {}", addr, e);
            return;
        }
        Ok(None) => {
            tracing::debug!("Connection closed before registration from {}", addr);
            return;
        }
        Err(_) => {
            tracing::warn!("Registration timeout from {}", addr);
            let _ = send_error(&mut ws_tx, "TIMEOUT", "Registration timeout").await;
            return;
        }
    };

    match state.users.find_by_id(&user_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            tracing::warn!("Registration for unknown user {} from {}", user_id, addr);
            let _ = send_error(&mut ws_tx, "UNKNOWN_USER", "User not found").await;
            return;
        }
        Err(e) => {
            tracing::error!("User lookup failed during registration: {}", e);
            let _ = send_error(&mut ws_tx, "INTERNAL_ERROR", "Registration failed").await;
            return;
        }
    }

    let (tx, mut rx) = mpsc::channel::<ServerMessage>(state.config.realtime.channel_capacity);
    let handle = ChannelHandle::new(user_id.clone(), tx);
    let handle_id = handle.id.clone();
    state.registry.register(handle).await;

    let ack = ServerMessage::RegisterAck {
        user_id: user_id.clone(),
    };
    if let Err(e) = send_message(&mut ws_tx, &ack).await {
        tracing::error!("Failed to send register_ack to {}: {}", user_id, e);
        state.registry.unregister(&user_id, &handle_id).await;
        return;
    }
    tracing::info!("User {} connected from {} (channel {})", user_id, addr, handle_id);

    loop {
        tokio::select! {
            // Pushes queued by the dispatcher.
            Some(msg) = rx.recv() => {
                if let Err(e) = send_message(&mut ws_tx, &msg).await {
                    tracing::warn!("Failed to push to {}: {}", user_id, e);
                    break;
                }
            }

            Some(result) = ws_rx.next() => {
                match result {
                    Ok(Message::Text(text)) => {
                        if let Some(reply) = handle_client_message(&text, &user_id, &state).await {
                            if let Err(e) = send_message(&mut ws_tx, &reply).await {
                                tracing::warn!("Failed to reply to {}: {}", user_id, e);
                                break;
                            }
                        }
                    }
                    Ok(Message::Ping(data)) => {
                        if let Err(e) = ws_tx.send(Message::Pong(data)).await {
                            tracing::warn!("Failed to send pong to {}: {}", user_id, e);
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::debug!("User {} sent close frame", user_id);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("WebSocket error from {}: {}", user_id, e);
                        break;
                    }
                }
            }

            else => break,
        }
    }

    if state.registry.unregister(&user_id, &handle_id).await {
        tracing::info!("User {} disconnected (channel {})", user_id, handle_id);
    } else {
        tracing::debug!("Channel {} for {} already replaced", handle_id, user_id);
    }
}

/// Handle a message from a registered client. Returns an error reply, if any.
async fn handle_client_message(
    text: &str,
    user_id: &str,
    state: &AppState,
) -> Option<ServerMessage> {
    let msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => return Some(error_message("PARSE_ERROR", &e.to_string())),
    };

    match msg {
        ClientMessage::SendNotification {
            receiver_id,
            notification,
        } => send_notification(state, user_id, &receiver_id, notification).await,
        ClientMessage::Register { .. } => {
            tracing::warn!("Unexpected register message from {} after registration", user_id);
            Some(error_message("PROTOCOL_ERROR", "Already registered"))
        }
    }
}

async fn send_notification(
    state: &AppState,
    sender_id: &str,
    receiver_id: &str,
    draft: NotificationDraft,
) -> Option<ServerMessage> {
    match state.users.find_by_id(receiver_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Some(error_message("UNKNOWN_USER", "Receiver not found")),
        Err(e) => {
            tracing::error!("Receiver lookup failed: {}", e);
            return Some(error_message("INTERNAL_ERROR", "Notification failed"));
        }
    }

    match state
        .dispatcher
        .dispatch(
            receiver_id,
            &draft.title,
            &draft.message,
            draft.meeting_id.as_deref(),
        )
        .await
    {
        Ok(delivery) => {
            tracing::debug!(
                "User {} notified {} (live: {})",
                sender_id,
                receiver_id,
                delivery.pushed
            );
            None
        }
        Err(e) => {
            tracing::error!("Notification from {} to {} failed: {}", sender_id, receiver_id, e);
            Some(error_message("INTERNAL_ERROR", "Notification failed"))
        }
    }
}

fn error_message(code: &str, message: &str) -> ServerMessage {
    ServerMessage::Error {
        code: code.to_string(),
        message: message.to_string(),
    }
}

/// Send a ServerMessage over WebSocket.
async fn send_message<S>(
    sink: &mut S,
    msg: &ServerMessage,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    S: SinkExt<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json)).await?;
    Ok(())
}

async fn send_error<S>(
    sink: &mut S,
    code: &str,
    message: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    S: SinkExt<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    send_message(sink, &error_message(code, message)).await
}
