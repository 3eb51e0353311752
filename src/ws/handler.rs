//! WebSocket handler for client connections
//!
//! The first message on a connection must be a join (account, name, stake).
//! After that the connection only carries intents inbound and broadcast
//! frames outbound. The simulation task never blocks on a slow client,
//! and a lagging client just skips to the next full-state frame.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::GameError;
use crate::game::session::Command;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::rate_limiter::IntentDecision;
use crate::settlement::Value;
use crate::state::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();

    // Handshake: the first frame must be a join
    let join = match receiver.next().await {
        Some(Ok(Message::Text(text))) => serde_json::from_str::<ClientMessage>(&text).ok(),
        _ => None,
    };
    let Some(ClientMessage::Join {
        account_id,
        name,
        stake,
    }) = join
    else {
        let reject = ServerMessage::Error {
            message: "expected join message".into(),
        };
        let _ = sender.send(Message::Text(reject.to_json().into())).await;
        return;
    };

    let stake = match Value::new(stake) {
        Ok(v) if !v.is_zero() => v,
        _ => {
            let reject = ServerMessage::Error {
                message: GameError::InvalidStake(stake).to_string(),
            };
            let _ = sender.send(Message::Text(reject.to_json().into())).await;
            return;
        }
    };

    let display_name = if name.trim().is_empty() {
        "Player".to_string()
    } else {
        name.chars().take(20).collect()
    };

    let arena = state.arena_for_stake(stake);
    let ack = match arena.join(account_id, display_name).await {
        Ok(ack) => ack,
        Err(e) => {
            let reject = ServerMessage::Error {
                message: e.to_string(),
            };
            let _ = sender.send(Message::Text(reject.to_json().into())).await;
            return;
        }
    };
    let worm_id = ack.worm_id;

    info!(
        "connection {} joined arena {} as worm {}",
        connection_id, ack.arena_id, worm_id
    );
    state.rate_limiter.register(connection_id);

    // Subscribe before confirming the join so no frames are missed
    let mut frames = arena.broadcaster.subscribe();

    let joined = ServerMessage::Joined {
        worm_id,
        arena_id: ack.arena_id,
        world_size: ack.world_size,
        stake: ack.stake,
    };
    if sender.send(Message::Text(joined.to_json().into())).await.is_err() {
        state.rate_limiter.unregister(&connection_id);
        arena.send(Command::Leave { worm_id }).await;
        return;
    }

    // Outbound: forward arena frames to this client
    let send_task = tokio::spawn(async move {
        loop {
            match frames.recv().await {
                Ok(msg) => {
                    if sender.send(Message::Text(msg.to_json().into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("connection {} lagged by {} frames", connection_id, n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Inbound: translate client messages into arena commands
    let recv_task = {
        let state = state.clone();
        let arena = arena.clone();

        tokio::spawn(async move {
            while let Some(result) = receiver.next().await {
                match result {
                    Ok(Message::Text(text)) => {
                        let Ok(msg) = serde_json::from_str::<ClientMessage>(&text) else {
                            debug!("unparseable message from {}", connection_id);
                            continue;
                        };

                        // Steering-class intents are rate limited
                        if matches!(
                            msg,
                            ClientMessage::Steer { .. } | ClientMessage::Boost { .. }
                        ) {
                            match state.rate_limiter.admit(&connection_id) {
                                IntentDecision::Allow => {}
                                IntentDecision::Throttle => {
                                    warn!(
                                        "connection {} throttled ({} violations)",
                                        connection_id,
                                        state.rate_limiter.violations(&connection_id)
                                    );
                                    continue;
                                }
                                IntentDecision::Kick => {
                                    warn!("connection {} kicked for intent flooding", connection_id);
                                    break;
                                }
                            }
                        }

                        match msg {
                            ClientMessage::Steer { heading } => {
                                if !heading.is_finite() {
                                    continue;
                                }
                                arena.send(Command::Steer { worm_id, heading }).await;
                            }
                            ClientMessage::Boost { on } => {
                                arena.send(Command::SetBoost { worm_id, on }).await;
                            }
                            ClientMessage::ExitHold { on } => {
                                arena.send(Command::SetExitHold { worm_id, on }).await;
                            }
                            ClientMessage::Chat { text } => {
                                arena.send(Command::Chat { worm_id, text }).await;
                            }
                            ClientMessage::Ping => {}
                            ClientMessage::Join { .. } => {
                                debug!("duplicate join from {} ignored", connection_id);
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("connection {} sent close frame", connection_id);
                        break;
                    }
                    Ok(_) => {
                        // ignore binary, ping, pong frames
                    }
                    Err(e) => {
                        error!("websocket error on {}: {}", connection_id, e);
                        break;
                    }
                }
            }
        })
    };

    tokio::select! {
        _ = send_task => {}
        _ = recv_task => {}
    }

    info!("connection {} closed (worm {})", connection_id, worm_id);
    state.rate_limiter.unregister(&connection_id);
    // A live worm left behind forfeits; a settled one makes this a no-op
    arena.send(Command::Leave { worm_id }).await;
}
