//! WebSocket bridge handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{SessionHandle, SyncError};
use crate::util::rate_limit::InputRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let peer_id = Uuid::new_v4();
    info!(peer_id = %peer_id, "New bridge connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe before the resync so no batch falls between the two
    let effects_rx = state.session.subscribe();
    let Some(resync) = state.session.request_resync().await else {
        warn!(peer_id = %peer_id, "Sync session stopped, refusing connection");
        return;
    };
    let synced_through = resync.seq().unwrap_or(0);

    let welcome = ServerMsg::Welcome {
        local_identity: state.session.local_identity.clone(),
        server_time: unix_millis(),
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(peer_id = %peer_id, error = %e, "Failed to send welcome");
        return;
    }
    if let Err(e) = send_msg(&mut ws_sink, &resync).await {
        error!(peer_id = %peer_id, error = %e, "Failed to send resync");
        return;
    }

    let limiter = InputRateLimiter::new(state.config.input_rate_limit);
    let feed = EffectFeed {
        effects_rx,
        synced_through,
    };
    run_session(peer_id, ws_sink, ws_stream, feed, state.session.clone(), limiter).await;

    info!(peer_id = %peer_id, "Bridge connection closed");
}

/// A peer's broadcast subscription and the last batch it already holds
struct EffectFeed {
    effects_rx: broadcast::Receiver<ServerMsg>,
    synced_through: u64,
}

/// True for effect batches a resync already delivered
fn already_synced(msg: &ServerMsg, synced_through: u64) -> bool {
    matches!(msg, ServerMsg::Effects { seq, .. } if *seq <= synced_through)
}

/// Run the WebSocket session with read/write split
async fn run_session(
    peer_id: Uuid,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    feed: EffectFeed,
    session: SessionHandle,
    rate_limiter: InputRateLimiter,
) {
    let EffectFeed {
        mut effects_rx,
        mut synced_through,
    } = feed;
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMsg>(16);
    let writer_session = session.clone();

    // Writer task: session effects and direct replies -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let outgoing = tokio::select! {
                received = effects_rx.recv() => match received {
                    Ok(msg) if already_synced(&msg, synced_through) => continue,
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(
                            peer_id = %peer_id,
                            lagged_count = n,
                            "Peer lagged {} effect batches, resyncing", n
                        );
                        match writer_session.request_resync().await {
                            Some(resync) => {
                                synced_through = resync.seq().unwrap_or(synced_through);
                                resync
                            }
                            None => break,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(peer_id = %peer_id, "Effect channel closed");
                        break;
                    }
                },
                reply = reply_rx.recv() => match reply {
                    Some(msg) => msg,
                    None => break,
                },
            };

            if let Err(e) = send_msg(&mut ws_sink, &outgoing).await {
                debug!(peer_id = %peer_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> session
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(peer_id = %peer_id, error = %e, "Failed to parse bridge message");
                        let _ = reply_tx
                            .send(ServerMsg::error("bad_message", e.to_string()))
                            .await;
                        continue;
                    }
                };

                if let ClientMsg::Ping { t } = client_msg {
                    let _ = reply_tx.send(ServerMsg::Pong { t }).await;
                    continue;
                }

                if matches!(client_msg, ClientMsg::DirectionInput { .. })
                    && !rate_limiter.check_input()
                {
                    warn!(peer_id = %peer_id, "Rate limited direction input");
                    continue;
                }

                match client_msg.into_event() {
                    Ok(Some(event)) => {
                        if session.event_tx.send(event).await.is_err() {
                            debug!(peer_id = %peer_id, "Event channel closed");
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e @ SyncError::InvalidDirection(_)) => {
                        warn!(peer_id = %peer_id, error = %e, "Rejected direction input");
                        let _ = reply_tx
                            .send(ServerMsg::error("invalid_direction", e.to_string()))
                            .await;
                    }
                    Err(e) => {
                        warn!(peer_id = %peer_id, error = %e, "Rejected bridge message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(peer_id = %peer_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(peer_id = %peer_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(peer_id = %peer_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(peer_id = %peer_id, "Peer initiated close");
                break;
            }
            Err(e) => {
                error!(peer_id = %peer_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
