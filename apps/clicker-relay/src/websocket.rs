use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use clicker_proto::{ClientFrame, ControlMessage, ServerMessage};

use crate::registry::ControllerHandle;
use crate::AppState;

/// GET /ws - controller websocket endpoint.
pub async fn websocket_handler(
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, remote_addr))
}

async fn handle_socket(socket: WebSocket, state: AppState, remote_addr: SocketAddr) {
    // Controllers are identified by address only; a reconnecting browser gets
    // a fresh port but must still displace its previous registration.
    let identity = remote_addr.ip();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // Writer task: every frame for this controller leaves through one queue.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let handle = ControllerHandle::new(tx);
    let connection_id = handle.connection_id;

    if let Some(displaced) = state.registry.register(identity, handle.clone()) {
        info!(%identity, "closing superseded controller connection");
        displaced.close("superseded");
    }
    info!(%identity, %connection_id, "controller connected");

    handle.send(&ServerMessage::Config {
        roku_ip: state.target.get().await.unwrap_or_default(),
        server_time: Some(chrono::Utc::now().timestamp_millis()),
    });

    while let Some(frame) = receiver.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(err) => {
                debug!(%identity, error = %err, "websocket error");
                break;
            }
        };

        match message {
            Message::Text(text) => handle_text(&state, &handle, &text).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    if state.registry.unregister(identity, connection_id) {
        info!(%identity, %connection_id, "controller disconnected");
    }
    writer.abort();
}

async fn handle_text(state: &AppState, handle: &ControllerHandle, text: &str) {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::Control(ControlMessage::SetRokuIp { ip })) => {
            match state.target.set(&ip).await {
                Ok(ip) => {
                    info!(roku_ip = %ip, "target updated");
                    // Acknowledge to the sender only; the snapshot timestamp
                    // is reserved for connect.
                    handle.send(&ServerMessage::Config {
                        roku_ip: ip,
                        server_time: None,
                    });
                }
                Err(err) => {
                    warn!(error = %err, "ignoring target update");
                }
            }
        }
        Ok(ClientFrame::Command(frame)) => match frame.validate() {
            Ok(command) => {
                // Forward off the read loop so a slow device cannot stall
                // later commands from this controller.
                let forwarder = state.forwarder.clone();
                let reply = handle.clone();
                tokio::spawn(async move {
                    if let Err(err) = forwarder.forward(command).await {
                        reply.send(&ServerMessage::Error {
                            message: format!("Roku unreachable: {err}"),
                        });
                    }
                });
            }
            Err(err) => {
                counter!("clicker_frames_dropped_total", 1, "reason" => "invalid_command");
                warn!(error = %err, "dropping invalid command");
            }
        },
        Err(err) => {
            counter!("clicker_frames_dropped_total", 1, "reason" => "malformed");
            debug!(error = %err, "dropping malformed frame");
        }
    }
}
