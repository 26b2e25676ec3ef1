//! WebSocket rooms for the gate displays
//!
//! Each socket joins exactly one hub group. The write half is handed to the
//! hub; this module keeps only the read half, which it drains for liveness
//! and to notice the peer going away.

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parkgate_core::GateNo;
use parkgate_hub::{Subscriber, SubscriberError};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// A socket with no inbound frame for this long is dropped
pub const IDLE_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Hub subscriber backed by the write half of a WebSocket
pub struct WsSubscriber {
    sink: SplitSink<WebSocket, Message>,
}

impl WsSubscriber {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Subscriber for WsSubscriber {
    async fn send_text(&mut self, text: &str) -> Result<(), SubscriberError> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| SubscriberError::WriteFailed(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
    }
}

/// GET /gate-in/{gate_no}
pub async fn gate_in(
    State(state): State<AppState>,
    Path(gate_no): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let gate = GateNo::parse(&gate_no)?;
    Ok(join(ws, state, format!("gate_in_{gate}")))
}

/// GET /gate-out/{gate_no}
pub async fn gate_out(
    State(state): State<AppState>,
    Path(gate_no): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let gate = GateNo::parse(&gate_no)?;
    Ok(join(ws, state, format!("gate_out_{gate}")))
}

/// GET /zoning/entrance/{zoning_code}/{gate_no}
pub async fn zoning_entrance(
    State(state): State<AppState>,
    Path((zoning_code, gate_no)): Path<(String, String)>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let gate = GateNo::parse(&gate_no)?;
    Ok(join(ws, state, format!("entrance:{zoning_code}:{gate}")))
}

/// GET /zoning/exit/{zoning_code}/{gate_no}
pub async fn zoning_exit(
    State(state): State<AppState>,
    Path((zoning_code, gate_no)): Path<(String, String)>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let gate = GateNo::parse(&gate_no)?;
    Ok(join(ws, state, format!("exit:{zoning_code}:{gate}")))
}

fn join(ws: WebSocketUpgrade, state: AppState, room: String) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state, room))
}

async fn serve_socket(socket: WebSocket, state: AppState, room: String) {
    let (sink, stream) = socket.split();

    let id = match state
        .hub()
        .register(room.clone(), Box::new(WsSubscriber::new(sink)))
        .await
    {
        Ok(id) => id,
        Err(e) => {
            warn!(%room, error = %e, "Could not join room");
            return;
        }
    };
    info!(%room, %id, "Display connected");

    drain(stream, &room).await;

    if let Err(e) = state.hub().unregister(room.clone(), id).await {
        debug!(%room, error = %e, "Unregister after hub shutdown");
    }
    info!(%room, %id, "Display disconnected");
}

/// Read until the peer closes, errors or stays silent too long
async fn drain(mut stream: SplitStream<WebSocket>, room: &str) {
    loop {
        match tokio::time::timeout(IDLE_READ_TIMEOUT, stream.next()).await {
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break,
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(e))) => {
                debug!(%room, error = %e, "WebSocket read failed");
                break;
            }
            Err(_) => {
                debug!(%room, "WebSocket idle, dropping");
                break;
            }
        }
    }
}
