//! Real-time connection endpoint (`GET /ws`).
//!
//! Each socket is registered with the fan-out bus under a fresh
//! `ConnectionId`. A writer task drains the connection's bounded channel
//! into the socket; the reader loop applies `subscribe` / `unsubscribe` control
//! frames. Malformed frames are ignored.

use crate::fanout::{ControlMessage, FanOutBus, CONNECTION_CHANNEL_BUFFER};
use crate::routes::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use common::types::ConnectionId;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let bus = state.bus.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, bus))
}

#[instrument(skip_all, name = "net.fanout.connection", fields(connection_id))]
async fn handle_socket(socket: WebSocket, bus: FanOutBus) {
    let connection_id = ConnectionId::new();
    tracing::Span::current().record("connection_id", tracing::field::display(connection_id));

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(CONNECTION_CHANNEL_BUFFER);
    bus.connect(connection_id, outbound_tx).await;
    info!(target: "net.fanout", connection_id = %connection_id, "Connection opened");

    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            _ = &mut writer => break,

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        apply_control(&bus, connection_id, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    bus.disconnect(connection_id).await;
    writer.abort();
    info!(target: "net.fanout", connection_id = %connection_id, "Connection closed");
}

async fn apply_control(bus: &FanOutBus, connection_id: ConnectionId, text: &str) {
    match serde_json::from_str::<ControlMessage>(text) {
        Ok(ControlMessage::Subscribe { net_id }) => {
            bus.subscribe(connection_id, net_id).await;
        }
        Ok(ControlMessage::Unsubscribe) => {
            bus.unsubscribe(connection_id).await;
        }
        Err(e) => {
            debug!(target: "net.fanout", connection_id = %connection_id, error = %e, "Ignoring malformed control frame");
        }
    }
}
