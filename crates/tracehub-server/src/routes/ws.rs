use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::Ordering;
use tracing::debug;

use crate::state::AppState;

/// Live event feed. Each successfully handled event is pushed to every
/// connected client; slow clients lose messages rather than applying
/// backpressure to the consumer.
pub async fn stream(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    state.ws_clients.fetch_add(1, Ordering::Relaxed);
    debug!("live feed client connected");

    let (mut sender, mut receiver) = socket.split();
    let mut feed = state.live.subscribe();

    loop {
        tokio::select! {
            event = feed.recv() => match event {
                Ok(event) => {
                    let Ok(text) = serde_json::to_string(&event) else { continue };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                // Lagged receivers drop missed events and keep going.
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.ws_clients.fetch_sub(1, Ordering::Relaxed);
    debug!("live feed client disconnected");
}
