use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use draftview_engine::MessageHandler;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn router(handler: Arc<MessageHandler>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(|| async { "ok" }))
        .with_state(handler)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn ws_handler(ws: WebSocketUpgrade, State(handler): State<Arc<MessageHandler>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, handler))
}

/// One task writes queued replies to the socket while this one feeds
/// incoming frames to the handler in arrival order.
async fn handle_socket(socket: WebSocket, handler: Arc<MessageHandler>) {
    let (id, mut outbound) = handler.connect();
    let (mut sink, mut stream) = socket.split();
    tracing::info!(connection = %id, "client connected");

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode outbound message");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => handler.handle(id, &text).await,
            Ok(Message::Binary(bytes)) => handler.handle(id, &String::from_utf8_lossy(&bytes)).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection = %id, error = %e, "socket error");
                break;
            }
        }
    }

    // dropping the registration closes the queue, which ends the writer
    handler.disconnect(id).await;
    let _ = writer.await;
    tracing::info!(connection = %id, "client disconnected");
}
