//! Viewer-facing gateway: every `BroadcastEvent` is relayed as JSON to each
//! connected websocket.

use std::time::Duration;

use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use streambot_engine::sinks::Broadcaster;
use streambot_types::events::BroadcastEvent;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Server pings each viewer on this interval.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const CHANNEL_CAPACITY: usize = 1024;

/// Fan-out point shared by the engine and every viewer connection.
#[derive(Clone)]
pub struct Hub {
    tx: broadcast::Sender<BroadcastEvent>,
    shutdown: CancellationToken,
}

impl Hub {
    pub fn new(shutdown: CancellationToken) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx, shutdown }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.tx.subscribe()
    }
}

impl Broadcaster for Hub {
    fn broadcast(&self, event: BroadcastEvent) {
        // No viewers connected is not an error.
        let _ = self.tx.send(event);
    }
}

pub fn router(hub: Hub) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(ws_upgrade))
        .with_state(hub)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn ws_upgrade(State(hub): State<Hub>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, hub))
}

async fn handle_connection(socket: WebSocket, hub: Hub) {
    let conn_id = Uuid::new_v4();
    info!(%conn_id, "Viewer connected");

    let (mut sender, mut receiver) = socket.split();
    let mut events = hub.subscribe();
    let shutdown = hub.shutdown.clone();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
                result = events.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(%conn_id, "Viewer lagged by {} events", n);
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode broadcast event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Viewers are read-only; inbound frames only matter for close detection.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Close(_) => break,
                Message::Text(text) => debug!(%conn_id, "Ignoring viewer message: {}", text.as_str()),
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!(%conn_id, "Viewer disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn healthz_answers_ok() {
        let app = router(Hub::new(CancellationToken::new()));
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 64).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn hub_fans_out_to_every_subscriber() {
        let hub = Hub::new(CancellationToken::new());
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.broadcast(BroadcastEvent::Announcement { text: "hi".into() });

        for rx in [&mut a, &mut b] {
            assert_eq!(
                rx.recv().await.unwrap(),
                BroadcastEvent::Announcement { text: "hi".into() }
            );
        }
    }

    #[test]
    fn broadcast_without_viewers_is_dropped() {
        let hub = Hub::new(CancellationToken::new());
        hub.broadcast(BroadcastEvent::CounterUpdated { name: "wins".into(), value: 1 });
    }

    #[test]
    fn events_encode_with_type_tag() {
        let json = serde_json::to_value(BroadcastEvent::CounterUpdated {
            name: "wins".into(),
            value: 3,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "CounterUpdated", "data": { "name": "wins", "value": 3 } })
        );
    }
}
