// =============================================================================
// WebSocket Handler - Push-based dashboard updates
// =============================================================================
//
// Clients connect to `/api/v1/ws` and receive:
//   1. An immediate full DashboardSnapshot on connect.
//   2. A fresh snapshot every 500 ms whenever the state_version has changed
//      since the last push.
//
// Ping frames are answered with Pong; any other inbound text is ignored.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::dashboard::DashboardState;

const PUSH_INTERVAL: Duration = Duration::from_millis(500);

/// Axum handler for the WebSocket upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<DashboardState>>,
) -> impl IntoResponse {
    info!("dashboard WebSocket accepted - upgrading");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Runs the push loop and the receive loop for one viewer via
/// `tokio::select!` until either side goes away.
async fn handle_ws_connection(socket: WebSocket, state: Arc<DashboardState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut last_sent_version = match send_snapshot(&mut sender, &state).await {
        Ok(version) => version,
        Err(e) => {
            warn!(error = %e, "failed to send initial dashboard snapshot");
            return;
        }
    };
    let mut push_interval = interval(PUSH_INTERVAL);

    loop {
        tokio::select! {
            _ = push_interval.tick() => {
                let current_version = state.current_state_version();
                if current_version != last_sent_version {
                    match send_snapshot(&mut sender, &state).await {
                        Ok(version) => last_sent_version = version,
                        Err(e) => {
                            debug!(error = %e, "dashboard WebSocket send failed - disconnecting");
                            break;
                        }
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(error = %e, "failed to send Pong - disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("dashboard WebSocket closed by viewer");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "dashboard WebSocket receive error - disconnecting");
                        break;
                    }
                }
            }
        }
    }
}

/// Returns the state version the snapshot was built from.
async fn send_snapshot<S>(sender: &mut S, state: &DashboardState) -> Result<u64, axum::Error>
where
    S: futures_util::Sink<Message, Error = axum::Error> + Unpin,
{
    let snapshot = state.build_snapshot();

    match serde_json::to_string(&snapshot) {
        Ok(json) => {
            sender.send(Message::Text(json)).await?;
            debug!(version = snapshot.state_version, "dashboard snapshot sent");
        }
        Err(e) => {
            // Not a network error; keep the viewer connected.
            warn!(error = %e, "failed to serialise dashboard snapshot");
        }
    }
    Ok(snapshot.state_version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DisplaySink;
    use crate::types::ServiceStatus;
    use parking_lot::RwLock;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

    type Viewer = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

    async fn connect_viewer(state: Arc<DashboardState>) -> Viewer {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, crate::api::rest::router(state))
                .await
                .unwrap();
        });
        let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/v1/ws"))
            .await
            .unwrap();
        socket
    }

    async fn next_frame(viewer: &mut Viewer) -> WsMessage {
        tokio::time::timeout(Duration::from_secs(5), viewer.next())
            .await
            .expect("frame within 5s")
            .expect("socket open")
            .expect("valid frame")
    }

    async fn next_snapshot(viewer: &mut Viewer) -> serde_json::Value {
        loop {
            if let WsMessage::Text(text) = next_frame(viewer).await {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn snapshot_on_connect_then_push_on_change() {
        let symbols = vec!["BTCUSDT".to_string()];
        let state = Arc::new(DashboardState::new(
            &symbols,
            "BTCUSDT",
            Arc::new(RwLock::new(None)),
        ));
        let mut viewer = connect_viewer(Arc::clone(&state)).await;

        let first = next_snapshot(&mut viewer).await;
        assert_eq!(first["status"]["api"], "Offline");
        assert_eq!(first["symbols"]["BTCUSDT"]["connection"], "Connecting");
        let first_version = first["state_version"].as_u64().unwrap();

        state.show_status(&ServiceStatus::online());
        let second = next_snapshot(&mut viewer).await;
        assert_eq!(second["status"]["api"], "Online");
        assert!(second["state_version"].as_u64().unwrap() > first_version);
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let symbols = vec!["ETHUSDT".to_string()];
        let state = Arc::new(DashboardState::new(
            &symbols,
            "ETHUSDT",
            Arc::new(RwLock::new(None)),
        ));
        let mut viewer = connect_viewer(state).await;
        next_snapshot(&mut viewer).await;

        viewer.send(WsMessage::Ping(b"hb".to_vec())).await.unwrap();
        loop {
            if let WsMessage::Pong(payload) = next_frame(&mut viewer).await {
                assert_eq!(payload, b"hb".to_vec());
                break;
            }
        }
    }
}
