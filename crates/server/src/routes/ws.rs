// crates/server/src/routes/ws.rs
//! Live job updates over WebSocket.
//!
//! `GET /ws?jobId=<id>` (also accepted on `/`). The first text frame is the
//! job's current record, if it has one; every later frame is a live update.
//! A socket whose subscription is replaced by a newer connection, or whose
//! job is swept, receives a close frame.

use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use splatserve_jobs::{JobStatus, Subscription};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    #[serde(rename = "jobId")]
    pub job_id: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let job_id = query.job_id.filter(|id| !id.is_empty());
    ws.on_upgrade(move |socket| handle_socket(socket, state, job_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, job_id: Option<String>) {
    let Some(job_id) = job_id else {
        warn!("websocket connected without jobId, no updates will be sent");
        let (_sink, stream) = socket.split();
        drain_inbound(stream).await;
        debug!("websocket without jobId closed");
        return;
    };

    let Subscription {
        observer_id,
        updates,
        ..
    } = state.jobs.subscribe(&job_id);
    let (sink, stream) = socket.split();

    let mut forward = tokio::spawn(forward_updates(sink, updates, job_id.clone()));
    let mut receive = tokio::spawn(drain_inbound(stream));

    tokio::select! {
        _ = &mut forward => receive.abort(),
        _ = &mut receive => forward.abort(),
    }

    state.jobs.unsubscribe(&job_id, observer_id);
    info!(job_id = %job_id, observer_id = %observer_id, "websocket disconnected");
}

/// Send each update as a JSON text frame until the subscription ends or the
/// client goes away.
async fn forward_updates(
    mut sink: SplitSink<WebSocket, Message>,
    mut updates: mpsc::UnboundedReceiver<JobStatus>,
    job_id: String,
) {
    while let Some(status) = updates.recv().await {
        let json = match serde_json::to_string(&status) {
            Ok(json) => json,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "failed to encode job status");
                continue;
            }
        };
        if sink.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    // The directory dropped our handle.
    debug!(job_id = %job_id, "subscription ended, closing websocket");
    let _ = sink
        .send(Message::Close(Some(CloseFrame {
            code: close_code::NORMAL,
            reason: "subscription ended".into(),
        })))
        .await;
}

/// Read and discard client frames until it closes.
async fn drain_inbound(mut stream: SplitStream<WebSocket>) {
    while let Some(Ok(msg)) = stream.next().await {
        if let Message::Close(_) = msg {
            break;
        }
    }
}

/// Build the WebSocket router. Mounted at the root, outside `/api`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/", get(ws_handler))
}
