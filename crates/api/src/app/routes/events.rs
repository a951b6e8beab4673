use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Extension, Query},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use crate::app::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/events", get(stream_events))
        .route("/events/recent", get(recent_events))
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
    limit: Option<usize>,
}

/// Recent audit records, newest last.
async fn recent_events(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<RecentQuery>,
) -> axum::response::Response {
    let limit = query.limit.unwrap_or(100).min(1000);
    Json(services.audit.recent(limit)).into_response()
}

/// Live status-change feed (SSE). Lossy: a slow client misses events
/// rather than applying backpressure to the engine.
async fn stream_events(
    Extension(services): Extension<Arc<AppServices>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| {
        let msg = msg.ok()?;
        let event = SseEvent::default()
            .event(msg.topic.clone())
            .json_data(&msg)
            .ok()?;
        Some(Ok(event))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
