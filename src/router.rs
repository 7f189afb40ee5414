use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::{AuthorizationGate, Caller, MediaId, MediaRepository, Storage, StreamingService};

/// Builds the streaming router.
///
/// - `GET /api/audios/{id}/stream` - full or partial content of a media item
pub fn router<R, G, S>(service: Arc<StreamingService<R, G, S>>) -> Router
where
    R: MediaRepository + 'static,
    G: AuthorizationGate + 'static,
    S: Storage + 'static,
{
    Router::new()
        .route("/api/audios/{id}/stream", get(stream_media::<R, G, S>))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn stream_media<R, G, S>(
    State(service): State<Arc<StreamingService<R, G, S>>>,
    Path(id): Path<MediaId>,
    caller: Caller,
    headers: HeaderMap,
) -> Response
where
    R: MediaRepository + 'static,
    G: AuthorizationGate + 'static,
    S: Storage + 'static,
{
    // a Range value that is not valid UTF-8 cannot be a bytes range
    let range = headers.get(header::RANGE).and_then(|value| value.to_str().ok());

    match service.stream(id, range, &caller).await {
        Ok(stream) => stream.into_response(),
        Err(err) => err.into_response(),
    }
}
