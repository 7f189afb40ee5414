//! # media-range
//!
//! Seekable media streaming over HTTP range requests for [`axum`][1].
//!
//! A request for a media item goes through a [`StreamingService`], which looks
//! the item up in a [`MediaRepository`], asks an [`AuthorizationGate`] whether
//! the caller may stream it, resolves the `Range` header against the size of
//! the backing file with a [`RangeResolver`] and hands back a [`MediaStream`]
//! whose body is a [`BoundedRangeReader`] over exactly the requested bytes.
//!
//! Only single ranges are supported. A `Range` header with a unit other than
//! `bytes` is ignored and the full resource is served.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use media_range::{FsStorage, InMemoryMediaRepository, MediaDescriptor, MediaId};
//! use media_range::{PremiumGate, RangeResolver, StreamingService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let catalog = Arc::new(InMemoryMediaRepository::new());
//!     catalog.insert(MediaDescriptor::new(MediaId(1), "Intro", "intro.mp3"));
//!
//!     let service = StreamingService::new(
//!         catalog.clone(),
//!         PremiumGate::new(catalog),
//!         FsStorage::new("/srv/media"),
//!         RangeResolver::default(),
//!     );
//!
//!     let app = media_range::router(Arc::new(service));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! [1]: https://docs.rs/axum

mod auth;
mod error;
mod file;
mod media;
mod resolve;
mod router;
mod service;
mod stream;

pub mod config;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::headers::ContentRange;
use axum_extra::TypedHeader;

pub use auth::{AllowAll, AuthorizationGate, Caller, PremiumGate, Role};
pub use error::StreamError;
pub use file::{FsStorage, Storage};
pub use media::{InMemoryMediaRepository, MediaDescriptor, MediaId, MediaRepository};
pub use resolve::{OpenEnded, RangeResolver};
pub use router::router;
pub use service::{MediaStream, StreamingService, DEFAULT_CONTENT_TYPE};
pub use stream::BoundedRangeReader;

/// A resolved byte range, inclusive on both ends.
///
/// Built only by [`RangeResolver`], so `start <= end < total_size` holds for
/// every partial range and a full range always covers the whole resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start: u64,
    end: u64,
    content_length: u64,
    partial: bool,
}

impl ByteRange {
    /// The whole resource. An empty resource has a content length of zero.
    pub(crate) fn full(total_size: u64) -> Self {
        ByteRange {
            start: 0,
            end: total_size.saturating_sub(1),
            content_length: total_size,
            partial: false,
        }
    }

    pub(crate) fn partial(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        ByteRange {
            start,
            end,
            content_length: end - start + 1,
            partial: true,
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Whether the response carries only part of the resource (206).
    pub fn is_partial(&self) -> bool {
        self.partial
    }
}

/// Error returned when a `bytes` range cannot be served against a resource of
/// `total_size` bytes. Implements [`IntoResponse`] as a 416 with
/// `Content-Range: bytes */<total_size>` and an empty body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("range not satisfiable for resource of {total_size} bytes")]
pub struct RangeNotSatisfiable {
    pub total_size: u64,
}

impl IntoResponse for RangeNotSatisfiable {
    fn into_response(self) -> Response {
        let status = StatusCode::RANGE_NOT_SATISFIABLE;
        let header = TypedHeader(ContentRange::unsatisfied_bytes(self.total_size));
        (status, header, ()).into_response()
    }
}
