use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::headers::{AcceptRanges, ContentLength, ContentRange, HeaderMapExt};
use tokio::io::AsyncRead;

use crate::{
    AuthorizationGate, BoundedRangeReader, ByteRange, Caller, MediaDescriptor, MediaId,
    MediaRepository, RangeResolver, Storage, StreamError,
};

/// Content type used when a media item has none recorded and none can be
/// guessed from its locator.
pub const DEFAULT_CONTENT_TYPE: &str = "audio/mpeg";

/// Serves media items as full or partial content.
///
/// Each call to [`stream`](StreamingService::stream) is independent: the size
/// of the backing object is read fresh and a new handle is opened for every
/// request.
#[derive(Debug, Clone)]
pub struct StreamingService<R, G, S> {
    repository: R,
    gate: G,
    storage: S,
    resolver: RangeResolver,
    default_content_type: String,
}

impl<R, G, S> StreamingService<R, G, S>
where
    R: MediaRepository,
    G: AuthorizationGate,
    S: Storage,
{
    pub fn new(repository: R, gate: G, storage: S, resolver: RangeResolver) -> Self {
        StreamingService {
            repository,
            gate,
            storage,
            resolver,
            default_content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }

    pub fn with_default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = content_type.into();
        self
    }

    pub fn resolver(&self) -> &RangeResolver {
        &self.resolver
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Streams media `id` to `caller`, honouring `raw_range` if it is a
    /// `bytes` range.
    #[tracing::instrument(level = "debug", skip(self, caller))]
    pub async fn stream(
        &self,
        id: MediaId,
        raw_range: Option<&str>,
        caller: &Caller,
    ) -> Result<MediaStream<S::Handle>, StreamError> {
        let media = self.repository.find_by_id(id).await.ok_or(StreamError::NotFound(id))?;

        if !self.gate.can_stream(id, caller).await {
            tracing::debug!(%id, authenticated = caller.is_authenticated(), "stream denied");
            return Err(if caller.is_authenticated() {
                StreamError::Forbidden(id)
            } else {
                StreamError::Unauthorized(id)
            });
        }

        let locator = media.storage_locator.as_str();
        if !self.storage.is_accessible(locator).await {
            return Err(StreamError::storage(locator, "media file not accessible", None));
        }

        let total_size = self
            .storage
            .size(locator)
            .await
            .map_err(|e| StreamError::storage(locator, "failed to read file size", Some(e)))?;

        let range = self.resolver.resolve(raw_range, total_size)?;

        let handle = self
            .storage
            .open_at(locator, range.start())
            .await
            .map_err(|e| StreamError::storage(locator, "failed to open media stream", Some(e)))?;

        tracing::info!(
            %id,
            start = range.start(),
            end = range.end(),
            total_size,
            partial = range.is_partial(),
            "streaming media"
        );

        Ok(MediaStream {
            status: if range.is_partial() { StatusCode::PARTIAL_CONTENT } else { StatusCode::OK },
            headers: range_headers(&range, total_size),
            content_type: self.content_type(&media),
            body: BoundedRangeReader::new(handle, range.content_length()),
        })
    }

    /// Recorded type, else a guess from the locator's extension if it names
    /// audio or video, else the default.
    fn content_type(&self, media: &MediaDescriptor) -> HeaderValue {
        let recorded = media
            .content_type
            .as_deref()
            .filter(|value| value.parse::<mime_guess::Mime>().is_ok())
            .and_then(|value| HeaderValue::from_str(value).ok());

        let guessed = || {
            mime_guess::from_path(&media.storage_locator)
                .iter()
                .find(|mime| mime.type_() == mime_guess::mime::AUDIO || mime.type_() == mime_guess::mime::VIDEO)
                .and_then(|mime| HeaderValue::from_str(mime.essence_str()).ok())
        };

        recorded
            .or_else(guessed)
            .or_else(|| HeaderValue::from_str(&self.default_content_type).ok())
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE))
    }
}

fn range_headers(range: &ByteRange, total_size: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.typed_insert(AcceptRanges::bytes());
    headers.typed_insert(ContentLength(range.content_length()));

    if range.is_partial() {
        let content_range = ContentRange::bytes(range.start()..=range.end(), total_size)
            .expect("resolved ranges always lie within the resource");
        headers.typed_insert(content_range);
    }

    headers
}

/// A ready-to-send response for one media item.
#[derive(Debug)]
pub struct MediaStream<H> {
    status: StatusCode,
    headers: HeaderMap,
    content_type: HeaderValue,
    body: BoundedRangeReader<H>,
}

impl<H> MediaStream<H> {
    /// 200 for full content, 206 for a partial range.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn content_type(&self) -> &HeaderValue {
        &self.content_type
    }

    pub fn body(&self) -> &BoundedRangeReader<H> {
        &self.body
    }

    pub fn into_body(self) -> BoundedRangeReader<H> {
        self.body
    }
}

impl<H: AsyncRead + Send + 'static> IntoResponse for MediaStream<H> {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::new(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response.headers_mut().insert(header::CONTENT_TYPE, self.content_type);
        response
    }
}
