//! HTTP-level tests for the streaming router.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use media_range::{
    router, Caller, FsStorage, InMemoryMediaRepository, MediaDescriptor, MediaId, PremiumGate,
    RangeResolver, Role, StreamingService,
};

const FILE_SIZE: usize = 2000;

struct TestApp {
    _dir: tempfile::TempDir,
    data: Vec<u8>,
    app: Router,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let data: Vec<u8> = (0..=255u8).cycle().take(FILE_SIZE).collect();
        std::fs::write(dir.path().join("episode.mp3"), &data).unwrap();

        let catalog = Arc::new(InMemoryMediaRepository::new());
        catalog.insert(MediaDescriptor::new(MediaId(1), "Episode", "episode.mp3").with_content_type("audio/mpeg"));
        catalog.insert(MediaDescriptor::new(MediaId(2), "Bonus", "episode.mp3").with_premium(true));
        catalog.insert(MediaDescriptor::new(MediaId(3), "Gone", "gone.mp3"));

        let service = StreamingService::new(
            catalog.clone(),
            PremiumGate::new(catalog),
            FsStorage::new(dir.path()),
            RangeResolver::new(100),
        );

        TestApp { _dir: dir, data, app: router(Arc::new(service)) }
    }

    async fn get(&self, uri: &str, range: Option<&str>, caller: Option<Caller>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }
        let mut request = request.body(Body::empty()).unwrap();
        if let Some(caller) = caller {
            request.extensions_mut().insert(caller);
        }
        self.app.clone().oneshot(request).await.unwrap()
    }
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

fn header_str<'a>(response: &'a Response, name: header::HeaderName) -> Option<&'a str> {
    response.headers().get(name).map(|value| value.to_str().unwrap())
}

#[tokio::test]
async fn full_content_without_range() {
    let app = TestApp::new();
    let response = app.get("/api/audios/1/stream", None, None).await;

    assert_eq!(StatusCode::OK, response.status());
    assert_eq!(Some("bytes"), header_str(&response, header::ACCEPT_RANGES));
    assert_eq!(Some("2000"), header_str(&response, header::CONTENT_LENGTH));
    assert_eq!(Some("audio/mpeg"), header_str(&response, header::CONTENT_TYPE));
    assert_eq!(None, header_str(&response, header::CONTENT_RANGE));
    assert_eq!(app.data, body_bytes(response).await);
}

#[tokio::test]
async fn partial_content() {
    let app = TestApp::new();
    let response = app.get("/api/audios/1/stream", Some("bytes=0-999"), None).await;

    assert_eq!(StatusCode::PARTIAL_CONTENT, response.status());
    assert_eq!(Some("bytes"), header_str(&response, header::ACCEPT_RANGES));
    assert_eq!(Some("1000"), header_str(&response, header::CONTENT_LENGTH));
    assert_eq!(Some("bytes 0-999/2000"), header_str(&response, header::CONTENT_RANGE));
    assert_eq!(&app.data[..1000], &body_bytes(response).await[..]);
}

#[tokio::test]
async fn suffix_and_open_ended_ranges() {
    let app = TestApp::new();

    let response = app.get("/api/audios/1/stream", Some("bytes=-200"), None).await;
    assert_eq!(Some("bytes 1800-1999/2000"), header_str(&response, header::CONTENT_RANGE));
    assert_eq!(&app.data[1800..], &body_bytes(response).await[..]);

    let response = app.get("/api/audios/1/stream", Some("bytes=500-"), None).await;
    assert_eq!(Some("bytes 500-599/2000"), header_str(&response, header::CONTENT_RANGE));
    assert_eq!(Some("100"), header_str(&response, header::CONTENT_LENGTH));
    assert_eq!(&app.data[500..600], &body_bytes(response).await[..]);
}

#[tokio::test]
async fn unknown_unit_is_ignored() {
    let app = TestApp::new();
    let response = app.get("/api/audios/1/stream", Some("items=0-100"), None).await;

    assert_eq!(StatusCode::OK, response.status());
    assert_eq!(FILE_SIZE, body_bytes(response).await.len());
}

#[tokio::test]
async fn unsatisfiable_range() {
    let app = TestApp::new();

    for range in ["bytes=abc-def", "bytes=800-700", "bytes=2000-2100", "bytes=-0", "bytes=--100"] {
        let response = app.get("/api/audios/1/stream", Some(range), None).await;

        assert_eq!(StatusCode::RANGE_NOT_SATISFIABLE, response.status(), "{range}");
        assert_eq!(Some("bytes */2000"), header_str(&response, header::CONTENT_RANGE), "{range}");
        assert!(body_bytes(response).await.is_empty(), "{range}");
    }
}

#[tokio::test]
async fn unknown_media_is_404() {
    let app = TestApp::new();
    let response = app.get("/api/audios/99/stream", None, None).await;

    assert_eq!(StatusCode::NOT_FOUND, response.status());
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!("media not found with id: 99", body["message"]);
}

#[tokio::test]
async fn missing_file_is_500() {
    let app = TestApp::new();
    let response = app.get("/api/audios/3/stream", None, None).await;
    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, response.status());
}

#[tokio::test]
async fn premium_media_needs_premium_caller() {
    let app = TestApp::new();

    let response = app.get("/api/audios/2/stream", None, None).await;
    assert_eq!(StatusCode::UNAUTHORIZED, response.status());

    let listener = Caller::authenticated("ann", [Role::Listener]);
    let response = app.get("/api/audios/2/stream", None, Some(listener)).await;
    assert_eq!(StatusCode::FORBIDDEN, response.status());

    let premium = Caller::authenticated("bob", [Role::Premium]);
    let response = app.get("/api/audios/2/stream", Some("bytes=0-9"), Some(premium)).await;
    assert_eq!(StatusCode::PARTIAL_CONTENT, response.status());
    assert_eq!(&app.data[..10], &body_bytes(response).await[..]);
}

#[tokio::test]
async fn non_numeric_id_is_rejected() {
    let app = TestApp::new();
    let response = app.get("/api/audios/abc/stream", None, None).await;
    assert_eq!(StatusCode::BAD_REQUEST, response.status());
}

#[tokio::test]
async fn range_request_over_tcp() {
    let app = TestApp::new();

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.app.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{addr}/api/audios/1/stream"))
        .header("Range", "bytes=100-199")
        .send()
        .await
        .unwrap();

    assert_eq!(reqwest::StatusCode::PARTIAL_CONTENT, response.status());
    assert_eq!("bytes 100-199/2000", response.headers()["content-range"]);
    let body = response.bytes().await.unwrap();
    assert_eq!(&app.data[100..200], &body[..]);

    server.abort();
}
