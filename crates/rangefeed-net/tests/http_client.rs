use std::time::Duration;

use axum::{
    Router,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, head},
};
use bytes::Bytes;
use rstest::*;
use tokio::net::TcpListener;
use url::Url;

use rangefeed_net::{Headers, HttpClient, NetError, NetOptions, RangeSpec};

// ============================================================================
// Test server infrastructure
// ============================================================================

struct TestServer {
    base_url: Url,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    async fn new(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let server = axum::serve(listener, router).with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        });

        tokio::spawn(async move {
            server.await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(100)).await;

        Self {
            base_url: Url::parse(&format!("http://{}", addr)).unwrap(),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    fn url(&self, path: &str) -> Url {
        self.base_url.join(path).unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

// ============================================================================
// Test endpoints
// ============================================================================

const MEDIA: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

async fn media_endpoint() -> &'static [u8] {
    MEDIA
}

async fn media_head_endpoint() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_LENGTH, MEDIA.len().into());
    headers.insert(header::CONTENT_TYPE, "video/mp4".parse().unwrap());
    (headers, ())
}

async fn no_length_head_endpoint() -> impl IntoResponse {
    // Chunked-style response with no usable content-length.
    let mut headers = HeaderMap::new();
    headers.insert(header::TRANSFER_ENCODING, "chunked".parse().unwrap());
    (headers, ())
}

async fn range_endpoint(headers: HeaderMap) -> impl IntoResponse {
    if let Some(range_header) = headers.get(header::RANGE) {
        let range_str = range_header.to_str().unwrap();
        if let Some(range) = range_str.strip_prefix("bytes=") {
            let parts: Vec<&str> = range.split('-').collect();
            if parts.len() == 2 {
                let start_result = parts[0].parse::<u64>();
                let end_result = if parts[1].is_empty() {
                    Ok(None)
                } else {
                    parts[1].parse::<u64>().map(Some)
                };

                if let (Ok(start), Ok(end_opt)) = (start_result, end_result) {
                    let end = end_opt.unwrap_or((MEDIA.len() - 1) as u64);

                    if start <= end && end < MEDIA.len() as u64 {
                        let slice = &MEDIA[start as usize..=end as usize];
                        let mut response_headers = HeaderMap::new();
                        response_headers.insert(
                            header::CONTENT_RANGE,
                            format!("bytes {}-{}/{}", start, end, MEDIA.len())
                                .parse()
                                .unwrap(),
                        );
                        response_headers.insert(header::CONTENT_LENGTH, slice.len().into());
                        return (
                            StatusCode::PARTIAL_CONTENT,
                            response_headers,
                            slice.to_vec(),
                        );
                    }
                }
            }
        }
    }
    (StatusCode::BAD_REQUEST, HeaderMap::new(), Vec::<u8>::new())
}

async fn ignore_range_endpoint() -> &'static [u8] {
    MEDIA
}

async fn error_404_endpoint() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}

async fn error_500_endpoint() -> impl IntoResponse {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn slow_endpoint() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(2)).await;
    "Should timeout"
}

async fn headers_endpoint(headers: HeaderMap) -> impl IntoResponse {
    let mut response_headers = HeaderMap::new();

    if let Some(custom_header) = headers.get("X-Custom-Header") {
        response_headers.insert("X-Received-Header", custom_header.clone());
    }

    (response_headers, "Headers received")
}

// ============================================================================
// Fixtures
// ============================================================================

#[fixture]
fn test_router() -> Router {
    Router::new()
        .route("/media.mp4", get(media_endpoint).head(media_head_endpoint))
        .route("/no-length", head(no_length_head_endpoint))
        .route("/range", get(range_endpoint))
        .route("/ignore-range", get(ignore_range_endpoint))
        .route("/headers", get(headers_endpoint))
        .route("/error404", get(error_404_endpoint))
        .route("/error500", get(error_500_endpoint))
        .route("/slow", get(slow_endpoint))
}

#[fixture]
async fn test_server(test_router: Router) -> TestServer {
    TestServer::new(test_router).await
}

#[fixture]
fn http_client() -> HttpClient {
    HttpClient::new(NetOptions::default())
}

// ============================================================================
// Tests
// ============================================================================

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_get_bytes_full_body(#[future] test_server: TestServer, http_client: HttpClient) {
    let test_server = test_server.await;
    let url = test_server.url("/media.mp4");

    let result = http_client.get_bytes(url, None).await;

    assert!(result.is_ok());
    assert_eq!(result.unwrap(), Bytes::from_static(MEDIA));
}

#[rstest]
#[case(0, Some(9), b"0123456789".as_slice())]
#[case(10, Some(15), b"abcdef".as_slice())]
#[case(30, None, b"uvwxyz".as_slice())]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_get_range_success_cases(
    #[future] test_server: TestServer,
    http_client: HttpClient,
    #[case] start: u64,
    #[case] end: Option<u64>,
    #[case] expected_data: &[u8],
) {
    let test_server = test_server.await;
    let url = test_server.url("/range");

    let range = RangeSpec::new(start, end);
    let result = http_client.get_range(url, range, None).await;

    assert!(result.is_ok());
    assert_eq!(result.unwrap(), expected_data);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_head_exposes_content_length(
    #[future] test_server: TestServer,
    http_client: HttpClient,
) {
    let test_server = test_server.await;
    let url = test_server.url("/media.mp4");

    let result = http_client.head(url, None).await;

    assert!(result.is_ok());
    let headers = result.unwrap();
    assert_eq!(headers.get("content-length"), Some("36"));
    assert_eq!(headers.get("content-type"), Some("video/mp4"));
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_head_without_content_length(
    #[future] test_server: TestServer,
    http_client: HttpClient,
) {
    let test_server = test_server.await;
    let url = test_server.url("/no-length");

    let result = http_client.head(url, None).await;

    assert!(result.is_ok());
    let headers = result.unwrap();
    assert_eq!(headers.get("content-length"), None);
}

#[rstest]
#[case("/error404", 404)]
#[case("/error500", 500)]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_http_status_errors(
    #[future] test_server: TestServer,
    http_client: HttpClient,
    #[case] path: &str,
    #[case] expected_status: u16,
) {
    let test_server = test_server.await;
    let url = test_server.url(path);

    let result = http_client.get_bytes(url, None).await;

    assert!(result.is_err());
    let error = result.err().unwrap();
    assert_eq!(error.status_code(), Some(expected_status));
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_request_timeout(#[future] test_server: TestServer) {
    let test_server = test_server.await;
    let url = test_server.url("/slow");

    let client = HttpClient::new(NetOptions {
        request_timeout: Duration::from_millis(200),
        ..NetOptions::default()
    });

    let result = client.get_bytes(url, None).await;

    assert!(result.is_err());
    let error = result.err().unwrap();
    assert!(
        error.is_timeout(),
        "Expected timeout error, got {:?}",
        error
    );
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_custom_headers_are_sent(#[future] test_server: TestServer, http_client: HttpClient) {
    let test_server = test_server.await;
    let url = test_server.url("/headers");

    let mut headers = Headers::new();
    headers.insert("X-Custom-Header", "test-value");

    let result = http_client.get_bytes(url, Some(headers)).await;

    assert!(result.is_ok());
    assert_eq!(result.unwrap(), Bytes::from("Headers received"));
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_range_on_non_range_supporting_server(
    #[future] test_server: TestServer,
    http_client: HttpClient,
) {
    let test_server = test_server.await;
    let url = test_server.url("/ignore-range");

    // A 200 with the full body is still a whole-request success; the
    // transport does not reassemble or validate partial responses.
    let range = RangeSpec::new(0, Some(5));
    let result = http_client.get_range(url, range, None).await;

    assert!(result.is_ok());
    assert_eq!(result.unwrap(), Bytes::from_static(MEDIA));
}

#[rstest]
#[timeout(Duration::from_secs(2))]
#[tokio::test]
async fn test_connection_failure() {
    // Non-routable IP; expect a quick connection error or timeout.
    let url = Url::parse("http://192.0.2.1:9999/invalid").unwrap();

    let client = HttpClient::new(NetOptions {
        request_timeout: Duration::from_millis(100),
        ..NetOptions::default()
    });

    let result = client.get_bytes(url, None).await;

    assert!(result.is_err(), "Should fail for unreachable host");
    let error = result.err().unwrap();
    let is_acceptable_error = match &error {
        NetError::Timeout => true,
        NetError::Http(msg) => {
            msg.contains("connect") || msg.contains("failed") || msg.contains("error")
        }
        _ => false,
    };

    assert!(
        is_acceptable_error,
        "Expected timeout or connection error, got {:?}",
        error
    );
}
