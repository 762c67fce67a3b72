//! Offer exchange against a live mock relay
//!
//! Exercises the full publish/terminate flow, including the retry loop,
//! with an axum server standing in for the WHIP/WHEP relay.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, post};
use axum::Router;

use livecast_signaling::{Error, RetryPolicy, SessionKind, SignalingClient, SignalingConfig};

const OFFER: &str = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n";
const ANSWER: &str = "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    addr
}

fn fast_retry_config(addr: SocketAddr) -> SignalingConfig {
    let mut config = SignalingConfig::new(&format!("http://{}", addr));
    // Keep the test quick; the real delay sequence is covered by the
    // policy's own unit tests.
    config.retry = RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 10,
        max_delay_ms: 50,
    };
    config
}

#[tokio::test]
async fn publish_captures_answer_and_location() {
    let router = Router::new().route(
        "/whip",
        post(|body: String| async move {
            assert!(body.starts_with("v=0"));
            (
                StatusCode::CREATED,
                [(header::LOCATION, "/session/abc123")],
                ANSWER,
            )
        }),
    );
    let addr = serve(router).await;

    let client = SignalingClient::new(fast_retry_config(addr)).unwrap();
    let session = client
        .publish(SessionKind::Whip, OFFER)
        .await
        .expect("publish");

    assert_eq!(session.answer_sdp, ANSWER);
    assert_eq!(
        session.resource_url.as_deref(),
        Some(format!("http://{}/session/abc123", addr).as_str())
    );
}

#[tokio::test]
async fn publish_retries_after_503() {
    init_tracing();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    let router = Router::new().route(
        "/whep",
        post(move |_body: String| {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    StatusCode::SERVICE_UNAVAILABLE.into_response()
                } else {
                    (
                        StatusCode::CREATED,
                        [(header::LOCATION, "/session/v1")],
                        ANSWER,
                    )
                        .into_response()
                }
            }
        }),
    );
    let addr = serve(router).await;

    let client = SignalingClient::new(fast_retry_config(addr)).unwrap();
    let session = client
        .publish(SessionKind::Whep, OFFER)
        .await
        .expect("second attempt should succeed");

    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(session.kind, SessionKind::Whep);
    assert_eq!(session.answer_sdp, ANSWER);
}

#[tokio::test]
async fn publish_gives_up_after_budget() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    let router = Router::new().route(
        "/whip",
        post(move |_body: String| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }),
    );
    let addr = serve(router).await;

    let client = SignalingClient::new(fast_retry_config(addr)).unwrap();
    let err = client
        .publish(SessionKind::Whip, OFFER)
        .await
        .expect_err("all attempts fail");

    assert_eq!(hits.load(Ordering::SeqCst), 3);
    match err {
        Error::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, Error::Http { status: 500 }));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn terminate_deletes_the_resource() {
    let deleted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&deleted);

    let router = Router::new()
        .route(
            "/whip",
            post(|| async {
                (
                    StatusCode::CREATED,
                    [(header::LOCATION, "/session/gone")],
                    ANSWER,
                )
            }),
        )
        .route(
            "/session/gone",
            delete(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::OK
                }
            }),
        );
    let addr = serve(router).await;

    let client = SignalingClient::new(fast_retry_config(addr)).unwrap();
    let session = client
        .publish(SessionKind::Whip, OFFER)
        .await
        .expect("publish");

    client.terminate(&session).await.expect("terminate");
    assert_eq!(deleted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_location_is_tolerated() {
    let router = Router::new().route("/whip", post(|| async { (StatusCode::OK, ANSWER) }));
    let addr = serve(router).await;

    let client = SignalingClient::new(fast_retry_config(addr)).unwrap();
    let session = client
        .publish(SessionKind::Whip, OFFER)
        .await
        .expect("publish");

    assert!(session.resource_url.is_none());
    // Terminating a session without a resource URL is a quiet no-op.
    client.terminate(&session).await.expect("terminate");
}
