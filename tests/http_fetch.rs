//! Website fetches against a loopback server.

use std::time::Duration;

use axum::http::{header, StatusCode};
use axum::{routing::get, Router};
use tokio::net::TcpListener;

use seedwatch::error::ProbeError;
use seedwatch::probes::{NetworkProber, Prober};

// "café Example" in ISO-8859-1: 12 bytes on the wire, 13 once decoded to UTF-8.
const LATIN1_BODY: &[u8] = b"caf\xe9 Example";

async fn site_server() -> String {
    let app = Router::new()
        .route(
            "/latin1",
            get(|| async { ([(header::CONTENT_TYPE, "text/html; charset=iso-8859-1")], LATIN1_BODY.to_vec()) }),
        )
        .route(
            "/broken",
            get(|| async {
                (
                    StatusCode::BAD_GATEWAY,
                    [(header::CONTENT_TYPE, "text/html; charset=iso-8859-1")],
                    LATIN1_BODY.to_vec(),
                )
            }),
        );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn prober() -> NetworkProber {
    NetworkProber::new(Duration::from_secs(5), None).unwrap()
}

#[tokio::test]
async fn content_size_counts_raw_bytes() {
    let base = site_server().await;
    let page = prober().fetch(&format!("{base}/latin1")).await.unwrap();
    assert_eq!(page.http_code, 200);
    assert_eq!(page.content_size, LATIN1_BODY.len());
    assert!(page.body.contains("Example"));
}

#[tokio::test]
async fn non_success_status_reports_raw_size() {
    let base = site_server().await;
    match prober().fetch(&format!("{base}/broken")).await {
        Err(ProbeError::Status { code, content_size }) => {
            assert_eq!(code, 502);
            assert_eq!(content_size, LATIN1_BODY.len());
        }
        other => panic!("expected status error, got {other:?}"),
    }
}
