mod service;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::Html,
    routing::get,
    Router,
};

use crate::links::{BackendCsv, LinkStore};
use crate::metadata::{FetchError, PageFetcher};

pub const ARTICLE_HTML: &str = r#"<!doctype html>
<html>
<head>
  <title>Fallback &amp; title</title>
  <meta content="Rust &quot;in&quot; production" property="og:title">
  <meta name="description" content="Plain description">
  <meta property="og:description" content="OG description">
  <meta property="og:image" content="/img/a.png">
  <meta property="og:site_name" content="Example Blog">
  <link rel="shortcut icon" href="/favicon.ico">
</head>
<body><p>hello</p></body>
</html>"#;

/// Fetcher that counts calls and answers with canned html or a status error
#[derive(Clone)]
pub struct StubFetcher {
    pub calls: Arc<AtomicUsize>,
    response: Result<String, u16>,
}

impl StubFetcher {
    pub fn html(html: &str) -> Self {
        Self {
            calls: Arc::default(),
            response: Ok(html.to_string()),
        }
    }

    pub fn status(code: u16) -> Self {
        Self {
            calls: Arc::default(),
            response: Err(code),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PageFetcher for StubFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            Ok(html) => Ok(html.clone()),
            Err(code) => Err(FetchError::Status(*code)),
        }
    }
}

pub fn fresh_store() -> (Arc<dyn LinkStore>, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let store = BackendCsv::load(tmp.path().join("links.csv")).expect("failed to load store");
    (Arc::new(store), tmp)
}

/// Serve `router` on an ephemeral local port and return its base url
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// A small site: a tagged article, a broken page, a page that never
/// answers in time and one that echoes request headers in its title
pub fn pages() -> Router {
    Router::new()
        .route("/article", get(|| async { Html(ARTICLE_HTML) }))
        .route("/echo", get(echo_headers))
        .route(
            "/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Html(ARTICLE_HTML)
            }),
        )
}

async fn echo_headers(headers: HeaderMap) -> Html<String> {
    let value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none")
            .to_string()
    };
    Html(format!(
        "<html><head><title>{} | {}</title></head><body></body></html>",
        value(header::USER_AGENT),
        value(header::ACCEPT)
    ))
}
