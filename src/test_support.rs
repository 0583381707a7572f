//! Local HTTP origins for tests that exercise the real client.

use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::RetryPolicy;
use crate::crawler::Downloader;

/// Serve `router` on an ephemeral localhost port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Client without retry delays so failure paths run fast.
pub fn downloader() -> Downloader {
    Downloader::new("chapter-fetch-test", Duration::from_secs(5), RetryPolicy::none()).unwrap()
}
