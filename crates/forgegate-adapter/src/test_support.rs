//! Throwaway HTTP servers standing in for GitHub and GitLab.

use axum::Router;
use tokio::net::TcpListener;

use crate::{UpstreamClient, UpstreamOptions};

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_upstream(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test upstream");
    let addr = listener.local_addr().expect("test upstream address");
    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("test upstream server");
    });
    format!("http://{addr}")
}

pub fn client() -> UpstreamClient {
    UpstreamClient::new(&UpstreamOptions::default()).expect("upstream client")
}
