use std::{sync::OnceLock, time::Duration};

use reqwest::Client;

/// Common HTTP client to re-use as much as possible the same connections.
/// Per-request timeouts are set at the call sites; embeddings and rerank use
/// 30 seconds, chat and TTS 60.
pub(crate) fn http_client() -> reqwest::Client {
    static CLIENT: OnceLock<Client> = OnceLock::new();

    CLIENT
        .get_or_init(|| {
            let mut headers = http::HeaderMap::new();
            headers.insert(http::header::CONNECTION, http::HeaderValue::from_static("keep-alive"));

            Client::builder()
                .timeout(Duration::from_secs(60))
                // The pool has no connection TTL, so a long-lived idle
                // connection can pin a stale DNS record for an upstream
                // that moved. A 5 second idle timeout recycles quiet
                // connections fast enough to pick up the change while the
                // busy ones still get reused.
                .pool_idle_timeout(Some(Duration::from_secs(5)))
                .tcp_nodelay(true)
                .tcp_keepalive(Some(Duration::from_secs(60)))
                .default_headers(headers)
                .build()
                .expect("Failed to build default HTTP client")
        })
        .clone()
}
