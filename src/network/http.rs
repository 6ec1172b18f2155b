use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::pool::WorkerPool;

const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// Sends JSON bodies and hands back the raw response text.
#[derive(Clone)]
pub struct JsonPoster {
    client: reqwest::Client,
}

impl JsonPoster {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::from_client(client))
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// POSTs `body` as JSON with the extra `headers`.
    ///
    /// Non-success statuses are errors carrying the response text.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: &T,
    ) -> Result<String> {
        let payload = serde_json::to_vec(body)
            .context("Failed to serialize request body")?;

        let mut request = self.client.post(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        info!("📡 POST {}", url);

        let response = request
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(payload)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {url}"))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            anyhow::bail!("POST {} failed with status {}: {}", url, status, text);
        }

        debug!("Response from {}: {} bytes", url, text.len());
        Ok(text)
    }

    /// POSTs the same `body` to every url, no more than the pool admits at once.
    ///
    /// Results come back in `urls` order; one failure does not stop the rest.
    pub async fn post_json_each(
        &self,
        pool: &WorkerPool,
        urls: &[String],
        headers: &HashMap<String, String>,
        body: &serde_json::Value,
    ) -> Vec<Result<String>> {
        let headers = Arc::new(headers.clone());
        let body = Arc::new(body.clone());
        let mut handles = Vec::with_capacity(urls.len());

        for url in urls {
            let permit = pool.acquire().await;
            let poster = self.clone();
            let headers = Arc::clone(&headers);
            let body = Arc::clone(&body);
            let url = url.clone();

            handles.push(tokio::spawn(async move {
                let result = poster.post_json(&url, &headers, body.as_ref()).await;
                drop(permit);
                result
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(
                handle
                    .await
                    .unwrap_or_else(|e| Err(anyhow::anyhow!("POST task failed: {e}"))),
            );
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one request with `status` and `body`, returning what it received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/submit", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];

            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                if request_complete(&received) {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            String::from_utf8_lossy(&received).into_owned()
        });

        (url, handle)
    }

    fn poster() -> JsonPoster {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        JsonPoster::from_client(client)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    #[tokio::test]
    async fn posts_json_with_headers() {
        let (url, server) = serve_once("200 OK", "{\"ok\":true}").await;
        let poster = poster();

        let mut headers = HashMap::new();
        headers.insert("X-Token".to_string(), "abc".to_string());

        let text = poster
            .post_json(&url, &headers, &json!({"name": "haviwa"}))
            .await
            .unwrap();
        assert_eq!(text, "{\"ok\":true}");

        let request = server.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /submit HTTP/1.1"));
        assert!(lower.contains("content-type: application/json;charset=utf-8"));
        assert!(lower.contains("x-token: abc"));
        assert!(request.ends_with("{\"name\":\"haviwa\"}"));
    }

    #[tokio::test]
    async fn posts_to_each_url_in_order() {
        let (ok_url, ok_server) = serve_once("200 OK", "first").await;
        let (bad_url, bad_server) = serve_once("503 Service Unavailable", "busy").await;
        let (last_url, last_server) = serve_once("200 OK", "last").await;
        let urls = vec![ok_url, bad_url, last_url];

        let pool = WorkerPool::new(1, urls.len());
        let results = poster()
            .post_json_each(&pool, &urls, &HashMap::new(), &json!({"n": 1}))
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), "first");
        assert!(results[1].as_ref().unwrap_err().to_string().contains("503"));
        assert_eq!(results[2].as_ref().unwrap(), "last");
        assert_eq!(pool.remaining(), 0);

        for server in [ok_server, bad_server, last_server] {
            assert!(server.await.unwrap().ends_with("{\"n\":1}"));
        }
    }

    #[tokio::test]
    async fn error_status_is_an_error() {
        let (url, server) = serve_once("500 Internal Server Error", "down").await;
        let poster = poster();

        let err = poster
            .post_json(&url, &HashMap::new(), &json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("down"));
        server.await.unwrap();
    }
}
