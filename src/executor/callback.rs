//! Completion callbacks
//!
//! Notified once per task with the final snapshot. Delivery is
//! best-effort: the orchestrator logs failures and never retries.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::CallbackSettings;
use crate::error::{Error, Result};
use crate::types::TaskCallback;

/// Header carrying the controller API key
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Receiver of task completion notifications
#[async_trait]
pub trait CompletionCallback: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, payload: &TaskCallback) -> Result<()>;
}

// ─────────────────────────────────────────────────────────────────
// HTTP Callback
// ─────────────────────────────────────────────────────────────────

/// POSTs the completion payload as JSON to the controller
pub struct HttpCallback {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpCallback {
    pub fn new(settings: &CallbackSettings) -> Result<Self> {
        if settings.url.is_empty() {
            return Err(Error::config_field_invalid("callback.url", "must not be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: settings.url.clone(),
            api_key: Some(settings.api_key.clone()).filter(|k| !k.is_empty()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CompletionCallback for HttpCallback {
    fn name(&self) -> &str {
        "http"
    }

    async fn notify(&self, payload: &TaskCallback) -> Result<()> {
        let mut request = self.client.post(&self.url).json(payload);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(|e| Error::CallbackDelivery {
            task_id: payload.task_id.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::CallbackDelivery {
                task_id: payload.task_id.clone(),
                message: format!("controller responded with {}", status),
            });
        }

        debug!(task_id = %payload.task_id, url = %self.url, "Callback delivered");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────
// Channel Callback
// ─────────────────────────────────────────────────────────────────

/// Forwards completion payloads into an mpsc channel
pub struct ChannelCallback {
    tx: mpsc::Sender<TaskCallback>,
}

impl ChannelCallback {
    /// Create the callback and the receiving end
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TaskCallback>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl CompletionCallback for ChannelCallback {
    fn name(&self) -> &str {
        "channel"
    }

    async fn notify(&self, payload: &TaskCallback) -> Result<()> {
        self.tx
            .send(payload.clone())
            .await
            .map_err(|_| Error::CallbackDelivery {
                task_id: payload.task_id.clone(),
                message: "receiver dropped".to_string(),
            })
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExecutionResult, TaskStatus};
    use chrono::Utc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn payload() -> TaskCallback {
        TaskCallback {
            task_id: "t1".to_string(),
            status: TaskStatus::Completed,
            results: vec![ExecutionResult::normal(1).with_value("ok")],
            start_time: Utc::now(),
            end_time: Some(Utc::now()),
            error: None,
            has_failures: false,
        }
    }

    /// Accept one request, answer with `status_line`, return the raw request
    async fn serve_once(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/callback", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];

            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);

                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower.strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + length {
                        break;
                    }
                }
            }

            let response = format!("{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status_line);
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });

        (url, handle)
    }

    fn settings(url: String, api_key: &str) -> CallbackSettings {
        CallbackSettings {
            url,
            api_key: api_key.to_string(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_http_callback_posts_json_with_key() {
        let (url, server) = serve_once("HTTP/1.1 200 OK").await;
        let callback = HttpCallback::new(&settings(url, "secret")).unwrap();

        callback.notify(&payload()).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /callback"));
        assert!(request.to_ascii_lowercase().contains("x-api-key: secret"));
        assert!(request.contains("\"task_id\":\"t1\""));
        assert!(request.contains("\"status\":\"completed\""));
    }

    #[tokio::test]
    async fn test_http_callback_without_key() {
        let (url, server) = serve_once("HTTP/1.1 200 OK").await;
        let callback = HttpCallback::new(&settings(url, "")).unwrap();

        callback.notify(&payload()).await.unwrap();

        let request = server.await.unwrap();
        assert!(!request.to_ascii_lowercase().contains("x-api-key"));
    }

    #[tokio::test]
    async fn test_http_callback_non_success_status() {
        let (url, server) = serve_once("HTTP/1.1 500 Internal Server Error").await;
        let callback = HttpCallback::new(&settings(url, "k")).unwrap();

        let err = callback.notify(&payload()).await.unwrap_err();
        assert!(matches!(err, Error::CallbackDelivery { .. }));
        assert!(err.to_string().contains("500"));
        server.await.unwrap();
    }

    #[test]
    fn test_http_callback_requires_url() {
        assert!(HttpCallback::new(&settings(String::new(), "k")).is_err());
    }

    #[tokio::test]
    async fn test_channel_callback() {
        let (callback, mut rx) = ChannelCallback::channel(4);
        callback.notify(&payload()).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.task_id, "t1");

        drop(rx);
        assert!(callback.notify(&payload()).await.is_err());
    }
}
