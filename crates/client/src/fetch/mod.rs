//! HTTP fetch pipeline.
//!
//! ### Network seam
//! - [`Network`] is the only way routing and lifecycle code reach the network.
//! - [`FetchClient`] is the reqwest-backed implementation.
//!
//! ### Semantics
//! - Non-2xx statuses are responses, not errors. Only transport failures
//!   (DNS, connect, reset, timeout) surface as `Error::Network`.
//! - Bodies are streamed and read at most once. Reading is never capped here;
//!   the cache store decides what is too large to keep.
//! - Max redirects: 5

pub mod body;
pub mod url;

use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};

pub use body::{Body, Request, Response};
pub use url::{UrlError, resolve};

use pwa_relay_core::{AppConfig, Error};

/// Anything that can perform a fetch.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "pwa-relay/0.1")
    pub user_agent: String,

    /// Request timeout (default: none)
    pub timeout: Option<Duration>,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "pwa-relay/0.1".to_string(), timeout: None, max_redirects: 5 }
    }
}

impl FetchConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed network access.
pub struct FetchClient {
    http: Client,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: &FetchConfig) -> Result<Self, Error> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Network(format!("timed out: {}", request.url))
                } else {
                    Error::Network(format!("network error: {}", e))
                }
            })?;

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        tracing::debug!(
            "fetched {} {} -> {} {} in {}ms",
            request.method,
            request.url,
            final_url,
            status.as_u16(),
            start.elapsed().as_millis()
        );

        Ok(Response::new(final_url, status, headers, Body::streaming(response)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "pwa-relay/0.1");
        assert_eq!(config.timeout, None);
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "gochat/2".into(), timeout_ms: Some(1500), ..Default::default() };
        let config = FetchConfig::from_app_config(&app);
        assert_eq!(config.user_agent, "gochat/2");
        assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.max_redirects, 5);
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let client = FetchClient::new(&FetchConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_unreachable_is_network_error() {
        let client = FetchClient::new(&FetchConfig { timeout: Some(Duration::from_secs(2)), ..Default::default() })
            .unwrap();
        let request = Request::get(::url::Url::parse("http://127.0.0.1:9/").unwrap());
        let result = client.fetch(&request).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    /// Serve one canned HTTP/1.1 response on a local port.
    async fn serve_once(content_type: &'static str, body: Vec<u8>) -> ::url::Url {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await.unwrap();
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        ::url::Url::parse(&format!("http://{addr}/media/call.mp4")).unwrap()
    }

    #[tokio::test]
    async fn test_large_body_is_read_in_full() {
        let size = 6 * 1024 * 1024;
        let url = serve_once("video/mp4", vec![7u8; size]).await;
        let client = FetchClient::new(&FetchConfig::default()).unwrap();

        let response = client.fetch(&Request::get(url)).await.unwrap();
        assert_eq!(response.content_type().as_deref(), Some("video/mp4"));
        assert_eq!(response.bytes().await.unwrap().len(), size);
    }
}
