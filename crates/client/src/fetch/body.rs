//! Requests, responses and single-read bodies.
//!
//! A network body can be drained exactly once. `Body::bytes` takes `self`, so
//! the compiler rejects a second read. Code that needs to both hand a response
//! to the caller and persist it must call [`Response::tee`] first.

use bytes::{Bytes, BytesMut};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use url::Url;

use pwa_relay_core::{Error, RequestKey, Snapshot};

/// An intercepted outbound request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new() }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Cache identity of this request.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method.as_str(), self.url.as_str())
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }
}

enum Inner {
    Buffered(Bytes),
    Streaming(reqwest::Response),
}

/// A response body that can be read once.
pub struct Body {
    inner: Inner,
}

impl Body {
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self { inner: Inner::Buffered(bytes.into()) }
    }

    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    pub(crate) fn streaming(response: reqwest::Response) -> Self {
        Self { inner: Inner::Streaming(response) }
    }

    /// Body length when known up front.
    fn len_hint(&self) -> Option<u64> {
        match &self.inner {
            Inner::Buffered(bytes) => Some(bytes.len() as u64),
            Inner::Streaming(response) => response.content_length(),
        }
    }

    /// Drain the body.
    pub async fn bytes(self) -> Result<Bytes, Error> {
        match self.inner {
            Inner::Buffered(bytes) => Ok(bytes),
            Inner::Streaming(mut response) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = response
                    .chunk()
                    .await
                    .map_err(|e| Error::Body(format!("failed to read response: {e}")))?
                {
                    buf.extend_from_slice(&chunk);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Inner::Buffered(bytes) => f.debug_tuple("Body::Buffered").field(&bytes.len()).finish(),
            Inner::Streaming(_) => f.write_str("Body::Streaming"),
        }
    }
}

/// A response returned to the page, from the network or from the cache.
#[derive(Debug)]
pub struct Response {
    /// URL the response came from (after redirects).
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub from_cache: bool,
    body: Body,
}

impl Response {
    pub fn new(url: Url, status: StatusCode, headers: HeaderMap, body: Body) -> Self {
        Self { url, status, headers, from_cache: false, body }
    }

    /// Rebuild a response from a stored snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, Error> {
        let url = Url::parse(&snapshot.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let status = StatusCode::from_u16(snapshot.status)
            .map_err(|e| Error::InvalidInput(format!("stored status {}: {e}", snapshot.status)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &snapshot.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::debug!(header = %name, "dropping unrepresentable stored header"),
            }
        }

        Ok(Self { url, status, headers, from_cache: true, body: Body::from_bytes(snapshot.body) })
    }

    pub fn content_type(&self) -> Option<String> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    /// Whether this response may be written to the cache store.
    ///
    /// Any 2xx except partial content.
    pub fn is_storable(&self) -> bool {
        self.status.is_success() && self.status != StatusCode::PARTIAL_CONTENT
    }

    /// Body length when known without reading it.
    pub fn len_hint(&self) -> Option<u64> {
        self.body.len_hint()
    }

    /// Drain the body.
    pub async fn bytes(self) -> Result<Bytes, Error> {
        self.body.bytes().await
    }

    pub async fn text(self) -> Result<String, Error> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Split into two independently readable responses.
    ///
    /// The body is drained once, whatever its size; both halves share the
    /// buffered bytes.
    pub async fn tee(self) -> Result<(Response, Response), Error> {
        let Response { url, status, headers, from_cache, body } = self;
        let bytes = body.bytes().await?;
        let copy = Response {
            url: url.clone(),
            status,
            headers: headers.clone(),
            from_cache,
            body: Body::from_bytes(bytes.clone()),
        };
        Ok((Response { url, status, headers, from_cache, body: Body::from_bytes(bytes) }, copy))
    }

    /// Drain into a snapshot for the cache store.
    pub async fn into_snapshot(self) -> Result<Snapshot, Error> {
        let content_type = self.content_type();
        let headers = self
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();
        let url = self.url.to_string();
        let status = self.status.as_u16();
        let body = self.body.bytes().await?;

        Ok(Snapshot {
            url,
            status,
            headers,
            content_type,
            body: body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}
