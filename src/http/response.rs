//! HTTP response with a peekable body
//!
//! A body starts out as a byte stream. It can be buffered once for
//! inspection with [`Response::buffer`], after which readers get a fresh
//! view over exactly the bytes the server sent.

use crate::error::{BoxError, Error, Result};
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, Stream, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{StatusCode, Version};
use serde::de::DeserializeOwned;
use url::Url;

enum Body {
    Streaming(BoxStream<'static, std::result::Result<Bytes, BoxError>>),
    Buffered(Bytes),
    /// Reading stopped part way; `received` is everything that arrived
    Truncated { received: Bytes, message: String },
}

/// Response produced by a [`Transport`](super::Transport)
pub struct Response {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    url: Url,
    body: Body,
}

impl Response {
    /// Create a response with an in-memory body
    pub fn new(status: StatusCode, url: Url, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            url,
            body: Body::Buffered(body.into()),
        }
    }

    /// Create a response whose body is read lazily from a stream
    pub fn streaming<S, E>(status: StatusCode, url: Url, stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        Self {
            status,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            url,
            body: Body::Streaming(stream.map_err(Into::into).boxed()),
        }
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Status code
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// HTTP version
    pub fn version(&self) -> Version {
        self.version
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable response headers
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Final URL of the exchange
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether the body has been read into memory
    pub fn is_buffered(&self) -> bool {
        matches!(self.body, Body::Buffered(_))
    }

    /// Bytes received before a body read failed, if it did
    pub fn partial_body(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Truncated { received, .. } => Some(received),
            _ => None,
        }
    }

    /// Buffer the whole body and borrow it without consuming the response.
    ///
    /// Draining happens at most once. If the stream fails, the body is
    /// marked truncated and every later read reports [`Error::BodyRead`].
    pub async fn buffer(&mut self) -> Result<&Bytes> {
        if let Body::Streaming(stream) = &mut self.body {
            let mut buf = BytesMut::new();
            let mut failure = None;
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(chunk) => buf.extend_from_slice(&chunk),
                    Err(e) => {
                        failure = Some(e.to_string());
                        break;
                    }
                }
            }
            self.body = match failure {
                None => Body::Buffered(buf.freeze()),
                Some(message) => Body::Truncated {
                    received: buf.freeze(),
                    message,
                },
            };
        }

        match &self.body {
            Body::Buffered(bytes) => Ok(bytes),
            Body::Truncated { received, message } => Err(Error::BodyRead {
                received: received.len(),
                message: message.clone(),
            }),
            Body::Streaming(_) => Err(Error::BodyRead {
                received: 0,
                message: "body stream was not drained".to_string(),
            }),
        }
    }

    /// Read the full body
    pub async fn bytes(mut self) -> Result<Bytes> {
        self.buffer().await.cloned()
    }

    /// Read the body as text, replacing invalid UTF-8
    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the body as JSON
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl From<reqwest::Response> for Response {
    fn from(response: reqwest::Response) -> Self {
        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();
        let url = response.url().clone();

        Self {
            status,
            version,
            headers,
            url,
            body: Body::Streaming(response.bytes_stream().map_err(Into::into).boxed()),
        }
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = match &self.body {
            Body::Streaming(_) => "streaming",
            Body::Buffered(_) => "buffered",
            Body::Truncated { .. } => "truncated",
        };
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("url", &self.url.as_str())
            .field("body", &body)
            .finish_non_exhaustive()
    }
}
