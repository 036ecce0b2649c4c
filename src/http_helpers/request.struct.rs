use std::fmt;
use std::sync::Mutex;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use rustc_hash::FxHashMap;

use super::{Body, Headers};
use crate::error::BodyError;

/// Immutable request value handed to middleware and the terminal handler.
///
/// The body is a one-shot slot: the first read consumes it, later reads fail
/// with [`BodyError::AlreadyConsumed`]. The slot uses interior mutability so
/// the request can be shared through the chain behind an `Arc`.
pub struct Request {
    method: String,
    uri: String,
    headers: Headers,
    body: Mutex<Option<Body>>,
}

impl Request {
    pub fn new(method: &str, uri: &str) -> Self {
        Self {
            method: method.to_string(),
            uri: uri.to_string(),
            headers: Headers::new(),
            body: Mutex::new(Some(Body::Empty)),
        }
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(self, body: Body) -> Self {
        *self.lock_body() = Some(body);
        self
    }

    /// Same request pointed at a different URI. Used when a data sub-request
    /// is rewritten to its canonical page path.
    pub fn with_uri(mut self, uri: &str) -> Self {
        self.uri = uri.to_string();
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Full request target: path plus optional query string.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Path portion of the URI.
    pub fn path(&self) -> &str {
        self.uri.split('?').next().unwrap_or(&self.uri)
    }

    /// Query string without the leading `?`, if present.
    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }

    /// Query string decoded into a map. Later keys win on duplicates.
    pub fn query_params(&self) -> FxHashMap<String, String> {
        let Some(query) = self.query() else {
            return FxHashMap::default();
        };
        serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .unwrap_or_default()
            .into_iter()
            .collect()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// First value of a header, if any.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Whether the body slot has already been taken.
    pub fn body_used(&self) -> bool {
        self.lock_body().is_none()
    }

    /// Take the raw body out of the one-shot slot.
    pub fn take_body(&self) -> Result<Body, BodyError> {
        self.lock_body().take().ok_or(BodyError::AlreadyConsumed)
    }

    /// Buffer the whole body. Consumes the one-shot slot.
    pub async fn bytes(&self) -> Result<Bytes, BodyError> {
        match self.take_body()? {
            Body::Empty => Ok(Bytes::new()),
            Body::Text(text) => Ok(Bytes::from(text)),
            Body::Json(json) => serde_json::to_vec(&json)
                .map(Bytes::from)
                .map_err(|error| BodyError::Read(Box::new(error))),
            Body::Bytes(bytes) => Ok(bytes),
            Body::Stream(mut stream) => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buffer.extend_from_slice(&chunk.map_err(BodyError::Read)?);
                }
                Ok(buffer.freeze())
            }
        }
    }

    /// Buffer the body and decode it as UTF-8 text.
    pub async fn text(&self) -> Result<String, BodyError> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|error| BodyError::Read(Box::new(error)))
    }

    fn lock_body(&self) -> std::sync::MutexGuard<'_, Option<Body>> {
        self.body
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .field("body_used", &self.body_used())
            .finish()
    }
}
