//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe requests and responses as plain data. The core builds
//! a `WireRequest`, the host's `Transport` performs the exchange, and hands
//! back a `RawResponse` holding whatever it got: maybe bytes, maybe a status,
//! maybe a transport error message. Classification of that triple is the
//! core's job, not the host's.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether parameters travel in the query string rather than the body.
    pub fn uses_query(self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Delete)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a method token outside GET/POST/PUT/DELETE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "delete" => Ok(HttpMethod::Delete),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// A fully built request, ready for the transport.
///
/// Header names are kept in a sorted map so the request renders the same way
/// every time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
    /// Passed through to the transport; the core does not enforce it.
    pub timeout: Duration,
}

impl WireRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// What the transport observed, handed back verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    /// `None` when no HTTP response was received.
    pub status: Option<u16>,
    pub body: Option<Vec<u8>>,
    /// Transport-level failure description.
    pub error: Option<String>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: Some(status),
            body: Some(body.into()),
            error: None,
        }
    }

    /// A response for an exchange that failed before any HTTP response.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: None,
            body: None,
            error: Some(message.into()),
        }
    }
}

/// A successfully classified response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Text(String),
}

impl Payload {
    /// The payload as JSON; text becomes a JSON string.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Payload::Json(value) => value,
            Payload::Text(text) => serde_json::Value::String(text),
        }
    }
}

/// Upload progress snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub bytes_sent: u64,
    pub total_bytes: u64,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.bytes_sent as f64 / self.total_bytes as f64
    }
}
