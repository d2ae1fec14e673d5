//! Error types for the courier client.
//!
//! # Design
//! `NetworkError` is what callers see on a `Deferred`'s failure channel. It is
//! deliberately coarse: UI layers mostly need to know whether a message can be
//! shown verbatim (`has_readable_message`). `RequestError` covers failures of
//! the pure request-building helpers; the client folds those into
//! `NetworkError::Invalid` before anything is dispatched.

use thiserror::Error;

/// Failures delivered through a `Deferred`'s failure channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// No usable response was received.
    #[error("Invalid Error")]
    Invalid,

    /// The server answered with an error status.
    #[error("Server Error {0}")]
    ServerStatus(u16),

    /// A 2xx response whose body could not be decoded into the expected type.
    #[error("Parsing Error")]
    Parsing,

    /// Reserved for caller-initiated abandonment; never raised by the client.
    #[error("User Abandoned Request Error")]
    UserAbandoned,

    /// Transport-level failure carrying the transport's message.
    #[error("{0}")]
    Custom(String),
}

impl NetworkError {
    /// Error for a response that carried no decodable body.
    ///
    /// `None` means no HTTP response arrived at all.
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            None => NetworkError::Invalid,
            Some(code) if (200..=299).contains(&code) => NetworkError::Parsing,
            Some(code) => NetworkError::ServerStatus(code),
        }
    }

    /// `Custom(message)` when the transport reported one, `Invalid` otherwise.
    pub fn from_transport(message: Option<&str>) -> Self {
        match message {
            Some(msg) => NetworkError::Custom(msg.to_string()),
            None => NetworkError::Invalid,
        }
    }

    /// Whether the description is fit to show to an end user as-is.
    pub fn has_readable_message(&self) -> bool {
        matches!(self, NetworkError::Custom(_) | NetworkError::UserAbandoned)
    }

    pub fn failure_reason(&self) -> String {
        self.to_string()
    }

    pub fn recovery_suggestion(&self) -> String {
        self.to_string()
    }
}

/// Failures while turning a request description into a wire request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The endpoint string is not of the form `"METHOD /path"`.
    #[error("malformed endpoint: {0:?}")]
    MalformedEndpoint(String),

    /// The path holds characters that are only valid percent-encoded.
    #[error("path needs percent-encoding: {0:?}")]
    UnencodedPath(String),

    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Multipart mode was requested but the encoded body is empty.
    #[error("multipart body is empty")]
    EmptyMultipart,
}

impl From<RequestError> for NetworkError {
    fn from(_: RequestError) -> Self {
        NetworkError::Invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptions() {
        assert_eq!(NetworkError::Invalid.to_string(), "Invalid Error");
        assert_eq!(NetworkError::ServerStatus(503).to_string(), "Server Error 503");
        assert_eq!(NetworkError::Parsing.to_string(), "Parsing Error");
        assert_eq!(
            NetworkError::UserAbandoned.to_string(),
            "User Abandoned Request Error"
        );
        assert_eq!(NetworkError::Custom("offline".into()).to_string(), "offline");
    }

    #[test]
    fn readable_message_only_for_custom_and_abandoned() {
        assert!(NetworkError::Custom("x".into()).has_readable_message());
        assert!(NetworkError::UserAbandoned.has_readable_message());
        assert!(!NetworkError::Invalid.has_readable_message());
        assert!(!NetworkError::ServerStatus(500).has_readable_message());
        assert!(!NetworkError::Parsing.has_readable_message());
    }

    #[test]
    fn from_status_maps_ranges() {
        assert_eq!(NetworkError::from_status(None), NetworkError::Invalid);
        assert_eq!(NetworkError::from_status(Some(200)), NetworkError::Parsing);
        assert_eq!(NetworkError::from_status(Some(299)), NetworkError::Parsing);
        assert_eq!(
            NetworkError::from_status(Some(404)),
            NetworkError::ServerStatus(404)
        );
    }

    #[test]
    fn request_errors_collapse_to_invalid() {
        let err: NetworkError = RequestError::MalformedEndpoint("BAD".into()).into();
        assert_eq!(err, NetworkError::Invalid);
        assert_eq!(err.failure_reason(), "Invalid Error");
    }
}
