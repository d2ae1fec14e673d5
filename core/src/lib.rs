//! Declarative HTTP requests over a host-supplied transport.
//!
//! # Overview
//! Requests are described as data (`RequestSpec`) or per endpoint (the
//! `Request` trait). The `Client` turns them into `WireRequest`s, hands those
//! to the host's `Transport`, classifies what comes back, and delivers the
//! outcome exactly once through a `Deferred`.
//!
//! # Design
//! - The core performs no I/O and spawns no threads (host-does-IO pattern).
//! - URL, query, and body construction are pure functions in `request`.
//! - `Deferred` replays its outcome to late subscribers.
//! - Results are delivered on a `CallbackQueue`, inline by default or on a
//!   host-drained `MainQueue`.
//! - Uploads expose progress as a finite `ProgressStream`.

pub mod client;
pub mod config;
pub mod deferred;
pub mod error;
pub mod http;
pub mod multipart;
pub mod queue;
pub mod request;
pub mod response;
pub mod transport;

pub use client::{classify, Call, Client};
pub use config::{AppIdentity, NetworkConfig};
pub use deferred::Deferred;
pub use error::{NetworkError, RequestError};
pub use http::{HttpMethod, Payload, Progress, RawResponse, WireRequest};
pub use multipart::{MultipartBody, MultipartEncoder, MultipartField};
pub use queue::{CallbackQueue, Immediate, MainQueue};
pub use request::{
    build_body, build_query_string, build_url, BodyMode, Endpoint, ParamValue, Parameters,
    Request, RequestSpec,
};
pub use response::{FromJson, Json};
pub use transport::{CompletionHandler, ProgressHandler, ProgressStream, Transport};
