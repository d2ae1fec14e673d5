//! Request orchestration: wire building, dispatch, and response
//! classification.
//!
//! # Design
//! `Client` holds the injected `NetworkConfig`, the host's `Transport`, and a
//! default `CallbackQueue`. A call goes `build → dispatch → classify →
//! settle`: the pure helpers in `request` produce a `WireRequest`, the
//! transport performs the exchange, `classify` turns the `RawResponse` into a
//! `Payload` or a `NetworkError`, and the settlement is posted to the queue.
//! Nothing is retried and nothing is thrown; every outcome arrives on the
//! returned `Deferred`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::config::NetworkConfig;
use crate::deferred::Deferred;
use crate::error::{NetworkError, RequestError};
use crate::http::{HttpMethod, Payload, Progress, RawResponse, WireRequest};
use crate::queue::{CallbackQueue, Immediate};
use crate::request::{build_body, build_url, BodyMode, Request, RequestSpec};
use crate::response::FromJson;
use crate::transport::{ProgressSender, ProgressStream, Transport};

const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";

/// An in-flight request: its eventual result and its upload progress.
#[derive(Debug)]
pub struct Call {
    pub result: Deferred<Payload>,
    /// Empty for requests without a multipart payload.
    pub progress: ProgressStream,
}

/// A wire request plus the payload to stream when it is an upload.
struct Prepared {
    request: WireRequest,
    upload: Option<Vec<u8>>,
}

/// Executes requests against the host's transport.
#[derive(Clone)]
pub struct Client {
    config: Arc<NetworkConfig>,
    transport: Arc<dyn Transport>,
    queue: Arc<dyn CallbackQueue>,
}

impl Client {
    /// A client that settles results on the transport's completion thread.
    pub fn new(config: NetworkConfig, transport: impl Transport + 'static) -> Self {
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
            queue: Arc::new(Immediate),
        }
    }

    /// Deliver results on `queue` unless a call says otherwise.
    pub fn with_queue(mut self, queue: impl CallbackQueue + 'static) -> Self {
        self.queue = Arc::new(queue);
        self
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// The request `spec` would put on the wire. For multipart requests the
    /// body is unset; the payload is streamed separately.
    pub fn build_wire_request(&self, spec: &RequestSpec) -> Result<WireRequest, RequestError> {
        self.prepare(spec).map(|prepared| prepared.request)
    }

    fn prepare(&self, spec: &RequestSpec) -> Result<Prepared, RequestError> {
        let url = build_url(&self.config, spec)?;
        let method = spec.method();
        let multipart = spec.multipart_payload()?;

        let mut headers = BTreeMap::new();
        set_header(&mut headers, "User-Agent", self.config.user_agent());
        for (name, value) in &spec.headers {
            set_header(&mut headers, name, value);
        }

        let content_type = match (method, multipart) {
            (HttpMethod::Get, _) => JSON.to_string(),
            (_, Some(body)) => body.content_type(),
            _ if spec.body_mode == BodyMode::Json => JSON.to_string(),
            _ => FORM.to_string(),
        };
        set_header(&mut headers, "Content-Type", &content_type);

        let (body, upload) = match multipart {
            Some(payload) => {
                set_header(&mut headers, "Content-Length", &payload.len().to_string());
                (None, Some(payload.bytes().to_vec()))
            }
            None => (build_body(spec)?, None),
        };

        Ok(Prepared {
            request: WireRequest {
                method,
                url,
                headers,
                body,
                timeout: self.config.timeout(),
            },
            upload,
        })
    }

    /// Dispatch `spec`, settling on the client's default queue.
    pub fn send(&self, spec: &RequestSpec) -> Call {
        self.send_on(spec, Arc::clone(&self.queue))
    }

    /// Dispatch `spec`, settling on `queue`.
    ///
    /// A request that cannot be built is rejected with `Invalid` before this
    /// returns, without touching the transport or the queue.
    pub fn send_on(&self, spec: &RequestSpec, queue: Arc<dyn CallbackQueue>) -> Call {
        let result = Deferred::new();
        let Prepared { request, upload } = match self.prepare(spec) {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!(endpoint = %spec.endpoint, error = %err, "request not dispatched");
                result.reject(err.into());
                return Call {
                    result,
                    progress: ProgressStream::finished(),
                };
            }
        };

        if cfg!(debug_assertions) {
            debug!("{}", curl_command(&request, upload.is_some()));
        }

        let method = request.method;
        let settle = {
            let result = result.clone();
            move |outcome: Result<Payload, NetworkError>| {
                queue.dispatch(Box::new(move || match outcome {
                    Ok(payload) => result.fulfill(payload),
                    Err(err) => result.reject(err),
                }));
            }
        };

        match upload {
            Some(payload) => {
                let (progress_tx, progress) = ProgressSender::channel();
                let on_progress = {
                    let progress_tx = progress_tx.clone();
                    Box::new(move |snapshot: Progress| {
                        trace!(
                            sent = snapshot.bytes_sent,
                            total = snapshot.total_bytes,
                            "upload progress"
                        );
                        progress_tx.send(snapshot);
                    })
                };
                let on_complete = Box::new(move |raw: RawResponse| {
                    progress_tx.close();
                    settle(classify_upload(method, &raw));
                });
                debug!(%method, url = %request.url, bytes = payload.len(), "dispatching upload");
                self.transport.upload(request, payload, on_progress, on_complete);
                Call { result, progress }
            }
            None => {
                debug!(%method, url = %request.url, "dispatching request");
                self.transport.send(
                    request,
                    Box::new(move |raw: RawResponse| settle(classify(method, &raw))),
                );
                Call {
                    result,
                    progress: ProgressStream::finished(),
                }
            }
        }
    }

    /// Dispatch `spec` and keep only the result.
    pub fn execute_spec(&self, spec: &RequestSpec) -> Deferred<Payload> {
        self.send(spec).result
    }

    /// Dispatch `request` and decode its payload into `R::Response`.
    ///
    /// A payload the response type does not accept rejects with `Parsing`.
    pub fn execute<R: Request>(&self, request: &R) -> Deferred<R::Response> {
        decode(self.execute_spec(&request.to_spec()))
    }
}

/// Chain a typed `Deferred` onto a raw one.
fn decode<T: FromJson + Send + Sync + 'static>(raw: Deferred<Payload>) -> Deferred<T> {
    let typed = Deferred::new();
    let fulfilled = typed.clone();
    let rejected = typed.clone();
    raw.then(move |payload: &Payload| {
        let json = payload.clone().into_json();
        match T::from_json(&json) {
            Some(response) => fulfilled.fulfill(response),
            None => fulfilled.reject(NetworkError::Parsing),
        }
    })
    .catch(move |err| rejected.reject(err.clone()));
    typed
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").field("config", &self.config).finish_non_exhaustive()
    }
}

/// Insert a header, replacing any existing one that differs only in case.
fn set_header(headers: &mut BTreeMap<String, String>, name: &str, value: &str) {
    headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value.to_string());
}

/// Classify what the transport saw into a payload or an error.
///
/// A JSON document only counts when it is an object or array and an HTTP
/// status came with it. Otherwise a UTF-8 body is text: empty text
/// succeeds for DELETE and anything else is a status-derived error. With no
/// usable body the transport's message, if any, becomes the error.
pub fn classify(method: HttpMethod, raw: &RawResponse) -> Result<Payload, NetworkError> {
    let body = raw.body.as_deref();

    if let (Some(bytes), Some(status)) = (body, raw.status) {
        if let Some(json) = parse_document(bytes) {
            return match status {
                400 => Err(NetworkError::ServerStatus(400)),
                200..=299 => Ok(Payload::Json(json)),
                _ => Err(NetworkError::from_transport(raw.error.as_deref())),
            };
        }
    }

    match body.map(std::str::from_utf8) {
        Some(Ok(text)) if text.is_empty() && method == HttpMethod::Delete => {
            Ok(Payload::Text(String::new()))
        }
        Some(Ok(_)) => Err(NetworkError::from_status(raw.status)),
        _ => Err(NetworkError::from_transport(raw.error.as_deref())),
    }
}

/// Like [`classify`], except that a transport failure with no HTTP response
/// always surfaces the transport's message.
pub fn classify_upload(method: HttpMethod, raw: &RawResponse) -> Result<Payload, NetworkError> {
    match (raw.status, &raw.error) {
        (None, Some(message)) => Err(NetworkError::Custom(message.clone())),
        _ => classify(method, raw),
    }
}

fn parse_document(bytes: &[u8]) -> Option<Value> {
    match serde_json::from_slice(bytes) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

/// A shell command reproducing `request`, for diagnostics.
pub fn curl_command(request: &WireRequest, is_upload: bool) -> String {
    let mut command = format!("curl -X {}", request.method);
    for (name, value) in &request.headers {
        command.push_str(&format!(" -H {}", shell_quote(&format!("{name}: {value}"))));
    }
    if let Some(text) = request.body.as_deref().and_then(|b| std::str::from_utf8(b).ok()) {
        command.push_str(&format!(" -d {}", shell_quote(text)));
    }
    if is_upload {
        command.push_str(" --data-binary @-");
    }
    command.push_str(&format!(" {}", shell_quote(request.url.as_str())));
    command
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
