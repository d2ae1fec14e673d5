//! Declarative request descriptions and the pure transforms that turn them
//! into URLs and bodies.
//!
//! # Design
//! An endpoint is written the way it reads in API docs, `"GET /api/v1/x/"`.
//! `RequestSpec` is the data form of a request; the `Request` trait is the
//! per-endpoint form, with an associated response type and defaults for
//! everything but the endpoint. All functions here are pure: they touch
//! neither the network nor the client.

use std::collections::BTreeMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::ser::{Serialize, SerializeMap, Serializer};
use url::Url;

use crate::client::Client;
use crate::config::NetworkConfig;
use crate::deferred::Deferred;
use crate::error::RequestError;
use crate::http::HttpMethod;
use crate::multipart::MultipartBody;
use crate::response::FromJson;

/// Characters left literal in query values: the URL query set minus the
/// general and sub delimiters `: # [ ] @ ! $ & ' ( ) * + , ; =`.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/')
    .remove(b'?');

/// Method token and path parsed from `"METHOD /path"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: String,
    pub path: String,
}

impl Endpoint {
    /// Split on single spaces; exactly two tokens are required.
    pub fn parse(endpoint: &str) -> Result<Self, RequestError> {
        let mut tokens = endpoint.split(' ');
        match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(method), Some(path), None) => Ok(Self {
                method: method.to_string(),
                path: path.to_string(),
            }),
            _ => Err(RequestError::MalformedEndpoint(endpoint.to_string())),
        }
    }

    /// The parsed method, GET when the token is not a known method.
    pub fn http_method(&self) -> HttpMethod {
        self.method.parse().unwrap_or_default()
    }
}

/// A parameter value: one string or a list rendered as repeated keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    List(Vec<String>),
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamValue::Single(value) => serializer.serialize_str(value),
            ParamValue::List(values) => values.serialize(serializer),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Single(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        ParamValue::List(values)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(values: Vec<&str>) -> Self {
        ParamValue::List(values.into_iter().map(str::to_string).collect())
    }
}

/// Parameters in insertion order, one value per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    entries: Vec<(String, ParamValue)>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an existing value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

impl Serialize for Parameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// How POST/PUT parameters are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyMode {
    #[default]
    FormUrlEncoded,
    Json,
    Multipart,
}

/// Transport-agnostic description of one HTTP call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub endpoint: String,
    pub parameters: Parameters,
    pub headers: BTreeMap<String, String>,
    pub body_mode: BodyMode,
    pub multipart: Option<MultipartBody>,
}

impl RequestSpec {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            parameters: Parameters::new(),
            headers: BTreeMap::new(),
            body_mode: BodyMode::default(),
            multipart: None,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key, value);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body_mode(mut self, mode: BodyMode) -> Self {
        self.body_mode = mode;
        self
    }

    /// Attach a multipart payload; switches the body mode to multipart.
    pub fn multipart(mut self, body: MultipartBody) -> Self {
        self.body_mode = BodyMode::Multipart;
        self.multipart = Some(body);
        self
    }

    pub fn parse_endpoint(&self) -> Result<Endpoint, RequestError> {
        Endpoint::parse(&self.endpoint)
    }

    /// The request method, GET if the endpoint cannot be parsed.
    pub fn method(&self) -> HttpMethod {
        self.parse_endpoint()
            .map(|endpoint| endpoint.http_method())
            .unwrap_or_default()
    }

    /// The multipart payload to upload, if this is a multipart request.
    ///
    /// An empty payload, or multipart mode without one, is an encoding
    /// failure rather than an empty upload.
    pub fn multipart_payload(&self) -> Result<Option<&MultipartBody>, RequestError> {
        match (&self.multipart, self.body_mode) {
            (Some(body), _) if body.is_empty() => Err(RequestError::EmptyMultipart),
            (Some(body), _) => Ok(Some(body)),
            (None, BodyMode::Multipart) => Err(RequestError::EmptyMultipart),
            (None, _) => Ok(None),
        }
    }
}

/// Percent-encode a query or form value.
pub fn escape(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

/// `key=value` pairs joined by `&`, one pair per list element.
pub fn build_query_string(parameters: &Parameters) -> String {
    let mut pairs = Vec::new();
    for (key, value) in parameters.iter() {
        match value {
            ParamValue::Single(value) => pairs.push(format!("{key}={}", escape(value))),
            ParamValue::List(values) => {
                pairs.extend(values.iter().map(|value| format!("{key}={}", escape(value))));
            }
        }
    }
    pairs.join("&")
}

/// Characters `Url::parse` would silently percent-encode in a path.
fn is_unencoded_path_char(c: char) -> bool {
    c.is_whitespace() || c.is_control() || "\"<>\\^`{|}".contains(c)
}

/// `base_url + path`, plus the query string for GET/DELETE with parameters.
///
/// Paths are taken as written: one that is not already a valid URL path is
/// an error rather than being re-encoded.
pub fn build_url(config: &NetworkConfig, spec: &RequestSpec) -> Result<Url, RequestError> {
    let endpoint = spec.parse_endpoint()?;
    if endpoint.path.contains(is_unencoded_path_char) {
        return Err(RequestError::UnencodedPath(endpoint.path));
    }
    let mut full = format!("{}{}", config.base_url(), endpoint.path);
    if endpoint.http_method().uses_query() && !spec.parameters.is_empty() {
        full.push('?');
        full.push_str(&build_query_string(&spec.parameters));
    }
    Url::parse(&full).map_err(|source| RequestError::InvalidUrl { url: full, source })
}

/// Body bytes for POST/PUT; `None` for GET/DELETE.
pub fn build_body(spec: &RequestSpec) -> Result<Option<Vec<u8>>, RequestError> {
    if spec.method().uses_query() {
        return Ok(None);
    }
    let body = match spec.body_mode {
        BodyMode::FormUrlEncoded => build_query_string(&spec.parameters).into_bytes(),
        BodyMode::Json => serde_json::to_vec(&spec.parameters)?,
        BodyMode::Multipart => spec
            .multipart_payload()?
            .map(|body| body.bytes().to_vec())
            .ok_or(RequestError::EmptyMultipart)?,
    };
    Ok(Some(body))
}

/// A single API endpoint and the type its successful response decodes into.
///
/// ```ignore
/// struct ProductDetail { id: String }
///
/// impl Request for ProductDetail {
///     type Response = Json<Product>;
///
///     fn endpoint(&self) -> String {
///         format!("GET /api/v1/products/{}/", self.id)
///     }
/// }
///
/// ProductDetail { id: "1111".into() }
///     .execute(&client)
///     .then(|product| println!("{}", product.0.title))
///     .catch(|err| eprintln!("{err}"));
/// ```
pub trait Request {
    type Response: FromJson + Send + Sync + 'static;

    /// `"METHOD /path"`.
    fn endpoint(&self) -> String;

    fn parameters(&self) -> Parameters {
        Parameters::new()
    }

    /// Extra headers, layered over the client defaults.
    fn headers(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn body_mode(&self) -> BodyMode {
        BodyMode::FormUrlEncoded
    }

    fn multipart(&self) -> Option<MultipartBody> {
        None
    }

    fn to_spec(&self) -> RequestSpec {
        let spec = RequestSpec {
            endpoint: self.endpoint(),
            parameters: self.parameters(),
            headers: self.headers(),
            body_mode: self.body_mode(),
            multipart: None,
        };
        match self.multipart() {
            Some(body) => spec.multipart(body),
            None => spec,
        }
    }

    /// Dispatch through `client`; the result settles exactly once.
    fn execute(&self, client: &Client) -> Deferred<Self::Response>
    where
        Self: Sized,
    {
        client.execute(self)
    }
}
