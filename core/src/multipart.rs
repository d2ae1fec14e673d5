//! `multipart/form-data` body encoding for single-file uploads.
//!
//! # Design
//! A `MultipartEncoder` owns one boundary token. The same token appears in
//! every section of the body and in the `Content-Type` header, so the encoder
//! that produced a body is also the source of its header value; the two
//! travel together as a `MultipartBody`.
//!
//! Each section is encoded separately. Header-bound values that would break
//! the part headers (CR, LF, or a double quote) make their section fail, and
//! a failed section empties the whole body. An empty body is never a valid
//! upload; the client refuses to dispatch it.

use uuid::Uuid;

const CRLF: &str = "\r\n";

/// One file part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartField {
    pub field_name: String,
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl MultipartField {
    /// A field with the default `image/jpeg` mime type.
    pub fn new(field_name: impl Into<String>, filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            field_name: field_name.into(),
            filename: filename.into(),
            mime_type: "image/jpeg".to_string(),
            data,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }
}

/// Encodes fields against a fixed boundary.
#[derive(Debug, Clone)]
pub struct MultipartEncoder {
    boundary: String,
}

impl Default for MultipartEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartEncoder {
    /// Encoder with a fresh random boundary.
    pub fn new() -> Self {
        Self {
            boundary: format!("------------{}", Uuid::new_v4()),
        }
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Body bytes for `field`, or an empty vector if any section failed.
    pub fn encode(&self, field: &MultipartField) -> Vec<u8> {
        self.try_encode(field).unwrap_or_default()
    }

    /// Encode `field` and pair it with this encoder's boundary.
    pub fn body(&self, field: &MultipartField) -> MultipartBody {
        MultipartBody {
            boundary: self.boundary.clone(),
            bytes: self.encode(field),
        }
    }

    fn try_encode(&self, field: &MultipartField) -> Option<Vec<u8>> {
        let opening = self.initial_boundary()?;
        let disposition = disposition(&field.field_name, &field.filename)?;
        let mime = mime(&field.mime_type)?;
        let closing = self.final_boundary()?;

        let mut body = Vec::with_capacity(
            opening.len() + disposition.len() + mime.len() + field.data.len() + CRLF.len() + closing.len(),
        );
        body.extend_from_slice(opening.as_bytes());
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(mime.as_bytes());
        body.extend_from_slice(&field.data);
        body.extend_from_slice(CRLF.as_bytes());
        body.extend_from_slice(closing.as_bytes());
        Some(body)
    }

    fn initial_boundary(&self) -> Option<String> {
        header_safe(&self.boundary)?;
        Some(format!("--{}{CRLF}", self.boundary))
    }

    fn final_boundary(&self) -> Option<String> {
        header_safe(&self.boundary)?;
        Some(format!("{CRLF}--{}--{CRLF}", self.boundary))
    }
}

fn disposition(field_name: &str, filename: &str) -> Option<String> {
    header_safe(field_name)?;
    header_safe(filename)?;
    Some(format!(
        "Content-Disposition: form-data; name=\"{field_name}\"; filename=\"{filename}\"{CRLF}"
    ))
}

fn mime(mime_type: &str) -> Option<String> {
    header_safe(mime_type)?;
    Some(format!("Content-Type: {mime_type}{CRLF}{CRLF}"))
}

fn header_safe(value: &str) -> Option<()> {
    if value.contains(&['\r', '\n', '"'][..]) {
        None
    } else {
        Some(())
    }
}

/// An encoded body and the boundary it was encoded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartBody {
    boundary: String,
    bytes: Vec<u8>,
}

impl MultipartBody {
    /// Encode `field` with a fresh boundary.
    pub fn from_field(field: &MultipartField) -> Self {
        MultipartEncoder::new().body(field)
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when encoding failed.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
