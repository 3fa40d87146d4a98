//! Response body re-assembly and decoding.
//!
//! Cloud SDKs hand bodies back as a sequence of byte chunks. Instrumentation
//! has to read the whole body to annotate a span, so the chunks are joined
//! once and the caller receives a body holding the same bytes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::{Bytes, BytesMut};
use serde_json::Value;
use tracing::{debug, warn};

/// A response body delivered as ordered byte chunks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamingBody {
    chunks: Vec<Bytes>,
}

impl StreamingBody {
    /// Body made of the given chunks
    pub fn new(chunks: Vec<Bytes>) -> Self {
        Self { chunks }
    }

    /// Body made of a single chunk
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            chunks: vec![bytes.into()],
        }
    }

    /// Chunks in arrival order
    pub fn iter_chunks(&self) -> impl Iterator<Item = &Bytes> {
        self.chunks.iter()
    }

    /// Total length in bytes
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    /// True when no bytes were received
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Join all chunks into one buffer
    pub fn read_all(&self) -> Bytes {
        match self.chunks.as_slice() {
            [] => Bytes::new(),
            [single] => single.clone(),
            chunks => {
                let mut buffer = BytesMut::with_capacity(self.len());
                for chunk in chunks {
                    buffer.extend_from_slice(chunk);
                }
                buffer.freeze()
            }
        }
    }
}

impl From<Bytes> for StreamingBody {
    fn from(bytes: Bytes) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<&'static str> for StreamingBody {
    fn from(body: &'static str) -> Self {
        Self::from_bytes(Bytes::from_static(body.as_bytes()))
    }
}

/// One event of a streamed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadPart {
    /// Raw event payload
    pub bytes: Bytes,
}

impl PayloadPart {
    /// Wrap a payload
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

/// Media types the instrumentation understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    /// `application/json` and `+json` variants
    Json,
    /// `application/xml`, `text/xml`
    Xml,
    /// Anything else
    Other(String),
}

impl ContentType {
    /// Classify an `Accept`/`Content-Type` value; absent means JSON
    pub fn parse(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::Json;
        };
        let essence = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "" | "*/*" | "application/json" => Self::Json,
            "application/xml" | "text/xml" => Self::Xml,
            other if other.ends_with("+json") => Self::Json,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Decode a buffered body according to its content type.
///
/// Only JSON yields a value; XML and unknown types are not annotated.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> Option<Value> {
    match ContentType::parse(content_type) {
        ContentType::Json => match serde_json::from_slice(bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, len = bytes.len(), "Response body is not valid JSON");
                None
            }
        },
        ContentType::Xml => {
            debug!("XML response body is not annotated");
            None
        }
        ContentType::Other(other) => {
            debug!(content_type = %other, "Unsupported response content type");
            None
        }
    }
}

/// Decode one Bedrock stream event.
///
/// Events arrive either as `{"bytes": "<base64 JSON>"}` (optionally nested
/// under `chunk`) or as the JSON chunk itself.
pub fn decode_bedrock_event(payload: &[u8]) -> Option<Value> {
    let value: Value = match serde_json::from_slice(payload) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "Skipping undecodable stream event");
            return None;
        }
    };

    let encoded = value
        .pointer("/chunk/bytes")
        .or_else(|| value.get("bytes"))
        .and_then(Value::as_str);

    let Some(encoded) = encoded else {
        return Some(value);
    };

    let decoded = match STANDARD.decode(encoded) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!(error = %e, "Stream event bytes are not base64");
            return None;
        }
    };
    serde_json::from_slice(&decoded)
        .map_err(|e| debug!(error = %e, "Stream event payload is not JSON"))
        .ok()
}

/// Decode newline-delimited JSON, accepting server-sent-event `data:` lines.
///
/// A body that is one JSON document spread over several lines is returned
/// as that single document.
pub fn decode_json_lines(bytes: &[u8]) -> Vec<Value> {
    if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
        return vec![value];
    }

    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .map(|line| line.strip_prefix("data:").map_or(line, str::trim))
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}
