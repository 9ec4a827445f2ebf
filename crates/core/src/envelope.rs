//! Uniform response envelope.
//!
//! Every handler returns an [`ApiResponse`]. Structured responses serialize
//! to `{"code": .., "data": .., "message": .., "total": .., "exts": ..}`;
//! business failures keep HTTP 200 and report through `code`. Raising
//! `status_code` to 300 or above switches the response to the raw `body`
//! field verbatim. Streaming and file variants bypass JSON entirely and are
//! emitted by the transport layer.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_stream::Stream;

use crate::error::{ApiError, ApiResult, codes};

/// Boxed chunk producer for streaming responses.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send + Sync + 'static>>;

/// How the response body is produced.
pub enum ResponseKind {
    /// Structured envelope (or raw `body` when `status_code` ≥ 300).
    Json,
    /// Chunked body from a producer stream.
    Stream {
        producer: ByteStream,
        content_type: String,
    },
    /// Small file read into memory and sent whole.
    File {
        path: PathBuf,
        content_type: Option<String>,
        filename: Option<String>,
    },
    /// Large file streamed from disk.
    FileStream {
        path: PathBuf,
        content_type: Option<String>,
        filename: Option<String>,
    },
}

impl fmt::Debug for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "Json"),
            Self::Stream { content_type, .. } => {
                f.debug_struct("Stream").field("content_type", content_type).finish_non_exhaustive()
            }
            Self::File { path, .. } => f.debug_struct("File").field("path", path).finish_non_exhaustive(),
            Self::FileStream { path, .. } => {
                f.debug_struct("FileStream").field("path", path).finish_non_exhaustive()
            }
        }
    }
}

/// Standard API response wrapper.
#[derive(Debug)]
pub struct ApiResponse {
    /// Business status code; `0` means success.
    pub code: u32,
    /// JSON payload. Must have a JSON mapping; an explicit JSON `null` is a
    /// serialization error (omit the field instead).
    pub data: Option<Value>,
    /// Human-readable message.
    pub message: Option<String>,
    /// Total count for paginated responses.
    pub total: Option<u64>,
    /// Extra custom fields.
    pub exts: Option<Value>,
    /// Whether the enclosing transaction should roll back (error responses).
    pub rollback: bool,
    /// Extra HTTP headers.
    pub headers: Vec<(String, String)>,
    /// Transport status. 300 and above switches to the raw `body` field.
    pub status_code: u16,
    /// Raw body, emitted verbatim when `status_code` ≥ 300.
    pub body: Option<String>,
    pub kind: ResponseKind,
}

impl ApiResponse {
    fn base() -> Self {
        Self {
            code: codes::SUCCESS,
            data: None,
            message: None,
            total: None,
            exts: None,
            rollback: true,
            headers: Vec::new(),
            status_code: 200,
            body: None,
            kind: ResponseKind::Json,
        }
    }

    /// Empty success envelope (`{"code": 0}`).
    pub fn ok() -> Self {
        Self::base()
    }

    /// Successful envelope carrying `data`.
    ///
    /// Fails if `data` has no JSON mapping. Serializing to JSON `null`
    /// (e.g. `None`) omits the field, matching an empty success.
    pub fn success<T: Serialize>(data: T) -> ApiResult<Self> {
        let value = serde_json::to_value(data).map_err(|e| ApiError::serialization(e.to_string()))?;
        let mut resp = Self::base();
        if !value.is_null() {
            resp.data = Some(value);
        }
        Ok(resp)
    }

    /// Business error envelope. Transport status stays 200; the failure is
    /// reported through `code`.
    pub fn error(code: u32, message: impl Into<String>) -> Self {
        let mut resp = Self::base();
        resp.code = code;
        resp.message = Some(message.into());
        resp
    }

    /// Raw response: `body` is emitted verbatim with the given status.
    /// Only meaningful for statuses ≥ 300.
    pub fn raw(status_code: u16, body: impl Into<String>) -> Self {
        let mut resp = Self::base();
        resp.status_code = status_code;
        resp.body = Some(body.into());
        resp
    }

    /// Streaming response from a chunk producer.
    pub fn stream(producer: ByteStream, content_type: impl Into<String>) -> Self {
        let mut resp = Self::base();
        resp.kind = ResponseKind::Stream {
            producer,
            content_type: content_type.into(),
        };
        resp
    }

    /// Small file response, read whole and sent in one piece.
    pub fn file(path: impl Into<PathBuf>) -> ApiResult<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(ApiError::internal("file response requires a path"));
        }
        let mut resp = Self::base();
        resp.kind = ResponseKind::File {
            path,
            content_type: None,
            filename: None,
        };
        Ok(resp)
    }

    /// Large file response, streamed from disk in chunks.
    pub fn file_stream(path: impl Into<PathBuf>) -> ApiResult<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(ApiError::internal("file response requires a path"));
        }
        let mut resp = Self::base();
        resp.kind = ResponseKind::FileStream {
            path,
            content_type: None,
            filename: None,
        };
        Ok(resp)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    pub fn with_exts(mut self, exts: Value) -> Self {
        self.exts = Some(exts);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_rollback(mut self, rollback: bool) -> Self {
        self.rollback = rollback;
        self
    }

    /// Content type for the file/stream variants. No effect on `Json`.
    pub fn with_content_type(mut self, ct: impl Into<String>) -> Self {
        match &mut self.kind {
            ResponseKind::Stream { content_type, .. } => *content_type = ct.into(),
            ResponseKind::File { content_type, .. } | ResponseKind::FileStream { content_type, .. } => {
                *content_type = Some(ct.into())
            }
            ResponseKind::Json => {}
        }
        self
    }

    /// Download filename for the file variants. No effect otherwise.
    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        match &mut self.kind {
            ResponseKind::File { filename, .. } | ResponseKind::FileStream { filename, .. } => {
                *filename = Some(name.into())
            }
            _ => {}
        }
        self
    }

    /// Whether this response bypasses the structured envelope.
    pub fn is_raw(&self) -> bool {
        self.status_code >= 300
    }

    /// Serialize the structured envelope.
    ///
    /// Raw (`status_code` ≥ 300) and streaming/file responses have no JSON
    /// form; the transport layer emits those directly.
    pub fn to_json(&self) -> ApiResult<Value> {
        if self.is_raw() {
            return Err(ApiError::serialization("raw response has no structured JSON form"));
        }
        if !matches!(self.kind, ResponseKind::Json) {
            return Err(ApiError::serialization("streaming response has no structured JSON form"));
        }

        let mut out = Map::new();
        out.insert("code".into(), Value::from(self.code));
        if let Some(message) = &self.message {
            out.insert("message".into(), Value::from(message.clone()));
        }
        match &self.data {
            Some(Value::Null) => {
                return Err(ApiError::serialization("envelope data has no JSON mapping"));
            }
            Some(value) => {
                out.insert("data".into(), value.clone());
            }
            None => {}
        }
        if let Some(total) = self.total {
            out.insert("total".into(), Value::from(total));
        }
        if let Some(exts) = &self.exts {
            out.insert("exts".into(), exts.clone());
        }
        Ok(Value::Object(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_with_total_serializes_flat() {
        let resp = ApiResponse::success(vec![1, 2, 3]).unwrap().with_total(3);
        let value = resp.to_json().unwrap();
        assert_eq!(value, json!({"code": 0, "data": [1, 2, 3], "total": 3}));
        assert_eq!(value.to_string(), r#"{"code":0,"data":[1,2,3],"total":3}"#);
    }

    #[test]
    fn empty_success_is_bare_code() {
        let value = ApiResponse::ok().to_json().unwrap();
        assert_eq!(value, json!({"code": 0}));
    }

    #[test]
    fn none_data_is_omitted() {
        let resp = ApiResponse::success(None::<i32>).unwrap();
        assert!(resp.data.is_none());
    }

    #[test]
    fn unmappable_data_is_a_serialization_error() {
        // Maps keyed by non-strings have no JSON mapping.
        let mut bad = std::collections::HashMap::new();
        bad.insert((1u8, 2u8), "x");
        let err = ApiResponse::success(bad).unwrap_err();
        assert!(matches!(err, ApiError::Serialization(_)));
    }

    #[test]
    fn explicit_null_data_is_rejected_at_serialization() {
        let mut resp = ApiResponse::ok();
        resp.data = Some(Value::Null);
        let err = resp.to_json().unwrap_err();
        assert!(matches!(err, ApiError::Serialization(_)));
    }

    #[test]
    fn error_envelope_keeps_code_and_message() {
        let resp = ApiResponse::error(codes::API_ERROR, "boom");
        let value = resp.to_json().unwrap();
        assert_eq!(value, json!({"code": 9, "message": "boom"}));
        assert_eq!(resp.status_code, 200);
    }

    #[test]
    fn raw_response_has_no_structured_form() {
        let resp = ApiResponse::raw(302, "moved");
        assert!(resp.is_raw());
        assert!(resp.to_json().is_err());
        assert_eq!(resp.body.as_deref(), Some("moved"));
    }

    #[test]
    fn exts_and_message_round_trip() {
        let resp = ApiResponse::success("payload")
            .unwrap()
            .with_message("done")
            .with_exts(json!({"trace": "abc"}));
        let value = resp.to_json().unwrap();
        assert_eq!(
            value,
            json!({"code": 0, "data": "payload", "message": "done", "exts": {"trace": "abc"}})
        );
    }

    #[test]
    fn file_requires_a_path() {
        assert!(ApiResponse::file("").is_err());
        assert!(ApiResponse::file_stream("").is_err());
        assert!(ApiResponse::file("/tmp/report.csv").is_ok());
    }
}
