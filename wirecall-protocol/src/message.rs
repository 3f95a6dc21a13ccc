//! Request and response envelopes.

use crate::compress::CompressKind;
use crate::serialize::SerializeKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status code of a successful call.
pub const CODE_OK: u16 = 200;

/// Status code of a failed call; `message` carries the error text.
pub const CODE_ERROR: u16 = 500;

/// Request envelope: names a service and method, carries positional
/// dynamically typed arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Correlation id, assigned by the client.
    pub request_id: u64,

    /// Registered service name.
    pub service: String,

    /// Method name on the service.
    pub method: String,

    /// Positional arguments, matched by index on the server.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl RpcRequest {
    pub fn new(
        request_id: u64,
        service: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            request_id,
            service: service.into(),
            method: method.into(),
            args,
        }
    }
}

/// Response envelope. Carries the kinds used for its own body so the
/// receiver can report them without re-reading the header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Echoes the request's correlation id.
    pub request_id: u64,

    /// [`CODE_OK`] or [`CODE_ERROR`].
    pub code: u16,

    /// Error text when `code` is not [`CODE_OK`], empty otherwise.
    #[serde(default)]
    pub message: String,

    /// Compression applied to this response body.
    pub compress: CompressKind,

    /// Encoding of this response body.
    pub serialize: SerializeKind,

    /// Call result; absent on errors and void methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcResponse {
    pub fn ok(
        request_id: u64,
        compress: CompressKind,
        serialize: SerializeKind,
        data: Option<Value>,
    ) -> Self {
        Self {
            request_id,
            code: CODE_OK,
            message: String::new(),
            compress,
            serialize,
            data,
        }
    }

    pub fn error(
        request_id: u64,
        compress: CompressKind,
        serialize: SerializeKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            code: CODE_ERROR,
            message: message.into(),
            compress,
            serialize,
            data: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }

    pub fn is_error(&self) -> bool {
        !self.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = RpcRequest::new(42, "goods", "find", vec![json!(1)]);
        let text = serde_json::to_string(&request).unwrap();
        assert!(text.contains(r#""service":"goods""#));
        assert!(text.contains(r#""request_id":42"#));

        let parsed: RpcRequest = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_request_args_default() {
        let parsed: RpcRequest =
            serde_json::from_str(r#"{"request_id":1,"service":"s","method":"m"}"#).unwrap();
        assert!(parsed.args.is_empty());
    }

    #[test]
    fn test_response_ok() {
        let response = RpcResponse::ok(
            1,
            CompressKind::Gzip,
            SerializeKind::MessagePack,
            Some(json!(14)),
        );
        assert!(response.is_ok());
        assert!(!response.is_error());
        assert_eq!(response.code, CODE_OK);
        assert!(response.message.is_empty());
        assert_eq!(response.data, Some(json!(14)));
    }

    #[test]
    fn test_response_error() {
        let response = RpcResponse::error(1, CompressKind::None, SerializeKind::Json, "boom");
        assert!(response.is_error());
        assert_eq!(response.code, CODE_ERROR);
        assert_eq!(response.message, "boom");
        assert!(response.data.is_none());
    }

    #[test]
    fn test_response_omits_absent_data() {
        let response = RpcResponse::ok(1, CompressKind::Gzip, SerializeKind::MessagePack, None);
        let text = serde_json::to_string(&response).unwrap();
        assert!(!text.contains("data"));

        let parsed: RpcResponse = serde_json::from_str(&text).unwrap();
        assert!(parsed.data.is_none());
    }
}
