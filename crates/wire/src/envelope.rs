// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned RPC envelope.
//!
//! Requests and replies are matched by per-link monotonic id. Message
//! bodies are tagged enums (`#[serde(tag = "method", content = "params")]`)
//! so that dispatchers match exhaustively and adding a method is a
//! compile-time obligation. A protocol version mismatch detected on worker
//! reconnect forces an environment destroy.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Version of the envelope and message schemas.
pub const PROTOCOL_VERSION: u32 = 1;

/// Error object carried in reply frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message} (code {code})")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub const PARSE_ERROR: i32 = -32700;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL: i32 = -32603;

    pub fn method_not_found(method: &str) -> Self {
        Self { code: Self::METHOD_NOT_FOUND, message: format!("method_not_found: {method}") }
    }

    pub fn invalid_params(detail: impl std::fmt::Display) -> Self {
        Self { code: Self::INVALID_PARAMS, message: format!("invalid params: {detail}") }
    }

    pub fn internal(detail: impl std::fmt::Display) -> Self {
        Self { code: Self::INTERNAL, message: detail.to_string() }
    }
}

fn protocol_version() -> u32 {
    PROTOCOL_VERSION
}

/// One message on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default = "protocol_version")]
    pub v: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    /// Client-generated request UID on the control channel, echoed in the
    /// reply so clients can detect duplicate delivery after a retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_uid: Option<String>,
}

impl Frame {
    fn empty() -> Self {
        Self {
            v: PROTOCOL_VERSION,
            id: None,
            method: None,
            params: None,
            result: None,
            error: None,
            request_uid: None,
        }
    }

    /// Build a request frame from a tagged message body.
    pub fn request<T: Serialize>(id: u64, body: &T) -> Result<Self, serde_json::Error> {
        let (method, params) = split_body(body)?;
        Ok(Self { id: Some(id), method: Some(method), params, ..Self::empty() })
    }

    /// Build a notification frame (no id, no reply expected).
    pub fn notification<T: Serialize>(body: &T) -> Result<Self, serde_json::Error> {
        let (method, params) = split_body(body)?;
        Ok(Self { method: Some(method), params, ..Self::empty() })
    }

    /// Build a successful reply frame.
    pub fn reply_ok<T: Serialize>(id: u64, result: &T) -> Result<Self, serde_json::Error> {
        Ok(Self { id: Some(id), result: Some(serde_json::to_value(result)?), ..Self::empty() })
    }

    /// Build an error reply frame.
    pub fn reply_err(id: u64, error: RpcError) -> Self {
        Self { id: Some(id), error: Some(error), ..Self::empty() }
    }

    /// Classify the frame for dispatch.
    pub fn kind(self) -> FrameKind {
        match (self.id, self.method, self.result, self.error) {
            (Some(id), Some(method), _, _) => FrameKind::Request {
                id,
                method,
                params: self.params,
                request_uid: self.request_uid,
            },
            (None, Some(method), _, _) => FrameKind::Notification { method, params: self.params },
            (Some(id), None, Some(result), None) => FrameKind::Reply { id, result: Ok(result) },
            (Some(id), None, _, Some(error)) => FrameKind::Reply { id, result: Err(error) },
            _ => FrameKind::Invalid,
        }
    }
}

/// A classified frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    Request { id: u64, method: String, params: Option<Value>, request_uid: Option<String> },
    Notification { method: String, params: Option<Value> },
    Reply { id: u64, result: Result<Value, RpcError> },
    Invalid,
}

/// Split a tagged message body into its method name and params value.
fn split_body<T: Serialize>(body: &T) -> Result<(String, Option<Value>), serde_json::Error> {
    use serde::ser::Error as _;

    match serde_json::to_value(body)? {
        Value::Object(mut map) => {
            let method = match map.remove("method") {
                Some(Value::String(m)) => m,
                _ => return Err(serde_json::Error::custom("message body has no method tag")),
            };
            Ok((method, map.remove("params")))
        }
        _ => Err(serde_json::Error::custom("message body is not a JSON object")),
    }
}

/// Decode an incoming `(method, params)` pair into a typed message body.
///
/// An unknown method maps to `method_not_found` (serde reports an unknown
/// tag as an unknown variant); anything else is `invalid_params`.
pub fn decode_body<T: DeserializeOwned>(
    method: &str,
    params: Option<Value>,
) -> Result<T, RpcError> {
    let mut obj = serde_json::Map::new();
    obj.insert("method".to_string(), Value::String(method.to_string()));
    if let Some(p) = params {
        obj.insert("params".to_string(), p);
    }
    serde_json::from_value(Value::Object(obj)).map_err(|e| {
        if e.to_string().contains("unknown variant") {
            RpcError::method_not_found(method)
        } else {
            RpcError::invalid_params(e)
        }
    })
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
