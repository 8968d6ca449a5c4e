//! Handler dispatch value types (spec.md §4.4).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Error as HandlerError;
use bytes::Bytes;
use serde_json::Value;

use crate::frame::{Compression, DataType, MessageHeaders};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Rejection reasons for a pending `request.input(prompt)` await.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRejected {
    Cancelled,
    Timeout,
}

/// Narrow interface a connection exposes to in-flight handlers so they can
/// issue nested `InputRequest` prompts without seeing connection internals.
#[async_trait::async_trait]
pub trait InputPort: Send + Sync {
    async fn request_input(
        &self,
        message_id: u16,
        prompt: Bytes,
    ) -> Result<Bytes, InputRejected>;
}

/// An inbound `Request`, handed to the matched handler.
pub struct Request {
    pub handler_id: u16,
    pub message_id: u16,
    pub api_version: u32,
    pub data_type: DataType,
    pub compression: Compression,
    pub headers: MessageHeaders,
    pub payload: Bytes,
    pub(crate) input_port: Arc<dyn InputPort>,
}

impl Request {
    /// Sends `prompt` to the peer as a nested `InputRequest` and awaits the
    /// matching reply (spec.md §4.4 bullet 3).
    pub async fn input(&self, prompt: impl Into<Bytes>) -> Result<Bytes, InputRejected> {
        self.input_port
            .request_input(self.message_id, prompt.into())
            .await
    }
}

/// A handler's reply: status, content type, headers, and payload.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub data_type: DataType,
    pub compression: Compression,
    pub headers: MessageHeaders,
    pub payload: Bytes,
}

impl Response {
    pub fn ok_binary(payload: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            data_type: DataType::Binary,
            compression: Compression::None,
            headers: MessageHeaders::new(),
            payload: payload.into(),
        }
    }

    pub fn ok_json(value: Value) -> Self {
        Self {
            status: 200,
            data_type: DataType::Json,
            compression: Compression::None,
            headers: MessageHeaders::new(),
            payload: Bytes::from(serde_json::to_vec(&value).expect("value always serializes")),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            data_type: DataType::Binary,
            compression: Compression::None,
            headers: MessageHeaders::new(),
            payload: Bytes::new(),
        }
    }

    /// Default `HANDLE_ERROR` mapping: non-200 status with a JSON error
    /// body (spec.md §4.4 last paragraph).
    pub fn from_error(status: u16, err: &HandlerError) -> Self {
        let body = serde_json::json!({ "error": err.to_string() });
        Self {
            status,
            data_type: DataType::Json,
            compression: Compression::None,
            headers: MessageHeaders::new(),
            payload: Bytes::from(serde_json::to_vec(&body).expect("value always serializes")),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

/// Signature handlers are registered with: takes the request, returns a
/// response or an error that `HANDLE_ERROR` listeners get to observe.
pub type HandlerFn =
    Arc<dyn Fn(Request) -> BoxFuture<'static, Result<Response, HandlerError>> + Send + Sync>;

/// How long a pending `request.input(...)` waits before treating it as
/// `InputRejected::Timeout` (mirrors the connection's `input_timeout`).
pub const DEFAULT_INPUT_TIMEOUT: Duration = Duration::from_secs(120);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_json_sets_json_data_type() {
        let resp = Response::ok_json(serde_json::json!({"a": 1}));
        assert_eq!(resp.data_type, DataType::Json);
        assert_eq!(resp.status, 200);
    }

    #[test]
    fn not_found_is_empty_and_404() {
        let resp = Response::not_found();
        assert_eq!(resp.status, 404);
        assert!(resp.payload.is_empty());
    }
}
