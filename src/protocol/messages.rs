//! Protocol message types
//!
//! Every line exchanged with the engine is a JSON object carrying a fixed
//! envelope (`jsonrpc`, `factoryApiVersion`, optional `traceContext`) and a
//! `type` discriminator selecting one of three bodies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{DroidError, Result};
use crate::types::identifiers::RequestId;

/// Fixed `jsonrpc` envelope tag
pub const JSONRPC_VERSION: &str = "2.0";

/// Fixed `factoryApiVersion` envelope tag
pub const FACTORY_API_VERSION: &str = "1.0.0";

/// A decoded protocol line
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolMessage {
    /// Optional trace metadata, carried through untouched
    pub trace_context: Option<Value>,
    /// Variant-specific body
    pub body: MessageBody,
}

/// The three message shapes of the dialect
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    /// A call expecting a response
    Request(RpcRequest),
    /// The answer to a request
    Response(RpcResponse),
    /// A one-way message
    Notification(RpcNotification),
}

/// Request body
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    /// Unique request id
    pub id: RequestId,
    /// Method name
    pub method: String,
    /// Parameters
    pub params: Option<Value>,
}

/// Response body
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    /// Id of the answered request; some engine errors arrive with `null`
    pub id: Option<RequestId>,
    /// Success payload
    pub result: Option<Value>,
    /// Failure payload
    pub error: Option<RpcError>,
}

/// Notification body
#[derive(Debug, Clone, PartialEq)]
pub struct RpcNotification {
    /// Method name
    pub method: String,
    /// Parameters
    pub params: Option<Value>,
}

/// Error object of a failed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code
    #[serde(default)]
    pub code: i64,
    /// Human readable message
    #[serde(default = "unknown_error_message")]
    pub message: String,
    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

fn unknown_error_message() -> String {
    "unknown error".to_string()
}

impl RpcError {
    /// Turn into the crate error for a request of `method`
    #[must_use]
    pub fn into_error(self, method: &str) -> DroidError {
        DroidError::Rpc {
            method: method.to_string(),
            code: self.code,
            message: self.message,
            data: self.data,
        }
    }
}

impl RpcResponse {
    /// Resolve to the result payload, or the engine error
    ///
    /// # Errors
    /// Returns `DroidError::Rpc` when the response carries an error object
    pub fn into_result(self, method: &str) -> Result<Value> {
        match self.error {
            Some(error) => Err(error.into_error(method)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

impl ProtocolMessage {
    /// Wrap a body in an envelope without trace metadata
    #[must_use]
    pub fn new(body: MessageBody) -> Self {
        Self {
            trace_context: None,
            body,
        }
    }

    /// Build a request message
    #[must_use]
    pub fn request(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self::new(MessageBody::Request(RpcRequest {
            id,
            method: method.into(),
            params,
        }))
    }

    /// Build a success response message
    #[must_use]
    pub fn response(id: RequestId, result: Value) -> Self {
        Self::new(MessageBody::Response(RpcResponse {
            id: Some(id),
            result: Some(result),
            error: None,
        }))
    }

    /// Build a notification message
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self::new(MessageBody::Notification(RpcNotification {
            method: method.into(),
            params,
        }))
    }

    /// Classify a JSON value
    ///
    /// Returns `None` unless the value is an object with the fixed envelope
    /// tags and the fields its `type` requires. Optional fields of the wrong
    /// type are ignored rather than rejected.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return None;
        }
        if obj.get("factoryApiVersion").and_then(Value::as_str) != Some(FACTORY_API_VERSION) {
            return None;
        }

        let body = match obj.get("type").and_then(Value::as_str)? {
            "request" => MessageBody::Request(RpcRequest {
                id: RequestId::new(obj.get("id")?.as_str()?),
                method: obj.get("method")?.as_str()?.to_string(),
                params: obj.get("params").cloned(),
            }),
            "response" => {
                let id = match obj.get("id")? {
                    Value::String(id) => Some(RequestId::new(id.as_str())),
                    Value::Null => None,
                    _ => return None,
                };
                let error = obj
                    .get("error")
                    .filter(|e| !e.is_null())
                    .map(|e| {
                        serde_json::from_value::<RpcError>(e.clone()).unwrap_or_else(|_| RpcError {
                            code: 0,
                            message: e.to_string(),
                            data: None,
                        })
                    });
                MessageBody::Response(RpcResponse {
                    id,
                    result: obj.get("result").cloned(),
                    error,
                })
            }
            "notification" => MessageBody::Notification(RpcNotification {
                method: obj.get("method")?.as_str()?.to_string(),
                params: obj.get("params").cloned(),
            }),
            _ => return None,
        };

        Some(Self {
            trace_context: obj.get("traceContext").cloned(),
            body,
        })
    }

    /// Encode as a JSON value
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("jsonrpc".into(), json!(JSONRPC_VERSION));
        obj.insert("factoryApiVersion".into(), json!(FACTORY_API_VERSION));
        if let Some(ref trace) = self.trace_context {
            obj.insert("traceContext".into(), trace.clone());
        }

        match &self.body {
            MessageBody::Request(req) => {
                obj.insert("type".into(), json!("request"));
                obj.insert("id".into(), json!(req.id));
                obj.insert("method".into(), json!(req.method));
                if let Some(ref params) = req.params {
                    obj.insert("params".into(), params.clone());
                }
            }
            MessageBody::Response(resp) => {
                obj.insert("type".into(), json!("response"));
                obj.insert("id".into(), json!(resp.id));
                if let Some(ref result) = resp.result {
                    obj.insert("result".into(), result.clone());
                }
                if let Some(ref error) = resp.error {
                    obj.insert("error".into(), json!(error));
                }
            }
            MessageBody::Notification(notif) => {
                obj.insert("type".into(), json!("notification"));
                obj.insert("method".into(), json!(notif.method));
                if let Some(ref params) = notif.params {
                    obj.insert("params".into(), params.clone());
                }
            }
        }

        Value::Object(obj)
    }

    /// Encode as a newline-terminated line
    ///
    /// # Errors
    /// Returns error if JSON serialization fails
    pub fn to_line(&self) -> Result<String> {
        serde_json::to_string(&self.to_value())
            .map(|s| format!("{s}\n"))
            .map_err(DroidError::from)
    }

    /// Method name for requests and notifications
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Request(req) => Some(&req.method),
            MessageBody::Notification(notif) => Some(&notif.method),
            MessageBody::Response(_) => None,
        }
    }
}
