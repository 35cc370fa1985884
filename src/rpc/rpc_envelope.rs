use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// HTTP-style verb carried by a request envelope.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RpcMethod {
    Get,
    Post,
    Put,
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            RpcMethod::Get => "GET",
            RpcMethod::Post => "POST",
            RpcMethod::Put => "PUT",
        };
        f.write_str(verb)
    }
}

/// A query value is either a single string or a list of strings.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    Multiple(Vec<String>),
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Single(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Single(value)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        QueryValue::Multiple(values)
    }
}

/// A request before the correlator has assigned it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub path: String,
    pub method: RpcMethod,
    pub values: Option<BTreeMap<String, QueryValue>>,
    pub body: Option<Value>,
}

impl RpcRequest {
    pub fn new(method: RpcMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            values: None,
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(RpcMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(RpcMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(RpcMethod::Put, path)
    }

    /// Adds one query value, replacing any previous value under `key`.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.values
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attaches the correlator-assigned id, producing the wire envelope.
    pub fn into_envelope(self, id: u32) -> RequestEnvelope {
        RequestEnvelope {
            id,
            path: self.path,
            method: self.method,
            values: self.values,
            body: self.body,
        }
    }
}

/// Request unit as it travels over the multiplexed connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub id: u32,
    pub path: String,
    pub method: RpcMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<BTreeMap<String, QueryValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl RequestEnvelope {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Response unit as it travels over the multiplexed connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: u32,
    pub status: u16,
    #[serde(default)]
    pub body: Value,
}

impl ResponseEnvelope {
    pub fn new(id: u32, status: u16, body: Value) -> Self {
        Self { id, status, body }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Strips the id once the correlator has routed the response.
    pub fn into_response(self) -> RpcResponse {
        RpcResponse {
            status: self.status,
            body: self.body,
        }
    }
}

/// An inbound frame, decoded at least as far as its request id.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Response(ResponseEnvelope),
    /// The id could be read but the rest of the frame could not.
    Malformed { id: u32, reason: String },
}

#[derive(Deserialize)]
struct FrameId {
    id: u32,
}

impl InboundFrame {
    pub fn id(&self) -> u32 {
        match self {
            InboundFrame::Response(response) => response.id,
            InboundFrame::Malformed { id, .. } => *id,
        }
    }

    /// Fails only when the text is not JSON or carries no usable `id`.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        let FrameId { id } = FrameId::deserialize(&value)?;

        match ResponseEnvelope::deserialize(value) {
            Ok(response) => Ok(InboundFrame::Response(response)),
            Err(err) => Ok(InboundFrame::Malformed {
                id,
                reason: err.to_string(),
            }),
        }
    }
}

/// What a waiter receives once its response has been routed.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    pub status: u16,
    pub body: Value,
}
