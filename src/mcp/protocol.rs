//! JSON-RPC 2.0 message types, and the bits of MCP we need.

use crate::prelude::*;

/// The only JSON-RPC version there is.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revisions we understand, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// A request or notification from the client.
#[derive(Clone, Debug, Deserialize)]
pub struct Request {
    pub jsonrpc: String,

    /// Missing for notifications.
    #[serde(default)]
    pub id: Option<Value>,

    pub method: String,

    #[serde(default)]
    pub params: Value,
}

/// The error member of a failed response.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
}

impl ErrorObject {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Either `result` or `error`, never both.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(ErrorObject),
}

/// A response to a request with an `id`.
#[derive(Clone, Debug, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Response {
    /// Build a response from a handler's return value.
    pub fn new(id: Value, outcome: Result<Value, ErrorObject>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            outcome: match outcome {
                Ok(result) => Outcome::Result(result),
                Err(error) => Outcome::Error(error),
            },
        }
    }

    /// Build an error response.
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self::new(id, Err(ErrorObject::new(code, message)))
    }
}

/// Parse one line from the client. If the line isn't a valid request, return
/// the error response to send instead.
pub fn parse_message(line: &str) -> Result<Request, Response> {
    let value = serde_json::from_str::<Value>(line)
        .map_err(|err| Response::error(Value::Null, PARSE_ERROR, format!("parse error: {err}")))?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request = serde_json::from_value::<Request>(value).map_err(|err| {
        Response::error(id.clone(), INVALID_REQUEST, format!("invalid request: {err}"))
    })?;
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(Response::error(
            id,
            INVALID_REQUEST,
            format!("unsupported JSON-RPC version {:?}", request.jsonrpc),
        ));
    }
    Ok(request)
}

/// Pick the protocol version to answer `initialize` with.
pub fn negotiate_protocol_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|requested| {
            SUPPORTED_PROTOCOL_VERSIONS
                .iter()
                .copied()
                .find(|&supported| supported == requested)
        })
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0])
}
