//! Request and response types for the Kurento JSON-RPC protocol.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::Value;

use crate::JSONRPC_VERSION;
use crate::error::{ProtocolError, ProtocolResult};
use crate::params::OperationParams;

/// Identifier correlating a response with its request.
///
/// Always held as a string; numeric ids sent by a server are normalised to
/// their decimal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StringOrNumber;

        impl de::Visitor<'_> for StringOrNumber {
            type Value = RequestId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or integer request id")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<RequestId, E> {
                Ok(RequestId(value.to_string()))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<RequestId, E> {
                Ok(RequestId(value.to_string()))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<RequestId, E> {
                Ok(RequestId(value.to_string()))
            }
        }

        deserializer.deserialize_any(StringOrNumber)
    }
}

/// JSON-RPC 2.0 envelope wrapping every request and response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Always "2.0".
    pub jsonrpc: String,
    pub id: RequestId,
    /// `method`/`params` for requests, `result`/`error` for responses.
    #[serde(flatten)]
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(id: impl Into<RequestId>, payload: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            payload,
        }
    }

    pub fn request(id: impl Into<RequestId>, request: T) -> Self {
        Self::new(id, request)
    }

    pub fn response(id: impl Into<RequestId>, response: T) -> Self {
        Self::new(id, response)
    }

    /// Checks the envelope declares JSON-RPC 2.0.
    pub fn is_compatible(&self) -> bool {
        self.jsonrpc == JSONRPC_VERSION
    }
}

/// Methods a client can call on the media server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum Request {
    /// Instantiate a remote object (pipeline, endpoint...).
    Create(CreateParams),
    /// Run an operation on an existing remote object.
    Invoke(InvokeParams),
    /// Destroy a remote object.
    Release(ReleaseParams),
    /// Keep-alive / liveness probe.
    Ping(PingParams),
}

impl Request {
    /// The JSON-RPC method name.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Invoke(_) => "invoke",
            Self::Release(_) => "release",
            Self::Ping(_) => "ping",
        }
    }

    /// Target object id, for methods that address one.
    pub fn object(&self) -> Option<&str> {
        match self {
            Self::Invoke(params) => Some(&params.object),
            Self::Release(params) => Some(&params.object),
            Self::Create(_) | Self::Ping(_) => None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Create(params) => params.session_id.as_deref(),
            Self::Invoke(params) => params.session_id.as_deref(),
            Self::Release(params) => params.session_id.as_deref(),
            Self::Ping(_) => None,
        }
    }

    /// Attaches a session id to methods that carry one.
    pub fn set_session_id(&mut self, session_id: Option<String>) {
        match self {
            Self::Create(params) => params.session_id = session_id,
            Self::Invoke(params) => params.session_id = session_id,
            Self::Release(params) => params.session_id = session_id,
            Self::Ping(_) => {}
        }
    }

    /// Checks the invariants the server relies on.
    ///
    /// `invoke` needs a non-empty object and operation, `release` a non-empty
    /// object and `create` a non-empty type name.
    pub fn validate(&self) -> ProtocolResult<()> {
        match self {
            Self::Invoke(params) => {
                if params.object.is_empty() {
                    return Err(ProtocolError::invalid_request("invoke without object id"));
                }
                if params.operation.is_empty() {
                    return Err(ProtocolError::invalid_request(format!(
                        "invoke on '{}' without operation",
                        params.object
                    )));
                }
            }
            Self::Release(params) if params.object.is_empty() => {
                return Err(ProtocolError::invalid_request("release without object id"));
            }
            Self::Create(params) if params.type_name.is_empty() => {
                return Err(ProtocolError::invalid_request("create without type name"));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Parameters of an `invoke` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeParams {
    /// Remote object the operation runs on.
    pub object: String,
    pub operation: String,
    #[serde(default, skip_serializing_if = "OperationParams::is_empty")]
    pub operation_params: OperationParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl InvokeParams {
    pub fn new(object: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            operation: operation.into(),
            operation_params: OperationParams::new(),
            session_id: None,
        }
    }

    pub fn with_params(mut self, params: OperationParams) -> Self {
        self.operation_params = params;
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Parameters of a `create` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateParams {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "OperationParams::is_empty")]
    pub constructor_params: OperationParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl CreateParams {
    pub fn new(type_name: impl Into<String>, constructor_params: OperationParams) -> Self {
        Self {
            type_name: type_name.into(),
            constructor_params,
            session_id: None,
        }
    }
}

/// Parameters of a `release` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseParams {
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ReleaseParams {
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            session_id: None,
        }
    }
}

/// Parameters of a `ping` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingParams {
    /// Keep-alive interval in milliseconds the client intends to use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
}

/// Payload of a response envelope.
///
/// A well-formed response has exactly one of `result` and `error`. A
/// `"result": null` member counts as present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

fn present_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl Response {
    pub fn success(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: ErrorInfo) -> Self {
        Self {
            result: None,
            error: Some(error),
        }
    }

    /// Splits the response into its outcome.
    ///
    /// Fails when the response carries both or neither of `result` and `error`.
    pub fn into_outcome(self) -> ProtocolResult<Outcome> {
        match (self.result, self.error) {
            (Some(result), None) => Ok(Outcome::Success(Reply::from_result(result))),
            (None, Some(error)) => Ok(Outcome::Failure(error)),
            (Some(_), Some(_)) => Err(ProtocolError::malformed_response(
                "response carries both result and error",
            )),
            (None, None) => Err(ProtocolError::malformed_response(
                "response carries neither result nor error",
            )),
        }
    }
}

/// What a well-formed response resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Reply),
    Failure(ErrorInfo),
}

/// Successful result of a call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    /// Operation-specific value, interpreted by the caller.
    pub value: Value,
    /// Session the server bound the call to, when it reports one.
    pub session_id: Option<String>,
}

impl Reply {
    /// Unpacks Kurento's `{"value": ..., "sessionId": ...}` result object.
    ///
    /// Results that do not have that shape are taken as the value itself.
    pub fn from_result(result: Value) -> Self {
        match result {
            Value::Object(mut object)
                if object.contains_key("value") || object.contains_key("sessionId") =>
            {
                let session_id = match object.remove("sessionId") {
                    Some(Value::String(s)) => Some(s),
                    _ => None,
                };
                Self {
                    value: object.remove("value").unwrap_or(Value::Null),
                    session_id,
                }
            }
            value => Self {
                value,
                session_id: None,
            },
        }
    }

    /// The value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }
}

/// Error object reported by the server.
///
/// Only ever built from a server payload; there is no public constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    code: i64,
    message: String,
    #[serde(
        default,
        deserialize_with = "data_as_text",
        skip_serializing_if = "Option::is_none"
    )]
    data: Option<String>,
}

/// Keeps `data` as text: strings verbatim, other JSON as compact JSON.
fn data_as_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

impl ErrorInfo {
    pub fn code(&self) -> i64 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, " ({data})")?;
        }
        Ok(())
    }
}
