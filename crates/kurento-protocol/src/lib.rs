//! Wire types for the Kurento media-server JSON-RPC protocol.
//!
//! # Envelopes
//!
//! Requests are JSON-RPC 2.0 envelopes whose `method` is one of `create`,
//! `invoke`, `release` or `ping`:
//!
//! ```text
//! {"jsonrpc":"2.0","id":"7c1e...","method":"invoke",
//!  "params":{"object":"rec-1","operation":"record"}}
//! ```
//!
//! Responses carry the same `id` and exactly one of `result` or `error`:
//!
//! ```text
//! {"jsonrpc":"2.0","id":"7c1e...","result":{"value":null,"sessionId":"s-1"}}
//! {"jsonrpc":"2.0","id":"7c1e...","error":{"code":40101,"message":"No such element"}}
//! ```
//!
//! # Typed parameters
//!
//! Polymorphic parameter values (such as an ICE candidate) travel with
//! `__module__` / `__type__` discriminators. Implement [`RemoteType`] for a
//! struct and [`OperationParams::with_typed`] generates them.
//!
//! # Example
//!
//! ```rust
//! use kurento_protocol::{Envelope, InvokeParams, Request};
//!
//! let request = Envelope::request("req-1", Request::Invoke(InvokeParams::new("rec-1", "record")));
//! let json = serde_json::to_value(&request).unwrap();
//! assert_eq!(json["method"], "invoke");
//! assert_eq!(json["params"]["operation"], "record");
//! ```

mod error;
mod framing;
mod params;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{decode_message, encode_message, read_frame, read_message, write_message};
pub use params::{
    IceCandidate, MODULE_KEY, MediaProfileSpecType, OperationParams, ParamValue, RemoteType,
    TYPE_KEY, TypedValue,
};
pub use types::{
    CreateParams, Envelope, ErrorInfo, InvokeParams, Outcome, PingParams, ReleaseParams, Reply,
    Request, RequestId, Response,
};

/// JSON-RPC version carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Maximum framed message size (1 MB).
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;

/// Module name of the core Kurento types.
pub const KURENTO_MODULE: &str = "kurento";
