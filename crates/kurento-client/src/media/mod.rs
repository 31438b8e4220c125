//! Typed wrappers over remote media objects.
//!
//! Each wrapper holds the id the server assigned at creation and a handle to
//! the gateway. Operations are plain `invoke` calls; failures surface as the
//! gateway's [`InvokeError`](crate::InvokeError) unchanged.

mod pipeline;
mod recorder;
mod webrtc;

pub use pipeline::MediaPipeline;
pub use recorder::RecorderEndpoint;
pub use webrtc::WebRtcEndpoint;

use std::fmt;

use kurento_protocol::{OperationParams, Reply};
use serde_json::Value;

use crate::error::{InvokeError, RpcResult, TransportError};
use crate::gateway::RpcGateway;

/// Overlays `options` onto `base`.
///
/// Option values win over base values; null options leave the base value in
/// place.
pub fn merge_options(mut base: OperationParams, options: OperationParams) -> OperationParams {
    base.merge(options);
    base
}

/// A getter reply whose value has the wrong JSON type.
fn unexpected_value(operation: &str, value: &Value) -> InvokeError {
    TransportError::malformed(format!("{operation} returned unexpected value {value}")).into()
}

/// A remote object handle: its id plus the gateway that reaches it.
#[derive(Clone)]
pub struct RemoteObject {
    id: String,
    gateway: RpcGateway,
}

impl RemoteObject {
    /// Creates a remote object of `type_name` on the server.
    pub async fn create(
        gateway: &RpcGateway,
        type_name: &str,
        constructor_params: OperationParams,
    ) -> RpcResult<Self> {
        let id = gateway.create(type_name, constructor_params).await?;
        Ok(Self::attach(gateway.clone(), id))
    }

    /// Wraps an object that already exists on the server.
    pub fn attach(gateway: RpcGateway, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            gateway,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn gateway(&self) -> &RpcGateway {
        &self.gateway
    }

    pub async fn invoke(&self, operation: &str, params: OperationParams) -> RpcResult<Reply> {
        self.gateway.invoke(&self.id, operation, params).await
    }

    pub async fn release(&self) -> RpcResult<()> {
        self.gateway.release(&self.id).await
    }
}

impl fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteObject").field("id", &self.id).finish()
    }
}

impl fmt::Display for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
