use kurento_protocol::OperationParams;

use super::RemoteObject;
use crate::error::RpcResult;
use crate::gateway::RpcGateway;

/// Container every endpoint lives in.
#[derive(Debug, Clone)]
pub struct MediaPipeline {
    object: RemoteObject,
}

impl MediaPipeline {
    pub const TYPE_NAME: &'static str = "MediaPipeline";

    pub async fn create(gateway: &RpcGateway) -> RpcResult<Self> {
        let object = RemoteObject::create(gateway, Self::TYPE_NAME, OperationParams::new()).await?;
        Ok(Self { object })
    }

    pub fn attach(gateway: RpcGateway, id: impl Into<String>) -> Self {
        Self {
            object: RemoteObject::attach(gateway, id),
        }
    }

    pub fn id(&self) -> &str {
        self.object.id()
    }

    pub fn gateway(&self) -> &RpcGateway {
        self.object.gateway()
    }

    /// Releases the pipeline and, server side, every element in it.
    pub async fn release(&self) -> RpcResult<()> {
        self.object.release().await
    }
}
