use kurento_protocol::{IceCandidate, OperationParams};
use serde_json::Value;
use tracing::debug;

use super::{MediaPipeline, RemoteObject, merge_options, unexpected_value};
use crate::error::RpcResult;

/// Sends and receives media with a WebRTC peer.
#[derive(Debug, Clone)]
pub struct WebRtcEndpoint {
    object: RemoteObject,
}

impl WebRtcEndpoint {
    pub const TYPE_NAME: &'static str = "WebRtcEndpoint";

    pub fn constructor_params(
        pipeline: &MediaPipeline,
        options: OperationParams,
    ) -> OperationParams {
        merge_options(
            OperationParams::new().with("mediaPipeline", pipeline.id()),
            options,
        )
    }

    pub async fn create(pipeline: &MediaPipeline, options: OperationParams) -> RpcResult<Self> {
        let params = Self::constructor_params(pipeline, options);
        let object = RemoteObject::create(pipeline.gateway(), Self::TYPE_NAME, params).await?;
        Ok(Self { object })
    }

    pub fn id(&self) -> &str {
        self.object.id()
    }

    /// Starts ICE candidate gathering on the server side.
    ///
    /// Candidates are reported through server events, which this client does
    /// not subscribe to.
    pub async fn gather_candidates(&self) -> RpcResult<()> {
        self.object
            .invoke("gatherCandidates", OperationParams::new())
            .await?;
        Ok(())
    }

    /// Hands a candidate received from the remote peer to the endpoint.
    pub async fn add_ice_candidate(&self, candidate: &IceCandidate) -> RpcResult<()> {
        debug!(
            endpoint = %self.object,
            sdp_mid = %candidate.sdp_mid,
            sdp_m_line_index = candidate.sdp_m_line_index,
            "adding ICE candidate"
        );
        let params = OperationParams::new().with_typed("candidate", candidate)?;
        self.object.invoke("addIceCandidate", params).await?;
        Ok(())
    }

    /// STUN server address (IP only) the endpoint uses.
    pub async fn stun_server_address(&self) -> RpcResult<String> {
        let operation = "getStunServerAddress";
        let reply = self.object.invoke(operation, OperationParams::new()).await?;
        match reply.value {
            Value::String(address) => Ok(address),
            other => Err(unexpected_value(operation, &other)),
        }
    }

    pub async fn set_stun_server_address(&self, address: &str) -> RpcResult<()> {
        let params = OperationParams::new().with("stunServerAddress", address);
        self.object.invoke("setStunServerAddress", params).await?;
        Ok(())
    }

    pub async fn stun_server_port(&self) -> RpcResult<u16> {
        let operation = "getStunServerPort";
        let reply = self.object.invoke(operation, OperationParams::new()).await?;
        reply
            .value
            .as_u64()
            .and_then(|port| u16::try_from(port).ok())
            .ok_or_else(|| unexpected_value(operation, &reply.value))
    }

    pub async fn set_stun_server_port(&self, port: u16) -> RpcResult<()> {
        let params = OperationParams::new().with("stunServerPort", u32::from(port));
        self.object.invoke("setStunServerPort", params).await?;
        Ok(())
    }

    pub async fn release(&self) -> RpcResult<()> {
        self.object.release().await
    }
}
