use kurento_protocol::{MediaProfileSpecType, OperationParams};
use tracing::debug;

use super::{MediaPipeline, RemoteObject, merge_options};
use crate::error::RpcResult;

/// Stores the media it receives to a URI.
#[derive(Debug, Clone)]
pub struct RecorderEndpoint {
    object: RemoteObject,
}

impl RecorderEndpoint {
    pub const TYPE_NAME: &'static str = "RecorderEndpoint";

    /// Constructor parameters for a recorder in `pipeline`.
    ///
    /// Defaults to an empty `uri`, the WEBM profile and stopping at end of
    /// stream. Non-null entries in `options` replace the defaults.
    pub fn constructor_params(
        pipeline: &MediaPipeline,
        options: OperationParams,
    ) -> OperationParams {
        let base = OperationParams::new()
            .with("mediaPipeline", pipeline.id())
            .with("uri", "")
            .with("mediaProfile", MediaProfileSpecType::Webm)
            .with("stopOnEndOfStream", true);
        merge_options(base, options)
    }

    pub async fn create(pipeline: &MediaPipeline, options: OperationParams) -> RpcResult<Self> {
        let params = Self::constructor_params(pipeline, options);
        let object = RemoteObject::create(pipeline.gateway(), Self::TYPE_NAME, params).await?;
        Ok(Self { object })
    }

    pub fn id(&self) -> &str {
        self.object.id()
    }

    /// Starts storing media.
    pub async fn record(&self) -> RpcResult<()> {
        debug!(recorder = %self.object, "starting recording");
        self.object.invoke("record", OperationParams::new()).await?;
        Ok(())
    }

    pub async fn pause(&self) -> RpcResult<()> {
        self.object.invoke("pause", OperationParams::new()).await?;
        Ok(())
    }

    /// Stops recording and finalises the file.
    pub async fn stop(&self) -> RpcResult<()> {
        self.object.invoke("stop", OperationParams::new()).await?;
        Ok(())
    }

    pub async fn release(&self) -> RpcResult<()> {
        self.object.release().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvokeError;
    use crate::gateway::RpcGateway;
    use crate::testing::ScriptedConnection;
    use kurento_protocol::{ParamValue, Request};
    use serde_json::{Value, json};

    fn pipeline(connection: std::sync::Arc<ScriptedConnection>) -> MediaPipeline {
        MediaPipeline::attach(RpcGateway::new(connection), "pipe-1")
    }

    #[test]
    fn constructor_defaults() {
        let connection = ScriptedConnection::replying(Value::Null);
        let params =
            RecorderEndpoint::constructor_params(&pipeline(connection), OperationParams::new());

        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({
                "mediaPipeline": "pipe-1",
                "mediaProfile": "WEBM",
                "stopOnEndOfStream": true,
                "uri": ""
            })
        );
    }

    #[test]
    fn options_override_defaults() {
        let connection = ScriptedConnection::replying(Value::Null);
        let options = OperationParams::new()
            .with("uri", "file:///tmp/call.mp4")
            .with("mediaProfile", MediaProfileSpecType::Mp4)
            .with("stopOnEndOfStream", Value::Null);
        let params = RecorderEndpoint::constructor_params(&pipeline(connection), options);

        assert_eq!(params.get("uri"), Some(&ParamValue::from("file:///tmp/call.mp4")));
        assert_eq!(params.get("mediaProfile"), Some(&ParamValue::from("MP4")));
        assert_eq!(params.get("stopOnEndOfStream"), Some(&ParamValue::from(true)));
        assert_eq!(params.get("mediaPipeline"), Some(&ParamValue::from("pipe-1")));
    }

    #[tokio::test]
    async fn record_pause_stop_release() {
        let connection = ScriptedConnection::media_server();
        let pipe = pipeline(connection.clone());
        let recorder = RecorderEndpoint::create(&pipe, OperationParams::new())
            .await
            .unwrap();

        recorder.record().await.unwrap();
        recorder.pause().await.unwrap();
        recorder.stop().await.unwrap();
        recorder.release().await.unwrap();

        let requests = connection.requests();
        assert!(matches!(
            &requests[0].payload,
            Request::Create(params) if params.type_name == "RecorderEndpoint"
        ));
        let operations: Vec<_> = requests[1..4]
            .iter()
            .map(|request| match &request.payload {
                Request::Invoke(params) => {
                    assert_eq!(params.object, recorder.id());
                    params.operation.clone()
                }
                other => panic!("expected invoke, got {}", other.method()),
            })
            .collect();
        assert_eq!(operations, ["record", "pause", "stop"]);
        assert_eq!(requests[4].payload.method(), "release");
    }

    #[tokio::test]
    async fn record_surfaces_remote_error() {
        let connection = ScriptedConnection::failing(json!({
            "code": 40101,
            "message": "Object not found",
            "data": "rec-1"
        }));
        let recorder = RecorderEndpoint {
            object: RemoteObject::attach(RpcGateway::new(connection), "rec-1"),
        };

        let err = recorder.record().await.unwrap_err();
        match err {
            InvokeError::Remote(remote) => {
                assert_eq!(remote.code(), 40101);
                assert_eq!(remote.data(), Some("rec-1"));
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }
}
