//! The RPC gateway: one request, one correlated response.

use std::sync::Arc;
use std::time::Duration;

use tracing::{Instrument, debug, debug_span, warn};
use uuid::Uuid;

use kurento_protocol::{
    CreateParams, Envelope, InvokeParams, OperationParams, Outcome, PingParams, ReleaseParams,
    Reply, Request, RequestId,
};

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::{InvokeError, RemoteError, RpcResult, TransportError};
use crate::stream::StreamConnection;

/// Deadline applied to calls when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Issues remote calls on a shared connection.
///
/// Cloning is cheap; clones share the connection. The gateway keeps no
/// per-call state, so any number of tasks may call it concurrently.
#[derive(Clone)]
pub struct RpcGateway {
    connection: Arc<dyn Connection>,
    timeout: Duration,
    session_id: Option<String>,
}

impl RpcGateway {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            timeout: DEFAULT_TIMEOUT,
            session_id: None,
        }
    }

    /// Connects to the configured server and applies its call settings.
    pub async fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let server = &config.server;
        let connection =
            StreamConnection::connect(&server.address, server.connect_timeout()).await?;

        let mut gateway = Self::new(Arc::new(connection)).with_timeout(server.request_timeout());
        if let Some(ref session_id) = server.session_id {
            gateway = gateway.with_session_id(session_id);
        }
        Ok(gateway)
    }

    /// Sets the default per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attaches `session_id` to every request that does not carry one.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Runs `operation` on the remote object `object_id`.
    ///
    /// Resolves with the server's reply, a [`RemoteError`] when the server
    /// answers with an error object, or a [`TransportError`] when no usable
    /// response arrives within the gateway deadline.
    pub async fn invoke(
        &self,
        object_id: &str,
        operation: &str,
        params: OperationParams,
    ) -> RpcResult<Reply> {
        self.invoke_with_deadline(object_id, operation, params, self.timeout)
            .await
    }

    /// Same as [`invoke`](Self::invoke) with an explicit deadline.
    pub async fn invoke_with_deadline(
        &self,
        object_id: &str,
        operation: &str,
        params: OperationParams,
        deadline: Duration,
    ) -> RpcResult<Reply> {
        let request = Request::Invoke(InvokeParams::new(object_id, operation).with_params(params));
        self.call(request, deadline).await
    }

    /// Creates a remote object and returns its id.
    pub async fn create(
        &self,
        type_name: &str,
        constructor_params: OperationParams,
    ) -> RpcResult<String> {
        let request = Request::Create(CreateParams::new(type_name, constructor_params));
        let reply = self.call(request, self.timeout).await?;

        match reply.as_str() {
            Some(object_id) if !object_id.is_empty() => {
                debug!(type_name, object_id, "remote object created");
                Ok(object_id.to_string())
            }
            _ => Err(TransportError::malformed(format!(
                "create {type_name} returned {} instead of an object id",
                reply.value
            ))
            .into()),
        }
    }

    /// Releases a remote object.
    pub async fn release(&self, object_id: &str) -> RpcResult<()> {
        self.call(Request::Release(ReleaseParams::new(object_id)), self.timeout)
            .await
            .map(|_| ())
    }

    /// Checks that the server answers.
    pub async fn ping(&self) -> RpcResult<()> {
        let params = PingParams {
            interval: Some(self.timeout.as_millis() as u64),
        };
        self.call(Request::Ping(params), self.timeout)
            .await
            .map(|_| ())
    }

    /// Sends any request and waits for its response.
    pub async fn call(&self, mut request: Request, deadline: Duration) -> RpcResult<Reply> {
        request.validate()?;
        if request.session_id().is_none() && self.session_id.is_some() {
            request.set_session_id(self.session_id.clone());
        }

        let id = RequestId::new(Uuid::new_v4().to_string());
        let span = debug_span!(
            "rpc_call",
            request_id = %id,
            method = request.method(),
            object = request.object().unwrap_or_default()
        );
        self.exchange(id, request, deadline).instrument(span).await
    }

    async fn exchange(
        &self,
        id: RequestId,
        request: Request,
        deadline: Duration,
    ) -> RpcResult<Reply> {
        let label = describe(&request);
        debug!(request = %label, "sending request");

        let envelope = Envelope::request(id.clone(), request);
        let pending = self.connection.request(envelope);
        let response = match tokio::time::timeout(deadline, pending).await {
            Ok(response) => response?,
            Err(_) => {
                warn!(request = %label, ?deadline, "request timed out");
                return Err(TransportError::Timeout {
                    operation: label,
                    after: deadline,
                }
                .into());
            }
        };

        if response.id != id {
            return Err(TransportError::IdMismatch {
                expected: id,
                received: response.id,
            }
            .into());
        }

        if !response.is_compatible() {
            warn!(jsonrpc = %response.jsonrpc, "unexpected JSON-RPC version in response");
        }

        let outcome = response
            .payload
            .into_outcome()
            .map_err(|e| TransportError::malformed(e.to_string()))?;

        match outcome {
            Outcome::Success(reply) => {
                debug!(request = %label, "request succeeded");
                Ok(reply)
            }
            Outcome::Failure(info) => {
                debug!(
                    request = %label,
                    code = info.code(),
                    error = info.message(),
                    "media server returned an error"
                );
                Err(InvokeError::Remote(RemoteError::from(info)))
            }
        }
    }
}

/// Short human label for logs and timeout errors.
fn describe(request: &Request) -> String {
    match request {
        Request::Invoke(params) => format!("{} on {}", params.operation, params.object),
        Request::Create(params) => format!("create {}", params.type_name),
        Request::Release(params) => format!("release {}", params.object),
        Request::Ping(_) => "ping".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedConnection, StalledConnection, error_info};
    use kurento_protocol::{IceCandidate, Response};
    use serde_json::{Value, json};

    #[tokio::test]
    async fn record_with_null_result_succeeds() {
        let connection = ScriptedConnection::replying(Value::Null);
        let gateway = RpcGateway::new(connection.clone());

        let reply = gateway
            .invoke("rec-1", "record", OperationParams::new())
            .await
            .unwrap();
        assert_eq!(reply.value, Value::Null);

        let sent = connection.last_invoke();
        assert_eq!(sent.object, "rec-1");
        assert_eq!(sent.operation, "record");
        assert!(sent.operation_params.is_empty());
    }

    #[tokio::test]
    async fn add_ice_candidate_remote_error_keeps_code() {
        let connection = ScriptedConnection::failing(json!({
            "code": 40101,
            "message": "No such element",
            "data": "rtc-1"
        }));
        let gateway = RpcGateway::new(connection.clone());

        let candidate = IceCandidate::new("candidate:1 1 UDP 1 10.0.0.1 9 typ host", "0", 0);
        let params = OperationParams::new()
            .with_typed("candidate", &candidate)
            .unwrap();
        let err = gateway
            .invoke("rtc-1", "addIceCandidate", params)
            .await
            .unwrap_err();

        let remote = err.as_remote().expect("remote error");
        assert_eq!(remote.code(), 40101);
        assert_eq!(remote.message(), "No such element");
        assert_eq!(remote.data(), Some("rtc-1"));

        let sent = connection.last_invoke();
        let candidate = sent.operation_params.get("candidate").unwrap();
        assert!(candidate.as_typed().unwrap().is::<IceCandidate>());
    }

    #[tokio::test]
    async fn transport_failure_is_never_remote() {
        let connection = ScriptedConnection::new(|_| Err(TransportError::Closed));
        let gateway = RpcGateway::new(connection);

        let err = gateway
            .invoke("rec-1", "record", OperationParams::new())
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert!(err.as_remote().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires_with_timeout() {
        let gateway =
            RpcGateway::new(Arc::new(StalledConnection)).with_timeout(Duration::from_secs(5));

        let err = gateway
            .invoke_with_deadline("rec-1", "stop", OperationParams::new(), Duration::from_secs(1))
            .await
            .unwrap_err();

        match err {
            InvokeError::Transport(TransportError::Timeout { operation, after }) => {
                assert_eq!(operation, "stop on rec-1");
                assert_eq!(after, Duration::from_secs(1));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_object_or_operation_is_rejected_locally() {
        let connection = ScriptedConnection::replying(Value::Null);
        let gateway = RpcGateway::new(connection.clone());

        let err = gateway.invoke("", "record", OperationParams::new()).await.unwrap_err();
        assert!(matches!(err, InvokeError::InvalidRequest(_)));

        let err = gateway.invoke("rec-1", "", OperationParams::new()).await.unwrap_err();
        assert!(matches!(err, InvokeError::InvalidRequest(_)));

        assert!(connection.requests().is_empty());
    }

    #[tokio::test]
    async fn mismatched_response_id_is_transport_error() {
        let connection = ScriptedConnection::with_envelopes(|_| {
            Ok(Envelope::response("someone-else", Response::success(Value::Null)))
        });
        let gateway = RpcGateway::new(connection);

        let err = gateway
            .invoke("rec-1", "record", OperationParams::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvokeError::Transport(TransportError::IdMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn response_without_result_or_error_is_malformed() {
        let connection = ScriptedConnection::new(|_| Ok(Response::default()));
        let gateway = RpcGateway::new(connection);

        let err = gateway
            .invoke("rec-1", "record", OperationParams::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvokeError::Transport(TransportError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn session_id_is_attached() {
        let connection = ScriptedConnection::replying(json!({"value": null, "sessionId": "s-1"}));
        let gateway = RpcGateway::new(connection.clone()).with_session_id("s-1");

        let reply = gateway
            .invoke("rec-1", "record", OperationParams::new())
            .await
            .unwrap();
        assert_eq!(reply.session_id.as_deref(), Some("s-1"));
        assert_eq!(connection.last_invoke().session_id.as_deref(), Some("s-1"));
    }

    #[tokio::test]
    async fn each_call_uses_a_fresh_request_id() {
        let connection = ScriptedConnection::replying(Value::Null);
        let gateway = RpcGateway::new(connection.clone());

        gateway.invoke("rec-1", "record", OperationParams::new()).await.unwrap();
        gateway.invoke("rec-1", "stop", OperationParams::new()).await.unwrap();

        let requests = connection.requests();
        assert_eq!(requests.len(), 2);
        assert_ne!(requests[0].id, requests[1].id);
    }

    #[tokio::test]
    async fn create_returns_object_id() {
        let connection =
            ScriptedConnection::replying(json!({"value": "pipe-1", "sessionId": "s-1"}));
        let gateway = RpcGateway::new(connection.clone());

        let id = gateway.create("MediaPipeline", OperationParams::new()).await.unwrap();
        assert_eq!(id, "pipe-1");
        assert!(matches!(
            &connection.requests()[0].payload,
            Request::Create(params) if params.type_name == "MediaPipeline"
        ));
    }

    #[tokio::test]
    async fn create_without_object_id_is_malformed() {
        let connection = ScriptedConnection::replying(json!({"value": 3}));
        let gateway = RpcGateway::new(connection);

        let err = gateway.create("MediaPipeline", OperationParams::new()).await.unwrap_err();
        assert!(matches!(
            err,
            InvokeError::Transport(TransportError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn release_and_ping() {
        let connection = ScriptedConnection::replying(Value::Null);
        let gateway = RpcGateway::new(connection.clone());

        gateway.release("rec-1").await.unwrap();
        gateway.ping().await.unwrap();

        let requests = connection.requests();
        assert_eq!(requests[0].payload.method(), "release");
        assert_eq!(requests[0].payload.object(), Some("rec-1"));
        assert_eq!(requests[1].payload.method(), "ping");
    }

    #[tokio::test]
    async fn release_error_is_remote() {
        let connection =
            ScriptedConnection::failing(json!({"code": 40101, "message": "Object not found"}));
        let gateway = RpcGateway::new(connection);

        let err = gateway.release("gone").await.unwrap_err();
        assert_eq!(err.as_remote().map(RemoteError::code), Some(40101));
        assert_eq!(err.as_remote().unwrap().info(), &error_info(40101, "Object not found"));
    }

    #[tokio::test]
    async fn concurrent_calls_share_one_stream() {
        use kurento_protocol::{read_message, write_message};

        let (client, mut server) = tokio::io::duplex(64 * 1024);
        let gateway = RpcGateway::new(Arc::new(StreamConnection::new(client)));

        let server_task = tokio::spawn(async move {
            let mut pending = Vec::new();
            for _ in 0..3 {
                let request: Envelope<Request> = read_message(&mut server).await.unwrap().unwrap();
                pending.push(request);
            }
            // Answer in reverse arrival order.
            while let Some(request) = pending.pop() {
                let object = request.payload.object().unwrap_or_default().to_string();
                let body = json!({"jsonrpc": "2.0", "id": request.id, "result": {"value": object}});
                write_message(&mut server, &body).await.unwrap();
            }
            server
        });

        let (a, b, c) = tokio::join!(
            gateway.invoke("obj-a", "getName", OperationParams::new()),
            gateway.invoke("obj-b", "getName", OperationParams::new()),
            gateway.invoke("obj-c", "getName", OperationParams::new()),
        );
        assert_eq!(a.unwrap().as_str(), Some("obj-a"));
        assert_eq!(b.unwrap().as_str(), Some("obj-b"));
        assert_eq!(c.unwrap().as_str(), Some("obj-c"));

        drop(server_task.await.unwrap());
    }
}
