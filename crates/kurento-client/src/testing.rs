//! In-memory connections for unit tests.

use std::sync::{Arc, Mutex};

use kurento_protocol::{Envelope, ErrorInfo, InvokeParams, Request, Response};
use serde_json::{Value, json};

use crate::connection::{BoxFuture, Connection};
use crate::error::TransportError;

type Handler =
    Box<dyn Fn(&Envelope<Request>) -> Result<Envelope<Response>, TransportError> + Send + Sync>;

/// Records every request and answers it from a closure.
pub struct ScriptedConnection {
    requests: Mutex<Vec<Envelope<Request>>>,
    handler: Handler,
}

impl ScriptedConnection {
    /// Answers with the closure's response under the request's own id.
    pub fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn(&Envelope<Request>) -> Result<Response, TransportError> + Send + Sync + 'static,
    {
        Self::with_envelopes(move |request| {
            respond(request).map(|response| Envelope::response(request.id.clone(), response))
        })
    }

    /// Answers with whatever envelope the closure builds.
    pub fn with_envelopes<F>(respond: F) -> Arc<Self>
    where
        F: Fn(&Envelope<Request>) -> Result<Envelope<Response>, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            handler: Box::new(respond),
        })
    }

    /// Succeeds every call with `result`.
    pub fn replying(result: Value) -> Arc<Self> {
        Self::new(move |_| Ok(Response::success(result.clone())))
    }

    /// Fails every call with the error object `error`.
    pub fn failing(error: Value) -> Arc<Self> {
        let info: ErrorInfo = serde_json::from_value(error).expect("error object");
        Self::new(move |_| Ok(Response::failure(info.clone())))
    }

    /// Answers `create` with a fresh object id and everything else with null.
    pub fn media_server() -> Arc<Self> {
        Self::new(|request| {
            let result = match &request.payload {
                Request::Create(params) => json!({
                    "value": format!("{}-{}", params.type_name, request.id),
                    "sessionId": "s-1"
                }),
                _ => json!({"value": null, "sessionId": "s-1"}),
            };
            Ok(Response::success(result))
        })
    }

    pub fn requests(&self) -> Vec<Envelope<Request>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Envelope<Request> {
        self.requests().pop().expect("no request sent")
    }

    pub fn last_invoke(&self) -> InvokeParams {
        match self.last_request().payload {
            Request::Invoke(params) => params,
            other => panic!("expected invoke, got {}", other.method()),
        }
    }
}

impl Connection for ScriptedConnection {
    fn request(
        &self,
        request: Envelope<Request>,
    ) -> BoxFuture<'_, Result<Envelope<Response>, TransportError>> {
        let response = (self.handler)(&request);
        self.requests.lock().unwrap().push(request);
        Box::pin(async move { response })
    }
}

/// Never answers.
pub struct StalledConnection;

impl Connection for StalledConnection {
    fn request(
        &self,
        _request: Envelope<Request>,
    ) -> BoxFuture<'_, Result<Envelope<Response>, TransportError>> {
        Box::pin(std::future::pending())
    }
}

pub fn error_info(code: i64, message: &str) -> ErrorInfo {
    serde_json::from_value(json!({"code": code, "message": message})).expect("error object")
}
