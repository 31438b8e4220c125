//! Client for the Kurento media server JSON-RPC control protocol.
//!
//! The [`RpcGateway`] turns `(object, operation, params)` into a request
//! envelope, sends it on a shared [`Connection`] and resolves the one
//! response correlated to it. Failures come back as an [`InvokeError`] that
//! keeps connection problems ([`TransportError`]) apart from errors the
//! server reported ([`RemoteError`]).
//!
//! ```ignore
//! use std::sync::Arc;
//! use kurento_client::{RpcGateway, StreamConnection};
//! use kurento_client::media::{MediaPipeline, RecorderEndpoint};
//! use kurento_protocol::OperationParams;
//!
//! let connection = StreamConnection::connect_tcp("127.0.0.1:8888").await?;
//! let gateway = RpcGateway::new(Arc::new(connection));
//!
//! let pipeline = MediaPipeline::create(&gateway).await?;
//! let options = OperationParams::new().with("uri", "file:///tmp/call.webm");
//! let recorder = RecorderEndpoint::create(&pipeline, options).await?;
//! recorder.record().await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod gateway;
pub mod media;
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ClientConfig, ServerAddress};
pub use connection::{BoxFuture, Connection};
pub use error::{ConfigError, InvokeError, RemoteError, RpcResult, TransportError};
pub use gateway::RpcGateway;
pub use stream::StreamConnection;
