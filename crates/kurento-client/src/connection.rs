//! The transport seam the gateway depends on.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use kurento_protocol::{Envelope, Request, Response};

use crate::error::TransportError;

/// A boxed future for async trait methods.
///
/// Keeps [`Connection`] object safe so the gateway can hold an
/// `Arc<dyn Connection>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A shared transport to the media server.
///
/// Implementations must allow concurrent calls from many tasks and hand each
/// caller the response carrying its own request id, whatever order
/// responses arrive in. Dropping the returned future abandons the request;
/// a response arriving afterwards must be discarded.
pub trait Connection: Send + Sync {
    /// Sends `request` and resolves with the correlated response.
    fn request(
        &self,
        request: Envelope<Request>,
    ) -> BoxFuture<'_, Result<Envelope<Response>, TransportError>>;
}

impl<C: Connection + ?Sized> Connection for Arc<C> {
    fn request(
        &self,
        request: Envelope<Request>,
    ) -> BoxFuture<'_, Result<Envelope<Response>, TransportError>> {
        (**self).request(request)
    }
}
