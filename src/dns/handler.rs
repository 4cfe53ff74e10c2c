//! The response dispatcher hook.
//!
//! A [`Handler`] maps one decoded request to one [`Response`]. The server
//! calls it concurrently from the UDP loop and from every live TCP
//! connection and adds no locking of its own, so a handler with shared
//! mutable state must synchronize it internally.

use std::future::Future;

use hickory_proto::op::Message;

use super::codec::{decode, encode, refused_response};
use crate::error::Result;

/// What a handler answers with.
#[derive(Debug, Clone)]
pub enum Response {
    /// A well-formed message, encoded by the server.
    Message(Message),
    /// Bytes sent verbatim, for exercising malformed wire input on the client.
    Raw(Vec<u8>),
}

impl Response {
    /// Convert the response into the bytes that go on the wire.
    pub fn into_wire(self) -> Result<Vec<u8>> {
        match self {
            Self::Message(message) => encode(&message),
            Self::Raw(bytes) => Ok(bytes),
        }
    }
}

impl From<Message> for Response {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}

impl From<Vec<u8>> for Response {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Raw(bytes)
    }
}

/// Trait for the per-request application behavior of the server.
///
/// An error returned here is contained by the caller: the datagram is
/// dropped, or the TCP connection is closed.
pub trait Handler: Send + Sync + 'static {
    /// Produce the response for one request.
    fn handle(&self, request: Message) -> impl Future<Output = Result<Response>> + Send;
}

/// The default handler: refuses every query.
#[derive(Debug, Clone, Copy, Default)]
pub struct Refuser;

impl Handler for Refuser {
    async fn handle(&self, request: Message) -> Result<Response> {
        Ok(Response::Message(refused_response(&request)))
    }
}

/// A handler backed by a closure returning a future.
#[derive(Clone)]
pub struct FnHandler<F> {
    func: F,
}

/// Wrap a closure as a [`Handler`].
pub fn handler_fn<F, Fut>(func: F) -> FnHandler<F>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send,
{
    FnHandler { func }
}

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send,
{
    fn handle(&self, request: Message) -> impl Future<Output = Result<Response>> + Send {
        (self.func)(request)
    }
}

/// Decode `wire`, dispatch it to `handler` and encode the answer.
pub async fn respond<H: Handler>(handler: &H, wire: &[u8]) -> Result<Vec<u8>> {
    let request = decode(wire)?;
    handler.handle(request).await?.into_wire()
}
