//! DNS message handling.

pub mod codec;
pub mod handler;

pub use codec::{MAX_MESSAGE_SIZE, decode, encode, refused_response};
pub use handler::{FnHandler, Handler, Refuser, Response, handler_fn, respond};
