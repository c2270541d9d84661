//! The transport contract (component F, send side).

use crate::error::Error;
use crate::message::Message;

/// The opaque message carrier used to reach the remote peer.
///
/// `send` is invoked synchronously by the connection; a non-`Ok` return
/// fails the intent operation that triggered it and, for SETUP-family
/// sends, drives the connection to `Terminating`.
pub trait Transport {
    fn send(&mut self, msg: &Message) -> Result<(), Error>;
}

/// A transport that always fails with [`Error::Unsupported`], used when no
/// real transport has been bound.
#[derive(Debug, Default)]
pub struct NoTransport;

impl Transport for NoTransport {
    fn send(&mut self, _msg: &Message) -> Result<(), Error> {
        Err(Error::Unsupported)
    }
}
