//! Error type shared by the codec, the connection state machine and the
//! transport/handler contracts.

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error kinds surfaced on the public API.
///
/// Intent operations and codec calls return these synchronously; the state
/// machine itself only ever delivers [`Error::TimedOut`] and
/// [`Error::Cancelled`] asynchronously, through the close handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("null or empty required input")]
    Invalid,
    #[error("operation not permitted in the current state")]
    Protocol,
    #[error("malformed wire message")]
    BadMessage,
    #[error("no transport bound")]
    Unsupported,
    #[error("setup or termination timer expired")]
    TimedOut,
    #[error("remote peer cancelled the connection")]
    Cancelled,
    #[error("allocation failed")]
    OutOfMemory,
}
