//! Peer-to-peer call signaling state machine.
//!
//! A [`connection::Connection`] walks a single session between two clients
//! through SETUP, optional UPDATE re-negotiation, and termination, with
//! deterministic glare resolution when both sides offer at once. The
//! machine is synchronous: it performs no I/O and runs no background
//! tasks of its own. It calls out to an application-supplied
//! [`transport::Transport`] to emit messages, notifies an application-
//! supplied [`handlers::Handlers`] of inbound events, and exposes its
//! next wakeup deadline through [`connection::Connection::next_deadline`]
//! so the owning event loop can drive timers without a bundled runtime.

pub mod connection;
pub mod error;
pub mod handlers;
pub mod message;
pub mod props;
pub mod state;
pub mod timer;
pub mod transport;
mod util;

pub use connection::{Conf, Connection};
pub use error::{Error, Result};
pub use handlers::{Handlers, NoHandlers};
pub use message::{decode, encode, Message, MessageKind, Payload, PROTOCOL_VERSION};
pub use props::Props;
pub use state::{Conflict, Direction, State};
pub use timer::{Timer, TimerKind};
pub use transport::{NoTransport, Transport};
