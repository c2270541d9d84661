//! Connection states, call direction and glare outcome.

use std::fmt;

/// Lifecycle state of a [`Connection`](crate::connection::Connection).
///
/// `Terminating` is absorbing: once reached the connection may only be
/// dropped by the application, never transitioned out of again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    PendingOutgoing,
    PendingIncoming,
    ConflictResolution,
    Answered,
    DatachanEstablished,
    UpdateSent,
    UpdateRecv,
    HangupSent,
    HangupRecv,
    Terminating,
}

impl State {
    pub fn name(self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::PendingOutgoing => "pending-outgoing",
            State::PendingIncoming => "pending-incoming",
            State::ConflictResolution => "conflict-resolution",
            State::Answered => "answered",
            State::DatachanEstablished => "datachan-established",
            State::UpdateSent => "update-sent",
            State::UpdateRecv => "update-recv",
            State::HangupSent => "hangup-sent",
            State::HangupRecv => "hangup-recv",
            State::Terminating => "terminating",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which side originated the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Unknown,
    Outgoing,
    Incoming,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Unknown => "unknown",
            Direction::Outgoing => "outgoing",
            Direction::Incoming => "incoming",
        };
        f.write_str(s)
    }
}

/// Outcome of a SETUP glare resolution.
///
/// Only ever set by SETUP-vs-SETUP collisions (4.D); UPDATE glare does not
/// touch this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conflict {
    #[default]
    None,
    Winner,
    Loser,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Conflict::None => "None",
            Conflict::Winner => "Winner",
            Conflict::Loser => "Loser",
        };
        f.write_str(s)
    }
}
