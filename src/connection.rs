//! The connection state machine (component E) — the core of this crate.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::handlers::Handlers;
use crate::message::{Message, MessageKind, Payload};
use crate::props::Props;
use crate::state::{Conflict, Direction, State};
use crate::timer::{Timer, TimerKind};
use crate::transport::Transport;
use crate::util::random_sessid;

/// Tunable timeouts. Defaults match the reference implementation: 30s to
/// set a call up, 5s to wait for a HANGUP response.
#[derive(Debug, Clone, Copy)]
pub struct Conf {
    pub timeout_setup: Duration,
    pub timeout_term: Duration,
}

impl Default for Conf {
    fn default() -> Self {
        Self {
            timeout_setup: Duration::from_millis(30_000),
            timeout_term: Duration::from_millis(5_000),
        }
    }
}

/// A single signaling session between `userid_self`/`clientid_self` and a
/// remote peer bound on first contact.
///
/// Generic over the [`Transport`] used to emit messages and the
/// [`Handlers`] notified of meaningful transitions, the same way this
/// codebase's call abstraction is generic over its media backend.
pub struct Connection<T: Transport, H: Handlers> {
    userid_self: String,
    clientid_self: String,
    clientid_remote: String,
    sessid_local: String,
    sessid_remote: String,

    state: State,
    direction: Direction,
    conflict: Conflict,

    setup_err: Option<Error>,
    pending_err: Option<Error>,

    conf: Conf,
    timer: Option<Timer>,

    transport: T,
    handlers: H,

    /// Latches `on_close` to at most one call; cleared before invocation to
    /// match the "callback invoked last" reentrancy rule (SPEC_FULL §5).
    closed: bool,
}

impl<T: Transport, H: Handlers> Connection<T, H> {
    pub fn new(
        userid_self: impl Into<String>,
        clientid_self: impl Into<String>,
        conf: Conf,
        transport: T,
        handlers: H,
    ) -> Result<Self> {
        let userid_self = userid_self.into();
        let clientid_self = clientid_self.into();

        if userid_self.is_empty() || clientid_self.is_empty() {
            return Err(Error::Invalid);
        }

        Ok(Self {
            userid_self,
            clientid_self,
            clientid_remote: String::new(),
            sessid_local: random_sessid(),
            sessid_remote: String::new(),
            state: State::Idle,
            direction: Direction::Unknown,
            conflict: Conflict::None,
            setup_err: None,
            pending_err: None,
            conf,
            timer: None,
            transport,
            handlers,
            closed: false,
        })
    }

    // -- accessors --------------------------------------------------------

    pub fn state(&self) -> State {
        self.state
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn conflict(&self) -> Conflict {
        self.conflict
    }

    pub fn clientid_remote(&self) -> &str {
        &self.clientid_remote
    }

    pub fn sessid_local(&self) -> &str {
        &self.sessid_local
    }

    pub fn sessid_remote(&self) -> &str {
        &self.sessid_remote
    }

    pub fn setup_err(&self) -> Option<Error> {
        self.setup_err
    }

    /// The deadline the owning event loop should wake us up at, if any
    /// timer is currently scheduled. See SPEC_FULL §5: this crate never
    /// sleeps on its own.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.map(|t| t.deadline())
    }

    pub fn handlers_mut(&mut self) -> &mut H {
        &mut self.handlers
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // -- internal helpers ---------------------------------------------------

    fn set_state(&mut self, state: State) {
        log::debug!(
            "econn[{}]: {} -> {}",
            self.userid_self,
            self.state,
            state
        );
        self.state = state;
    }

    fn start_timer(&mut self, kind: TimerKind, now: Instant, after: Duration) {
        self.timer = Some(Timer::start(kind, now, after));
    }

    fn cancel_timer(&mut self) {
        self.timer = None;
    }

    /// Sends a SETUP-family message (SETUP or UPDATE, request or
    /// response). A transport failure here drives the connection straight
    /// to `Terminating`, mirroring `econn_send_setup`'s error path.
    fn send_setup_family(&mut self, msg: &Message) -> Result<()> {
        if let Err(err) = self.transport.send(msg) {
            log::warn!("econn[{}]: send_setup failed: {err}", self.userid_self);
            self.setup_err = Some(err);
            self.set_state(State::Terminating);
            return Err(err);
        }
        Ok(())
    }

    /// Sends CANCEL/HANGUP/PROPSYNC. Failures are reported to the caller
    /// but never force a state transition by themselves.
    fn send_plain(&mut self, msg: &Message) -> Result<()> {
        self.transport.send(msg)
    }

    /// Invokes `on_close` at most once, as required by invariant 6.
    fn close(&mut self, err: Option<Error>) {
        if self.closed {
            return;
        }

        self.cancel_timer();
        self.setup_err = err;

        if self.state == State::PendingOutgoing {
            let msg = Message::new_cancel(self.sessid_local.clone());
            let _ = self.send_plain(&msg);
        }

        self.set_state(State::Terminating);

        // Latch before invoking: the handler must see a connection that's
        // already fully terminated, and must not be able to re-trigger
        // this same callback by reentering.
        self.closed = true;
        if let Some(err) = err {
            log::info!("econn[{}]: connection closed ({err})", self.userid_self);
        } else {
            log::info!("econn[{}]: connection closed (normal)", self.userid_self);
        }
        self.handlers.on_close(err);
    }

    fn reject_stale_clientid(&self, clientid_sender: &str) -> bool {
        !self.clientid_remote.is_empty()
            && !self.clientid_remote.eq_ignore_ascii_case(clientid_sender)
    }

    fn reject_stale_sessid(&self, sessid_sender: &str) -> bool {
        !self.sessid_remote.is_empty() && self.sessid_remote != sessid_sender
    }

    // -- intent operations (4.C) --------------------------------------------

    /// Places an outgoing call.
    pub fn start(&mut self, now: Instant, sdp: impl Into<String>, props: Option<Props>) -> Result<()> {
        match self.state {
            State::Idle | State::PendingOutgoing => {}
            other => {
                log::warn!("econn[{}]: start: invalid state {other}", self.userid_self);
                return Err(Error::Protocol);
            }
        }

        if self.conf.timeout_setup.is_zero() {
            log::warn!("econn[{}]: start: illegal timer value 0", self.userid_self);
            return Err(Error::Protocol);
        }

        self.direction = Direction::Outgoing;
        self.set_state(State::PendingOutgoing);

        let msg = Message::new_setup(self.sessid_local.clone(), false, sdp, props);
        self.send_setup_family(&msg)?;

        self.start_timer(TimerKind::Setup, now, self.conf.timeout_setup);
        Ok(())
    }

    /// Answers a pending incoming call or a glare-reset offer.
    pub fn answer(&mut self, sdp: impl Into<String>, props: Option<Props>) -> Result<()> {
        match self.state {
            State::PendingIncoming | State::ConflictResolution => {}
            other => {
                log::warn!("econn[{}]: answer: invalid state {other}", self.userid_self);
                return Err(Error::Protocol);
            }
        }

        self.cancel_timer();

        let msg = Message::new_setup(self.sessid_local.clone(), true, sdp, props);
        self.send_setup_family(&msg)?;

        self.set_state(State::Answered);
        Ok(())
    }

    /// Sends a re-negotiation (UPDATE) offer.
    pub fn update_req(&mut self, now: Instant, sdp: impl Into<String>, props: Option<Props>) -> Result<()> {
        match self.state {
            State::Answered | State::DatachanEstablished => {}
            other => {
                log::warn!("econn[{}]: update_req: invalid state {other}", self.userid_self);
                return Err(Error::Protocol);
            }
        }

        if self.conf.timeout_setup.is_zero() {
            log::warn!("econn[{}]: update_req: illegal timer value 0", self.userid_self);
            return Err(Error::Protocol);
        }

        self.set_state(State::UpdateSent);

        let msg = Message::new_update(self.sessid_local.clone(), false, sdp, props);
        self.send_setup_family(&msg)?;

        self.start_timer(TimerKind::Setup, now, self.conf.timeout_setup);
        Ok(())
    }

    /// Answers a received UPDATE offer.
    pub fn update_resp(&mut self, sdp: impl Into<String>, props: Option<Props>) -> Result<()> {
        if self.state != State::UpdateRecv {
            log::warn!("econn[{}]: update_resp: invalid state {}", self.userid_self, self.state);
            return Err(Error::Protocol);
        }

        self.cancel_timer();

        let msg = Message::new_update(self.sessid_local.clone(), true, sdp, props);
        self.send_setup_family(&msg)?;

        self.set_state(State::Answered);
        Ok(())
    }

    /// Terminates the call for the current state, per 4.C `end()`.
    pub fn end(&mut self, now: Instant) {
        log::info!("econn[{}]: end (state={})", self.userid_self, self.state);

        match self.state {
            State::PendingIncoming => {
                self.set_state(State::Terminating);
                self.start_timer(TimerKind::Cancel, now, Duration::from_millis(1));
            }
            State::PendingOutgoing | State::Answered | State::ConflictResolution => {
                let msg = Message::new_cancel(self.sessid_local.clone());
                if let Err(err) = self.send_plain(&msg) {
                    log::warn!("econn[{}]: end: send_cancel failed: {err}", self.userid_self);
                }
                self.set_state(State::Terminating);
                self.start_timer(TimerKind::Cancel, now, Duration::from_millis(1));
            }
            State::DatachanEstablished => {
                let msg = Message::new_hangup(self.sessid_local.clone(), false);
                if let Err(err) = self.send_plain(&msg) {
                    log::warn!("econn[{}]: end: send_hangup failed: {err}", self.userid_self);
                }
                self.set_state(State::HangupSent);
                self.start_timer(TimerKind::Termination, now, self.conf.timeout_term);
            }
            other => {
                log::warn!("econn[{}]: end: cannot end in state {other}", self.userid_self);
            }
        }
    }

    /// Marks the media/data channel as up. Only legal from `Answered`.
    pub fn set_datachan_established(&mut self) {
        if self.state == State::Answered {
            self.set_state(State::DatachanEstablished);
        } else {
            log::warn!(
                "econn[{}]: set_datachan_established: illegal state {}",
                self.userid_self,
                self.state
            );
        }
    }

    /// Sends an out-of-band property sync. Only legal once the data
    /// channel is established.
    pub fn send_propsync(&mut self, resp: bool, props: Props) -> Result<()> {
        if self.state != State::DatachanEstablished {
            return Err(Error::Protocol);
        }

        let msg = Message::new_propsync(self.sessid_local.clone(), resp, props);
        self.send_plain(&msg)
    }

    /// Stashes an error to be surfaced as the `err` of the next close.
    pub fn set_error(&mut self, err: Error) {
        self.pending_err = Some(err);
    }

    // -- inbound dispatch (4.D) ---------------------------------------------

    /// Dispatches an inbound message. `userid_sender`/`clientid_sender`
    /// identify the peer that sent it (as reported by the transport, not
    /// by the message body).
    pub fn recv(&mut self, now: Instant, userid_sender: &str, clientid_sender: &str, msg: Message) {
        if self.closed {
            return;
        }

        match msg.kind() {
            MessageKind::Setup => self.recv_setup(now, userid_sender, clientid_sender, msg),
            MessageKind::Update => self.recv_update(now, userid_sender, clientid_sender, msg),
            MessageKind::Cancel => self.recv_cancel(clientid_sender, &msg),
            MessageKind::Hangup => self.recv_hangup(&msg),
            MessageKind::Propsync => {
                log::debug!("econn[{}]: recv: propsync notifications are transport-only", self.userid_self);
            }
        }
    }

    fn bind_clientid_remote(&mut self, clientid_sender: &str) -> bool {
        if self.reject_stale_clientid(clientid_sender) {
            log::info!(
                "econn[{}]: remote clientid already set to `{}' - dropping message from `{}'",
                self.userid_self,
                self.clientid_remote,
                clientid_sender
            );
            return false;
        }

        if self.clientid_remote.is_empty() {
            self.clientid_remote = clientid_sender.to_string();
        }

        true
    }

    fn recv_setup(&mut self, now: Instant, userid_sender: &str, clientid_sender: &str, msg: Message) {
        if !self.bind_clientid_remote(clientid_sender) {
            return;
        }

        let is_request = msg.is_request();
        let sessid_sender = msg.sessid_sender.clone();
        let msg_time = msg.time;
        let age = msg.age;

        let (sdp_msg, props) = match msg.payload {
            Payload::Setup { sdp_msg, props } => (sdp_msg, props),
            _ => unreachable!("dispatched by MessageKind::Setup"),
        };

        if is_request {
            self.handle_setup_request(now, userid_sender, clientid_sender, &sessid_sender, msg_time, age, sdp_msg, props);
        } else {
            self.handle_setup_response(&sessid_sender, sdp_msg, props);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_setup_request(
        &mut self,
        now: Instant,
        userid_sender: &str,
        clientid_sender: &str,
        sessid_sender: &str,
        msg_time: u64,
        age: u64,
        sdp_msg: String,
        props: Option<Props>,
    ) {
        match self.state {
            State::Idle => {
                self.set_state(State::PendingIncoming);
                self.direction = Direction::Incoming;
                self.sessid_remote = sessid_sender.to_string();
                self.start_timer(TimerKind::Setup, now, self.conf.timeout_setup);

                self.handlers.on_incoming(
                    msg_time,
                    userid_sender,
                    clientid_sender,
                    age,
                    &sdp_msg,
                    props.as_ref(),
                );
            }
            State::PendingOutgoing => {
                let is_winner = tiebreak(&self.userid_self, &self.clientid_self, userid_sender, clientid_sender);

                log::info!("econn[{}]: conflict: is_winner={is_winner}", self.userid_self);

                self.sessid_remote = sessid_sender.to_string();

                if is_winner {
                    self.conflict = Conflict::Winner;
                    // Drop the remote offer, stay in PendingOutgoing and
                    // wait for the peer's own SETUP response.
                } else {
                    self.conflict = Conflict::Loser;
                    self.set_state(State::ConflictResolution);
                    self.handlers.on_answer(true, &sdp_msg, props.as_ref());
                }
            }
            other => {
                log::warn!(
                    "econn[{}.{}]: recv_setup: ignoring SETUP request in wrong state '{other}'",
                    self.userid_self,
                    self.clientid_self
                );
            }
        }
    }

    fn handle_setup_response(&mut self, sessid_sender: &str, sdp_msg: String, props: Option<Props>) {
        match self.state {
            State::PendingOutgoing | State::ConflictResolution => {}
            other => {
                log::info!(
                    "econn[{}]: recv_setup: ignoring SETUP response in wrong state '{other}'",
                    self.userid_self
                );
                return;
            }
        }

        self.cancel_timer();
        self.set_state(State::Answered);
        self.sessid_remote = sessid_sender.to_string();

        self.handlers.on_answer(false, &sdp_msg, props.as_ref());
    }

    fn recv_update(&mut self, now: Instant, userid_sender: &str, clientid_sender: &str, msg: Message) {
        if self.reject_stale_clientid(clientid_sender) {
            log::warn!(
                "econn[{}]: ignoring update from wrong clientid: expected `{}' got `{}'",
                self.userid_self,
                self.clientid_remote,
                clientid_sender
            );
            return;
        }

        if self.reject_stale_sessid(&msg.sessid_sender) {
            log::warn!(
                "econn[{}]: recv_update: remote session id mismatch ({} vs {})",
                self.userid_self,
                self.sessid_remote,
                msg.sessid_sender
            );
            return;
        }

        let is_request = msg.is_request();

        let (sdp_msg, props) = match msg.payload {
            Payload::Update { sdp_msg, props } => (sdp_msg, props),
            _ => unreachable!("dispatched by MessageKind::Update"),
        };

        if is_request {
            self.handle_update_request(now, userid_sender, clientid_sender, sdp_msg, props);
        } else {
            self.handle_update_response(sdp_msg, props);
        }
    }

    fn handle_update_request(
        &mut self,
        now: Instant,
        userid_sender: &str,
        clientid_sender: &str,
        sdp_msg: String,
        props: Option<Props>,
    ) {
        let mut should_reset = false;

        match self.state {
            State::Answered | State::DatachanEstablished => {
                self.set_state(State::UpdateRecv);
            }
            State::UpdateSent => {
                let is_winner = tiebreak(&self.userid_self, &self.clientid_self, userid_sender, clientid_sender);

                log::info!("econn[{}]: update glare: is_winner={is_winner}", self.userid_self);

                if is_winner {
                    // Drop the remote offer; `conflict` is reserved for
                    // SETUP glare only (SPEC_FULL §4.D, Open Question 4).
                    return;
                }

                self.set_state(State::UpdateRecv);
                should_reset = true;
            }
            other => {
                log::warn!(
                    "econn[{}.{}]: recv_update: ignoring UPDATE request in wrong state '{other}'",
                    self.userid_self,
                    self.clientid_self
                );
                return;
            }
        }

        self.start_timer(TimerKind::Setup, now, self.conf.timeout_setup);

        self.handlers.on_update_req(userid_sender, clientid_sender, &sdp_msg, props.as_ref(), should_reset);
    }

    fn handle_update_response(&mut self, sdp_msg: String, props: Option<Props>) {
        if self.state != State::UpdateSent {
            log::info!(
                "econn[{}]: recv_update: ignoring UPDATE response in wrong state '{}'",
                self.userid_self,
                self.state
            );
            return;
        }

        self.cancel_timer();
        self.set_state(State::Answered);

        self.handlers.on_update_resp(&sdp_msg, props.as_ref());
    }

    fn recv_cancel(&mut self, clientid_sender: &str, msg: &Message) {
        if self.reject_stale_clientid(clientid_sender) {
            log::info!(
                "econn[{}]: recv_cancel: clientid mismatch (remote={}, sender={clientid_sender})",
                self.userid_self,
                self.clientid_remote
            );
            return;
        }

        match self.state {
            State::PendingIncoming | State::Answered | State::DatachanEstablished => {}
            other => {
                log::info!("econn[{}]: recv_cancel: ignoring CANCEL in state '{other}'", self.userid_self);
                return;
            }
        }

        if self.reject_stale_sessid(&msg.sessid_sender) {
            log::warn!("econn[{}]: recv_cancel: remote session id mismatch", self.userid_self);
            return;
        }

        self.close(Some(Error::Cancelled));
    }

    fn recv_hangup(&mut self, msg: &Message) {
        if self.reject_stale_sessid(&msg.sessid_sender) {
            log::warn!(
                "econn[{}]: recv_hangup: remote session id mismatch ({} vs {})",
                self.userid_self,
                self.sessid_remote,
                msg.sessid_sender
            );
            return;
        }

        match self.state {
            State::DatachanEstablished | State::HangupSent => {}
            other => {
                log::warn!("econn[{}]: recv_hangup: ignoring HANGUP in state {other}", self.userid_self);
                return;
            }
        }

        self.set_state(State::HangupRecv);

        if msg.is_request() {
            let response = Message::new_hangup(self.sessid_local.clone(), true);
            if let Err(err) = self.send_plain(&response) {
                log::warn!("econn[{}]: send_hangup failed: {err}", self.userid_self);
            }
        }

        self.close(None);
    }

    // -- timer driving (4.F) -------------------------------------------------

    /// Must be called by the owning event loop once `now` has reached or
    /// passed [`next_deadline`](Self::next_deadline). A no-op otherwise, so
    /// it is safe to call speculatively on every loop tick.
    pub fn poll_timeout(&mut self, now: Instant) {
        let Some(timer) = self.timer else { return };
        if !timer.is_expired(now) {
            return;
        }

        match timer.kind() {
            TimerKind::Setup => {
                log::info!("econn[{}]: setup timeout (state={})", self.userid_self, self.state);
                self.close(Some(Error::TimedOut));
            }
            TimerKind::Termination | TimerKind::Cancel => {
                let err = self.pending_err;
                self.close(err);
            }
        }
    }
}

/// Deterministic, symmetric glare tiebreak: the peer whose
/// `user_id || "|" || client_id` sorts lexicographically larger wins.
///
/// Antisymmetric by construction (string comparison has no ties between
/// distinct peers), and `tiebreak(a, a)` always resolves to `false` since
/// `Ordering::Equal` is not `Greater`.
fn tiebreak(self_user: &str, self_client: &str, peer_user: &str, peer_client: &str) -> bool {
    let ours = format!("{self_user}|{self_client}");
    let theirs = format!("{peer_user}|{peer_client}");
    ours > theirs
}

impl<T: Transport, H: Handlers> std::fmt::Display for Connection<T, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "~~~~~ econn ~~~~~")?;
        write!(f, "state:            {}", self.state)?;
        if self.direction != Direction::Unknown {
            write!(f, "  ({})", self.direction)?;
        }
        writeln!(f)?;
        writeln!(f, "clientid_remote:  {}", self.clientid_remote)?;
        writeln!(f, "session:          {}|{}", self.sessid_local, self.sessid_remote)?;

        match self.timer {
            Some(timer) => match timer.remaining(Instant::now()) {
                Some(remaining) => writeln!(f, "timer_local:      {} seconds", remaining.as_secs())?,
                None => writeln!(f, "timer_local:      (expired)")?,
            },
            None => writeln!(f, "timer_local:      (not running)")?,
        }

        if let Some(err) = self.setup_err {
            writeln!(f, "setup_error:      \"{err}\"")?;
        }

        writeln!(f, "conflict:         {}", self.conflict)?;

        Ok(())
    }
}
