//! The application callback surface (component F, notification side).

use crate::error::Error;
use crate::props::Props;

/// Notification hooks the application supplies. Every method has a no-op
/// default, matching the "absence = no notification" contract without a
/// raw function-pointer capability table.
pub trait Handlers {
    /// A fresh inbound SETUP request bound us to a new incoming call.
    #[allow(unused_variables, clippy::too_many_arguments)]
    fn on_incoming(
        &mut self,
        msg_time: u64,
        userid_sender: &str,
        clientid_sender: &str,
        age: u64,
        sdp: &str,
        props: Option<&Props>,
    ) {
    }

    /// A SETUP response (possibly a glare-reset offer) arrived.
    #[allow(unused_variables)]
    fn on_answer(&mut self, reset: bool, sdp: &str, props: Option<&Props>) {}

    /// An UPDATE request arrived.
    #[allow(unused_variables, clippy::too_many_arguments)]
    fn on_update_req(
        &mut self,
        userid_sender: &str,
        clientid_sender: &str,
        sdp: &str,
        props: Option<&Props>,
        should_reset: bool,
    ) {
    }

    /// An UPDATE response arrived.
    #[allow(unused_variables)]
    fn on_update_resp(&mut self, sdp: &str, props: Option<&Props>) {}

    /// The connection has reached `Terminating` and will not notify again.
    #[allow(unused_variables)]
    fn on_close(&mut self, err: Option<Error>) {}
}

/// A [`Handlers`] impl that does nothing, for tests and for applications
/// that only want to drive the transport side.
#[derive(Debug, Default)]
pub struct NoHandlers;

impl Handlers for NoHandlers {}
