//! Message model and JSON wire codec (component A).
//!
//! The wire format is a single fixed protocol version. See [`encode`] and
//! [`decode`] for the exact failure modes.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::props::Props;

/// Protocol version embedded in every wire message and checked on decode.
pub const PROTOCOL_VERSION: &str = "3.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Setup,
    Update,
    Cancel,
    Hangup,
    Propsync,
}

impl MessageKind {
    /// Lower-case wire name, used verbatim on encode.
    pub fn name(self) -> &'static str {
        match self {
            MessageKind::Setup => "setup",
            MessageKind::Update => "update",
            MessageKind::Cancel => "cancel",
            MessageKind::Hangup => "hangup",
            MessageKind::Propsync => "propsync",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("setup") {
            Some(MessageKind::Setup)
        } else if s.eq_ignore_ascii_case("update") {
            Some(MessageKind::Update)
        } else if s.eq_ignore_ascii_case("cancel") {
            Some(MessageKind::Cancel)
        } else if s.eq_ignore_ascii_case("hangup") {
            Some(MessageKind::Hangup)
        } else if s.eq_ignore_ascii_case("propsync") {
            Some(MessageKind::Propsync)
        } else {
            None
        }
    }
}

/// Per-kind payload. Kept apart from the common envelope fields the same
/// way the original `union` separated kind-specific data from the shared
/// header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Setup { sdp_msg: String, props: Option<Props> },
    Update { sdp_msg: String, props: Option<Props> },
    Cancel,
    Hangup,
    Propsync { props: Option<Props> },
}

/// A single signaling message, either in flight for [`encode`] or freshly
/// produced by [`decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sessid_sender: String,
    pub resp: bool,
    /// Ingest timestamp supplied by the caller at decode time (ms).
    pub time: u64,
    /// `max(0, curr_time - msg_time)`, inferred at decode time (ms).
    pub age: u64,
    pub payload: Payload,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self.payload {
            Payload::Setup { .. } => MessageKind::Setup,
            Payload::Update { .. } => MessageKind::Update,
            Payload::Cancel => MessageKind::Cancel,
            Payload::Hangup => MessageKind::Hangup,
            Payload::Propsync { .. } => MessageKind::Propsync,
        }
    }

    /// A request expects a matching response; `resp` flags the opposite.
    pub fn is_request(&self) -> bool {
        !self.resp
    }

    pub fn new_setup(sessid_sender: impl Into<String>, resp: bool, sdp_msg: impl Into<String>, props: Option<Props>) -> Self {
        Self {
            sessid_sender: sessid_sender.into(),
            resp,
            time: 0,
            age: 0,
            payload: Payload::Setup { sdp_msg: sdp_msg.into(), props },
        }
    }

    pub fn new_update(sessid_sender: impl Into<String>, resp: bool, sdp_msg: impl Into<String>, props: Option<Props>) -> Self {
        Self {
            sessid_sender: sessid_sender.into(),
            resp,
            time: 0,
            age: 0,
            payload: Payload::Update { sdp_msg: sdp_msg.into(), props },
        }
    }

    pub fn new_cancel(sessid_sender: impl Into<String>) -> Self {
        Self {
            sessid_sender: sessid_sender.into(),
            resp: false,
            time: 0,
            age: 0,
            payload: Payload::Cancel,
        }
    }

    pub fn new_hangup(sessid_sender: impl Into<String>, resp: bool) -> Self {
        Self {
            sessid_sender: sessid_sender.into(),
            resp,
            time: 0,
            age: 0,
            payload: Payload::Hangup,
        }
    }

    pub fn new_propsync(sessid_sender: impl Into<String>, resp: bool, props: Props) -> Self {
        Self {
            sessid_sender: sessid_sender.into(),
            resp,
            time: 0,
            age: 0,
            payload: Payload::Propsync { props: Some(props) },
        }
    }
}

/// Flat on-wire envelope. Kept separate from [`Message`] because the wire
/// shape has no nested tagging: `type` is just one more flat string field.
#[derive(Debug, Serialize, Deserialize)]
struct Wire {
    version: String,
    #[serde(rename = "type")]
    kind: String,
    sessid: String,
    resp: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    sdp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    props: Option<Props>,
}

/// Encodes a message to its JSON wire representation.
///
/// Fails with [`Error::Invalid`] if `sessid_sender` or a required `sdp_msg`
/// is empty, or if a `propsync` message carries no props. Field order in
/// the emitted object is stable but not meaningful to receivers.
pub fn encode(msg: &Message) -> Result<String> {
    if msg.sessid_sender.is_empty() {
        return Err(Error::Invalid);
    }

    let (sdp, props) = match &msg.payload {
        Payload::Setup { sdp_msg, props } | Payload::Update { sdp_msg, props } => {
            if sdp_msg.is_empty() {
                return Err(Error::Invalid);
            }
            (Some(sdp_msg.clone()), props.clone())
        }
        Payload::Cancel | Payload::Hangup => (None, None),
        Payload::Propsync { props } => {
            let props = props.clone().ok_or(Error::Invalid)?;
            (None, Some(props))
        }
    };

    let wire = Wire {
        version: PROTOCOL_VERSION.to_string(),
        kind: msg.kind().name().to_string(),
        sessid: msg.sessid_sender.clone(),
        resp: msg.resp,
        sdp,
        props,
    };

    serde_json::to_string(&wire).map_err(|_| Error::BadMessage)
}

/// Decodes a JSON wire message.
///
/// `curr_time`/`msg_time` are both caller-supplied millisecond timestamps
/// used to compute [`Message::age`]; this module performs no clock I/O of
/// its own.
pub fn decode(curr_time: u64, msg_time: u64, raw: &str) -> Result<Message> {
    let wire: Wire = serde_json::from_str(raw).map_err(|_| Error::BadMessage)?;

    if wire.version != PROTOCOL_VERSION {
        return Err(Error::Protocol);
    }

    if wire.sessid.is_empty() {
        return Err(Error::BadMessage);
    }

    let kind = MessageKind::parse(&wire.kind).ok_or(Error::BadMessage)?;

    let payload = match kind {
        MessageKind::Setup => {
            let sdp_msg = wire.sdp.filter(|s| !s.is_empty()).ok_or(Error::BadMessage)?;
            Payload::Setup { sdp_msg, props: wire.props }
        }
        MessageKind::Update => {
            let sdp_msg = wire.sdp.filter(|s| !s.is_empty()).ok_or(Error::BadMessage)?;
            Payload::Update { sdp_msg, props: wire.props }
        }
        MessageKind::Cancel => Payload::Cancel,
        MessageKind::Hangup => Payload::Hangup,
        MessageKind::Propsync => {
            let props = wire.props.ok_or(Error::BadMessage)?;
            Payload::Propsync { props: Some(props) }
        }
    };

    let age = curr_time.saturating_sub(msg_time);

    Ok(Message {
        sessid_sender: wire.sessid,
        resp: wire.resp,
        time: msg_time,
        age,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_roundtrips() {
        let mut props = Props::new();
        props.add("audio", "opus");

        let msg = Message::new_setup("ab12c", false, "v=0 offer", Some(props));
        let encoded = encode(&msg).unwrap();
        let decoded = decode(1_000, 1_000, &encoded).unwrap();

        assert_eq!(decoded.sessid_sender, "ab12c");
        assert!(decoded.is_request());
        assert_eq!(decoded.payload, msg.payload);
    }

    #[test]
    fn cancel_and_hangup_have_no_payload() {
        let cancel = Message::new_cancel("sid01");
        let encoded = encode(&cancel).unwrap();
        assert!(!encoded.contains("sdp"));
        let decoded = decode(0, 0, &encoded).unwrap();
        assert_eq!(decoded.payload, Payload::Cancel);

        let hangup = Message::new_hangup("sid01", true);
        let encoded = encode(&hangup).unwrap();
        let decoded = decode(0, 0, &encoded).unwrap();
        assert_eq!(decoded.payload, Payload::Hangup);
        assert!(decoded.resp);
    }

    #[test]
    fn propsync_requires_props_on_encode_and_decode() {
        let msg = Message {
            sessid_sender: "sid01".into(),
            resp: false,
            time: 0,
            age: 0,
            payload: Payload::Propsync { props: None },
        };
        assert_eq!(encode(&msg), Err(Error::Invalid));

        let raw = r#"{"version":"3.0","type":"propsync","sessid":"sid01","resp":false}"#;
        assert_eq!(decode(0, 0, raw), Err(Error::BadMessage));
    }

    #[test]
    fn decode_rejects_version_mismatch() {
        let raw = r#"{"version":"2.0","type":"setup","sessid":"s","resp":false,"sdp":"x"}"#;
        assert_eq!(decode(0, 0, raw), Err(Error::Protocol));
    }

    #[test]
    fn decode_rejects_unknown_type() {
        let raw = r#"{"version":"3.0","type":"frobnicate","sessid":"s","resp":false}"#;
        assert_eq!(decode(0, 0, raw), Err(Error::BadMessage));
    }

    #[test]
    fn decode_rejects_missing_sessid() {
        let raw = r#"{"version":"3.0","type":"cancel","sessid":"","resp":false}"#;
        assert_eq!(decode(0, 0, raw), Err(Error::BadMessage));
    }

    #[test]
    fn decode_computes_age_from_caller_supplied_timestamps() {
        let raw = r#"{"version":"3.0","type":"cancel","sessid":"s","resp":false}"#;
        let decoded = decode(5_000, 4_200, raw).unwrap();
        assert_eq!(decoded.time, 4_200);
        assert_eq!(decoded.age, 800);

        // msg_time in the future clamps age to 0
        let decoded = decode(1_000, 4_200, raw).unwrap();
        assert_eq!(decoded.age, 0);
    }

    #[test]
    fn setup_update_props_are_optional_on_decode() {
        let raw = r#"{"version":"3.0","type":"update","sessid":"s","resp":false,"sdp":"x"}"#;
        let decoded = decode(0, 0, raw).unwrap();
        match decoded.payload {
            Payload::Update { props, .. } => assert!(props.is_none()),
            _ => panic!("expected update payload"),
        }
    }
}
