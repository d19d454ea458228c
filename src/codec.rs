//! Event framing spoken by the game server.
//!
//! The server is a Socket.IO v5 endpoint. Every transport frame is one
//! Engine.IO v4 packet: a single ASCII type digit followed by an optional
//! payload. `message` packets (`4`) carry one Socket.IO packet, which again
//! starts with a type digit, followed by an optional namespace, an optional
//! acknowledgment id and an optional JSON payload:
//!
//! ```text
//! 0{"sid":"…","pingInterval":25000,…}   engine open (server → client)
//! 2 / 3                                 engine ping / pong
//! 40                                    socket connect (client → server)
//! 40{"sid":"…"}                         socket connect ack (server → client)
//! 42["timer-tick",12]                   event
//! 427["join-room",{"code":"ABCD"}]      event expecting ack #7
//! 437[{"success":true}]                 ack #7
//! 44{"message":"not authorized"}        socket connect error
//! ```
//!
//! Only the default namespace is used. Binary packets are rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ShadowSignalError};

/// Engine.IO handshake payload sent by the server in the `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Engine-level session id.
    pub sid: String,
    /// Transports the session may be upgraded to.
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Interval between server pings, in milliseconds.
    pub ping_interval: u64,
    /// Grace period after a missed ping, in milliseconds.
    pub ping_timeout: u64,
    /// Largest payload the server accepts, in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

/// One Engine.IO packet (one transport frame).
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Message(Packet),
    Upgrade,
    Noop,
}

/// One Socket.IO packet, carried inside [`Frame::Message`].
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Namespace connect. The client sends no payload (or an auth object);
    /// the server answers with `{"sid": …}`.
    Connect(Option<Value>),
    /// Namespace disconnect.
    Disconnect,
    /// Named event with positional arguments.
    Event {
        id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    /// Acknowledgment of the event with the same id.
    Ack { id: u64, args: Vec<Value> },
    /// The server refused the namespace connection.
    ConnectError { message: String },
}

impl Packet {
    /// Session id carried by a server connect ack, if any.
    pub fn connect_sid(&self) -> Option<&str> {
        match self {
            Packet::Connect(Some(data)) => data.get("sid").and_then(Value::as_str),
            _ => None,
        }
    }
}

impl Frame {
    /// Encode the frame as transport text.
    pub fn encode(&self) -> Result<String> {
        Ok(match self {
            Frame::Open(handshake) => format!("0{}", serde_json::to_string(handshake)?),
            Frame::Close => "1".to_string(),
            Frame::Ping => "2".to_string(),
            Frame::Pong => "3".to_string(),
            Frame::Message(packet) => format!("4{}", encode_packet(packet)?),
            Frame::Upgrade => "5".to_string(),
            Frame::Noop => "6".to_string(),
        })
    }

    /// Decode transport text into a frame.
    ///
    /// # Errors
    ///
    /// Returns [`ShadowSignalError::Protocol`] for unknown packet types,
    /// binary packets, missing fields and namespaces other than `/`, and
    /// [`ShadowSignalError::Serialization`] for malformed JSON payloads.
    pub fn decode(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| ShadowSignalError::Protocol("empty frame".into()))?;
        let rest = chars.as_str();
        match kind {
            '0' => Ok(Frame::Open(serde_json::from_str(rest)?)),
            '1' => Ok(Frame::Close),
            // Probe payloads ("2probe") only occur during transport upgrades.
            '2' => Ok(Frame::Ping),
            '3' => Ok(Frame::Pong),
            '4' => Ok(Frame::Message(decode_packet(rest)?)),
            '5' => Ok(Frame::Upgrade),
            '6' => Ok(Frame::Noop),
            other => Err(ShadowSignalError::Protocol(format!(
                "unknown engine packet type {other:?}"
            ))),
        }
    }
}

fn encode_packet(packet: &Packet) -> Result<String> {
    Ok(match packet {
        Packet::Connect(None) => "0".to_string(),
        Packet::Connect(Some(data)) => format!("0{}", serde_json::to_string(data)?),
        Packet::Disconnect => "1".to_string(),
        Packet::Event { id, name, args } => {
            let mut items = Vec::with_capacity(args.len() + 1);
            items.push(Value::String(name.clone()));
            items.extend(args.iter().cloned());
            let body = serde_json::to_string(&items)?;
            match id {
                Some(id) => format!("2{id}{body}"),
                None => format!("2{body}"),
            }
        }
        Packet::Ack { id, args } => format!("3{id}{}", serde_json::to_string(args)?),
        Packet::ConnectError { message } => {
            format!("4{}", serde_json::json!({ "message": message }))
        }
    })
}

fn decode_packet(text: &str) -> Result<Packet> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ShadowSignalError::Protocol("empty socket packet".into()))?;
    let rest = skip_namespace(chars.as_str())?;

    let id_len = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (id_text, data) = rest.split_at(id_len);
    let id = if id_text.is_empty() {
        None
    } else {
        Some(
            id_text
                .parse::<u64>()
                .map_err(|e| ShadowSignalError::Protocol(format!("bad ack id: {e}")))?,
        )
    };

    match kind {
        '0' => {
            if data.is_empty() {
                Ok(Packet::Connect(None))
            } else {
                Ok(Packet::Connect(Some(serde_json::from_str(data)?)))
            }
        }
        '1' => Ok(Packet::Disconnect),
        '2' => {
            let mut items = parse_array(data)?.into_iter();
            let name = match items.next() {
                Some(Value::String(name)) => name,
                _ => {
                    return Err(ShadowSignalError::Protocol(
                        "event packet without a name".into(),
                    ))
                }
            };
            Ok(Packet::Event {
                id,
                name,
                args: items.collect(),
            })
        }
        '3' => {
            let id =
                id.ok_or_else(|| ShadowSignalError::Protocol("ack packet without id".into()))?;
            Ok(Packet::Ack {
                id,
                args: parse_array(data)?,
            })
        }
        '4' => {
            let value: Value = if data.is_empty() {
                Value::Null
            } else {
                serde_json::from_str(data)?
            };
            let message = match value {
                Value::String(message) => message,
                Value::Object(ref map) => map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("connect error")
                    .to_string(),
                _ => "connect error".to_string(),
            };
            Ok(Packet::ConnectError { message })
        }
        '5' | '6' => Err(ShadowSignalError::Protocol(
            "binary packets are not supported".into(),
        )),
        other => Err(ShadowSignalError::Protocol(format!(
            "unknown socket packet type {other:?}"
        ))),
    }
}

/// Strip an explicit namespace prefix. Only the default namespace is accepted.
fn skip_namespace(text: &str) -> Result<&str> {
    if !text.starts_with('/') {
        return Ok(text);
    }
    let (namespace, rest) = match text.split_once(',') {
        Some((namespace, rest)) => (namespace, rest),
        None => (text, ""),
    };
    if namespace == "/" {
        Ok(rest)
    } else {
        Err(ShadowSignalError::Protocol(format!(
            "unexpected namespace {namespace}"
        )))
    }
}

fn parse_array(data: &str) -> Result<Vec<Value>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(data)? {
        Value::Array(items) => Ok(items),
        _ => Err(ShadowSignalError::Protocol(
            "packet payload is not an array".into(),
        )),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_open_handshake() {
        let frame = Frame::decode(
            r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();
        let Frame::Open(handshake) = frame else {
            panic!("expected open frame, got {frame:?}");
        };
        assert_eq!(handshake.sid, "lv_VI97HAXpY6yYWAAAC");
        assert_eq!(handshake.ping_interval, 25_000);
        assert_eq!(handshake.ping_timeout, 20_000);
        assert_eq!(handshake.max_payload, Some(1_000_000));
    }

    #[test]
    fn encodes_event_with_and_without_ack_id() {
        let event = Frame::Message(Packet::Event {
            id: Some(7),
            name: "join-room".into(),
            args: vec![json!({"code": "ABCD", "name": "Al"})],
        });
        assert_eq!(
            event.encode().unwrap(),
            r#"427["join-room",{"code":"ABCD","name":"Al"}]"#
        );

        let bare = Frame::Message(Packet::Event {
            id: None,
            name: "create-room".into(),
            args: vec![],
        });
        assert_eq!(bare.encode().unwrap(), r#"42["create-room"]"#);
    }

    #[test]
    fn decodes_ack_with_multi_digit_id() {
        let frame = Frame::decode(r#"4312[{"success":false,"error":"Room not found"}]"#).unwrap();
        assert_eq!(
            frame,
            Frame::Message(Packet::Ack {
                id: 12,
                args: vec![json!({"success": false, "error": "Room not found"})],
            })
        );
    }

    #[test]
    fn decodes_event_with_scalar_argument() {
        let frame = Frame::decode(r#"42["timer-tick",12]"#).unwrap();
        assert_eq!(
            frame,
            Frame::Message(Packet::Event {
                id: None,
                name: "timer-tick".into(),
                args: vec![json!(12)],
            })
        );
    }

    #[test]
    fn decodes_connect_ack_sid() {
        let Frame::Message(packet) = Frame::decode(r#"40{"sid":"wZX3oN0bSVIhsaknAAAI"}"#).unwrap()
        else {
            panic!("expected message frame");
        };
        assert_eq!(packet.connect_sid(), Some("wZX3oN0bSVIhsaknAAAI"));
    }

    #[test]
    fn decodes_connect_error_object_and_string() {
        assert_eq!(
            Frame::decode(r#"44{"message":"Not authorized"}"#).unwrap(),
            Frame::Message(Packet::ConnectError {
                message: "Not authorized".into()
            })
        );
        assert_eq!(
            Frame::decode(r#"44"Invalid namespace""#).unwrap(),
            Frame::Message(Packet::ConnectError {
                message: "Invalid namespace".into()
            })
        );
    }

    #[test]
    fn default_namespace_prefix_is_accepted() {
        let frame = Frame::decode(r#"42/,["timer-tick",3]"#).unwrap();
        assert!(matches!(
            frame,
            Frame::Message(Packet::Event { ref name, .. }) if name == "timer-tick"
        ));
    }

    #[test]
    fn rejects_foreign_namespace_binary_and_garbage() {
        assert!(matches!(
            Frame::decode(r#"42/admin,["x"]"#),
            Err(ShadowSignalError::Protocol(_))
        ));
        assert!(matches!(
            Frame::decode(r#"451-["upload",{"_placeholder":true,"num":0}]"#),
            Err(ShadowSignalError::Protocol(_))
        ));
        assert!(matches!(
            Frame::decode(""),
            Err(ShadowSignalError::Protocol(_))
        ));
        assert!(matches!(
            Frame::decode("9"),
            Err(ShadowSignalError::Protocol(_))
        ));
        assert!(matches!(
            Frame::decode(r#"42{"not":"an array"}"#),
            Err(ShadowSignalError::Protocol(_))
        ));
        assert!(matches!(
            Frame::decode("43[]"),
            Err(ShadowSignalError::Protocol(_))
        ));
    }

    #[test]
    fn control_frames_encode_to_single_digits() {
        assert_eq!(Frame::Ping.encode().unwrap(), "2");
        assert_eq!(Frame::Pong.encode().unwrap(), "3");
        assert_eq!(Frame::Close.encode().unwrap(), "1");
        assert_eq!(
            Frame::Message(Packet::Connect(None)).encode().unwrap(),
            "40"
        );
        assert_eq!(Frame::decode("2probe").unwrap(), Frame::Ping);
    }
}
