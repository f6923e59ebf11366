//! Control frames and inbound frame classification
//!
//! Outbound: `{op, args, req_id}` for subscribe/unsubscribe and `{op:"ping", req_id}`.
//! Inbound frames are classified into heartbeat replies, command acks and
//! topic payloads by [`parse_frame`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use types::Topic;

use crate::error::{ProtocolError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Subscribe,
    Unsubscribe,
    Ping,
}

/// Client-to-server control frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlFrame {
    pub op: Op,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    pub req_id: String,
}

impl ControlFrame {
    pub fn subscribe<'a>(topics: impl IntoIterator<Item = &'a Topic>, req_id: impl Into<String>) -> Self {
        Self {
            op: Op::Subscribe,
            args: topics.into_iter().map(|t| t.to_string()).collect(),
            req_id: req_id.into(),
        }
    }

    pub fn unsubscribe<'a>(
        topics: impl IntoIterator<Item = &'a Topic>,
        req_id: impl Into<String>,
    ) -> Self {
        Self {
            op: Op::Unsubscribe,
            args: topics.into_iter().map(|t| t.to_string()).collect(),
            req_id: req_id.into(),
        }
    }

    pub fn ping(req_id: impl Into<String>) -> Self {
        Self {
            op: Op::Ping,
            args: Vec::new(),
            req_id: req_id.into(),
        }
    }

    pub fn to_json(&self) -> String {
        // Serialization of this struct cannot fail: all fields are plain strings.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Topic payload frame
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    pub topic: String,
    /// `snapshot` or `delta` where the venue sends it
    pub kind: Option<String>,
    /// Venue timestamp, ms
    pub ts: Option<i64>,
    pub data: Value,
}

/// Classified server-to-client frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Heartbeat reply
    Pong { req_id: Option<String> },
    /// Server-initiated ping
    Ping { req_id: Option<String> },
    /// Reply to subscribe/unsubscribe
    CommandAck {
        op: String,
        success: bool,
        ret_msg: Option<String>,
        req_id: Option<String>,
    },
    Data(DataFrame),
}

/// Classify one text frame.
pub fn parse_frame(text: &str) -> Result<InboundFrame> {
    let value: Value = serde_json::from_str(text)?;
    let obj = value
        .as_object()
        .ok_or_else(|| ProtocolError::unexpected("frame is not a JSON object"))?;

    let str_field = |name: &str| obj.get(name).and_then(Value::as_str).map(str::to_string);

    if let Some(topic) = obj.get("topic").and_then(Value::as_str) {
        let data = obj
            .get("data")
            .cloned()
            .ok_or(ProtocolError::MissingField {
                field: "data",
                context: "topic frame",
            })?;
        return Ok(InboundFrame::Data(DataFrame {
            topic: topic.to_string(),
            kind: str_field("type"),
            ts: obj.get("ts").and_then(Value::as_i64),
            data,
        }));
    }

    let op = obj
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::unexpected("frame has neither topic nor op"))?;
    let req_id = str_field("req_id").filter(|s| !s.is_empty());
    let ret_msg = str_field("ret_msg");

    match op {
        "pong" => Ok(InboundFrame::Pong { req_id }),
        // Public endpoints answer a ping with op=ping and ret_msg=pong
        "ping" if ret_msg.as_deref() == Some("pong") => Ok(InboundFrame::Pong { req_id }),
        "ping" => Ok(InboundFrame::Ping { req_id }),
        "subscribe" | "unsubscribe" => Ok(InboundFrame::CommandAck {
            op: op.to_string(),
            success: obj.get("success").and_then(Value::as_bool).unwrap_or(true),
            ret_msg: ret_msg.filter(|s| !s.is_empty()),
            req_id,
        }),
        other => Err(ProtocolError::unexpected(format!("unknown op '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_frame_json() {
        let topics = [Topic::from("kline.5.BTCUSDT")];
        let frame = ControlFrame::subscribe(&topics, "7");
        assert_eq!(
            frame.to_json(),
            r#"{"op":"subscribe","args":["kline.5.BTCUSDT"],"req_id":"7"}"#
        );
    }

    #[test]
    fn test_ping_frame_omits_args() {
        assert_eq!(ControlFrame::ping("1").to_json(), r#"{"op":"ping","req_id":"1"}"#);
    }
}
