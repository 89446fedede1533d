//! JSON envelope framing for the roomchat wire protocol.
//!
//! Wire format: one WebSocket text frame per message, holding the JSON array
//! `[eventName, payload]`.

use serde_json::Value;

use crate::error::{ChatError, ChatResult};
use crate::messages::{value_text, ClientCommand};

/// A decoded `[eventName, payload]` pair.
///
/// The payload is kept opaque; interpreting it is the router's job.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub event: String,
    pub payload: Option<Value>,
}

impl Envelope {
    pub fn new(event: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }

    /// Serialize back to wire text. An absent payload yields a one-element array.
    pub fn to_text(&self) -> ChatResult<String> {
        match &self.payload {
            Some(payload) => encode(&self.event, payload),
            None => Ok(serde_json::to_string(&[&self.event])?),
        }
    }
}

/// Encode an event name and payload into the two-element JSON array.
pub fn encode(event: &str, payload: &Value) -> ChatResult<String> {
    Ok(serde_json::to_string(&(event, payload))?)
}

/// Encode a typed outgoing command. Payload fields keep their declared order.
pub fn encode_command(command: &ClientCommand) -> ChatResult<String> {
    let text = match command {
        ClientCommand::Join(p) => serde_json::to_string(&(command.event_name(), p))?,
        ClientCommand::Broadcast(p) => serde_json::to_string(&(command.event_name(), p))?,
        ClientCommand::PrivateMessage(p) => serde_json::to_string(&(command.event_name(), p))?,
    };
    Ok(text)
}

/// Decode wire text into an [`Envelope`].
///
/// Fails with [`ChatError::MalformedEnvelope`] if the text is not JSON, not an
/// array, or an empty array. Elements past the payload are ignored.
pub fn decode(text: &str) -> ChatResult<Envelope> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ChatError::MalformedEnvelope(format!("invalid JSON: {e}")))?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(ChatError::MalformedEnvelope(format!(
                "expected a JSON array, got {}",
                kind_of(&other)
            )))
        }
    };

    let mut items = items.into_iter();
    let event = items
        .next()
        .map(|v| value_text(&v))
        .ok_or_else(|| ChatError::MalformedEnvelope("empty envelope".into()))?;
    let payload = items.next();

    Ok(Envelope { event, payload })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::JoinRequest;
    use serde_json::json;

    #[test]
    fn round_trip_object_payload() {
        let payload = json!({"id": "abc", "message": "hello", "nested": {"n": [1, 2, 3]}});
        let text = encode("welcome", &payload).unwrap();
        let env = decode(&text).unwrap();
        assert_eq!(env.event, "welcome");
        assert_eq!(env.payload, Some(payload));
    }

    #[test]
    fn round_trip_scalar_payloads() {
        for payload in [json!("bad token"), json!(42), json!(null), json!([true, false])] {
            let text = encode("error", &payload).unwrap();
            let env = decode(&text).unwrap();
            assert_eq!(env.event, "error");
            assert_eq!(env.payload, Some(payload));
        }
    }

    #[test]
    fn encode_wire_shape() {
        let text = encode("error", &json!("bad token")).unwrap();
        assert_eq!(text, r#"["error","bad token"]"#);
    }

    #[test]
    fn encode_join_preserves_field_order() {
        let cmd = ClientCommand::Join(JoinRequest {
            room_id: "room1".into(),
            auth_token: "12345".into(),
            username: String::new(),
        });
        assert_eq!(
            encode_command(&cmd).unwrap(),
            r#"["join",{"roomId":"room1","authToken":"12345","username":""}]"#
        );
    }

    #[test]
    fn decode_single_element_has_no_payload() {
        let env = decode(r#"["ping"]"#).unwrap();
        assert_eq!(env.event, "ping");
        assert!(env.payload.is_none());
        assert_eq!(env.to_text().unwrap(), r#"["ping"]"#);
    }

    #[test]
    fn decode_ignores_trailing_elements() {
        let env = decode(r#"["message", {"from": "u1"}, "extra", 7]"#).unwrap();
        assert_eq!(env.event, "message");
        assert_eq!(env.payload, Some(json!({"from": "u1"})));
    }

    #[test]
    fn decode_non_string_event_name_uses_text_form() {
        assert_eq!(decode("[5, null]").unwrap().event, "5");
        assert_eq!(decode("[null]").unwrap().event, "");
    }

    #[test]
    fn decode_rejects_non_json() {
        let err = decode("not json").unwrap_err();
        assert!(matches!(err, ChatError::MalformedEnvelope(_)));
    }

    #[test]
    fn decode_rejects_non_array() {
        let err = decode(r#"{"event": "welcome"}"#).unwrap_err();
        match err {
            ChatError::MalformedEnvelope(msg) => assert!(msg.contains("an object")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_empty_array() {
        assert!(matches!(decode("[]"), Err(ChatError::MalformedEnvelope(_))));
    }
}
