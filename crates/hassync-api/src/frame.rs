//! Protocol frames and the JSON codec.
//!
//! One JSON object per WebSocket text message, discriminated by a `type`
//! field. Encoding and decoding are pure; nothing here holds state.
//!
//! Client frames carry a positive integer `id` chosen by the client;
//! server `result` frames echo the id they answer. `event` frames are
//! unsolicited and carry no id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

// ── Client → server ──────────────────────────────────────────────────

/// A frame sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// Authentication handshake, sent once right after the socket opens.
    #[serde(rename = "auth")]
    Auth { access_token: String },

    /// Request a full snapshot of all entity states.
    #[serde(rename = "get_states")]
    GetStates { id: u64 },

    /// Invoke a service against one entity (e.g. `light.toggle`).
    #[serde(rename = "call_service")]
    CallService {
        id: u64,
        domain: String,
        service: String,
        target: ServiceTarget,
    },
}

/// Target of a `call_service` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTarget {
    pub entity_id: String,
}

// ── Server → client ──────────────────────────────────────────────────

/// A frame received from the server.
///
/// Frame types we do not handle (`pong`, subscription confirmations from
/// other clients, future additions) decode to [`Unknown`](Self::Unknown)
/// and are ignored by the caller rather than treated as protocol errors.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// Sent by the server immediately after the socket opens, before auth.
    #[serde(rename = "auth_required")]
    AuthRequired,

    /// Credential accepted.
    #[serde(rename = "auth_ok")]
    AuthOk,

    /// Credential rejected. Terminal for the session.
    #[serde(rename = "auth_invalid")]
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },

    /// Response to a client request, echoing its id.
    #[serde(rename = "result")]
    Result {
        id: u64,
        #[serde(default = "default_true")]
        success: bool,
        #[serde(default)]
        result: Value,
    },

    /// Unsolicited state-change event.
    #[serde(rename = "event")]
    Event { event: EventEnvelope },

    #[serde(other)]
    Unknown,
}

fn default_true() -> bool {
    true
}

/// Payload of an `event` frame. `data` is absent for event types that
/// carry no state change.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    #[serde(default)]
    pub data: Option<StateChange>,
}

/// A single entity's state transition inside an event frame.
///
/// `new_state` is `None` when the entity was removed from the registry;
/// the sync layer ignores those (a vanished entity simply stops
/// receiving patches within a session).
#[derive(Debug, Clone, Deserialize)]
pub struct StateChange {
    pub entity_id: String,
    #[serde(default)]
    pub new_state: Option<StateUpdate>,
}

/// Replacement state and attributes for one entity.
///
/// Attributes are replaced wholesale on each update, never merged
/// field-by-field, so a plain JSON map is the right representation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StateUpdate {
    pub state: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, Value>,
}

/// One entity as listed in a `get_states` result.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, Value>,
}

// ── Codec ────────────────────────────────────────────────────────────

/// Serialize a client frame to its wire representation.
pub fn encode(frame: &ClientFrame) -> Result<String, Error> {
    serde_json::to_string(frame).map_err(|e| Error::Encode(e.to_string()))
}

/// Parse one inbound text message into a [`ServerFrame`].
///
/// Failure means the payload was unparsable or missing required fields
/// for its declared type; the caller drops the frame and keeps the
/// connection alive.
pub fn decode(text: &str) -> Result<ServerFrame, Error> {
    serde_json::from_str(text).map_err(|e| Error::MalformedFrame {
        reason: e.to_string(),
    })
}

/// Decode the payload of a `result` frame into an entity list.
///
/// Only valid for responses to `get_states`; command acknowledgements
/// carry arbitrary (often null) payloads.
pub fn decode_states(result: &Value) -> Result<Vec<EntityState>, Error> {
    serde_json::from_value(result.clone()).map_err(|e| Error::MalformedFrame {
        reason: format!("get_states result: {e}"),
    })
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn encode_auth_frame() {
        let frame = ClientFrame::Auth {
            access_token: "secret-token".into(),
        };
        let wire: Value = serde_json::from_str(&encode(&frame).unwrap()).unwrap();
        assert_eq!(wire, json!({"type": "auth", "access_token": "secret-token"}));
    }

    #[test]
    fn encode_get_states_frame() {
        let frame = ClientFrame::GetStates { id: 1 };
        let wire: Value = serde_json::from_str(&encode(&frame).unwrap()).unwrap();
        assert_eq!(wire, json!({"type": "get_states", "id": 1}));
    }

    #[test]
    fn encode_call_service_frame() {
        let frame = ClientFrame::CallService {
            id: 7,
            domain: "switch".into(),
            service: "toggle".into(),
            target: ServiceTarget {
                entity_id: "switch.b".into(),
            },
        };
        let wire: Value = serde_json::from_str(&encode(&frame).unwrap()).unwrap();
        assert_eq!(
            wire,
            json!({
                "type": "call_service",
                "id": 7,
                "domain": "switch",
                "service": "toggle",
                "target": {"entity_id": "switch.b"}
            })
        );
    }

    #[test]
    fn decode_auth_frames() {
        assert!(matches!(decode(r#"{"type":"auth_ok"}"#).unwrap(), ServerFrame::AuthOk));
        assert!(matches!(
            decode(r#"{"type":"auth_required","ha_version":"2024.6.0"}"#).unwrap(),
            ServerFrame::AuthRequired
        ));

        let frame = decode(r#"{"type":"auth_invalid","message":"Invalid access token"}"#).unwrap();
        match frame {
            ServerFrame::AuthInvalid { message } => {
                assert_eq!(message.as_deref(), Some("Invalid access token"));
            }
            other => panic!("expected auth_invalid, got {other:?}"),
        }
    }

    #[test]
    fn decode_result_with_entity_list() {
        let text = json!({
            "id": 1,
            "type": "result",
            "success": true,
            "result": [
                {"entity_id": "light.kitchen", "state": "off", "attributes": {"friendly_name": "Kitchen"}},
                {"entity_id": "switch.b", "state": "on", "attributes": {}}
            ]
        })
        .to_string();

        let ServerFrame::Result { id, success, result } = decode(&text).unwrap() else {
            panic!("expected result frame");
        };
        assert_eq!(id, 1);
        assert!(success);

        let states = decode_states(&result).unwrap();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].entity_id, "light.kitchen");
        assert_eq!(states[0].state, "off");
        assert_eq!(states[0].attributes["friendly_name"], "Kitchen");
    }

    #[test]
    fn decode_result_with_null_payload() {
        let frame = decode(r#"{"id":4,"type":"result","success":true,"result":null}"#).unwrap();
        let ServerFrame::Result { id, result, .. } = frame else {
            panic!("expected result frame");
        };
        assert_eq!(id, 4);
        assert!(result.is_null());
        // Null is not an entity list.
        assert!(decode_states(&result).is_err());
    }

    #[test]
    fn decode_event_frame() {
        let text = json!({
            "type": "event",
            "event": {
                "event_type": "state_changed",
                "data": {
                    "entity_id": "light.kitchen",
                    "new_state": {"state": "on", "attributes": {"brightness": 255}}
                }
            }
        })
        .to_string();

        let ServerFrame::Event { event } = decode(&text).unwrap() else {
            panic!("expected event frame");
        };
        let change = event.data.unwrap();
        assert_eq!(change.entity_id, "light.kitchen");
        let new_state = change.new_state.unwrap();
        assert_eq!(new_state.state, "on");
        assert_eq!(new_state.attributes["brightness"], 255);
    }

    #[test]
    fn decode_event_without_state_data() {
        let frame = decode(r#"{"type":"event","event":{"event_type":"service_registered"}}"#).unwrap();
        let ServerFrame::Event { event } = frame else {
            panic!("expected event frame");
        };
        assert!(event.data.is_none());
    }

    #[test]
    fn decode_unknown_type_is_not_an_error() {
        assert!(matches!(decode(r#"{"type":"pong","id":3}"#).unwrap(), ServerFrame::Unknown));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode("not json at all"),
            Err(Error::MalformedFrame { .. })
        ));
    }

    #[test]
    fn decode_rejects_missing_required_fields() {
        // `result` without an id cannot be correlated.
        assert!(matches!(
            decode(r#"{"type":"result","success":true}"#),
            Err(Error::MalformedFrame { .. })
        ));
    }
}
