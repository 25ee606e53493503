//! Control messages posted from the page to the worker.

use serde::{Deserialize, Serialize};

/// Inbound message shape, tagged by `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// `{ "type": "SKIP_WAITING" }`: activate now instead of waiting for
    /// the previous generation to release its pages.
    SkipWaiting,
}

impl ControlMessage {
    /// Decode a posted message. Anything unrecognised is ignored.
    pub fn parse(json: &str) -> Option<Self> {
        match serde_json::from_str(json) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::debug!("ignoring worker message: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skip_waiting() {
        assert_eq!(ControlMessage::parse(r#"{"type":"SKIP_WAITING"}"#), Some(ControlMessage::SkipWaiting));
    }

    #[test]
    fn test_serialize_shape() {
        let json = serde_json::to_string(&ControlMessage::SkipWaiting).unwrap();
        assert_eq!(json, r#"{"type":"SKIP_WAITING"}"#);
    }

    #[test]
    fn test_unknown_messages_ignored() {
        assert_eq!(ControlMessage::parse(r#"{"type":"CACHE_UPDATED"}"#), None);
        assert_eq!(ControlMessage::parse("not json"), None);
        assert_eq!(ControlMessage::parse(r#"{"kind":"SKIP_WAITING"}"#), None);
    }
}
