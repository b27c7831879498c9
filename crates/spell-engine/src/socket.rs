//! Socket types carried by ports and connections.
//!
//! Every port declares a socket. A connection is structurally valid only when
//! the destination socket accepts the source socket. The rules are
//! deliberately small: `Any` bridges to everything in both directions, and
//! every other socket only matches itself. `Trigger` therefore never mixes
//! with data sockets except through `Any`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of value a port carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketType {
    /// Control-flow activation. Carries no value.
    Trigger,
    /// A structured event payload (sender, observer, channel, client).
    Event,
    /// Wildcard: connects to any other socket.
    Any,
    /// UTF-8 text.
    String,
    /// Numeric value.
    Number,
    /// Boolean value.
    Boolean,
    /// Ordered list of values.
    Array,
    /// Structured object.
    Object,
}

impl SocketType {
    /// Whether a value from a port of type `source` may arrive at a port of
    /// this type.
    pub fn accepts(&self, source: &SocketType) -> bool {
        if matches!(self, SocketType::Any) || matches!(source, SocketType::Any) {
            return true;
        }
        self == source
    }

    /// True for the control-flow socket.
    pub fn is_trigger(&self) -> bool {
        matches!(self, SocketType::Trigger)
    }

    /// Human-readable socket name, as shown in editors and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            SocketType::Trigger => "trigger",
            SocketType::Event => "event",
            SocketType::Any => "any",
            SocketType::String => "string",
            SocketType::Number => "number",
            SocketType::Boolean => "boolean",
            SocketType::Array => "array",
            SocketType::Object => "object",
        }
    }

    /// All socket types, in declaration order.
    pub fn all() -> &'static [SocketType] {
        &[
            SocketType::Trigger,
            SocketType::Event,
            SocketType::Any,
            SocketType::String,
            SocketType::Number,
            SocketType::Boolean,
            SocketType::Array,
            SocketType::Object,
        ]
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_bridges_both_directions() {
        for socket in SocketType::all() {
            assert!(
                SocketType::Any.accepts(socket),
                "any should accept {socket}"
            );
            assert!(
                socket.accepts(&SocketType::Any),
                "{socket} should accept any"
            );
        }
    }

    #[test]
    fn test_same_socket_matches() {
        for socket in SocketType::all() {
            assert!(socket.accepts(socket));
        }
    }

    #[test]
    fn test_distinct_sockets_rejected() {
        for a in SocketType::all() {
            for b in SocketType::all() {
                if a == b {
                    continue;
                }
                if matches!(a, SocketType::Any) || matches!(b, SocketType::Any) {
                    continue;
                }
                assert!(!a.accepts(b), "{a} should not accept {b}");
            }
        }
    }

    #[test]
    fn test_trigger_never_mixes_with_data() {
        assert!(!SocketType::Trigger.accepts(&SocketType::String));
        assert!(!SocketType::String.accepts(&SocketType::Trigger));
        assert!(SocketType::Trigger.accepts(&SocketType::Trigger));
    }

    #[test]
    fn test_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SocketType::Trigger).unwrap(),
            "\"trigger\""
        );
        assert_eq!(serde_json::to_string(&SocketType::Any).unwrap(), "\"any\"");
        let parsed: SocketType = serde_json::from_str("\"event\"").unwrap();
        assert_eq!(parsed, SocketType::Event);
    }
}
