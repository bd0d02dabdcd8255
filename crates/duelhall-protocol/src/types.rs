//! Every type that travels on the wire.
//!
//! Domain records (combatants, participants, battle snapshots) live here
//! too, since they are exactly what the server broadcasts.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ConnectionId;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Client-chosen name of a session. Two participants meet by joining the
/// same id. Serialized as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Combatants
// ---------------------------------------------------------------------------

/// The four combat attributes of a combatant.
///
/// `speed` and `power` are carried for display; attack resolution only
/// reads `strength` and `durability`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombatantStats {
    pub strength: u32,
    pub speed: u32,
    pub durability: u32,
    pub power: u32,
}

/// A selectable character. Immutable once a participant picks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: u64,
    pub name: String,
    pub image_url: String,
    pub stats: CombatantStats,
}

/// Which catalog a search runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// The built-in hero catalog.
    Static,
    /// The remote character lookup.
    Remote,
}

// ---------------------------------------------------------------------------
// Participants and battles
// ---------------------------------------------------------------------------

/// One connected user inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub combatant: Option<Combatant>,
}

impl Participant {
    /// A freshly joined participant with no pick yet.
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            combatant: None,
        }
    }

    /// `true` once the participant has selected a combatant.
    pub fn is_committed(&self) -> bool {
        self.combatant.is_some()
    }
}

/// The two attack flavours a turn owner can submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackKind {
    Basic,
    Special,
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => f.write_str("basic"),
            Self::Special => f.write_str("special"),
        }
    }
}

/// Animation families the animation provider is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationCategory {
    Punch,
    Kick,
    Bonk,
    Smug,
}

impl AnimationCategory {
    /// Every category, in a fixed order.
    pub const ALL: [AnimationCategory; 4] = [Self::Punch, Self::Kick, Self::Bonk, Self::Smug];

    /// Path segment used by the animation provider.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Punch => "punch",
            Self::Kick => "kick",
            Self::Bonk => "bonk",
            Self::Smug => "smug",
        }
    }
}

impl fmt::Display for AnimationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the battle log. Entries are only ever appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LogEntry {
    /// Human-readable combat text.
    Text { message: String },
    /// Reference (URL) to an animation to play.
    Animation { reference: String },
}

/// Broadcast view of an active battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleSnapshot {
    pub turn_owner: ConnectionId,
    pub health: BTreeMap<ConnectionId, i64>,
    pub log: Vec<LogEntry>,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Client → Server actions.
///
/// Internally tagged: `{ "type": "Attack", "session_id": "r1", "kind": "basic" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Keep-alive. Echoed back for RTT measurement.
    Heartbeat { client_time: u64 },

    /// Enter a session, creating it when nobody has used the id yet.
    Join { session_id: SessionId },

    /// Leave a session without closing the connection.
    Leave { session_id: SessionId },

    /// Look up combatants. The reply carries the same `request_id`.
    Search {
        request_id: u64,
        provider: ProviderKind,
        query: String,
    },

    /// Pick a combatant for this session.
    Select {
        session_id: SessionId,
        combatant: Combatant,
    },

    /// Attack the opponent. Ignored unless the sender owns the turn.
    Attack {
        session_id: SessionId,
        kind: AttackKind,
    },

    /// Drop the battle and every pick in the session.
    Restart { session_id: SessionId },

    /// Polite close.
    Disconnect { reason: String },
}

/// Server → Client messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// First frame on every connection: the id the server knows you by.
    Welcome {
        connection_id: ConnectionId,
        server_time: u64,
    },

    HeartbeatAck { client_time: u64, server_time: u64 },

    /// Sent to the joiner only.
    Joined { session_id: SessionId },

    /// Free-text announcement to everyone in a session.
    Notice { session_id: SessionId, message: String },

    /// Current participant list, in join order.
    Participants {
        session_id: SessionId,
        participants: Vec<Participant>,
    },

    BattleStarted {
        session_id: SessionId,
        battle: BattleSnapshot,
    },

    /// Sent after every attack that does not end the battle.
    BattleUpdated {
        session_id: SessionId,
        battle: BattleSnapshot,
    },

    BattleEnded {
        session_id: SessionId,
        winner: ConnectionId,
        winner_name: String,
        message: String,
    },

    /// A fighter left mid-battle; the battle was dropped.
    BattleAbandoned {
        session_id: SessionId,
        departed: ConnectionId,
    },

    Restarted { session_id: SessionId },

    SearchResults {
        request_id: u64,
        combatants: Vec<Combatant>,
    },

    /// `code` follows HTTP conventions (400 bad request, 404 not found,
    /// 409 conflict).
    Error { code: u16, message: String },
}

impl ServerMessage {
    /// The session a broadcast belongs to, if any.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Joined { session_id }
            | Self::Notice { session_id, .. }
            | Self::Participants { session_id, .. }
            | Self::BattleStarted { session_id, .. }
            | Self::BattleUpdated { session_id, .. }
            | Self::BattleEnded { session_id, .. }
            | Self::BattleAbandoned { session_id, .. }
            | Self::Restarted { session_id } => Some(session_id),
            Self::Welcome { .. }
            | Self::HeartbeatAck { .. }
            | Self::SearchResults { .. }
            | Self::Error { .. } => None,
        }
    }
}

/// Frame wrapper. `seq` counts up per direction per connection;
/// `timestamp` is milliseconds since the connection was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<P> {
    pub seq: u64,
    pub timestamp: u64,
    pub payload: P,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The browser client parses these shapes directly, so the tests pin
    //! the JSON layout. Codec round-trips live in `codec.rs`.

    use super::*;

    fn hero() -> Combatant {
        Combatant {
            id: 1,
            name: "Superman".into(),
            image_url: "https://example.test/superman.png".into(),
            stats: CombatantStats {
                strength: 100,
                speed: 100,
                durability: 100,
                power: 100,
            },
        }
    }

    #[test]
    fn test_session_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&SessionId::from("r1")).unwrap();
        assert_eq!(json, "\"r1\"");
    }

    #[test]
    fn test_attack_kind_lowercase_and_display() {
        assert_eq!(serde_json::to_string(&AttackKind::Special).unwrap(), "\"special\"");
        assert_eq!(AttackKind::Basic.to_string(), "basic");
    }

    #[test]
    fn test_animation_category_paths() {
        let paths: Vec<_> = AnimationCategory::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(paths, ["punch", "kick", "bonk", "smug"]);
    }

    #[test]
    fn test_client_attack_json_format() {
        let msg = ClientMessage::Attack {
            session_id: "r1".into(),
            kind: AttackKind::Basic,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Attack");
        assert_eq!(json["session_id"], "r1");
        assert_eq!(json["kind"], "basic");
    }

    #[test]
    fn test_client_search_parses_from_browser_json() {
        let raw = r#"{"type":"Search","request_id":7,"provider":"static","query":"man"}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Search {
                request_id: 7,
                provider: ProviderKind::Static,
                query: "man".into(),
            }
        );
    }

    #[test]
    fn test_client_select_carries_full_combatant() {
        let msg = ClientMessage::Select {
            session_id: "r1".into(),
            combatant: hero(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["combatant"]["name"], "Superman");
        assert_eq!(json["combatant"]["stats"]["durability"], 100);
    }

    #[test]
    fn test_log_entries_are_tagged_by_kind() {
        let text = serde_json::to_value(LogEntry::Text { message: "hi".into() }).unwrap();
        assert_eq!(text["kind"], "text");
        assert_eq!(text["message"], "hi");

        let anim = serde_json::to_value(LogEntry::Animation {
            reference: "https://gif".into(),
        })
        .unwrap();
        assert_eq!(anim["kind"], "animation");
        assert_eq!(anim["reference"], "https://gif");
    }

    #[test]
    fn test_battle_snapshot_health_keys_survive_json() {
        let mut health = BTreeMap::new();
        health.insert(ConnectionId::new(1), 200);
        health.insert(ConnectionId::new(2), -4);
        let snap = BattleSnapshot {
            turn_owner: ConnectionId::new(1),
            health,
            log: vec![],
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["health"]["2"], -4);

        let back: BattleSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn test_participant_without_pick_is_null() {
        let json = serde_json::to_value(Participant::new(ConnectionId::new(3))).unwrap();
        assert_eq!(json["connection_id"], 3);
        assert!(json["combatant"].is_null());
    }

    #[test]
    fn test_server_message_session_id() {
        let msg = ServerMessage::Restarted { session_id: "r9".into() };
        assert_eq!(msg.session_id(), Some(&SessionId::from("r9")));
        let err = ServerMessage::Error { code: 400, message: "x".into() };
        assert_eq!(err.session_id(), None);
    }

    #[test]
    fn test_decode_unknown_client_message_type_returns_error() {
        let unknown = r#"{"type": "FlyToMoon", "speed": 9000}"#;
        let result: Result<ClientMessage, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }
}
