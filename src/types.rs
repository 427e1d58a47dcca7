use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::permissions::RoomAction;
use crate::view::RoomView;

/// Opaque room identifier, also the document key in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Voting mode; selects the card set and how the average is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Normal,
    Hours,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Hours => write!(f, "hours"),
        }
    }
}

/// A player's card for the current round, `None` while unset.
pub type Vote = Option<String>;

/// Roster keyed by player display name.
pub type Roster = BTreeMap<String, Vote>;

/// The persisted room document (`rooms/{roomId}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub name: String,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub is_revealed: bool,
    #[serde(default)]
    pub players: Roster,
}

impl Room {
    /// A freshly created, empty room.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            creator: None,
            mode: Mode::Normal,
            is_revealed: false,
            players: Roster::new(),
        }
    }

    pub fn is_member(&self, player: &str) -> bool {
        self.players.contains_key(player)
    }

    pub fn is_creator(&self, player: &str) -> bool {
        self.creator.as_deref() == Some(player)
    }

    /// True when every roster entry holds a card. Vacuously true for an empty roster.
    pub fn all_voted(&self) -> bool {
        self.players.values().all(Option::is_some)
    }

    /// Merge a partial patch into the document, leaving untouched keys alone.
    pub fn apply(&mut self, patch: &RoomPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(creator) = &patch.creator {
            self.creator = Some(creator.clone());
        }
        if let Some(mode) = patch.mode {
            self.mode = mode;
        }
        if let Some(revealed) = patch.is_revealed {
            self.is_revealed = revealed;
        }
        for (player, vote) in &patch.players {
            self.players.insert(player.clone(), vote.clone());
        }
    }
}

/// A partial update of a room document. Only the populated keys are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_revealed: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub players: Roster,
}

impl RoomPatch {
    /// Combine two patches into one; keys set in `other` win.
    pub fn merge(mut self, other: RoomPatch) -> Self {
        if other.name.is_some() {
            self.name = other.name;
        }
        if other.creator.is_some() {
            self.creator = other.creator;
        }
        if other.mode.is_some() {
            self.mode = other.mode;
        }
        if other.is_revealed.is_some() {
            self.is_revealed = other.is_revealed;
        }
        self.players.extend(other.players);
        self
    }
}

/// Messages sent from server to clients via WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMsg {
    RoomCreated {
        room_id: RoomId,
        link: String,
    },
    Joined {
        room_id: RoomId,
        player_name: String,
    },
    RoomState {
        room: RoomView,
        /// What the receiving player may currently do.
        allowed: Vec<RoomAction>,
    },
    RoomClosed {
        room_id: RoomId,
    },
    Left {
        room_id: RoomId,
    },
    ErrorMessage {
        kind: String,
        message: String,
    },
}

/// Messages sent from clients to server via WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMsg {
    CreateRoom { name: String },
    JoinRoom { room_id: RoomId, player_name: String },
    CastVote { card: String },
    Reveal,
    Reset,
    SetMode { mode: Mode },
    RenameRoom { name: String },
    LeaveRoom,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_document_shape() {
        let mut room = Room::new("Sprint 12");
        room.creator = Some("ana".to_string());
        room.players.insert("ana".to_string(), Some("5".to_string()));
        room.players.insert("bruno".to_string(), None);

        let json = serde_json::to_value(&room).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "Sprint 12",
                "creator": "ana",
                "mode": "normal",
                "isRevealed": false,
                "players": { "ana": "5", "bruno": null }
            })
        );
    }

    #[test]
    fn test_missing_mode_defaults_to_normal() {
        let room: Room = serde_json::from_str(r#"{"name":"x","creator":null}"#).unwrap();
        assert_eq!(room.mode, Mode::Normal);
        assert!(room.players.is_empty());
        assert!(!room.is_revealed);
    }

    #[test]
    fn test_apply_leaves_siblings_untouched() {
        let mut room = Room::new("r");
        room.players.insert("a".to_string(), Some("3".to_string()));
        room.players.insert("b".to_string(), Some("8".to_string()));

        let mut patch = RoomPatch {
            is_revealed: Some(true),
            ..Default::default()
        };
        patch.players.insert("a".to_string(), None);
        room.apply(&patch);

        assert!(room.is_revealed);
        assert_eq!(room.players["a"], None);
        assert_eq!(room.players["b"], Some("8".to_string()));
        assert_eq!(room.name, "r");
    }

    #[test]
    fn test_merge_prefers_later_keys() {
        let first = RoomPatch {
            mode: Some(Mode::Hours),
            is_revealed: Some(true),
            ..Default::default()
        };
        let second = RoomPatch {
            is_revealed: Some(false),
            ..Default::default()
        };
        let merged = first.merge(second);
        assert_eq!(merged.mode, Some(Mode::Hours));
        assert_eq!(merged.is_revealed, Some(false));
    }

    #[test]
    fn test_client_msg_wire_format() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"JoinRoom","room_id":"abc","player_name":"ana"}"#)
                .unwrap();
        match msg {
            ClientMsg::JoinRoom { room_id, player_name } => {
                assert_eq!(room_id.as_str(), "abc");
                assert_eq!(player_name, "ana");
            }
            other => panic!("unexpected {:?}", other),
        }

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"SetMode","mode":"hours"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::SetMode { mode: Mode::Hours }));

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"Reveal"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Reveal));
    }
}
