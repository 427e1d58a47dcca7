use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoomError};
use crate::types::Room;

/// Operations an existing room member may attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomAction {
    // Any member
    Vote,
    Leave,

    // Creator only
    Reveal,
    Reset,
    SetMode,
    Rename,
}

impl RoomAction {
    pub const ALL: [RoomAction; 6] = [
        RoomAction::Vote,
        RoomAction::Leave,
        RoomAction::Reveal,
        RoomAction::Reset,
        RoomAction::SetMode,
        RoomAction::Rename,
    ];

    pub fn creator_only(self) -> bool {
        matches!(
            self,
            RoomAction::Reveal | RoomAction::Reset | RoomAction::SetMode | RoomAction::Rename
        )
    }
}

impl std::fmt::Display for RoomAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vote => write!(f, "vote"),
            Self::Leave => write!(f, "leave"),
            Self::Reveal => write!(f, "reveal"),
            Self::Reset => write!(f, "reset"),
            Self::SetMode => write!(f, "change mode"),
            Self::Rename => write!(f, "rename the room"),
        }
    }
}

/// Decides what an actor may do in a room. Joining is open to anyone and is not
/// listed here.
pub struct PermissionGuard;

impl PermissionGuard {
    /// Check if `actor` may perform `action` in `room`
    pub fn can_perform(actor: &str, room: &Room, action: RoomAction) -> bool {
        if action.creator_only() {
            room.is_creator(actor)
        } else {
            room.is_member(actor)
        }
    }

    /// The full set of actions available to `actor`
    pub fn allowed(actor: &str, room: &Room) -> BTreeSet<RoomAction> {
        RoomAction::ALL
            .into_iter()
            .filter(|action| Self::can_perform(actor, room, *action))
            .collect()
    }

    /// Fail with `Permission` unless `actor` may perform a creator-only `action`
    pub fn require(actor: &str, room: &Room, action: RoomAction) -> Result<()> {
        if Self::can_perform(actor, room, action) {
            Ok(())
        } else {
            Err(RoomError::Permission(format!(
                "only the room creator can {}",
                action
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        let mut room = Room::new("r");
        room.creator = Some("ana".to_string());
        room.players.insert("ana".to_string(), None);
        room.players.insert("bruno".to_string(), None);
        room
    }

    #[test]
    fn test_creator_permissions() {
        let allowed = PermissionGuard::allowed("ana", &room());
        assert_eq!(allowed.len(), RoomAction::ALL.len());
    }

    #[test]
    fn test_member_permissions() {
        let allowed = PermissionGuard::allowed("bruno", &room());
        assert_eq!(
            allowed.into_iter().collect::<Vec<_>>(),
            vec![RoomAction::Vote, RoomAction::Leave]
        );
    }

    #[test]
    fn test_stranger_has_no_permissions() {
        assert!(PermissionGuard::allowed("carla", &room()).is_empty());
    }

    #[test]
    fn test_require_reports_permission_error() {
        let err = PermissionGuard::require("bruno", &room(), RoomAction::Reveal).unwrap_err();
        assert!(matches!(err, RoomError::Permission(_)));
        assert!(PermissionGuard::require("ana", &room(), RoomAction::Reset).is_ok());
    }
}
