use crate::error::{Result, RoomError};
use crate::session::{Mutation, RoomSession};
use crate::types::RoomPatch;

/// Rejects player names that are empty once trimmed.
pub fn check_player_name(player: &str) -> Result<()> {
    if player.trim().is_empty() {
        return Err(RoomError::Validation("player name cannot be empty".to_string()));
    }
    Ok(())
}

impl RoomSession {
    /// Add `player` with an unset vote. Rejoining resets that player's vote.
    /// The first player to join while no creator is recorded becomes the creator.
    pub fn plan_join(&self, player: &str) -> Result<Mutation> {
        check_player_name(player)?;

        let mut patch = RoomPatch {
            is_revealed: Some(false),
            ..Default::default()
        };
        if self.room.creator.is_none() {
            patch.creator = Some(player.to_string());
        }
        patch.players.insert(player.to_string(), None);
        Ok(Mutation::Patch(patch))
    }

    /// Remove `player`. The creator leaving deletes the room with everyone in it.
    /// Leaving twice, or leaving without having joined, does nothing.
    pub fn plan_leave(&self, player: &str) -> Mutation {
        if !self.room.is_member(player) {
            Mutation::Noop
        } else if self.room.is_creator(player) {
            Mutation::DeleteRoom
        } else {
            Mutation::RemovePlayer(player.to_string())
        }
    }
}
