use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::cards;
use crate::error::{Result, RoomError};
use crate::permissions::{PermissionGuard, RoomAction};
use crate::registry::Registry;
use crate::store::RoomStore;
use crate::types::*;

/// Operations a client can submit to a room actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomOp {
    Join { player: String },
    Leave { player: String },
    CastVote { player: String, card: String },
    Reveal { actor: String },
    Reset { actor: String },
    SetMode { actor: String, mode: Mode },
    Rename { actor: String, name: String },
}

/// The store write an accepted operation produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Noop,
    Patch(RoomPatch),
    RemovePlayer(String),
    DeleteRoom,
}

/// Authoritative in-memory copy of one room.
///
/// Planning methods validate an operation and describe the resulting store
/// write without touching state; `commit` applies it once the store accepted it.
#[derive(Debug, Clone)]
pub struct RoomSession {
    pub room_id: RoomId,
    pub room: Room,
}

impl RoomSession {
    pub fn new(room_id: RoomId, room: Room) -> Self {
        Self { room_id, room }
    }

    pub fn plan(&self, op: &RoomOp) -> Result<Mutation> {
        match op {
            RoomOp::Join { player } => self.plan_join(player),
            RoomOp::Leave { player } => Ok(self.plan_leave(player)),
            RoomOp::CastVote { player, card } => self.plan_vote(player, card),
            RoomOp::Reveal { actor } => self.plan_reveal(actor),
            RoomOp::Reset { actor } => self.plan_reset(actor),
            RoomOp::SetMode { actor, mode } => self.plan_set_mode(actor, *mode),
            RoomOp::Rename { actor, name } => self.plan_rename(actor, name),
        }
    }

    pub fn plan_vote(&self, player: &str, card: &str) -> Result<Mutation> {
        if !self.room.is_member(player) {
            return Err(RoomError::InvalidVote(format!(
                "{} is not in this room",
                player
            )));
        }
        if !cards::is_valid_card(self.room.mode, card) {
            return Err(RoomError::InvalidVote(format!(
                "card {:?} is not part of the {} deck",
                card, self.room.mode
            )));
        }

        let mut patch = RoomPatch {
            is_revealed: Some(false),
            ..Default::default()
        };
        patch.players.insert(player.to_string(), Some(card.to_string()));
        Ok(Mutation::Patch(patch))
    }

    pub fn plan_reveal(&self, actor: &str) -> Result<Mutation> {
        PermissionGuard::require(actor, &self.room, RoomAction::Reveal)?;
        if !self.room.all_voted() {
            return Err(RoomError::NotReady);
        }
        Ok(Mutation::Patch(RoomPatch {
            is_revealed: Some(true),
            ..Default::default()
        }))
    }

    pub fn plan_reset(&self, actor: &str) -> Result<Mutation> {
        PermissionGuard::require(actor, &self.room, RoomAction::Reset)?;
        Ok(Mutation::Patch(self.reset_patch()))
    }

    /// Clears every current vote and hides the result.
    pub fn reset_patch(&self) -> RoomPatch {
        RoomPatch {
            is_revealed: Some(false),
            players: self.room.players.keys().map(|p| (p.clone(), None)).collect(),
            ..Default::default()
        }
    }

    pub fn mode_patch(mode: Mode) -> RoomPatch {
        RoomPatch {
            mode: Some(mode),
            ..Default::default()
        }
    }

    /// Switch decks and reset the round in one write. Old votes are not valid
    /// cards of the new deck.
    pub fn plan_set_mode(&self, actor: &str, mode: Mode) -> Result<Mutation> {
        PermissionGuard::require(actor, &self.room, RoomAction::SetMode)?;
        Ok(Mutation::Patch(
            Self::mode_patch(mode).merge(self.reset_patch()),
        ))
    }

    pub fn plan_rename(&self, actor: &str, name: &str) -> Result<Mutation> {
        PermissionGuard::require(actor, &self.room, RoomAction::Rename)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(RoomError::Validation("room name cannot be empty".to_string()));
        }
        if name == self.room.name {
            return Ok(Mutation::Noop);
        }
        Ok(Mutation::Patch(RoomPatch {
            name: Some(name.to_string()),
            ..Default::default()
        }))
    }

    pub fn commit(&mut self, mutation: &Mutation) {
        match mutation {
            Mutation::Noop | Mutation::DeleteRoom => {}
            Mutation::Patch(patch) => self.room.apply(patch),
            Mutation::RemovePlayer(player) => {
                self.room.players.remove(player);
            }
        }
    }
}

async fn persist(store: &dyn RoomStore, room_id: &RoomId, mutation: &Mutation) -> Result<()> {
    match mutation {
        Mutation::Noop => {}
        Mutation::Patch(patch) => store.patch(room_id, patch.clone()).await?,
        Mutation::RemovePlayer(player) => store.delete_key(room_id, player).await?,
        Mutation::DeleteRoom => store.delete_document(room_id).await?,
    }
    Ok(())
}

/// A command queued to a room actor, with the channel its outcome is sent back on.
#[derive(Debug)]
pub struct RoomCommand {
    pub op: RoomOp,
    pub reply: oneshot::Sender<Result<()>>,
}

/// Cheap, cloneable address of a running room actor.
#[derive(Clone)]
pub struct RoomHandle {
    pub room_id: RoomId,
    pub cmd_tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Submit an operation and wait for the actor's verdict.
    pub async fn submit(&self, op: RoomOp) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(RoomCommand { op, reply })
            .await
            .map_err(|_| RoomError::NotFound(self.room_id.to_string()))?;
        rx.await
            .map_err(|_| RoomError::NotFound(self.room_id.to_string()))?
    }

    pub async fn join(&self, player: &str) -> Result<()> {
        self.submit(RoomOp::Join { player: player.to_string() }).await
    }

    pub async fn leave(&self, player: &str) -> Result<()> {
        self.submit(RoomOp::Leave { player: player.to_string() }).await
    }

    pub async fn cast_vote(&self, player: &str, card: &str) -> Result<()> {
        self.submit(RoomOp::CastVote {
            player: player.to_string(),
            card: card.to_string(),
        })
        .await
    }

    pub async fn reveal(&self, actor: &str) -> Result<()> {
        self.submit(RoomOp::Reveal { actor: actor.to_string() }).await
    }

    pub async fn reset(&self, actor: &str) -> Result<()> {
        self.submit(RoomOp::Reset { actor: actor.to_string() }).await
    }

    pub async fn set_mode(&self, actor: &str, mode: Mode) -> Result<()> {
        self.submit(RoomOp::SetMode { actor: actor.to_string(), mode }).await
    }

    pub async fn rename(&self, actor: &str, name: &str) -> Result<()> {
        self.submit(RoomOp::Rename {
            actor: actor.to_string(),
            name: name.to_string(),
        })
        .await
    }
}

/// Spawn the actor task for a loaded room and return its handle.
pub fn spawn_room(
    session: RoomSession,
    store: Arc<dyn RoomStore>,
    registry: Arc<Registry>,
    capacity: usize,
) -> RoomHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(capacity.max(1));
    let handle = RoomHandle {
        room_id: session.room_id.clone(),
        cmd_tx,
    };
    tokio::spawn(room_task(session, cmd_rx, store, registry));
    handle
}

/// Serialises every operation on one room: plan, write to the store, then commit
/// locally. Subscribers only ever learn about a change through the store.
async fn room_task(
    mut session: RoomSession,
    mut cmd_rx: mpsc::Receiver<RoomCommand>,
    store: Arc<dyn RoomStore>,
    registry: Arc<Registry>,
) {
    while let Some(RoomCommand { op, reply }) = cmd_rx.recv().await {
        let outcome = match session.plan(&op) {
            Ok(mutation) => persist(store.as_ref(), &session.room_id, &mutation)
                .await
                .map(|()| mutation),
            Err(e) => Err(e),
        };
        if let Ok(mutation) = &outcome {
            session.commit(mutation);
        }

        let closed = matches!(outcome, Ok(Mutation::DeleteRoom));
        match &outcome {
            Ok(_) => tracing::debug!("Room {} applied {:?}", session.room_id, op),
            Err(e) => tracing::warn!("Room {} rejected {:?}: {}", session.room_id, op, e),
        }
        if closed {
            registry.remove_room(&session.room_id);
        }
        let _ = reply.send(outcome.map(|_| ()));

        if closed {
            break;
        }
    }

    registry.remove_room(&session.room_id);
    tracing::info!("Room {} closed", session.room_id);
}
