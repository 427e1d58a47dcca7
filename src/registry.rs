use std::sync::Arc;

use dashmap::DashMap;
use rand::Rng;
use rand::distr::Alphanumeric;

use crate::error::{Result, RoomError};
use crate::session::{self, RoomHandle, RoomSession};
use crate::store::{RoomStore, StoreError};
use crate::types::{Room, RoomId};

const CREATE_ATTEMPTS: usize = 5;

fn create_room_id(len: usize) -> RoomId {
    let mut rng = rand::rng();
    RoomId((0..len.max(1)).map(|_| char::from(rng.sample(Alphanumeric))).collect())
}

/// Registry holds the running room actors.
pub struct Registry {
    /// room_id -> actor handle
    pub rooms: DashMap<RoomId, RoomHandle>,
    store: Arc<dyn RoomStore>,
    room_id_length: usize,
    capacity: usize,
}

impl Registry {
    pub fn new(store: Arc<dyn RoomStore>, room_id_length: usize, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            rooms: DashMap::new(),
            store,
            room_id_length,
            capacity,
        })
    }

    pub fn store(&self) -> &Arc<dyn RoomStore> {
        &self.store
    }

    /// Create an empty room named `name` (trimmed) and start its actor.
    pub async fn create_room(self: &Arc<Self>, name: &str) -> Result<RoomId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RoomError::Validation("room name cannot be empty".to_string()));
        }

        for _ in 0..CREATE_ATTEMPTS {
            let room_id = create_room_id(self.room_id_length);
            let room = Room::new(name);
            match self.store.create_document(&room_id, room.clone()).await {
                Ok(()) => {
                    self.start(RoomSession::new(room_id.clone(), room));
                    tracing::info!("Room created: {} ({})", room_id, name);
                    return Ok(room_id);
                }
                Err(StoreError::Conflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(RoomError::Transport(StoreError::Unavailable))
    }

    /// The running actor for `room_id`, reloading it from the store if needed.
    pub async fn open(self: &Arc<Self>, room_id: &RoomId) -> Result<RoomHandle> {
        if let Some(handle) = self.rooms.get(room_id) {
            return Ok(handle.value().clone());
        }

        let room = self
            .store
            .read_once(room_id)
            .await?
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;

        Ok(self.start(RoomSession::new(room_id.clone(), room)))
    }

    /// Keeps exactly one actor per room id.
    fn start(self: &Arc<Self>, session: RoomSession) -> RoomHandle {
        self.rooms
            .entry(session.room_id.clone())
            .or_insert_with(|| {
                session::spawn_room(session, self.store.clone(), self.clone(), self.capacity)
            })
            .value()
            .clone()
    }

    pub fn remove_room(&self, room_id: &RoomId) {
        self.rooms.remove(room_id);
    }
}
