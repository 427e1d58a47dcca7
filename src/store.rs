use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;

use crate::types::{Room, RoomId, RoomPatch};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable")]
    Unavailable,

    #[error("Document not found: {0}")]
    NotFound(RoomId),

    #[error("Document already exists: {0}")]
    Conflict(RoomId),
}

/// The operations room actors issue against the store.
///
/// Room actors are the only writers. Every committed change reaches all
/// subscribers of the room as the full current document, or `None` once the
/// document has been deleted.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Write a new document. Fails with `Conflict` if the id is taken.
    async fn create_document(&self, id: &RoomId, room: Room) -> Result<(), StoreError>;

    /// Merge only the populated keys of `patch` into an existing document.
    async fn patch(&self, id: &RoomId, patch: RoomPatch) -> Result<(), StoreError>;

    /// Remove the whole document. Idempotent.
    async fn delete_document(&self, id: &RoomId) -> Result<(), StoreError>;

    /// Remove one roster entry. Idempotent.
    async fn delete_key(&self, id: &RoomId, player: &str) -> Result<(), StoreError>;

    async fn read_once(&self, id: &RoomId) -> Result<Option<Room>, StoreError>;

    /// Subscribe to a document. The current value is delivered first.
    async fn subscribe(&self, id: &RoomId) -> Result<Subscription, StoreError>;
}

/// A live feed of one room document. Dropping it unsubscribes.
pub struct Subscription {
    initial: Option<Option<Room>>,
    rx: broadcast::Receiver<Option<Room>>,
}

impl Subscription {
    /// Next delivered value, `Some(None)` when the document is gone, and `None`
    /// when the feed has ended.
    pub async fn next(&mut self) -> Option<Option<Room>> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                // Each value is a full document, so skipping ahead loses nothing.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Subscriber lagged, skipped {} updates", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// In-process store. Commits and notifications for one room happen under the
/// document's map guard, so subscribers see changes in commit order.
pub struct MemoryStore {
    docs: DashMap<RoomId, Room>,
    channels: DashMap<RoomId, broadcast::Sender<Option<Room>>>,
    capacity: usize,
    online: AtomicBool,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            docs: DashMap::new(),
            channels: DashMap::new(),
            capacity: capacity.max(1),
            online: AtomicBool::new(true),
        }
    }

    /// Simulate loss of connectivity; every operation fails while offline.
    #[cfg(test)]
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }

    fn notify(&self, id: &RoomId, value: Option<Room>) {
        if let Some(tx) = self.channels.get(id) {
            // No receivers is fine.
            let _ = tx.send(value);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn create_document(&self, id: &RoomId, room: Room) -> Result<(), StoreError> {
        self.check_online()?;
        match self.docs.entry(id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(id.clone())),
            Entry::Vacant(slot) => {
                let doc = slot.insert(room);
                self.notify(id, Some(doc.value().clone()));
                Ok(())
            }
        }
    }

    async fn patch(&self, id: &RoomId, patch: RoomPatch) -> Result<(), StoreError> {
        self.check_online()?;
        let mut doc = self
            .docs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        doc.apply(&patch);
        self.notify(id, Some(doc.value().clone()));
        Ok(())
    }

    async fn delete_document(&self, id: &RoomId) -> Result<(), StoreError> {
        self.check_online()?;
        if self.docs.remove(id).is_some() {
            if let Some((_, tx)) = self.channels.remove(id) {
                let _ = tx.send(None);
            }
        }
        Ok(())
    }

    async fn delete_key(&self, id: &RoomId, player: &str) -> Result<(), StoreError> {
        self.check_online()?;
        if let Some(mut doc) = self.docs.get_mut(id) {
            if doc.players.remove(player).is_some() {
                self.notify(id, Some(doc.value().clone()));
            }
        }
        Ok(())
    }

    async fn read_once(&self, id: &RoomId) -> Result<Option<Room>, StoreError> {
        self.check_online()?;
        Ok(self.docs.get(id).map(|doc| doc.value().clone()))
    }

    async fn subscribe(&self, id: &RoomId) -> Result<Subscription, StoreError> {
        self.check_online()?;
        // Hold the document guard so no commit slips between the snapshot and
        // the receiver registration.
        let doc = self.docs.get(id);
        let rx = self
            .channels
            .entry(id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        let initial = doc.map(|d| d.value().clone());
        Ok(Subscription {
            initial: Some(initial),
            rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> RoomId {
        RoomId::from("room-1")
    }

    #[tokio::test]
    async fn test_create_and_read_once() {
        let store = MemoryStore::default();
        store.create_document(&id(), Room::new("Sprint")).await.unwrap();
        let room = store.read_once(&id()).await.unwrap().unwrap();
        assert_eq!(room.name, "Sprint");
        assert!(store.read_once(&RoomId::from("other")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let store = MemoryStore::default();
        store.create_document(&id(), Room::new("a")).await.unwrap();
        let err = store.create_document(&id(), Room::new("b")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_patch_missing_document_fails() {
        let store = MemoryStore::default();
        let err = store.patch(&id(), RoomPatch::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_subscribe_delivers_initial_then_changes_in_order() {
        let store = MemoryStore::default();
        store.create_document(&id(), Room::new("a")).await.unwrap();
        let mut sub = store.subscribe(&id()).await.unwrap();

        for name in ["b", "c"] {
            let patch = RoomPatch {
                name: Some(name.to_string()),
                ..Default::default()
            };
            store.patch(&id(), patch).await.unwrap();
        }

        let names: Vec<String> = [
            sub.next().await.unwrap().unwrap(),
            sub.next().await.unwrap().unwrap(),
            sub.next().await.unwrap().unwrap(),
        ]
        .into_iter()
        .map(|r| r.name)
        .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_delete_document_ends_feed() {
        let store = MemoryStore::default();
        store.create_document(&id(), Room::new("a")).await.unwrap();
        let mut sub = store.subscribe(&id()).await.unwrap();
        store.delete_document(&id()).await.unwrap();
        store.delete_document(&id()).await.unwrap();

        assert!(sub.next().await.unwrap().is_some());
        assert_eq!(sub.next().await, Some(None));
        assert_eq!(sub.next().await, None);
        assert!(store.read_once(&id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_key_is_idempotent() {
        let store = MemoryStore::default();
        let mut room = Room::new("a");
        room.players.insert("ana".to_string(), None);
        room.players.insert("bruno".to_string(), Some("5".to_string()));
        store.create_document(&id(), room).await.unwrap();

        store.delete_key(&id(), "ana").await.unwrap();
        store.delete_key(&id(), "ana").await.unwrap();
        store.delete_key(&RoomId::from("missing"), "ana").await.unwrap();

        let room = store.read_once(&id()).await.unwrap().unwrap();
        assert!(!room.players.contains_key("ana"));
        assert_eq!(room.players["bruno"], Some("5".to_string()));
    }

    #[tokio::test]
    async fn test_subscribe_to_missing_document() {
        let store = MemoryStore::default();
        let mut sub = store.subscribe(&id()).await.unwrap();
        assert_eq!(sub.next().await, Some(None));
    }

    #[tokio::test]
    async fn test_offline_store_rejects_everything() {
        let store = MemoryStore::default();
        store.set_online(false);
        assert!(matches!(
            store.create_document(&id(), Room::new("a")).await,
            Err(StoreError::Unavailable)
        ));
        assert!(matches!(store.read_once(&id()).await, Err(StoreError::Unavailable)));
        store.set_online(true);
        assert!(store.read_once(&id()).await.unwrap().is_none());
    }
}
