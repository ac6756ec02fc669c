//! The process-wide application state, widened from the teacher's plain
//! `Mutex<HashMap<...>>` lobby into a `RwLock`-guarded room table plus one
//! `Mutex` per room, since room lookups vastly outnumber room creation.

use crate::config::{AppConfig, CatalogRegistry};
use bingo_core::room::Room;
use protocol::RoomId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub struct AppState {
    pub rooms: RwLock<HashMap<RoomId, Arc<Mutex<Room>>>>,
    pub catalogs: RwLock<CatalogRegistry>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig, catalogs: CatalogRegistry) -> Self {
        AppState {
            rooms: RwLock::new(HashMap::new()),
            catalogs: RwLock::new(catalogs),
            config,
        }
    }

    pub async fn get_room(&self, room_id: &str) -> Option<Arc<Mutex<Room>>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    pub async fn insert_room(&self, room: Room) -> RoomId {
        let id = room.id.clone();
        self.rooms
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(room)));
        id
    }
}

/// Removes rooms with no users at all, a fallback net for rooms that should
/// have been cleaned up via `EXIT` but weren't, mirroring the teacher's
/// `cleanup_dead_rooms` watchdog.
pub async fn cleanup_empty_rooms(state: &Arc<AppState>) {
    let mut rooms = state.rooms.write().await;
    let mut to_remove = Vec::new();
    for (room_id, room) in rooms.iter() {
        if room.lock().await.users.is_empty() {
            to_remove.push(room_id.clone());
        }
    }
    for room_id in &to_remove {
        tracing::info!(room_id, "removing empty room");
        rooms.remove(room_id);
    }
}
