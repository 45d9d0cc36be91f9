//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{GameRoom, RoomHandle};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub room: RoomHandle,
}

impl AppState {
    /// Build state around a handle to an already-created room
    pub fn new(config: Config, room: RoomHandle) -> Self {
        Self {
            config: Arc::new(config),
            room,
        }
    }

    /// Create the room and state together; the caller spawns `GameRoom::run`
    pub fn with_room(config: Config) -> (Self, GameRoom) {
        let seed = config.room_seed.unwrap_or_else(rand::random);
        let (room, handle) = GameRoom::new(config.game.clone(), seed);
        (Self::new(config, handle), room)
    }
}
