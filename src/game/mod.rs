//! Game simulation modules

pub mod combat;
pub mod fanout;
pub mod physics;
pub mod registry;
pub mod room;
pub mod snapshot;
pub mod store;

pub use room::{GameRoom, RoomClosed, RoomCommand, RoomHandle};

use uuid::Uuid;

/// Unique player key, derived from the requested display name
pub type PlayerId = String;

/// One live transport connection
pub type SessionId = Uuid;
