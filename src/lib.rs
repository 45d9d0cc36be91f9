//! Arena Game Server - authoritative real-time state for a single-room shooter
//!
//! - `game`: room actor owning players, projectiles, identities and the tick loop
//! - `ws`: wire protocol and per-connection WebSocket tasks
//! - `http`: router with the WebSocket endpoint and health check

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
