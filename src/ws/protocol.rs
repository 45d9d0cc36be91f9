//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Viewer asks for the current player list without joining
    SpectateHello,

    /// Request to join with a display name at a spawn position
    #[serde(rename_all = "camelCase")]
    PlayerJoin { display_name: String, x: f32, y: f32 },

    /// Position and facing report
    #[serde(rename_all = "camelCase")]
    PlayerUpdate {
        player_id: String,
        x: f32,
        y: f32,
        direction_x: f32,
        direction_y: f32,
    },

    /// Fire toward a direction
    #[serde(rename_all = "camelCase")]
    Shoot {
        player_id: String,
        x: f32,
        y: f32,
        direction_x: f32,
        direction_y: f32,
    },

    /// Client-detected hit. Any damage value the client adds is ignored.
    #[serde(rename_all = "camelCase")]
    PlayerDamaged {
        victim_id: String,
        shooter_id: String,
        #[serde(default)]
        projectile_id: Option<u64>,
    },

    /// Direct elimination report
    #[serde(rename_all = "camelCase")]
    PlayerHit {
        player_id: String,
        #[serde(default)]
        killer_id: Option<String>,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Identity assigned after join
    #[serde(rename_all = "camelCase")]
    JoinAck { id: String, display_name: String },

    /// Full player list
    CurrentPlayers { players: Vec<PlayerView> },

    PlayerJoined { player: PlayerView },

    PlayerUpdate { player: PlayerView },

    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: String },

    ProjectileCreated { projectile: ProjectileView },

    /// Every live projectile, resent each tick
    ProjectilesUpdate { projectiles: Vec<ProjectileView> },

    #[serde(rename_all = "camelCase")]
    ProjectileDestroyed { projectile_id: u64 },

    #[serde(rename_all = "camelCase")]
    HpUpdate { player_id: String, hp: u32 },

    /// Player eliminated
    #[serde(rename_all = "camelCase")]
    PlayerHit {
        player_id: String,
        killer_id: Option<String>,
    },

    SystemMessage { message: String },
}

/// Player as seen by other viewers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: String,
    /// Sanitized display name
    pub display_name: String,
    pub x: f32,
    pub y: f32,
    pub direction_x: f32,
    pub direction_y: f32,
    pub hp: u32,
}

/// Projectile wire form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileView {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub direction_x: f32,
    pub direction_y: f32,
    pub speed: f32,
    pub radius: f32,
    pub player_id: String,
    pub damage: u32,
}
