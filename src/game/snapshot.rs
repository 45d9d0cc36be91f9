//! Wire views of store state

use crate::ws::protocol::{PlayerView, ProjectileView, ServerMsg};

use super::combat::{ModifierRules, Projectile};
use super::store::{EntityStore, Player};

/// Builds outbound views; display names are sanitized here and only here
pub struct SnapshotBuilder<'a> {
    rules: &'a ModifierRules,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(rules: &'a ModifierRules) -> Self {
        Self { rules }
    }

    pub fn player(&self, player: &Player) -> PlayerView {
        PlayerView {
            id: player.id.clone(),
            display_name: self.rules.display_name(&player.display_name),
            x: player.position.x,
            y: player.position.y,
            direction_x: player.direction.x,
            direction_y: player.direction.y,
            hp: player.health,
        }
    }

    pub fn projectile(&self, projectile: &Projectile) -> ProjectileView {
        ProjectileView {
            id: projectile.id,
            x: projectile.position.x,
            y: projectile.position.y,
            direction_x: projectile.direction.x,
            direction_y: projectile.direction.y,
            speed: projectile.speed,
            radius: projectile.radius,
            player_id: projectile.owner_id.clone(),
            damage: projectile.damage,
        }
    }

    /// `currentPlayers` for every live player
    pub fn current_players(&self, store: &EntityStore) -> ServerMsg {
        ServerMsg::CurrentPlayers {
            players: store.players().map(|p| self.player(p)).collect(),
        }
    }

    /// `projectilesUpdate` with every live projectile, or None when there are none
    pub fn projectiles_update(&self, store: &EntityStore) -> Option<ServerMsg> {
        if store.projectiles().is_empty() {
            return None;
        }
        Some(ServerMsg::ProjectilesUpdate {
            projectiles: store.projectiles().iter().map(|p| self.projectile(p)).collect(),
        })
    }
}
