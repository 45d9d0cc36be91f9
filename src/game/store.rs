//! Entity store - canonical player and projectile state (owned by the room task)

use std::collections::HashMap;

use crate::util::Vec2;

use super::combat::{apply_damage, Projectile, ShotProfile};
use super::physics::MapBounds;
use super::{PlayerId, SessionId};

/// Player state (authoritative)
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    /// Name as requested (truncated). Rules are evaluated on this form.
    pub display_name: String,
    pub position: Vec2,
    /// Unit facing direction, zero when unset
    pub direction: Vec2,
    pub health: u32,
    /// Unix millis of the last hit taken
    pub last_damage_at: u64,
    /// Travel left before the movement policy starts cutting reports short
    pub move_budget: f32,
    /// Unix millis of the last accepted movement report
    pub last_move_at: u64,
    /// Owning transport session, used for delivery only
    pub session_id: SessionId,
}

impl Player {
    pub fn new(
        id: PlayerId,
        display_name: String,
        position: Vec2,
        health: u32,
        session_id: SessionId,
    ) -> Self {
        Self {
            id,
            display_name,
            position,
            direction: Vec2::ZERO,
            health,
            last_damage_at: 0,
            move_budget: 0.0,
            last_move_at: 0,
            session_id,
        }
    }

    /// Start the movement budget at `budget` as of `now_ms`
    pub fn with_move_budget(mut self, budget: f32, now_ms: u64) -> Self {
        self.move_budget = budget;
        self.last_move_at = now_ms;
        self
    }
}

/// Outcome of a damage application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageOutcome {
    pub applied: u32,
    pub health: u32,
    pub eliminated: bool,
}

/// Players and projectiles. Every method applies its mutation as one unit.
#[derive(Debug)]
pub struct EntityStore {
    players: HashMap<PlayerId, Player>,
    projectiles: Vec<Projectile>,
    next_projectile_id: u64,
    max_health: u32,
}

impl EntityStore {
    pub fn new(max_health: u32) -> Self {
        Self {
            players: HashMap::new(),
            projectiles: Vec::new(),
            next_projectile_id: 1,
            max_health,
        }
    }

    /// Insert a player; returns false if the identity is already present
    pub fn add_player(&mut self, mut player: Player) -> bool {
        if self.players.contains_key(&player.id) {
            return false;
        }
        player.health = player.health.min(self.max_health);
        self.players.insert(player.id.clone(), player);
        true
    }

    pub fn remove_player(&mut self, id: &str) -> Option<Player> {
        self.players.remove(id)
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Overwrite position, facing and remaining travel budget together
    pub fn move_player(
        &mut self,
        id: &str,
        position: Vec2,
        direction: Vec2,
        move_budget: f32,
        now_ms: u64,
    ) -> Option<&Player> {
        let player = self.players.get_mut(id)?;
        player.position = position;
        player.direction = direction.normalize();
        player.move_budget = move_budget;
        player.last_move_at = now_ms;
        Some(player)
    }

    /// Subtract health (floor 0) and stamp the damage time
    pub fn damage_player(&mut self, id: &str, amount: u32, now_ms: u64) -> Option<DamageOutcome> {
        let max_health = self.max_health;
        let player = self.players.get_mut(id)?;
        let (health, eliminated) = apply_damage(player.health, amount);
        player.health = health.min(max_health);
        player.last_damage_at = now_ms;
        Some(DamageOutcome {
            applied: amount,
            health: player.health,
            eliminated,
        })
    }

    /// Add one health to every player that has gone `cooldown_ms` without damage.
    /// Returns the players that changed with their new health.
    pub fn regenerate(&mut self, now_ms: u64, cooldown_ms: u64) -> Vec<(PlayerId, u32)> {
        let max_health = self.max_health;
        self.players
            .values_mut()
            .filter(|p| p.health < max_health)
            .filter(|p| now_ms.saturating_sub(p.last_damage_at) >= cooldown_ms)
            .map(|p| {
                p.health = (p.health + 1).min(max_health);
                (p.id.clone(), p.health)
            })
            .collect()
    }

    /// Create a projectile with the next monotonic id
    pub fn spawn_projectile(
        &mut self,
        owner_id: PlayerId,
        position: Vec2,
        direction: Vec2,
        profile: &ShotProfile,
    ) -> Projectile {
        let id = self.next_projectile_id;
        self.next_projectile_id += 1;
        let projectile = Projectile::new(id, owner_id, position, direction, profile);
        self.projectiles.push(projectile.clone());
        projectile
    }

    pub fn projectile(&self, id: u64) -> Option<&Projectile> {
        self.projectiles.iter().find(|p| p.id == id)
    }

    pub fn remove_projectile(&mut self, id: u64) -> Option<Projectile> {
        let idx = self.projectiles.iter().position(|p| p.id == id)?;
        Some(self.projectiles.remove(idx))
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Advance every projectile one tick and drop those that left the map.
    /// Returns the ids removed.
    pub fn advance_projectiles(&mut self, bounds: &MapBounds) -> Vec<u64> {
        let mut removed = Vec::new();
        self.projectiles.retain_mut(|projectile| {
            projectile.advance();
            if bounds.contains(projectile.position) {
                true
            } else {
                removed.push(projectile.id);
                false
            }
        });
        removed
    }
}
