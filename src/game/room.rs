//! Room state and authoritative tick loop

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::util::time::unix_millis;
use crate::util::Vec2;
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::combat::fan_directions;
use super::fanout::{Fanout, Frame, SESSION_QUEUE_CAPACITY};
use super::physics::PhysicsSystem;
use super::registry::ConnectionRegistry;
use super::snapshot::SnapshotBuilder;
use super::store::{EntityStore, Player};
use super::SessionId;

/// Inbound command queue depth
const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Position drift tolerated before the sender gets a correction
const CORRECTION_EPSILON: f32 = 0.01;

/// Commands fed to the room task from every connection
#[derive(Debug)]
pub enum RoomCommand {
    /// Transport opened; frames for this session go to `outbound`
    Connect {
        session_id: SessionId,
        outbound: mpsc::Sender<Frame>,
    },
    /// Parsed client message
    Message {
        session_id: SessionId,
        msg: ClientMsg,
    },
    /// Transport closed
    Disconnect { session_id: SessionId },
}

/// The room task has stopped
#[derive(Debug, thiserror::Error)]
#[error("room is closed")]
pub struct RoomClosed;

/// Counters readable outside the room task
#[derive(Debug, Default)]
pub struct RoomStats {
    players: AtomicUsize,
    sessions: AtomicUsize,
    projectiles: AtomicUsize,
}

/// Handle to the running room
#[derive(Clone)]
pub struct RoomHandle {
    command_tx: mpsc::Sender<RoomCommand>,
    stats: Arc<RoomStats>,
}

impl RoomHandle {
    /// Register a session and get its outbound frame queue
    pub async fn connect(&self, session_id: SessionId) -> Result<mpsc::Receiver<Frame>, RoomClosed> {
        let (outbound, frames) = mpsc::channel(SESSION_QUEUE_CAPACITY);
        self.command_tx
            .send(RoomCommand::Connect { session_id, outbound })
            .await
            .map_err(|_| RoomClosed)?;
        Ok(frames)
    }

    pub async fn send(&self, session_id: SessionId, msg: ClientMsg) -> Result<(), RoomClosed> {
        self.command_tx
            .send(RoomCommand::Message { session_id, msg })
            .await
            .map_err(|_| RoomClosed)
    }

    pub async fn disconnect(&self, session_id: SessionId) -> Result<(), RoomClosed> {
        self.command_tx
            .send(RoomCommand::Disconnect { session_id })
            .await
            .map_err(|_| RoomClosed)
    }

    pub fn player_count(&self) -> usize {
        self.stats.players.load(Ordering::Relaxed)
    }

    pub fn session_count(&self) -> usize {
        self.stats.sessions.load(Ordering::Relaxed)
    }

    pub fn projectile_count(&self) -> usize {
        self.stats.projectiles.load(Ordering::Relaxed)
    }
}

/// The authoritative game room. Owns all game state; nothing else mutates it.
pub struct GameRoom {
    config: GameConfig,
    store: EntityStore,
    registry: ConnectionRegistry,
    fanout: Fanout,
    rng: ChaCha8Rng,
    command_rx: mpsc::Receiver<RoomCommand>,
    stats: Arc<RoomStats>,
}

impl GameRoom {
    /// Create a new room
    pub fn new(config: GameConfig, seed: u64) -> (Self, RoomHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let stats = Arc::new(RoomStats::default());

        let handle = RoomHandle {
            command_tx,
            stats: stats.clone(),
        };

        let room = Self {
            store: EntityStore::new(config.max_health),
            config,
            registry: ConnectionRegistry::new(),
            fanout: Fanout::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            command_rx,
            stats,
        };

        (room, handle)
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Run until every handle is dropped
    pub async fn run(mut self) {
        info!(
            width = self.config.bounds.width,
            height = self.config.bounds.height,
            "Room started"
        );

        let mut tick_interval = interval(self.config.tick_interval);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut regen_interval = interval(self.config.regen_interval);
        regen_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command, unix_millis()),
                    None => break,
                },
                _ = tick_interval.tick() => self.run_tick(),
                _ = regen_interval.tick() => self.run_regen(unix_millis()),
            }
        }

        info!("Room stopped");
    }

    /// Apply one command. All state changes land before any frame is queued.
    pub fn handle_command(&mut self, command: RoomCommand, now_ms: u64) {
        match command {
            RoomCommand::Connect { session_id, outbound } => {
                debug!(session_id = %session_id, "Session connected");
                self.fanout.register(session_id, outbound);
            }
            RoomCommand::Message { session_id, msg } => {
                self.handle_message(session_id, msg, now_ms);
            }
            RoomCommand::Disconnect { session_id } => {
                self.handle_disconnect(session_id);
            }
        }
        self.sync_stats();
    }

    fn handle_message(&mut self, session_id: SessionId, msg: ClientMsg, now_ms: u64) {
        match msg {
            ClientMsg::SpectateHello => self.handle_spectate(session_id),
            ClientMsg::PlayerJoin { display_name, x, y } => {
                self.handle_join(session_id, &display_name, Vec2::new(x, y), now_ms);
            }
            ClientMsg::PlayerUpdate {
                player_id,
                x,
                y,
                direction_x,
                direction_y,
            } => {
                self.handle_move(
                    session_id,
                    &player_id,
                    Vec2::new(x, y),
                    Vec2::new(direction_x, direction_y),
                    now_ms,
                );
            }
            ClientMsg::Shoot {
                player_id,
                direction_x,
                direction_y,
                ..
            } => {
                self.handle_shoot(session_id, &player_id, Vec2::new(direction_x, direction_y));
            }
            ClientMsg::PlayerDamaged {
                victim_id,
                shooter_id,
                projectile_id,
            } => {
                self.handle_damage(session_id, &victim_id, &shooter_id, projectile_id, now_ms);
            }
            ClientMsg::PlayerHit { player_id, killer_id } => {
                self.handle_elimination_report(session_id, &player_id, killer_id);
            }
        }
    }

    fn handle_spectate(&mut self, session_id: SessionId) {
        let players = SnapshotBuilder::new(&self.config.rules).current_players(&self.store);
        self.reply(&session_id, &players);
    }

    /// Handle player join request
    fn handle_join(&mut self, session_id: SessionId, requested_name: &str, spawn: Vec2, now_ms: u64) {
        if let Some(held) = self.registry.player_of(&session_id) {
            warn!(session_id = %session_id, player_id = %held, "Session already joined");
            return;
        }

        let (player_id, name) = self.registry.join(session_id, requested_name, &mut self.rng);
        let position = self.config.bounds.clamp(spawn, self.config.player_radius);
        let player = Player::new(
            player_id.clone(),
            name,
            position,
            self.config.max_health,
            session_id,
        )
        .with_move_budget(self.config.movement.initial_budget(), now_ms);

        let view = SnapshotBuilder::new(&self.config.rules).player(&player);
        if !self.store.add_player(player) {
            warn!(player_id = %player_id, "Identity already in store, rejecting join");
            self.registry.release(&player_id);
            return;
        }

        info!(
            session_id = %session_id,
            player_id = %player_id,
            player_count = self.store.player_count(),
            "Player joined"
        );

        let (ack, players) = {
            let snapshot = SnapshotBuilder::new(&self.config.rules);
            (
                ServerMsg::JoinAck {
                    id: player_id.clone(),
                    display_name: view.display_name.clone(),
                },
                snapshot.current_players(&self.store),
            )
        };
        self.reply(&session_id, &ack);
        self.reply(&session_id, &players);

        let announcement = ServerMsg::SystemMessage {
            message: format!("{} joined the game", view.display_name),
        };
        self.broadcast(&ServerMsg::PlayerJoined { player: view }, Some(&player_id));
        self.broadcast(&announcement, Some(&player_id));
    }

    /// Handle position report; travel is paid from the player's time-based budget
    fn handle_move(
        &mut self,
        session_id: SessionId,
        player_id: &str,
        reported: Vec2,
        direction: Vec2,
        now_ms: u64,
    ) {
        if !self.registry.owns(&session_id, player_id) {
            debug!(session_id = %session_id, player_id = %player_id, "Ignoring move for unowned player");
            return;
        }
        let Some(player) = self.store.player(player_id) else {
            return;
        };
        let current = player.position;
        let budget = self
            .config
            .movement
            .refill(player.move_budget, now_ms.saturating_sub(player.last_move_at));

        let position = PhysicsSystem::resolve_move(
            self.config.movement,
            &self.config.bounds,
            self.config.player_radius,
            current,
            reported,
            budget,
        );
        let remaining = (budget - position.distance(current)).max(0.0);

        let Some(view) = self
            .store
            .move_player(player_id, position, direction, remaining, now_ms)
            .map(|p| SnapshotBuilder::new(&self.config.rules).player(p))
        else {
            return;
        };

        let corrected = !reported.is_finite() || position.distance(reported) > CORRECTION_EPSILON;
        let update = ServerMsg::PlayerUpdate { player: view };
        self.broadcast(&update, Some(player_id));
        if corrected {
            self.reply(&session_id, &update);
        }
    }

    /// Handle shot: one or more projectiles with damage fixed now
    fn handle_shoot(&mut self, session_id: SessionId, player_id: &str, aim: Vec2) {
        if !self.registry.owns(&session_id, player_id) {
            debug!(session_id = %session_id, player_id = %player_id, "Ignoring shot for unowned player");
            return;
        }
        let Some(shooter) = self.store.player(player_id) else {
            return;
        };

        let aim = match aim.normalize() {
            dir if dir.is_zero() => shooter.direction,
            dir => dir,
        };
        if aim.is_zero() {
            debug!(player_id = %player_id, "Ignoring shot without direction");
            return;
        }

        let origin = shooter.position;
        let profile = self.config.rules.resolve(&shooter.display_name);
        let directions = fan_directions(aim, profile.count, self.config.rules.spread_degrees);

        let projectiles: Vec<_> = directions
            .into_iter()
            .map(|direction| {
                self.store
                    .spawn_projectile(player_id.to_string(), origin, direction, &profile)
            })
            .collect();

        let snapshot = SnapshotBuilder::new(&self.config.rules);
        let created: Vec<ServerMsg> = projectiles
            .iter()
            .map(|p| ServerMsg::ProjectileCreated {
                projectile: snapshot.projectile(p),
            })
            .collect();

        for msg in &created {
            self.broadcast(msg, None);
        }
    }

    /// Handle a client-reported hit with server-side damage
    fn handle_damage(
        &mut self,
        session_id: SessionId,
        victim_id: &str,
        shooter_id: &str,
        projectile_id: Option<u64>,
        now_ms: u64,
    ) {
        let reporter_involved = self
            .registry
            .player_of(&session_id)
            .is_some_and(|reporter| reporter == victim_id || reporter == shooter_id);
        if !reporter_involved || victim_id == shooter_id {
            debug!(session_id = %session_id, victim_id = %victim_id, "Ignoring damage report");
            return;
        }

        let (Some(victim), Some(shooter)) = (self.store.player(victim_id), self.store.player(shooter_id)) else {
            debug!(victim_id = %victim_id, shooter_id = %shooter_id, "Damage report for unknown player");
            return;
        };

        let projectile = projectile_id
            .and_then(|id| self.store.projectile(id))
            .filter(|p| p.owner_id == shooter_id);
        let raw = match projectile {
            Some(p) => p.damage,
            None => self.config.rules.resolve(&shooter.display_name).damage,
        };
        let spent_projectile = projectile.map(|p| p.id);
        let amount = self.config.rules.incoming_damage(&victim.display_name, raw);

        let Some(outcome) = self.store.damage_player(victim_id, amount, now_ms) else {
            return;
        };
        if let Some(id) = spent_projectile {
            self.store.remove_projectile(id);
        }
        if outcome.eliminated {
            self.store.remove_player(victim_id);
            self.registry.release(victim_id);
        }

        info!(
            victim_id = %victim_id,
            shooter_id = %shooter_id,
            raw_damage = raw,
            applied = outcome.applied,
            health = outcome.health,
            "Player damaged"
        );

        if let Some(id) = spent_projectile {
            self.broadcast(&ServerMsg::ProjectileDestroyed { projectile_id: id }, None);
        }
        if outcome.eliminated {
            self.announce_elimination(victim_id, Some(shooter_id.to_string()));
        } else {
            self.broadcast(
                &ServerMsg::HpUpdate {
                    player_id: victim_id.to_string(),
                    hp: outcome.health,
                },
                None,
            );
        }
    }

    /// Handle a self-reported elimination
    fn handle_elimination_report(&mut self, session_id: SessionId, player_id: &str, killer_id: Option<String>) {
        if !self.registry.owns(&session_id, player_id) {
            debug!(session_id = %session_id, player_id = %player_id, "Ignoring elimination report");
            return;
        }
        if self.store.remove_player(player_id).is_none() {
            return;
        }
        self.registry.release(player_id);

        let killer_id = killer_id.filter(|id| id != player_id && self.registry.is_held(id));
        self.announce_elimination(player_id, killer_id);
    }

    fn announce_elimination(&mut self, victim_id: &str, killer_id: Option<String>) {
        info!(victim_id = %victim_id, killer_id = ?killer_id, "Player eliminated");
        self.broadcast(
            &ServerMsg::PlayerHit {
                player_id: victim_id.to_string(),
                killer_id,
            },
            None,
        );
    }

    /// Handle transport close
    fn handle_disconnect(&mut self, session_id: SessionId) {
        self.fanout.unregister(&session_id);

        let Some(player_id) = self.registry.leave(&session_id) else {
            debug!(session_id = %session_id, "Session closed");
            return;
        };
        self.store.remove_player(&player_id);

        info!(session_id = %session_id, player_id = %player_id, "Player left");
        self.broadcast(&ServerMsg::PlayerLeft { player_id }, None);
    }

    /// Advance projectiles, expire the ones that left the map, resend the rest
    pub fn run_tick(&mut self) {
        let removed = self.store.advance_projectiles(&self.config.bounds);
        for projectile_id in removed {
            self.broadcast(&ServerMsg::ProjectileDestroyed { projectile_id }, None);
        }

        if let Some(update) = SnapshotBuilder::new(&self.config.rules).projectiles_update(&self.store) {
            self.broadcast(&update, None);
        }
        self.sync_stats();
    }

    /// Regenerate health for players out of combat
    pub fn run_regen(&mut self, now_ms: u64) {
        let healed = self.store.regenerate(now_ms, self.config.regen_cooldown_ms);
        for (player_id, hp) in healed {
            self.broadcast(&ServerMsg::HpUpdate { player_id, hp }, None);
        }
    }

    fn broadcast(&mut self, msg: &ServerMsg, exclude: Option<&str>) {
        let exclude = exclude.and_then(|id| self.registry.session_of(id));
        self.fanout.broadcast(msg, exclude);
    }

    fn reply(&mut self, session_id: &SessionId, msg: &ServerMsg) {
        if let Err(e) = self.fanout.send_to(session_id, msg) {
            debug!(session_id = %session_id, error = %e, "Reply not delivered");
        }
    }

    fn sync_stats(&self) {
        self.stats
            .players
            .store(self.store.player_count(), Ordering::Relaxed);
        self.stats.sessions.store(self.fanout.len(), Ordering::Relaxed);
        self.stats
            .projectiles
            .store(self.store.projectiles().len(), Ordering::Relaxed);
    }
}
