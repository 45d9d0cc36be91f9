//! Room actor tests driven through the public handle with real timers

use std::time::Duration;

use arena_game_server::config::GameConfig;
use arena_game_server::game::fanout::Frame;
use arena_game_server::game::{GameRoom, RoomHandle};
use arena_game_server::ws::protocol::{ClientMsg, ServerMsg};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_test::assert_ok;
use uuid::Uuid;

fn fast_config() -> GameConfig {
    GameConfig {
        tick_interval: Duration::from_millis(10),
        regen_interval: Duration::from_millis(20),
        regen_cooldown_ms: 50,
        ..GameConfig::default()
    }
}

fn start_room(config: GameConfig) -> RoomHandle {
    let (room, handle) = GameRoom::new(config, 42);
    tokio::spawn(room.run());
    handle
}

struct TestClient {
    session_id: Uuid,
    frames: mpsc::Receiver<Frame>,
}

impl TestClient {
    async fn connect(room: &RoomHandle) -> Self {
        let session_id = Uuid::new_v4();
        let frames = assert_ok!(room.connect(session_id).await);
        Self { session_id, frames }
    }

    async fn send(&self, room: &RoomHandle, msg: ClientMsg) {
        assert_ok!(room.send(self.session_id, msg).await);
    }

    async fn next(&mut self) -> ServerMsg {
        let frame = timeout(Duration::from_secs(2), self.frames.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("outbound queue closed");
        serde_json::from_str(&frame).expect("server sent invalid json")
    }

    /// Skip frames until one matches
    async fn wait_for(&mut self, pred: impl Fn(&ServerMsg) -> bool) -> ServerMsg {
        loop {
            let msg = self.next().await;
            if pred(&msg) {
                return msg;
            }
        }
    }

    async fn join(room: &RoomHandle, name: &str, x: f32, y: f32) -> (Self, String) {
        let mut client = Self::connect(room).await;
        client
            .send(
                room,
                ClientMsg::PlayerJoin {
                    display_name: name.to_string(),
                    x,
                    y,
                },
            )
            .await;
        let id = match client.next().await {
            ServerMsg::JoinAck { id, .. } => id,
            other => panic!("expected joinAck, got {other:?}"),
        };
        assert!(matches!(client.next().await, ServerMsg::CurrentPlayers { .. }));
        (client, id)
    }
}

async fn shoot(client: &TestClient, room: &RoomHandle, player_id: &str, dx: f32, dy: f32) {
    client
        .send(
            room,
            ClientMsg::Shoot {
                player_id: player_id.to_string(),
                x: 0.0,
                y: 0.0,
                direction_x: dx,
                direction_y: dy,
            },
        )
        .await;
}

#[tokio::test]
async fn spaced_shooter_eliminates_plain_victim() {
    let room = start_room(GameConfig::default());
    let (mut a, a_id) = TestClient::join(&room, "A", 100.0, 100.0).await;
    let (mut b, b_id) = TestClient::join(&room, "    B    ", 400.0, 100.0).await;

    shoot(&b, &room, &b_id, -1.0, 0.0).await;
    let projectile = match a
        .wait_for(|m| matches!(m, ServerMsg::ProjectileCreated { .. }))
        .await
    {
        ServerMsg::ProjectileCreated { projectile } => projectile,
        _ => unreachable!(),
    };
    assert_eq!(projectile.radius, 10.0);
    assert_eq!(projectile.damage, 18);

    a.send(
        &room,
        ClientMsg::PlayerDamaged {
            victim_id: a_id.clone(),
            shooter_id: b_id.clone(),
            projectile_id: Some(projectile.id),
        },
    )
    .await;

    let hit = b
        .wait_for(|m| matches!(m, ServerMsg::PlayerHit { .. }))
        .await;
    assert_eq!(
        hit,
        ServerMsg::PlayerHit {
            player_id: a_id,
            killer_id: Some(b_id)
        }
    );
}

#[tokio::test]
async fn spaced_shooter_against_defensive_victim_rounds_up() {
    let room = start_room(GameConfig::default());
    let (mut a, a_id) = TestClient::join(&room, "Adef", 100.0, 100.0).await;
    let (b, b_id) = TestClient::join(&room, "    B    ", 400.0, 100.0).await;

    b.send(
        &room,
        ClientMsg::PlayerDamaged {
            victim_id: a_id.clone(),
            shooter_id: b_id.clone(),
            projectile_id: None,
        },
    )
    .await;

    let update = a
        .wait_for(|m| matches!(m, ServerMsg::HpUpdate { .. }))
        .await;
    assert_eq!(update, ServerMsg::HpUpdate { player_id: a_id, hp: 1 });
}

#[tokio::test]
async fn unknown_identities_produce_no_broadcast() {
    let room = start_room(GameConfig::default());
    let (mut a, a_id) = TestClient::join(&room, "A", 100.0, 100.0).await;

    a.send(
        &room,
        ClientMsg::PlayerDamaged {
            victim_id: a_id.clone(),
            shooter_id: "ghost".into(),
            projectile_id: None,
        },
    )
    .await;
    a.send(&room, ClientMsg::SpectateHello).await;

    // The spectate reply is the very next frame
    match a.next().await {
        ServerMsg::CurrentPlayers { players } => {
            assert_eq!(players.len(), 1);
            assert_eq!(players[0].hp, 10);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn projectiles_expire_at_map_edge() {
    let room = start_room(fast_config());
    let (mut a, a_id) = TestClient::join(&room, "A", 1970.0, 500.0).await;
    shoot(&a, &room, &a_id, 1.0, 0.0).await;

    let created = a
        .wait_for(|m| matches!(m, ServerMsg::ProjectileCreated { .. }))
        .await;
    let id = match created {
        ServerMsg::ProjectileCreated { projectile } => projectile.id,
        _ => unreachable!(),
    };

    let destroyed = a
        .wait_for(|m| matches!(m, ServerMsg::ProjectileDestroyed { .. }))
        .await;
    assert_eq!(destroyed, ServerMsg::ProjectileDestroyed { projectile_id: id });

    // Give the tick a few more rounds, then check the room is empty of projectiles
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(room.projectile_count(), 0);
}

#[tokio::test]
async fn health_regenerates_to_max() {
    let room = start_room(fast_config());
    let (mut v, v_id) = TestClient::join(&room, "victim", 100.0, 100.0).await;
    let (s, s_id) = TestClient::join(&room, "Ex", 400.0, 100.0).await;

    s.send(
        &room,
        ClientMsg::PlayerDamaged {
            victim_id: v_id.clone(),
            shooter_id: s_id,
            projectile_id: None,
        },
    )
    .await;

    let mut seen = Vec::new();
    loop {
        if let ServerMsg::HpUpdate { player_id, hp } = v.next().await {
            assert_eq!(player_id, v_id);
            seen.push(hp);
            if hp == 10 {
                break;
            }
        }
    }
    assert_eq!(seen, vec![3, 4, 5, 6, 7, 8, 9, 10]);
}

#[tokio::test]
async fn disconnect_notifies_others_and_updates_counts() {
    let room = start_room(GameConfig::default());
    let (a, a_id) = TestClient::join(&room, "A", 100.0, 100.0).await;
    let (mut b, _) = TestClient::join(&room, "B", 200.0, 100.0).await;
    assert_eq!(room.player_count(), 2);

    assert_ok!(room.disconnect(a.session_id).await);
    let left = b
        .wait_for(|m| matches!(m, ServerMsg::PlayerLeft { .. }))
        .await;
    assert_eq!(left, ServerMsg::PlayerLeft { player_id: a_id });
    assert_eq!(room.player_count(), 1);
    assert_eq!(room.session_count(), 1);
}

#[tokio::test]
async fn room_stops_when_handles_dropped() {
    let (room, handle) = GameRoom::new(fast_config(), 1);
    let task = tokio::spawn(room.run());
    drop(handle);
    let finished = timeout(Duration::from_secs(1), task).await;
    assert!(finished.is_ok());
}
