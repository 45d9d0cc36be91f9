//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::ws::protocol::ClientMsg;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Max position updates per second per connection; the client sends one
/// per rendered frame, so this covers 144 Hz displays
pub const MOVE_RATE_LIMIT: u32 = 240;

/// Max shots per second per connection
pub const SHOT_RATE_LIMIT: u32 = 30;

/// Per-connection rate limiter state. Only high-frequency messages are
/// throttled; joins, spectate requests and hit reports always pass.
#[derive(Clone)]
pub struct SessionRateLimiter {
    move_limiter: Arc<Limiter>,
    shot_limiter: Arc<Limiter>,
}

impl SessionRateLimiter {
    pub fn new(moves_per_second: u32, shots_per_second: u32) -> Self {
        Self {
            move_limiter: create_limiter(moves_per_second),
            shot_limiter: create_limiter(shots_per_second),
        }
    }

    /// Check if a position update is allowed (returns true if allowed)
    pub fn check_move(&self) -> bool {
        self.move_limiter.check().is_ok()
    }

    /// Check if a shot is allowed (returns true if allowed)
    pub fn check_shot(&self) -> bool {
        self.shot_limiter.check().is_ok()
    }

    /// Decide whether an inbound message is forwarded to the room
    pub fn admit(&self, msg: &ClientMsg) -> bool {
        match msg {
            ClientMsg::PlayerUpdate { .. } => self.check_move(),
            ClientMsg::Shoot { .. } => self.check_shot(),
            ClientMsg::SpectateHello
            | ClientMsg::PlayerJoin { .. }
            | ClientMsg::PlayerDamaged { .. }
            | ClientMsg::PlayerHit { .. } => true,
        }
    }
}

impl Default for SessionRateLimiter {
    fn default() -> Self {
        Self::new(MOVE_RATE_LIMIT, SHOT_RATE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update() -> ClientMsg {
        ClientMsg::PlayerUpdate {
            player_id: "a".into(),
            x: 1.0,
            y: 1.0,
            direction_x: 1.0,
            direction_y: 0.0,
        }
    }

    fn shot() -> ClientMsg {
        ClientMsg::Shoot {
            player_id: "a".into(),
            x: 1.0,
            y: 1.0,
            direction_x: 1.0,
            direction_y: 0.0,
        }
    }

    #[test]
    fn test_burst_is_limited() {
        let limiter = SessionRateLimiter::new(5, 5);
        let allowed = (0..50).filter(|_| limiter.check_move()).count();
        assert!(allowed >= 1);
        assert!(allowed < 50);
    }

    #[test]
    fn test_zero_quota_still_allows_one() {
        let limiter = SessionRateLimiter::new(0, 0);
        assert!(limiter.check_move());
        assert!(limiter.check_shot());
    }

    #[test]
    fn test_updates_at_limit_do_not_block_other_messages() {
        let limiter = SessionRateLimiter::new(1, 1);
        while limiter.admit(&update()) {}
        assert!(!limiter.admit(&update()));

        assert!(limiter.admit(&shot()));
        for _ in 0..10 {
            assert!(limiter.admit(&ClientMsg::PlayerJoin {
                display_name: "a".into(),
                x: 0.0,
                y: 0.0,
            }));
            assert!(limiter.admit(&ClientMsg::PlayerDamaged {
                victim_id: "a".into(),
                shooter_id: "b".into(),
                projectile_id: None,
            }));
            assert!(limiter.admit(&ClientMsg::PlayerHit {
                player_id: "a".into(),
                killer_id: None,
            }));
            assert!(limiter.admit(&ClientMsg::SpectateHello));
        }
    }

    #[test]
    fn test_shots_limited_separately() {
        let limiter = SessionRateLimiter::new(1, 1);
        while limiter.admit(&shot()) {}
        assert!(limiter.admit(&update()));
    }
}
