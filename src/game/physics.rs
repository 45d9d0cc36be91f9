//! Map bounds and movement constraints

use serde::{Deserialize, Serialize};

use crate::util::Vec2;

/// Fixed rectangular play area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    pub width: f32,
    pub height: f32,
}

impl Default for MapBounds {
    fn default() -> Self {
        Self {
            width: 2000.0,
            height: 2000.0,
        }
    }
}

impl MapBounds {
    /// Clamp a body of `radius` so it stays fully inside the map
    pub fn clamp(&self, position: Vec2, radius: f32) -> Vec2 {
        let clamp_axis = |value: f32, extent: f32| {
            let value = if value.is_finite() { value } else { extent / 2.0 };
            if extent <= radius * 2.0 {
                extent / 2.0
            } else {
                value.clamp(radius, extent - radius)
            }
        };
        Vec2::new(
            clamp_axis(position.x, self.width),
            clamp_axis(position.y, self.height),
        )
    }

    /// Inside `[0, width] x [0, height]`
    pub fn contains(&self, position: Vec2) -> bool {
        position.x >= 0.0
            && position.x <= self.width
            && position.y >= 0.0
            && position.y <= self.height
    }
}

/// Sustained travel speed allowed under the speed-limited policy, units per second
pub const DEFAULT_MAX_SPEED: f32 = 1200.0;

/// Unused travel a player may bank, in units
pub const DEFAULT_MAX_BURST: f32 = 240.0;

/// How client-reported positions are turned into authoritative ones
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum MovementPolicy {
    /// Accept the reported position, clamped to the map
    Clamped,
    /// Travel is paid from a budget refilled at `max_speed` units per second
    /// and capped at `max_burst`
    SpeedLimited { max_speed: f32, max_burst: f32 },
}

impl Default for MovementPolicy {
    fn default() -> Self {
        Self::SpeedLimited {
            max_speed: DEFAULT_MAX_SPEED,
            max_burst: DEFAULT_MAX_BURST,
        }
    }
}

impl MovementPolicy {
    /// Budget a freshly spawned player starts with
    pub fn initial_budget(&self) -> f32 {
        match *self {
            Self::Clamped => f32::INFINITY,
            Self::SpeedLimited { max_burst, .. } => max_burst.max(0.0),
        }
    }

    /// Budget after `elapsed_ms` of refill on top of what is left
    pub fn refill(&self, remaining: f32, elapsed_ms: u64) -> f32 {
        match *self {
            Self::Clamped => f32::INFINITY,
            Self::SpeedLimited {
                max_speed,
                max_burst,
            } => {
                let earned = max_speed.max(0.0) * elapsed_ms as f32 / 1000.0;
                (remaining.max(0.0) + earned).min(max_burst.max(0.0))
            }
        }
    }
}

/// Movement validation
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Compute the authoritative position for a movement report, travelling
    /// at most `budget` from `current`
    pub fn resolve_move(
        policy: MovementPolicy,
        bounds: &MapBounds,
        radius: f32,
        current: Vec2,
        reported: Vec2,
        budget: f32,
    ) -> Vec2 {
        if !reported.is_finite() {
            return current;
        }
        let target = match policy {
            MovementPolicy::Clamped => reported,
            MovementPolicy::SpeedLimited { .. } => {
                current + (reported - current).clamp_length(budget.max(0.0))
            }
        };
        bounds.clamp(target, radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RADIUS: f32 = 20.0;

    #[test]
    fn test_clamp_inside_minus_radius() {
        let bounds = MapBounds::default();
        assert_eq!(bounds.clamp(Vec2::new(-50.0, 3000.0), RADIUS), Vec2::new(20.0, 1980.0));
        assert_eq!(bounds.clamp(Vec2::new(500.0, 600.0), RADIUS), Vec2::new(500.0, 600.0));
    }

    #[test]
    fn test_clamp_non_finite_goes_to_center() {
        let bounds = MapBounds::default();
        let p = bounds.clamp(Vec2::new(f32::NAN, 100.0), RADIUS);
        assert_eq!(p, Vec2::new(1000.0, 100.0));
    }

    #[test]
    fn test_contains_edges() {
        let bounds = MapBounds::default();
        assert!(bounds.contains(Vec2::new(0.0, 2000.0)));
        assert!(!bounds.contains(Vec2::new(-0.1, 10.0)));
        assert!(!bounds.contains(Vec2::new(10.0, 2000.1)));
    }

    #[test]
    fn test_speed_limited_caps_travel_to_budget() {
        let bounds = MapBounds::default();
        let policy = MovementPolicy::default();
        let from = Vec2::new(100.0, 100.0);

        let small = PhysicsSystem::resolve_move(policy, &bounds, RADIUS, from, Vec2::new(105.0, 100.0), 10.0);
        assert_eq!(small, Vec2::new(105.0, 100.0));

        let teleport = PhysicsSystem::resolve_move(policy, &bounds, RADIUS, from, Vec2::new(900.0, 100.0), 10.0);
        assert!((teleport.x - 110.0).abs() < 1e-4);
        assert_eq!(teleport.y, 100.0);

        let spent = PhysicsSystem::resolve_move(policy, &bounds, RADIUS, from, Vec2::new(900.0, 100.0), 0.0);
        assert_eq!(spent, from);
    }

    #[test]
    fn test_budget_refills_with_time_up_to_burst() {
        let policy = MovementPolicy::SpeedLimited {
            max_speed: 600.0,
            max_burst: 100.0,
        };
        assert_eq!(policy.initial_budget(), 100.0);
        assert!((policy.refill(0.0, 50) - 30.0).abs() < 1e-4);
        assert!((policy.refill(20.0, 50) - 50.0).abs() < 1e-4);
        assert_eq!(policy.refill(90.0, 1_000), 100.0);
        assert_eq!(policy.refill(0.0, 0), 0.0);
        assert!(MovementPolicy::Clamped.refill(0.0, 0).is_infinite());
    }

    #[test]
    fn test_clamped_policy_trusts_within_bounds() {
        let bounds = MapBounds::default();
        let from = Vec2::new(100.0, 100.0);
        let moved = PhysicsSystem::resolve_move(
            MovementPolicy::Clamped,
            &bounds,
            RADIUS,
            from,
            Vec2::new(5000.0, 700.0),
            0.0,
        );
        assert_eq!(moved, Vec2::new(1980.0, 700.0));
    }

    #[test]
    fn test_non_finite_report_keeps_position() {
        let bounds = MapBounds::default();
        let from = Vec2::new(100.0, 100.0);
        let moved = PhysicsSystem::resolve_move(
            MovementPolicy::default(),
            &bounds,
            RADIUS,
            from,
            Vec2::new(f32::INFINITY, 0.0),
            f32::INFINITY,
        );
        assert_eq!(moved, from);
    }
}
