//! Combat rules - name-derived shot modifiers, projectiles and damage

use serde::{Deserialize, Serialize};

use crate::util::Vec2;

use super::PlayerId;

/// Shot parameters a player fires with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShotProfile {
    /// Damage per hit
    pub damage: u32,
    /// Projectile hitbox radius
    pub radius: f32,
    /// Distance travelled per tick
    pub speed: f32,
    /// Projectiles per shot
    pub count: u32,
}

impl Default for ShotProfile {
    fn default() -> Self {
        Self {
            damage: 10,
            radius: 5.0,
            speed: 10.0,
            count: 1,
        }
    }
}

/// Partial profile applied on top of the base when a rule matches
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileOverride {
    pub damage: Option<u32>,
    pub radius: Option<f32>,
    pub speed: Option<f32>,
    pub count: Option<u32>,
}

impl ProfileOverride {
    fn apply(&self, profile: &mut ShotProfile) {
        if let Some(damage) = self.damage {
            profile.damage = damage;
        }
        if let Some(radius) = self.radius {
            profile.radius = radius;
        }
        if let Some(speed) = self.speed {
            profile.speed = speed;
        }
        if let Some(count) = self.count {
            profile.count = count.max(1);
        }
    }
}

/// Rule table mapping display names to gameplay modifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierRules {
    /// Profile for names no rule matches
    pub base: ShotProfile,
    /// Exact number of leading and trailing spaces for the spacing rule
    pub spaced_padding: usize,
    pub spaced: ProfileOverride,
    /// Case-insensitive name prefix for the spread rule
    pub prefix: String,
    pub prefixed: ProfileOverride,
    /// Total fan angle for multi-projectile shots
    pub spread_degrees: f32,
    /// Case-insensitive substring that halves incoming damage and is
    /// hidden from displayed names
    pub defensive_marker: String,
}

impl Default for ModifierRules {
    fn default() -> Self {
        Self {
            base: ShotProfile::default(),
            spaced_padding: 4,
            spaced: ProfileOverride {
                damage: Some(18),
                radius: Some(10.0),
                ..Default::default()
            },
            prefix: "ex".to_string(),
            prefixed: ProfileOverride {
                damage: Some(7),
                speed: Some(6.0),
                count: Some(4),
                ..Default::default()
            },
            spread_degrees: 45.0,
            defensive_marker: "def".to_string(),
        }
    }
}

impl ModifierRules {
    /// Resolve the shot profile for a display name
    pub fn resolve(&self, name: &str) -> ShotProfile {
        let mut profile = self.base;
        if self.is_spaced(name) {
            self.spaced.apply(&mut profile);
        }
        if self.is_prefixed(name) {
            self.prefixed.apply(&mut profile);
        }
        profile
    }

    /// Name wrapped in exactly `spaced_padding` spaces on both sides
    pub fn is_spaced(&self, name: &str) -> bool {
        let leading = name.chars().take_while(|c| *c == ' ').count();
        let trailing = name.chars().rev().take_while(|c| *c == ' ').count();
        let has_content = !name.trim_matches(' ').is_empty();
        has_content && leading == self.spaced_padding && trailing == self.spaced_padding
    }

    pub fn is_prefixed(&self, name: &str) -> bool {
        !self.prefix.is_empty()
            && name
                .get(..self.prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(&self.prefix))
    }

    pub fn is_defensive(&self, name: &str) -> bool {
        !self.defensive_marker.is_empty()
            && name
                .to_ascii_lowercase()
                .contains(&self.defensive_marker.to_ascii_lowercase())
    }

    /// Damage a victim actually takes from a raw hit
    pub fn incoming_damage(&self, victim_name: &str, raw: u32) -> u32 {
        if self.is_defensive(victim_name) {
            raw.div_ceil(2)
        } else {
            raw
        }
    }

    /// Name as shown to other viewers
    pub fn display_name(&self, name: &str) -> String {
        let mut current = name.to_string();
        loop {
            let next = strip_ignore_ascii_case(&current, &self.defensive_marker);
            if next.len() == current.len() {
                return next;
            }
            current = next;
        }
    }
}

fn strip_ignore_ascii_case(haystack: &str, needle: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }

    let bytes = haystack.as_bytes();
    let pattern = needle.as_bytes();
    let mut out = String::with_capacity(haystack.len());
    let mut start = 0;
    let mut i = 0;

    while i + pattern.len() <= bytes.len() {
        if bytes[i..i + pattern.len()].eq_ignore_ascii_case(pattern) {
            out.push_str(&haystack[start..i]);
            i += pattern.len();
            start = i;
        } else {
            i += 1;
        }
    }

    out.push_str(&haystack[start..]);
    out
}

/// Spread `count` unit directions evenly over `total_degrees`, centered on `base`
pub fn fan_directions(base: Vec2, count: u32, total_degrees: f32) -> Vec<Vec2> {
    let base = base.normalize();
    if base.is_zero() {
        return Vec::new();
    }
    if count <= 1 {
        return vec![base];
    }

    let total = total_degrees.to_radians();
    let step = total / (count - 1) as f32;
    let start = base.angle() - total / 2.0;

    (0..count)
        .map(|i| Vec2::from_angle(start + step * i as f32))
        .collect()
}

/// Active projectile. Damage is fixed when fired.
#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub id: u64,
    pub owner_id: PlayerId,
    pub position: Vec2,
    /// Unit direction of travel
    pub direction: Vec2,
    pub speed: f32,
    pub radius: f32,
    pub damage: u32,
}

impl Projectile {
    pub fn new(id: u64, owner_id: PlayerId, position: Vec2, direction: Vec2, profile: &ShotProfile) -> Self {
        Self {
            id,
            owner_id,
            position,
            direction: direction.normalize(),
            speed: profile.speed,
            radius: profile.radius,
            damage: profile.damage,
        }
    }

    /// Move one tick along the velocity
    pub fn advance(&mut self) {
        self.position = self.position + self.direction * self.speed;
    }
}

/// Apply damage to health, returns (new_health, is_dead)
pub fn apply_damage(current_health: u32, damage: u32) -> (u32, bool) {
    let new_health = current_health.saturating_sub(damage);
    (new_health, new_health == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ModifierRules {
        ModifierRules::default()
    }

    #[test]
    fn test_default_profile() {
        let profile = rules().resolve("alice");
        assert_eq!(profile, ShotProfile::default());
        assert_eq!(profile.damage, 10);
        assert_eq!(profile.count, 1);
    }

    #[test]
    fn test_spaced_name_profile() {
        let profile = rules().resolve("    B    ");
        assert_eq!(profile.radius, 10.0);
        assert_eq!(profile.damage, 18);
        assert_eq!(profile.speed, 10.0);
    }

    #[test]
    fn test_spacing_requires_exactly_four() {
        let r = rules();
        assert!(!r.is_spaced("   B    "));
        assert!(!r.is_spaced("     B    "));
        assert!(!r.is_spaced("    B"));
        assert!(!r.is_spaced("        "));
        assert!(!r.is_spaced("    "));
        assert!(r.is_spaced("    a b    "));
    }

    #[test]
    fn test_prefix_rule_case_insensitive() {
        let r = rules();
        for name in ["ex", "Exter", "EXO", "eXample"] {
            let profile = r.resolve(name);
            assert_eq!(profile.speed, 6.0, "{name}");
            assert_eq!(profile.damage, 7, "{name}");
            assert_eq!(profile.count, 4, "{name}");
        }
        assert!(!r.is_prefixed("e"));
        assert!(!r.is_prefixed("next"));
    }

    #[test]
    fn test_prefix_on_multibyte_name_does_not_panic() {
        assert!(!rules().is_prefixed("é"));
        assert!(!rules().is_prefixed("日本"));
    }

    #[test]
    fn test_defensive_halving_rounds_up() {
        let r = rules();
        assert_eq!(r.incoming_damage("DefGuy", 10), 5);
        assert_eq!(r.incoming_damage("undefeated", 7), 4);
        assert_eq!(r.incoming_damage("xdEFx", 18), 9);
        assert_eq!(r.incoming_damage("xdEFx", 1), 1);
        assert_eq!(r.incoming_damage("plain", 7), 7);
    }

    #[test]
    fn test_display_name_strips_marker() {
        let r = rules();
        assert_eq!(r.display_name("DefGuy"), "Guy");
        assert_eq!(r.display_name("aDEFbdefc"), "abc");
        assert_eq!(r.display_name("dedeff"), "");
        assert_eq!(r.display_name("日本def"), "日本");
        assert_eq!(r.display_name("plain"), "plain");
    }

    #[test]
    fn test_fan_single_is_base() {
        let dirs = fan_directions(Vec2::new(0.0, 2.0), 1, 45.0);
        assert_eq!(dirs.len(), 1);
        assert!((dirs[0].x).abs() < 1e-6);
        assert!((dirs[0].y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_fan_four_symmetric_over_45() {
        let base = Vec2::new(1.0, 1.0);
        let dirs = fan_directions(base, 4, 45.0);
        assert_eq!(dirs.len(), 4);

        let base_angle = base.angle();
        let offsets: Vec<f32> = dirs
            .iter()
            .map(|d| (d.angle() - base_angle).to_degrees())
            .collect();

        for d in &dirs {
            assert!((d.length() - 1.0).abs() < 1e-5);
        }
        assert!((offsets[0] + 22.5).abs() < 1e-3);
        assert!((offsets[1] + 7.5).abs() < 1e-3);
        assert!((offsets[2] - 7.5).abs() < 1e-3);
        assert!((offsets[3] - 22.5).abs() < 1e-3);
    }

    #[test]
    fn test_fan_zero_direction_is_empty() {
        assert!(fan_directions(Vec2::ZERO, 4, 45.0).is_empty());
    }

    #[test]
    fn test_projectile_advance() {
        let mut p = Projectile::new(
            1,
            "a".into(),
            Vec2::new(100.0, 100.0),
            Vec2::new(2.0, 0.0),
            &ShotProfile::default(),
        );
        p.advance();
        assert_eq!(p.position, Vec2::new(110.0, 100.0));
    }

    #[test]
    fn test_apply_damage_floors_at_zero() {
        assert_eq!(apply_damage(10, 3), (7, false));
        assert_eq!(apply_damage(5, 18), (0, true));
    }
}
