//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::combat::ModifierRules;
use crate::game::physics::{MapBounds, MovementPolicy, DEFAULT_MAX_BURST, DEFAULT_MAX_SPEED};
use crate::util::rate_limit::{MOVE_RATE_LIMIT, SHOT_RATE_LIMIT};
use crate::util::time::{DEFAULT_REGEN_COOLDOWN_MS, DEFAULT_REGEN_MS, DEFAULT_TICK_MS};

/// Port used when neither PORT nor SERVER_ADDR is set
pub const DEFAULT_PORT: u16 = 5000;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated), any origin if unset
    pub client_origin: Option<String>,
    /// Max position updates per second per connection
    pub move_rate_limit: u32,
    /// Max shots per second per connection
    pub shot_rate_limit: u32,
    /// Seed for identity suffixes, random if unset
    pub room_seed: Option<u64>,
    /// Simulation settings handed to the room
    pub game: GameConfig,
}

/// Everything the room needs, passed in at construction
#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    pub bounds: MapBounds,
    /// Player body radius used for clamping
    pub player_radius: f32,
    pub max_health: u32,
    /// Projectile tick period
    pub tick_interval: Duration,
    /// Health regeneration period
    pub regen_interval: Duration,
    /// Time without damage before regeneration applies
    pub regen_cooldown_ms: u64,
    pub movement: MovementPolicy,
    pub rules: ModifierRules,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            bounds: MapBounds::default(),
            player_radius: 20.0,
            max_health: 10,
            tick_interval: Duration::from_millis(DEFAULT_TICK_MS),
            regen_interval: Duration::from_millis(DEFAULT_REGEN_MS),
            regen_cooldown_ms: DEFAULT_REGEN_COOLDOWN_MS,
            movement: MovementPolicy::default(),
            rules: ModifierRules::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // PORT wins, then SERVER_ADDR, then the default port
        let server_addr = if let Some(port) = lookup("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            lookup("SERVER_ADDR").unwrap_or_else(|| format!("0.0.0.0:{}", DEFAULT_PORT))
        };

        let mut game = GameConfig::default();

        if let Some(width) = parse_var::<f32, _>(&lookup, "MAP_WIDTH")? {
            game.bounds.width = positive_finite("MAP_WIDTH", width)?;
        }
        if let Some(height) = parse_var::<f32, _>(&lookup, "MAP_HEIGHT")? {
            game.bounds.height = positive_finite("MAP_HEIGHT", height)?;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "TICK_MS")? {
            game.tick_interval = Duration::from_millis(positive("TICK_MS", ms)?);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "REGEN_MS")? {
            game.regen_interval = Duration::from_millis(positive("REGEN_MS", ms)?);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "REGEN_COOLDOWN_MS")? {
            game.regen_cooldown_ms = ms;
        }

        let max_speed = parse_var::<f32, _>(&lookup, "MAX_SPEED")?;
        let max_burst = parse_var::<f32, _>(&lookup, "MAX_BURST")?;
        game.movement = match lookup("MOVEMENT_POLICY").as_deref() {
            None | Some("speed_limited") => MovementPolicy::SpeedLimited {
                max_speed: match max_speed {
                    Some(speed) => positive_finite("MAX_SPEED", speed)?,
                    None => DEFAULT_MAX_SPEED,
                },
                max_burst: match max_burst {
                    Some(burst) => positive_finite("MAX_BURST", burst)?,
                    None => DEFAULT_MAX_BURST,
                },
            },
            Some("clamped") => MovementPolicy::Clamped,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "MOVEMENT_POLICY",
                    value: other.to_string(),
                })
            }
        };

        if let Some(degrees) = parse_var::<f32, _>(&lookup, "FAN_SPREAD_DEGREES")? {
            game.rules.spread_degrees = non_negative("FAN_SPREAD_DEGREES", degrees)?;
        }
        if let Some(damage) = parse_var::<u32, _>(&lookup, "BASE_DAMAGE")? {
            game.rules.base.damage = damage;
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(server_addr.clone()))?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").filter(|s| !s.trim().is_empty()),
            move_rate_limit: parse_var(&lookup, "MOVE_RATE_LIMIT")?.unwrap_or(MOVE_RATE_LIMIT),
            shot_rate_limit: parse_var(&lookup, "SHOT_RATE_LIMIT")?.unwrap_or(SHOT_RATE_LIMIT),
            room_seed: parse_var(&lookup, "ROOM_SEED")?,
            game,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn positive<T>(key: &'static str, value: T) -> Result<T, ConfigError>
where
    T: PartialOrd + Default + ToString,
{
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        })
    }
}

fn positive_finite(key: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        })
    }
}

/// Finite and at least zero
fn non_negative(key: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Invalid server address format: {0}")]
    InvalidAddress(String),
}
