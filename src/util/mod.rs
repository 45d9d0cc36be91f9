//! Shared utilities

pub mod rate_limit;
pub mod time;
pub mod vec2;

pub use vec2::Vec2;
