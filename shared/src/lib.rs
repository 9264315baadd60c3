//! Types and rules shared by the arena server and client
//!
//! Everything the two sides must agree on lives here: arena constants, the
//! wire protocol, the mechanic/status/player data model, and the movement
//! integration used both for authoritative simulation and client prediction.

pub mod geometry;
pub mod mechanic;
pub mod player;
pub mod protocol;
pub mod status;

pub use geometry::Vec2;
pub use mechanic::{Anchor, EffectSpec, Mechanic, MechanicId, MechanicKind, MechanicType};
pub use player::{integrate_movement, Keys, Knockback, PlayerInput, PlayerState};
pub use protocol::{GameState, Packet};
pub use status::{PeriodicDamage, StatusEffectState, StatusId, StatusKind};

pub type PlayerId = u32;

pub const ARENA_WIDTH: f32 = 800.0;
pub const ARENA_HEIGHT: f32 = 800.0;
pub const PLAYER_RADIUS: f32 = 15.0;
/// Pixels per second.
pub const PLAYER_SPEED: f32 = 200.0;
/// Longest frame a single input may integrate, in seconds.
pub const MAX_INPUT_DT: f32 = 0.1;
pub const MAX_HP: f32 = 100.0;
pub const MAX_PLAYERS: usize = 8;

/// One color per player slot; the slot count bounds how many players can join.
pub const PLAYER_COLORS: [&str; 8] = [
    "#e6194b", "#3cb44b", "#ffe119", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6",
];

pub const ARENA_CENTER: Vec2 = Vec2::new(ARENA_WIDTH / 2.0, ARENA_HEIGHT / 2.0);
