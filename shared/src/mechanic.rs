//! Timed hazard ("mechanic") data model
//!
//! A [`Mechanic`] is plain data: an id, an absolute lifetime and a
//! [`MechanicKind`] carrying the shape. The server owns live mechanics and
//! resolves them; clients only draw what arrives in snapshots.

use crate::geometry::{ease_out_cubic, Vec2};
use crate::status::StatusKind;
use crate::PlayerId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type MechanicId = u64;

/// A tether endpoint: a fixed point or a live player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Anchor {
    Point(Vec2),
    Player(PlayerId),
}

/// A status applied as part of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusSpec {
    pub kind: StatusKind,
    pub duration_ms: u64,
}

/// What a tower does to players when it resolves.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EffectSpec {
    pub damage: Option<f32>,
    pub status: Option<StatusSpec>,
}

impl EffectSpec {
    pub fn damage(amount: f32) -> Self {
        Self {
            damage: Some(amount),
            status: None,
        }
    }

    pub fn status(kind: StatusKind, duration_ms: u64) -> Self {
        Self {
            damage: None,
            status: Some(StatusSpec { kind, duration_ms }),
        }
    }

    pub fn with_status(mut self, kind: StatusKind, duration_ms: u64) -> Self {
        self.status = Some(StatusSpec { kind, duration_ms });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MechanicKind {
    Chariot {
        origin: Vec2,
        radius: f32,
    },
    Dynamo {
        origin: Vec2,
        inner_radius: f32,
        outer_radius: f32,
    },
    Spread {
        target: PlayerId,
        radius: f32,
    },
    Stack {
        target: PlayerId,
        radius: f32,
    },
    Tether {
        from: Anchor,
        to: Anchor,
        required_distance: f32,
        damage: f32,
    },
    Tower {
        origin: Vec2,
        radius: f32,
        required_players: u32,
        on_success: Option<EffectSpec>,
        on_failure: Option<EffectSpec>,
    },
    RadialKnockback {
        origin: Vec2,
        radius: f32,
        distance: f32,
        knockback_ms: u64,
    },
    /// Pushes players on the left-hand side of `start -> end` away from the line.
    LinearKnockback {
        start: Vec2,
        end: Vec2,
        distance: f32,
        knockback_ms: u64,
    },
    LineAoe {
        start: Vec2,
        end: Vec2,
        width: f32,
    },
    ConalAoe {
        origin: Vec2,
        /// Facing, in radians.
        direction: f32,
        /// Full opening of the cone, in radians.
        angle: f32,
        radius: f32,
    },
}

impl MechanicKind {
    pub fn mechanic_type(&self) -> MechanicType {
        match self {
            MechanicKind::Chariot { .. } => MechanicType::Chariot,
            MechanicKind::Dynamo { .. } => MechanicType::Dynamo,
            MechanicKind::Spread { .. } => MechanicType::Spread,
            MechanicKind::Stack { .. } => MechanicType::Stack,
            MechanicKind::Tether { .. } => MechanicType::Tether,
            MechanicKind::Tower { .. } => MechanicType::Tower,
            MechanicKind::RadialKnockback { .. } => MechanicType::RadialKnockback,
            MechanicKind::LinearKnockback { .. } => MechanicType::LinearKnockback,
            MechanicKind::LineAoe { .. } => MechanicType::LineAoe,
            MechanicKind::ConalAoe { .. } => MechanicType::ConalAoe,
        }
    }
}

/// Discriminator for [`MechanicKind`], with the wire names used by tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MechanicType {
    Chariot,
    Dynamo,
    Spread,
    Stack,
    Tether,
    Tower,
    RadialKnockback,
    LinearKnockback,
    LineAoe,
    ConalAoe,
}

impl MechanicType {
    pub const ALL: [MechanicType; 10] = [
        MechanicType::Chariot,
        MechanicType::Dynamo,
        MechanicType::Spread,
        MechanicType::Stack,
        MechanicType::Tether,
        MechanicType::Tower,
        MechanicType::RadialKnockback,
        MechanicType::LinearKnockback,
        MechanicType::LineAoe,
        MechanicType::ConalAoe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MechanicType::Chariot => "chariot",
            MechanicType::Dynamo => "dynamo",
            MechanicType::Spread => "spread",
            MechanicType::Stack => "stack",
            MechanicType::Tether => "tether",
            MechanicType::Tower => "tower",
            MechanicType::RadialKnockback => "radialKnockback",
            MechanicType::LinearKnockback => "linearKnockback",
            MechanicType::LineAoe => "lineAoe",
            MechanicType::ConalAoe => "conalAoe",
        }
    }
}

impl fmt::Display for MechanicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mechanic type: {0}")]
pub struct ParseMechanicTypeError(pub String);

impl FromStr for MechanicType {
    type Err = ParseMechanicTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MechanicType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseMechanicTypeError(s.to_string()))
    }
}

/// A live mechanic. `started_at` and `ends_at` are absolute server milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mechanic {
    pub id: MechanicId,
    pub started_at: u64,
    pub ends_at: u64,
    pub kind: MechanicKind,
}

impl Mechanic {
    pub fn new(id: MechanicId, kind: MechanicKind, started_at: u64, duration_ms: u64) -> Self {
        Self {
            id,
            started_at,
            ends_at: started_at.saturating_add(duration_ms),
            kind,
        }
    }

    pub fn mechanic_type(&self) -> MechanicType {
        self.kind.mechanic_type()
    }

    /// True from `ends_at` onwards; never flips back.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.ends_at
    }

    /// Eased visual progress from spawn to resolution.
    pub fn progress(&self, now: u64) -> f32 {
        let total = self.ends_at.saturating_sub(self.started_at);
        if total == 0 {
            return 1.0;
        }
        let elapsed = now.saturating_sub(self.started_at) as f32;
        ease_out_cubic(elapsed / total as f32)
    }
}
