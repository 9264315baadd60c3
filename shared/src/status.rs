use crate::PlayerId;
use serde::{Deserialize, Serialize};

pub type StatusId = u64;

/// Damage taken while vulnerable is multiplied by this factor.
pub const VULNERABILITY_MULTIPLIER: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    /// Multiplies incoming damage.
    Vulnerability,
    /// Movement input is acknowledged but ignored.
    Rooted,
    /// Periodic damage for its duration.
    Bleed,
    /// Lethal damage when it runs out.
    Doom,
}

impl StatusKind {
    pub fn damage_multiplier(&self) -> f32 {
        match self {
            StatusKind::Vulnerability => VULNERABILITY_MULTIPLIER,
            _ => 1.0,
        }
    }

    pub fn blocks_movement(&self) -> bool {
        matches!(self, StatusKind::Rooted)
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusKind::Vulnerability => "vulnerability",
            StatusKind::Rooted => "rooted",
            StatusKind::Bleed => "bleed",
            StatusKind::Doom => "doom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodicDamage {
    pub amount: f32,
    pub interval_ms: u64,
}

/// A status effect as it appears in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEffectState {
    pub id: StatusId,
    pub kind: StatusKind,
    pub player_id: PlayerId,
    pub started_at: u64,
    pub duration_ms: u64,
    pub periodic: Option<PeriodicDamage>,
    pub on_expire_damage: Option<f32>,
}

impl StatusEffectState {
    pub fn expires_at(&self) -> u64 {
        self.started_at.saturating_add(self.duration_ms)
    }

    pub fn is_active(&self, now: u64) -> bool {
        now < self.expires_at()
    }
}
