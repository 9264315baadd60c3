//! Encounter scripting
//!
//! Scripts are plain async functions running as their own tokio tasks. They
//! never touch the game directly: every action goes through a
//! [`ScriptRunner`], which turns it into a [`ScriptCommand`] for the server
//! loop to apply between ticks. Anything that needs an answer (a snapshot, a
//! mechanic resolution) carries a oneshot reply channel.

pub mod context;
pub mod host;
pub mod hub;
pub mod runner;
pub mod selectors;
mod timeline;

pub use context::{ContextValue, ScriptContext};
pub use host::ScriptHost;
pub use hub::ResolutionHub;
pub use runner::ScriptRunner;

use crate::mechanics::Resolution;
use shared::{GameState, MechanicId, MechanicKind, PeriodicDamage, PlayerId, StatusKind};
use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("mechanic timing given more than once")]
    ConflictingTiming,
    #[error("mechanic has no timing")]
    MissingTiming,
    #[error("trigger time {trigger_at}ms already passed at {elapsed}ms")]
    TriggerPassed { trigger_at: u64, elapsed: u64 },
    #[error("unknown mechanic {0}")]
    UnknownMechanic(MechanicId),
    #[error("simulation is no longer running")]
    Disconnected,
    #[error("missing context value '{0}'")]
    MissingContext(String),
    #[error("{0}")]
    Failed(String),
}

pub type ScriptResult = Result<(), ScriptError>;

/// Requests from scripts to the server loop.
#[derive(Debug)]
pub enum ScriptCommand {
    Spawn {
        id: MechanicId,
        kind: MechanicKind,
        duration_ms: u64,
    },
    WaitForResolve {
        id: MechanicId,
        reply: oneshot::Sender<Result<Resolution, ScriptError>>,
    },
    Damage {
        player_id: PlayerId,
        amount: f32,
    },
    ApplyStatus {
        player_id: PlayerId,
        kind: StatusKind,
        duration_ms: u64,
        periodic: Option<PeriodicDamage>,
        on_expire_damage: Option<f32>,
    },
    GetState {
        reply: oneshot::Sender<GameState>,
    },
}

/// A mechanic plus exactly one way of saying when it resolves.
///
/// `delay` is an alias of `duration`. `trigger_at` is measured from the start
/// of the script that spawns it.
#[derive(Debug, Clone, PartialEq)]
pub struct MechanicSpec {
    pub kind: MechanicKind,
    duration_ms: Option<u64>,
    delay_ms: Option<u64>,
    trigger_at_ms: Option<u64>,
}

impl MechanicSpec {
    pub fn new(kind: MechanicKind) -> Self {
        Self {
            kind,
            duration_ms: None,
            delay_ms: None,
            trigger_at_ms: None,
        }
    }

    pub fn duration(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    pub fn delay(mut self, ms: u64) -> Self {
        self.delay_ms = Some(ms);
        self
    }

    pub fn trigger_at(mut self, ms: u64) -> Self {
        self.trigger_at_ms = Some(ms);
        self
    }

    /// Time left until resolution for a script that has been running for
    /// `elapsed_ms`.
    pub fn resolve_duration(&self, elapsed_ms: u64) -> Result<u64, ScriptError> {
        match (self.duration_ms, self.delay_ms, self.trigger_at_ms) {
            (Some(ms), None, None) | (None, Some(ms), None) => Ok(ms),
            (None, None, Some(trigger_at)) => {
                trigger_at
                    .checked_sub(elapsed_ms)
                    .ok_or(ScriptError::TriggerPassed {
                        trigger_at,
                        elapsed: elapsed_ms,
                    })
            }
            (None, None, None) => Err(ScriptError::MissingTiming),
            _ => Err(ScriptError::ConflictingTiming),
        }
    }
}

impl From<MechanicKind> for MechanicSpec {
    fn from(kind: MechanicKind) -> Self {
        Self::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Vec2;

    fn chariot() -> MechanicSpec {
        MechanicSpec::new(MechanicKind::Chariot {
            origin: Vec2::new(400.0, 400.0),
            radius: 100.0,
        })
    }

    #[test]
    fn test_duration_and_delay_are_equivalent() {
        assert_eq!(chariot().duration(3_000).resolve_duration(999), Ok(3_000));
        assert_eq!(chariot().delay(3_000).resolve_duration(999), Ok(3_000));
    }

    #[test]
    fn test_trigger_at_is_relative_to_elapsed() {
        assert_eq!(chariot().trigger_at(1_500).resolve_duration(200), Ok(1_300));
        assert_eq!(chariot().trigger_at(1_500).resolve_duration(1_500), Ok(0));
        assert_eq!(
            chariot().trigger_at(1_500).resolve_duration(2_000),
            Err(ScriptError::TriggerPassed {
                trigger_at: 1_500,
                elapsed: 2_000,
            })
        );
    }

    #[test]
    fn test_timing_must_be_given_exactly_once() {
        assert_eq!(
            chariot().resolve_duration(0),
            Err(ScriptError::MissingTiming)
        );
        assert_eq!(
            chariot().duration(10).delay(10).resolve_duration(0),
            Err(ScriptError::ConflictingTiming)
        );
        assert_eq!(
            chariot().duration(10).trigger_at(10).resolve_duration(0),
            Err(ScriptError::ConflictingTiming)
        );
    }
}
