//! Status effect ownership and expiry
//!
//! The [`StatusEffectManager`] is the only owner of active statuses. It never
//! touches players directly: [`StatusEffectManager::update`] reports the damage
//! that fell due this tick and the game applies it.

use log::debug;
use shared::{PeriodicDamage, PlayerId, StatusEffectState, StatusId, StatusKind};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone)]
struct ActiveStatus {
    state: StatusEffectState,
    last_periodic_at: u64,
}

/// Damage owed by a status during one update.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusDamage {
    pub status_id: StatusId,
    pub player_id: PlayerId,
    pub kind: StatusKind,
    pub amount: f32,
}

#[derive(Debug)]
pub struct StatusEffectManager {
    effects: BTreeMap<StatusId, ActiveStatus>,
    next_id: StatusId,
}

impl Default for StatusEffectManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusEffectManager {
    pub fn new() -> Self {
        Self {
            effects: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn apply(
        &mut self,
        player_id: PlayerId,
        kind: StatusKind,
        duration_ms: u64,
        now: u64,
    ) -> StatusId {
        self.apply_with(player_id, kind, duration_ms, now, None, None)
    }

    /// Applies a status that may deal periodic and/or on-expire damage.
    pub fn apply_with(
        &mut self,
        player_id: PlayerId,
        kind: StatusKind,
        duration_ms: u64,
        now: u64,
        periodic: Option<PeriodicDamage>,
        on_expire_damage: Option<f32>,
    ) -> StatusId {
        let id = self.next_id;
        self.next_id += 1;

        debug!(
            "Status {} ({}) applied to player {} for {}ms",
            id,
            kind.label(),
            player_id,
            duration_ms
        );

        self.effects.insert(
            id,
            ActiveStatus {
                state: StatusEffectState {
                    id,
                    kind,
                    player_id,
                    started_at: now,
                    duration_ms,
                    periodic,
                    on_expire_damage,
                },
                last_periodic_at: now,
            },
        );
        id
    }

    /// Advances every status to `now`, removing the expired ones.
    ///
    /// Periodic damage is only counted up to the expiry instant, and on-expire
    /// damage is reported exactly once, in the update that removes the status.
    pub fn update(&mut self, now: u64) -> Vec<StatusDamage> {
        let mut damage = Vec::new();
        let mut expired = Vec::new();

        for (id, active) in self.effects.iter_mut() {
            let state = &active.state;
            let horizon = now.min(state.expires_at());

            if let Some(periodic) = state.periodic {
                if periodic.interval_ms > 0 {
                    while active.last_periodic_at + periodic.interval_ms <= horizon {
                        active.last_periodic_at += periodic.interval_ms;
                        damage.push(StatusDamage {
                            status_id: *id,
                            player_id: state.player_id,
                            kind: state.kind,
                            amount: periodic.amount,
                        });
                    }
                }
            }

            if !state.is_active(now) {
                if let Some(amount) = state.on_expire_damage {
                    damage.push(StatusDamage {
                        status_id: *id,
                        player_id: state.player_id,
                        kind: state.kind,
                        amount,
                    });
                }
                expired.push(*id);
            }
        }

        for id in expired {
            self.effects.remove(&id);
        }

        damage
    }

    pub fn effects_for(&self, player_id: PlayerId, now: u64) -> Vec<StatusEffectState> {
        self.effects
            .values()
            .filter(|a| a.state.player_id == player_id && a.state.is_active(now))
            .map(|a| a.state.clone())
            .collect()
    }

    pub fn has_status(&self, player_id: PlayerId, kind: StatusKind, now: u64) -> bool {
        self.effects
            .values()
            .any(|a| a.state.player_id == player_id && a.state.kind == kind && a.state.is_active(now))
    }

    /// Combined multiplier of every distinct active status kind on the player.
    pub fn damage_multiplier(&self, player_id: PlayerId, now: u64) -> f32 {
        let kinds: HashSet<StatusKind> = self
            .effects
            .values()
            .filter(|a| a.state.player_id == player_id && a.state.is_active(now))
            .map(|a| a.state.kind)
            .collect();

        kinds.iter().map(|k| k.damage_multiplier()).product()
    }

    pub fn remove_player(&mut self, player_id: PlayerId) {
        self.effects.retain(|_, a| a.state.player_id != player_id);
    }

    pub fn all(&self, now: u64) -> Vec<StatusEffectState> {
        self.effects
            .values()
            .filter(|a| a.state.is_active(now))
            .map(|a| a.state.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}
