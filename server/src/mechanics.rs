//! Mechanic ownership, expiry and resolution
//!
//! Every mechanic goes through Active -> Expired -> Removed. The manager checks
//! expiry once per tick; on the tick a mechanic expires it computes the
//! [`Resolution`] from live player positions, applies the intrinsic effect of
//! the shape (tether, tower and knockbacks only), then drops the entity. The
//! other shapes only report who was hit and leave consequences to scripts.

use crate::game::{GameEvent, World};
use log::{debug, info};
use shared::geometry::{in_circle, in_cone, in_ring, in_rotated_rect};
use shared::{
    Anchor, EffectSpec, Mechanic, MechanicId, MechanicKind, MechanicType, PlayerId, Vec2,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hands out mechanic ids. Cloned into script runners so they can name a
/// mechanic before the spawn command reaches the game loop.
#[derive(Debug, Clone)]
pub struct MechanicIdAllocator(Arc<AtomicU64>);

impl MechanicIdAllocator {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(1)))
    }

    pub fn next_id(&self) -> MechanicId {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for MechanicIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a mechanic at the moment it expired.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub mechanic_id: MechanicId,
    pub mechanic_type: MechanicType,
    pub resolved_at: u64,
    /// Players inside the hit region, ordered by id.
    pub hits: Vec<PlayerId>,
    pub outcome: ResolutionOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    /// Geometry only; effects are up to the script.
    None,
    Tether {
        players: Vec<PlayerId>,
        distance: f32,
        required_distance: f32,
        failed: bool,
    },
    Tower {
        occupants: Vec<PlayerId>,
        required_players: u32,
        success: bool,
    },
    Knockback {
        pushed: Vec<PlayerId>,
    },
}

#[derive(Debug, Default)]
pub struct MechanicManager {
    mechanics: BTreeMap<MechanicId, Mechanic>,
    ids: MechanicIdAllocator,
}

impl MechanicManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> MechanicIdAllocator {
        self.ids.clone()
    }

    pub fn spawn(&mut self, kind: MechanicKind, now: u64, duration_ms: u64) -> MechanicId {
        let id = self.ids.next_id();
        self.insert(Mechanic::new(id, kind, now, duration_ms));
        id
    }

    /// Registers a mechanic under a pre-allocated id. Returns false, leaving the
    /// live mechanic untouched, if the id is already in use.
    pub fn insert(&mut self, mechanic: Mechanic) -> bool {
        if self.mechanics.contains_key(&mechanic.id) {
            return false;
        }
        debug!(
            "Mechanic {} ({}) live until {}",
            mechanic.id,
            mechanic.mechanic_type(),
            mechanic.ends_at
        );
        self.mechanics.insert(mechanic.id, mechanic);
        true
    }

    pub fn get(&self, id: MechanicId) -> Option<&Mechanic> {
        self.mechanics.get(&id)
    }

    pub fn all(&self) -> Vec<Mechanic> {
        self.mechanics.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.mechanics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mechanics.is_empty()
    }

    /// Resolves and removes every mechanic expired at `now`, in id order.
    pub(crate) fn update(&mut self, now: u64, world: &mut World<'_>) -> Vec<Resolution> {
        let expired: Vec<MechanicId> = self
            .mechanics
            .values()
            .filter(|m| m.is_expired(now))
            .map(|m| m.id)
            .collect();

        let mut resolutions = Vec::with_capacity(expired.len());
        for id in expired {
            let resolution = match self.mechanics.get(&id) {
                Some(mechanic) => resolve(mechanic, now, world),
                None => continue,
            };
            self.mechanics.remove(&id);

            info!(
                "Mechanic {} ({}) resolved, hits: {:?}",
                resolution.mechanic_id, resolution.mechanic_type, resolution.hits
            );
            resolutions.push(resolution);
        }
        resolutions
    }
}

fn resolve(mechanic: &Mechanic, now: u64, world: &mut World<'_>) -> Resolution {
    let positions = world.living_positions();
    let inside = |test: &dyn Fn(Vec2) -> bool| -> Vec<PlayerId> {
        positions
            .iter()
            .filter(|(_, pos)| test(*pos))
            .map(|(id, _)| *id)
            .collect()
    };

    let (hits, outcome) = match &mechanic.kind {
        MechanicKind::Chariot { origin, radius } => {
            (inside(&|p| in_circle(p, *origin, *radius)), ResolutionOutcome::None)
        }
        MechanicKind::Dynamo {
            origin,
            inner_radius,
            outer_radius,
        } => (
            inside(&|p| in_ring(p, *origin, *inner_radius, *outer_radius)),
            ResolutionOutcome::None,
        ),
        MechanicKind::Spread { target, radius } | MechanicKind::Stack { target, radius } => {
            let hits = match world.position(*target) {
                Some(center) => inside(&|p| in_circle(p, center, *radius)),
                None => Vec::new(),
            };
            (hits, ResolutionOutcome::None)
        }
        MechanicKind::LineAoe { start, end, width } => (
            inside(&|p| in_rotated_rect(p, *start, *end, *width)),
            ResolutionOutcome::None,
        ),
        MechanicKind::ConalAoe {
            origin,
            direction,
            angle,
            radius,
        } => (
            inside(&|p| in_cone(p, *origin, *direction, *angle, *radius)),
            ResolutionOutcome::None,
        ),
        MechanicKind::Tether {
            from,
            to,
            required_distance,
            damage,
        } => resolve_tether(mechanic.id, *from, *to, *required_distance, *damage, now, world),
        MechanicKind::Tower {
            origin,
            radius,
            required_players,
            on_success,
            on_failure,
        } => {
            let occupants = inside(&|p| in_circle(p, *origin, *radius));
            let success = occupants.len() as u32 >= *required_players;

            let (targets, effect) = if success {
                (occupants.clone(), on_success)
            } else {
                (world.player_ids(), on_failure)
            };
            if let Some(effect) = effect {
                apply_to_all(world, &targets, effect, now);
            }

            world.events.push(GameEvent::TowerResolved {
                mechanic_id: mechanic.id,
                occupants: occupants.clone(),
                required_players: *required_players,
                success,
            });

            (
                occupants.clone(),
                ResolutionOutcome::Tower {
                    occupants,
                    required_players: *required_players,
                    success,
                },
            )
        }
        MechanicKind::RadialKnockback {
            origin,
            radius,
            distance,
            knockback_ms,
        } => {
            let pushed = inside(&|p| in_circle(p, *origin, *radius));
            for id in &pushed {
                if let Some(player) = world.players.get_mut(id) {
                    let direction = (player.position - *origin).normalize();
                    player.start_knockback(direction * *distance, now, *knockback_ms);
                }
            }
            (pushed.clone(), ResolutionOutcome::Knockback { pushed })
        }
        MechanicKind::LinearKnockback {
            start,
            end,
            distance,
            knockback_ms,
        } => {
            let axis = *end - *start;
            let len = axis.length();
            let pushed = if len == 0.0 {
                Vec::new()
            } else {
                let dir = axis.normalize();
                let normal = dir.perpendicular();
                inside(&|p| {
                    let rel = p - *start;
                    let along = rel.dot(dir);
                    rel.dot(normal) > 0.0 && (0.0..=len).contains(&along)
                })
            };

            let push = axis.normalize().perpendicular() * *distance;
            for id in &pushed {
                if let Some(player) = world.players.get_mut(id) {
                    player.start_knockback(push, now, *knockback_ms);
                }
            }
            (pushed.clone(), ResolutionOutcome::Knockback { pushed })
        }
    };

    Resolution {
        mechanic_id: mechanic.id,
        mechanic_type: mechanic.mechanic_type(),
        resolved_at: now,
        hits,
        outcome,
    }
}

fn resolve_tether(
    mechanic_id: MechanicId,
    from: Anchor,
    to: Anchor,
    required_distance: f32,
    damage: f32,
    now: u64,
    world: &mut World<'_>,
) -> (Vec<PlayerId>, ResolutionOutcome) {
    let (Some(a), Some(b)) = (world.anchor_position(from), world.anchor_position(to)) else {
        debug!("Tether {} lost an endpoint, skipping", mechanic_id);
        return (Vec::new(), ResolutionOutcome::None);
    };

    let players: Vec<PlayerId> = [from, to]
        .iter()
        .filter_map(|anchor| match anchor {
            Anchor::Player(id) => Some(*id),
            Anchor::Point(_) => None,
        })
        .collect();

    let distance = a.distance(b);
    let failed = distance < required_distance;
    if failed {
        for id in &players {
            world.damage(*id, damage, now);
        }
    }

    world.events.push(GameEvent::TetherResolved {
        mechanic_id,
        players: players.clone(),
        distance,
        required_distance,
        failed,
    });

    (
        players.clone(),
        ResolutionOutcome::Tether {
            players,
            distance,
            required_distance,
            failed,
        },
    )
}

fn apply_to_all(world: &mut World<'_>, targets: &[PlayerId], effect: &EffectSpec, now: u64) {
    for id in targets {
        world.apply_effect(*id, effect, now);
    }
}
