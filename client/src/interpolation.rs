//! Snapshot interpolation for remote players.
//!
//! Remote avatars are drawn slightly in the past so there is almost always a
//! pair of received positions to blend between.

use shared::{PlayerId, Vec2};
use std::collections::{HashMap, VecDeque};

/// Samples kept per player.
pub const BUFFER_CAPACITY: usize = 32;
/// How far behind the receive clock remote players are rendered, in ms.
pub const INTERPOLATION_DELAY_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub received_at: u64,
    pub position: Vec2,
}

#[derive(Debug, Default)]
pub struct InterpolationBuffer {
    players: HashMap<PlayerId, VecDeque<Sample>>,
}

impl InterpolationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a position received at `received_at`. Out-of-order samples are
    /// dropped so each ring stays sorted by receive time.
    pub fn push(&mut self, player_id: PlayerId, received_at: u64, position: Vec2) {
        let samples = self.players.entry(player_id).or_default();
        if samples
            .back()
            .is_some_and(|last| last.received_at > received_at)
        {
            return;
        }
        if samples.len() == BUFFER_CAPACITY {
            samples.pop_front();
        }
        samples.push_back(Sample {
            received_at,
            position,
        });
    }

    /// Forgets every player not in `ids`.
    pub fn retain_players(&mut self, ids: &[PlayerId]) {
        self.players.retain(|id, _| ids.contains(id));
    }

    pub fn remove(&mut self, player_id: PlayerId) {
        self.players.remove(&player_id);
    }

    pub fn len(&self, player_id: PlayerId) -> usize {
        self.players.get(&player_id).map_or(0, VecDeque::len)
    }

    pub fn latest(&self, player_id: PlayerId) -> Option<Vec2> {
        self.players
            .get(&player_id)
            .and_then(|samples| samples.back())
            .map(|s| s.position)
    }

    /// Position to draw at local time `now`: linear between the two samples
    /// bracketing `now - INTERPOLATION_DELAY_MS`, or the latest sample when
    /// nothing brackets it.
    pub fn sample(&self, player_id: PlayerId, now: u64) -> Option<Vec2> {
        let samples = self.players.get(&player_id)?;
        let latest = samples.back()?;
        let render_time = now.saturating_sub(INTERPOLATION_DELAY_MS);

        for (before, after) in samples.iter().zip(samples.iter().skip(1)) {
            if before.received_at <= render_time && render_time <= after.received_at {
                let span = after.received_at - before.received_at;
                if span == 0 {
                    return Some(after.position);
                }
                let t = (render_time - before.received_at) as f32 / span as f32;
                return Some(before.position.lerp(after.position, t));
            }
        }

        Some(latest.position)
    }
}
