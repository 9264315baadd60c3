use crate::geometry::{clamp_to_arena, ease_out_cubic, Vec2};
use crate::status::{StatusEffectState, StatusKind};
use crate::{PlayerId, MAX_INPUT_DT, PLAYER_SPEED};
use serde::{Deserialize, Serialize};

/// Movement keys held during one input frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Keys {
    pub w: bool,
    pub a: bool,
    pub s: bool,
    pub d: bool,
}

impl Keys {
    pub fn any(&self) -> bool {
        self.w || self.a || self.s || self.d
    }

    /// Unit movement direction; diagonals are not faster than straight lines.
    pub fn direction(&self) -> Vec2 {
        let mut dir = Vec2::ZERO;
        if self.w {
            dir.y -= 1.0;
        }
        if self.s {
            dir.y += 1.0;
        }
        if self.a {
            dir.x -= 1.0;
        }
        if self.d {
            dir.x += 1.0;
        }
        dir.normalize()
    }
}

/// One sequenced input command, as sent by the client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    pub seq: u32,
    pub keys: Keys,
    /// Frame time in seconds.
    pub dt: f32,
}

/// Applies one input to a position.
///
/// Client prediction and the authoritative server both call this, so the same
/// input sequence always produces the same position on both sides.
pub fn integrate_movement(position: Vec2, input: &PlayerInput) -> Vec2 {
    let dt = if input.dt.is_finite() {
        input.dt.clamp(0.0, MAX_INPUT_DT)
    } else {
        0.0
    };

    clamp_to_arena(position + input.keys.direction() * (PLAYER_SPEED * dt))
}

/// A time-boxed, eased displacement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Knockback {
    pub from: Vec2,
    pub to: Vec2,
    pub started_at: u64,
    pub duration_ms: u64,
}

impl Knockback {
    pub fn progress(&self, now: u64) -> f32 {
        if self.duration_ms == 0 {
            return 1.0;
        }
        let elapsed = now.saturating_sub(self.started_at) as f32;
        (elapsed / self.duration_ms as f32).clamp(0.0, 1.0)
    }

    pub fn is_finished(&self, now: u64) -> bool {
        now >= self.started_at.saturating_add(self.duration_ms)
    }

    /// Eased position at `now`, clamped to the arena. Exactly `to` once finished.
    pub fn position_at(&self, now: u64) -> Vec2 {
        if self.is_finished(now) {
            return clamp_to_arena(self.to);
        }
        clamp_to_arena(self.from.lerp(self.to, ease_out_cubic(self.progress(now))))
    }
}

/// A player as it appears in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub name: String,
    pub number: u8,
    pub color: String,
    pub position: Vec2,
    pub hp: f32,
    pub max_hp: f32,
    /// Highest input sequence the server has applied for this player.
    pub last_input_seq: u32,
    pub knockback: Option<Knockback>,
    pub statuses: Vec<StatusEffectState>,
}

impl PlayerState {
    pub fn is_alive(&self) -> bool {
        self.hp > 0.0
    }

    pub fn has_status(&self, kind: StatusKind) -> bool {
        self.statuses.iter().any(|s| s.kind == kind)
    }

    pub fn can_move(&self) -> bool {
        self.knockback.is_none() && !self.statuses.iter().any(|s| s.kind.blocks_movement())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ARENA_WIDTH, PLAYER_RADIUS};
    use assert_approx_eq::assert_approx_eq;

    fn input(seq: u32, keys: Keys, dt: f32) -> PlayerInput {
        PlayerInput { seq, keys, dt }
    }

    #[test]
    fn test_direction_is_normalized() {
        let keys = Keys {
            w: true,
            d: true,
            ..Keys::default()
        };
        assert_approx_eq!(keys.direction().length(), 1.0, 1e-6);
        assert_eq!(Keys::default().direction(), Vec2::ZERO);

        let opposing = Keys {
            a: true,
            d: true,
            ..Keys::default()
        };
        assert_eq!(opposing.direction(), Vec2::ZERO);
    }

    #[test]
    fn test_integrate_movement() {
        let keys = Keys {
            d: true,
            ..Keys::default()
        };
        let next = integrate_movement(Vec2::new(100.0, 100.0), &input(1, keys, 0.05));
        assert_approx_eq!(next.x, 100.0 + PLAYER_SPEED * 0.05, 1e-4);
        assert_eq!(next.y, 100.0);
    }

    #[test]
    fn test_integrate_movement_clamps_dt_and_bounds() {
        let keys = Keys {
            d: true,
            ..Keys::default()
        };
        let capped = integrate_movement(Vec2::new(100.0, 100.0), &input(1, keys, 10.0));
        assert_approx_eq!(capped.x, 100.0 + PLAYER_SPEED * MAX_INPUT_DT, 1e-4);

        let wall = integrate_movement(Vec2::new(ARENA_WIDTH - 16.0, 100.0), &input(2, keys, 0.1));
        assert_eq!(wall.x, ARENA_WIDTH - PLAYER_RADIUS);

        let nan = integrate_movement(Vec2::new(100.0, 100.0), &input(3, keys, f32::NAN));
        assert_eq!(nan, Vec2::new(100.0, 100.0));
    }

    #[test]
    fn test_knockback_arrives_exactly() {
        let knockback = Knockback {
            from: Vec2::new(100.0, 100.0),
            to: Vec2::new(333.3, 217.7),
            started_at: 1_000,
            duration_ms: 700,
        };
        assert_eq!(knockback.position_at(1_000), Vec2::new(100.0, 100.0));
        assert_eq!(knockback.position_at(1_700), Vec2::new(333.3, 217.7));
        assert_eq!(knockback.position_at(5_000), Vec2::new(333.3, 217.7));
    }

    #[test]
    fn test_knockback_eases_out() {
        let knockback = Knockback {
            from: Vec2::new(100.0, 100.0),
            to: Vec2::new(200.0, 100.0),
            started_at: 0,
            duration_ms: 1_000,
        };
        // Half the time covers well over half the distance.
        let halfway = knockback.position_at(500);
        assert_approx_eq!(halfway.x, 187.5, 1e-3);

        let mut previous = 100.0;
        for t in (0..=1_000).step_by(50) {
            let x = knockback.position_at(t).x;
            assert!(x >= previous);
            previous = x;
        }
    }

    #[test]
    fn test_zero_duration_knockback_is_instant() {
        let knockback = Knockback {
            from: Vec2::new(100.0, 100.0),
            to: Vec2::new(150.0, 100.0),
            started_at: 10,
            duration_ms: 0,
        };
        assert!(knockback.is_finished(10));
        assert_eq!(knockback.position_at(10), Vec2::new(150.0, 100.0));
    }
}
