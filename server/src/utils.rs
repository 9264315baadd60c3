use shared::geometry::clamp_to_arena;
use shared::{Vec2, ARENA_CENTER, MAX_PLAYERS};
use std::f32::consts::TAU;
use tokio::time::Instant;

/// Distance from the arena center to the spawn ring.
pub const SPAWN_RING_RADIUS: f32 = 150.0;

/// Monotonic server clock in milliseconds since startup.
///
/// Built on tokio's `Instant`, so paused-time tests advance it along with
/// timers and sleeps.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn point for a player slot, evenly spaced on a ring around the center.
pub fn spawn_position(number: u8) -> Vec2 {
    let slot = number.saturating_sub(1) as f32;
    let angle = slot / MAX_PLAYERS as f32 * TAU;
    clamp_to_arena(ARENA_CENTER + Vec2::from_angle(angle) * SPAWN_RING_RADIUS)
}

/// Longest display name kept, in characters.
pub const MAX_NAME_LEN: usize = 16;

/// Trims and truncates a requested display name, falling back to the slot
/// number when nothing printable is left.
pub fn sanitize_name(raw: &str, number: u8) -> String {
    let name: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_LEN)
        .collect();

    if name.is_empty() {
        format!("Player {}", number)
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::time::Duration;

    #[test]
    fn test_spawn_positions_are_distinct() {
        let first = spawn_position(1);
        assert_approx_eq!(first.x, ARENA_CENTER.x + SPAWN_RING_RADIUS, 1e-3);
        assert_approx_eq!(first.y, ARENA_CENTER.y, 1e-3);

        for a in 1..=MAX_PLAYERS as u8 {
            let pos = spawn_position(a);
            assert_approx_eq!(pos.distance(ARENA_CENTER), SPAWN_RING_RADIUS, 1e-2);
            for b in (a + 1)..=MAX_PLAYERS as u8 {
                assert!(pos.distance(spawn_position(b)) > 1.0);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_follows_tokio_time() {
        let clock = Clock::new();
        assert_eq!(clock.now_ms(), 0);
        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert_eq!(clock.now_ms(), 1_500);
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  Alice  ", 1), "Alice");
        assert_eq!(sanitize_name("", 3), "Player 3");
        assert_eq!(sanitize_name("\n\t", 4), "Player 4");
        assert_eq!(
            sanitize_name("a-very-long-name-indeed", 1).chars().count(),
            MAX_NAME_LEN
        );
    }
}
