//! Keyboard sampling, input sequencing and debug toggles

use macroquad::prelude::{is_key_down, KeyCode};
use shared::{Keys, PlayerInput, MAX_INPUT_DT};

/// An idle client still sends an empty input this often, in seconds, so the
/// server does not time it out.
pub const KEEPALIVE_INTERVAL: f32 = 1.0;

/// Edge-triggered key presses for this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Toggles {
    pub prediction: bool,
    pub reconciliation: bool,
    pub interpolation: bool,
}

impl Toggles {
    pub fn any(&self) -> bool {
        self.prediction || self.reconciliation || self.interpolation
    }
}

pub struct InputManager {
    next_seq: u32,
    since_last_sent: f32,
    // 1, 2, 3 on the previous frame
    prev_toggle_keys: [bool; 3],
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            next_seq: 1,
            since_last_sent: 0.0,
            prev_toggle_keys: [false; 3],
        }
    }

    /// Reads the keyboard. Returns this frame's toggles and the input to send,
    /// if any.
    pub fn poll(&mut self, frame_time: f32) -> (Toggles, Option<PlayerInput>) {
        let keys = Keys {
            w: is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
            a: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            s: is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
            d: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
        };
        let toggles = self.edges([
            is_key_down(KeyCode::Key1),
            is_key_down(KeyCode::Key2),
            is_key_down(KeyCode::Key3),
        ]);

        (toggles, self.next_input(keys, frame_time))
    }

    /// Sequences a frame of movement. Frames without movement produce nothing
    /// except the periodic keep-alive.
    pub fn next_input(&mut self, keys: Keys, frame_time: f32) -> Option<PlayerInput> {
        let dt = if frame_time.is_finite() {
            frame_time.clamp(0.0, MAX_INPUT_DT)
        } else {
            0.0
        };
        self.since_last_sent += dt;

        if !keys.any() && self.since_last_sent < KEEPALIVE_INTERVAL {
            return None;
        }

        let input = PlayerInput {
            seq: self.next_seq,
            keys,
            dt,
        };
        self.next_seq = self.next_seq.wrapping_add(1);
        self.since_last_sent = 0.0;
        Some(input)
    }

    fn edges(&mut self, pressed: [bool; 3]) -> Toggles {
        let [p, r, i] = pressed;
        let [prev_p, prev_r, prev_i] = self.prev_toggle_keys;
        self.prev_toggle_keys = pressed;

        Toggles {
            prediction: p && !prev_p,
            reconciliation: r && !prev_r,
            interpolation: i && !prev_i,
        }
    }

    /// Starts numbering from 1 again, for a fresh join.
    pub fn reset(&mut self) {
        self.next_seq = 1;
        self.since_last_sent = 0.0;
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moving() -> Keys {
        Keys {
            a: true,
            ..Keys::default()
        }
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let mut input = InputManager::new();
        let first = input.next_input(moving(), 0.016).unwrap();
        let second = input.next_input(moving(), 0.016).unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
    }

    #[test]
    fn test_idle_frames_only_send_keepalives() {
        let mut input = InputManager::new();
        let mut sent = Vec::new();
        // two seconds of idle frames
        for _ in 0..32 {
            if let Some(i) = input.next_input(Keys::default(), 0.0625) {
                sent.push(i);
            }
        }
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|i| !i.keys.any()));
    }

    #[test]
    fn test_frame_time_is_clamped() {
        let mut input = InputManager::new();
        assert_eq!(input.next_input(moving(), 3.0).unwrap().dt, MAX_INPUT_DT);
        assert_eq!(input.next_input(moving(), f32::NAN).unwrap().dt, 0.0);
    }

    #[test]
    fn test_toggles_fire_on_press_only() {
        let mut input = InputManager::new();
        let pressed = input.edges([true, false, false]);
        assert!(pressed.prediction);
        let held = input.edges([true, false, false]);
        assert!(!held.any());
        input.edges([false, false, false]);
        assert!(input.edges([true, true, true]).any());
    }
}
