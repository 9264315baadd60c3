use crate::status::StatusEffectManager;
use log::debug;
use shared::geometry::clamp_to_arena;
use shared::{integrate_movement, Knockback, PlayerId, PlayerInput, PlayerState, Vec2, MAX_HP};
use std::collections::VecDeque;

/// Authoritative player entity. Only the game mutates it, and only inside a tick
/// or a resolution triggered by one.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub number: u8,
    pub color: String,
    pub position: Vec2,
    pub hp: f32,
    pub max_hp: f32,
    /// Highest input sequence applied so far.
    pub last_input_seq: u32,
    pub knockback: Option<Knockback>,
    pending_inputs: VecDeque<PlayerInput>,
}

impl Player {
    pub fn new(id: PlayerId, name: String, number: u8, color: String, position: Vec2) -> Self {
        Self {
            id,
            name,
            number,
            color,
            position: clamp_to_arena(position),
            hp: MAX_HP,
            max_hp: MAX_HP,
            last_input_seq: 0,
            knockback: None,
            pending_inputs: VecDeque::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0.0
    }

    /// Queues an input for the next tick. Inputs at or below the acknowledged
    /// sequence are duplicates or stale reorders and are dropped.
    pub fn queue_input(&mut self, input: PlayerInput) -> bool {
        if input.seq <= self.last_input_seq {
            return false;
        }
        self.pending_inputs.push_back(input);
        true
    }

    pub fn pending_input_count(&self) -> usize {
        self.pending_inputs.len()
    }

    /// Applies queued inputs in arrival order. Every input is acknowledged,
    /// but only moves the player when `can_move` is set.
    pub fn drain_inputs(&mut self, can_move: bool) -> usize {
        let mut applied = 0;
        while let Some(input) = self.pending_inputs.pop_front() {
            if input.seq <= self.last_input_seq {
                continue;
            }
            if can_move {
                self.position = integrate_movement(self.position, &input);
            }
            self.last_input_seq = input.seq;
            applied += 1;
        }
        applied
    }

    /// Starts a knockback from the current position, with the endpoint clamped
    /// to the arena up front.
    pub fn start_knockback(&mut self, displacement: Vec2, now: u64, duration_ms: u64) {
        let to = clamp_to_arena(self.position + displacement);
        self.knockback = Some(Knockback {
            from: self.position,
            to,
            started_at: now,
            duration_ms,
        });
    }

    pub fn update_knockback(&mut self, now: u64) {
        if let Some(knockback) = self.knockback {
            self.position = knockback.position_at(now);
            if knockback.is_finished(now) {
                debug!("Player {} knockback finished at {:?}", self.id, self.position);
                self.knockback = None;
            }
        }
    }

    /// Deals damage scaled by the player's active statuses and returns the
    /// amount actually removed from hit points.
    pub fn take_damage(&mut self, amount: f32, statuses: &StatusEffectManager, now: u64) -> f32 {
        let scaled = amount.max(0.0) * statuses.damage_multiplier(self.id, now);
        let before = self.hp;
        self.hp = (self.hp - scaled).clamp(0.0, self.max_hp);
        before - self.hp
    }

    pub fn to_state(&self, statuses: &StatusEffectManager, now: u64) -> PlayerState {
        PlayerState {
            id: self.id,
            name: self.name.clone(),
            number: self.number,
            color: self.color.clone(),
            position: self.position,
            hp: self.hp,
            max_hp: self.max_hp,
            last_input_seq: self.last_input_seq,
            knockback: self.knockback,
            statuses: statuses.effects_for(self.id, now),
        }
    }
}
