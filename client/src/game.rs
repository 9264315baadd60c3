//! Client-side view of the arena: local prediction, server reconciliation and
//! interpolated remote players.

use crate::interpolation::InterpolationBuffer;
use log::debug;
use shared::{integrate_movement, GameState, PlayerId, PlayerInput, PlayerState, Vec2};
use std::collections::VecDeque;

/// Largest gap, in pixels, between the server position and our recorded
/// prediction for the same input that is still accepted without a replay.
pub const RECONCILE_THRESHOLD: f32 = 1.0;

/// An input sent to the server that it has not acknowledged yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingInput {
    pub input: PlayerInput,
    /// Local position right after applying `input`.
    pub predicted: Vec2,
    /// Local clock when the input was sent, for round-trip estimates.
    pub sent_at: u64,
}

/// What a snapshot did to the local prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconcileOutcome {
    /// We have no player id yet, or the snapshot does not contain us.
    NotJoined,
    /// First snapshot carrying our player; prediction starts from it.
    Initialized,
    /// Server agreed with the prediction; nothing replayed.
    Trusted,
    /// Server disagreed; remaining inputs were replayed from its position.
    Replayed { replayed: usize, error: f32 },
    /// Server is moving us (knockback) or we are dead; its position wins.
    Snapped,
    /// Reconciliation is switched off; only the acknowledged inputs were dropped.
    Skipped,
    /// Older than a snapshot already applied; ignored.
    Stale,
}

#[derive(Debug, Default)]
pub struct ClientGameState {
    local_id: Option<PlayerId>,
    predicted_position: Option<Vec2>,
    pending_inputs: VecDeque<PendingInput>,
    last_acked: u32,
    /// Position we expected the server to report for `last_acked`.
    confirmed: Option<Vec2>,
    latest: Option<GameState>,
    interpolation: InterpolationBuffer,
    last_rtt_ms: Option<u64>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the state to our player id and drops everything predicted
    /// for a previous identity.
    pub fn set_local_player(&mut self, id: PlayerId) {
        self.local_id = Some(id);
        self.predicted_position = None;
        self.pending_inputs.clear();
        self.last_acked = 0;
        self.confirmed = None;
    }

    pub fn local_id(&self) -> Option<PlayerId> {
        self.local_id
    }

    pub fn predicted_position(&self) -> Option<Vec2> {
        self.predicted_position
    }

    pub fn pending_inputs(&self) -> impl Iterator<Item = &PendingInput> {
        self.pending_inputs.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending_inputs.len()
    }

    pub fn last_acked(&self) -> u32 {
        self.last_acked
    }

    pub fn latest_state(&self) -> Option<&GameState> {
        self.latest.as_ref()
    }

    pub fn local_player(&self) -> Option<&PlayerState> {
        let id = self.local_id?;
        self.latest.as_ref()?.player(id)
    }

    pub fn last_rtt_ms(&self) -> Option<u64> {
        self.last_rtt_ms
    }

    /// Whether the server would currently move us for an input.
    fn local_can_move(&self) -> bool {
        self.local_player()
            .map_or(true, |p| p.is_alive() && p.can_move())
    }

    /// Applies `input` locally and queues it until the server acknowledges it.
    ///
    /// Inputs are queued even while rooted or knocked back: the server still
    /// acknowledges them, it just does not move us.
    pub fn apply_prediction(&mut self, input: PlayerInput, sent_at: u64) -> Option<Vec2> {
        let current = self.predicted_position?;
        let predicted = if self.local_can_move() {
            integrate_movement(current, &input)
        } else {
            current
        };

        self.predicted_position = Some(predicted);
        self.pending_inputs.push_back(PendingInput {
            input,
            predicted,
            sent_at,
        });
        Some(predicted)
    }

    /// Queues an input without moving, for when prediction is switched off.
    pub fn record_unpredicted(&mut self, input: PlayerInput, sent_at: u64) {
        let predicted = self.predicted_position.unwrap_or(Vec2::ZERO);
        self.pending_inputs.push_back(PendingInput {
            input,
            predicted,
            sent_at,
        });
    }

    /// Folds an authoritative snapshot into local state.
    pub fn apply_server_state(
        &mut self,
        state: GameState,
        received_at: u64,
        reconcile: bool,
    ) -> ReconcileOutcome {
        if self.is_stale(&state) {
            debug!("Dropping out-of-order snapshot from t={}", state.timestamp);
            return ReconcileOutcome::Stale;
        }

        let ids: Vec<PlayerId> = state.players.iter().map(|p| p.id).collect();
        self.interpolation.retain_players(&ids);
        for player in &state.players {
            if Some(player.id) != self.local_id {
                self.interpolation
                    .push(player.id, received_at, player.position);
            }
        }

        let me = self
            .local_id
            .and_then(|id| state.player(id))
            .cloned();
        self.latest = Some(state);

        match me {
            Some(me) => self.reconcile(&me, received_at, reconcile),
            None => ReconcileOutcome::NotJoined,
        }
    }

    /// UDP may reorder datagrams: a snapshot is stale if it is older than the
    /// one we hold, or acknowledges less of our input than we already saw.
    fn is_stale(&self, state: &GameState) -> bool {
        if self
            .latest
            .as_ref()
            .is_some_and(|latest| state.timestamp < latest.timestamp)
        {
            return true;
        }
        self.local_id
            .and_then(|id| state.player(id))
            .is_some_and(|me| me.last_input_seq < self.last_acked)
    }

    fn reconcile(&mut self, me: &PlayerState, received_at: u64, enabled: bool) -> ReconcileOutcome {
        let ack = me.last_input_seq;
        let acked = self
            .pending_inputs
            .iter()
            .find(|p| p.input.seq == ack)
            .copied();
        if let Some(acked) = acked {
            self.last_rtt_ms = Some(received_at.saturating_sub(acked.sent_at));
        }

        let expected = match acked {
            Some(acked) => Some(acked.predicted),
            None if ack == self.last_acked => self.confirmed,
            None => None,
        };

        self.pending_inputs.retain(|p| p.input.seq > ack);
        self.last_acked = ack;

        if self.predicted_position.is_none() {
            self.replay_from(me.position);
            return ReconcileOutcome::Initialized;
        }

        if me.knockback.is_some() || !me.is_alive() {
            self.predicted_position = Some(me.position);
            self.confirmed = Some(me.position);
            for pending in self.pending_inputs.iter_mut() {
                pending.predicted = me.position;
            }
            return ReconcileOutcome::Snapped;
        }

        if !enabled {
            self.confirmed = expected;
            return ReconcileOutcome::Skipped;
        }

        let error = expected.map_or(f32::INFINITY, |e| e.distance(me.position));
        if error <= RECONCILE_THRESHOLD {
            self.confirmed = expected;
            return ReconcileOutcome::Trusted;
        }

        debug!(
            "Prediction off by {:.2}px at seq {}, replaying {} inputs",
            error,
            ack,
            self.pending_inputs.len()
        );
        let replayed = self.replay_from(me.position);
        ReconcileOutcome::Replayed { replayed, error }
    }

    /// Re-applies every pending input on top of `authoritative`, rewriting
    /// their recorded predictions.
    fn replay_from(&mut self, authoritative: Vec2) -> usize {
        let can_move = self.local_can_move();
        let mut position = authoritative;
        for pending in self.pending_inputs.iter_mut() {
            if can_move {
                position = integrate_movement(position, &pending.input);
            }
            pending.predicted = position;
        }
        self.confirmed = Some(authoritative);
        self.predicted_position = Some(position);
        self.pending_inputs.len()
    }

    /// Players as they should be drawn at local time `now`.
    ///
    /// The local player uses the prediction when enabled; remote players use
    /// the interpolation buffer when enabled and the latest snapshot otherwise.
    pub fn render_players(&self, now: u64, predict: bool, interpolate: bool) -> Vec<PlayerState> {
        let Some(state) = &self.latest else {
            return Vec::new();
        };

        state
            .players
            .iter()
            .map(|player| {
                let mut player = player.clone();
                if Some(player.id) == self.local_id {
                    if predict {
                        if let Some(predicted) = self.predicted_position {
                            player.position = predicted;
                        }
                    }
                } else if interpolate {
                    if let Some(position) = self.interpolation.sample(player.id, now) {
                        player.position = position;
                    }
                }
                player
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{Keys, Knockback, StatusEffectState, StatusKind, MAX_HP, PLAYER_SPEED};

    fn player(id: PlayerId, position: Vec2, ack: u32) -> PlayerState {
        PlayerState {
            id,
            name: format!("p{}", id),
            number: id as u8,
            color: "#ffffff".to_string(),
            position,
            hp: MAX_HP,
            max_hp: MAX_HP,
            last_input_seq: ack,
            knockback: None,
            statuses: vec![],
        }
    }

    fn snapshot(players: Vec<PlayerState>) -> GameState {
        GameState {
            timestamp: 0,
            players,
            mechanics: vec![],
            statuses: vec![],
        }
    }

    fn right(seq: u32) -> PlayerInput {
        PlayerInput {
            seq,
            keys: Keys {
                d: true,
                ..Keys::default()
            },
            dt: 0.1,
        }
    }

    fn joined_at(position: Vec2) -> ClientGameState {
        let mut game = ClientGameState::new();
        game.set_local_player(1);
        let outcome = game.apply_server_state(snapshot(vec![player(1, position, 0)]), 0, true);
        assert_eq!(outcome, ReconcileOutcome::Initialized);
        game
    }

    #[test]
    fn test_prediction_requires_a_starting_snapshot() {
        let mut game = ClientGameState::new();
        game.set_local_player(1);
        assert_eq!(game.apply_prediction(right(1), 0), None);
        assert_eq!(game.pending_len(), 0);
    }

    #[test]
    fn test_prediction_moves_immediately() {
        let mut game = joined_at(Vec2::new(100.0, 100.0));
        let predicted = game.apply_prediction(right(1), 0).unwrap();
        assert_approx_eq!(predicted.x, 100.0 + PLAYER_SPEED * 0.1, 1e-4);
        assert_eq!(game.pending_len(), 1);
    }

    #[test]
    fn test_ack_prunes_pending_inputs() {
        let mut game = joined_at(Vec2::new(100.0, 100.0));
        for seq in 1..=5 {
            game.apply_prediction(right(seq), 0);
        }
        let after_three = game.pending_inputs().nth(2).unwrap().predicted;

        let outcome =
            game.apply_server_state(snapshot(vec![player(1, after_three, 3)]), 50, true);
        assert_eq!(outcome, ReconcileOutcome::Trusted);
        assert_eq!(game.last_acked(), 3);
        let remaining: Vec<u32> = game.pending_inputs().map(|p| p.input.seq).collect();
        assert_eq!(remaining, vec![4, 5]);
        assert_eq!(game.last_rtt_ms(), Some(50));
    }

    #[test]
    fn test_divergence_below_threshold_is_trusted() {
        let mut game = joined_at(Vec2::new(100.0, 100.0));
        game.apply_prediction(right(1), 0);
        let predicted = game.predicted_position().unwrap();
        game.apply_prediction(right(2), 0);
        let before = game.predicted_position();

        let nudged = predicted + Vec2::new(0.5, 0.0);
        let outcome = game.apply_server_state(snapshot(vec![player(1, nudged, 1)]), 0, true);
        assert_eq!(outcome, ReconcileOutcome::Trusted);
        assert_eq!(game.predicted_position(), before);
    }

    #[test]
    fn test_divergence_above_threshold_replays_from_server() {
        let mut game = joined_at(Vec2::new(100.0, 100.0));
        for seq in 1..=3 {
            game.apply_prediction(right(seq), 0);
        }

        // Server put us 50px lower after the first input.
        let server = Vec2::new(120.0, 150.0);
        let outcome = game.apply_server_state(snapshot(vec![player(1, server, 1)]), 0, true);
        match outcome {
            ReconcileOutcome::Replayed { replayed, error } => {
                assert_eq!(replayed, 2);
                assert_approx_eq!(error, 50.0, 1e-3);
            }
            other => panic!("expected replay, got {:?}", other),
        }

        let predicted = game.predicted_position().unwrap();
        assert_approx_eq!(predicted.x, 120.0 + 2.0 * PLAYER_SPEED * 0.1, 1e-3);
        assert_approx_eq!(predicted.y, 150.0, 1e-4);
    }

    #[test]
    fn test_repeated_ack_compares_against_confirmed_position() {
        let mut game = joined_at(Vec2::new(100.0, 100.0));
        game.apply_prediction(right(1), 0);
        let predicted = game.predicted_position().unwrap();

        let first = game.apply_server_state(snapshot(vec![player(1, predicted, 1)]), 0, true);
        assert_eq!(first, ReconcileOutcome::Trusted);
        let second = game.apply_server_state(snapshot(vec![player(1, predicted, 1)]), 50, true);
        assert_eq!(second, ReconcileOutcome::Trusted);
    }

    #[test]
    fn test_knockback_snaps_to_server() {
        let mut game = joined_at(Vec2::new(100.0, 100.0));
        game.apply_prediction(right(1), 0);

        let mut me = player(1, Vec2::new(300.0, 300.0), 1);
        me.knockback = Some(Knockback {
            from: Vec2::new(100.0, 100.0),
            to: Vec2::new(400.0, 400.0),
            started_at: 0,
            duration_ms: 500,
        });
        let outcome = game.apply_server_state(snapshot(vec![me]), 0, true);
        assert_eq!(outcome, ReconcileOutcome::Snapped);
        assert_eq!(game.predicted_position(), Some(Vec2::new(300.0, 300.0)));

        // Knocked back players do not move locally either.
        let still = game.apply_prediction(right(2), 0).unwrap();
        assert_eq!(still, Vec2::new(300.0, 300.0));
    }

    #[test]
    fn test_rooted_prediction_stays_put() {
        let mut game = ClientGameState::new();
        game.set_local_player(1);
        let mut me = player(1, Vec2::new(200.0, 200.0), 0);
        me.statuses.push(StatusEffectState {
            id: 1,
            kind: StatusKind::Rooted,
            player_id: 1,
            started_at: 0,
            duration_ms: 1_000,
            periodic: None,
            on_expire_damage: None,
        });
        game.apply_server_state(snapshot(vec![me]), 0, true);

        assert_eq!(
            game.apply_prediction(right(1), 0),
            Some(Vec2::new(200.0, 200.0))
        );
        assert_eq!(game.pending_len(), 1);
    }

    #[test]
    fn test_disabled_reconciliation_keeps_prediction() {
        let mut game = joined_at(Vec2::new(100.0, 100.0));
        game.apply_prediction(right(1), 0);
        let before = game.predicted_position();

        let outcome = game.apply_server_state(
            snapshot(vec![player(1, Vec2::new(500.0, 500.0), 1)]),
            0,
            false,
        );
        assert_eq!(outcome, ReconcileOutcome::Skipped);
        assert_eq!(game.pending_len(), 0);
        assert_eq!(game.predicted_position(), before);
    }

    #[test]
    fn test_render_players_mixes_prediction_and_interpolation() {
        let mut game = joined_at(Vec2::new(100.0, 100.0));
        game.apply_server_state(
            snapshot(vec![
                player(1, Vec2::new(100.0, 100.0), 0),
                player(2, Vec2::new(300.0, 300.0), 0),
            ]),
            1_000,
            true,
        );
        game.apply_server_state(
            snapshot(vec![
                player(1, Vec2::new(100.0, 100.0), 0),
                player(2, Vec2::new(400.0, 300.0), 0),
            ]),
            1_100,
            true,
        );
        game.apply_prediction(right(1), 1_100);

        let drawn = game.render_players(1_150, true, true);
        let me = drawn.iter().find(|p| p.id == 1).unwrap();
        let other = drawn.iter().find(|p| p.id == 2).unwrap();
        assert_approx_eq!(me.position.x, 100.0 + PLAYER_SPEED * 0.1, 1e-4);
        assert_approx_eq!(other.position.x, 350.0, 1e-3);

        let raw = game.render_players(1_150, false, false);
        let me = raw.iter().find(|p| p.id == 1).unwrap();
        let other = raw.iter().find(|p| p.id == 2).unwrap();
        assert_eq!(me.position, Vec2::new(100.0, 100.0));
        assert_eq!(other.position, Vec2::new(400.0, 300.0));
    }

    #[test]
    fn test_out_of_order_snapshot_is_ignored() {
        let mut game = joined_at(Vec2::new(100.0, 100.0));
        for seq in 1..=6 {
            game.apply_prediction(right(seq), 0);
        }
        let after_three = game.pending_inputs().nth(2).unwrap().predicted;
        let after_five = game.pending_inputs().nth(4).unwrap().predicted;

        let mut fresh = snapshot(vec![
            player(1, after_five, 5),
            player(2, Vec2::new(500.0, 500.0), 0),
        ]);
        fresh.timestamp = 200;
        assert_eq!(
            game.apply_server_state(fresh, 1_000, true),
            ReconcileOutcome::Trusted
        );
        let before = game.predicted_position();

        let mut late = snapshot(vec![
            player(1, after_three, 3),
            player(2, Vec2::new(300.0, 300.0), 0),
        ]);
        late.timestamp = 150;
        assert_eq!(
            game.apply_server_state(late, 1_050, true),
            ReconcileOutcome::Stale
        );
        assert_eq!(game.predicted_position(), before);
        assert_eq!(game.last_acked(), 5);
        assert_eq!(game.pending_len(), 1);
        let drawn = game.render_players(2_000, true, true);
        let other = drawn.iter().find(|p| p.id == 2).unwrap();
        assert_eq!(other.position, Vec2::new(500.0, 500.0));
    }

    #[test]
    fn test_regressed_ack_is_ignored() {
        let mut game = joined_at(Vec2::new(100.0, 100.0));
        for seq in 1..=6 {
            game.apply_prediction(right(seq), 0);
        }
        let after_five = game.pending_inputs().nth(4).unwrap().predicted;
        game.apply_server_state(snapshot(vec![player(1, after_five, 5)]), 0, true);
        let before = game.predicted_position();

        // Same timestamp, older ack.
        let outcome =
            game.apply_server_state(snapshot(vec![player(1, Vec2::new(140.0, 100.0), 3)]), 0, true);
        assert_eq!(outcome, ReconcileOutcome::Stale);
        assert_eq!(game.predicted_position(), before);
        assert_eq!(game.last_acked(), 5);
    }

    #[test]
    fn test_unknown_player_is_not_joined() {
        let mut game = ClientGameState::new();
        let outcome =
            game.apply_server_state(snapshot(vec![player(4, Vec2::ZERO, 0)]), 0, true);
        assert_eq!(outcome, ReconcileOutcome::NotJoined);
        assert_eq!(game.render_players(0, true, true).len(), 1);
    }
}
