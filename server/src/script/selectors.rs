//! Target selectors. Pure functions over a snapshot; only living players are
//! ever selected.

use rand::seq::SliceRandom;
use rand::Rng;
use shared::{GameState, PlayerId, PlayerState, StatusKind, Vec2};

pub fn all_living(state: &GameState) -> Vec<PlayerId> {
    state.living_players().map(|p| p.id).collect()
}

/// Up to `count` distinct living players, uniformly at random.
pub fn random<R: Rng + ?Sized>(state: &GameState, count: usize, rng: &mut R) -> Vec<PlayerId> {
    let mut ids = all_living(state);
    let count = count.min(ids.len());
    let (chosen, _) = ids.partial_shuffle(rng, count);
    chosen.to_vec()
}

pub fn nearest(state: &GameState, point: Vec2, count: usize) -> Vec<PlayerId> {
    let mut ranked = by_distance(state, point);
    ranked.truncate(count);
    ranked
}

pub fn farthest(state: &GameState, point: Vec2, count: usize) -> Vec<PlayerId> {
    let mut ranked = by_distance(state, point);
    ranked.reverse();
    ranked.truncate(count);
    ranked
}

pub fn with_status(state: &GameState, kind: StatusKind) -> Vec<PlayerId> {
    filtered(state, |p| p.has_status(kind))
}

pub fn without_status(state: &GameState, kind: StatusKind) -> Vec<PlayerId> {
    filtered(state, |p| !p.has_status(kind))
}

fn filtered(state: &GameState, keep: impl Fn(&PlayerState) -> bool) -> Vec<PlayerId> {
    state
        .living_players()
        .filter(|p| keep(*p))
        .map(|p| p.id)
        .collect()
}

// Closest first, ties broken by id.
fn by_distance(state: &GameState, point: Vec2) -> Vec<PlayerId> {
    let mut players: Vec<(f32, PlayerId)> = state
        .living_players()
        .map(|p| (p.position.distance(point), p.id))
        .collect();
    players.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    players.into_iter().map(|(_, id)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::{StatusEffectState, MAX_HP};
    use std::collections::HashSet;

    fn player(id: PlayerId, x: f32, hp: f32) -> PlayerState {
        PlayerState {
            id,
            name: format!("P{}", id),
            number: id as u8,
            color: "#fff".to_string(),
            position: Vec2::new(x, 400.0),
            hp,
            max_hp: MAX_HP,
            last_input_seq: 0,
            knockback: None,
            statuses: Vec::new(),
        }
    }

    fn state() -> GameState {
        let mut rooted = player(2, 200.0, MAX_HP);
        rooted.statuses.push(StatusEffectState {
            id: 1,
            kind: StatusKind::Rooted,
            player_id: 2,
            started_at: 0,
            duration_ms: 1_000,
            periodic: None,
            on_expire_damage: None,
        });

        GameState {
            timestamp: 0,
            players: vec![
                player(1, 100.0, MAX_HP),
                rooted,
                player(3, 300.0, MAX_HP),
                player(4, 400.0, 0.0),
                player(5, 500.0, MAX_HP),
            ],
            mechanics: vec![],
            statuses: vec![],
        }
    }

    #[test]
    fn test_all_living_skips_dead() {
        assert_eq!(all_living(&state()), vec![1, 2, 3, 5]);
    }

    #[test]
    fn test_random_picks_distinct_living_players() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let picked = random(&state(), 3, &mut rng);
            let unique: HashSet<_> = picked.iter().collect();
            assert_eq!(picked.len(), 3);
            assert_eq!(unique.len(), 3);
            assert!(!picked.contains(&4));
        }
        assert_eq!(random(&state(), 10, &mut rng).len(), 4);
        assert!(random(&GameState::default(), 2, &mut rng).is_empty());
    }

    #[test]
    fn test_nearest_and_farthest() {
        let s = state();
        assert_eq!(nearest(&s, Vec2::new(0.0, 400.0), 2), vec![1, 2]);
        assert_eq!(farthest(&s, Vec2::new(0.0, 400.0), 2), vec![5, 3]);
        assert_eq!(nearest(&s, Vec2::new(0.0, 400.0), 0), Vec::<PlayerId>::new());
    }

    #[test]
    fn test_status_filters() {
        let s = state();
        assert_eq!(with_status(&s, StatusKind::Rooted), vec![2]);
        assert_eq!(without_status(&s, StatusKind::Rooted), vec![1, 3, 5]);
    }
}
