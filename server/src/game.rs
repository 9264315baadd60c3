use crate::mechanics::{MechanicIdAllocator, MechanicManager, Resolution};
use crate::player::Player;
use crate::status::StatusEffectManager;
use crate::utils::spawn_position;
use log::{debug, info};
use shared::{
    Anchor, EffectSpec, GameState, Mechanic, MechanicId, MechanicKind, Packet, PeriodicDamage,
    PlayerId, PlayerInput, StatusId, StatusKind, Vec2,
};
use std::collections::HashMap;

/// Notifications raised while a tick runs, broadcast to every client.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    TetherResolved {
        mechanic_id: MechanicId,
        players: Vec<PlayerId>,
        distance: f32,
        required_distance: f32,
        failed: bool,
    },
    TowerResolved {
        mechanic_id: MechanicId,
        occupants: Vec<PlayerId>,
        required_players: u32,
        success: bool,
    },
    PlayerDamaged {
        player_id: PlayerId,
        amount: f32,
        hp: f32,
    },
}

impl GameEvent {
    pub fn into_packet(self) -> Packet {
        match self {
            GameEvent::TetherResolved {
                mechanic_id,
                players,
                distance,
                required_distance,
                failed,
            } => Packet::TetherResolved {
                mechanic_id,
                players,
                distance,
                required_distance,
                failed,
            },
            GameEvent::TowerResolved {
                mechanic_id,
                occupants,
                required_players,
                success,
            } => Packet::TowerResolved {
                mechanic_id,
                occupants,
                required_players,
                success,
            },
            GameEvent::PlayerDamaged {
                player_id,
                amount,
                hp,
            } => Packet::PlayerDamaged {
                player_id,
                amount,
                hp,
            },
        }
    }
}

/// Mutable view over players and statuses handed to mechanic resolution.
pub(crate) struct World<'a> {
    pub players: &'a mut HashMap<PlayerId, Player>,
    pub statuses: &'a mut StatusEffectManager,
    pub events: &'a mut Vec<GameEvent>,
}

impl World<'_> {
    pub fn position(&self, id: PlayerId) -> Option<Vec2> {
        self.players.get(&id).map(|p| p.position)
    }

    pub fn anchor_position(&self, anchor: Anchor) -> Option<Vec2> {
        match anchor {
            Anchor::Point(point) => Some(point),
            Anchor::Player(id) => self.position(id),
        }
    }

    /// Living players and their positions, ordered by id.
    pub fn living_positions(&self) -> Vec<(PlayerId, Vec2)> {
        let mut positions: Vec<_> = self
            .players
            .values()
            .filter(|p| p.is_alive())
            .map(|p| (p.id, p.position))
            .collect();
        positions.sort_by_key(|(id, _)| *id);
        positions
    }

    /// Every connected player, dead or alive, ordered by id.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<_> = self.players.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn damage(&mut self, player_id: PlayerId, amount: f32, now: u64) -> Option<f32> {
        damage_player(self.players, self.statuses, self.events, player_id, amount, now)
    }

    pub fn apply_effect(&mut self, player_id: PlayerId, effect: &EffectSpec, now: u64) {
        if !self.players.contains_key(&player_id) {
            return;
        }
        if let Some(amount) = effect.damage {
            self.damage(player_id, amount, now);
        }
        if let Some(status) = effect.status {
            self.statuses
                .apply(player_id, status.kind, status.duration_ms, now);
        }
    }
}

fn damage_player(
    players: &mut HashMap<PlayerId, Player>,
    statuses: &StatusEffectManager,
    events: &mut Vec<GameEvent>,
    player_id: PlayerId,
    amount: f32,
    now: u64,
) -> Option<f32> {
    let player = players.get_mut(&player_id)?;
    let dealt = player.take_damage(amount, statuses, now);
    debug!(
        "Player {} took {:.1} damage, {:.1} hp left",
        player_id, dealt, player.hp
    );
    events.push(GameEvent::PlayerDamaged {
        player_id,
        amount: dealt,
        hp: player.hp,
    });
    Some(dealt)
}

/// Authoritative simulation state. Everything in here is mutated from the
/// server loop only.
#[derive(Debug, Default)]
pub struct Game {
    pub players: HashMap<PlayerId, Player>,
    pub mechanics: MechanicManager,
    pub statuses: StatusEffectManager,
    events: Vec<GameEvent>,
    pub tick: u64,
}

impl Game {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_player(&mut self, id: PlayerId, name: String, number: u8, color: String) {
        let position = spawn_position(number);
        let player = Player::new(id, name, number, color, position);

        info!(
            "Added player {} '{}' at ({:.0}, {:.0})",
            id, player.name, player.position.x, player.position.y
        );
        self.players.insert(id, player);
    }

    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        self.statuses.remove_player(id);
        let removed = self.players.remove(&id);
        if removed.is_some() {
            info!("Removed player {}", id);
        }
        removed
    }

    pub fn rename_player(&mut self, id: PlayerId, name: String) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                info!("Player {} renamed '{}' -> '{}'", id, player.name, name);
                player.name = name;
                true
            }
            None => false,
        }
    }

    pub fn queue_input(&mut self, id: PlayerId, input: PlayerInput) -> bool {
        self.players
            .get_mut(&id)
            .map(|p| p.queue_input(input))
            .unwrap_or(false)
    }

    pub fn mechanic_ids(&self) -> MechanicIdAllocator {
        self.mechanics.ids()
    }

    /// Advances the simulation to `now`.
    ///
    /// Order matters: inputs, then knockback, then mechanic resolution, then
    /// status damage. A mechanic resolving this tick therefore sees the
    /// positions produced by this tick's movement.
    pub fn tick(&mut self, now: u64) -> Vec<Resolution> {
        self.tick += 1;

        for player in self.players.values_mut() {
            let rooted = self
                .statuses
                .effects_for(player.id, now)
                .iter()
                .any(|s| s.kind.blocks_movement());
            let can_move = player.knockback.is_none() && !rooted && player.is_alive();
            player.drain_inputs(can_move);
        }

        for player in self.players.values_mut() {
            player.update_knockback(now);
        }

        let resolutions = {
            let mut world = World {
                players: &mut self.players,
                statuses: &mut self.statuses,
                events: &mut self.events,
            };
            self.mechanics.update(now, &mut world)
        };

        for owed in self.statuses.update(now) {
            if let Some(player) = self.players.get_mut(&owed.player_id) {
                let dealt = player.take_damage(owed.amount, &self.statuses, now);
                debug!(
                    "Player {} took {:.1} from {}",
                    owed.player_id,
                    dealt,
                    owed.kind.label()
                );
                self.events.push(GameEvent::PlayerDamaged {
                    player_id: owed.player_id,
                    amount: dealt,
                    hp: player.hp,
                });
            }
        }

        resolutions
    }

    pub fn spawn(&mut self, kind: MechanicKind, duration_ms: u64, now: u64) -> MechanicId {
        self.mechanics.spawn(kind, now, duration_ms)
    }

    /// Spawns under an id allocated elsewhere (by a script runner).
    pub fn spawn_with_id(
        &mut self,
        id: MechanicId,
        kind: MechanicKind,
        duration_ms: u64,
        now: u64,
    ) -> bool {
        self.mechanics
            .insert(Mechanic::new(id, kind, now, duration_ms))
    }

    pub fn spawn_chariot(&mut self, origin: Vec2, radius: f32, duration_ms: u64, now: u64) -> MechanicId {
        self.spawn(MechanicKind::Chariot { origin, radius }, duration_ms, now)
    }

    pub fn spawn_dynamo(
        &mut self,
        origin: Vec2,
        inner_radius: f32,
        outer_radius: f32,
        duration_ms: u64,
        now: u64,
    ) -> MechanicId {
        self.spawn(
            MechanicKind::Dynamo {
                origin,
                inner_radius,
                outer_radius,
            },
            duration_ms,
            now,
        )
    }

    pub fn spawn_spread(&mut self, target: PlayerId, radius: f32, duration_ms: u64, now: u64) -> MechanicId {
        self.spawn(MechanicKind::Spread { target, radius }, duration_ms, now)
    }

    pub fn spawn_stack(&mut self, target: PlayerId, radius: f32, duration_ms: u64, now: u64) -> MechanicId {
        self.spawn(MechanicKind::Stack { target, radius }, duration_ms, now)
    }

    pub fn spawn_tether(
        &mut self,
        from: Anchor,
        to: Anchor,
        required_distance: f32,
        damage: f32,
        duration_ms: u64,
        now: u64,
    ) -> MechanicId {
        self.spawn(
            MechanicKind::Tether {
                from,
                to,
                required_distance,
                damage,
            },
            duration_ms,
            now,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn spawn_tower(
        &mut self,
        origin: Vec2,
        radius: f32,
        required_players: u32,
        on_success: Option<EffectSpec>,
        on_failure: Option<EffectSpec>,
        duration_ms: u64,
        now: u64,
    ) -> MechanicId {
        self.spawn(
            MechanicKind::Tower {
                origin,
                radius,
                required_players,
                on_success,
                on_failure,
            },
            duration_ms,
            now,
        )
    }

    pub fn spawn_radial_knockback(
        &mut self,
        origin: Vec2,
        radius: f32,
        distance: f32,
        knockback_ms: u64,
        duration_ms: u64,
        now: u64,
    ) -> MechanicId {
        self.spawn(
            MechanicKind::RadialKnockback {
                origin,
                radius,
                distance,
                knockback_ms,
            },
            duration_ms,
            now,
        )
    }

    pub fn spawn_linear_knockback(
        &mut self,
        start: Vec2,
        end: Vec2,
        distance: f32,
        knockback_ms: u64,
        duration_ms: u64,
        now: u64,
    ) -> MechanicId {
        self.spawn(
            MechanicKind::LinearKnockback {
                start,
                end,
                distance,
                knockback_ms,
            },
            duration_ms,
            now,
        )
    }

    pub fn spawn_line_aoe(
        &mut self,
        start: Vec2,
        end: Vec2,
        width: f32,
        duration_ms: u64,
        now: u64,
    ) -> MechanicId {
        self.spawn(MechanicKind::LineAoe { start, end, width }, duration_ms, now)
    }

    pub fn spawn_conal_aoe(
        &mut self,
        origin: Vec2,
        direction: f32,
        angle: f32,
        radius: f32,
        duration_ms: u64,
        now: u64,
    ) -> MechanicId {
        self.spawn(
            MechanicKind::ConalAoe {
                origin,
                direction,
                angle,
                radius,
            },
            duration_ms,
            now,
        )
    }

    /// Damages a player, scaled by their statuses. Unknown players are ignored.
    pub fn damage(&mut self, player_id: PlayerId, amount: f32, now: u64) -> Option<f32> {
        damage_player(
            &mut self.players,
            &self.statuses,
            &mut self.events,
            player_id,
            amount,
            now,
        )
    }

    pub fn apply_status(
        &mut self,
        player_id: PlayerId,
        kind: StatusKind,
        duration_ms: u64,
        now: u64,
    ) -> Option<StatusId> {
        self.apply_status_with(player_id, kind, duration_ms, None, None, now)
    }

    pub fn apply_status_with(
        &mut self,
        player_id: PlayerId,
        kind: StatusKind,
        duration_ms: u64,
        periodic: Option<PeriodicDamage>,
        on_expire_damage: Option<f32>,
        now: u64,
    ) -> Option<StatusId> {
        if !self.players.contains_key(&player_id) {
            debug!("Ignoring {} for unknown player {}", kind.label(), player_id);
            return None;
        }
        Some(
            self.statuses
                .apply_with(player_id, kind, duration_ms, now, periodic, on_expire_damage),
        )
    }

    pub fn snapshot(&self, now: u64) -> GameState {
        let mut players: Vec<_> = self
            .players
            .values()
            .map(|p| p.to_state(&self.statuses, now))
            .collect();
        players.sort_by_key(|p| p.id);

        GameState {
            timestamp: now,
            players,
            mechanics: self.mechanics.all(),
            statuses: self.statuses.all(now),
        }
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Keys, PLAYER_SPEED};

    fn game_with(players: &[(PlayerId, f32, f32)]) -> Game {
        let mut game = Game::new();
        for (id, x, y) in players {
            game.add_player(*id, format!("P{}", id), *id as u8, "#fff".to_string());
            if let Some(p) = game.players.get_mut(id) {
                p.position = Vec2::new(*x, *y);
            }
        }
        game
    }

    fn walk_right(seq: u32) -> PlayerInput {
        PlayerInput {
            seq,
            keys: Keys {
                d: true,
                ..Keys::default()
            },
            dt: 0.1,
        }
    }

    #[test]
    fn test_add_and_remove_player() {
        let mut game = Game::new();
        game.add_player(1, "Alice".to_string(), 1, "#e6194b".to_string());
        game.apply_status(1, StatusKind::Rooted, 1_000, 0);
        assert_eq!(game.players.len(), 1);

        assert!(game.remove_player(1).is_some());
        assert!(game.players.is_empty());
        assert!(game.statuses.is_empty());
        assert!(game.remove_player(1).is_none());
    }

    #[test]
    fn test_rename() {
        let mut game = game_with(&[(1, 100.0, 100.0)]);
        assert!(game.rename_player(1, "Healer".to_string()));
        assert_eq!(game.players[&1].name, "Healer");
        assert!(!game.rename_player(9, "Nobody".to_string()));
    }

    #[test]
    fn test_mechanic_sees_movement_from_same_tick() {
        let mut game = game_with(&[(1, 100.0, 400.0)]);
        game.spawn_chariot(Vec2::new(130.0, 400.0), 10.0, 100, 0);
        game.queue_input(1, walk_right(1));

        let resolutions = game.tick(100);
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].hits, vec![1]);
        assert_eq!(game.players[&1].position.x, 100.0 + PLAYER_SPEED * 0.1);
    }

    #[test]
    fn test_rooted_player_does_not_move_but_acks() {
        let mut game = game_with(&[(1, 100.0, 400.0)]);
        game.apply_status(1, StatusKind::Rooted, 1_000, 0);
        game.queue_input(1, walk_right(1));
        game.tick(16);

        assert_eq!(game.players[&1].position, Vec2::new(100.0, 400.0));
        assert_eq!(game.players[&1].last_input_seq, 1);
    }

    #[test]
    fn test_knockback_overrides_input() {
        let mut game = game_with(&[(1, 400.0, 400.0)]);
        game.spawn_radial_knockback(Vec2::new(350.0, 400.0), 100.0, 100.0, 500, 0, 0);
        game.tick(0);
        assert!(game.players[&1].knockback.is_some());

        game.queue_input(1, walk_right(1));
        game.tick(500);
        let player = &game.players[&1];
        assert!(player.knockback.is_none());
        assert_eq!(player.position, Vec2::new(500.0, 400.0));
        assert_eq!(player.last_input_seq, 1);
    }

    #[test]
    fn test_vulnerability_scales_damage() {
        let mut game = game_with(&[(1, 400.0, 400.0)]);
        game.apply_status(1, StatusKind::Vulnerability, 1_000, 0);
        assert_eq!(game.damage(1, 5.0, 10), Some(50.0));
        assert_eq!(game.players[&1].hp, 50.0);
        assert_eq!(game.damage(42, 5.0, 10), None);

        let events = game.drain_events();
        assert_eq!(
            events,
            vec![GameEvent::PlayerDamaged {
                player_id: 1,
                amount: 50.0,
                hp: 50.0,
            }]
        );
        assert!(game.drain_events().is_empty());
    }

    #[test]
    fn test_status_damage_applies_on_tick() {
        let mut game = game_with(&[(1, 400.0, 400.0)]);
        game.apply_status_with(1, StatusKind::Doom, 1_000, None, Some(1_000.0), 0);
        game.tick(999);
        assert!(game.players[&1].is_alive());

        game.tick(1_000);
        assert!(!game.players[&1].is_alive());
        assert!(game.statuses.is_empty());
    }

    #[test]
    fn test_status_on_unknown_player_is_ignored() {
        let mut game = Game::new();
        assert!(game.apply_status(5, StatusKind::Bleed, 1_000, 0).is_none());
        assert!(game.statuses.is_empty());
    }

    #[test]
    fn test_snapshot_is_ordered() {
        let mut game = game_with(&[(3, 100.0, 100.0), (1, 200.0, 200.0), (2, 300.0, 300.0)]);
        game.spawn_stack(1, 80.0, 5_000, 0);
        let snapshot = game.snapshot(10);

        let ids: Vec<_> = snapshot.players.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(snapshot.mechanics.len(), 1);
        assert_eq!(snapshot.timestamp, 10);
    }

    #[test]
    fn test_tether_damages_both_ends_when_too_short() {
        let mut game = game_with(&[(1, 400.0, 400.0), (2, 450.0, 400.0), (3, 100.0, 100.0)]);
        game.spawn_tether(Anchor::Player(1), Anchor::Player(2), 100.0, 25.0, 500, 0);

        let resolutions = game.tick(500);
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].hits, vec![1, 2]);
        assert_eq!(game.players[&1].hp, 75.0);
        assert_eq!(game.players[&2].hp, 75.0);
        assert_eq!(game.players[&3].hp, 100.0);
        assert!(game.drain_events().iter().any(|e| matches!(
            e,
            GameEvent::TetherResolved { failed: true, .. }
        )));
        assert!(game.mechanics.is_empty());
    }

    #[test]
    fn test_spread_follows_its_target() {
        let mut game = game_with(&[(1, 100.0, 400.0), (2, 400.0, 400.0)]);
        game.spawn_spread(1, 60.0, 100, 0);
        // Target walks into player 2 before the spread goes off.
        if let Some(p) = game.players.get_mut(&1) {
            p.position = Vec2::new(370.0, 400.0);
        }

        let resolutions = game.tick(100);
        assert_eq!(resolutions[0].hits, vec![1, 2]);
    }

    #[test]
    fn test_conal_aoe_hits_only_inside_the_cone() {
        let mut game = game_with(&[(1, 500.0, 400.0), (2, 300.0, 400.0), (3, 400.0, 520.0)]);
        game.spawn_conal_aoe(
            Vec2::new(400.0, 400.0),
            0.0,
            std::f32::consts::FRAC_PI_2,
            200.0,
            100,
            0,
        );

        let resolutions = game.tick(100);
        assert_eq!(resolutions[0].hits, vec![1]);
    }

    #[test]
    fn test_linear_knockback_moves_players_over_ticks() {
        let mut game = game_with(&[(1, 450.0, 400.0), (2, 350.0, 400.0)]);
        game.spawn_linear_knockback(
            Vec2::new(400.0, 0.0),
            Vec2::new(400.0, 800.0),
            100.0,
            200,
            50,
            0,
        );

        game.tick(50);
        assert!(game.players[&1].knockback.is_some());
        assert!(game.players[&2].knockback.is_none());

        game.tick(250);
        assert_eq!(game.players[&1].position, Vec2::new(550.0, 400.0));
        assert_eq!(game.players[&2].position, Vec2::new(350.0, 400.0));
    }

    #[test]
    fn test_events_convert_to_packets() {
        let packet = GameEvent::TowerResolved {
            mechanic_id: 4,
            occupants: vec![1],
            required_players: 2,
            success: false,
        }
        .into_packet();
        assert!(matches!(
            packet,
            Packet::TowerResolved {
                mechanic_id: 4,
                success: false,
                ..
            }
        ));
    }
}
