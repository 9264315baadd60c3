use crate::mechanic::{Mechanic, MechanicId};
use crate::player::{PlayerInput, PlayerState};
use crate::status::StatusEffectState;
use crate::PlayerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Join {
        name: String,
    },
    ChangeName {
        name: String,
    },
    Input(PlayerInput),
    Disconnect,

    JoinResponse {
        success: bool,
        player_id: Option<PlayerId>,
        player_number: Option<u8>,
        error: Option<String>,
    },
    State(GameState),
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

/// Point-in-time view of the whole simulation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GameState {
    /// Server clock in milliseconds.
    pub timestamp: u64,
    pub players: Vec<PlayerState>,
    pub mechanics: Vec<Mechanic>,
    pub statuses: Vec<StatusEffectState>,
}

impl GameState {
    pub fn player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn living_players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.iter().filter(|p| p.is_alive())
    }

    pub fn mechanic(&self, id: MechanicId) -> Option<&Mechanic> {
        self.mechanics.iter().find(|m| m.id == id)
    }
}
