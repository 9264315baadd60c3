//! Connection bookkeeping for the arena server
//!
//! Tracks who is connected from where, hands out player ids and color slots,
//! and decides when a silent client should be dropped. Game state lives in
//! [`crate::game::Game`]; this module only knows about addresses and liveness.

use log::info;
use shared::{PlayerId, PLAYER_COLORS};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("server is full ({0} players)")]
    ServerFull(usize),
    #[error("no free player color")]
    NoColorSlot,
}

/// A connected client and the player slot it occupies.
#[derive(Debug)]
pub struct Client {
    pub player_id: PlayerId,
    pub addr: SocketAddr,
    /// Last time any packet arrived from this client.
    pub last_seen: Instant,
    /// 1-based slot; also indexes the player color.
    pub number: u8,
}

impl Client {
    pub fn new(player_id: PlayerId, addr: SocketAddr, number: u8) -> Self {
        Self {
            player_id,
            addr,
            last_seen: Instant::now(),
            number,
        }
    }

    pub fn color(&self) -> String {
        color_for(self.number)
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

pub fn color_for(number: u8) -> String {
    let index = (number.max(1) as usize - 1) % PLAYER_COLORS.len();
    PLAYER_COLORS[index].to_string()
}

/// Connected clients, capped at the smaller of `max_clients` and the number
/// of color slots.
pub struct ClientManager {
    clients: HashMap<PlayerId, Client>,
    next_player_id: PlayerId,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_player_id: 1,
            max_clients: max_clients.min(PLAYER_COLORS.len()),
        }
    }

    /// Registers a new client and assigns it the lowest free slot.
    pub fn add_client(&mut self, addr: SocketAddr) -> Result<(PlayerId, u8), JoinError> {
        if self.clients.len() >= self.max_clients {
            return Err(JoinError::ServerFull(self.max_clients));
        }

        let number = (1..=self.max_clients as u8)
            .find(|n| !self.clients.values().any(|c| c.number == *n))
            .ok_or(JoinError::NoColorSlot)?;

        let player_id = self.next_player_id;
        self.next_player_id += 1;

        info!(
            "Client {} connected from {} as player #{}",
            player_id, addr, number
        );
        self.clients
            .insert(player_id, Client::new(player_id, addr, number));

        Ok((player_id, number))
    }

    /// Removes a client, freeing its slot. Returns the removed client.
    pub fn remove_client(&mut self, player_id: PlayerId) -> Option<Client> {
        let removed = self.clients.remove(&player_id);
        if let Some(client) = &removed {
            info!("Client {} disconnected from {}", player_id, client.addr);
        }
        removed
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<PlayerId> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| client.player_id)
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&Client> {
        self.clients.get(&player_id)
    }

    /// Marks the client as alive.
    pub fn touch(&mut self, player_id: PlayerId) {
        if let Some(client) = self.clients.get_mut(&player_id) {
            client.last_seen = Instant::now();
        }
    }

    /// Drops every client silent for longer than `timeout` and returns their ids.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<PlayerId> {
        let timed_out: Vec<PlayerId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.player_id)
            .collect();

        for player_id in &timed_out {
            info!("Client {} timed out", player_id);
            self.clients.remove(player_id);
        }

        timed_out
    }

    pub fn get_client_addrs(&self) -> Vec<(PlayerId, SocketAddr)> {
        self.clients
            .values()
            .map(|client| (client.player_id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
