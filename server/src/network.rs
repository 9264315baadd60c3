//! Server network layer handling UDP communications and game loop coordination

use crate::client_manager::{color_for, ClientManager};
use crate::config::ServerConfig;
use crate::encounters;
use crate::simulation::Simulation;
use crate::utils::sanitize_name;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, PlayerId};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { player_id: PlayerId },
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<PlayerId>,
    },
}

/// Main server coordinating networking, script commands and the simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    sim: Simulation,
    config: ServerConfig,
    encounter_started: bool,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(&config.bind_addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        if let Some(name) = &config.encounter {
            if !encounters::ENCOUNTERS.contains(&name.as_str()) {
                return Err(format!(
                    "unknown encounter '{}', expected one of {:?}",
                    name,
                    encounters::ENCOUNTERS
                )
                .into());
            }
        }

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_players))),
            sim: Simulation::new(config.tick_duration()),
            config,
            encounter_started: false,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 4096];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[..len]) {
                        Ok(packet) => {
                            if server_tx
                                .send(ServerMessage::PacketReceived { packet, addr })
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping malformed packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        send_packet_to(&socket, &packet, addr).await;
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = clients.read().await.get_client_addrs();
                        let data = match serialize(&packet) {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to encode broadcast: {}", e);
                                continue;
                            }
                        };

                        for (player_id, addr) in client_addrs {
                            if Some(player_id) == exclude {
                                continue;
                            }
                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send to player {}: {}", player_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let timeout = self.config.client_timeout;

        tokio::spawn(async move {
            let mut sweep = interval(Duration::from_secs(1));

            loop {
                sweep.tick().await;

                let timed_out = clients.write().await.check_timeouts(timeout);
                for player_id in timed_out {
                    if server_tx
                        .send(ServerMessage::ClientTimeout { player_id })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<PlayerId>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Processes incoming packets from clients
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let known = self.clients.read().await.find_client_by_addr(addr);
        if let Some(player_id) = known {
            self.clients.write().await.touch(player_id);
        }

        match (packet, known) {
            (Packet::Join { name }, existing) => {
                if let Some(existing_id) = existing {
                    info!("Replacing player {} from {}", existing_id, addr);
                    self.clients.write().await.remove_client(existing_id);
                    self.sim.game.remove_player(existing_id);
                }

                let joined = self.clients.write().await.add_client(addr);
                let response = match joined {
                    Ok((player_id, number)) => {
                        let name = sanitize_name(&name, number);
                        self.sim
                            .game
                            .add_player(player_id, name, number, color_for(number));
                        self.maybe_start_encounter();
                        Packet::JoinResponse {
                            success: true,
                            player_id: Some(player_id),
                            player_number: Some(number),
                            error: None,
                        }
                    }
                    Err(e) => {
                        warn!("Rejected join from {}: {}", addr, e);
                        Packet::JoinResponse {
                            success: false,
                            player_id: None,
                            player_number: None,
                            error: Some(e.to_string()),
                        }
                    }
                };
                self.send_packet(response, addr);
            }

            (Packet::ChangeName { name }, Some(player_id)) => {
                let number = self
                    .sim
                    .game
                    .players
                    .get(&player_id)
                    .map(|p| p.number)
                    .unwrap_or_default();
                self.sim
                    .game
                    .rename_player(player_id, sanitize_name(&name, number));
            }

            (Packet::Input(input), Some(player_id)) => {
                if !self.sim.game.queue_input(player_id, input) {
                    debug!("Stale input {} from player {}", input.seq, player_id);
                }
            }

            (Packet::Disconnect, Some(player_id)) => {
                self.clients.write().await.remove_client(player_id);
                self.sim.game.remove_player(player_id);
            }

            (packet, None) => {
                debug!("Ignoring {:?} from unknown address {}", packet, addr);
            }

            (_, Some(player_id)) => {
                warn!("Unexpected packet type from player {}", player_id);
            }
        }
    }

    fn maybe_start_encounter(&mut self) {
        if self.encounter_started {
            return;
        }
        if let Some(name) = &self.config.encounter {
            if encounters::launch(name, self.sim.scripts()).is_some() {
                info!("Encounter '{}' started", name);
                self.encounter_started = true;
            }
        }
    }

    fn broadcast_events(&mut self) {
        for event in self.sim.game.drain_events() {
            self.broadcast_packet(event.into_packet(), None);
        }
    }

    /// Broadcasts current game state to all connected clients
    async fn broadcast_game_state(&self) {
        if self.clients.read().await.is_empty() {
            return;
        }
        self.broadcast_packet(Packet::State(self.sim.snapshot()), None);
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut physics = interval(self.config.tick_duration());
        physics.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut broadcast = interval(self.config.broadcast_duration());
        broadcast.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Server started: {} Hz physics, {} Hz broadcast",
            self.config.tick_rate, self.config.broadcast_rate
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        }
                        Some(ServerMessage::ClientTimeout { player_id }) => {
                            self.sim.game.remove_player(player_id);
                        }
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                }

                Some(command) = self.sim.next_script_command() => {
                    self.sim.handle_script_command(command);
                    self.broadcast_events();
                }

                _ = physics.tick() => {
                    let resolutions = self.sim.physics_tick();
                    if !resolutions.is_empty() {
                        debug!(
                            "Tick {}: {} mechanics resolved",
                            self.sim.game.tick,
                            resolutions.len()
                        );
                    }
                    self.broadcast_events();
                }

                _ = broadcast.tick() => {
                    self.broadcast_game_state().await;
                }
            }
        }

        Ok(())
    }
}

async fn send_packet_to(socket: &UdpSocket, packet: &Packet, addr: SocketAddr) {
    match serialize(packet) {
        Ok(data) => {
            if let Err(e) = socket.send_to(&data, addr).await {
                error!("Failed to send packet to {}: {}", addr, e);
            }
        }
        Err(e) => error!("Failed to encode packet for {}: {}", addr, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(max_players: usize) -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            max_players,
            ..ServerConfig::default()
        }
    }

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    fn next_sent(server: &mut Server) -> Option<(Packet, SocketAddr)> {
        match server.game_rx.try_recv() {
            Ok(GameMessage::SendPacket { packet, addr }) => Some((packet, addr)),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_join_assigns_player_and_number() {
        let mut server = Server::new(test_config(4)).await.unwrap();
        server
            .handle_packet(
                Packet::Join {
                    name: " Alice ".to_string(),
                },
                addr(9001),
            )
            .await;

        match next_sent(&mut server) {
            Some((
                Packet::JoinResponse {
                    success: true,
                    player_id: Some(id),
                    player_number: Some(1),
                    error: None,
                },
                to,
            )) => {
                assert_eq!(to, addr(9001));
                assert_eq!(server.sim.game.players[&id].name, "Alice");
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_rejected_when_full() {
        let mut server = Server::new(test_config(1)).await.unwrap();
        let join = || Packet::Join {
            name: "P".to_string(),
        };
        server.handle_packet(join(), addr(9001)).await;
        next_sent(&mut server);
        server.handle_packet(join(), addr(9002)).await;

        match next_sent(&mut server) {
            Some((
                Packet::JoinResponse {
                    success: false,
                    error: Some(error),
                    ..
                },
                _,
            )) => assert!(error.contains("full")),
            other => panic!("unexpected response {:?}", other),
        }
        assert_eq!(server.sim.game.players.len(), 1);
    }

    #[tokio::test]
    async fn test_input_rename_and_disconnect() {
        let mut server = Server::new(test_config(4)).await.unwrap();
        server
            .handle_packet(
                Packet::Join {
                    name: "Bob".to_string(),
                },
                addr(9001),
            )
            .await;
        let id = server.clients.read().await.find_client_by_addr(addr(9001)).unwrap();

        server
            .handle_packet(
                Packet::Input(shared::PlayerInput {
                    seq: 1,
                    keys: shared::Keys {
                        w: true,
                        ..Default::default()
                    },
                    dt: 0.016,
                }),
                addr(9001),
            )
            .await;
        assert_eq!(server.sim.game.players[&id].pending_input_count(), 1);

        server
            .handle_packet(
                Packet::ChangeName {
                    name: "Robert".to_string(),
                },
                addr(9001),
            )
            .await;
        assert_eq!(server.sim.game.players[&id].name, "Robert");

        server.handle_packet(Packet::Disconnect, addr(9001)).await;
        assert!(server.sim.game.players.is_empty());
        assert!(server.clients.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_packets_from_unknown_addresses_are_ignored() {
        let mut server = Server::new(test_config(4)).await.unwrap();
        server.handle_packet(Packet::Disconnect, addr(9009)).await;
        server
            .handle_packet(
                Packet::ChangeName {
                    name: "Ghost".to_string(),
                },
                addr(9009),
            )
            .await;
        assert!(server.sim.game.players.is_empty());
        assert!(next_sent(&mut server).is_none());
    }

    #[tokio::test]
    async fn test_unknown_encounter_is_rejected() {
        let config = ServerConfig {
            encounter: Some("nope".to_string()),
            ..test_config(4)
        };
        assert!(Server::new(config).await.is_err());
    }

    #[tokio::test]
    async fn test_rejoin_from_same_address_replaces_player() {
        let mut server = Server::new(test_config(4)).await.unwrap();
        let join = || Packet::Join {
            name: "Again".to_string(),
        };
        server.handle_packet(join(), addr(9001)).await;
        server.handle_packet(join(), addr(9001)).await;

        assert_eq!(server.sim.game.players.len(), 1);
        assert_eq!(server.clients.read().await.len(), 1);
    }
}
