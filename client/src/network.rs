use crate::game::{ClientGameState, ReconcileOutcome};
use crate::input::Toggles;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, PlayerId, PlayerInput};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::sleep;

/// UDP link to the server, driven by its own thread and tokio runtime so the
/// render loop never blocks on the socket.
///
/// With `fake_ping_ms` set, each direction is delayed by half of it.
pub struct NetworkClient {
    outgoing: mpsc::UnboundedSender<Packet>,
    incoming: mpsc::UnboundedReceiver<Packet>,
    server_addr: SocketAddr,
}

impl NetworkClient {
    pub fn connect(
        server_addr: SocketAddr,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (outgoing, out_rx) = mpsc::unbounded_channel();
        let (in_tx, incoming) = mpsc::unbounded_channel();
        let delay = Duration::from_millis(fake_ping_ms / 2);

        info!("Client bound to {}", socket.local_addr()?);

        thread::Builder::new()
            .name("network".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    match UdpSocket::from_std(socket) {
                        Ok(socket) => pump(Arc::new(socket), server_addr, delay, out_rx, in_tx).await,
                        Err(e) => error!("Failed to register socket: {}", e),
                    }
                });
            })?;

        Ok(Self {
            outgoing,
            incoming,
            server_addr,
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Queues a packet; false once the network thread has stopped.
    pub fn send(&self, packet: Packet) -> bool {
        self.outgoing.send(packet).is_ok()
    }

    /// Every packet that has arrived since the last call.
    pub fn drain(&mut self) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Ok(packet) = self.incoming.try_recv() {
            packets.push(packet);
        }
        packets
    }
}

async fn pump(
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
    delay: Duration,
    mut out_rx: mpsc::UnboundedReceiver<Packet>,
    in_tx: mpsc::UnboundedSender<Packet>,
) {
    let mut buf = [0u8; 65_536];

    loop {
        tokio::select! {
            packet = out_rx.recv() => {
                let Some(packet) = packet else {
                    debug!("Network thread shutting down");
                    break;
                };
                let data = match serialize(&packet) {
                    Ok(data) => data,
                    Err(e) => {
                        error!("Failed to serialize packet: {}", e);
                        continue;
                    }
                };
                if delay.is_zero() {
                    if let Err(e) = socket.send_to(&data, server_addr).await {
                        error!("Failed to send packet: {}", e);
                    }
                } else {
                    let socket = socket.clone();
                    tokio::spawn(async move {
                        sleep(delay).await;
                        if let Err(e) = socket.send_to(&data, server_addr).await {
                            error!("Failed to send packet: {}", e);
                        }
                    });
                }
            }
            received = socket.recv_from(&mut buf) => {
                let (len, from) = match received {
                    Ok(received) => received,
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        continue;
                    }
                };
                if from != server_addr {
                    continue;
                }
                let packet = match deserialize::<Packet>(&buf[..len]) {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!("Dropping malformed packet: {}", e);
                        continue;
                    }
                };
                if delay.is_zero() {
                    if in_tx.send(packet).is_err() {
                        break;
                    }
                } else {
                    let in_tx = in_tx.clone();
                    tokio::spawn(async move {
                        sleep(delay).await;
                        let _ = in_tx.send(packet);
                    });
                }
            }
        }
    }
}

/// Connection state machine on top of [`ClientGameState`], independent of
/// the socket and the window.
pub struct ClientSession {
    pub game: ClientGameState,
    pub player_number: Option<u8>,
    pub prediction_enabled: bool,
    pub reconciliation_enabled: bool,
    pub interpolation_enabled: bool,
    pub last_error: Option<String>,
    pub last_outcome: Option<ReconcileOutcome>,
    origin: Instant,
}

impl ClientSession {
    pub fn new() -> Self {
        Self {
            game: ClientGameState::new(),
            player_number: None,
            prediction_enabled: true,
            reconciliation_enabled: true,
            interpolation_enabled: true,
            last_error: None,
            last_outcome: None,
            origin: Instant::now(),
        }
    }

    /// Milliseconds on the local clock.
    pub fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.game.local_id()
    }

    pub fn is_joined(&self) -> bool {
        self.game.local_id().is_some()
    }

    pub fn handle_packet(&mut self, packet: Packet, received_at: u64) {
        match packet {
            Packet::JoinResponse {
                success: true,
                player_id: Some(id),
                player_number,
                ..
            } => {
                info!("Joined as player {} (#{:?})", id, player_number);
                self.game.set_local_player(id);
                self.player_number = player_number;
                self.last_error = None;
            }
            Packet::JoinResponse { error, .. } => {
                let reason = error.unwrap_or_else(|| "join rejected".to_string());
                warn!("Join failed: {}", reason);
                self.last_error = Some(reason);
            }
            Packet::State(state) => {
                let outcome =
                    self.game
                        .apply_server_state(state, received_at, self.reconciliation_enabled);
                if let ReconcileOutcome::Replayed { replayed, error } = outcome {
                    debug!("Replayed {} inputs after {:.1}px divergence", replayed, error);
                }
                self.last_outcome = Some(outcome);
            }
            Packet::TetherResolved {
                mechanic_id,
                distance,
                required_distance,
                failed,
                ..
            } => {
                info!(
                    "Tether {} resolved at {:.0}/{:.0} ({})",
                    mechanic_id,
                    distance,
                    required_distance,
                    if failed { "failed" } else { "held" }
                );
            }
            Packet::TowerResolved {
                mechanic_id,
                occupants,
                required_players,
                success,
            } => {
                info!(
                    "Tower {} resolved with {}/{} ({})",
                    mechanic_id,
                    occupants.len(),
                    required_players,
                    if success { "soaked" } else { "missed" }
                );
            }
            Packet::PlayerDamaged {
                player_id,
                amount,
                hp,
            } => {
                if Some(player_id) == self.player_id() {
                    info!("Took {:.0} damage, {:.0} hp left", amount, hp);
                }
            }
            other => warn!("Unexpected packet from server: {:?}", other),
        }
    }

    /// Applies one frame of local input and returns the packet to send.
    pub fn handle_input(&mut self, input: PlayerInput, sent_at: u64) -> Option<Packet> {
        if !self.is_joined() {
            return None;
        }
        if self.prediction_enabled {
            self.game.apply_prediction(input, sent_at);
        } else {
            self.game.record_unpredicted(input, sent_at);
        }
        Some(Packet::Input(input))
    }

    pub fn handle_toggles(&mut self, toggles: Toggles) {
        if toggles.prediction {
            self.prediction_enabled = !self.prediction_enabled;
            info!("Client-side prediction: {}", self.prediction_enabled);
        }
        if toggles.reconciliation {
            self.reconciliation_enabled = !self.reconciliation_enabled;
            info!("Server reconciliation: {}", self.reconciliation_enabled);
        }
        if toggles.interpolation {
            self.interpolation_enabled = !self.interpolation_enabled;
            info!("Interpolation: {}", self.interpolation_enabled);
        }
    }
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{GameState, Keys, PlayerState, Vec2, MAX_HP};

    fn joined() -> ClientSession {
        let mut session = ClientSession::new();
        session.handle_packet(
            Packet::JoinResponse {
                success: true,
                player_id: Some(3),
                player_number: Some(1),
                error: None,
            },
            0,
        );
        session
    }

    fn state_with(position: Vec2, ack: u32) -> Packet {
        Packet::State(GameState {
            timestamp: 10,
            players: vec![PlayerState {
                id: 3,
                name: "me".to_string(),
                number: 1,
                color: "#ffffff".to_string(),
                position,
                hp: MAX_HP,
                max_hp: MAX_HP,
                last_input_seq: ack,
                knockback: None,
                statuses: vec![],
            }],
            mechanics: vec![],
            statuses: vec![],
        })
    }

    #[test]
    fn test_join_response_sets_identity() {
        let session = joined();
        assert_eq!(session.player_id(), Some(3));
        assert_eq!(session.player_number, Some(1));
    }

    #[test]
    fn test_rejected_join_is_reported() {
        let mut session = ClientSession::new();
        session.handle_packet(
            Packet::JoinResponse {
                success: false,
                player_id: None,
                player_number: None,
                error: Some("server is full (8 players)".to_string()),
            },
            0,
        );
        assert!(!session.is_joined());
        assert_eq!(
            session.last_error.as_deref(),
            Some("server is full (8 players)")
        );
    }

    #[test]
    fn test_inputs_before_join_are_not_sent() {
        let mut session = ClientSession::new();
        let input = PlayerInput {
            seq: 1,
            keys: Keys::default(),
            dt: 0.016,
        };
        assert!(session.handle_input(input, 0).is_none());
    }

    #[test]
    fn test_state_drives_reconciliation() {
        let mut session = joined();
        session.handle_packet(state_with(Vec2::new(100.0, 100.0), 0), 0);
        assert_eq!(session.last_outcome, Some(ReconcileOutcome::Initialized));

        let input = PlayerInput {
            seq: 1,
            keys: Keys {
                s: true,
                ..Keys::default()
            },
            dt: 0.05,
        };
        assert!(matches!(
            session.handle_input(input, 0),
            Some(Packet::Input(_))
        ));
        assert_eq!(session.game.pending_len(), 1);

        let predicted = session.game.predicted_position().unwrap();
        session.handle_packet(state_with(predicted, 1), 30);
        assert_eq!(session.last_outcome, Some(ReconcileOutcome::Trusted));
        assert_eq!(session.game.pending_len(), 0);
    }

    #[test]
    fn test_prediction_toggle() {
        let mut session = joined();
        session.handle_packet(state_with(Vec2::new(100.0, 100.0), 0), 0);
        session.handle_toggles(Toggles {
            prediction: true,
            ..Toggles::default()
        });
        assert!(!session.prediction_enabled);

        let input = PlayerInput {
            seq: 1,
            keys: Keys {
                d: true,
                ..Keys::default()
            },
            dt: 0.05,
        };
        session.handle_input(input, 0);
        assert_eq!(
            session.game.predicted_position(),
            Some(Vec2::new(100.0, 100.0))
        );
        assert_eq!(session.game.pending_len(), 1);
    }
}
