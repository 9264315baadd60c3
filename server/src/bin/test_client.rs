//! Headless bot: joins the arena, walks in a square and logs what it sees.

use bincode::{deserialize, serialize};
use clap::Parser;
use log::{info, warn};
use shared::{Keys, Packet, PlayerInput};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, timeout, Instant};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Headless arena test client")]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,
    /// Display name
    #[clap(short, long, default_value = "bot")]
    name: String,
    /// How long to stay connected, in seconds
    #[clap(short, long, default_value = "10")]
    duration: u64,
}

const FRAME: Duration = Duration::from_millis(16);

fn keys_for(elapsed: Duration) -> Keys {
    match (elapsed.as_millis() / 1_000) % 4 {
        0 => Keys {
            d: true,
            ..Keys::default()
        },
        1 => Keys {
            s: true,
            ..Keys::default()
        },
        2 => Keys {
            a: true,
            ..Keys::default()
        },
        _ => Keys {
            w: true,
            ..Keys::default()
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    info!("Bot bound to {}", socket.local_addr()?);

    socket
        .send_to(&serialize(&Packet::Join { name: args.name.clone() })?, args.server)
        .await?;

    let mut buf = [0u8; 65_536];
    let (len, _) = timeout(Duration::from_secs(3), socket.recv_from(&mut buf)).await??;
    let player_id = match deserialize::<Packet>(&buf[..len])? {
        Packet::JoinResponse {
            success: true,
            player_id: Some(id),
            player_number,
            ..
        } => {
            info!("Joined as player {} (#{:?})", id, player_number);
            id
        }
        Packet::JoinResponse { error, .. } => {
            return Err(format!("join rejected: {}", error.unwrap_or_default()).into());
        }
        other => return Err(format!("unexpected reply: {:?}", other).into()),
    };

    let started = Instant::now();
    let mut frames = interval(FRAME);
    let mut seq = 0u32;

    while started.elapsed() < Duration::from_secs(args.duration) {
        tokio::select! {
            _ = frames.tick() => {
                seq += 1;
                let input = PlayerInput {
                    seq,
                    keys: keys_for(started.elapsed()),
                    dt: FRAME.as_secs_f32(),
                };
                socket.send_to(&serialize(&Packet::Input(input))?, args.server).await?;
            }
            received = socket.recv_from(&mut buf) => {
                let (len, _) = received?;
                match deserialize::<Packet>(&buf[..len]) {
                    Ok(Packet::State(state)) => {
                        if let Some(me) = state.player(player_id) {
                            info!(
                                "t={} pos=({:.0}, {:.0}) hp={:.0} ack={} mechanics={}",
                                state.timestamp,
                                me.position.x,
                                me.position.y,
                                me.hp,
                                me.last_input_seq,
                                state.mechanics.len()
                            );
                        }
                    }
                    Ok(Packet::PlayerDamaged { player_id: hit, amount, hp }) if hit == player_id => {
                        warn!("Took {:.0} damage, {:.0} hp left", amount, hp);
                    }
                    Ok(other) => info!("{:?}", other),
                    Err(e) => warn!("Bad packet: {}", e),
                }
            }
        }
    }

    socket
        .send_to(&serialize(&Packet::Disconnect)?, args.server)
        .await?;
    info!("Bot finished after {} inputs", seq);
    Ok(())
}
