use clap::Parser;
use client::input::InputManager;
use client::network::{ClientSession, NetworkClient};
use client::rendering::{HudInfo, Renderer};
use log::{error, info};
use macroquad::prelude::{
    get_frame_time, is_key_pressed, next_frame, screen_height, screen_width, Conf, KeyCode,
};
use shared::Packet;
use std::net::SocketAddr;
use std::time::Duration;

/// Milliseconds between join attempts while not in the arena.
const JOIN_RETRY_MS: u64 = 2_000;

#[derive(Parser, Debug)]
#[command(author, version, about = "Arena raid client", long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,

    /// Simulate network latency in milliseconds (round trip)
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Display name
    #[arg(short = 'n', long, default_value = "player")]
    name: String,

    /// Window width
    #[arg(short = 'w', long, default_value = "900")]
    width: i32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "900")]
    height: i32,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Arena Raid".to_string(),
        window_width: args.width,
        window_height: args.height,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    info!("Controls: WASD to move");
    info!("Press 1/2/3 to toggle Prediction/Reconciliation/Interpolation");

    let mut network = match NetworkClient::connect(args.server, args.fake_ping) {
        Ok(network) => network,
        Err(e) => {
            error!("Failed to start networking: {}", e);
            return;
        }
    };

    let mut session = ClientSession::new();
    let mut input = InputManager::new();
    let renderer = Renderer::new(screen_width(), screen_height());
    let mut last_join_attempt: Option<u64> = None;

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        let now = session.now_ms();
        let was_joined = session.is_joined();
        for packet in network.drain() {
            session.handle_packet(packet, now);
        }
        if session.is_joined() && !was_joined {
            input.reset();
        }

        if !session.is_joined()
            && last_join_attempt.map_or(true, |at| now.saturating_sub(at) >= JOIN_RETRY_MS)
        {
            network.send(Packet::Join {
                name: args.name.clone(),
            });
            last_join_attempt = Some(now);
        }

        let (toggles, frame_input) = input.poll(get_frame_time());
        session.handle_toggles(toggles);
        if let Some(packet) = frame_input.and_then(|i| session.handle_input(i, now)) {
            if !network.send(packet) {
                error!("Network thread stopped");
                break;
            }
        }

        let players = session.game.render_players(
            now,
            session.prediction_enabled,
            session.interpolation_enabled,
        );
        let hud = HudInfo {
            player_id: session.player_id(),
            prediction_enabled: session.prediction_enabled,
            reconciliation_enabled: session.reconciliation_enabled,
            interpolation_enabled: session.interpolation_enabled,
            rtt_ms: session.game.last_rtt_ms(),
            fake_ping_ms: args.fake_ping,
            pending_inputs: session.game.pending_len(),
            error: session.last_error.clone(),
        };
        renderer.render(session.game.latest_state(), &players, &hud);

        next_frame().await;
    }

    if session.is_joined() {
        network.send(Packet::Disconnect);
        // let the network thread flush the goodbye
        std::thread::sleep(Duration::from_millis(50 + args.fake_ping / 2));
    }
}
