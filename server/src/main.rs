use clap::Parser;
use server::config::ServerConfig;
use server::encounters::ENCOUNTERS;
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Authoritative arena raid server")]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Physics ticks per second
    #[clap(short, long, default_value = "60")]
    tick_rate: u32,
    /// State broadcasts per second
    #[clap(short, long, default_value = "20")]
    broadcast_rate: u32,
    /// Maximum concurrent players
    #[clap(short, long, default_value = "8")]
    max_players: usize,
    /// Encounter to run once the first player joins
    #[clap(short, long)]
    encounter: Option<String>,
    /// Seconds of silence before a client is dropped
    #[clap(long, default_value = "5")]
    timeout: u64,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            bind_addr: format!("{}:{}", args.host, args.port),
            tick_rate: args.tick_rate,
            broadcast_rate: args.broadcast_rate,
            max_players: args.max_players,
            client_timeout: Duration::from_secs(args.timeout),
            encounter: args.encounter,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    if let Some(name) = &args.encounter {
        log::info!("Encounter '{}' selected (available: {:?})", name, ENCOUNTERS);
    }

    let mut server = Server::new(args.into()).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
