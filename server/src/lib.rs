//! # Arena Raid Server
//!
//! Authoritative server for a top-down raid arena. Players move around an
//! 800x800 arena while scripted encounters spawn telegraphed mechanics
//! (chariots, dynamos, tethers, towers, knockbacks, line and cone AoEs) that
//! resolve against live player positions when their timers run out.
//!
//! ## Architecture
//!
//! A single server loop owns the [`game::Game`]. It multiplexes four event
//! sources with `tokio::select!`:
//!
//! - **Network**: decoded packets from the UDP receiver task
//! - **Script commands**: requests from encounter scripts, which run as their
//!   own tasks and never touch game state directly
//! - **Physics tick** (60 Hz by default): inputs, then knockback, then
//!   mechanic resolution, then status effects
//! - **Broadcast tick** (20 Hz by default): a [`shared::GameState`] snapshot
//!   to every client
//!
//! Mechanic resolutions flow back to scripts through a resolution hub, so a
//! script can `wait_for_resolve` a mechanic and act on who it hit.
//!
//! ## Module Organization
//!
//! - [`game`], [`mechanics`], [`status`], [`player`]: the simulation itself
//! - [`script`]: the runner API encounter scripts are written against
//! - [`encounters`]: built-in encounters
//! - [`simulation`]: game plus script plumbing, usable without a socket
//! - [`network`], [`client_manager`], [`config`]: UDP server and connections
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         encounter: Some("demo".to_string()),
//!         ..ServerConfig::default()
//!     };
//!     let mut server = Server::new(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod encounters;
pub mod game;
pub mod mechanics;
pub mod network;
pub mod player;
pub mod script;
pub mod simulation;
pub mod status;
pub mod utils;
