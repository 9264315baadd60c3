//! # Arena Raid Client
//!
//! Client side of the arena: keyboard input, a UDP link to the server and a
//! macroquad renderer, around a prediction pipeline that keeps the local
//! avatar responsive under latency.
//!
//! ## Netcode
//!
//! - **Prediction**: every movement input is applied locally with the same
//!   [`shared::integrate_movement`] the server uses, and queued as a
//!   [`game::PendingInput`] until acknowledged.
//! - **Reconciliation**: each snapshot carries the last input sequence the
//!   server applied for us. Acknowledged inputs are dropped; if the server
//!   position disagrees with what we predicted for that input by more than
//!   [`game::RECONCILE_THRESHOLD`], the remaining inputs are replayed from the
//!   server position. Knockbacks are server-driven, so the client snaps to
//!   them.
//! - **Interpolation**: remote players are drawn 100 ms in the past, blended
//!   between the two snapshots around that instant.
//!
//! Keys 1, 2 and 3 toggle the three stages at runtime.
//!
//! ## Modules
//!
//! - [`game`]: prediction and reconciliation state
//! - [`interpolation`]: per-player snapshot ring buffers
//! - [`input`]: keyboard sampling and sequencing
//! - [`network`]: socket thread and the session state machine
//! - [`rendering`]: drawing

pub mod game;
pub mod input;
pub mod interpolation;
pub mod network;
pub mod rendering;
