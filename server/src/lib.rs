//! # Arena Server Library
//!
//! Authoritative server for a top-down 2D shooter. The server owns the only
//! copy of the world that matters: clients send intents (move, aim, shoot,
//! reload, spawn) and receive a snapshot of the world after every tick.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! A rigid-body world of static walls, player circles and bullets advances
//! by one fixed timestep per tick. Spawn placement, the weapon rules and
//! bullet damage are all decided here.
//!
//! ### Client Management
//! Every accepted connection gets a player id. Decoded messages land in a
//! per-connection intent buffer that the tick drains. Movement intents are
//! reapplied for a few ticks so a late packet does not stall the player.
//!
//! ### Bots
//! Negative player ids belong to bots. They respawn when dead, wander, and
//! shoot at visible players with a lead computed from the target's velocity.
//!
//! ## Architecture Design
//!
//! ### Single Tick Owner
//! One loop owns the tick. Socket reads are non-blocking and happen at the
//! top of the tick; the simulation step runs under one lock; snapshots are
//! sent after the lock is released. A connection that fails is queued and
//! only removed at the next tick boundary.
//!
//! ### TCP Framing
//! Messages travel over TCP as a 4-byte big-endian length followed by a
//! bincode payload (see the `shared` crate).
//!
//! ## Module Organization
//!
//! - `physics`: rapier2d world wrapper and contact recording
//! - `game`: the simulation core and weapon rules
//! - `lead`: intercept point for shots at moving targets
//! - `ai`: bot controller
//! - `client_manager`: connection registry and intent buffers
//! - `network`: the tick loop
//! - `map`: wall layouts
//! - `config`: tunables
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::{GameModelConfig, ServerConfig};
//! use server::map::default_arena;
//! use server::network::GameServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = GameServer::bind(
//!         ServerConfig::default(),
//!         default_arena(),
//!         GameModelConfig::default(),
//!     )
//!     .await?;
//!
//!     // Runs until a tick fails
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod ai;
pub mod client_manager;
pub mod config;
pub mod game;
pub mod lead;
pub mod map;
pub mod network;
pub mod physics;
