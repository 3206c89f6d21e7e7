//! Life Sim - Conway's Game of Life engine for a browser-rendered board.
//!
//! This crate computes generations of a bounded Game of Life board and
//! streams per-row changes to whoever renders it.
//!
//! # Architecture
//!
//! - `compute`: Grid model, transition variants, bitset codec, stabilization
//! - `protocol`: Messages exchanged between a host and a scheduler
//! - `scheduler`: Cadence-driven runs, in-process or on a worker thread
//! - `host`: Authoritative board, patch merging and editing
//! - `schema`: Configuration and seed patterns
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use life_sim::{
//!     host::SimulationHost,
//!     schema::{Pattern, Seed, SimulationConfig},
//! };
//!
//! let config = SimulationConfig {
//!     rows: 32,
//!     cols: 32,
//!     seed: Seed::new(Pattern::Glider),
//!     ..Default::default()
//! };
//!
//! let mut host = SimulationHost::from_config(&config).unwrap();
//! host.run().unwrap();
//! while host.is_running() {
//!     let update = host.pump_wait(Duration::from_secs(1)).unwrap();
//!     if update.stabilized {
//!         break;
//!     }
//! }
//! println!("Live cells: {}", host.grid().population());
//! ```

pub mod compute;
pub mod host;
pub mod protocol;
pub mod scheduler;
pub mod schema;

// WebAssembly bindings (only for wasm32 target)
#[cfg(target_arch = "wasm32")]
pub mod wasm;

// Re-export commonly used types
pub use compute::{BitGrid, Grid, GridError, TransitionKind};
pub use host::{EditMode, SimulationHost};
pub use protocol::{HostMessage, RowPatch, WorkerMessage};
pub use scheduler::{Scheduler, SchedulerError, create_scheduler};
pub use schema::{Pattern, Seed, SimulationConfig};
