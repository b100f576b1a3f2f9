//! Cycle-accurate DRAM subsystem simulator library.
//!
//! This crate implements the memory-controller core of a DRAM subsystem
//! simulator with the following:
//! 1. **MemSpec:** Parametric timing/topology tables for DDR3/4/5, LPDDR4/5,
//!    Wide I/O 1/2, GDDR5/5X/6, HBM2/3, and STT-MRAM.
//! 2. **Controller:** Bank machines, timing checker, request scheduler,
//!    command multiplexer, response queue, refresh and power-down managers.
//! 3. **Front end:** Arbiter with bit-extraction address decoding and
//!    per-thread response ordering.
//! 4. **Simulation:** Embedded discrete-event kernel, trace players, an
//!    optional functional memory mirror, and statistics.

/// Arbiter front end and address decoder.
pub mod arbiter;
/// Common types (coordinates, time, errors, transactions).
pub mod common;
/// Simulator configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// The per-channel memory controller core.
pub mod controller;
/// Parametric memory specifications, one submodule per standard.
pub mod memspec;
/// Simulation: event kernel, stimulus, mirror, top-level simulator.
pub mod sim;
/// Simulation statistics collection and reporting.
pub mod stats;

/// Root configuration type; deserialize from a JSON bundle.
pub use crate::config::Config;
/// The per-channel controller.
pub use crate::controller::Controller;
/// The immutable per-standard specification value.
pub use crate::memspec::MemSpec;
/// Top-level simulator; owns the arbiter, controllers, and event queue.
pub use crate::sim::simulator::Simulator;
