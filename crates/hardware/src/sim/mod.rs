//! Simulation: event kernel, trace stimulus, functional mirror, and the
//! top-level [`simulator::Simulator`].

/// The discrete-event kernel (event queue).
pub mod kernel;
/// Functional byte mirror for `StoreMode: Store`.
pub mod memory;
/// Top-level simulator and event routing.
pub mod simulator;
/// Trace parsing and per-thread trace players.
pub mod trace;
