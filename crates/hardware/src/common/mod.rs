//! Common types shared by every subsystem.
//!
//! This module provides:
//! 1. **Coordinates:** Strong index types for channels, ranks, bank groups, banks, rows,
//!    columns and initiator threads.
//! 2. **Time:** The `SimTime` picosecond wall-clock type with a "never" sentinel.
//! 3. **Errors:** Fatal construction-time error types.
//! 4. **Transactions:** The refcounted transaction pool shared by arbiter and controllers.

/// Coordinate newtypes (channel, rank, bank group, bank, row, column, thread).
pub mod coords;
/// Fatal configuration and construction errors.
pub mod error;
/// Simulated wall-clock time in picoseconds.
pub mod time;
/// Transactions, their arbiter/controller tags, and the arena pool.
pub mod transaction;

pub use coords::{Bank, BankGroup, Channel, Column, Rank, Row, Thread};
pub use error::ConfigError;
pub use time::SimTime;
pub use transaction::{ArbiterTag, ControllerTag, TransId, TransKind, Transaction, TransactionPool};
