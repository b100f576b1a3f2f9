//! Configuration system for the DRAM subsystem simulator.
//!
//! This module defines all configuration structures and enums used to parameterize
//! the simulator. It provides:
//! 1. **Defaults:** Baseline controller constants (buffer sizes, timeouts, windows).
//! 2. **Structures:** Hierarchical config for the memory controller, simulation,
//!    memspec tables, and address mapping.
//! 3. **Enums:** Page policy, scheduler, buffer accounting, command mux, response
//!    queue, refresh, power-down, arbiter, and store-mode selections.
//!
//! Configuration is supplied as one JSON bundle (see [`Config::from_json`]) or use
//! `Config::default()` plus a memspec for programmatic construction.

use std::collections::HashMap;

use serde::Deserialize;

use crate::common::ConfigError;

/// Default configuration constants for the controller and simulation.
///
/// These values apply when a field is omitted from the JSON bundle.
mod defaults {
    /// Default per-policy request buffer size (entries).
    pub const REQUEST_BUFFER_SIZE: usize = 8;

    /// Default cap on transactions in flight per initiator thread.
    pub const MAX_ACTIVE_TRANSACTIONS: usize = 64;

    /// Default idle cycles before a staggered power-down entry is proposed.
    pub const POWER_DOWN_TIMEOUT: u64 = 3;

    /// Default statistics window size in served requests.
    pub const WINDOW_SIZE: usize = 1000;

    /// Default simulation name used in reports.
    pub const SIMULATION_NAME: &str = "default";
}

/// Row-buffer page policy of the bank machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PagePolicy {
    /// Keep rows open; plain RD/WR.
    #[default]
    Open,
    /// Close rows eagerly; always RDA/WRA.
    Closed,
    /// Open, but auto-precharge when no further hit to the open row is pending.
    OpenAdaptive,
    /// Closed, but keep the row open while further hits to it are pending.
    ClosedAdaptive,
}

/// Request scheduler policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SchedulerPolicy {
    /// Per-bank oldest request.
    Fifo,
    /// First-ready, first-come-first-served: row hits before row misses.
    #[default]
    FrFcfs,
    /// FR-FCFS with same-direction grouping among row hits.
    FrFcfsGrp,
    /// Global read/write grouping on top of FR-FCFS.
    GrpFrFcfs,
    /// Global grouping with write-queue high/low watermarks.
    GrpFrFcfsWm,
}

/// Buffer accounting that drives upstream backpressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SchedulerBufferPolicy {
    /// One budget per bank.
    #[default]
    Bankwise,
    /// Separate budgets for reads and writes.
    ReadWrite,
    /// One shared budget for the whole channel.
    Shared,
}

/// Command multiplexer policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CmdMuxPolicy {
    /// Issue the ready candidate of the oldest transaction.
    #[default]
    Oldest,
    /// Issue strictly in transaction arrival order (NOP when the oldest is not ready).
    Strict,
}

/// Read response queue ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RespQueuePolicy {
    /// Responses leave in CAS issue order.
    #[default]
    Fifo,
    /// Responses leave in data-ready order.
    Reorder,
}

/// Refresh policy selection, per rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RefreshPolicy {
    /// No refresh commands are ever generated.
    NoRefresh,
    /// All-bank refresh (REFAB) on the whole rank.
    #[default]
    AllBank,
    /// Rotating single-bank refresh (REFPB).
    PerBank,
    /// Rotating bank-pair refresh (REFP2B).
    Per2Bank,
    /// Same-bank refresh across bank groups (REFSB).
    SameBank,
}

/// Power-down policy selection, per rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PowerDownPolicy {
    /// Never enter a low-power state.
    #[default]
    NoPowerDown,
    /// Enter power-down after a configurable idle timeout.
    Staggered,
}

/// Arbiter front-end behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ArbiterPolicy {
    /// Forward immediately when the channel is free, queue otherwise.
    #[default]
    Simple,
    /// Always dispatch through the per-channel FIFO.
    Fifo,
    /// Accepted for compatibility; behaves as `Fifo`.
    Reorder,
}

/// Functional storage mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum StoreMode {
    /// Timing-only simulation; read data is all zeroes.
    #[default]
    NoStorage,
    /// Keep a byte mirror: writes are applied, reads return written data.
    Store,
}

/// Memory controller configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct McConfig {
    /// Row-buffer policy of all bank machines.
    pub page_policy: PagePolicy,
    /// Request scheduler policy.
    pub scheduler: SchedulerPolicy,
    /// Buffer accounting policy.
    pub scheduler_buffer: SchedulerBufferPolicy,
    /// Command multiplexer policy.
    pub cmd_mux: CmdMuxPolicy,
    /// Response queue ordering.
    pub resp_queue: RespQueuePolicy,
    /// Arbiter front-end behaviour.
    pub arbiter: ArbiterPolicy,
    /// Request buffer size per accounting unit (must be at least 1).
    pub request_buffer_size: usize,
    /// Refresh policy for every rank.
    pub refresh_policy: RefreshPolicy,
    /// Maximum refreshes that may be postponed per full refresh rotation.
    pub refresh_max_postponed: u32,
    /// Maximum refreshes that may be pulled in per full refresh rotation.
    pub refresh_max_pulledin: u32,
    /// Power-down policy for every rank.
    pub power_down_policy: PowerDownPolicy,
    /// Idle cycles before a staggered power-down entry.
    pub power_down_timeout: u64,
    /// Cap on transactions in flight per initiator thread.
    pub max_active_transactions: usize,
    /// Enable RFM (refresh management) activate counters.
    pub refresh_management: bool,
    /// Write-queue low watermark for `GrpFrFcfsWm`.
    pub low_watermark: usize,
    /// Write-queue high watermark for `GrpFrFcfsWm`.
    pub high_watermark: usize,
}

impl Default for McConfig {
    fn default() -> Self {
        Self {
            page_policy: PagePolicy::default(),
            scheduler: SchedulerPolicy::default(),
            scheduler_buffer: SchedulerBufferPolicy::default(),
            cmd_mux: CmdMuxPolicy::default(),
            resp_queue: RespQueuePolicy::default(),
            arbiter: ArbiterPolicy::default(),
            request_buffer_size: defaults::REQUEST_BUFFER_SIZE,
            refresh_policy: RefreshPolicy::default(),
            refresh_max_postponed: 0,
            refresh_max_pulledin: 0,
            power_down_policy: PowerDownPolicy::default(),
            power_down_timeout: defaults::POWER_DOWN_TIMEOUT,
            max_active_transactions: defaults::MAX_ACTIVE_TRANSACTIONS,
            refresh_management: false,
            low_watermark: 0,
            high_watermark: 0,
        }
    }
}

/// Simulation-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SimConfig {
    /// Name used in reports and log banners.
    pub simulation_name: String,
    /// Lower the default log level to `debug`.
    pub debug: bool,
    /// Accepted for compatibility; power analysis is not part of the core.
    pub power_analysis: bool,
    /// Enable windowed bandwidth sampling.
    pub enable_windowing: bool,
    /// Statistics window size in served requests (must be at least 1).
    pub window_size: usize,
    /// Accepted for compatibility; protocol checking is not part of the core.
    #[serde(rename = "CheckTLM2Protocol")]
    pub check_tlm2_protocol: bool,
    /// Functional storage mode.
    pub store_mode: StoreMode,
    /// Offset subtracted from every incoming address before decoding.
    pub address_offset: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            simulation_name: defaults::SIMULATION_NAME.to_owned(),
            debug: false,
            power_analysis: false,
            enable_windowing: false,
            window_size: defaults::WINDOW_SIZE,
            check_tlm2_protocol: false,
            store_mode: StoreMode::default(),
            address_offset: 0,
        }
    }
}

/// One XOR pair of the address mapping: `first ^= second` before extraction.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct XorPair {
    /// Bit index that receives the XOR result.
    #[serde(rename = "FIRST")]
    pub first: u32,
    /// Bit index folded into `first`.
    #[serde(rename = "SECOND")]
    pub second: u32,
}

/// Address mapping: one bit-index vector per coordinate plus XOR pairs.
///
/// Vector element `i` names the physical address bit that becomes bit `i` of the
/// decoded coordinate.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddressMappingConfig {
    /// Channel bit indices.
    #[serde(rename = "CHANNEL_BIT")]
    pub channel_bits: Vec<u32>,
    /// Rank bit indices.
    #[serde(rename = "RANK_BIT")]
    pub rank_bits: Vec<u32>,
    /// Bank-group bit indices.
    #[serde(rename = "BANKGROUP_BIT")]
    pub bank_group_bits: Vec<u32>,
    /// Bank bit indices.
    #[serde(rename = "BANK_BIT")]
    pub bank_bits: Vec<u32>,
    /// Row bit indices.
    #[serde(rename = "ROW_BIT")]
    pub row_bits: Vec<u32>,
    /// Column bit indices.
    #[serde(rename = "COLUMN_BIT")]
    pub column_bits: Vec<u32>,
    /// Byte-in-burst bit indices.
    #[serde(rename = "BYTE_BIT")]
    pub byte_bits: Vec<u32>,
    /// XOR pairs applied before extraction.
    #[serde(rename = "XOR")]
    pub xor: Vec<XorPair>,
}

/// Raw memspec tables as configured: a key map per section, values in `tCK` cycles
/// (timings) or plain counts (architecture).
#[derive(Debug, Clone, Deserialize)]
pub struct MemSpecConfig {
    /// Identifier of the speed/density grade (free-form).
    #[serde(rename = "memoryId", default)]
    pub memory_id: String,
    /// Standard name (e.g. `"DDR4"`); selects the constructor.
    #[serde(rename = "memoryType")]
    pub memory_type: String,
    /// Device geometry counts (`nbrOfRanks`, `nbrOfBanks`, ...).
    #[serde(rename = "memarchitecturespec")]
    pub architecture: HashMap<String, u64>,
    /// Timing table in clock cycles (`RCD`, `RP`, `RAS`, ...) plus `tCK` in ps.
    #[serde(rename = "memtimingspec")]
    pub timings: HashMap<String, u64>,
}

/// The full configuration bundle.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Memory controller options.
    #[serde(rename = "mcconfig", default)]
    pub mc: McConfig,
    /// Simulation options.
    #[serde(rename = "simconfig", default)]
    pub sim: SimConfig,
    /// Memspec tables.
    #[serde(rename = "memspec")]
    pub memspec: MemSpecConfig,
    /// Address mapping.
    #[serde(rename = "addressmapping", default)]
    pub address_mapping: AddressMappingConfig,
}

impl Config {
    /// Parses a configuration bundle from a JSON document and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed JSON and the relevant
    /// construction error on invalid values.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value domains that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a value is outside its domain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mc.request_buffer_size == 0 {
            return Err(ConfigError::invalid(
                "McConfig",
                "RequestBufferSize must be at least 1",
            ));
        }
        if self.sim.window_size == 0 {
            return Err(ConfigError::invalid(
                "SimConfig",
                "WindowSize must be at least 1",
            ));
        }
        if self.mc.max_active_transactions == 0 {
            return Err(ConfigError::invalid(
                "McConfig",
                "MaxActiveTransactions must be at least 1",
            ));
        }
        if self.mc.scheduler == SchedulerPolicy::GrpFrFcfsWm
            && self.mc.high_watermark < self.mc.low_watermark
        {
            return Err(ConfigError::invalid(
                "McConfig",
                "HighWatermark must not be below LowWatermark",
            ));
        }
        Ok(())
    }
}
