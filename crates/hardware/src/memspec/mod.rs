//! Parametric memory specifications.
//!
//! A [`MemSpec`] is the immutable value describing one concrete device standard:
//! topology, the cycle-converted timing table, per-command bus occupancy, refresh
//! intervals, and the timing-constraint catalogue consumed by the checker. It
//! provides:
//! 1. **Geometry:** channels, ranks, bank groups, banks, rows, columns, burst.
//! 2. **Durations:** `command_length`, `execution_time`, `interval_on_data_strobe`.
//! 3. **Refresh:** interval per supported scope; unsupported scopes fail hard.
//! 4. **Catalogue:** the `(prev, next, scope) -> delay` rows for the checker.
//!
//! One submodule per standard builds the value from the configured key maps;
//! missing required keys are fatal.

use serde::Deserialize;

use crate::common::time::SimTime;
use crate::common::transaction::{TransKind, Transaction};
use crate::common::ConfigError;
use crate::config::MemSpecConfig;
use crate::controller::checker::{ConstraintScope, ConstraintSet, TimingConstraint};
use crate::controller::command::Command;

mod ddr3;
mod ddr4;
mod ddr5;
mod gddr5;
mod gddr5x;
mod gddr6;
mod hbm2;
mod hbm3;
mod lpddr4;
mod lpddr5;
mod sttmram;
mod wideio;
mod wideio2;

/// The supported device standards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub enum MemoryType {
    /// DDR3 SDRAM.
    Ddr3,
    /// DDR4 SDRAM (bank groups).
    Ddr4,
    /// DDR5 SDRAM (bank groups, same-bank refresh, refresh management).
    Ddr5,
    /// LPDDR4 (multi-cycle commands, per-bank refresh).
    Lpddr4,
    /// LPDDR5 (bank groups, per-bank refresh).
    Lpddr5,
    /// Wide I/O SDR.
    WideIo,
    /// Wide I/O 2.
    WideIo2,
    /// GDDR5 (bank groups, per-bank refresh).
    Gddr5,
    /// GDDR5X (bank groups, per-2-bank refresh).
    Gddr5x,
    /// GDDR6 (bank groups, per-2-bank refresh).
    Gddr6,
    /// HBM2 (pseudo channels, per-bank refresh).
    Hbm2,
    /// HBM3 (same-bank refresh, refresh management).
    Hbm3,
    /// STT-MRAM on a DDR3-class interface; no refresh obligation.
    SttMram,
}

impl MemoryType {
    /// Parses the configured standard name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unsupported`] for an unknown name.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "DDR3" => Ok(Self::Ddr3),
            "DDR4" => Ok(Self::Ddr4),
            "DDR5" => Ok(Self::Ddr5),
            "LPDDR4" => Ok(Self::Lpddr4),
            "LPDDR5" => Ok(Self::Lpddr5),
            "WIDEIO_SDR" | "WIDEIO" => Ok(Self::WideIo),
            "WIDEIO2" => Ok(Self::WideIo2),
            "GDDR5" => Ok(Self::Gddr5),
            "GDDR5X" => Ok(Self::Gddr5x),
            "GDDR6" => Ok(Self::Gddr6),
            "HBM2" => Ok(Self::Hbm2),
            "HBM3" => Ok(Self::Hbm3),
            "STTMRAM" | "STT-MRAM" => Ok(Self::SttMram),
            other => Err(ConfigError::unsupported(
                "MemSpec",
                format!("unknown memory type \"{other}\""),
            )),
        }
    }

    /// Short display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ddr3 => "DDR3",
            Self::Ddr4 => "DDR4",
            Self::Ddr5 => "DDR5",
            Self::Lpddr4 => "LPDDR4",
            Self::Lpddr5 => "LPDDR5",
            Self::WideIo => "WIDEIO_SDR",
            Self::WideIo2 => "WIDEIO2",
            Self::Gddr5 => "GDDR5",
            Self::Gddr5x => "GDDR5X",
            Self::Gddr6 => "GDDR6",
            Self::Hbm2 => "HBM2",
            Self::Hbm3 => "HBM3",
            Self::SttMram => "STTMRAM",
        }
    }
}

/// A half-open `[start, end)` window relative to command issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeInterval {
    /// Window start, relative to issue.
    pub start: SimTime,
    /// Window end, relative to issue.
    pub end: SimTime,
}

/// The union of all timing parameters used by any standard.
///
/// Fields a standard does not define stay at zero; zero-delay constraint rows are
/// dropped by the catalogue builder, so an absent parameter never constrains.
#[derive(Clone, Copy, Debug, Default)]
pub struct Timings {
    /// Minimum clock-enable pulse width.
    pub cke: SimTime,
    /// Minimum clock-enable low width for self refresh.
    pub ckesr: SimTime,
    /// Minimum power-down duration.
    pub pd: SimTime,
    /// Power-down exit to next valid command.
    pub xp: SimTime,
    /// Self-refresh exit to next valid command.
    pub xs: SimTime,
    /// ACT to PRE, same bank.
    pub ras: SimTime,
    /// ACT to ACT, same bank.
    pub rc: SimTime,
    /// ACT to CAS, same bank.
    pub rcd: SimTime,
    /// ACT to RD, same bank (standards with split read/write RCD).
    pub rcdrd: SimTime,
    /// ACT to WR, same bank (standards with split read/write RCD).
    pub rcdwr: SimTime,
    /// Read latency (issue to first data beat).
    pub rl: SimTime,
    /// Write latency (issue to first data beat).
    pub wl: SimTime,
    /// RD to PRE, same bank.
    pub rtp: SimTime,
    /// Write recovery (last data beat to PRE), same bank.
    pub wr: SimTime,
    /// PRE to ACT, same bank.
    pub rp: SimTime,
    /// All-bank refresh interval.
    pub refi: SimTime,
    /// Per-bank refresh interval.
    pub refipb: SimTime,
    /// Per-2-bank refresh interval.
    pub refip2b: SimTime,
    /// Same-bank refresh interval.
    pub refisb: SimTime,
    /// All-bank refresh cycle time.
    pub rfc: SimTime,
    /// Per-bank refresh cycle time.
    pub rfcpb: SimTime,
    /// Per-2-bank refresh cycle time.
    pub rfcp2b: SimTime,
    /// Same-bank refresh cycle time.
    pub rfcsb: SimTime,
    /// Refresh-to-refresh delay across banks of one rank.
    pub rrefd: SimTime,
    /// CAS to CAS (standards without bank groups).
    pub ccd: SimTime,
    /// CAS to CAS, different bank group.
    pub ccds: SimTime,
    /// CAS to CAS, same bank group.
    pub ccdl: SimTime,
    /// ACT to ACT, same rank (standards without bank groups).
    pub rrd: SimTime,
    /// ACT to ACT, different bank group.
    pub rrds: SimTime,
    /// ACT to ACT, same bank group.
    pub rrdl: SimTime,
    /// Write-to-read turnaround (standards without bank groups).
    pub wtr: SimTime,
    /// Write-to-read turnaround, different bank group.
    pub wtrs: SimTime,
    /// Write-to-read turnaround, same bank group.
    pub wtrl: SimTime,
    /// Four-activate window.
    pub faw: SimTime,
    /// Rank-to-rank data-bus switch time.
    pub rtrs: SimTime,
    /// Data-strobe skew added to read latency.
    pub dqsck: SimTime,
    /// ACT to power-down entry.
    pub actpden: SimTime,
    /// PRE to power-down entry.
    pub prpden: SimTime,
    /// REF to power-down entry.
    pub refpden: SimTime,
}

/// Refresh intervals for the scopes the standard supports.
#[derive(Clone, Copy, Debug, Default)]
pub struct RefreshIntervals {
    /// All-bank interval, if supported.
    pub ab: Option<SimTime>,
    /// Per-bank interval, if supported.
    pub pb: Option<SimTime>,
    /// Per-2-bank interval, if supported.
    pub p2b: Option<SimTime>,
    /// Same-bank interval, if supported.
    pub sb: Option<SimTime>,
}

/// Refresh-management (RFM) thresholds in activate counts.
#[derive(Clone, Copy, Debug)]
pub struct RfmSpec {
    /// Opportunistic threshold: an RFM may be scheduled.
    pub raaimt: u64,
    /// Mandatory threshold: an RFM must be forced.
    pub raammt: u64,
    /// Counter credit applied per refresh command.
    pub raadec: u64,
}

/// How a standard serves writes with deasserted byte enables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskedWriteSupport {
    /// No way to mask bytes; such writes are fatal.
    Unsupported,
    /// Data-mask pins; the plain WR command carries the mask.
    DataMask,
    /// A dedicated MWR/MWRA command variant.
    MwrCommand,
}

/// The immutable specification of one device standard.
#[derive(Debug)]
pub struct MemSpec {
    /// Identifier of the configured speed/density grade.
    pub memory_id: String,
    /// The standard this value describes.
    pub memory_type: MemoryType,
    /// Number of channels in the system.
    pub channels: usize,
    /// Pseudo channels per channel (1 unless the standard splits the channel).
    pub pseudo_channels_per_channel: usize,
    /// Ranks per channel.
    pub ranks_per_channel: usize,
    /// Banks per rank.
    pub banks_per_rank: usize,
    /// Bank groups per rank.
    pub groups_per_rank: usize,
    /// Banks per bank group.
    pub banks_per_group: usize,
    /// Banks per channel (global numbering space).
    pub banks_per_channel: usize,
    /// Bank groups per channel (global numbering space).
    pub groups_per_channel: usize,
    /// Devices ganged per rank.
    pub devices_per_rank: usize,
    /// Rows per bank.
    pub rows_per_bank: u64,
    /// Columns per row.
    pub columns_per_row: u64,
    /// Default burst length in beats.
    pub burst_length: u32,
    /// Largest supported burst length in beats.
    pub max_burst_length: u32,
    /// Data transfers per clock (1 = SDR, 2 = DDR, 4 = QDR).
    pub data_rate: u32,
    /// Device interface width in bits.
    pub bit_width: u32,
    /// Duration of one clock cycle.
    pub tck: SimTime,
    /// Duration of one default-length burst on the data bus.
    pub burst_duration: SimTime,
    /// The cycle-converted timing table.
    pub timings: Timings,
    /// Bus occupancy per command.
    pub command_lengths: [SimTime; Command::COUNT],
    /// Refresh intervals for supported scopes.
    pub refresh: RefreshIntervals,
    /// Bank-pair distance for per-2-bank refresh.
    pub per2bank_offset: usize,
    /// RFM thresholds when the standard supports refresh management.
    pub rfm: Option<RfmSpec>,
    /// How masked writes are served.
    pub masked_write: MaskedWriteSupport,
    /// `true` when ACT completion depends on the eventual CAS direction.
    pub act_split_by_kind: bool,
    /// Timing-constraint catalogue for the checker.
    pub constraints: Vec<TimingConstraint>,
}

impl MemSpec {
    /// Builds the memspec for the configured standard.
    ///
    /// # Errors
    ///
    /// Returns a fatal error for an unknown standard or missing required keys.
    pub fn from_config(cfg: &MemSpecConfig) -> Result<Self, ConfigError> {
        match MemoryType::from_name(&cfg.memory_type)? {
            MemoryType::Ddr3 => ddr3::build(cfg),
            MemoryType::Ddr4 => ddr4::build(cfg),
            MemoryType::Ddr5 => ddr5::build(cfg),
            MemoryType::Lpddr4 => lpddr4::build(cfg),
            MemoryType::Lpddr5 => lpddr5::build(cfg),
            MemoryType::WideIo => wideio::build(cfg),
            MemoryType::WideIo2 => wideio2::build(cfg),
            MemoryType::Gddr5 => gddr5::build(cfg),
            MemoryType::Gddr5x => gddr5x::build(cfg),
            MemoryType::Gddr6 => gddr6::build(cfg),
            MemoryType::Hbm2 => hbm2::build(cfg),
            MemoryType::Hbm3 => hbm3::build(cfg),
            MemoryType::SttMram => sttmram::build(cfg),
        }
    }

    /// Bus occupancy of a command.
    #[inline]
    pub fn command_length(&self, cmd: Command) -> SimTime {
        self.command_lengths[cmd.idx()]
    }

    /// Time from issue to functional completion.
    ///
    /// For standards with split read/write RCD, ACT completion depends on the
    /// direction of the CAS it prepares (`kind`).
    pub fn execution_time(&self, cmd: Command, kind: TransKind) -> SimTime {
        let t = &self.timings;
        match cmd {
            Command::Prepb | Command::Preab | Command::Presb => t.rp,
            Command::Act => {
                if self.act_split_by_kind {
                    match kind {
                        TransKind::Read => t.rcdrd,
                        TransKind::Write => t.rcdwr,
                    }
                } else {
                    t.rcd
                }
            }
            Command::Rd => t.rl + t.dqsck + self.burst_duration,
            Command::Rda => t.rtp + t.rp,
            Command::Wr | Command::Mwr => t.wl + self.burst_duration,
            Command::Wra | Command::Mwra => t.wl + self.burst_duration + t.wr + t.rp,
            Command::Refab | Command::Rfmab => t.rfc,
            Command::Refpb | Command::Rfmpb => t.rfcpb,
            Command::Refsb | Command::Rfmsb => t.rfcsb,
            Command::Refp2b | Command::Rfmp2b => t.rfcp2b,
            Command::Srefex => t.xs,
            Command::Pdxa | Command::Pdxp => t.xp,
            _ => {
                debug_assert!(false, "no fixed execution time for {cmd}");
                SimTime::ZERO
            }
        }
    }

    /// Data-bus window of a CAS command, relative to issue.
    ///
    /// # Panics
    ///
    /// Panics (in debug builds) when called with a non-CAS command.
    pub fn interval_on_data_strobe(&self, cmd: Command) -> TimeInterval {
        let t = &self.timings;
        debug_assert!(cmd.is_cas(), "no data-strobe interval for {cmd}");
        if cmd.is_read() {
            TimeInterval {
                start: t.rl + t.dqsck,
                end: t.rl + t.dqsck + self.burst_duration,
            }
        } else {
            TimeInterval {
                start: t.wl,
                end: t.wl + self.burst_duration,
            }
        }
    }

    /// All-bank refresh interval; fatal if the standard has none.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unsupported`] when all-bank refresh is not offered.
    pub fn refresh_interval_ab(&self) -> Result<SimTime, ConfigError> {
        self.refresh.ab.ok_or_else(|| {
            ConfigError::unsupported(
                "RefreshManager",
                format!("{} does not support all-bank refresh", self.memory_type.name()),
            )
        })
    }

    /// Per-bank refresh interval; fatal if the standard has none.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unsupported`] when per-bank refresh is not offered.
    pub fn refresh_interval_pb(&self) -> Result<SimTime, ConfigError> {
        self.refresh.pb.ok_or_else(|| {
            ConfigError::unsupported(
                "RefreshManager",
                format!("{} does not support per-bank refresh", self.memory_type.name()),
            )
        })
    }

    /// Per-2-bank refresh interval; fatal if the standard has none.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unsupported`] when per-2-bank refresh is not offered.
    pub fn refresh_interval_p2b(&self) -> Result<SimTime, ConfigError> {
        self.refresh.p2b.ok_or_else(|| {
            ConfigError::unsupported(
                "RefreshManager",
                format!("{} does not support per-2-bank refresh", self.memory_type.name()),
            )
        })
    }

    /// Same-bank refresh interval; fatal if the standard has none.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unsupported`] when same-bank refresh is not offered.
    pub fn refresh_interval_sb(&self) -> Result<SimTime, ConfigError> {
        self.refresh.sb.ok_or_else(|| {
            ConfigError::unsupported(
                "RefreshManager",
                format!("{} does not support same-bank refresh", self.memory_type.name()),
            )
        })
    }

    /// Returns `true` when the transaction must be served with the MWR variant.
    pub fn requires_masked_write(&self, trans: &Transaction) -> bool {
        trans.has_disabled_bytes() && self.masked_write == MaskedWriteSupport::MwrCommand
    }

    /// Rejects writes with deasserted byte enables on standards without masking.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unsupported`] for an unmaskable partial write.
    pub fn check_masked_write(&self, trans: &Transaction) -> Result<(), ConfigError> {
        if trans.has_disabled_bytes() && self.masked_write == MaskedWriteSupport::Unsupported {
            return Err(ConfigError::unsupported(
                "MemSpec",
                format!(
                    "{} does not support masked writes",
                    self.memory_type.name()
                ),
            ));
        }
        Ok(())
    }

    /// Total simulated capacity in bytes.
    pub fn memory_size_bytes(&self) -> u64 {
        let device_bits = self.banks_per_rank as u64
            * self.rows_per_bank
            * self.columns_per_row
            * u64::from(self.bit_width);
        (device_bits / 8)
            * self.devices_per_rank as u64
            * self.ranks_per_channel as u64
            * self.channels as u64
    }
}

// ---------------------------------------------------------------------------
// Construction helpers shared by the per-standard builders.
// ---------------------------------------------------------------------------

/// Key-map accessor for one section of the configured memspec.
pub(crate) struct KeyMap<'a> {
    map: &'a std::collections::HashMap<String, u64>,
    standard: &'static str,
}

impl<'a> KeyMap<'a> {
    pub(crate) fn new(
        map: &'a std::collections::HashMap<String, u64>,
        standard: &'static str,
    ) -> Self {
        Self { map, standard }
    }

    /// Required key; missing is fatal.
    pub(crate) fn req(&self, key: &'static str) -> Result<u64, ConfigError> {
        self.map
            .get(key)
            .copied()
            .ok_or(ConfigError::MissingTimingKey {
                standard: self.standard,
                key,
            })
    }

    /// Optional key with a default.
    pub(crate) fn opt(&self, key: &str, default: u64) -> u64 {
        self.map.get(key).copied().unwrap_or(default)
    }
}

/// Converts a cycle count into wall time.
pub(crate) fn cycles(tck: SimTime, n: u64) -> SimTime {
    tck.times(n)
}

/// Which optional constraint families a standard's catalogue carries.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct CatalogueParams {
    /// Bank groups exist: use `_S`/`_L` CAS and activate spacings.
    pub grouped: bool,
    /// Per-bank refresh commands exist.
    pub refresh_pb: bool,
    /// Per-2-bank refresh commands exist.
    pub refresh_p2b: bool,
    /// Same-bank refresh commands exist.
    pub refresh_sb: bool,
    /// RFM commands exist.
    pub rfm: bool,
}

/// Builds the full constraint catalogue from a timing table.
///
/// Rows whose delay works out to zero are dropped, so standards simply leave the
/// parameters they do not define at zero.
pub(crate) fn build_catalogue(
    t: &Timings,
    tck: SimTime,
    burst: SimTime,
    p: CatalogueParams,
) -> Vec<TimingConstraint> {
    use Command::{
        Act, Pdea, Pdep, Pdxa, Pdxp, Preab, Prepb, Presb, Refab, Refp2b, Refpb, Refsb, Rfmab,
        Rfmp2b, Rfmpb, Rfmsb, Srefen, Srefex,
    };
    use ConstraintScope::{Bank, BankGroup, OtherRank, Rank};

    let mut cs = ConstraintSet::new();
    let reads = &Command::READS[..];
    let writes = &Command::WRITES[..];

    let write_recovery = t.wl + burst + t.wr;
    // Refresh-to-refresh spacing within a rank falls back to the per-bank
    // refresh cycle time on standards without an explicit tRREFD.
    let rrefd = if t.rrefd > SimTime::ZERO { t.rrefd } else { t.rfcpb };
    let act_rd = if t.rcdrd > SimTime::ZERO { t.rcdrd } else { t.rcd };
    let act_wr = if t.rcdwr > SimTime::ZERO { t.rcdwr } else { t.rcd };

    // Same-bank row cycle.
    cs.push(Act, Act, Bank, t.rc);
    cs.push(Act, Prepb, Bank, t.ras);
    cs.push(Act, Preab, Rank, t.ras);
    cs.push(Act, Presb, BankGroup, t.ras);
    // Auto-precharge commands wait only for tRCD; the device holds the internal
    // precharge until tRAS is met, and tRC covers the re-activation.
    cs.push_many(&[Act], reads, Bank, act_rd);
    cs.push_many(&[Act], writes, Bank, act_wr);

    // Precharge and re-activate.
    cs.push(Prepb, Act, Bank, t.rp);
    cs.push(Preab, Act, Rank, t.rp);
    cs.push(Presb, Act, BankGroup, t.rp);
    cs.push_many(reads, &[Prepb], Bank, t.rtp);
    cs.push_many(reads, &[Preab], Rank, t.rtp);
    cs.push_many(reads, &[Presb], BankGroup, t.rtp);
    cs.push_many(writes, &[Prepb], Bank, write_recovery);
    cs.push_many(writes, &[Preab], Rank, write_recovery);
    cs.push_many(writes, &[Presb], BankGroup, write_recovery);
    cs.push(Command::Rda, Act, Bank, t.rtp + t.rp);
    cs.push_many(
        &[Command::Wra, Command::Mwra],
        &[Act],
        Bank,
        write_recovery + t.rp,
    );

    // Activate spacing within a rank.
    if p.grouped {
        cs.push(Act, Act, Rank, t.rrds);
        cs.push(Act, Act, BankGroup, t.rrdl);
    } else {
        cs.push(Act, Act, Rank, t.rrd);
    }

    // CAS-to-CAS spacing and turnarounds within a rank.
    let (ccd_short, ccd_long) = if p.grouped {
        (t.ccds, t.ccdl)
    } else {
        (t.ccd, SimTime::ZERO)
    };
    cs.push_many(reads, reads, Rank, ccd_short);
    cs.push_many(writes, writes, Rank, ccd_short);
    if p.grouped {
        cs.push_many(reads, reads, BankGroup, ccd_long);
        cs.push_many(writes, writes, BankGroup, ccd_long);
    }
    // Read-to-write bus turnaround (issue-to-issue): the read burst plus one
    // bus bubble must drain before the write burst may start.
    let turnaround = t.rtrs.max(tck.times(2));
    let rtw = (t.rl + t.dqsck + burst + turnaround) - t.wl;
    cs.push_many(reads, writes, Rank, rtw);
    // Write-to-read turnaround.
    if p.grouped {
        cs.push_many(writes, reads, Rank, t.wl + burst + t.wtrs);
        cs.push_many(writes, reads, BankGroup, t.wl + burst + t.wtrl);
    } else {
        cs.push_many(writes, reads, Rank, t.wl + burst + t.wtr);
    }

    // Rank switch: the data bus needs tRTRS of idle between bursts on
    // different ranks.
    if t.rtrs > SimTime::ZERO {
        cs.push_many(reads, reads, OtherRank, burst + t.rtrs);
        cs.push_many(writes, writes, OtherRank, burst + t.rtrs);
        cs.push_many(reads, writes, OtherRank, (t.rl + t.dqsck + burst + t.rtrs) - t.wl);
        cs.push_many(writes, reads, OtherRank, (t.wl + burst + t.rtrs) - (t.rl + t.dqsck));
    }

    // All-bank refresh.
    let post_refab: &[Command] = &[Act, Refab, Refpb, Refsb, Refp2b, Srefen, Pdea, Pdep];
    cs.push_many(&[Refab], post_refab, Rank, t.rfc);
    cs.push(Prepb, Refab, Rank, t.rp);
    cs.push(Preab, Refab, Rank, t.rp);
    cs.push(Presb, Refab, Rank, t.rp);
    cs.push(Command::Rda, Refab, Rank, t.rtp + t.rp);
    cs.push_many(
        &[Command::Wra, Command::Mwra],
        &[Refab],
        Rank,
        write_recovery + t.rp,
    );

    // Scoped refresh variants.
    if p.refresh_pb {
        cs.push(Refpb, Act, Bank, t.rfcpb);
        cs.push(Refpb, Refpb, Bank, t.rfcpb);
        cs.push(Refpb, Refpb, Rank, rrefd);
        cs.push(Refpb, Act, Rank, if p.grouped { t.rrds } else { t.rrd });
        cs.push(Refpb, Refab, Rank, t.rfcpb);
        cs.push(Prepb, Refpb, Bank, t.rp);
        cs.push(Preab, Refpb, Rank, t.rp);
        cs.push(Command::Rda, Refpb, Bank, t.rtp + t.rp);
        cs.push_many(
            &[Command::Wra, Command::Mwra],
            &[Refpb],
            Bank,
            write_recovery + t.rp,
        );
    }
    if p.refresh_p2b {
        // Pair commands are recorded against both banks of the pair, so the
        // bank scope covers the whole pair.
        cs.push(Refp2b, Act, Bank, t.rfcp2b);
        cs.push(Refp2b, Refp2b, Rank, rrefd.max(t.rrd));
        cs.push(Refp2b, Refab, Rank, t.rfcp2b);
        cs.push(Refp2b, Act, Rank, t.rrd.max(t.rrds));
        cs.push(Prepb, Refp2b, Bank, t.rp);
        cs.push(Preab, Refp2b, Rank, t.rp);
    }
    if p.refresh_sb {
        // Same-bank commands are recorded against the whole same-bank set.
        cs.push(Refsb, Act, Bank, t.rfcsb);
        cs.push(Refsb, Refsb, Rank, rrefd.max(t.rfcsb));
        cs.push(Refsb, Refab, Rank, t.rfcsb);
        cs.push(Refsb, Act, Rank, t.rrds);
        cs.push(Prepb, Refsb, Bank, t.rp);
        cs.push(Presb, Refsb, Bank, t.rp);
        cs.push(Preab, Refsb, Rank, t.rp);
    }
    if p.rfm {
        cs.push(Rfmab, Act, Rank, t.rfc);
        cs.push(Rfmpb, Act, Bank, t.rfcpb);
        cs.push(Rfmsb, Act, Bank, t.rfcsb);
        cs.push(Rfmp2b, Act, Bank, t.rfcp2b);
        cs.push_many(&[Refab], &[Rfmab, Rfmpb, Rfmsb, Rfmp2b], Rank, t.rfc);
        cs.push(Prepb, Rfmpb, Bank, t.rp);
        cs.push(Presb, Rfmsb, Bank, t.rp);
        cs.push(Preab, Rfmab, Rank, t.rp);
    }

    // Power-down and self-refresh.
    let pd_entries: &[Command] = &[Pdea, Pdep, Srefen];
    cs.push(Act, Pdea, Rank, t.actpden);
    cs.push_many(&[Prepb, Preab, Presb], &[Pdep, Srefen], Rank, t.prpden);
    cs.push_many(
        &[Refab, Refpb, Refsb, Refp2b],
        &[Pdep, Pdea, Srefen],
        Rank,
        t.refpden,
    );
    cs.push_many(reads, pd_entries, Rank, t.rl + t.dqsck + burst);
    cs.push_many(writes, pd_entries, Rank, write_recovery);
    cs.push(Pdea, Pdxa, Rank, t.pd.max(t.cke));
    cs.push(Pdep, Pdxp, Rank, t.pd.max(t.cke));
    cs.push(Srefen, Srefex, Rank, t.ckesr);
    let wake: &[Command] = &[
        Act,
        Prepb,
        Preab,
        Presb,
        Refab,
        Refpb,
        Refsb,
        Refp2b,
        Command::Rd,
        Command::Wr,
        Command::Rda,
        Command::Wra,
        Command::Mwr,
        Command::Mwra,
        Pdea,
        Pdep,
        Srefen,
    ];
    cs.push_many(&[Pdxa, Pdxp], wake, Rank, t.xp);
    cs.push_many(&[Srefex], wake, Rank, t.xs);

    cs.into_rows()
}
