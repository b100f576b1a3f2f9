//! The DRAM command alphabet.
//!
//! This module defines the closed set of commands a controller can emit, together
//! with the classifications the timing checker and controller dispatch rely on:
//! 1. **Scope:** bank, bank-group, or rank commands (rank commands update every
//!    bank machine on the rank).
//! 2. **Class:** CAS (column access) vs RAS (row/maintenance) commands.
//! 3. **Phases:** the downstream phase name of each command, and whether the
//!    phase pair has an `END_*` counterpart.

use crate::common::coords::{Bank, BankGroup, Rank};
use crate::common::time::SimTime;
use crate::common::transaction::TransId;

/// A DRAM command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(usize)]
pub enum Command {
    /// No operation (nothing scheduleable this cycle).
    Nop,
    /// Column read.
    Rd,
    /// Column write.
    Wr,
    /// Column read with auto-precharge.
    Rda,
    /// Column write with auto-precharge.
    Wra,
    /// Masked column write.
    Mwr,
    /// Masked column write with auto-precharge.
    Mwra,
    /// Precharge one bank.
    Prepb,
    /// Precharge all banks of a rank.
    Preab,
    /// Precharge the same-bank set across bank groups.
    Presb,
    /// Activate a row.
    Act,
    /// Refresh one bank.
    Refpb,
    /// Refresh all banks of a rank.
    Refab,
    /// Refresh the same-bank set across bank groups.
    Refsb,
    /// Refresh a bank pair.
    Refp2b,
    /// Refresh-management command, one bank.
    Rfmpb,
    /// Refresh-management command, all banks.
    Rfmab,
    /// Refresh-management command, same-bank set.
    Rfmsb,
    /// Refresh-management command, bank pair.
    Rfmp2b,
    /// Power-down entry with a row active.
    Pdea,
    /// Power-down exit from active power-down.
    Pdxa,
    /// Power-down entry with all banks precharged.
    Pdep,
    /// Power-down exit from precharged power-down.
    Pdxp,
    /// Self-refresh entry.
    Srefen,
    /// Self-refresh exit.
    Srefex,
}

impl Command {
    /// Number of commands (table dimension for the checker).
    pub const COUNT: usize = 25;

    /// All read-class CAS commands.
    pub const READS: [Self; 2] = [Self::Rd, Self::Rda];
    /// All write-class CAS commands.
    pub const WRITES: [Self; 4] = [Self::Wr, Self::Wra, Self::Mwr, Self::Mwra];
    /// All CAS commands.
    pub const CAS: [Self; 6] = [
        Self::Rd,
        Self::Wr,
        Self::Rda,
        Self::Wra,
        Self::Mwr,
        Self::Mwra,
    ];
    /// CAS commands with auto-precharge.
    pub const CAS_AP: [Self; 3] = [Self::Rda, Self::Wra, Self::Mwra];

    /// Returns the table index of this command.
    #[inline(always)]
    pub fn idx(self) -> usize {
        self as usize
    }

    /// Returns `true` for commands addressed to a single bank.
    pub fn is_bank(self) -> bool {
        matches!(
            self,
            Self::Rd
                | Self::Wr
                | Self::Rda
                | Self::Wra
                | Self::Mwr
                | Self::Mwra
                | Self::Prepb
                | Self::Act
                | Self::Refpb
                | Self::Rfmpb
        )
    }

    /// Returns `true` for commands addressed to a same-bank set across groups.
    pub fn is_group(self) -> bool {
        matches!(
            self,
            Self::Presb | Self::Refsb | Self::Rfmsb | Self::Refp2b | Self::Rfmp2b
        )
    }

    /// Returns `true` for commands addressed to a whole rank.
    pub fn is_rank(self) -> bool {
        matches!(
            self,
            Self::Preab
                | Self::Refab
                | Self::Rfmab
                | Self::Pdea
                | Self::Pdxa
                | Self::Pdep
                | Self::Pdxp
                | Self::Srefen
                | Self::Srefex
        )
    }

    /// Returns `true` for column accesses (they occupy the data bus).
    pub fn is_cas(self) -> bool {
        matches!(
            self,
            Self::Rd | Self::Wr | Self::Rda | Self::Wra | Self::Mwr | Self::Mwra
        )
    }

    /// Returns `true` for read-class CAS commands.
    pub fn is_read(self) -> bool {
        matches!(self, Self::Rd | Self::Rda)
    }

    /// Returns `true` for write-class CAS commands.
    pub fn is_write(self) -> bool {
        matches!(self, Self::Wr | Self::Wra | Self::Mwr | Self::Mwra)
    }

    /// Returns `true` for CAS commands that auto-precharge their bank.
    pub fn auto_precharges(self) -> bool {
        matches!(self, Self::Rda | Self::Wra | Self::Mwra)
    }

    /// Returns `true` for row/maintenance commands (ACT, PRE*, REF*, RFM*).
    pub fn is_ras(self) -> bool {
        matches!(
            self,
            Self::Prepb
                | Self::Preab
                | Self::Presb
                | Self::Act
                | Self::Refpb
                | Self::Refab
                | Self::Refsb
                | Self::Refp2b
                | Self::Rfmpb
                | Self::Rfmab
                | Self::Rfmsb
                | Self::Rfmp2b
        )
    }

    /// Returns `true` for refresh-class commands (REF* and RFM*).
    pub fn is_refresh(self) -> bool {
        matches!(
            self,
            Self::Refpb
                | Self::Refab
                | Self::Refsb
                | Self::Refp2b
                | Self::Rfmpb
                | Self::Rfmab
                | Self::Rfmsb
                | Self::Rfmp2b
        )
    }

    /// Returns `true` for power-state commands (PDE*, PDX*, SREF*).
    pub fn is_power(self) -> bool {
        matches!(
            self,
            Self::Pdea | Self::Pdxa | Self::Pdep | Self::Pdxp | Self::Srefen | Self::Srefex
        )
    }

    /// Returns the downstream `BEGIN_*` phase name of this command.
    ///
    /// # Panics
    ///
    /// Panics for [`Command::Nop`], which is never emitted downstream.
    pub fn begin_phase(self) -> &'static str {
        match self {
            Self::Nop => panic!("NOP has no downstream phase"),
            Self::Rd => "BEGIN_RD",
            Self::Wr => "BEGIN_WR",
            Self::Rda => "BEGIN_RDA",
            Self::Wra => "BEGIN_WRA",
            Self::Mwr => "BEGIN_MWR",
            Self::Mwra => "BEGIN_MWRA",
            Self::Prepb => "BEGIN_PREPB",
            Self::Preab => "BEGIN_PREAB",
            Self::Presb => "BEGIN_PRESB",
            Self::Act => "BEGIN_ACT",
            Self::Refpb => "BEGIN_REFPB",
            Self::Refab => "BEGIN_REFAB",
            Self::Refsb => "BEGIN_REFSB",
            Self::Refp2b => "BEGIN_REFP2B",
            Self::Rfmpb => "BEGIN_RFMPB",
            Self::Rfmab => "BEGIN_RFMAB",
            Self::Rfmsb => "BEGIN_RFMSB",
            Self::Rfmp2b => "BEGIN_RFMP2B",
            Self::Pdea => "BEGIN_PDNA",
            Self::Pdxa => "END_PDNA",
            Self::Pdep => "BEGIN_PDNP",
            Self::Pdxp => "END_PDNP",
            Self::Srefen => "BEGIN_SREF",
            Self::Srefex => "END_SREF",
        }
    }

    /// Returns `true` if the command's phase pair has an `END_*` counterpart
    /// (power-state transitions are instantaneous edges and have none).
    pub fn needs_end_phase(self) -> bool {
        !self.is_power() && self != Self::Nop
    }

    /// Returns the JEDEC mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Rd => "RD",
            Self::Wr => "WR",
            Self::Rda => "RDA",
            Self::Wra => "WRA",
            Self::Mwr => "MWR",
            Self::Mwra => "MWRA",
            Self::Prepb => "PREPB",
            Self::Preab => "PREAB",
            Self::Presb => "PRESB",
            Self::Act => "ACT",
            Self::Refpb => "REFPB",
            Self::Refab => "REFAB",
            Self::Refsb => "REFSB",
            Self::Refp2b => "REFP2B",
            Self::Rfmpb => "RFMPB",
            Self::Rfmab => "RFMAB",
            Self::Rfmsb => "RFMSB",
            Self::Rfmp2b => "RFMP2B",
            Self::Pdea => "PDEA",
            Self::Pdxa => "PDXA",
            Self::Pdep => "PDEP",
            Self::Pdxp => "PDXP",
            Self::Srefen => "SREFEN",
            Self::Srefex => "SREFEX",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Target coordinate of a command candidate.
///
/// Bank-machine candidates reference the transaction they serve; refresh and
/// power-down candidates carry coordinates only.
#[derive(Clone, Copy, Debug)]
pub struct CmdTarget {
    /// Target rank.
    pub rank: Rank,
    /// Target bank group (channel-global numbering).
    pub bank_group: BankGroup,
    /// Target bank (channel-global numbering).
    pub bank: Bank,
    /// Transaction served by this command, if any.
    pub trans: Option<TransId>,
}

/// A ready command candidate: what, where, and the earliest legal issue time.
#[derive(Clone, Copy, Debug)]
pub struct CommandTuple {
    /// The proposed command.
    pub command: Command,
    /// Its target coordinate.
    pub target: CmdTarget,
    /// Earliest time the command may issue (never before "now").
    pub earliest: SimTime,
}
