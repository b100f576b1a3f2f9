//! Per-bank state machines.
//!
//! A bank machine turns the scheduler's choice of pending request into the next
//! command candidate for its bank, under one of four page policies. The policies
//! share one skeleton and differ only in the CAS they propose on a row hit:
//!
//! | Policy         | Row hit CAS                                              |
//! |----------------|----------------------------------------------------------|
//! | Open           | RD/WR                                                    |
//! | OpenAdaptive   | RDA/WRA when no further hit to the open row is pending   |
//! | Closed         | RDA/WRA                                                  |
//! | ClosedAdaptive | RD/WR while further hits to the open row are pending     |
//!
//! `update` is only called for the command the multiplexer actually committed.

use tracing::trace;

use crate::common::coords::{Bank, BankGroup, Rank, Row};
use crate::common::time::SimTime;
use crate::common::transaction::{TransId, TransKind, TransactionPool};
use crate::config::PagePolicy;
use crate::controller::checker::Checker;
use crate::controller::command::{CmdTarget, Command, CommandTuple};
use crate::controller::scheduler::Scheduler;
use crate::memspec::MemSpec;

/// Row-buffer state of a bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BankState {
    /// No row open.
    Precharged,
    /// A row is latched in the sense amplifiers.
    Activated,
}

/// State machine for one bank.
#[derive(Debug)]
pub struct BankMachine {
    policy: PagePolicy,
    rank: Rank,
    bank_group: BankGroup,
    bank: Bank,
    state: BankState,
    open_row: Row,
    current: Option<TransId>,
    next_command: Command,
    time_to_schedule: SimTime,
    sleeping: bool,
    blocked: bool,
    /// Set after ACT: the activated request must be served before the payload
    /// may be swapped for one targeting a different row.
    keep_trans: bool,
    rm_counter: u64,
    refresh_management: bool,
    raa_refresh_credit: u64,
    raa_rfm_credit: u64,
}

impl BankMachine {
    /// Creates the machine for one bank.
    pub fn new(policy: PagePolicy, bank: Bank, memspec: &MemSpec, refresh_management: bool) -> Self {
        Self {
            policy,
            rank: bank.rank(memspec.banks_per_rank),
            bank_group: bank.group(memspec.banks_per_group),
            bank,
            state: BankState::Precharged,
            open_row: Row::NONE,
            current: None,
            next_command: Command::Nop,
            time_to_schedule: SimTime::NEVER,
            sleeping: false,
            blocked: false,
            keep_trans: false,
            rm_counter: 0,
            refresh_management,
            raa_refresh_credit: memspec.rfm.map_or(0, |r| r.raadec),
            raa_rfm_credit: memspec.rfm.map_or(0, |r| r.raaimt),
        }
    }

    /// Recomputes the next command candidate; returns the proposed wake time.
    pub fn evaluate(
        &mut self,
        scheduler: &Scheduler,
        checker: &Checker,
        pool: &TransactionPool,
        memspec: &MemSpec,
    ) -> SimTime {
        self.time_to_schedule = SimTime::NEVER;
        self.next_command = Command::Nop;

        if self.sleeping || self.blocked {
            return self.time_to_schedule;
        }

        let Some(candidate) = scheduler.next_request(self.bank, self.state, self.open_row, pool)
        else {
            return self.time_to_schedule;
        };

        debug_assert!(!self.keep_trans || self.current.is_some());
        if self.keep_trans {
            // The bank was activated for the current payload; only a request to
            // the already-open row may take its place.
            if pool.get(candidate).controller.row == self.open_row {
                self.current = Some(candidate);
            }
        } else {
            self.current = Some(candidate);
        }

        let Some(current) = self.current else {
            return self.time_to_schedule;
        };
        let trans = pool.get(current);

        match self.state {
            BankState::Precharged => self.next_command = Command::Act,
            BankState::Activated => {
                if trans.controller.row == self.open_row {
                    self.next_command = self.cas_choice(trans.kind, memspec.requires_masked_write(trans), scheduler, pool);
                } else {
                    // Row miss with a row open.
                    self.next_command = Command::Prepb;
                }
            }
        }

        self.time_to_schedule =
            checker.time_to_satisfy(self.next_command, self.rank, self.bank_group, self.bank);
        self.time_to_schedule
    }

    /// Picks the CAS flavour for a row hit under the configured page policy.
    fn cas_choice(
        &self,
        kind: TransKind,
        masked: bool,
        scheduler: &Scheduler,
        pool: &TransactionPool,
    ) -> Command {
        let auto_precharge = match self.policy {
            PagePolicy::Open => false,
            PagePolicy::Closed => true,
            PagePolicy::OpenAdaptive => {
                scheduler.has_further_request(self.bank)
                    && !scheduler.has_further_row_hit(self.bank, self.open_row, pool)
            }
            PagePolicy::ClosedAdaptive => {
                !scheduler.has_further_row_hit(self.bank, self.open_row, pool)
            }
        };
        match (kind, masked, auto_precharge) {
            (TransKind::Read, _, false) => Command::Rd,
            (TransKind::Read, _, true) => Command::Rda,
            (TransKind::Write, false, false) => Command::Wr,
            (TransKind::Write, false, true) => Command::Wra,
            (TransKind::Write, true, false) => Command::Mwr,
            (TransKind::Write, true, true) => Command::Mwra,
        }
    }

    /// Returns the current candidate, clamped to `now`, or `None` for NOP.
    pub fn next_command(&self, now: SimTime) -> Option<CommandTuple> {
        if self.next_command == Command::Nop || self.time_to_schedule.is_never() {
            return None;
        }
        Some(CommandTuple {
            command: self.next_command,
            target: CmdTarget {
                rank: self.rank,
                bank_group: self.bank_group,
                bank: self.bank,
                trans: self.current,
            },
            earliest: self.time_to_schedule.max(now),
        })
    }

    /// Applies the state transition for a committed command.
    pub fn update(&mut self, command: Command, pool: &TransactionPool) {
        trace!(bank = self.bank.idx(), %command, "bank update");
        match command {
            Command::Act => {
                self.state = BankState::Activated;
                self.open_row = self
                    .current
                    .map_or(Row::NONE, |id| pool.get(id).controller.row);
                self.keep_trans = true;
                self.rm_counter += 1;
            }
            Command::Prepb | Command::Presb | Command::Preab => {
                self.state = BankState::Precharged;
                self.open_row = Row::NONE;
                self.keep_trans = false;
            }
            Command::Rd | Command::Wr | Command::Mwr => {
                self.current = None;
                self.keep_trans = false;
            }
            Command::Rda | Command::Wra | Command::Mwra => {
                self.state = BankState::Precharged;
                self.open_row = Row::NONE;
                self.current = None;
                self.keep_trans = false;
            }
            Command::Pdea | Command::Pdep | Command::Srefen => {
                debug_assert!(!self.keep_trans);
                self.sleeping = true;
            }
            Command::Refpb | Command::Refp2b | Command::Refsb | Command::Refab => {
                self.sleeping = false;
                self.blocked = false;
                if self.refresh_management {
                    self.rm_counter = self.rm_counter.saturating_sub(self.raa_refresh_credit);
                }
            }
            Command::Rfmpb | Command::Rfmp2b | Command::Rfmsb | Command::Rfmab => {
                debug_assert!(!self.keep_trans);
                self.sleeping = false;
                self.blocked = false;
                if self.refresh_management {
                    self.rm_counter = self.rm_counter.saturating_sub(self.raa_rfm_credit);
                }
            }
            Command::Pdxa | Command::Pdxp => {
                debug_assert!(!self.keep_trans);
                self.sleeping = false;
            }
            _ => {}
        }
    }

    /// Claims the bank for a forced refresh: no candidate until the refresh issues.
    pub fn block(&mut self) {
        self.blocked = true;
        self.time_to_schedule = SimTime::NEVER;
        self.next_command = Command::Nop;
    }

    /// Rank that owns this bank.
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Bank group that owns this bank.
    pub fn bank_group(&self) -> BankGroup {
        self.bank_group
    }

    /// This machine's bank.
    pub fn bank(&self) -> Bank {
        self.bank
    }

    /// Row currently open, or `Row::NONE`.
    pub fn open_row(&self) -> Row {
        self.open_row
    }

    /// `true` while no payload is being served.
    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    /// `true` while a row is open.
    pub fn is_activated(&self) -> bool {
        self.state == BankState::Activated
    }

    /// `true` while no row is open.
    pub fn is_precharged(&self) -> bool {
        self.state == BankState::Precharged
    }

    /// Rolling row-activation counter for refresh management.
    pub fn rm_counter(&self) -> u64 {
        self.rm_counter
    }
}
