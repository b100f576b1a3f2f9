//! Per-rank power-down management.
//!
//! The staggered policy waits a configurable number of idle cycles after the
//! rank's in-flight count drops to zero, then enters active or precharged
//! power-down. A refresh falling due while the rank is powered down interrupts
//! it (PDX*); when the rank keeps idling after such an interruption the next
//! entry escalates to self refresh, which serves the refresh obligation
//! internally. Self-refresh exit is followed by one REFAB that re-anchors the
//! refresh manager's schedule.

use tracing::debug;

use crate::common::coords::{Bank, BankGroup, Rank};
use crate::common::time::SimTime;
use crate::config::{McConfig, PowerDownPolicy};
use crate::controller::bank_machine::BankMachine;
use crate::controller::checker::Checker;
use crate::controller::command::{CmdTarget, Command, CommandTuple};
use crate::memspec::MemSpec;

/// Coarse power state of a rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PdState {
    /// Awake; commands flow normally.
    Active,
    /// Idle; waiting out the entry timeout.
    EntryPending,
    /// Powered down with at least one row open.
    ActivePowerDown,
    /// Powered down with all banks precharged.
    PrechargedPowerDown,
    /// In self refresh; the device refreshes itself.
    SelfRefresh,
}

/// Per-rank power-down manager.
#[derive(Debug)]
pub enum PowerDownManager {
    /// Never enters a low-power state.
    Disabled,
    /// Timeout-based entry, interruption-aware exit.
    Staggered(Staggered),
}

/// State of the staggered policy.
#[derive(Debug)]
pub struct Staggered {
    rank: Rank,
    state: PdState,
    /// Time the entry trigger fired.
    entry_armed_at: SimTime,
    timeout: SimTime,
    /// Power-down exits forced by a due refresh since the last real activity.
    interruptions: u32,
    exit_requested: bool,
    interrupt_requested: bool,
    /// One REFAB is owed right after self-refresh exit.
    refab_due: bool,
    next_command: Command,
    time_to_schedule: SimTime,
    target_bank: Bank,
    target_group: BankGroup,
}

impl PowerDownManager {
    /// Builds the manager for one rank under the configured policy.
    pub fn new(config: &McConfig, memspec: &MemSpec, rank: Rank) -> Self {
        match config.power_down_policy {
            PowerDownPolicy::NoPowerDown => Self::Disabled,
            PowerDownPolicy::Staggered => Self::Staggered(Staggered {
                rank,
                state: PdState::Active,
                entry_armed_at: SimTime::NEVER,
                timeout: memspec.tck.times(config.power_down_timeout),
                interruptions: 0,
                exit_requested: false,
                interrupt_requested: false,
                refab_due: false,
                next_command: Command::Nop,
                time_to_schedule: SimTime::NEVER,
                target_bank: Bank(rank.idx() * memspec.banks_per_rank),
                target_group: BankGroup(rank.idx() * memspec.groups_per_rank),
            }),
        }
    }

    /// The rank's in-flight count dropped to zero.
    pub fn trigger_entry(&mut self, now: SimTime) {
        if let Self::Staggered(m) = self {
            if m.state == PdState::Active {
                m.state = PdState::EntryPending;
                m.entry_armed_at = now;
            }
        }
    }

    /// The rank's in-flight count rose from zero.
    pub fn trigger_exit(&mut self) {
        if let Self::Staggered(m) = self {
            match m.state {
                PdState::EntryPending => {
                    m.state = PdState::Active;
                    m.interruptions = 0;
                }
                PdState::ActivePowerDown | PdState::PrechargedPowerDown | PdState::SelfRefresh => {
                    m.exit_requested = true;
                }
                PdState::Active => {}
            }
        }
    }

    /// A refresh is due while the rank is (or is about to be) powered down.
    pub fn trigger_interruption(&mut self) {
        if let Self::Staggered(m) = self {
            match m.state {
                PdState::ActivePowerDown | PdState::PrechargedPowerDown => {
                    m.interrupt_requested = true;
                }
                // Self refresh serves the obligation internally.
                _ => {}
            }
        }
    }

    /// Recomputes the power candidate; returns the proposed wake time.
    pub fn evaluate(&mut self, now: SimTime, banks: &[BankMachine], checker: &Checker) -> SimTime {
        let Self::Staggered(m) = self else {
            return SimTime::NEVER;
        };
        m.next_command = Command::Nop;
        m.time_to_schedule = SimTime::NEVER;

        match m.state {
            PdState::Active => {
                if m.refab_due {
                    m.propose(Command::Refab, checker);
                    return m.time_to_schedule;
                }
                SimTime::NEVER
            }
            PdState::EntryPending => {
                let due = m.entry_armed_at + m.timeout;
                if now < due {
                    return due;
                }
                let entry = if banks.iter().any(BankMachine::is_activated) {
                    Command::Pdea
                } else if m.interruptions > 0 {
                    // Refresh already interrupted one power-down on this idle
                    // stretch; self refresh rides out long idle periods.
                    Command::Srefen
                } else {
                    Command::Pdep
                };
                m.propose(entry, checker);
                m.time_to_schedule
            }
            PdState::ActivePowerDown => {
                if m.exit_requested || m.interrupt_requested {
                    m.propose(Command::Pdxa, checker);
                }
                m.time_to_schedule
            }
            PdState::PrechargedPowerDown => {
                if m.exit_requested || m.interrupt_requested {
                    m.propose(Command::Pdxp, checker);
                }
                m.time_to_schedule
            }
            PdState::SelfRefresh => {
                if m.exit_requested {
                    m.propose(Command::Srefex, checker);
                }
                m.time_to_schedule
            }
        }
    }

    /// Returns the current candidate, clamped to `now`, or `None` for NOP.
    pub fn next_command(&self, now: SimTime) -> Option<CommandTuple> {
        let Self::Staggered(m) = self else {
            return None;
        };
        if m.next_command == Command::Nop {
            return None;
        }
        Some(CommandTuple {
            command: m.next_command,
            target: CmdTarget {
                rank: m.rank,
                bank_group: m.target_group,
                bank: m.target_bank,
                trans: None,
            },
            earliest: m.time_to_schedule.max(now),
        })
    }

    /// Applies the state transition for a committed command on this rank.
    pub fn update(&mut self, command: Command, now: SimTime) {
        let Self::Staggered(m) = self else {
            return;
        };
        match command {
            Command::Pdea => m.state = PdState::ActivePowerDown,
            Command::Pdep => m.state = PdState::PrechargedPowerDown,
            Command::Srefen => {
                debug!(rank = m.rank.idx(), "self-refresh entry");
                m.state = PdState::SelfRefresh;
            }
            Command::Pdxa | Command::Pdxp => {
                if m.exit_requested {
                    // Real traffic woke the rank.
                    m.state = PdState::Active;
                    m.exit_requested = false;
                    m.interrupt_requested = false;
                    m.interruptions = 0;
                } else if m.interrupt_requested {
                    // Woken only to refresh; re-arm entry once the refresh is
                    // out, and remember the interruption for escalation.
                    m.state = PdState::EntryPending;
                    m.entry_armed_at = now;
                    m.interrupt_requested = false;
                    m.interruptions += 1;
                } else {
                    m.state = PdState::Active;
                }
            }
            Command::Srefex => {
                m.state = PdState::Active;
                m.exit_requested = false;
                m.refab_due = true;
            }
            Command::Refab => {
                if m.refab_due {
                    // Refresh schedule re-anchored; the exit is complete.
                    m.refab_due = false;
                    m.interruptions = 0;
                }
            }
            _ => {}
        }
    }

    /// `true` while the rank is in any low-power state.
    pub fn is_powered_down(&self) -> bool {
        match self {
            Self::Disabled => false,
            Self::Staggered(m) => matches!(
                m.state,
                PdState::ActivePowerDown | PdState::PrechargedPowerDown | PdState::SelfRefresh
            ),
        }
    }
}

impl Staggered {
    fn propose(&mut self, command: Command, checker: &Checker) {
        self.next_command = command;
        self.time_to_schedule =
            checker.time_to_satisfy(command, self.rank, self.target_group, self.target_bank);
    }
}
