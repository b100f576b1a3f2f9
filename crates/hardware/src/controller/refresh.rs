//! Per-rank refresh management.
//!
//! Every refresh interval a refresh becomes due for the policy's scope. The
//! manager may postpone it while the banks are busy, or pull the next one in
//! while they are idle, inside a flexibility budget of
//! `[-max_pulledin * n, +max_postponed * n]` where `n` is the number of refresh
//! commands per full rotation. At the postpone limit the refresh is forced: the
//! affected banks are blocked and the refresh bypasses request scheduling.
//!
//! Policies: all-bank (REFAB on the whole rank), per-bank (rotating REFPB),
//! per-2-bank (rotating REFP2B pairs), and same-bank (REFSB sets across bank
//! groups, optionally with RFM refresh management on the activate counters).
//!
//! First triggers are staggered across ranks by bit-reversed rank index so
//! multi-rank refreshes do not collide. Entering self refresh stops the
//! manager's clock; the first REFAB after the exit re-anchors it.

use tracing::debug;

use crate::common::coords::{Bank, BankGroup, Rank};
use crate::common::time::SimTime;
use crate::common::ConfigError;
use crate::config::{McConfig, RefreshPolicy};
use crate::controller::bank_machine::BankMachine;
use crate::controller::checker::Checker;
use crate::controller::command::{CmdTarget, Command, CommandTuple};
use crate::controller::power_down::PowerDownManager;
use crate::memspec::{MemSpec, RfmSpec};

/// Whether the manager is on schedule or running ahead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// The next refresh is owed at the trigger time.
    Regular,
    /// Refreshes are being pulled in while the rank idles.
    PulledIn,
}

/// State shared by every refresh policy.
#[derive(Debug)]
struct Core {
    rank: Rank,
    interval: SimTime,
    time_for_next_trigger: SimTime,
    phase: Phase,
    flexibility: i64,
    max_postponed: i64,
    /// Negative bound of the flexibility counter.
    max_pulledin: i64,
    sleeping: bool,
    next_command: Command,
    time_to_schedule: SimTime,
    target_bank: Bank,
    target_group: BankGroup,
}

impl Core {
    fn new(rank: Rank, interval: SimTime, per_rotation: i64, config: &McConfig, memspec: &MemSpec) -> Self {
        Self {
            rank,
            interval,
            time_for_next_trigger: first_trigger(
                memspec.tck,
                interval,
                rank,
                memspec.ranks_per_channel,
            ),
            phase: Phase::Regular,
            flexibility: 0,
            max_postponed: i64::from(config.refresh_max_postponed) * per_rotation,
            max_pulledin: -i64::from(config.refresh_max_pulledin) * per_rotation,
            sleeping: false,
            next_command: Command::Nop,
            time_to_schedule: SimTime::NEVER,
            target_bank: Bank(rank.idx() * memspec.banks_per_rank),
            target_group: BankGroup(rank.idx() * memspec.groups_per_rank),
        }
    }

    fn clear_candidate(&mut self) {
        self.next_command = Command::Nop;
        self.time_to_schedule = SimTime::NEVER;
    }

    /// One refresh worth of credit after a refresh command was issued.
    fn credit_refresh(&mut self) {
        if self.phase == Phase::PulledIn {
            self.flexibility -= 1;
        } else {
            self.phase = Phase::PulledIn;
        }
        if self.flexibility == self.max_pulledin {
            self.phase = Phase::Regular;
            self.time_for_next_trigger += self.interval;
        }
    }

    /// Re-anchors the schedule on the first REFAB after self-refresh exit.
    fn reanchor(&mut self, now: SimTime) {
        self.phase = Phase::Regular;
        self.time_for_next_trigger = now + self.interval;
        self.sleeping = false;
    }

    fn sleep_update(&mut self, command: Command) {
        match command {
            Command::Pdea | Command::Pdep => self.sleeping = true,
            Command::Srefen => {
                self.sleeping = true;
                self.time_for_next_trigger = SimTime::NEVER;
            }
            Command::Pdxa | Command::Pdxp => self.sleeping = false,
            _ => {}
        }
    }
}

/// First trigger time, staggered across ranks by bit-reversed rank index.
fn first_trigger(tck: SimTime, interval: SimTime, rank: Rank, num_ranks: usize) -> SimTime {
    let bits = num_ranks.trailing_zeros();
    let mut reversed = 0_usize;
    let mut id = rank.idx();
    for bit in (0..bits).rev() {
        reversed |= (id & 1) << bit;
        id >>= 1;
    }
    let offset = SimTime::from_ps(interval.ps() / num_ranks as u64).times(reversed as u64);
    (interval - offset).align_up(tck)
}

/// Per-rank refresh manager.
#[derive(Debug)]
pub enum RefreshManager {
    /// No refresh commands are ever generated.
    Disabled,
    /// REFAB on the whole rank.
    AllBank(AllBank),
    /// Rotating single-bank REFPB.
    PerBank(PerBank),
    /// Rotating REFP2B over bank pairs.
    Per2Bank(Per2Bank),
    /// REFSB over same-bank sets, optionally with RFM.
    SameBank(SameBank),
}

/// All-bank refresh state.
#[derive(Debug)]
pub struct AllBank {
    core: Core,
}

/// Per-bank refresh state.
#[derive(Debug)]
pub struct PerBank {
    core: Core,
    /// In-rank indices still owed a refresh in this rotation.
    remaining: Vec<usize>,
    /// In-rank index of the selected bank.
    current: usize,
    skip_selection: bool,
    banks_per_rank: usize,
}

/// Per-2-bank refresh state.
#[derive(Debug)]
pub struct Per2Bank {
    core: Core,
    remaining: Vec<[usize; 2]>,
    current: [usize; 2],
    skip_selection: bool,
    banks_per_rank: usize,
    offset: usize,
}

/// Pair list (0, o), (1, o+1), ... for each block of `2 * o` banks.
fn bank_pairs(banks_per_rank: usize, offset: usize) -> Vec<[usize; 2]> {
    let mut pairs = Vec::with_capacity(banks_per_rank / 2);
    let mut outer = 0;
    while outer < banks_per_rank {
        for b in outer..outer + offset {
            pairs.push([b, b + offset]);
        }
        outer += offset * 2;
    }
    pairs
}

/// Same-bank refresh state.
#[derive(Debug)]
pub struct SameBank {
    core: Core,
    /// All same-bank sets (one per in-group index, spanning every group).
    all_sets: Vec<Vec<usize>>,
    remaining: Vec<Vec<usize>>,
    current: Vec<usize>,
    skip_selection: bool,
    rfm: Option<RfmSpec>,
}

impl RefreshManager {
    /// Builds the manager for one rank under the configured policy.
    ///
    /// # Errors
    ///
    /// Fails when the standard does not offer the selected refresh scope.
    pub fn new(config: &McConfig, memspec: &MemSpec, rank: Rank) -> Result<Self, ConfigError> {
        match config.refresh_policy {
            RefreshPolicy::NoRefresh => Ok(Self::Disabled),
            RefreshPolicy::AllBank => {
                let interval = memspec.refresh_interval_ab()?;
                Ok(Self::AllBank(AllBank {
                    core: Core::new(rank, interval, 1, config, memspec),
                }))
            }
            RefreshPolicy::PerBank => {
                let interval = memspec.refresh_interval_pb()?;
                let n = memspec.banks_per_rank;
                Ok(Self::PerBank(PerBank {
                    core: Core::new(rank, interval, n as i64, config, memspec),
                    remaining: (0..n).collect(),
                    current: 0,
                    skip_selection: false,
                    banks_per_rank: n,
                }))
            }
            RefreshPolicy::Per2Bank => {
                let interval = memspec.refresh_interval_p2b()?;
                let n = memspec.banks_per_rank;
                let offset = memspec.per2bank_offset;
                if offset == 0 {
                    return Err(ConfigError::unsupported(
                        "RefreshManager",
                        "standard has no per-2-bank pairing",
                    ));
                }
                let pairs = bank_pairs(n, offset);
                Ok(Self::Per2Bank(Per2Bank {
                    core: Core::new(rank, interval, (n / 2) as i64, config, memspec),
                    current: pairs[0],
                    remaining: pairs,
                    skip_selection: false,
                    banks_per_rank: n,
                    offset,
                }))
            }
            RefreshPolicy::SameBank => {
                let interval = memspec.refresh_interval_sb()?;
                let per_group = memspec.banks_per_group;
                let groups = memspec.groups_per_rank;
                // Set i holds bank i of every group: (0, 4, 8, ...), (1, 5, 9, ...).
                let all_sets: Vec<Vec<usize>> = (0..per_group)
                    .map(|i| (0..groups).map(|g| g * per_group + i).collect())
                    .collect();
                let rfm = if config.refresh_management {
                    Some(memspec.rfm.ok_or_else(|| {
                        ConfigError::unsupported(
                            "RefreshManager",
                            "refresh management enabled but the standard has no RAA thresholds",
                        )
                    })?)
                } else {
                    None
                };
                Ok(Self::SameBank(SameBank {
                    core: Core::new(rank, interval, per_group as i64, config, memspec),
                    current: all_sets[0].clone(),
                    remaining: all_sets.clone(),
                    all_sets,
                    skip_selection: false,
                    rfm,
                }))
            }
        }
    }

    /// Recomputes the refresh candidate; returns the proposed wake time.
    ///
    /// `banks` is this rank's slice of bank machines, indexed by in-rank index.
    pub fn evaluate(
        &mut self,
        now: SimTime,
        banks: &mut [BankMachine],
        power_down: &mut PowerDownManager,
        checker: &Checker,
    ) -> SimTime {
        match self {
            Self::Disabled => SimTime::NEVER,
            Self::AllBank(m) => m.evaluate(now, banks, power_down, checker),
            Self::PerBank(m) => m.evaluate(now, banks, power_down, checker),
            Self::Per2Bank(m) => m.evaluate(now, banks, power_down, checker),
            Self::SameBank(m) => m.evaluate(now, banks, power_down, checker),
        }
    }

    /// Returns the current candidate, clamped to `now`, or `None` for NOP.
    pub fn next_command(&self, now: SimTime) -> Option<CommandTuple> {
        let core = match self {
            Self::Disabled => return None,
            Self::AllBank(m) => &m.core,
            Self::PerBank(m) => &m.core,
            Self::Per2Bank(m) => &m.core,
            Self::SameBank(m) => &m.core,
        };
        if core.next_command == Command::Nop {
            return None;
        }
        Some(CommandTuple {
            command: core.next_command,
            target: CmdTarget {
                rank: core.rank,
                bank_group: core.target_group,
                bank: core.target_bank,
                trans: None,
            },
            earliest: core.time_to_schedule.max(now),
        })
    }

    /// Applies the state transition for a committed command on this rank.
    pub fn update(&mut self, command: Command, now: SimTime) {
        match self {
            Self::Disabled => {}
            Self::AllBank(m) => m.update(command, now),
            Self::PerBank(m) => m.update(command, now),
            Self::Per2Bank(m) => m.update(command, now),
            Self::SameBank(m) => m.update(command, now),
        }
    }
}

impl AllBank {
    fn evaluate(
        &mut self,
        now: SimTime,
        banks: &mut [BankMachine],
        power_down: &mut PowerDownManager,
        checker: &Checker,
    ) -> SimTime {
        let core = &mut self.core;
        core.clear_candidate();

        if now < core.time_for_next_trigger {
            return core.time_for_next_trigger;
        }
        power_down.trigger_interruption();
        if core.sleeping {
            return SimTime::NEVER;
        }
        if now >= core.time_for_next_trigger + core.interval {
            core.time_for_next_trigger += core.interval;
            core.phase = Phase::Regular;
        }

        let busy = banks.iter().any(|b| !b.is_idle());
        if core.phase == Phase::Regular {
            if core.flexibility == core.max_postponed {
                // Forced refresh: claim every bank.
                for bank in banks.iter_mut() {
                    bank.block();
                }
            } else if busy {
                core.flexibility += 1;
                core.time_for_next_trigger += core.interval;
                debug!(rank = core.rank.idx(), postponed = core.flexibility, "refresh postponed");
                return core.time_for_next_trigger;
            }
        } else if busy {
            core.phase = Phase::Regular;
            core.time_for_next_trigger += core.interval;
            return core.time_for_next_trigger;
        }

        core.next_command = if banks.iter().any(BankMachine::is_activated) {
            Command::Preab
        } else {
            Command::Refab
        };
        core.time_to_schedule = checker.time_to_satisfy(
            core.next_command,
            core.rank,
            core.target_group,
            core.target_bank,
        );
        core.time_to_schedule
    }

    fn update(&mut self, command: Command, now: SimTime) {
        let core = &mut self.core;
        match command {
            Command::Refab => {
                if core.sleeping {
                    core.reanchor(now);
                } else {
                    core.credit_refresh();
                }
            }
            _ => core.sleep_update(command),
        }
    }
}

impl PerBank {
    fn evaluate(
        &mut self,
        now: SimTime,
        banks: &mut [BankMachine],
        power_down: &mut PowerDownManager,
        checker: &Checker,
    ) -> SimTime {
        let core = &mut self.core;
        core.clear_candidate();

        if now < core.time_for_next_trigger {
            return core.time_for_next_trigger;
        }
        power_down.trigger_interruption();
        if core.sleeping {
            return SimTime::NEVER;
        }
        if now >= core.time_for_next_trigger + core.interval {
            core.time_for_next_trigger += core.interval;
            core.phase = Phase::Regular;
        }

        let forced = core.phase == Phase::Regular && core.flexibility == core.max_postponed;
        let mut all_busy = true;
        if !self.skip_selection {
            self.current = self.remaining[0];
            for &idx in &self.remaining {
                if banks[idx].is_idle() {
                    self.current = idx;
                    all_busy = false;
                    break;
                }
            }
        }

        if all_busy && !forced && !self.skip_selection {
            if core.phase == Phase::Regular {
                core.flexibility += 1;
            } else {
                core.phase = Phase::Regular;
            }
            core.time_for_next_trigger += core.interval;
            return core.time_for_next_trigger;
        }

        let selected = &mut banks[self.current];
        core.target_bank = selected.bank();
        core.target_group = selected.bank_group();
        if selected.is_activated() {
            core.next_command = Command::Prepb;
        } else {
            core.next_command = Command::Refpb;
            if forced {
                selected.block();
                self.skip_selection = true;
            }
        }
        core.time_to_schedule = checker.time_to_satisfy(
            core.next_command,
            core.rank,
            core.target_group,
            core.target_bank,
        );
        core.time_to_schedule
    }

    fn update(&mut self, command: Command, now: SimTime) {
        let core = &mut self.core;
        match command {
            Command::Refpb => {
                self.skip_selection = false;
                self.remaining.retain(|&idx| idx != self.current);
                if self.remaining.is_empty() {
                    // Full rotation served; start over.
                    self.remaining = (0..self.banks_per_rank).collect();
                }
                core.credit_refresh();
            }
            Command::Refab => {
                core.reanchor(now);
                self.remaining = (0..self.banks_per_rank).collect();
                self.skip_selection = false;
            }
            _ => core.sleep_update(command),
        }
    }
}

impl Per2Bank {
    fn evaluate(
        &mut self,
        now: SimTime,
        banks: &mut [BankMachine],
        power_down: &mut PowerDownManager,
        checker: &Checker,
    ) -> SimTime {
        let core = &mut self.core;
        core.clear_candidate();

        if now < core.time_for_next_trigger {
            return core.time_for_next_trigger;
        }
        power_down.trigger_interruption();
        if core.sleeping {
            return SimTime::NEVER;
        }
        if now >= core.time_for_next_trigger + core.interval {
            core.time_for_next_trigger += core.interval;
            core.phase = Phase::Regular;
        }

        let forced = core.phase == Phase::Regular && core.flexibility == core.max_postponed;
        let mut all_busy = true;
        if !self.skip_selection {
            self.current = self.remaining[0];
            for &pair in &self.remaining {
                if pair.iter().all(|&idx| banks[idx].is_idle()) {
                    self.current = pair;
                    all_busy = false;
                    break;
                }
            }
        }

        if all_busy && !forced && !self.skip_selection {
            if core.phase == Phase::Regular {
                core.flexibility += 1;
            } else {
                core.phase = Phase::Regular;
            }
            core.time_for_next_trigger += core.interval;
            return core.time_for_next_trigger;
        }

        // Refresh the pair, or first precharge whichever member is active.
        core.next_command = Command::Refp2b;
        core.target_bank = banks[self.current[0]].bank();
        core.target_group = banks[self.current[0]].bank_group();
        for &idx in &self.current {
            if banks[idx].is_activated() {
                core.next_command = Command::Prepb;
                core.target_bank = banks[idx].bank();
                core.target_group = banks[idx].bank_group();
                break;
            }
        }

        if core.next_command == Command::Refp2b && forced {
            for &idx in &self.current {
                banks[idx].block();
            }
            self.skip_selection = true;
        }

        core.time_to_schedule = checker.time_to_satisfy(
            core.next_command,
            core.rank,
            core.target_group,
            core.target_bank,
        );
        core.time_to_schedule
    }

    fn update(&mut self, command: Command, now: SimTime) {
        let core = &mut self.core;
        match command {
            Command::Refp2b => {
                self.skip_selection = false;
                self.remaining.retain(|&pair| pair != self.current);
                if self.remaining.is_empty() {
                    self.remaining = bank_pairs(self.banks_per_rank, self.offset);
                }
                core.credit_refresh();
            }
            Command::Refab => {
                core.reanchor(now);
                self.remaining = bank_pairs(self.banks_per_rank, self.offset);
                self.skip_selection = false;
            }
            _ => core.sleep_update(command),
        }
    }
}

impl SameBank {
    fn evaluate(
        &mut self,
        now: SimTime,
        banks: &mut [BankMachine],
        power_down: &mut PowerDownManager,
        checker: &Checker,
    ) -> SimTime {
        let core = &mut self.core;
        core.clear_candidate();

        if now >= core.time_for_next_trigger {
            power_down.trigger_interruption();
            if core.sleeping {
                return SimTime::NEVER;
            }
            if now >= core.time_for_next_trigger + core.interval {
                core.time_for_next_trigger += core.interval;
                core.phase = Phase::Regular;
            }

            let forced = core.phase == Phase::Regular && core.flexibility == core.max_postponed;
            let mut all_busy = true;
            if !self.skip_selection {
                self.current.clone_from(&self.remaining[0]);
                for set in &self.remaining {
                    if set.iter().all(|&idx| banks[idx].is_idle()) {
                        self.current.clone_from(set);
                        all_busy = false;
                        break;
                    }
                }
            }

            if all_busy && !forced && !self.skip_selection {
                if core.phase == Phase::Regular {
                    core.flexibility += 1;
                } else {
                    core.phase = Phase::Regular;
                }
                core.time_for_next_trigger += core.interval;
                return core.time_for_next_trigger;
            }

            self.propose(banks, Command::Refsb);
            if self.core.next_command == Command::Refsb && forced {
                for &idx in &self.current {
                    banks[idx].block();
                }
                self.skip_selection = true;
            }
            let core = &mut self.core;
            core.time_to_schedule = checker.time_to_satisfy(
                core.next_command,
                core.rank,
                core.target_group,
                core.target_bank,
            );
            return core.time_to_schedule;
        }

        // Refresh management: force an RFM at the mandatory threshold, slip one
        // in opportunistically above the opportunistic threshold.
        if let Some(rfm) = self.rfm {
            let mut mmt_set = None;
            let mut imt_sets = Vec::new();
            for set in &self.all_sets {
                if set
                    .iter()
                    .any(|&idx| banks[idx].rm_counter() >= rfm.raammt)
                {
                    mmt_set = Some(set.clone());
                    break;
                }
                if set.iter().any(|&idx| banks[idx].rm_counter() >= rfm.raaimt) {
                    imt_sets.push(set.clone());
                }
            }

            if let Some(set) = mmt_set {
                self.current = set;
                for &idx in &self.current {
                    banks[idx].block();
                }
                self.propose(banks, Command::Rfmsb);
            } else if let Some(set) = imt_sets
                .into_iter()
                .find(|set| set.iter().all(|&idx| banks[idx].is_idle()))
            {
                self.current = set;
                self.propose(banks, Command::Rfmsb);
            }
            if self.core.next_command != Command::Nop {
                let core = &mut self.core;
                core.time_to_schedule = checker.time_to_satisfy(
                    core.next_command,
                    core.rank,
                    core.target_group,
                    core.target_bank,
                );
                return core.time_to_schedule;
            }
        }

        self.core.time_for_next_trigger
    }

    /// Proposes `refresh` for the current set, or a PRESB when a member is active.
    fn propose(&mut self, banks: &[BankMachine], refresh: Command) {
        let core = &mut self.core;
        core.next_command = refresh;
        core.target_bank = banks[self.current[0]].bank();
        core.target_group = banks[self.current[0]].bank_group();
        for &idx in &self.current {
            if banks[idx].is_activated() {
                core.next_command = Command::Presb;
                break;
            }
        }
    }

    fn update(&mut self, command: Command, now: SimTime) {
        let core = &mut self.core;
        match command {
            Command::Refsb => {
                self.skip_selection = false;
                self.remaining.retain(|set| *set != self.current);
                if self.remaining.is_empty() {
                    self.remaining.clone_from(&self.all_sets);
                }
                core.credit_refresh();
            }
            Command::Refab => {
                core.reanchor(now);
                self.remaining.clone_from(&self.all_sets);
                self.skip_selection = false;
            }
            _ => core.sleep_update(command),
        }
    }
}
