//! The timing checker.
//!
//! This module answers one question: given everything already issued, when may a
//! candidate command legally go on the command bus? It maintains:
//! 1. **Last-issue tables** per (command, bank), (command, bank group),
//!    (command, rank) and per command channel-wide.
//! 2. **A constraint catalogue** of `(previous, next, scope) -> delay` rows,
//!    built by the memspec for the selected standard.
//! 3. **The four-activate window** per rank, and the command-bus occupancy guard.
//!
//! `insert` must only be called for the one command the multiplexer actually
//! dispatched this cycle.

use crate::common::coords::{Bank, BankGroup, Rank};
use crate::common::time::SimTime;
use crate::controller::command::Command;
use crate::memspec::MemSpec;
use std::collections::VecDeque;

/// Which prior command instances a constraint row applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintScope {
    /// Previous command on the same bank.
    Bank,
    /// Previous command in the same bank group.
    BankGroup,
    /// Previous command on the same rank.
    Rank,
    /// Previous command on any *other* rank (rank-switch penalties).
    OtherRank,
    /// Previous command anywhere on the channel.
    Channel,
}

/// One row of the timing catalogue: `next` may not issue earlier than
/// `delay` after the last `prev` in `scope`.
#[derive(Clone, Copy, Debug)]
pub struct TimingConstraint {
    /// The earlier command.
    pub prev: Command,
    /// The candidate command being checked.
    pub next: Command,
    /// Which instances of `prev` are considered.
    pub scope: ConstraintScope,
    /// Minimum issue-to-issue separation.
    pub delay: SimTime,
}

/// Builder for a standard's constraint catalogue.
///
/// Zero-delay rows are dropped; they can never constrain anything.
#[derive(Debug, Default)]
pub struct ConstraintSet {
    rows: Vec<TimingConstraint>,
}

impl ConstraintSet {
    /// Creates an empty catalogue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one row.
    pub fn push(&mut self, prev: Command, next: Command, scope: ConstraintScope, delay: SimTime) {
        if delay > SimTime::ZERO {
            self.rows.push(TimingConstraint {
                prev,
                next,
                scope,
                delay,
            });
        }
    }

    /// Adds the cross product of `prevs` x `nexts` with one scope and delay.
    pub fn push_many(
        &mut self,
        prevs: &[Command],
        nexts: &[Command],
        scope: ConstraintScope,
        delay: SimTime,
    ) {
        for &prev in prevs {
            for &next in nexts {
                self.push(prev, next, scope, delay);
            }
        }
    }

    /// Consumes the builder and returns the catalogue rows.
    pub fn into_rows(self) -> Vec<TimingConstraint> {
        self.rows
    }
}

/// Per-channel timing checker.
pub struct Checker {
    /// Catalogue rows grouped by the candidate (`next`) command.
    by_next: Vec<Vec<TimingConstraint>>,
    last_by_bank: Vec<Vec<SimTime>>,
    last_by_group: Vec<Vec<SimTime>>,
    last_by_rank: Vec<Vec<SimTime>>,
    last_global: Vec<SimTime>,
    /// Rolling window of the last four ACT issue times, per rank.
    last_activates: Vec<VecDeque<SimTime>>,
    /// Time at which the command bus becomes free again.
    bus_free: SimTime,
    faw: SimTime,
    command_lengths: [SimTime; Command::COUNT],
    ranks: usize,
    banks_per_rank: usize,
    banks_per_group: usize,
    per2bank_offset: usize,
}

impl Checker {
    /// Builds the checker for one channel from the standard's catalogue.
    pub fn new(memspec: &MemSpec) -> Self {
        let mut by_next: Vec<Vec<TimingConstraint>> = vec![Vec::new(); Command::COUNT];
        for row in &memspec.constraints {
            by_next[row.next.idx()].push(*row);
        }
        Self {
            by_next,
            last_by_bank: vec![vec![SimTime::NEVER; memspec.banks_per_channel]; Command::COUNT],
            last_by_group: vec![vec![SimTime::NEVER; memspec.groups_per_channel]; Command::COUNT],
            last_by_rank: vec![vec![SimTime::NEVER; memspec.ranks_per_channel]; Command::COUNT],
            last_global: vec![SimTime::NEVER; Command::COUNT],
            last_activates: vec![VecDeque::with_capacity(4); memspec.ranks_per_channel],
            bus_free: SimTime::ZERO,
            faw: memspec.timings.faw,
            command_lengths: memspec.command_lengths,
            ranks: memspec.ranks_per_channel,
            banks_per_rank: memspec.banks_per_rank,
            banks_per_group: memspec.banks_per_group,
            per2bank_offset: memspec.per2bank_offset,
        }
    }

    /// Earliest wall time `cmd` may be issued to the given coordinate.
    ///
    /// `SimTime::NEVER` is never returned; a command with no recorded
    /// predecessors is constrained only by the bus-occupancy guard.
    pub fn time_to_satisfy(
        &self,
        cmd: Command,
        rank: Rank,
        group: BankGroup,
        bank: Bank,
    ) -> SimTime {
        let mut earliest = self.bus_free;

        for row in &self.by_next[cmd.idx()] {
            let last = match row.scope {
                ConstraintScope::Bank => self.last_by_bank[row.prev.idx()][bank.idx()],
                ConstraintScope::BankGroup => self.last_by_group[row.prev.idx()][group.idx()],
                ConstraintScope::Rank => self.last_by_rank[row.prev.idx()][rank.idx()],
                ConstraintScope::OtherRank => (0..self.ranks)
                    .filter(|&r| r != rank.idx())
                    .map(|r| self.last_by_rank[row.prev.idx()][r])
                    .filter(|t| !t.is_never())
                    .max()
                    .unwrap_or(SimTime::NEVER),
                ConstraintScope::Channel => self.last_global[row.prev.idx()],
            };
            if !last.is_never() {
                earliest = earliest.max(last + row.delay);
            }
        }

        if cmd == Command::Act && self.faw > SimTime::ZERO {
            let window = &self.last_activates[rank.idx()];
            if window.len() == 4 {
                if let Some(&oldest) = window.front() {
                    earliest = earliest.max(oldest + self.faw);
                }
            }
        }

        earliest
    }

    /// Records the issue of `cmd` at `now` and advances all tables.
    ///
    /// Rank-, pair- and same-bank-scope commands are recorded against every bank
    /// they touch so that later bank-scope lookups see them.
    pub fn insert(&mut self, cmd: Command, rank: Rank, group: BankGroup, bank: Bank, now: SimTime) {
        debug_assert!(now >= self.time_to_satisfy(cmd, rank, group, bank));

        for b in self.affected_banks(cmd, rank, bank) {
            self.last_by_bank[cmd.idx()][b] = now;
            self.last_by_group[cmd.idx()][b / self.banks_per_group] = now;
        }
        self.last_by_rank[cmd.idx()][rank.idx()] = now;
        self.last_global[cmd.idx()] = now;

        if cmd == Command::Act {
            let window = &mut self.last_activates[rank.idx()];
            if window.len() == 4 {
                let _ = window.pop_front();
            }
            window.push_back(now);
        }

        self.bus_free = now + self.command_lengths[cmd.idx()];
    }

    /// Global bank indices a command applies to.
    fn affected_banks(&self, cmd: Command, rank: Rank, bank: Bank) -> Vec<usize> {
        let rank_base = rank.idx() * self.banks_per_rank;
        if cmd.is_rank() {
            (rank_base..rank_base + self.banks_per_rank).collect()
        } else if matches!(cmd, Command::Refp2b | Command::Rfmp2b) {
            let second = bank.idx() + self.per2bank_offset;
            vec![bank.idx(), second]
        } else if cmd.is_group() {
            // Same-bank set: equal in-group index across every group of the rank.
            let in_group = bank.idx() % self.banks_per_group;
            let groups = self.banks_per_rank / self.banks_per_group;
            (0..groups)
                .map(|g| rank_base + g * self.banks_per_group + in_group)
                .collect()
        } else {
            vec![bank.idx()]
        }
    }
}

impl std::fmt::Debug for Checker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checker")
            .field("bus_free", &self.bus_free)
            .field("ranks", &self.ranks)
            .finish()
    }
}
