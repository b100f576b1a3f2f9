//! Request scheduling and buffer accounting.
//!
//! The scheduler owns the per-bank request buffers and answers, for each bank
//! machine, "which pending request should you serve next?". Five policies are
//! provided, from plain per-bank FIFO up to globally direction-grouped FR-FCFS
//! with write-queue watermarks. Buffer accounting (which drives upstream
//! backpressure) is independent of the pick policy.

use std::collections::VecDeque;

use crate::common::coords::{Bank, Row};
use crate::common::transaction::{TransId, TransKind, TransactionPool};
use crate::config::{McConfig, SchedulerBufferPolicy, SchedulerPolicy};
use crate::controller::bank_machine::BankState;
use crate::memspec::MemSpec;

/// Buffer occupancy accounting.
#[derive(Debug)]
enum BufferCounter {
    /// One budget per bank.
    Bankwise { size: usize, per_bank: Vec<usize> },
    /// Separate budgets for reads and writes.
    ReadWrite {
        size: usize,
        reads: usize,
        writes: usize,
    },
    /// One shared budget.
    Shared { size: usize, used: usize },
}

impl BufferCounter {
    fn store(&mut self, bank: Bank, kind: TransKind) {
        match self {
            Self::Bankwise { per_bank, .. } => per_bank[bank.idx()] += 1,
            Self::ReadWrite { reads, writes, .. } => match kind {
                TransKind::Read => *reads += 1,
                TransKind::Write => *writes += 1,
            },
            Self::Shared { used, .. } => *used += 1,
        }
    }

    fn remove(&mut self, bank: Bank, kind: TransKind) {
        match self {
            Self::Bankwise { per_bank, .. } => per_bank[bank.idx()] -= 1,
            Self::ReadWrite { reads, writes, .. } => match kind {
                TransKind::Read => *reads -= 1,
                TransKind::Write => *writes -= 1,
            },
            Self::Shared { used, .. } => *used -= 1,
        }
    }

    /// Room in the buffer after the in-flight request was stored.
    ///
    /// The check runs after the unacknowledged request already entered the
    /// buffer, so occupancy may transiently exceed the budget by exactly that
    /// one request; the acknowledgement is withheld until the overshoot drains.
    fn has_space(&self) -> bool {
        match self {
            Self::Bankwise { size, per_bank } => per_bank.iter().all(|&n| n <= *size),
            Self::ReadWrite {
                size,
                reads,
                writes,
            } => reads <= size && writes <= size,
            Self::Shared { size, used } => used <= size,
        }
    }

    fn depth(&self) -> Vec<usize> {
        match self {
            Self::Bankwise { per_bank, .. } => per_bank.clone(),
            Self::ReadWrite { reads, writes, .. } => vec![*reads, *writes],
            Self::Shared { used, .. } => vec![*used],
        }
    }
}

/// The channel-wide request scheduler.
#[derive(Debug)]
pub struct Scheduler {
    policy: SchedulerPolicy,
    buffers: Vec<VecDeque<TransId>>,
    counter: BufferCounter,
    /// Direction of the last CAS removed; seeds the grouped policies.
    last_kind: TransKind,
    /// Global service direction for the `Grp*` policies.
    current_kind: TransKind,
    reads_pending: usize,
    writes_pending: usize,
    low_watermark: usize,
    high_watermark: usize,
}

impl Scheduler {
    /// Creates the scheduler for one channel.
    pub fn new(config: &McConfig, memspec: &MemSpec) -> Self {
        let banks = memspec.banks_per_channel;
        let counter = match config.scheduler_buffer {
            SchedulerBufferPolicy::Bankwise => BufferCounter::Bankwise {
                size: config.request_buffer_size,
                per_bank: vec![0; banks],
            },
            SchedulerBufferPolicy::ReadWrite => BufferCounter::ReadWrite {
                size: config.request_buffer_size,
                reads: 0,
                writes: 0,
            },
            SchedulerBufferPolicy::Shared => BufferCounter::Shared {
                size: config.request_buffer_size,
                used: 0,
            },
        };
        Self {
            policy: config.scheduler,
            buffers: vec![VecDeque::new(); banks],
            counter,
            last_kind: TransKind::Read,
            current_kind: TransKind::Read,
            reads_pending: 0,
            writes_pending: 0,
            low_watermark: config.low_watermark,
            high_watermark: config.high_watermark,
        }
    }

    /// `true` when one more request can be accepted (drives END_REQ).
    pub fn has_buffer_space(&self) -> bool {
        self.counter.has_space()
    }

    /// Stores an accepted request.
    pub fn store_request(&mut self, id: TransId, pool: &TransactionPool) {
        let trans = pool.get(id);
        let bank = trans.controller.bank;
        self.buffers[bank.idx()].push_back(id);
        self.counter.store(bank, trans.kind);
        match trans.kind {
            TransKind::Read => self.reads_pending += 1,
            TransKind::Write => self.writes_pending += 1,
        }
        self.steer_direction();
    }

    /// Removes a request once its CAS has been committed.
    pub fn remove_request(&mut self, id: TransId, pool: &TransactionPool) {
        let trans = pool.get(id);
        let bank = trans.controller.bank;
        self.counter.remove(bank, trans.kind);
        self.last_kind = trans.kind;
        match trans.kind {
            TransKind::Read => self.reads_pending -= 1,
            TransKind::Write => self.writes_pending -= 1,
        }
        if let Some(pos) = self.buffers[bank.idx()].iter().position(|&t| t == id) {
            let _ = self.buffers[bank.idx()].remove(pos);
        } else {
            debug_assert!(false, "removed a request that was never stored");
        }
        self.steer_direction();
    }

    /// Updates the global direction for the grouped policies.
    fn steer_direction(&mut self) {
        match self.policy {
            SchedulerPolicy::GrpFrFcfs => {
                // Stay in the current direction until it runs dry.
                match self.current_kind {
                    TransKind::Read if self.reads_pending == 0 && self.writes_pending > 0 => {
                        self.current_kind = TransKind::Write;
                    }
                    TransKind::Write if self.writes_pending == 0 && self.reads_pending > 0 => {
                        self.current_kind = TransKind::Read;
                    }
                    _ => {}
                }
            }
            SchedulerPolicy::GrpFrFcfsWm => {
                // Reads run until the write queue climbs over the high
                // watermark; writes drain until it falls to the low one.
                match self.current_kind {
                    TransKind::Read => {
                        if self.writes_pending >= self.high_watermark.max(1)
                            || (self.reads_pending == 0 && self.writes_pending > 0)
                        {
                            self.current_kind = TransKind::Write;
                        }
                    }
                    TransKind::Write => {
                        if (self.writes_pending <= self.low_watermark
                            || self.writes_pending == 0)
                            && self.reads_pending > 0
                        {
                            self.current_kind = TransKind::Read;
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Chooses the next pending request for a bank, given its row-buffer state.
    pub fn next_request(
        &self,
        bank: Bank,
        state: BankState,
        open_row: Row,
        pool: &TransactionPool,
    ) -> Option<TransId> {
        let buffer = &self.buffers[bank.idx()];
        if buffer.is_empty() {
            return None;
        }
        match self.policy {
            SchedulerPolicy::Fifo => buffer.front().copied(),
            SchedulerPolicy::FrFcfs => {
                if state == BankState::Activated {
                    if let Some(&hit) = buffer
                        .iter()
                        .find(|&&id| pool.get(id).controller.row == open_row)
                    {
                        return Some(hit);
                    }
                }
                buffer.front().copied()
            }
            SchedulerPolicy::FrFcfsGrp => self.next_grouped(buffer, state, open_row, pool),
            SchedulerPolicy::GrpFrFcfs | SchedulerPolicy::GrpFrFcfsWm => {
                let direction = self.current_kind;
                if state == BankState::Activated {
                    if let Some(&hit) = buffer.iter().find(|&&id| {
                        let t = pool.get(id);
                        t.controller.row == open_row && t.kind == direction
                    }) {
                        return Some(hit);
                    }
                }
                if let Some(&first) = buffer.iter().find(|&&id| pool.get(id).kind == direction) {
                    return Some(first);
                }
                // Nothing in the preferred direction pending on this bank.
                None
            }
        }
    }

    /// FR-FCFS with same-direction grouping among the row hits.
    fn next_grouped(
        &self,
        buffer: &VecDeque<TransId>,
        state: BankState,
        open_row: Row,
        pool: &TransactionPool,
    ) -> Option<TransId> {
        if state == BankState::Activated {
            let row_hits: Vec<TransId> = buffer
                .iter()
                .copied()
                .filter(|&id| pool.get(id).controller.row == open_row)
                .collect();

            if !row_hits.is_empty() {
                for (pos, &id) in row_hits.iter().enumerate() {
                    if pool.get(id).kind != self.last_kind {
                        continue;
                    }
                    // Do not reorder over an older access to the same address.
                    let address = pool.get(id).address;
                    let hazard = row_hits[..pos]
                        .iter()
                        .any(|&earlier| pool.get(earlier).address == address);
                    if !hazard {
                        return Some(id);
                    }
                }
                // No hit in the preferred direction: take the first row hit.
                return Some(row_hits[0]);
            }
        }
        buffer.front().copied()
    }

    /// `true` when a second request to `row` is pending on `bank`.
    pub fn has_further_row_hit(&self, bank: Bank, row: Row, pool: &TransactionPool) -> bool {
        self.buffers[bank.idx()]
            .iter()
            .filter(|&&id| pool.get(id).controller.row == row)
            .nth(1)
            .is_some()
    }

    /// `true` when a second request of any kind is pending on `bank`.
    pub fn has_further_request(&self, bank: Bank) -> bool {
        self.buffers[bank.idx()].len() >= 2
    }

    /// Smallest channel payload id over all pending requests (Strict mux order).
    pub fn oldest_pending(&self, pool: &TransactionPool) -> Option<TransId> {
        self.buffers
            .iter()
            .flatten()
            .copied()
            .min_by_key(|&id| pool.get(id).controller.channel_payload_id)
    }

    /// Per-accounting-unit buffer occupancy, for statistics.
    pub fn buffer_depth(&self) -> Vec<usize> {
        self.counter.depth()
    }

    /// Total pending requests.
    pub fn pending(&self) -> usize {
        self.reads_pending + self.writes_pending
    }
}
