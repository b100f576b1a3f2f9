//! Read/write response ordering.
//!
//! Completed CAS commands park here until their data-bus window has drained;
//! the controller then raises BEGIN_RESP upstream. Fifo keeps strict issue
//! order (ready times are monotone because the data bus is exclusive); Reorder
//! releases responses in data-ready order with a stable sort for equal times.

use std::collections::VecDeque;

use crate::common::time::SimTime;
use crate::common::transaction::TransId;
use crate::config::RespQueuePolicy;

/// Queue of responses waiting for their data-ready time.
#[derive(Debug)]
pub struct RespQueue {
    policy: RespQueuePolicy,
    entries: VecDeque<(TransId, SimTime)>,
}

impl RespQueue {
    /// Creates the queue with the configured ordering policy.
    pub fn new(policy: RespQueuePolicy) -> Self {
        Self {
            policy,
            entries: VecDeque::new(),
        }
    }

    /// Parks a transaction until `ready`, the end of its data-bus window.
    pub fn insert(&mut self, id: TransId, ready: SimTime) {
        match self.policy {
            RespQueuePolicy::Fifo => {
                debug_assert!(
                    self.entries.back().is_none_or(|&(_, t)| t <= ready),
                    "FIFO response queue requires monotone ready times"
                );
                self.entries.push_back((id, ready));
            }
            RespQueuePolicy::Reorder => {
                // Stable: equal ready times keep insertion order.
                let pos = self
                    .entries
                    .iter()
                    .position(|&(_, t)| t > ready)
                    .unwrap_or(self.entries.len());
                self.entries.insert(pos, (id, ready));
            }
        }
    }

    /// Pops the front transaction if its data is on the bus by `now`.
    pub fn next_ready(&mut self, now: SimTime) -> Option<TransId> {
        match self.entries.front() {
            Some(&(_, ready)) if ready <= now => self.entries.pop_front().map(|(id, _)| id),
            _ => None,
        }
    }

    /// Earliest ready time in the queue, to arm the data-response wake-up.
    pub fn trigger_time(&self) -> SimTime {
        self.entries
            .front()
            .map_or(SimTime::NEVER, |&(_, ready)| ready)
    }

    /// Number of parked responses.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is parked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
