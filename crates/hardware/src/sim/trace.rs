//! Trace-driven stimulus.
//!
//! A trace player replays a request trace through the arbiter, honouring the
//! four-phase handshake: one BEGIN_REQ outstanding until END_REQ, END_RESP one
//! cycle after each BEGIN_RESP, and a configurable cap on transactions in
//! flight. Trace lines have the form
//!
//! ```text
//! <cycle> <R|W> <hex-address> [hex-data]
//! # comment and blank lines are skipped
//! ```
//!
//! with cycles converted through the memspec clock at load time.

use crate::common::coords::{Bank, BankGroup, Channel, Column, Rank, Row, Thread};
use crate::common::time::SimTime;
use crate::common::transaction::{
    ArbiterTag, ControllerTag, TransId, TransKind, Transaction, TransactionPool,
};
use crate::common::ConfigError;
use crate::memspec::MemSpec;

/// One parsed trace line.
#[derive(Clone, Debug)]
pub struct TraceRequest {
    /// Earliest issue time.
    pub time: SimTime,
    /// Read or write.
    pub kind: TransKind,
    /// Linear physical address.
    pub address: u64,
    /// Write data (empty for reads; sized to the burst at issue).
    pub data: Vec<u8>,
}

/// Parses a trace file body.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] on any malformed line.
pub fn parse_trace(text: &str, memspec: &MemSpec) -> Result<Vec<TraceRequest>, ConfigError> {
    let mut requests = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let bad = |what: &str| {
            ConfigError::Parse(format!("trace line {}: {what}", lineno + 1))
        };
        let cycle: u64 = fields
            .next()
            .ok_or_else(|| bad("missing cycle"))?
            .parse()
            .map_err(|_| bad("bad cycle"))?;
        let kind = match fields.next() {
            Some("R" | "r") => TransKind::Read,
            Some("W" | "w") => TransKind::Write,
            _ => return Err(bad("expected R or W")),
        };
        let addr_text = fields.next().ok_or_else(|| bad("missing address"))?;
        let address = u64::from_str_radix(addr_text.trim_start_matches("0x"), 16)
            .map_err(|_| bad("bad address"))?;
        let data = match fields.next() {
            Some(hex) => decode_hex(hex).ok_or_else(|| bad("bad data"))?,
            None => Vec::new(),
        };
        requests.push(TraceRequest {
            time: memspec.tck.times(cycle),
            kind,
            address,
            data,
        });
    }
    Ok(requests)
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    let text = text.trim_start_matches("0x");
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
        .collect()
}

/// Replays one thread's trace through the system.
#[derive(Debug)]
pub struct TracePlayer {
    thread: Thread,
    requests: Vec<TraceRequest>,
    next: usize,
    in_flight: usize,
    max_active: usize,
    /// BEGIN_REQ sent, END_REQ not yet received.
    awaiting_end_req: bool,
    bytes_per_access: usize,
    /// Sum of request-to-completion latencies, for the report.
    pub latency_total: SimTime,
    /// Completed transactions.
    pub completed: u64,
}

impl TracePlayer {
    /// Creates a player for one thread.
    pub fn new(
        thread: Thread,
        requests: Vec<TraceRequest>,
        max_active: usize,
        memspec: &MemSpec,
    ) -> Self {
        let bytes_per_access = (memspec.burst_length as usize
            * memspec.bit_width as usize
            * memspec.devices_per_rank)
            / 8;
        Self {
            thread,
            requests,
            next: 0,
            in_flight: 0,
            max_active,
            awaiting_end_req: false,
            bytes_per_access,
            latency_total: SimTime::ZERO,
            completed: 0,
        }
    }

    /// Thread this player drives.
    pub fn thread(&self) -> Thread {
        self.thread
    }

    /// Bytes moved per default-burst access.
    pub fn bytes_per_access(&self) -> usize {
        self.bytes_per_access
    }

    /// `true` once every request has completed.
    pub fn is_done(&self) -> bool {
        self.next == self.requests.len() && self.in_flight == 0
    }

    /// Tries to create the next transaction at `now`.
    ///
    /// Returns the new transaction, or the time to retry when the next request
    /// is in the future, or `None` when blocked on the handshake or done.
    pub fn try_issue(
        &mut self,
        now: SimTime,
        pool: &mut TransactionPool,
    ) -> Option<Result<TransId, SimTime>> {
        if self.awaiting_end_req
            || self.in_flight >= self.max_active
            || self.next >= self.requests.len()
        {
            return None;
        }
        let request = &self.requests[self.next];
        if request.time > now {
            return Some(Err(request.time));
        }

        let mut data = request.data.clone();
        if request.kind == TransKind::Write {
            data.resize(self.bytes_per_access, 0);
        }
        let id = pool.insert(Transaction {
            kind: request.kind,
            address: request.address,
            data,
            byte_enables: None,
            arbiter: ArbiterTag {
                thread: self.thread,
                channel: Channel(0),
                thread_payload_id: 0,
                time_of_generation: now,
            },
            controller: ControllerTag {
                channel_payload_id: 0,
                rank: Rank(0),
                bank_group: BankGroup(0),
                bank: Bank(0),
                row: Row::NONE,
                column: Column(0),
                burst_length: 0,
            },
        });
        self.next += 1;
        self.in_flight += 1;
        self.awaiting_end_req = true;
        Some(Ok(id))
    }

    /// END_REQ received: the next BEGIN_REQ may go out.
    pub fn on_end_req(&mut self) {
        debug_assert!(self.awaiting_end_req);
        self.awaiting_end_req = false;
    }

    /// END_RESP sent: the transaction is complete from this thread's view.
    pub fn on_complete(&mut self, generated_at: SimTime, now: SimTime) {
        debug_assert!(self.in_flight > 0);
        self.in_flight -= 1;
        self.completed += 1;
        self.latency_total += now - generated_at;
    }
}
