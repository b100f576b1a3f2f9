//! Simulation statistics.
//!
//! Per-channel command counts, served transactions, bytes moved, and average
//! read latency, accumulated from the controllers' command records and the
//! trace players' completion times. With windowing enabled, bandwidth is also
//! sampled every `WindowSize` served requests.

use serde::Serialize;

use crate::common::time::SimTime;
use crate::controller::command::Command;
use crate::controller::CommandRecord;
use crate::memspec::MemSpec;

/// One windowed bandwidth sample.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct WindowSample {
    /// End time of the window.
    pub end_time_ps: u64,
    /// Bytes moved inside the window.
    pub bytes: u64,
    /// Bandwidth in bytes per second over the window.
    pub bytes_per_second: f64,
}

/// Accumulated statistics for one simulation run.
#[derive(Debug, Serialize)]
pub struct SimStats {
    /// Commands issued, indexed by [`Command`] mnemonic.
    pub commands: Vec<(String, u64)>,
    /// Transactions completed end to end.
    pub transactions_served: u64,
    /// Bytes moved by read CAS commands.
    pub bytes_read: u64,
    /// Bytes moved by write CAS commands.
    pub bytes_written: u64,
    /// Mean request-to-completion latency in picoseconds.
    pub avg_latency_ps: f64,
    /// Simulated end time in picoseconds.
    pub end_time_ps: u64,
    /// Windowed bandwidth samples (empty unless windowing is on).
    pub windows: Vec<WindowSample>,
    #[serde(skip)]
    counts: [u64; Command::COUNT],
    #[serde(skip)]
    bytes_per_access: u64,
    #[serde(skip)]
    windowing: Option<Windowing>,
}

#[derive(Debug)]
struct Windowing {
    window_size: u64,
    served_in_window: u64,
    bytes_in_window: u64,
    window_start: SimTime,
}

impl SimStats {
    /// Creates an empty accumulator.
    pub fn new(memspec: &MemSpec, windowing: bool, window_size: usize) -> Self {
        let bytes_per_access = (u64::from(memspec.burst_length)
            * u64::from(memspec.bit_width)
            * memspec.devices_per_rank as u64)
            / 8;
        Self {
            commands: Vec::new(),
            transactions_served: 0,
            bytes_read: 0,
            bytes_written: 0,
            avg_latency_ps: 0.0,
            end_time_ps: 0,
            windows: Vec::new(),
            counts: [0; Command::COUNT],
            bytes_per_access,
            windowing: windowing.then(|| Windowing {
                window_size: window_size as u64,
                served_in_window: 0,
                bytes_in_window: 0,
                window_start: SimTime::ZERO,
            }),
        }
    }

    /// Accounts one committed command.
    pub fn record_command(&mut self, record: &CommandRecord) {
        self.counts[record.command.idx()] += 1;
        if record.command.is_read() {
            self.bytes_read += self.bytes_per_access;
        } else if record.command.is_write() {
            self.bytes_written += self.bytes_per_access;
        }
        if let Some(w) = &mut self.windowing {
            if record.command.is_cas() {
                w.bytes_in_window += self.bytes_per_access;
            }
        }
    }

    /// Accounts one completed transaction.
    pub fn record_completion(&mut self, now: SimTime) {
        self.transactions_served += 1;
        if let Some(w) = &mut self.windowing {
            w.served_in_window += 1;
            if w.served_in_window == w.window_size {
                let span = (now - w.window_start).ps();
                self.windows.push(WindowSample {
                    end_time_ps: now.ps(),
                    bytes: w.bytes_in_window,
                    bytes_per_second: if span == 0 {
                        0.0
                    } else {
                        w.bytes_in_window as f64 / (span as f64 * 1e-12)
                    },
                });
                w.served_in_window = 0;
                w.bytes_in_window = 0;
                w.window_start = now;
            }
        }
    }

    /// Seals the accumulator for reporting.
    pub fn finish(&mut self, end_time: SimTime, latency_total: SimTime, completed: u64) {
        self.end_time_ps = end_time.ps();
        self.avg_latency_ps = if completed == 0 {
            0.0
        } else {
            latency_total.ps() as f64 / completed as f64
        };
        self.commands = (0..Command::COUNT)
            .filter(|&i| self.counts[i] > 0)
            .map(|i| (COMMAND_ORDER[i].mnemonic().to_owned(), self.counts[i]))
            .collect();
    }

    /// Count for one command kind.
    pub fn count(&self, command: Command) -> u64 {
        self.counts[command.idx()]
    }

    /// Renders the human-readable report.
    pub fn report(&self) -> String {
        use std::fmt::Write as _;
        let mut out = String::new();
        let _ = writeln!(out, "simulated time:        {} ps", self.end_time_ps);
        let _ = writeln!(out, "transactions served:   {}", self.transactions_served);
        let _ = writeln!(out, "bytes read:            {}", self.bytes_read);
        let _ = writeln!(out, "bytes written:         {}", self.bytes_written);
        let _ = writeln!(out, "average latency:       {:.0} ps", self.avg_latency_ps);
        for (name, count) in &self.commands {
            let _ = writeln!(out, "  {name:<8} {count}");
        }
        for w in &self.windows {
            let _ = writeln!(
                out,
                "  window @{} ps: {:.3} GB/s",
                w.end_time_ps,
                w.bytes_per_second / 1e9
            );
        }
        out
    }
}

/// Command table order, matching `Command::idx`.
const COMMAND_ORDER: [Command; Command::COUNT] = [
    Command::Nop,
    Command::Rd,
    Command::Wr,
    Command::Rda,
    Command::Wra,
    Command::Mwr,
    Command::Mwra,
    Command::Prepb,
    Command::Preab,
    Command::Presb,
    Command::Act,
    Command::Refpb,
    Command::Refab,
    Command::Refsb,
    Command::Refp2b,
    Command::Rfmpb,
    Command::Rfmab,
    Command::Rfmsb,
    Command::Rfmp2b,
    Command::Pdea,
    Command::Pdxa,
    Command::Pdep,
    Command::Pdxp,
    Command::Srefen,
    Command::Srefex,
];
