//! The per-channel memory controller.
//!
//! This module binds the controller core together: bank machines, timing
//! checker, request scheduler, command multiplexer, response queue, and the
//! per-rank refresh and power-down managers. It provides:
//! 1. **Event entry points:** `begin_req`/`end_resp` (upstream handshake) and
//!    the `controller_method` fired on every armed wake-up.
//! 2. **Candidate collection:** per rank, power-down shadows refresh shadows
//!    bank machines.
//! 3. **Commit bookkeeping:** bank/refresh/power-down updates, checker insert,
//!    CAS retirement into the response queue, and rank idle tracking.
//!
//! The controller never calls back into the arbiter; everything it wants sent
//! is returned as a [`ControllerOutput`] the simulator routes.

use std::sync::Arc;

use tracing::debug;

use crate::common::coords::{Bank, BankGroup, Channel, Column, Rank, Row};
use crate::common::time::SimTime;
use crate::common::transaction::{TransId, TransactionPool};
use crate::common::ConfigError;
use crate::config::McConfig;
use crate::memspec::MemSpec;

/// DRAM command alphabet and candidate tuples.
pub mod command;

/// Timing checker (constraint tables, FAW, bus occupancy).
pub mod checker;

/// Per-bank state machines.
pub mod bank_machine;

/// Request scheduling and buffer accounting.
pub mod scheduler;

/// Command multiplexer policies.
pub mod cmd_mux;

/// Response ordering.
pub mod resp_queue;

/// Per-rank refresh managers.
pub mod refresh;

/// Per-rank power-down managers.
pub mod power_down;

use bank_machine::BankMachine;
use checker::Checker;
use cmd_mux::CmdMux;
use command::{Command, CommandTuple};
use power_down::PowerDownManager;
use refresh::RefreshManager;
use resp_queue::RespQueue;
use scheduler::Scheduler;

/// Upstream phase the simulator must forward to the arbiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpstreamPhase {
    /// Request accepted; the channel may take the next one.
    EndReq,
    /// Response data is ready for the initiator.
    BeginResp,
}

/// One committed DRAM command, as emitted downstream.
#[derive(Clone, Copy, Debug)]
pub struct CommandRecord {
    /// Issue time.
    pub time: SimTime,
    /// Channel the command was issued on.
    pub channel: Channel,
    /// The command.
    pub command: Command,
    /// Target rank.
    pub rank: Rank,
    /// Target bank group.
    pub bank_group: BankGroup,
    /// Target bank.
    pub bank: Bank,
    /// Target row (`Row::NONE` for non-row commands).
    pub row: Row,
    /// Target column (zero for non-CAS commands).
    pub column: Column,
    /// Transaction served, for CAS commands.
    pub trans: Option<TransId>,
}

/// Everything one controller firing wants the simulator to do.
#[derive(Debug, Default)]
pub struct ControllerOutput {
    /// Upstream phases to forward, in order.
    pub upstream: Vec<(TransId, UpstreamPhase)>,
    /// Commands committed this firing (at most one).
    pub commands: Vec<CommandRecord>,
    /// Transactions whose controller reference was dropped this firing.
    pub released: Vec<TransId>,
    /// Earliest future instant the controller wants to run again.
    pub wake_at: Option<SimTime>,
}

/// One memory channel's controller.
pub struct Controller {
    channel: Channel,
    memspec: Arc<MemSpec>,
    checker: Checker,
    banks: Vec<BankMachine>,
    refresh: Vec<RefreshManager>,
    power_down: Vec<PowerDownManager>,
    scheduler: Scheduler,
    cmd_mux: CmdMux,
    resp_queue: RespQueue,
    rank_payloads: Vec<usize>,
    total_payloads: usize,
    to_acquire: Option<TransId>,
    time_to_acquire: SimTime,
    /// Response currently in flight upstream (BEGIN_RESP sent, END_RESP owed).
    to_release: Option<TransId>,
    time_to_release: SimTime,
    /// Transactions served to completion.
    pub served: u64,
}

impl Controller {
    /// Builds the controller for one channel.
    ///
    /// # Arguments
    ///
    /// * `config` - Memory controller options (policies, budgets).
    /// * `memspec` - The standard in force; shared with every component.
    /// * `channel` - The channel this controller drives.
    ///
    /// # Returns
    ///
    /// The controller with empty buffers and all banks precharged.
    ///
    /// # Errors
    ///
    /// Fails when a configured policy is not supported by the standard.
    pub fn new(
        config: &McConfig,
        memspec: Arc<MemSpec>,
        channel: Channel,
    ) -> Result<Self, ConfigError> {
        let banks = (0..memspec.banks_per_channel)
            .map(|b| {
                BankMachine::new(
                    config.page_policy,
                    Bank(b),
                    &memspec,
                    config.refresh_management,
                )
            })
            .collect();
        let refresh = (0..memspec.ranks_per_channel)
            .map(|r| RefreshManager::new(config, &memspec, Rank(r)))
            .collect::<Result<Vec<_>, _>>()?;
        let power_down = (0..memspec.ranks_per_channel)
            .map(|r| PowerDownManager::new(config, &memspec, Rank(r)))
            .collect();

        Ok(Self {
            channel,
            checker: Checker::new(&memspec),
            scheduler: Scheduler::new(config, &memspec),
            cmd_mux: CmdMux::new(config.cmd_mux),
            resp_queue: RespQueue::new(config.resp_queue),
            banks,
            refresh,
            power_down,
            rank_payloads: vec![0; memspec.ranks_per_channel],
            total_payloads: 0,
            to_acquire: None,
            time_to_acquire: SimTime::NEVER,
            to_release: None,
            time_to_release: SimTime::NEVER,
            served: 0,
            memspec,
        })
    }

    /// Channel this controller drives.
    ///
    /// # Returns
    ///
    /// The channel coordinate fixed at construction.
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Upstream BEGIN_REQ: latch the payload for installation one cycle later.
    ///
    /// # Arguments
    ///
    /// * `id` - The arriving transaction.
    /// * `now` - Current simulated time.
    ///
    /// # Returns
    ///
    /// The instant the controller method must fire to install the payload.
    pub fn begin_req(&mut self, id: TransId, now: SimTime) -> SimTime {
        debug_assert!(self.to_acquire.is_none(), "arbiter violated channel exclusivity");
        self.to_acquire = Some(id);
        self.time_to_acquire = now + self.memspec.tck;
        self.time_to_acquire
    }

    /// Upstream END_RESP: the in-flight response was accepted.
    ///
    /// # Arguments
    ///
    /// * `now` - Current simulated time.
    ///
    /// # Returns
    ///
    /// The instant the controller method must fire to release the payload.
    pub fn end_resp(&mut self, now: SimTime) -> SimTime {
        debug_assert!(self.to_release.is_some(), "END_RESP without a response in flight");
        self.time_to_release = now + self.memspec.tck;
        self.time_to_release
    }

    /// The controller event method: runs all eight steps for one firing.
    ///
    /// # Arguments
    ///
    /// * `now` - Current simulated time.
    /// * `pool` - The shared transaction pool.
    ///
    /// # Returns
    ///
    /// The upstream phases, committed commands, released payloads, and next
    /// wake-up produced by this firing.
    pub fn controller_method(
        &mut self,
        now: SimTime,
        pool: &mut TransactionPool,
    ) -> ControllerOutput {
        let mut out = ControllerOutput::default();

        // (1) Finish END_RESP: drop the controller's reference.
        if let Some(id) = self.to_release {
            if self.time_to_release <= now {
                debug!(channel = self.channel.idx(), trans = id.0, "payload left the channel");
                let _ = pool.release(id);
                out.released.push(id);
                self.to_release = None;
                self.time_to_release = SimTime::NEVER;
                self.total_payloads -= 1;
                self.served += 1;
            }
        }

        // (2) Start the next BEGIN_RESP when no response is in flight.
        if self.to_release.is_none() {
            if let Some(id) = self.resp_queue.next_ready(now) {
                self.to_release = Some(id);
                out.upstream.push((id, UpstreamPhase::BeginResp));
            }
        }

        // (3) Install an arrived request and restart its bank machine.
        if let Some(id) = self.to_acquire {
            if self.time_to_acquire <= now {
                pool.acquire(id);
                let tag = pool.get(id).controller;
                debug!(
                    channel = self.channel.idx(),
                    trans = id.0,
                    bank = tag.bank.idx(),
                    "payload entered the channel"
                );
                self.total_payloads += 1;
                if self.rank_payloads[tag.rank.idx()] == 0 {
                    self.power_down[tag.rank.idx()].trigger_exit();
                }
                self.rank_payloads[tag.rank.idx()] += 1;
                self.scheduler.store_request(id, pool);
                self.time_to_acquire = SimTime::NEVER;
                let _ = self.banks[tag.bank.idx()].evaluate(
                    &self.scheduler,
                    &self.checker,
                    pool,
                    &self.memspec,
                );
            }
        }

        // (4) Let refresh and power-down managers produce candidates for now.
        let ranks = self.memspec.ranks_per_channel;
        let bpr = self.memspec.banks_per_rank;
        for r in 0..ranks {
            let bank_slice = &mut self.banks[r * bpr..(r + 1) * bpr];
            let _ = self.refresh[r].evaluate(now, bank_slice, &mut self.power_down[r], &self.checker);
        }
        for r in 0..ranks {
            let _ = self.power_down[r].evaluate(now, &self.banks[r * bpr..(r + 1) * bpr], &self.checker);
        }

        // (5) Collect candidates; a pending power-down command shadows the rank.
        let mut candidates: Vec<CommandTuple> = Vec::new();
        for r in 0..ranks {
            if let Some(pd) = self.power_down[r].next_command(now) {
                candidates.push(pd);
                continue;
            }
            if let Some(rf) = self.refresh[r].next_command(now) {
                candidates.push(rf);
            }
            for bank in &self.banks[r * bpr..(r + 1) * bpr] {
                if let Some(cmd) = bank.next_command(now) {
                    candidates.push(cmd);
                }
            }
        }

        // (6) Pick one and commit it.
        let mut ready_cmd_blocked = false;
        if !candidates.is_empty() {
            let oldest_pending = self.scheduler.oldest_pending(pool);
            if let Some(tuple) = self.cmd_mux.select(&candidates, pool, oldest_pending, now) {
                self.commit(tuple, now, pool, &mut out);
            } else {
                ready_cmd_blocked = true;
            }
        }

        // (7) Acknowledge the pending request unless the buffer is full.
        if let Some(id) = self.to_acquire {
            if self.time_to_acquire.is_never() {
                if self.scheduler.has_buffer_space() {
                    out.upstream.push((id, UpstreamPhase::EndReq));
                    self.to_acquire = None;
                } else {
                    debug!(channel = self.channel.idx(), "buffer full, backpressure");
                }
            }
        }

        // (8) Re-evaluate everything and arm the next wake-up. Candidate times
        // equal to now are ignored while the mux blocked, to avoid a livelock.
        let mut wake = SimTime::NEVER;
        for bank in &mut self.banks {
            let t = bank
                .evaluate(&self.scheduler, &self.checker, pool, &self.memspec)
                .max(now);
            if !(t == now && ready_cmd_blocked) {
                wake = wake.min(t);
            }
        }
        for r in 0..ranks {
            let bank_slice = &mut self.banks[r * bpr..(r + 1) * bpr];
            let t = self.refresh[r]
                .evaluate(now, bank_slice, &mut self.power_down[r], &self.checker)
                .max(now);
            wake = wake.min(t);
        }
        for r in 0..ranks {
            let t = self.power_down[r]
                .evaluate(now, &self.banks[r * bpr..(r + 1) * bpr], &self.checker)
                .max(now);
            wake = wake.min(t);
        }
        if self.to_release.is_none() {
            wake = wake.min(self.resp_queue.trigger_time().max(now));
        }

        if !wake.is_never() {
            out.wake_at = Some(wake);
        }
        out
    }

    /// Commits one selected command: updates every affected component and
    /// retires the transaction on a CAS.
    fn commit(
        &mut self,
        tuple: CommandTuple,
        now: SimTime,
        pool: &mut TransactionPool,
        out: &mut ControllerOutput,
    ) {
        let cmd = tuple.command;
        let target = tuple.target;
        debug_assert!(tuple.earliest <= now);

        for b in self.affected_banks(cmd, target.rank, target.bank) {
            self.banks[b].update(cmd, pool);
        }
        self.refresh[target.rank.idx()].update(cmd, now);
        self.power_down[target.rank.idx()].update(cmd, now);
        self.checker
            .insert(cmd, target.rank, target.bank_group, target.bank, now);

        let (mut row, mut column) = (Row::NONE, Column(0));
        if let Some(id) = target.trans {
            let tag = pool.get(id).controller;
            row = tag.row;
            column = tag.column;
        }

        if cmd.is_cas() {
            let Some(id) = target.trans else {
                panic!("CAS without a transaction")
            };
            self.scheduler.remove_request(id, pool);
            let window = self.memspec.interval_on_data_strobe(cmd);
            self.resp_queue.insert(id, now + window.end);
            self.rank_payloads[target.rank.idx()] -= 1;
            if self.rank_payloads[target.rank.idx()] == 0 {
                self.power_down[target.rank.idx()].trigger_entry(now);
            }
        }

        debug!(
            channel = self.channel.idx(),
            %cmd,
            rank = target.rank.idx(),
            bank = target.bank.idx(),
            time = now.ps(),
            "command committed"
        );
        out.commands.push(CommandRecord {
            time: now,
            channel: self.channel,
            command: cmd,
            rank: target.rank,
            bank_group: target.bank_group,
            bank: target.bank,
            row,
            column,
            trans: target.trans,
        });
    }

    /// Global bank indices a command applies to (mirrors the checker's view).
    fn affected_banks(&self, cmd: Command, rank: Rank, bank: Bank) -> Vec<usize> {
        let bpr = self.memspec.banks_per_rank;
        let rank_base = rank.idx() * bpr;
        if cmd.is_rank() {
            (rank_base..rank_base + bpr).collect()
        } else if matches!(cmd, Command::Refp2b | Command::Rfmp2b) {
            vec![bank.idx(), bank.idx() + self.memspec.per2bank_offset]
        } else if cmd.is_group() {
            let per_group = self.memspec.banks_per_group;
            let in_group = bank.idx() % per_group;
            (0..self.memspec.groups_per_rank)
                .map(|g| rank_base + g * per_group + in_group)
                .collect()
        } else {
            vec![bank.idx()]
        }
    }

    /// Number of requests currently buffered in the scheduler.
    pub fn pending_requests(&self) -> usize {
        self.scheduler.pending()
    }

    /// Number of payloads owned by this channel (buffered or awaiting response).
    pub fn total_payloads(&self) -> usize {
        self.total_payloads
    }

    /// Per-accounting-unit scheduler buffer occupancy.
    pub fn buffer_depth(&self) -> Vec<usize> {
        self.scheduler.buffer_depth()
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("channel", &self.channel)
            .field("total_payloads", &self.total_payloads)
            .field("served", &self.served)
            .finish()
    }
}
