//! Top-level simulator: owns every component and drives the event loop.
//!
//! The simulator wires trace players, the arbiter, the per-channel controllers,
//! the transaction pool, the functional mirror, and the statistics sink around
//! the discrete-event queue. Phases travelling between components are routed
//! here, in the same virtual instant they were produced; only explicitly
//! delayed occurrences (handshake cycle delays, armed wake-ups, trace times)
//! go through the queue.

use std::sync::Arc;

use tracing::info;

use crate::arbiter::{Arbiter, ArbiterOutput, DownstreamPhase};
use crate::common::coords::{Channel, Thread};
use crate::common::time::SimTime;
use crate::common::transaction::TransactionPool;
use crate::common::ConfigError;
use crate::config::{Config, StoreMode};
use crate::controller::{CommandRecord, Controller, ControllerOutput, UpstreamPhase};
use crate::memspec::MemSpec;
use crate::sim::kernel::{Event, EventQueue};
use crate::sim::memory::MemoryMirror;
use crate::sim::trace::{TracePlayer, TraceRequest};
use crate::stats::SimStats;

/// The complete simulated system.
pub struct Simulator {
    memspec: Arc<MemSpec>,
    pool: TransactionPool,
    arbiter: Arbiter,
    controllers: Vec<Controller>,
    players: Vec<TracePlayer>,
    mirror: Option<MemoryMirror>,
    stats: SimStats,
    queue: EventQueue,
    now: SimTime,
    /// Committed commands, kept when recording is enabled (tests, debugging).
    pub command_log: Vec<CommandRecord>,
    /// Data returned by reads against the mirror, kept when recording.
    pub read_log: Vec<(u64, Vec<u8>)>,
    record_commands: bool,
}

impl Simulator {
    /// Builds the system from a configuration bundle and one trace per thread.
    ///
    /// # Errors
    ///
    /// Any construction failure (memspec keys, mapping mismatch, unsupported
    /// policy for the standard) is returned as a fatal error.
    pub fn new(config: &Config, traces: Vec<Vec<TraceRequest>>) -> Result<Self, ConfigError> {
        let memspec = Arc::new(MemSpec::from_config(&config.memspec)?);
        info!(
            standard = memspec.memory_type.name(),
            channels = memspec.channels,
            ranks = memspec.ranks_per_channel,
            banks = memspec.banks_per_rank,
            size_bytes = memspec.memory_size_bytes(),
            "memory configuration"
        );

        let threads = traces.len().max(1);
        let arbiter = Arbiter::new(config, Arc::clone(&memspec), threads)?;
        let controllers = (0..memspec.channels)
            .map(|c| Controller::new(&config.mc, Arc::clone(&memspec), Channel(c)))
            .collect::<Result<Vec<_>, _>>()?;
        let players: Vec<TracePlayer> = traces
            .into_iter()
            .enumerate()
            .map(|(t, requests)| {
                TracePlayer::new(
                    Thread(t),
                    requests,
                    config.mc.max_active_transactions,
                    &memspec,
                )
            })
            .collect();

        let mut queue = EventQueue::new();
        for player in &players {
            queue.push(SimTime::ZERO, Event::Stimulus(player.thread()));
        }
        // Initial firing of every controller arms the refresh/power-down chains.
        for c in 0..memspec.channels {
            queue.push(SimTime::ZERO, Event::Controller(Channel(c)));
        }

        Ok(Self {
            arbiter,
            controllers,
            players,
            mirror: (config.sim.store_mode == StoreMode::Store).then(MemoryMirror::new),
            stats: SimStats::new(&memspec, config.sim.enable_windowing, config.sim.window_size),
            pool: TransactionPool::new(),
            queue,
            now: SimTime::ZERO,
            command_log: Vec::new(),
            read_log: Vec::new(),
            record_commands: false,
            memspec,
        })
    }

    /// Keep every committed command in [`Simulator::command_log`].
    pub fn record_commands(&mut self) {
        self.record_commands = true;
    }

    /// Current virtual time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// The memspec in force.
    pub fn memspec(&self) -> &MemSpec {
        &self.memspec
    }

    /// Runs until every trace has drained and no transaction is in flight.
    ///
    /// Refresh and power-down wake-ups re-arm forever, so the loop stops on
    /// drain rather than on queue exhaustion.
    ///
    /// # Errors
    ///
    /// Propagates fatal ingest errors (unmaskable masked write).
    pub fn run(&mut self) -> Result<(), ConfigError> {
        while let Some((time, event)) = self.queue.pop() {
            debug_assert!(time >= self.now, "time ran backwards");
            self.now = time;
            self.dispatch(event)?;
            if self.players.iter().all(TracePlayer::is_done) && self.pool.live() == 0 {
                break;
            }
        }
        self.seal_stats();
        Ok(())
    }

    /// Runs until virtual time would pass `limit` (inclusive).
    ///
    /// # Errors
    ///
    /// Propagates fatal ingest errors (unmaskable masked write).
    pub fn run_until(&mut self, limit: SimTime) -> Result<(), ConfigError> {
        while let Some((time, event)) = self.queue.pop() {
            if time > limit {
                break;
            }
            debug_assert!(time >= self.now, "time ran backwards");
            self.now = time;
            self.dispatch(event)?;
        }
        self.seal_stats();
        Ok(())
    }

    fn seal_stats(&mut self) {
        let latency_total = self
            .players
            .iter()
            .fold(SimTime::ZERO, |acc, p| acc + p.latency_total);
        let completed = self.players.iter().map(|p| p.completed).sum();
        self.stats.finish(self.now, latency_total, completed);
    }

    /// Final statistics (meaningful after [`Simulator::run`]).
    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    fn dispatch(&mut self, event: Event) -> Result<(), ConfigError> {
        match event {
            Event::Stimulus(thread) => self.stimulus(thread),
            Event::Controller(channel) => {
                let out = self.controllers[channel.idx()].controller_method(self.now, &mut self.pool);
                self.route_controller(channel, out);
            }
            Event::ArbiterBeginReq(id) => {
                let out = self.arbiter.begin_req(id, self.now, &mut self.pool)?;
                self.route_arbiter(out);
            }
            Event::ArbiterEndResp(id) => {
                // The initiator treats the transaction as complete the moment
                // it acknowledges the response.
                let tag = self.pool.get(id).arbiter;
                self.players[tag.thread.idx()].on_complete(tag.time_of_generation, self.now);
                self.stats.record_completion(self.now);
                let _ = self.pool.release(id);
                let out = self.arbiter.end_resp(id, &mut self.pool);
                self.route_arbiter(out);
                self.queue.push(self.now, Event::Stimulus(tag.thread));
            }
        }
        Ok(())
    }

    /// Lets a thread's player issue its next request, or re-arms its timer.
    fn stimulus(&mut self, thread: Thread) {
        match self.players[thread.idx()].try_issue(self.now, &mut self.pool) {
            Some(Ok(id)) => {
                // Entry is aligned to the next clock edge.
                let at = self.now.align_up(self.memspec.tck);
                self.queue.push(at, Event::ArbiterBeginReq(id));
            }
            Some(Err(retry_at)) => self.queue.push(retry_at, Event::Stimulus(thread)),
            None => {}
        }
    }

    fn route_controller(&mut self, channel: Channel, out: ControllerOutput) {
        for record in &out.commands {
            self.apply_command(record);
            self.stats.record_command(record);
            if self.record_commands {
                self.command_log.push(*record);
            }
        }
        for (id, phase) in out.upstream {
            let arb_out = match phase {
                UpstreamPhase::EndReq => self.arbiter.end_req(id, &self.pool),
                UpstreamPhase::BeginResp => self.arbiter.begin_resp(id, &self.pool),
            };
            self.route_arbiter(arb_out);
        }
        if let Some(wake) = out.wake_at {
            self.queue.push(wake.max(self.now), Event::Controller(channel));
        }
    }

    fn route_arbiter(&mut self, out: ArbiterOutput) {
        for (channel, id, phase) in out.to_controller {
            let fire_at = match phase {
                DownstreamPhase::BeginReq => {
                    self.controllers[channel.idx()].begin_req(id, self.now)
                }
                DownstreamPhase::EndResp => self.controllers[channel.idx()].end_resp(self.now),
            };
            self.queue.push(fire_at, Event::Controller(channel));
        }
        for (thread, id, phase) in out.to_initiator {
            match phase {
                UpstreamPhase::EndReq => {
                    self.players[thread.idx()].on_end_req();
                    self.queue.push(self.now, Event::Stimulus(thread));
                }
                UpstreamPhase::BeginResp => {
                    // The initiator acknowledges one cycle later.
                    self.queue
                        .push(self.now + self.memspec.tck, Event::ArbiterEndResp(id));
                }
            }
        }
    }

    /// Applies a committed CAS to the functional mirror.
    fn apply_command(&mut self, record: &CommandRecord) {
        let Some(mirror) = self.mirror.as_mut() else {
            return;
        };
        let Some(id) = record.trans else {
            return;
        };
        let access_bytes = (u64::from(self.memspec.burst_length)
            * u64::from(self.memspec.bit_width)
            * self.memspec.devices_per_rank as u64
            / 8) as usize;
        if record.command.is_write() {
            let trans = self.pool.get(id);
            mirror.write(trans.address, &trans.data, trans.byte_enables.as_deref());
        } else if record.command.is_read() {
            let trans = self.pool.get_mut(id);
            trans.data = mirror.read(trans.address, access_bytes);
            if self.record_commands {
                let (address, data) = (trans.address, trans.data.clone());
                self.read_log.push((address, data));
            }
        }
    }

    /// The functional mirror, when `StoreMode: Store` is configured.
    pub fn mirror(&self) -> Option<&MemoryMirror> {
        self.mirror.as_ref()
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("now", &self.now)
            .field("channels", &self.controllers.len())
            .finish()
    }
}
