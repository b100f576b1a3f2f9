//! The arbiter front end.
//!
//! One arbiter per system sits between the initiators and the per-channel
//! controllers. On entry it applies the configured address offset, decodes the
//! address, attaches both transaction tags, and dispatches to the target
//! channel: the `Simple` policy forwards immediately while the channel's
//! request phase is free, the `Fifo` policy routes every request through the
//! per-channel queue (`Reorder` is accepted and behaves as `Fifo`). On the way
//! back it serialises responses per thread so each initiator sees BEGIN_RESP
//! in order, one at a time.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::trace;

use crate::common::coords::{Bank, BankGroup, Channel, Column, Rank, Row, Thread};
use crate::common::time::SimTime;
use crate::common::transaction::{TransId, TransactionPool};
use crate::common::ConfigError;
use crate::config::{ArbiterPolicy, Config};
use crate::controller::UpstreamPhase;
use crate::memspec::MemSpec;

/// Bit-extraction address decoder.
pub mod decoder;

use decoder::AddressDecoder;

/// Phase the arbiter forwards down to a controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownstreamPhase {
    /// New request for the channel.
    BeginReq,
    /// Initiator acknowledged the response.
    EndResp,
}

/// Everything one arbiter step wants the simulator to route.
#[derive(Debug, Default)]
pub struct ArbiterOutput {
    /// Phases to forward to controllers.
    pub to_controller: Vec<(Channel, TransId, DownstreamPhase)>,
    /// Phases to forward to initiators.
    pub to_initiator: Vec<(Thread, TransId, UpstreamPhase)>,
    /// Transactions whose arbiter reference was dropped this step.
    pub released: Vec<TransId>,
}

/// The system front end.
pub struct Arbiter {
    memspec: Arc<MemSpec>,
    policy: ArbiterPolicy,
    decoder: AddressDecoder,
    address_offset: u64,
    channel_free: Vec<bool>,
    pending_requests: Vec<VecDeque<TransId>>,
    pending_responses: Vec<VecDeque<TransId>>,
    next_channel_payload_id: Vec<u64>,
    next_thread_payload_id: Vec<u64>,
}

impl Arbiter {
    /// Builds the arbiter and its address decoder.
    ///
    /// # Arguments
    ///
    /// * `config` - The full configuration bundle (arbiter policy, address
    ///   offset, and address mapping).
    /// * `memspec` - The memspec in force; validates the mapping geometry.
    /// * `threads` - Number of initiator threads to serialise responses for.
    ///
    /// # Returns
    ///
    /// The arbiter with free channels and empty queues.
    ///
    /// # Errors
    ///
    /// Fails when the address mapping does not match the memspec geometry.
    pub fn new(
        config: &Config,
        memspec: Arc<MemSpec>,
        threads: usize,
    ) -> Result<Self, ConfigError> {
        let decoder = AddressDecoder::new(&config.address_mapping, &memspec)?;
        let channels = memspec.channels;
        Ok(Self {
            policy: config.mc.arbiter,
            decoder,
            address_offset: config.sim.address_offset,
            channel_free: vec![true; channels],
            pending_requests: vec![VecDeque::new(); channels],
            pending_responses: vec![VecDeque::new(); threads],
            next_channel_payload_id: vec![0; channels],
            next_thread_payload_id: vec![0; threads],
            memspec,
        })
    }

    /// BEGIN_REQ from an initiator: tag, acquire, and dispatch or enqueue.
    ///
    /// Under the `Simple` policy the request is forwarded immediately while
    /// the channel is free; under `Fifo`/`Reorder` every request passes
    /// through the per-channel queue first.
    ///
    /// # Arguments
    ///
    /// * `id` - The incoming transaction.
    /// * `now` - Current simulated time (stamped as the generation time).
    /// * `pool` - Pool holding the transaction.
    ///
    /// # Returns
    ///
    /// The phases to route: one BEGIN_REQ to the target controller, or
    /// nothing when the channel is busy.
    ///
    /// # Errors
    ///
    /// Fails when the transaction is an unmaskable partial write.
    pub fn begin_req(
        &mut self,
        id: TransId,
        now: SimTime,
        pool: &mut TransactionPool,
    ) -> Result<ArbiterOutput, ConfigError> {
        let mut out = ArbiterOutput::default();

        {
            let trans = pool.get_mut(id);
            trans.address = trans.address.wrapping_sub(self.address_offset);
        }
        self.memspec.check_masked_write(pool.get(id))?;

        let decoded = self.decoder.decode(pool.get(id).address);
        let channel = Channel(decoded.channel);
        let thread = pool.get(id).arbiter.thread;
        {
            let trans = pool.get_mut(id);
            trans.arbiter.channel = channel;
            trans.arbiter.thread_payload_id = self.next_thread_payload_id[thread.idx()];
            trans.arbiter.time_of_generation = now;
            trans.controller.channel_payload_id = self.next_channel_payload_id[channel.idx()];
            trans.controller.rank = Rank(decoded.rank);
            trans.controller.bank_group = BankGroup(decoded.bank_group);
            trans.controller.bank = Bank(decoded.bank);
            trans.controller.row = Row(decoded.row);
            trans.controller.column = Column(decoded.column);
            trans.controller.burst_length = self.memspec.burst_length;
        }
        self.next_thread_payload_id[thread.idx()] += 1;
        self.next_channel_payload_id[channel.idx()] += 1;
        pool.acquire(id);

        match self.policy {
            ArbiterPolicy::Simple => {
                if self.channel_free[channel.idx()] {
                    self.channel_free[channel.idx()] = false;
                    out.to_controller
                        .push((channel, id, DownstreamPhase::BeginReq));
                } else {
                    trace!(channel = channel.idx(), trans = id.0, "channel busy, queued");
                    self.pending_requests[channel.idx()].push_back(id);
                }
            }
            ArbiterPolicy::Fifo | ArbiterPolicy::Reorder => {
                self.pending_requests[channel.idx()].push_back(id);
                if self.channel_free[channel.idx()] {
                    if let Some(next) = self.pending_requests[channel.idx()].pop_front() {
                        self.channel_free[channel.idx()] = false;
                        out.to_controller
                            .push((channel, next, DownstreamPhase::BeginReq));
                    }
                } else {
                    trace!(channel = channel.idx(), trans = id.0, "channel busy, queued");
                }
            }
        }
        Ok(out)
    }

    /// END_REQ from a controller: free the channel and dispatch the next request.
    ///
    /// # Arguments
    ///
    /// * `id` - The acknowledged transaction.
    /// * `pool` - Pool holding the transaction.
    ///
    /// # Returns
    ///
    /// The END_REQ for the initiator, plus the next queued BEGIN_REQ for the
    /// channel if one is waiting.
    pub fn end_req(&mut self, id: TransId, pool: &TransactionPool) -> ArbiterOutput {
        let mut out = ArbiterOutput::default();
        let channel = pool.get(id).arbiter.channel;
        let thread = pool.get(id).arbiter.thread;

        self.channel_free[channel.idx()] = true;
        out.to_initiator.push((thread, id, UpstreamPhase::EndReq));

        if let Some(next) = self.pending_requests[channel.idx()].pop_front() {
            self.channel_free[channel.idx()] = false;
            out.to_controller
                .push((channel, next, DownstreamPhase::BeginReq));
        }
        out
    }

    /// BEGIN_RESP from a controller: forward when the thread has no response
    /// in flight; queue it either way.
    ///
    /// # Arguments
    ///
    /// * `id` - The completed transaction.
    /// * `pool` - Pool holding the transaction.
    ///
    /// # Returns
    ///
    /// The BEGIN_RESP for the initiator, or nothing while an earlier response
    /// to the same thread is still unacknowledged.
    pub fn begin_resp(&mut self, id: TransId, pool: &TransactionPool) -> ArbiterOutput {
        let mut out = ArbiterOutput::default();
        let thread = pool.get(id).arbiter.thread;

        if self.pending_responses[thread.idx()].is_empty() {
            out.to_initiator.push((thread, id, UpstreamPhase::BeginResp));
        }
        self.pending_responses[thread.idx()].push_back(id);
        out
    }

    /// END_RESP from an initiator: forward downstream, drop the arbiter
    /// reference, and raise the thread's next queued response.
    ///
    /// # Arguments
    ///
    /// * `id` - The acknowledged transaction.
    /// * `pool` - Pool holding the transaction; its arbiter reference is
    ///   released here.
    ///
    /// # Returns
    ///
    /// The END_RESP for the controller, plus the next BEGIN_RESP for the
    /// thread if one is queued.
    pub fn end_resp(&mut self, id: TransId, pool: &mut TransactionPool) -> ArbiterOutput {
        let mut out = ArbiterOutput::default();
        let channel = pool.get(id).arbiter.channel;
        let thread = pool.get(id).arbiter.thread;

        out.to_controller
            .push((channel, id, DownstreamPhase::EndResp));

        let front = self.pending_responses[thread.idx()].pop_front();
        debug_assert_eq!(front, Some(id), "END_RESP out of per-thread order");
        let _ = pool.release(id);
        out.released.push(id);

        if let Some(&next) = self.pending_responses[thread.idx()].front() {
            out.to_initiator
                .push((thread, next, UpstreamPhase::BeginResp));
        }
        out
    }

    /// The decoder, for diagnostics and tests.
    ///
    /// # Returns
    ///
    /// A shared borrow of the address decoder.
    pub fn decoder(&self) -> &AddressDecoder {
        &self.decoder
    }
}

impl std::fmt::Debug for Arbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arbiter")
            .field("policy", &self.policy)
            .field("channels", &self.channel_free.len())
            .field("threads", &self.pending_responses.len())
            .finish()
    }
}
