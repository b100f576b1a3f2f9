//! Command multiplexer.
//!
//! Once per controller firing the multiplexer looks at every ready candidate
//! (one per bank machine, plus refresh and power-down candidates per rank) and
//! commits at most one to the command bus.

use crate::common::time::SimTime;
use crate::common::transaction::{TransId, TransactionPool};
use crate::config::CmdMuxPolicy;
use crate::controller::command::CommandTuple;

/// The command multiplexer.
#[derive(Debug)]
pub struct CmdMux {
    policy: CmdMuxPolicy,
}

impl CmdMux {
    /// Creates a multiplexer with the configured policy.
    pub fn new(policy: CmdMuxPolicy) -> Self {
        Self { policy }
    }

    /// Picks one command to issue at `now`, or `None` to stay idle this cycle.
    ///
    /// Maintenance candidates (refresh/power-down, no transaction attached)
    /// outrank bank candidates under both policies. `oldest_pending` is the
    /// oldest transaction still buffered in the scheduler; Strict refuses to
    /// issue for any other transaction even when it is ready.
    pub fn select(
        &self,
        candidates: &[CommandTuple],
        pool: &TransactionPool,
        oldest_pending: Option<TransId>,
        now: SimTime,
    ) -> Option<CommandTuple> {
        match self.policy {
            CmdMuxPolicy::Oldest => candidates
                .iter()
                .filter(|c| c.earliest <= now)
                .min_by_key(|c| {
                    let payload_id = c
                        .target
                        .trans
                        .map_or(0, |id| pool.get(id).controller.channel_payload_id);
                    let class = usize::from(c.target.trans.is_some());
                    (c.earliest, class, payload_id)
                })
                .copied(),
            CmdMuxPolicy::Strict => {
                // Maintenance first; it does not belong to the transaction order.
                if let Some(maintenance) = candidates
                    .iter()
                    .find(|c| c.target.trans.is_none() && c.earliest <= now)
                {
                    return Some(*maintenance);
                }
                let oldest = oldest_pending?;
                let candidate = candidates
                    .iter()
                    .find(|c| c.target.trans == Some(oldest))?;
                (candidate.earliest <= now).then_some(*candidate)
            }
        }
    }
}
