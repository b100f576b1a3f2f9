//! Arbiter dispatch and ordering tests.

use std::sync::Arc;

use dramsim_core::arbiter::{Arbiter, DownstreamPhase};
use dramsim_core::common::coords::{Bank, Row, Thread};
use dramsim_core::common::time::SimTime;
use dramsim_core::common::transaction::{TransKind, TransactionPool};
use dramsim_core::config::ArbiterPolicy;
use dramsim_core::controller::UpstreamPhase;
use dramsim_core::memspec::MemSpec;

use crate::common::{config_with, ddr3_json, make_addr_trans};

fn arbiter_and_pool() -> (Arbiter, TransactionPool) {
    arbiter_with_policy(ArbiterPolicy::Simple)
}

fn arbiter_with_policy(policy: ArbiterPolicy) -> (Arbiter, TransactionPool) {
    let cfg = config_with(&ddr3_json(), |c| {
        c.mc.arbiter = policy;
    });
    let memspec = Arc::new(MemSpec::from_config(&cfg.memspec).unwrap());
    (Arbiter::new(&cfg, memspec, 2).unwrap(), TransactionPool::new())
}

#[test]
fn begin_req_tags_the_transaction_from_the_decoder() {
    let (mut arbiter, mut pool) = arbiter_and_pool();
    // row 5, bank 3, column 9 under the DDR3 test mapping.
    let addr = (5 << 16) | (3 << 13) | (9 << 3);
    let id = make_addr_trans(&mut pool, Thread(0), TransKind::Read, addr);

    let out = arbiter.begin_req(id, SimTime::ZERO, &mut pool).unwrap();
    assert_eq!(out.to_controller.len(), 1);
    assert_eq!(out.to_controller[0].2, DownstreamPhase::BeginReq);

    let tag = pool.get(id).controller;
    assert_eq!(tag.bank, Bank(3));
    assert_eq!(tag.row, Row(5));
    assert_eq!(tag.column.val(), 9);
    assert_eq!(tag.channel_payload_id, 0);
}

#[test]
fn channel_payload_ids_are_monotone() {
    let (mut arbiter, mut pool) = arbiter_and_pool();
    let a = make_addr_trans(&mut pool, Thread(0), TransKind::Read, 0);
    let b = make_addr_trans(&mut pool, Thread(1), TransKind::Read, 0x40);
    let _ = arbiter.begin_req(a, SimTime::ZERO, &mut pool).unwrap();
    let _ = arbiter.begin_req(b, SimTime::ZERO, &mut pool).unwrap();
    assert_eq!(pool.get(a).controller.channel_payload_id, 0);
    assert_eq!(pool.get(b).controller.channel_payload_id, 1);
}

#[test]
fn a_busy_channel_queues_and_dispatches_on_end_req() {
    let (mut arbiter, mut pool) = arbiter_and_pool();
    let a = make_addr_trans(&mut pool, Thread(0), TransKind::Read, 0);
    let b = make_addr_trans(&mut pool, Thread(0), TransKind::Read, 0x40);

    let first = arbiter.begin_req(a, SimTime::ZERO, &mut pool).unwrap();
    assert_eq!(first.to_controller.len(), 1);
    let second = arbiter.begin_req(b, SimTime::ZERO, &mut pool).unwrap();
    assert!(second.to_controller.is_empty(), "channel busy, queued");

    let acked = arbiter.end_req(a, &pool);
    assert_eq!(acked.to_initiator[0], (Thread(0), a, UpstreamPhase::EndReq));
    assert_eq!(
        acked.to_controller[0],
        (pool.get(b).arbiter.channel, b, DownstreamPhase::BeginReq)
    );
}

#[test]
fn per_thread_responses_are_serialized() {
    let (mut arbiter, mut pool) = arbiter_and_pool();
    let a = make_addr_trans(&mut pool, Thread(0), TransKind::Read, 0);
    let b = make_addr_trans(&mut pool, Thread(0), TransKind::Read, 0x40);
    let _ = arbiter.begin_req(a, SimTime::ZERO, &mut pool).unwrap();
    let end = arbiter.end_req(a, &pool);
    drop(end);
    let _ = arbiter.begin_req(b, SimTime::ZERO, &mut pool).unwrap();

    let first = arbiter.begin_resp(a, &pool);
    assert_eq!(first.to_initiator.len(), 1, "first response goes straight up");
    let second = arbiter.begin_resp(b, &pool);
    assert!(second.to_initiator.is_empty(), "held behind the first");

    let done = arbiter.end_resp(a, &mut pool);
    assert_eq!(done.to_controller[0].2, DownstreamPhase::EndResp);
    assert_eq!(done.released, vec![a]);
    assert_eq!(done.to_initiator[0], (Thread(0), b, UpstreamPhase::BeginResp));
}

#[test]
fn responses_to_different_threads_do_not_interfere() {
    let (mut arbiter, mut pool) = arbiter_and_pool();
    let a = make_addr_trans(&mut pool, Thread(0), TransKind::Read, 0);
    let b = make_addr_trans(&mut pool, Thread(1), TransKind::Read, 0x40);
    let _ = arbiter.begin_req(a, SimTime::ZERO, &mut pool).unwrap();
    let _ = arbiter.end_req(a, &pool);
    let _ = arbiter.begin_req(b, SimTime::ZERO, &mut pool).unwrap();
    let _ = arbiter.end_req(b, &pool);

    let first = arbiter.begin_resp(a, &pool);
    let second = arbiter.begin_resp(b, &pool);
    assert_eq!(first.to_initiator.len(), 1);
    assert_eq!(second.to_initiator.len(), 1, "different thread, no queueing");
}

#[test]
fn fifo_policy_does_not_stall_a_free_channel() {
    let (mut arbiter, mut pool) = arbiter_with_policy(ArbiterPolicy::Fifo);
    let a = make_addr_trans(&mut pool, Thread(0), TransKind::Read, 0);

    // Through the queue and straight out again: the channel was free.
    let out = arbiter.begin_req(a, SimTime::ZERO, &mut pool).unwrap();
    assert_eq!(out.to_controller, vec![(
        pool.get(a).arbiter.channel,
        a,
        DownstreamPhase::BeginReq
    )]);
}

#[test]
fn fifo_policy_preserves_arrival_order_under_load() {
    let (mut arbiter, mut pool) = arbiter_with_policy(ArbiterPolicy::Fifo);
    let a = make_addr_trans(&mut pool, Thread(0), TransKind::Read, 0);
    let b = make_addr_trans(&mut pool, Thread(0), TransKind::Read, 0x40);
    let c = make_addr_trans(&mut pool, Thread(1), TransKind::Read, 0x80);

    let first = arbiter.begin_req(a, SimTime::ZERO, &mut pool).unwrap();
    assert_eq!(first.to_controller.len(), 1);
    let queued = arbiter.begin_req(b, SimTime::ZERO, &mut pool).unwrap();
    assert!(queued.to_controller.is_empty());
    let queued = arbiter.begin_req(c, SimTime::ZERO, &mut pool).unwrap();
    assert!(queued.to_controller.is_empty());

    let acked = arbiter.end_req(a, &pool);
    assert_eq!(acked.to_controller[0].1, b);
    let acked = arbiter.end_req(b, &pool);
    assert_eq!(acked.to_controller[0].1, c);
}

#[test]
fn reorder_policy_behaves_as_fifo() {
    let (mut arbiter, mut pool) = arbiter_with_policy(ArbiterPolicy::Reorder);
    let a = make_addr_trans(&mut pool, Thread(0), TransKind::Read, 0);
    let b = make_addr_trans(&mut pool, Thread(0), TransKind::Read, 0x40);

    let first = arbiter.begin_req(a, SimTime::ZERO, &mut pool).unwrap();
    assert_eq!(first.to_controller.len(), 1);
    let queued = arbiter.begin_req(b, SimTime::ZERO, &mut pool).unwrap();
    assert!(queued.to_controller.is_empty());

    let acked = arbiter.end_req(a, &pool);
    assert_eq!(acked.to_controller[0].1, b);
}

#[test]
fn the_address_offset_is_applied_before_decoding() {
    let cfg = crate::common::config_with(&ddr3_json(), |c| {
        c.sim.address_offset = 1 << 16;
    });
    let memspec = Arc::new(MemSpec::from_config(&cfg.memspec).unwrap());
    let mut arbiter = Arbiter::new(&cfg, memspec, 1).unwrap();
    let mut pool = TransactionPool::new();

    // Row 3 once the one-row offset is subtracted.
    let id = make_addr_trans(&mut pool, Thread(0), TransKind::Read, 4 << 16);
    let _ = arbiter.begin_req(id, SimTime::ZERO, &mut pool).unwrap();
    assert_eq!(pool.get(id).controller.row, Row(3));
}
