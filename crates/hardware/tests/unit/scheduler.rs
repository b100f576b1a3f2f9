//! Request scheduler unit tests.

use dramsim_core::common::coords::{Bank, Row};
use dramsim_core::common::transaction::{TransKind, TransactionPool};
use dramsim_core::config::{McConfig, SchedulerBufferPolicy, SchedulerPolicy};
use dramsim_core::controller::bank_machine::BankState;
use dramsim_core::controller::scheduler::Scheduler;
use dramsim_core::memspec::MemSpec;

use crate::common::{config, ddr3_json, make_trans};

struct Rig {
    memspec: MemSpec,
    pool: TransactionPool,
}

fn rig() -> Rig {
    let cfg = config(&ddr3_json());
    let memspec = MemSpec::from_config(&cfg.memspec).unwrap();
    Rig {
        memspec,
        pool: TransactionPool::new(),
    }
}

fn scheduler(rig: &Rig, policy: SchedulerPolicy) -> Scheduler {
    let config = McConfig {
        scheduler: policy,
        ..McConfig::default()
    };
    Scheduler::new(&config, &rig.memspec)
}

#[test]
fn fifo_serves_in_arrival_order() {
    let mut r = rig();
    let mut s = scheduler(&r, SchedulerPolicy::Fifo);
    let a = make_trans(&mut r.pool, &r.memspec, TransKind::Read, Bank(0), 1, 0, 0);
    let b = make_trans(&mut r.pool, &r.memspec, TransKind::Read, Bank(0), 2, 0, 1);
    s.store_request(a, &r.pool);
    s.store_request(b, &r.pool);

    assert_eq!(
        s.next_request(Bank(0), BankState::Activated, Row(2), &r.pool),
        Some(a),
        "FIFO ignores row hits"
    );
}

#[test]
fn frfcfs_prefers_row_hits_on_activated_banks() {
    let mut r = rig();
    let mut s = scheduler(&r, SchedulerPolicy::FrFcfs);
    let miss = make_trans(&mut r.pool, &r.memspec, TransKind::Read, Bank(0), 1, 0, 0);
    let hit = make_trans(&mut r.pool, &r.memspec, TransKind::Read, Bank(0), 2, 0, 1);
    s.store_request(miss, &r.pool);
    s.store_request(hit, &r.pool);

    assert_eq!(
        s.next_request(Bank(0), BankState::Activated, Row(2), &r.pool),
        Some(hit)
    );
    // A precharged bank falls back to arrival order.
    assert_eq!(
        s.next_request(Bank(0), BankState::Precharged, Row::NONE, &r.pool),
        Some(miss)
    );
}

#[test]
fn frfcfs_grp_prefers_last_direction_among_hits() {
    let mut r = rig();
    let mut s = scheduler(&r, SchedulerPolicy::FrFcfsGrp);
    // Seed the direction with a write removal.
    let seed = make_trans(&mut r.pool, &r.memspec, TransKind::Write, Bank(1), 1, 0, 0);
    s.store_request(seed, &r.pool);
    s.remove_request(seed, &r.pool);

    let read_hit = make_trans(&mut r.pool, &r.memspec, TransKind::Read, Bank(0), 2, 0, 1);
    let write_hit = make_trans(&mut r.pool, &r.memspec, TransKind::Write, Bank(0), 2, 8, 2);
    s.store_request(read_hit, &r.pool);
    s.store_request(write_hit, &r.pool);

    assert_eq!(
        s.next_request(Bank(0), BankState::Activated, Row(2), &r.pool),
        Some(write_hit),
        "a later same-direction hit overtakes"
    );
}

#[test]
fn frfcfs_grp_does_not_reorder_over_an_address_hazard() {
    let mut r = rig();
    let mut s = scheduler(&r, SchedulerPolicy::FrFcfsGrp);
    let seed = make_trans(&mut r.pool, &r.memspec, TransKind::Write, Bank(1), 1, 0, 0);
    s.store_request(seed, &r.pool);
    s.remove_request(seed, &r.pool);

    // Read and write to the same column: the write may not overtake.
    let read_hit = make_trans(&mut r.pool, &r.memspec, TransKind::Read, Bank(0), 2, 0, 1);
    let write_hit = make_trans(&mut r.pool, &r.memspec, TransKind::Write, Bank(0), 2, 0, 2);
    s.store_request(read_hit, &r.pool);
    s.store_request(write_hit, &r.pool);

    assert_eq!(
        s.next_request(Bank(0), BankState::Activated, Row(2), &r.pool),
        Some(read_hit),
        "hazard falls through to the first row hit"
    );
}

#[test]
fn grp_frfcfs_serves_one_direction_until_dry() {
    let mut r = rig();
    let mut s = scheduler(&r, SchedulerPolicy::GrpFrFcfs);
    let a = make_trans(&mut r.pool, &r.memspec, TransKind::Read, Bank(0), 1, 0, 0);
    let w = make_trans(&mut r.pool, &r.memspec, TransKind::Write, Bank(0), 1, 8, 1);
    s.store_request(a, &r.pool);
    s.store_request(w, &r.pool);

    // Global direction starts at reads; the write waits.
    assert_eq!(
        s.next_request(Bank(0), BankState::Precharged, Row::NONE, &r.pool),
        Some(a)
    );
    s.remove_request(a, &r.pool);
    // Reads ran dry; direction flips to writes.
    assert_eq!(
        s.next_request(Bank(0), BankState::Precharged, Row::NONE, &r.pool),
        Some(w)
    );
}

#[test]
fn grp_frfcfs_wm_switches_on_the_high_watermark() {
    let mut r = rig();
    let config = McConfig {
        scheduler: SchedulerPolicy::GrpFrFcfsWm,
        low_watermark: 1,
        high_watermark: 2,
        ..McConfig::default()
    };
    let mut s = Scheduler::new(&config, &r.memspec);

    let rd = make_trans(&mut r.pool, &r.memspec, TransKind::Read, Bank(0), 1, 0, 0);
    let w1 = make_trans(&mut r.pool, &r.memspec, TransKind::Write, Bank(0), 1, 8, 1);
    s.store_request(rd, &r.pool);
    s.store_request(w1, &r.pool);
    // One write pending: stays in read mode.
    assert_eq!(
        s.next_request(Bank(0), BankState::Precharged, Row::NONE, &r.pool),
        Some(rd)
    );

    let w2 = make_trans(&mut r.pool, &r.memspec, TransKind::Write, Bank(0), 1, 16, 2);
    s.store_request(w2, &r.pool);
    // Write queue reached the high watermark: drain writes.
    assert_eq!(
        s.next_request(Bank(0), BankState::Precharged, Row::NONE, &r.pool),
        Some(w1)
    );
}

#[test]
fn further_hit_and_further_request_queries() {
    let mut r = rig();
    let mut s = scheduler(&r, SchedulerPolicy::FrFcfs);
    let a = make_trans(&mut r.pool, &r.memspec, TransKind::Read, Bank(0), 2, 0, 0);
    s.store_request(a, &r.pool);
    assert!(!s.has_further_request(Bank(0)));
    assert!(!s.has_further_row_hit(Bank(0), Row(2), &r.pool));

    let b = make_trans(&mut r.pool, &r.memspec, TransKind::Read, Bank(0), 2, 8, 1);
    s.store_request(b, &r.pool);
    assert!(s.has_further_request(Bank(0)));
    assert!(s.has_further_row_hit(Bank(0), Row(2), &r.pool));
    assert!(!s.has_further_row_hit(Bank(0), Row(3), &r.pool));
}

#[test]
fn shared_buffer_allows_one_transient_overcommit() {
    let mut r = rig();
    let config = McConfig {
        scheduler_buffer: SchedulerBufferPolicy::Shared,
        request_buffer_size: 2,
        ..McConfig::default()
    };
    let mut s = Scheduler::new(&config, &r.memspec);

    let a = make_trans(&mut r.pool, &r.memspec, TransKind::Read, Bank(0), 1, 0, 0);
    let b = make_trans(&mut r.pool, &r.memspec, TransKind::Read, Bank(1), 1, 0, 1);
    let c = make_trans(&mut r.pool, &r.memspec, TransKind::Read, Bank(2), 1, 0, 2);
    s.store_request(a, &r.pool);
    assert!(s.has_buffer_space());
    s.store_request(b, &r.pool);
    assert!(s.has_buffer_space(), "the in-flight slot is not counted");
    s.store_request(c, &r.pool);
    assert!(!s.has_buffer_space());

    s.remove_request(a, &r.pool);
    assert!(s.has_buffer_space());
}

#[test]
fn oldest_pending_tracks_channel_payload_order() {
    let mut r = rig();
    let mut s = scheduler(&r, SchedulerPolicy::FrFcfs);
    let late = make_trans(&mut r.pool, &r.memspec, TransKind::Read, Bank(3), 1, 0, 5);
    let early = make_trans(&mut r.pool, &r.memspec, TransKind::Read, Bank(1), 1, 0, 2);
    s.store_request(late, &r.pool);
    s.store_request(early, &r.pool);
    assert_eq!(s.oldest_pending(&r.pool), Some(early));
}
