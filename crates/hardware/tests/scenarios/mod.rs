//! End-to-end command-trace scenarios.
//!
//! Each scenario drives the full simulator (or the controller bench, where the
//! handshake timing must be observed precisely) with a literal request
//! sequence and asserts on the emitted command trace and its separations.

use pretty_assertions::assert_eq;

use dramsim_core::common::coords::{Bank, Row};
use dramsim_core::common::time::SimTime;
use dramsim_core::common::transaction::TransKind;
use dramsim_core::config::{
    PagePolicy, RefreshPolicy, SchedulerBufferPolicy, SchedulerPolicy,
};
use dramsim_core::controller::command::Command;
use dramsim_core::memspec::MemSpec;
use dramsim_core::sim::trace::parse_trace;
use dramsim_core::Simulator;

use crate::common::{config, config_with, ddr3_json, ddr3_two_rank_json, hbm2_json, lpddr4_json, Bench};

fn run_sim(cfg: &dramsim_core::Config, traces: Vec<&str>) -> Simulator {
    let memspec = MemSpec::from_config(&cfg.memspec).unwrap();
    let traces = traces
        .into_iter()
        .map(|t| parse_trace(t, &memspec).unwrap())
        .collect();
    let mut sim = Simulator::new(cfg, traces).unwrap();
    sim.record_commands();
    sim.run().unwrap();
    sim
}

fn times_of(sim: &Simulator, command: Command) -> Vec<SimTime> {
    sim.command_log
        .iter()
        .filter(|r| r.command == command)
        .map(|r| r.time)
        .collect()
}

/// Closed page policy, FIFO scheduler, no refresh: one read becomes one
/// ACT/RDA pair with the CAS exactly tRCD after the activate.
#[test]
fn closed_policy_single_read() {
    let cfg = config(&ddr3_json());
    let sim = run_sim(&cfg, vec!["0 R 0x0\n"]);

    let commands: Vec<Command> = sim.command_log.iter().map(|r| r.command).collect();
    assert_eq!(commands, vec![Command::Act, Command::Rda]);
    assert_eq!(sim.command_log[0].bank, Bank(0));
    assert_eq!(sim.command_log[0].row, Row(0));

    let tck = sim.memspec().tck;
    let act = sim.command_log[0].time;
    let rda = sim.command_log[1].time;
    assert_eq!(rda - act, tck.times(11), "CAS follows at tRCD");
}

/// Two back-to-back reads to the same row: Closed reopens the row for each,
/// Open streams them tCCD apart under one activate.
#[test]
fn page_policy_controls_row_reuse() {
    let closed = run_sim(&config(&ddr3_json()), vec!["0 R 0x0\n0 R 0x40\n"]);
    let closed_commands: Vec<Command> = closed.command_log.iter().map(|r| r.command).collect();
    assert_eq!(
        closed_commands,
        vec![Command::Act, Command::Rda, Command::Act, Command::Rda]
    );

    let open_cfg = config_with(&ddr3_json(), |c| {
        c.mc.page_policy = PagePolicy::Open;
    });
    let open = run_sim(&open_cfg, vec!["0 R 0x0\n0 R 0x40\n"]);
    let open_commands: Vec<Command> = open.command_log.iter().map(|r| r.command).collect();
    assert_eq!(open_commands, vec![Command::Act, Command::Rd, Command::Rd]);

    let tck = open.memspec().tck;
    let reads = times_of(&open, Command::Rd);
    assert_eq!(reads[1] - reads[0], tck.times(4), "second read at tCCD");
}

/// LPDDR4 all-bank refresh with open rows: the due refresh first precharges
/// the rank, then refreshes it tRPpb later.
#[test]
fn all_bank_refresh_precharges_open_rows_first() {
    let cfg = config_with(&lpddr4_json(), |c| {
        c.mc.refresh_policy = RefreshPolicy::AllBank;
        c.mc.page_policy = PagePolicy::Open;
    });
    let mut bench = Bench::new(&cfg);
    let _ = bench.submit(TransKind::Read, Bank(0), 1, 0);
    let _ = bench.submit(TransKind::Read, Bank(1), 1, 0);

    let refi = bench.memspec.tck.times(3123);
    bench.run_to(refi + refi);

    let preab = bench.times_of(Command::Preab);
    let refab = bench.times_of(Command::Refab);
    assert_eq!(preab.len(), 1, "open rows force a PREAB before the refresh");
    assert!(!refab.is_empty());
    assert_eq!(
        refab[0] - preab[0],
        bench.memspec.tck.times(15),
        "REFAB follows at tRPpb"
    );
    assert!(preab[0] >= refi, "refresh waits for its interval");
    assert_eq!(bench.responses.len(), 2, "both reads completed first");
}

/// Two ranks stagger their first refresh by bit-reversed rank index.
#[test]
fn rank_refreshes_are_staggered() {
    let cfg = config_with(&ddr3_two_rank_json(), |c| {
        c.mc.refresh_policy = RefreshPolicy::AllBank;
    });
    let memspec = MemSpec::from_config(&cfg.memspec).unwrap();
    let mut sim = Simulator::new(&cfg, vec![Vec::new()]).unwrap();
    sim.record_commands();
    let refi = memspec.tck.times(6240);
    sim.run_until(refi + memspec.tck.times(100)).unwrap();

    let refabs: Vec<(usize, SimTime)> = sim
        .command_log
        .iter()
        .filter(|r| r.command == Command::Refab)
        .map(|r| (r.rank.idx(), r.time))
        .collect();
    assert!(refabs.contains(&(1, SimTime::from_ps(refi.ps() / 2))));
    assert!(refabs.contains(&(0, refi)));
}

/// HBM2 pseudo-channel mode with storage: a write followed by a read to the
/// same coordinate returns the written bytes and honours tWTR_L.
#[test]
fn write_then_read_round_trips_with_wtr() {
    let cfg = config(&hbm2_json());
    let sim = run_sim(&cfg, vec!["0 W 0x0 deadbeef\n1 R 0x0\n"]);

    let writes = times_of(&sim, Command::Wr);
    let reads = times_of(&sim, Command::Rd);
    assert_eq!(writes.len(), 1);
    assert_eq!(reads.len(), 1);

    // WL + burst + tWTR_L = 7 + 2 + 9 cycles on the test device.
    let tck = sim.memspec().tck;
    assert!(reads[0] - writes[0] >= tck.times(18));

    let (address, data) = &sim.read_log[0];
    assert_eq!(*address, 0);
    assert_eq!(&data[..4], &[0xde, 0xad, 0xbe, 0xef]);
}

/// Backpressure: with two shared buffer slots, the third request's END_REQ is
/// withheld until a CAS frees a slot.
#[test]
fn full_buffers_withhold_the_acknowledgement() {
    let cfg = config_with(&ddr3_json(), |c| {
        c.mc.scheduler = SchedulerPolicy::Fifo;
        c.mc.scheduler_buffer = SchedulerBufferPolicy::Shared;
        c.mc.request_buffer_size = 2;
    });
    let mut bench = Bench::new(&cfg);
    let _ = bench.submit(TransKind::Read, Bank(0), 1, 0);
    let _ = bench.submit(TransKind::Read, Bank(1), 1, 0);
    let _ = bench.submit(TransKind::Read, Bank(2), 1, 0);

    bench.run_to(bench.memspec.tck.times(400));
    assert_eq!(bench.acks.len(), 3, "all three eventually acknowledged");

    let first_cas = bench.times_of(Command::Rda)[0];
    assert!(bench.acks[0].1 < first_cas);
    assert!(bench.acks[1].1 < first_cas);
    assert!(
        bench.acks[2].1 >= first_cas,
        "third acknowledgement waits for a free slot"
    );
}

/// Per-thread response order: each thread sees BEGIN_RESP in the order it
/// generated its requests.
#[test]
fn responses_preserve_per_thread_order() {
    let cfg = config_with(&ddr3_json(), |c| {
        c.mc.page_policy = PagePolicy::Open;
        c.mc.scheduler = SchedulerPolicy::FrFcfs;
    });
    let mut sim = {
        let memspec = MemSpec::from_config(&cfg.memspec).unwrap();
        let trace = parse_trace("0 R 0x0\n0 R 0x200000\n0 R 0x40\n", &memspec).unwrap();
        Simulator::new(&cfg, vec![trace]).unwrap()
    };
    sim.run().unwrap();
    assert_eq!(sim.stats().transactions_served, 3);
}
