//! Refresh manager unit tests.

use dramsim_core::common::coords::{Bank, Rank};
use dramsim_core::common::time::SimTime;
use dramsim_core::common::transaction::{TransKind, TransactionPool};
use dramsim_core::config::{Config, McConfig, PagePolicy, RefreshPolicy};
use dramsim_core::controller::bank_machine::BankMachine;
use dramsim_core::controller::checker::Checker;
use dramsim_core::controller::command::Command;
use dramsim_core::controller::power_down::PowerDownManager;
use dramsim_core::controller::refresh::RefreshManager;
use dramsim_core::controller::scheduler::Scheduler;
use dramsim_core::memspec::MemSpec;

use crate::common::{config, config_with, ddr3_json, ddr3_two_rank_json, lpddr4_json, make_trans};

struct Rig {
    memspec: MemSpec,
    checker: Checker,
    banks: Vec<BankMachine>,
    power_down: PowerDownManager,
    pool: TransactionPool,
    mc: McConfig,
}

fn rig(cfg: &Config) -> Rig {
    let memspec = MemSpec::from_config(&cfg.memspec).unwrap();
    let checker = Checker::new(&memspec);
    let banks = (0..memspec.banks_per_rank)
        .map(|b| BankMachine::new(cfg.mc.page_policy, Bank(b), &memspec, false))
        .collect();
    let power_down = PowerDownManager::new(&cfg.mc, &memspec, Rank(0));
    Rig {
        checker,
        banks,
        power_down,
        pool: TransactionPool::new(),
        mc: cfg.mc.clone(),
        memspec,
    }
}

fn all_bank_cfg(max_postponed: u32) -> Config {
    config_with(&ddr3_json(), |c| {
        c.mc.refresh_policy = RefreshPolicy::AllBank;
        c.mc.refresh_max_postponed = max_postponed;
        c.mc.page_policy = PagePolicy::Open;
    })
}

/// Makes bank 0 busy (a request pending, bank still precharged).
fn occupy_bank(rig: &mut Rig) {
    let id = make_trans(&mut rig.pool, &rig.memspec, TransKind::Read, Bank(0), 1, 0, 0);
    let mut scheduler = Scheduler::new(&rig.mc, &rig.memspec);
    scheduler.store_request(id, &rig.pool);
    let _ = rig.banks[0].evaluate(&scheduler, &rig.checker, &rig.pool, &rig.memspec);
    assert!(!rig.banks[0].is_idle());
}

#[test]
fn no_refresh_policy_is_inert() {
    let cfg = config(&ddr3_json());
    let mut r = rig(&cfg);
    let mut m = RefreshManager::new(&cfg.mc, &r.memspec, Rank(0)).unwrap();
    let wake = m.evaluate(SimTime::ZERO, &mut r.banks, &mut r.power_down, &r.checker);
    assert!(wake.is_never());
    assert!(m.next_command(SimTime::ZERO).is_none());
}

#[test]
fn per_bank_refresh_on_ddr3_is_rejected() {
    let cfg = config_with(&ddr3_json(), |c| {
        c.mc.refresh_policy = RefreshPolicy::PerBank;
    });
    let memspec = MemSpec::from_config(&cfg.memspec).unwrap();
    assert!(RefreshManager::new(&cfg.mc, &memspec, Rank(0)).is_err());
}

#[test]
fn all_bank_waits_for_the_first_trigger() {
    let cfg = all_bank_cfg(0);
    let mut r = rig(&cfg);
    let mut m = RefreshManager::new(&cfg.mc, &r.memspec, Rank(0)).unwrap();
    let refi = r.memspec.tck.times(6240);

    let wake = m.evaluate(SimTime::ZERO, &mut r.banks, &mut r.power_down, &r.checker);
    assert_eq!(wake, refi);
    assert!(m.next_command(SimTime::ZERO).is_none());
}

#[test]
fn all_bank_refreshes_an_idle_precharged_rank() {
    let cfg = all_bank_cfg(0);
    let mut r = rig(&cfg);
    let mut m = RefreshManager::new(&cfg.mc, &r.memspec, Rank(0)).unwrap();
    let refi = r.memspec.tck.times(6240);

    let _ = m.evaluate(refi, &mut r.banks, &mut r.power_down, &r.checker);
    let tuple = m.next_command(refi).unwrap();
    assert_eq!(tuple.command, Command::Refab);

    // The committed refresh pushes the schedule one interval out.
    m.update(Command::Refab, refi);
    let wake = m.evaluate(refi, &mut r.banks, &mut r.power_down, &r.checker);
    assert_eq!(wake, refi + refi);
}

#[test]
fn all_bank_precharges_an_activated_rank_first() {
    let cfg = all_bank_cfg(0);
    let mut r = rig(&cfg);
    occupy_bank(&mut r);
    r.banks[0].update(Command::Act, &r.pool);
    let mut m = RefreshManager::new(&cfg.mc, &r.memspec, Rank(0)).unwrap();
    let refi = r.memspec.tck.times(6240);

    // Forced (no postpone budget): banks are claimed, PREAB goes first.
    let _ = m.evaluate(refi, &mut r.banks, &mut r.power_down, &r.checker);
    assert_eq!(m.next_command(refi).unwrap().command, Command::Preab);
    assert!(r.banks[0].next_command(refi).is_none(), "bank is blocked");
}

#[test]
fn all_bank_postpones_while_busy_within_budget() {
    let cfg = all_bank_cfg(1);
    let mut r = rig(&cfg);
    occupy_bank(&mut r);
    let mut m = RefreshManager::new(&cfg.mc, &r.memspec, Rank(0)).unwrap();
    let refi = r.memspec.tck.times(6240);

    // Busy and one postpone allowed: no candidate, trigger moves out.
    let wake = m.evaluate(refi, &mut r.banks, &mut r.power_down, &r.checker);
    assert_eq!(wake, refi + refi);
    assert!(m.next_command(refi).is_none());

    // At the limit the refresh is forced even though the bank stays busy.
    let _ = m.evaluate(refi + refi, &mut r.banks, &mut r.power_down, &r.checker);
    assert_eq!(m.next_command(refi + refi).unwrap().command, Command::Refab);
}

#[test]
fn rank_triggers_are_bit_reversal_staggered() {
    let cfg = config_with(&ddr3_two_rank_json(), |c| {
        c.mc.refresh_policy = RefreshPolicy::AllBank;
    });
    let memspec = MemSpec::from_config(&cfg.memspec).unwrap();
    let checker = Checker::new(&memspec);
    let refi = memspec.tck.times(6240);

    for (rank, expected) in [
        (Rank(0), refi),
        (Rank(1), SimTime::from_ps(refi.ps() / 2)),
    ] {
        let mut banks: Vec<BankMachine> = (0..memspec.banks_per_rank)
            .map(|b| {
                BankMachine::new(
                    PagePolicy::Open,
                    Bank(rank.idx() * memspec.banks_per_rank + b),
                    &memspec,
                    false,
                )
            })
            .collect();
        let mut pd = PowerDownManager::new(&cfg.mc, &memspec, rank);
        let mut m = RefreshManager::new(&cfg.mc, &memspec, rank).unwrap();
        let wake = m.evaluate(SimTime::ZERO, &mut banks, &mut pd, &checker);
        assert_eq!(wake, expected, "rank {} first trigger", rank.idx());
    }
}

#[test]
fn per_bank_rotates_through_the_rank() {
    let cfg = config_with(&lpddr4_json(), |c| {
        c.mc.refresh_policy = RefreshPolicy::PerBank;
    });
    let mut r = rig(&cfg);
    let mut m = RefreshManager::new(&cfg.mc, &r.memspec, Rank(0)).unwrap();
    let interval = r.memspec.tck.times(390);

    let mut refreshed = Vec::new();
    let mut now = interval;
    for _ in 0..3 {
        let _ = m.evaluate(now, &mut r.banks, &mut r.power_down, &r.checker);
        let tuple = m.next_command(now).unwrap();
        assert_eq!(tuple.command, Command::Refpb);
        refreshed.push(tuple.target.bank);
        m.update(Command::Refpb, now);
        now += interval;
    }
    assert_eq!(refreshed, vec![Bank(0), Bank(1), Bank(2)]);
}

#[test]
fn self_refresh_stops_the_clock_until_reanchored() {
    let cfg = all_bank_cfg(0);
    let mut r = rig(&cfg);
    let mut m = RefreshManager::new(&cfg.mc, &r.memspec, Rank(0)).unwrap();
    let refi = r.memspec.tck.times(6240);

    m.update(Command::Srefen, SimTime::from_ps(1000));
    let wake = m.evaluate(refi + refi, &mut r.banks, &mut r.power_down, &r.checker);
    assert!(wake.is_never(), "sleeping manager never triggers");

    // The first REFAB after exit re-anchors the schedule.
    let exit_at = refi.times(3);
    m.update(Command::Refab, exit_at);
    let wake = m.evaluate(exit_at, &mut r.banks, &mut r.power_down, &r.checker);
    assert_eq!(wake, exit_at + refi);
}
