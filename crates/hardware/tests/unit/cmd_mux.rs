//! Command multiplexer unit tests.

use dramsim_core::common::coords::{Bank, BankGroup, Rank};
use dramsim_core::common::time::SimTime;
use dramsim_core::common::transaction::{TransKind, TransactionPool};
use dramsim_core::config::CmdMuxPolicy;
use dramsim_core::controller::cmd_mux::CmdMux;
use dramsim_core::controller::command::{CmdTarget, Command, CommandTuple};
use dramsim_core::memspec::MemSpec;

use crate::common::{config, ddr3_json, make_trans};

fn tuple(command: Command, trans: Option<dramsim_core::common::transaction::TransId>, at: u64) -> CommandTuple {
    CommandTuple {
        command,
        target: CmdTarget {
            rank: Rank(0),
            bank_group: BankGroup(0),
            bank: Bank(0),
            trans,
        },
        earliest: SimTime::from_ps(at),
    }
}

fn pool_with_two() -> (TransactionPool, MemSpec, [dramsim_core::common::transaction::TransId; 2]) {
    let cfg = config(&ddr3_json());
    let memspec = MemSpec::from_config(&cfg.memspec).unwrap();
    let mut pool = TransactionPool::new();
    let first = make_trans(&mut pool, &memspec, TransKind::Read, Bank(0), 1, 0, 0);
    let second = make_trans(&mut pool, &memspec, TransKind::Read, Bank(1), 1, 0, 1);
    (pool, memspec, [first, second])
}

#[test]
fn oldest_ignores_candidates_still_in_the_future() {
    let (pool, _, [first, _]) = pool_with_two();
    let mux = CmdMux::new(CmdMuxPolicy::Oldest);
    let now = SimTime::from_ps(1000);
    let picked = mux.select(
        &[tuple(Command::Act, Some(first), 5000)],
        &pool,
        Some(first),
        now,
    );
    assert!(picked.is_none());
}

#[test]
fn oldest_prefers_the_older_transaction_on_a_tie() {
    let (pool, _, [first, second]) = pool_with_two();
    let mux = CmdMux::new(CmdMuxPolicy::Oldest);
    let now = SimTime::from_ps(1000);
    let picked = mux
        .select(
            &[
                tuple(Command::Act, Some(second), 1000),
                tuple(Command::Act, Some(first), 1000),
            ],
            &pool,
            Some(first),
            now,
        )
        .unwrap();
    assert_eq!(picked.target.trans, Some(first));
}

#[test]
fn oldest_gives_maintenance_priority_over_banks() {
    let (pool, _, [first, _]) = pool_with_two();
    let mux = CmdMux::new(CmdMuxPolicy::Oldest);
    let now = SimTime::from_ps(1000);
    let picked = mux
        .select(
            &[
                tuple(Command::Act, Some(first), 1000),
                tuple(Command::Refab, None, 1000),
            ],
            &pool,
            Some(first),
            now,
        )
        .unwrap();
    assert_eq!(picked.command, Command::Refab);
}

#[test]
fn strict_blocks_when_the_oldest_is_not_ready() {
    let (pool, _, [first, second]) = pool_with_two();
    let mux = CmdMux::new(CmdMuxPolicy::Strict);
    let now = SimTime::from_ps(1000);
    // The younger transaction is ready, the oldest is not: NOP.
    let picked = mux.select(
        &[
            tuple(Command::Act, Some(second), 1000),
            tuple(Command::Act, Some(first), 9000),
        ],
        &pool,
        Some(first),
        now,
    );
    assert!(picked.is_none());
}

#[test]
fn strict_issues_the_oldest_when_ready() {
    let (pool, _, [first, second]) = pool_with_two();
    let mux = CmdMux::new(CmdMuxPolicy::Strict);
    let now = SimTime::from_ps(1000);
    let picked = mux
        .select(
            &[
                tuple(Command::Act, Some(second), 1000),
                tuple(Command::Act, Some(first), 1000),
            ],
            &pool,
            Some(first),
            now,
        )
        .unwrap();
    assert_eq!(picked.target.trans, Some(first));
}

#[test]
fn strict_still_issues_maintenance_first() {
    let (pool, _, [first, _]) = pool_with_two();
    let mux = CmdMux::new(CmdMuxPolicy::Strict);
    let now = SimTime::from_ps(1000);
    let picked = mux
        .select(
            &[
                tuple(Command::Act, Some(first), 9000),
                tuple(Command::Preab, None, 1000),
            ],
            &pool,
            Some(first),
            now,
        )
        .unwrap();
    assert_eq!(picked.command, Command::Preab);
}
