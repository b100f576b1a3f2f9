//! Per-standard memspec construction tests.

use dramsim_core::common::coords::Bank;
use dramsim_core::common::transaction::{TransKind, TransactionPool};
use dramsim_core::common::ConfigError;
use dramsim_core::controller::command::Command;
use dramsim_core::memspec::{MaskedWriteSupport, MemSpec, MemoryType};

use crate::common::{config, cycles, ddr3_json, hbm2_json, lpddr4_json, make_trans};

#[test]
fn ddr3_geometry_and_size() {
    let cfg = config(&ddr3_json());
    let spec = MemSpec::from_config(&cfg.memspec).unwrap();
    assert_eq!(spec.memory_type, MemoryType::Ddr3);
    assert_eq!(spec.groups_per_rank, 1);
    assert_eq!(spec.banks_per_group, 8);
    assert_eq!(spec.memory_size_bytes(), 1 << 32);
}

#[test]
fn ddr3_supports_all_bank_refresh_only() {
    let cfg = config(&ddr3_json());
    let spec = MemSpec::from_config(&cfg.memspec).unwrap();
    assert!(spec.refresh_interval_ab().is_ok());
    assert!(spec.refresh_interval_pb().is_err());
    assert!(spec.refresh_interval_sb().is_err());
    assert!(spec.refresh_interval_p2b().is_err());
}

#[test]
fn missing_required_timing_key_is_fatal() {
    let json = ddr3_json().replace("\"RCD\": 11,", "");
    let cfg = config(&json);
    let err = MemSpec::from_config(&cfg.memspec).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::MissingTimingKey { key: "RCD", .. }
    ));
}

#[test]
fn unknown_standard_is_fatal() {
    let json = ddr3_json().replace("\"DDR3\"", "\"DDR2\"");
    let cfg = config(&json);
    assert!(MemSpec::from_config(&cfg.memspec).is_err());
}

#[test]
fn lpddr4_commands_occupy_multiple_beats() {
    let cfg = config(&lpddr4_json());
    let spec = MemSpec::from_config(&cfg.memspec).unwrap();
    assert_eq!(spec.command_length(Command::Act), cycles(&spec, 4));
    assert_eq!(spec.command_length(Command::Rd), cycles(&spec, 2));
    assert_eq!(spec.command_length(Command::Prepb), cycles(&spec, 2));
}

#[test]
fn lpddr4_serves_masked_writes_with_mwr() {
    let cfg = config(&lpddr4_json());
    let spec = MemSpec::from_config(&cfg.memspec).unwrap();
    assert_eq!(spec.masked_write, MaskedWriteSupport::MwrCommand);

    let mut pool = TransactionPool::new();
    let id = make_trans(&mut pool, &spec, TransKind::Write, Bank(0), 1, 0, 0);
    let len = pool.get(id).data.len();
    pool.get_mut(id).byte_enables = Some(vec![false; len]);
    assert!(spec.requires_masked_write(pool.get(id)));
    assert!(spec.check_masked_write(pool.get(id)).is_ok());
}

#[test]
fn hbm2_act_completion_depends_on_direction() {
    let cfg = config(&hbm2_json());
    let spec = MemSpec::from_config(&cfg.memspec).unwrap();
    assert!(spec.act_split_by_kind);
    assert_eq!(
        spec.execution_time(Command::Act, TransKind::Read),
        cycles(&spec, 12)
    );
    assert_eq!(
        spec.execution_time(Command::Act, TransKind::Write),
        cycles(&spec, 6)
    );
    assert_eq!(spec.command_length(Command::Act), cycles(&spec, 2));
    assert_eq!(spec.pseudo_channels_per_channel, 2);
}

#[test]
fn hbm2_does_not_offer_same_bank_refresh() {
    let cfg = config(&hbm2_json());
    let spec = MemSpec::from_config(&cfg.memspec).unwrap();
    assert!(spec.refresh_interval_ab().is_ok());
    assert!(spec.refresh_interval_pb().is_ok());
    assert!(spec.refresh_interval_sb().is_err());
}

#[test]
fn data_strobe_window_spans_the_burst() {
    let cfg = config(&ddr3_json());
    let spec = MemSpec::from_config(&cfg.memspec).unwrap();
    // RL = 11, burst 8 at DDR = 4 cycles.
    let window = spec.interval_on_data_strobe(Command::Rd);
    assert_eq!(window.start, cycles(&spec, 11));
    assert_eq!(window.end, cycles(&spec, 15));
    let write = spec.interval_on_data_strobe(Command::Wr);
    assert_eq!(write.start, cycles(&spec, 8));
    assert_eq!(write.end, cycles(&spec, 12));
}

#[test]
fn execution_times_follow_the_standard_formulas() {
    let cfg = config(&ddr3_json());
    let spec = MemSpec::from_config(&cfg.memspec).unwrap();
    assert_eq!(
        spec.execution_time(Command::Rda, TransKind::Read),
        cycles(&spec, 6 + 11)
    );
    assert_eq!(
        spec.execution_time(Command::Wra, TransKind::Write),
        cycles(&spec, 8 + 4 + 12 + 11)
    );
    assert_eq!(
        spec.execution_time(Command::Refab, TransKind::Read),
        cycles(&spec, 208)
    );
}
