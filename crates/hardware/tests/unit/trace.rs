//! Trace parsing tests.

use dramsim_core::common::transaction::TransKind;
use dramsim_core::memspec::MemSpec;
use dramsim_core::sim::trace::parse_trace;

use crate::common::{config, ddr3_json};

fn spec() -> MemSpec {
    MemSpec::from_config(&config(&ddr3_json()).memspec).unwrap()
}

#[test]
fn requests_parse_with_cycle_conversion() {
    let spec = spec();
    let trace = parse_trace("0 R 0x100\n25 W 0x2000 deadbeef\n", &spec).unwrap();
    assert_eq!(trace.len(), 2);
    assert_eq!(trace[0].kind, TransKind::Read);
    assert_eq!(trace[0].address, 0x100);
    assert_eq!(trace[0].time, spec.tck.times(0));
    assert_eq!(trace[1].kind, TransKind::Write);
    assert_eq!(trace[1].time, spec.tck.times(25));
    assert_eq!(trace[1].data, vec![0xde, 0xad, 0xbe, 0xef]);
}

#[test]
fn comments_and_blank_lines_are_skipped() {
    let spec = spec();
    let trace = parse_trace("# header\n\n10 r 0xff\n", &spec).unwrap();
    assert_eq!(trace.len(), 1);
    assert_eq!(trace[0].address, 0xff);
}

#[test]
fn malformed_lines_name_their_line_number() {
    let spec = spec();
    let err = parse_trace("0 R 0x100\nbogus\n", &spec).unwrap_err();
    assert!(err.to_string().contains("line 2"));
}

#[test]
fn unknown_direction_is_rejected() {
    let spec = spec();
    assert!(parse_trace("0 X 0x100\n", &spec).is_err());
}
