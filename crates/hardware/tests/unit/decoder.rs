//! Address decoder unit tests.
//!
//! The DDR3 test mapping is byte[0..3), column[3..13), bank[13..16),
//! row[16..32).

use dramsim_core::arbiter::decoder::AddressDecoder;
use dramsim_core::common::ConfigError;
use dramsim_core::memspec::MemSpec;

use crate::common::{config, config_with, ddr3_json};

fn decoder() -> AddressDecoder {
    let cfg = config(&ddr3_json());
    let memspec = MemSpec::from_config(&cfg.memspec).unwrap();
    AddressDecoder::new(&cfg.address_mapping, &memspec).unwrap()
}

#[test]
fn zero_decodes_to_the_origin() {
    let d = decoder();
    let a = d.decode(0);
    assert_eq!((a.channel, a.rank, a.bank, a.row, a.column, a.byte), (0, 0, 0, 0, 0, 0));
}

#[test]
fn fields_extract_from_their_configured_bits() {
    let d = decoder();
    let a = d.decode((5 << 16) | (3 << 13) | (9 << 3) | 0b101);
    assert_eq!(a.row, 5);
    assert_eq!(a.bank, 3);
    assert_eq!(a.column, 9);
    assert_eq!(a.byte, 0b101);
}

#[test]
fn decoding_is_idempotent() {
    let d = decoder();
    let addr = 0xdead_beef;
    assert_eq!(d.decode(addr), d.decode(addr));
}

#[test]
fn xor_pairs_fold_before_extraction() {
    let cfg = config_with(&ddr3_json(), |c| {
        // bank bit 13 ^= row bit 16
        c.address_mapping.xor = vec![dramsim_core::config::XorPair {
            first: 13,
            second: 16,
        }];
    });
    let memspec = MemSpec::from_config(&cfg.memspec).unwrap();
    let d = AddressDecoder::new(&cfg.address_mapping, &memspec).unwrap();

    // Row bit 0 set flips bank bit 0.
    let a = d.decode(1 << 16);
    assert_eq!(a.row, 1);
    assert_eq!(a.bank, 1);

    // Both set: the XOR cancels.
    let b = d.decode((1 << 16) | (1 << 13));
    assert_eq!(b.row, 1);
    assert_eq!(b.bank, 0);
}

#[test]
fn out_of_range_addresses_still_decode() {
    let d = decoder();
    // Bit 32 is beyond the 4 GiB capacity; extraction ignores it.
    let a = d.decode((1 << 32) | (7 << 13));
    assert_eq!(a.bank, 7);
}

proptest::proptest! {
    /// Every in-range address decomposes inside the configured geometry.
    #[test]
    fn decoded_fields_stay_within_the_geometry(addr in 0_u64..(1 << 32)) {
        let d = decoder();
        let a = d.decode(addr);
        proptest::prop_assert!(a.bank < 8);
        proptest::prop_assert!(a.row < 65536);
        proptest::prop_assert!(a.column < 1024);
        proptest::prop_assert!(a.byte < 8);
        proptest::prop_assert_eq!(a.channel, 0);
    }
}

#[test]
fn bit_budget_mismatch_is_fatal() {
    let cfg = config_with(&ddr3_json(), |c| {
        // Drop one row bit: 31 mapping bits against a 4 GiB device.
        let _ = c.address_mapping.row_bits.pop();
    });
    let memspec = MemSpec::from_config(&cfg.memspec).unwrap();
    assert!(AddressDecoder::new(&cfg.address_mapping, &memspec).is_err());
}

#[test]
fn coordinate_width_mismatch_is_fatal() {
    let cfg = config_with(&ddr3_json(), |c| {
        // Move a row bit into the bank vector: banks 8 -> 16 entries.
        let bit = c.address_mapping.row_bits.pop().unwrap();
        c.address_mapping.bank_bits.push(bit);
    });
    let memspec = MemSpec::from_config(&cfg.memspec).unwrap();
    let err = AddressDecoder::new(&cfg.address_mapping, &memspec).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));
}
