//! Address decoding.
//!
//! A linear physical address is decomposed into its DRAM coordinate by plain
//! bit extraction: one configured bit-index vector per coordinate, with an
//! optional list of XOR pairs folded into the address first. At load time the
//! mapping is checked against the memspec geometry: every coordinate's bit
//! count must match, and the total bit budget must equal the advertised
//! capacity. At decode time an out-of-range address only warns; the bits are
//! extracted regardless.

use tracing::warn;

use crate::common::ConfigError;
use crate::config::AddressMappingConfig;
use crate::memspec::MemSpec;

/// A fully decomposed physical address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodedAddress {
    /// Target channel.
    pub channel: usize,
    /// Target rank within the channel.
    pub rank: usize,
    /// Target bank group, numbered globally within the channel.
    pub bank_group: usize,
    /// Target bank, numbered globally within the channel.
    pub bank: usize,
    /// Target row.
    pub row: u64,
    /// Target column.
    pub column: u64,
    /// Byte offset within the burst.
    pub byte: u64,
}

/// Bit-extraction address decoder.
#[derive(Debug)]
pub struct AddressDecoder {
    xor: Vec<(u32, u32)>,
    channel_bits: Vec<u32>,
    rank_bits: Vec<u32>,
    bank_group_bits: Vec<u32>,
    bank_bits: Vec<u32>,
    row_bits: Vec<u32>,
    column_bits: Vec<u32>,
    byte_bits: Vec<u32>,
    banks_per_group: usize,
    groups_per_rank: usize,
    maximum_address: u64,
}

impl AddressDecoder {
    /// Builds and validates the decoder against the memspec geometry.
    ///
    /// # Arguments
    ///
    /// * `mapping` - The configured bit-index vectors and XOR pairs.
    /// * `memspec` - The memspec whose geometry the mapping must cover.
    ///
    /// # Returns
    ///
    /// The validated decoder.
    ///
    /// # Errors
    ///
    /// Fails when a coordinate's bit count or the total bit budget does not
    /// match the memspec.
    pub fn new(mapping: &AddressMappingConfig, memspec: &MemSpec) -> Result<Self, ConfigError> {
        let check = |name: &str, bits: usize, expected: u64| -> Result<(), ConfigError> {
            if 1_u64 << bits != expected.max(1) {
                return Err(ConfigError::invalid(
                    "AddressDecoder",
                    format!(
                        "{name}: mapping provides 2^{bits} entries, memspec advertises {expected}"
                    ),
                ));
            }
            Ok(())
        };

        check("channels", mapping.channel_bits.len(), memspec.channels as u64)?;
        check("ranks", mapping.rank_bits.len(), memspec.ranks_per_channel as u64)?;
        check(
            "bank groups",
            mapping.bank_group_bits.len(),
            memspec.groups_per_rank as u64,
        )?;
        check("banks", mapping.bank_bits.len(), memspec.banks_per_group as u64)?;
        check("rows", mapping.row_bits.len(), memspec.rows_per_bank)?;
        check("columns", mapping.column_bits.len(), memspec.columns_per_row)?;
        let bus_bytes =
            u64::from(memspec.bit_width) * memspec.devices_per_rank as u64 / 8;
        check("bytes", mapping.byte_bits.len(), bus_bytes)?;

        let total_bits = (mapping.channel_bits.len()
            + mapping.rank_bits.len()
            + mapping.bank_group_bits.len()
            + mapping.bank_bits.len()
            + mapping.row_bits.len()
            + mapping.column_bits.len()
            + mapping.byte_bits.len()) as u32;
        let capacity_bits = memspec.memory_size_bytes().trailing_zeros();
        if memspec.memory_size_bytes() != 1_u64 << capacity_bits || total_bits != capacity_bits {
            return Err(ConfigError::MappingMismatch {
                mapping_bits: total_bits,
                memspec_bits: capacity_bits,
            });
        }

        Ok(Self {
            xor: mapping.xor.iter().map(|p| (p.first, p.second)).collect(),
            channel_bits: mapping.channel_bits.clone(),
            rank_bits: mapping.rank_bits.clone(),
            bank_group_bits: mapping.bank_group_bits.clone(),
            bank_bits: mapping.bank_bits.clone(),
            row_bits: mapping.row_bits.clone(),
            column_bits: mapping.column_bits.clone(),
            byte_bits: mapping.byte_bits.clone(),
            banks_per_group: memspec.banks_per_group,
            groups_per_rank: memspec.groups_per_rank,
            maximum_address: memspec.memory_size_bytes() - 1,
        })
    }

    /// Decomposes an address. Pure bit extraction; decoding twice yields the
    /// same decomposition.
    ///
    /// # Arguments
    ///
    /// * `address` - Linear physical address (after any configured offset).
    ///
    /// # Returns
    ///
    /// The full coordinate, with channel-global bank and bank-group numbering.
    pub fn decode(&self, address: u64) -> DecodedAddress {
        if address > self.maximum_address {
            warn!(
                address,
                maximum = self.maximum_address,
                "address out of range"
            );
        }

        let mut addr = address;
        for &(first, second) in &self.xor {
            let folded = ((addr >> first) ^ (addr >> second)) & 1;
            addr = (addr & !(1 << first)) | (folded << first);
        }

        let extract = |bits: &[u32]| -> u64 {
            bits.iter()
                .enumerate()
                .fold(0, |acc, (i, &bit)| acc | (((addr >> bit) & 1) << i))
        };

        let mut decoded = DecodedAddress {
            channel: extract(&self.channel_bits) as usize,
            rank: extract(&self.rank_bits) as usize,
            bank_group: extract(&self.bank_group_bits) as usize,
            bank: extract(&self.bank_bits) as usize,
            row: extract(&self.row_bits),
            column: extract(&self.column_bits),
            byte: extract(&self.byte_bits),
        };

        // Globalise group and bank numbering within the channel.
        decoded.bank_group += decoded.rank * self.groups_per_rank;
        decoded.bank += decoded.bank_group * self.banks_per_group;
        decoded
    }
}
