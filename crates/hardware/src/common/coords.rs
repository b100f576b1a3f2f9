//! DRAM coordinate types.
//!
//! This module defines strong types for every level of the DRAM topology to prevent
//! accidental mixing of index spaces. It provides:
//! 1. **Type Safety:** A channel index can never be used where a bank index is expected.
//! 2. **Global Bank Numbering:** Banks are numbered across the whole channel; helpers
//!    recover the owning rank and bank group from the device geometry.
//! 3. **Row Sentinel:** `Row::NONE` marks a bank with no open row.

/// A memory channel index within the system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel(pub usize);

/// A rank index within a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rank(pub usize);

/// A bank-group index, numbered globally within a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BankGroup(pub usize);

/// A bank index, numbered globally within a channel.
///
/// Global numbering keeps per-channel component arrays flat: bank `b` of rank `r`
/// is `r * banks_per_rank + b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bank(pub usize);

/// A row address within a bank.
///
/// Carries an explicit "no row" sentinel for precharged banks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Row(pub u64);

/// A column address within a row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Column(pub u64);

/// An initiator thread (request source) index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Thread(pub usize);

impl Channel {
    /// Returns the raw index value.
    ///
    /// # Returns
    ///
    /// The underlying channel index.
    #[inline(always)]
    pub fn idx(self) -> usize {
        self.0
    }
}

impl Rank {
    /// Returns the raw index value.
    ///
    /// # Returns
    ///
    /// The underlying rank index.
    #[inline(always)]
    pub fn idx(self) -> usize {
        self.0
    }
}

impl BankGroup {
    /// Returns the raw index value.
    ///
    /// # Returns
    ///
    /// The underlying channel-global bank-group index.
    #[inline(always)]
    pub fn idx(self) -> usize {
        self.0
    }
}

impl Bank {
    /// Returns the raw index value.
    ///
    /// # Returns
    ///
    /// The underlying channel-global bank index.
    #[inline(always)]
    pub fn idx(self) -> usize {
        self.0
    }

    /// Returns the rank that owns this bank.
    ///
    /// # Arguments
    ///
    /// * `banks_per_rank` - Number of banks per rank in the channel geometry.
    ///
    /// # Returns
    ///
    /// The owning `Rank`.
    #[inline]
    pub fn rank(self, banks_per_rank: usize) -> Rank {
        Rank(self.0 / banks_per_rank)
    }

    /// Returns the bank group that owns this bank.
    ///
    /// # Arguments
    ///
    /// * `banks_per_group` - Number of banks per group in the channel geometry.
    ///
    /// # Returns
    ///
    /// The owning `BankGroup`, in channel-global numbering.
    #[inline]
    pub fn group(self, banks_per_group: usize) -> BankGroup {
        BankGroup(self.0 / banks_per_group)
    }

    /// Returns the bank index relative to its rank.
    ///
    /// # Arguments
    ///
    /// * `banks_per_rank` - Number of banks per rank in the channel geometry.
    ///
    /// # Returns
    ///
    /// The in-rank bank index (0 to `banks_per_rank - 1`).
    #[inline]
    pub fn in_rank(self, banks_per_rank: usize) -> usize {
        self.0 % banks_per_rank
    }
}

impl Row {
    /// Sentinel for "no open row".
    pub const NONE: Self = Self(u64::MAX);

    /// Returns `true` if this is a real row address.
    ///
    /// # Returns
    ///
    /// `true` for any value other than the `NONE` sentinel.
    #[inline]
    pub fn is_some(self) -> bool {
        self != Self::NONE
    }
}

impl Column {
    /// Returns the raw column address.
    ///
    /// # Returns
    ///
    /// The underlying column address value.
    #[inline(always)]
    pub fn val(self) -> u64 {
        self.0
    }
}

impl Thread {
    /// Returns the raw index value.
    ///
    /// # Returns
    ///
    /// The underlying thread index.
    #[inline(always)]
    pub fn idx(self) -> usize {
        self.0
    }
}
