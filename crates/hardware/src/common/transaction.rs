//! Transactions and the shared transaction pool.
//!
//! A transaction is created by an initiator, tagged by the arbiter at system entry,
//! tagged again by the address decoder with its DRAM coordinates, and then shared by
//! the arbiter and exactly one channel controller until the response is acknowledged.
//! Sharing uses explicit `acquire`/`release` refcounting on an arena pool; every
//! component holds a [`TransId`] index, never a pointer.

use crate::common::coords::{Bank, BankGroup, Channel, Column, Rank, Row, Thread};
use crate::common::time::SimTime;

/// Direction of a memory transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransKind {
    /// Column read.
    Read,
    /// Column write.
    Write,
}

/// Tag attached by the arbiter when a transaction enters the system.
#[derive(Clone, Copy, Debug)]
pub struct ArbiterTag {
    /// Initiator thread that generated the request.
    pub thread: Thread,
    /// Target channel, decoded from the address.
    pub channel: Channel,
    /// Per-thread sequence number, monotone in generation order.
    pub thread_payload_id: u64,
    /// Simulated time the initiator generated the request.
    pub time_of_generation: SimTime,
}

/// Tag attached by the address decoder with the full DRAM coordinate.
#[derive(Clone, Copy, Debug)]
pub struct ControllerTag {
    /// Per-channel sequence number, monotone in arrival order.
    pub channel_payload_id: u64,
    /// Target rank.
    pub rank: Rank,
    /// Target bank group (channel-global numbering).
    pub bank_group: BankGroup,
    /// Target bank (channel-global numbering).
    pub bank: Bank,
    /// Target row.
    pub row: Row,
    /// Target column.
    pub column: Column,
    /// Burst length in beats for this access.
    pub burst_length: u32,
}

/// A memory transaction with both tags attached.
#[derive(Clone, Debug)]
pub struct Transaction {
    /// Read or write.
    pub kind: TransKind,
    /// Linear physical address (after the configured offset was applied).
    pub address: u64,
    /// Write data; empty for reads until the mirror fills it in.
    pub data: Vec<u8>,
    /// Per-byte write enables; `None` means all bytes enabled.
    pub byte_enables: Option<Vec<bool>>,
    /// Arbiter tag, assigned at system entry.
    pub arbiter: ArbiterTag,
    /// Controller tag, assigned by the address decoder.
    pub controller: ControllerTag,
}

impl Transaction {
    /// Returns `true` if any byte enable is deasserted.
    pub fn has_disabled_bytes(&self) -> bool {
        self.byte_enables
            .as_ref()
            .is_some_and(|be| be.iter().any(|enabled| !enabled))
    }
}

/// Index of a transaction slot in the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransId(pub usize);

struct Slot {
    trans: Transaction,
    refcount: u32,
}

/// Arena of in-flight transactions with explicit refcounting.
///
/// Slots are recycled through a free list once their refcount drops to zero.
#[derive(Default)]
pub struct TransactionPool {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
}

impl TransactionPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a transaction with an initial refcount of one (the creator's reference).
    ///
    /// # Arguments
    ///
    /// * `trans` - The transaction to take ownership of.
    ///
    /// # Returns
    ///
    /// The slot index to use as the transaction's handle.
    pub fn insert(&mut self, trans: Transaction) -> TransId {
        let slot = Slot { trans, refcount: 1 };
        if let Some(idx) = self.free.pop() {
            debug_assert!(self.slots[idx].is_none());
            self.slots[idx] = Some(slot);
            TransId(idx)
        } else {
            self.slots.push(Some(slot));
            TransId(self.slots.len() - 1)
        }
    }

    /// Raises the refcount of a live transaction.
    ///
    /// # Arguments
    ///
    /// * `id` - Handle of the transaction to share.
    pub fn acquire(&mut self, id: TransId) {
        if let Some(slot) = self.slots[id.0].as_mut() {
            slot.refcount += 1;
        } else {
            debug_assert!(false, "acquire on a dead transaction slot");
        }
    }

    /// Drops one reference; frees the slot when the count reaches zero.
    ///
    /// # Arguments
    ///
    /// * `id` - Handle of the transaction to release.
    ///
    /// # Returns
    ///
    /// `true` if this was the last reference and the slot was recycled.
    pub fn release(&mut self, id: TransId) -> bool {
        let freed = match self.slots[id.0].as_mut() {
            Some(slot) => {
                debug_assert!(slot.refcount > 0);
                slot.refcount -= 1;
                slot.refcount == 0
            }
            None => {
                debug_assert!(false, "release on a dead transaction slot");
                false
            }
        };
        if freed {
            self.slots[id.0] = None;
            self.free.push(id.0);
        }
        freed
    }

    /// Borrows a live transaction.
    ///
    /// # Arguments
    ///
    /// * `id` - Handle of the transaction to borrow.
    ///
    /// # Returns
    ///
    /// A shared borrow of the transaction.
    ///
    /// # Panics
    ///
    /// Panics if the slot was already recycled; holding a stale [`TransId`] is a
    /// lifecycle violation in the caller.
    pub fn get(&self, id: TransId) -> &Transaction {
        match self.slots[id.0].as_ref() {
            Some(slot) => &slot.trans,
            None => panic!("transaction slot {} already recycled", id.0),
        }
    }

    /// Mutably borrows a live transaction.
    ///
    /// # Arguments
    ///
    /// * `id` - Handle of the transaction to borrow.
    ///
    /// # Returns
    ///
    /// An exclusive borrow of the transaction.
    ///
    /// # Panics
    ///
    /// Panics if the slot was already recycled.
    pub fn get_mut(&mut self, id: TransId) -> &mut Transaction {
        match self.slots[id.0].as_mut() {
            Some(slot) => &mut slot.trans,
            None => panic!("transaction slot {} already recycled", id.0),
        }
    }

    /// Number of live transactions currently in the pool.
    ///
    /// # Returns
    ///
    /// The count of occupied slots.
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl std::fmt::Debug for TransactionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionPool")
            .field("slots", &self.slots.len())
            .field("free", &self.free.len())
            .finish()
    }
}
