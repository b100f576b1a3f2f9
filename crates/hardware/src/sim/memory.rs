//! Functional memory mirror.
//!
//! When `StoreMode: Store` is configured the simulator keeps one sparse byte
//! store per channel: write data is applied when the serving WR-class command
//! issues, and read data is captured from the store when the RD-class command
//! issues. Unwritten bytes read as zero. The mirror carries no timing; it only
//! answers "a read after a write to the same address returns the written data".

use std::collections::HashMap;

const PAGE_SHIFT: u64 = 12;
const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Sparse byte store for one channel.
#[derive(Debug, Default)]
pub struct MemoryMirror {
    pages: HashMap<u64, Box<[u8; PAGE_SIZE]>>,
}

impl MemoryMirror {
    /// Creates an empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a write; bytes with a deasserted enable are left untouched.
    pub fn write(&mut self, address: u64, data: &[u8], byte_enables: Option<&[bool]>) {
        for (i, &byte) in data.iter().enumerate() {
            if byte_enables.is_some_and(|be| !be.get(i).copied().unwrap_or(true)) {
                continue;
            }
            let addr = address + i as u64;
            let page = self
                .pages
                .entry(addr >> PAGE_SHIFT)
                .or_insert_with(|| Box::new([0; PAGE_SIZE]));
            page[(addr & (PAGE_SIZE as u64 - 1)) as usize] = byte;
        }
    }

    /// Reads `len` bytes; unwritten locations return zero.
    pub fn read(&self, address: u64, len: usize) -> Vec<u8> {
        (0..len as u64)
            .map(|i| {
                let addr = address + i;
                self.pages
                    .get(&(addr >> PAGE_SHIFT))
                    .map_or(0, |page| page[(addr & (PAGE_SIZE as u64 - 1)) as usize])
            })
            .collect()
    }
}
