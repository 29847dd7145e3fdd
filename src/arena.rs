//! Linear-memory arena allocator
//!
//! Tensor storage is a byte offset into one contiguous heap, the same model a
//! native module sees for its linear memory. Freed regions are kept on
//! exact-size free lists and handed back FIFO, so allocating the size just
//! freed returns the same offset — an observable property long-running
//! sessions rely on for deterministic memory pressure.

use crate::error::{Error, Result};
use std::collections::{HashMap, VecDeque};

/// Allocation granularity; large enough for the widest element (Complex64)
const ALIGN: usize = 8;

/// Default arena capacity limit (1 GiB)
const DEFAULT_LIMIT: usize = 1 << 30;

/// Byte-offset arena over one contiguous heap
///
/// Offsets are the only handle into the arena. Offset 0 is a sentinel for
/// zero-byte allocations and never names real storage.
///
/// The backing store is `u64` words so the base pointer is 8-aligned; every
/// offset is a multiple of [`ALIGN`], which makes typed `Pod` views over any
/// allocation alignment-safe.
#[derive(Debug)]
pub struct Arena {
    heap: Vec<u64>,
    /// size -> freed offsets of exactly that (aligned) size, FIFO
    free: HashMap<usize, VecDeque<usize>>,
    /// offset -> aligned size, for every live allocation
    live: HashMap<usize, usize>,
    used_bytes: usize,
    limit: usize,
}

impl Default for Arena {
    fn default() -> Self {
        Self::with_limit(DEFAULT_LIMIT)
    }
}

impl Arena {
    /// Create an arena that refuses to grow past `limit` bytes
    pub fn with_limit(limit: usize) -> Self {
        Self {
            // The first word is reserved so no allocation gets offset 0,
            // the null sentinel.
            heap: vec![0; 1],
            free: HashMap::new(),
            live: HashMap::new(),
            used_bytes: 0,
            limit,
        }
    }

    /// Allocate `num_bytes` and return its offset
    ///
    /// Zero-byte requests return the 0 sentinel. Fails with `OutOfMemory`
    /// when the heap would exceed the capacity limit; allocation is never
    /// retried here.
    pub fn alloc(&mut self, num_bytes: usize) -> Result<usize> {
        if num_bytes == 0 {
            return Ok(0);
        }
        let size = align_up(num_bytes);

        let offset = match self.free.get_mut(&size).and_then(|q| q.pop_front()) {
            Some(offset) => {
                self.heap[offset / ALIGN..(offset + size) / ALIGN].fill(0);
                offset
            }
            None => {
                let offset = self.heap.len() * ALIGN;
                if offset + size > self.limit {
                    return Err(Error::OutOfMemory {
                        requested: num_bytes,
                        limit: self.limit,
                    });
                }
                self.heap.resize((offset + size) / ALIGN, 0);
                offset
            }
        };
        self.live.insert(offset, size);
        self.used_bytes += size;
        Ok(offset)
    }

    /// Return a region to the allocator
    ///
    /// Freeing an offset that is not currently allocated is a contract
    /// violation; guarded in debug builds, ignored in release.
    pub fn free(&mut self, offset: usize) {
        if offset == 0 {
            return;
        }
        let Some(size) = self.live.remove(&offset) else {
            debug_assert!(false, "free of unallocated offset {offset}");
            return;
        };
        self.used_bytes -= size;
        self.free.entry(size).or_default().push_back(offset);
    }

    /// Bytes currently allocated (aligned sizes)
    #[inline]
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Total heap extent in bytes, including freed regions
    #[inline]
    pub fn capacity(&self) -> usize {
        self.heap.len() * ALIGN
    }

    /// Number of live allocations
    #[inline]
    pub fn num_allocations(&self) -> usize {
        self.live.len()
    }

    /// Shared view of `len` bytes at `offset`
    ///
    /// The borrow ends before any call that can grow the heap, which is what
    /// makes handing out direct views safe.
    #[inline]
    pub fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.heap)[offset..offset + len]
    }

    /// Mutable view of `len` bytes at `offset`
    #[inline]
    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.heap)[offset..offset + len]
    }

    /// Copy `len` bytes from `src` to `dst` within the heap
    pub fn copy_within(&mut self, src: usize, dst: usize, len: usize) {
        bytemuck::cast_slice_mut::<u64, u8>(&mut self.heap).copy_within(src..src + len, dst);
    }

    /// Read one little-endian i32 at `offset`
    pub fn read_i32(&self, offset: usize) -> i32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.bytes(offset, 4));
        i32::from_le_bytes(buf)
    }

    /// Read `count` consecutive little-endian i32 values at `offset`
    pub fn read_i32_array(&self, offset: usize, count: usize) -> Vec<i32> {
        (0..count).map(|i| self.read_i32(offset + 4 * i)).collect()
    }

    /// Write one little-endian i32 at `offset`
    pub fn write_i32(&mut self, offset: usize, value: i32) {
        self.bytes_mut(offset, 4).copy_from_slice(&value.to_le_bytes());
    }
}

#[inline]
fn align_up(n: usize) -> usize {
    n.div_ceil(ALIGN) * ALIGN
}
