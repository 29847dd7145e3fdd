//! Tensor handle registry
//!
//! A `DataId` is the opaque key callers hold; the registry maps it to the
//! record the dispatch layer needs: the numeric id the native module knows the
//! tensor by, its arena offset, shape and dtype. The registry never touches
//! the arena — callers free storage before removing a record.

use crate::dtype::DType;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DATA_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque tensor handle
///
/// Globally unique across all backends in the process. Carries identity only;
/// everything else lives in the owning backend's registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataId(u64);

impl DataId {
    /// Allocate a fresh, never-before-seen handle
    pub fn new() -> Self {
        Self(NEXT_DATA_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value, for diagnostics and error messages
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl Default for DataId {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the backend tracks about one live tensor
#[derive(Debug, Clone)]
pub struct TensorRecord {
    /// Numeric id the native module addresses this tensor by. Unique and
    /// strictly increasing per backend; 0 is reserved for "no tensor".
    pub id: i32,
    /// Arena byte offset of the storage. `None` only for `Str` tensors.
    pub memory_offset: Option<usize>,
    /// Logical shape (row-major)
    pub shape: Vec<usize>,
    /// Element dtype
    pub dtype: DType,
    /// Out-of-band element storage, present iff `dtype == Str`
    pub string_bytes: Option<Vec<Vec<u8>>>,
}

impl TensorRecord {
    /// Number of elements
    #[inline]
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Arena bytes this record's storage spans (0 for string tensors)
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.size() * self.dtype.size_in_bytes()
    }
}

/// Handle -> record map for one backend instance
#[derive(Debug, Default)]
pub struct HandleRegistry {
    records: HashMap<DataId, TensorRecord>,
}

impl HandleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for a handle
    pub fn set(&mut self, handle: DataId, record: TensorRecord) {
        self.records.insert(handle, record);
    }

    /// Look up a record, failing with `UnknownHandle` for disposed or
    /// never-registered handles
    pub fn get(&self, handle: DataId) -> Result<&TensorRecord> {
        self.records.get(&handle).ok_or(Error::UnknownHandle {
            handle: handle.raw(),
        })
    }

    /// Mutable lookup with the same failure contract as [`get`](Self::get)
    pub fn get_mut(&mut self, handle: DataId) -> Result<&mut TensorRecord> {
        self.records.get_mut(&handle).ok_or(Error::UnknownHandle {
            handle: handle.raw(),
        })
    }

    /// Whether a handle is currently registered
    #[inline]
    pub fn contains(&self, handle: DataId) -> bool {
        self.records.contains_key(&handle)
    }

    /// Remove and return a record. Storage is NOT freed here.
    pub fn remove(&mut self, handle: DataId) -> Result<TensorRecord> {
        self.records.remove(&handle).ok_or(Error::UnknownHandle {
            handle: handle.raw(),
        })
    }

    /// Number of live records
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are registered
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
