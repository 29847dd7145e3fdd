//! Native calling convention
//!
//! The boundary between the dispatch layer and a native kernel module is a
//! narrow positional protocol: arguments are plain `i32` scalars, little-endian
//! `i32` arrays passed as bytes, or booleans; results come back as nothing, an
//! arena offset of a packed result struct, or a status word. This module owns
//! the trait, the value types, the wire encoding of shapes, and the decoding
//! of failure and result records.

use crate::arena::Arena;
use crate::error::{Error, Result};

/// Declared type of one positional argument in a kernel signature
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArgType {
    /// A plain 32-bit integer (ids, sizes, dtype tags, offsets)
    I32,
    /// A byte region the caller copies into native memory before the call;
    /// in practice always a little-endian i32 array (shapes, axes, perms)
    Bytes,
    /// A boolean flag
    Bool,
}

/// One positional argument value at invoke time
#[derive(Clone, Debug)]
pub enum NativeValue<'a> {
    /// A plain 32-bit integer
    I32(i32),
    /// A little-endian i32 array as raw bytes
    Bytes(&'a [u8]),
    /// A boolean flag
    Bool(bool),
}

impl NativeValue<'_> {
    /// The signature slot kind this value satisfies
    #[inline]
    pub fn arg_type(&self) -> ArgType {
        match self {
            Self::I32(_) => ArgType::I32,
            Self::Bytes(_) => ArgType::Bytes,
            Self::Bool(_) => ArgType::Bool,
        }
    }
}

/// What a bound callable returns
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReturnKind {
    /// Nothing; the kernel wrote its output in place
    Void,
    /// An arena offset of a packed result struct the caller must parse and
    /// free (see [`parse_result_struct`])
    Offset,
    /// 0 on success; nonzero is the arena offset of a failure record the
    /// dispatch layer decodes (see [`decode_failure`]) and frees
    Status,
}

/// A resolved callable, produced by [`NativeModule::bind`]
///
/// Binding is the expensive half of the protocol; the dispatch layer memoizes
/// one binding per symbol per backend and reuses it for every invoke.
#[derive(Clone, Debug)]
pub struct NativeBinding {
    /// Exported symbol name
    pub symbol: String,
    /// Positional argument kinds, validated by the module on every invoke
    pub signature: Vec<ArgType>,
    /// Result convention
    pub returns: ReturnKind,
    /// Module-private resolution handle (table index, fn pointer slot)
    pub slot: usize,
}

/// The contract a native kernel module implements
///
/// The module executes kernels against the backend's arena; it never owns
/// tensor metadata beyond the `id -> {offset, size}` table fed through
/// `register_tensor`.
pub trait NativeModule {
    /// Resolve an exported symbol into a callable
    ///
    /// Fails with `UnknownSymbol` when the module exports no such kernel.
    fn bind(
        &mut self,
        symbol: &str,
        signature: &[ArgType],
        returns: ReturnKind,
    ) -> Result<NativeBinding>;

    /// Call a bound kernel with positional arguments
    ///
    /// The returned i32 is meaningful per the binding's [`ReturnKind`]:
    /// ignored for `Void`, a struct offset for `Offset`, a status word for
    /// `Status`.
    fn invoke(
        &mut self,
        binding: &NativeBinding,
        arena: &mut Arena,
        args: &[NativeValue<'_>],
    ) -> Result<i32>;

    /// Tell the module a tensor id now names `size` elements at `offset`
    fn register_tensor(&mut self, id: i32, size: usize, offset: usize);

    /// Tell the module a tensor id is gone and its storage is free
    fn dispose_data(&mut self, id: i32);
}

/// Serialize a shape as consecutive 4-byte little-endian i32 values
///
/// This is the only multi-value encoding that crosses the boundary; ranks are
/// always passed alongside as a separate i32.
pub fn shape_bytes(shape: &[usize]) -> Vec<u8> {
    i32_bytes_iter(shape.iter().map(|&d| d as i32))
}

/// Serialize an i32 array (axes, permutations) in the shape wire format
pub fn i32_bytes(values: &[i32]) -> Vec<u8> {
    i32_bytes_iter(values.iter().copied())
}

fn i32_bytes_iter(values: impl Iterator<Item = i32>) -> Vec<u8> {
    let mut out = Vec::new();
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Decode little-endian i32 wire bytes back into values
pub fn i32_from_bytes(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Packed result record returned by `ReturnKind::Offset` kernels
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResultStruct {
    /// Arena offset of the result data
    pub data_offset: usize,
    /// Number of result elements
    pub size: usize,
}

/// Parse and free the `{data_offset: i32, size: i32}` record a
/// `ReturnKind::Offset` kernel returns
///
/// The record itself is freed here; the data region it points at becomes the
/// caller's to own (typically handed to `make_output`).
pub fn parse_result_struct(arena: &mut Arena, record_offset: usize) -> ResultStruct {
    let data_offset = arena.read_i32(record_offset) as usize;
    let size = arena.read_i32(record_offset + 4) as usize;
    arena.free(record_offset);
    ResultStruct { data_offset, size }
}

/// Decode and free the failure record a nonzero `ReturnKind::Status` word
/// points at: `{code: i32, msg_offset: i32, msg_len: i32}`
///
/// Both the message bytes and the record are freed before returning.
pub fn decode_failure(arena: &mut Arena, symbol: &str, record_offset: usize) -> Error {
    let code = arena.read_i32(record_offset);
    let msg_offset = arena.read_i32(record_offset + 4) as usize;
    let msg_len = arena.read_i32(record_offset + 8) as usize;
    let message = if msg_offset != 0 && msg_len > 0 {
        String::from_utf8_lossy(arena.bytes(msg_offset, msg_len)).into_owned()
    } else {
        String::new()
    };
    arena.free(msg_offset);
    arena.free(record_offset);
    Error::NativeKernelFailure {
        symbol: symbol.to_string(),
        code,
        message,
    }
}
