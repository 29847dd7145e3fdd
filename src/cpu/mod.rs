//! Reference CPU implementation of the native module contract
//!
//! [`CpuModule`] is the executable statement of the calling convention: a
//! symbol table of host functions with the exact positional signatures the
//! dispatch layer uses, fed by the same `register_tensor` bookkeeping a real
//! native module would keep. Unary and reduction symbols are f32 (bool for
//! Any/All), matching typical native kernel sets; binary symbols dispatch on
//! the dtype tag they are passed.

mod kernels;

use crate::arena::Arena;
use crate::error::{Error, Result};
use crate::native::{ArgType, NativeBinding, NativeModule, NativeValue, ReturnKind};
use std::collections::HashMap;

/// What the module knows about one registered tensor
#[derive(Copy, Clone, Debug)]
pub(crate) struct TensorEntry {
    pub offset: usize,
    /// Element count, not bytes; the symbol implies the element width
    pub size: usize,
}

const SYMBOLS: &[&str] = &[
    "Add", "Sub", "Mul", "Div", "Maximum", "Minimum", // binary
    "Abs", "Neg", "Relu", "Square", "Sqrt", // unary
    "Sum", "Mean", "Prod", "Max", "Min", "Any", "All", // reductions
    "ArgMax", "ArgMin", "Transpose", "Reverse",
];

/// In-process native module executing kernels on the host
#[derive(Debug, Default)]
pub struct CpuModule {
    tensors: HashMap<i32, TensorEntry>,
}

impl CpuModule {
    /// Create a module with an empty tensor table
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn entry(&self, id: i32) -> Result<TensorEntry> {
        self.tensors
            .get(&id)
            .copied()
            .ok_or(Error::InvalidArgument {
                arg: "id",
                reason: format!("tensor id {id} is not registered"),
            })
    }
}

impl NativeModule for CpuModule {
    fn bind(
        &mut self,
        symbol: &str,
        signature: &[ArgType],
        returns: ReturnKind,
    ) -> Result<NativeBinding> {
        let slot = SYMBOLS
            .iter()
            .position(|&s| s == symbol)
            .ok_or_else(|| Error::UnknownSymbol {
                symbol: symbol.to_string(),
            })?;
        Ok(NativeBinding {
            symbol: symbol.to_string(),
            signature: signature.to_vec(),
            returns,
            slot,
        })
    }

    fn invoke(
        &mut self,
        binding: &NativeBinding,
        arena: &mut Arena,
        args: &[NativeValue<'_>],
    ) -> Result<i32> {
        match SYMBOLS[binding.slot] {
            "Add" => kernels::binary(self, arena, args, |a, b| a + b)?,
            "Sub" => kernels::binary(self, arena, args, |a, b| a - b)?,
            "Mul" => kernels::binary(self, arena, args, |a, b| a * b)?,
            "Div" => kernels::binary(self, arena, args, |a, b| a / b)?,
            "Maximum" => kernels::binary(self, arena, args, f64::max)?,
            "Minimum" => kernels::binary(self, arena, args, f64::min)?,
            "Abs" => kernels::unary_f32(self, arena, args, f32::abs)?,
            "Neg" => kernels::unary_f32(self, arena, args, |v| -v)?,
            "Relu" => kernels::unary_f32(self, arena, args, |v| v.max(0.0))?,
            "Square" => kernels::unary_f32(self, arena, args, |v| v * v)?,
            "Sqrt" => kernels::unary_f32(self, arena, args, f32::sqrt)?,
            "Sum" => kernels::reduce_f32(self, arena, args, |c| c.iter().sum())?,
            "Mean" => {
                kernels::reduce_f32(self, arena, args, |c| {
                    c.iter().sum::<f32>() / c.len() as f32
                })?;
            }
            "Prod" => kernels::reduce_f32(self, arena, args, |c| c.iter().product())?,
            "Max" => {
                kernels::reduce_f32(self, arena, args, |c| {
                    c.iter().copied().fold(f32::NEG_INFINITY, f32::max)
                })?;
            }
            "Min" => {
                kernels::reduce_f32(self, arena, args, |c| {
                    c.iter().copied().fold(f32::INFINITY, f32::min)
                })?;
            }
            "Any" => kernels::reduce_bool(self, arena, args, |c| c.iter().any(|&v| v != 0))?,
            "All" => kernels::reduce_bool(self, arena, args, |c| c.iter().all(|&v| v != 0))?,
            "ArgMax" => kernels::argminmax(self, arena, args, true)?,
            "ArgMin" => kernels::argminmax(self, arena, args, false)?,
            "Transpose" => kernels::transpose(self, arena, args)?,
            "Reverse" => kernels::reverse(self, arena, args)?,
            other => {
                return Err(Error::UnknownSymbol {
                    symbol: other.to_string(),
                });
            }
        }
        Ok(0)
    }

    fn register_tensor(&mut self, id: i32, size: usize, offset: usize) {
        self.tensors.insert(id, TensorEntry { offset, size });
    }

    fn dispose_data(&mut self, id: i32) {
        self.tensors.remove(&id);
    }
}
