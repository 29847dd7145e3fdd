//! Slice kernel: byte copies on the host, no native call
//!
//! A slice whose non-full dimensions sit at the front of the shape is one
//! contiguous run and collapses to a single copy; everything else walks the
//! output row by row (a row being the innermost dimension).

use crate::backend::{Backend, KernelConfig, OpAttrs, TensorInfo};
use crate::error::{Error, Result};
use crate::native::NativeModule;
use crate::registry::DataId;
use crate::shape::{compute_strides, size_of};

use super::{config_without_setup, expect_inputs};

/// Kernel configuration for slicing
pub fn slice_config<M: NativeModule + 'static>() -> KernelConfig<M> {
    config_without_setup("Slice", |backend, inputs, attrs| {
        let [x] = expect_inputs::<1>("Slice", inputs)?;
        let OpAttrs::Slice { begin, size } = attrs else {
            return Err(Error::InvalidArgument {
                arg: "attrs",
                reason: "'Slice' requires Slice attributes".to_string(),
            });
        };
        slice_impl(backend, x, begin, size)
    })
}

fn slice_impl<M: NativeModule>(
    backend: &mut Backend<M>,
    x: DataId,
    begin: &[usize],
    size: &[usize],
) -> Result<TensorInfo> {
    let x_info = backend.tensor_info(x)?;
    let rank = x_info.shape.len();
    if begin.len() != rank || size.len() != rank {
        return Err(Error::InvalidArgument {
            arg: "begin",
            reason: format!(
                "begin/size ranks ({}/{}) do not match input rank {rank}",
                begin.len(),
                size.len()
            ),
        });
    }
    for i in 0..rank {
        if begin[i] + size[i] > x_info.shape[i] {
            return Err(Error::InvalidArgument {
                arg: "size",
                reason: format!(
                    "slice [{}, {}) exceeds dimension {i} of extent {}",
                    begin[i],
                    begin[i] + size[i],
                    x_info.shape[i]
                ),
            });
        }
    }

    let out = backend.make_output(size, x_info.dtype, None)?;
    let out_size = size_of(size);
    if out_size == 0 {
        return Ok(out);
    }
    let (Some(src_base), Some(dst_base)) = (x_info.memory_offset, out.memory_offset) else {
        return Err(Error::UnsupportedDType {
            dtype: x_info.dtype,
            op: "Slice",
        });
    };

    let elem = x_info.dtype.size_in_bytes();
    let strides = compute_strides(&x_info.shape);
    let flat_offset: usize = begin.iter().zip(&strides).map(|(b, s)| b * s).sum();

    if is_slice_continuous(&x_info.shape, begin, size) {
        backend
            .arena_mut()
            .copy_within(src_base + flat_offset * elem, dst_base, out_size * elem);
        return Ok(out);
    }

    // Strided path: one copy per innermost-dimension run.
    let row_len = *size.last().unwrap_or(&1);
    let num_rows = out_size / row_len;
    let mut coords = vec![0usize; rank.saturating_sub(1)];
    for row in 0..num_rows {
        let mut src_flat = flat_offset;
        for (i, &c) in coords.iter().enumerate() {
            src_flat += c * strides[i];
        }
        backend.arena_mut().copy_within(
            src_base + src_flat * elem,
            dst_base + row * row_len * elem,
            row_len * elem,
        );
        // Advance the outer coordinates odometer-style.
        for i in (0..coords.len()).rev() {
            coords[i] += 1;
            if coords[i] < size[i] {
                break;
            }
            coords[i] = 0;
        }
    }
    Ok(out)
}

/// Whether the sliced region is one contiguous run of the input
///
/// Dimensions of size 1 before the first wider one only shift the start
/// offset; after that first wider dimension every axis must be taken in full
/// from position 0.
fn is_slice_continuous(shape: &[usize], begin: &[usize], size: &[usize]) -> bool {
    let mut first_wide_axis = size.len();
    for (i, &s) in size.iter().enumerate() {
        if s > 1 {
            first_wide_axis = i;
            break;
        }
    }
    (first_wide_axis + 1..size.len()).all(|i| begin[i] == 0 && size[i] == shape[i])
}
