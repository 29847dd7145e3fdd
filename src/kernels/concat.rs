//! Concat kernel: batched row copies on the host, no native call

use crate::backend::{Backend, KernelConfig, OpAttrs, TensorInfo};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::native::NativeModule;
use crate::registry::DataId;
use crate::shape::size_of;

use super::config_without_setup;

/// Kernel configuration for concatenation along one axis
pub fn concat_config<M: NativeModule + 'static>() -> KernelConfig<M> {
    config_without_setup("Concat", |backend, inputs, attrs| {
        let OpAttrs::Concat { axis } = attrs else {
            return Err(Error::InvalidArgument {
                arg: "attrs",
                reason: "'Concat' requires Concat attributes".to_string(),
            });
        };
        concat_impl(backend, inputs, *axis)
    })
}

fn concat_impl<M: NativeModule>(
    backend: &mut Backend<M>,
    inputs: &[DataId],
    axis: usize,
) -> Result<TensorInfo> {
    let infos: Vec<TensorInfo> = inputs
        .iter()
        .map(|&h| backend.tensor_info(h))
        .collect::<Result<_>>()?;
    let first = infos.first().ok_or(Error::InvalidArgument {
        arg: "inputs",
        reason: "'Concat' takes at least one input".to_string(),
    })?;
    let rank = first.shape.len();
    if axis >= rank {
        return Err(Error::InvalidAxis {
            axis: axis as isize,
            ndim: rank,
        });
    }
    if first.dtype == DType::Str {
        return Err(Error::UnsupportedDType {
            dtype: DType::Str,
            op: "Concat",
        });
    }
    for info in &infos[1..] {
        let compatible = info.dtype == first.dtype
            && info.shape.len() == rank
            && info
                .shape
                .iter()
                .enumerate()
                .all(|(i, &d)| i == axis || d == first.shape[i]);
        if !compatible {
            return Err(Error::ShapeMismatch {
                lhs: first.shape.clone(),
                rhs: info.shape.clone(),
            });
        }
    }

    let mut out_shape = first.shape.clone();
    out_shape[axis] = infos.iter().map(|i| i.shape[axis]).sum();
    let out = backend.make_output(&out_shape, first.dtype, None)?;
    if size_of(&out_shape) == 0 {
        return Ok(out);
    }
    let dst_base = out.memory_offset.unwrap_or(0);

    // Row-major layout: dims before the axis index independent batches; the
    // axis and everything after it are one contiguous run per input.
    let elem = first.dtype.size_in_bytes();
    let num_batches: usize = out_shape[..axis].iter().product();
    let out_batch: usize = out_shape[axis..].iter().product();

    let mut dst_in_batch = 0;
    for info in &infos {
        let src_base = info.memory_offset.unwrap_or(0);
        let in_batch: usize = info.shape[axis..].iter().product();
        for batch in 0..num_batches {
            backend.arena_mut().copy_within(
                src_base + batch * in_batch * elem,
                dst_base + (batch * out_batch + dst_in_batch) * elem,
                in_batch * elem,
            );
        }
        dst_in_batch += in_batch;
    }
    Ok(out)
}
