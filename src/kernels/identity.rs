//! Identity kernel: a plain copy, no native call

use crate::backend::{Backend, KernelConfig, OpAttrs, TensorInfo};
use crate::dtype::DType;
use crate::error::Result;
use crate::native::NativeModule;
use crate::registry::DataId;

use super::{config_without_setup, expect_inputs};

/// Kernel configuration for the plain copy
pub fn identity_config<M: NativeModule + 'static>() -> KernelConfig<M> {
    config_without_setup("Identity", |backend, inputs, _attrs: &OpAttrs| {
        let [x] = expect_inputs::<1>("Identity", inputs)?;
        identity_impl(backend, x, None)
    })
}

/// Copy a tensor, optionally relabeling it with a same-size shape
///
/// The shape override is how the transpose no-op path returns a copy carrying
/// the permuted shape without a second reshape step.
pub(crate) fn identity_impl<M: NativeModule>(
    backend: &mut Backend<M>,
    x: DataId,
    shape_override: Option<&[usize]>,
) -> Result<TensorInfo> {
    let x_info = backend.tensor_info(x)?;
    let out_shape = shape_override.unwrap_or(&x_info.shape);

    if x_info.dtype == DType::Str {
        let crate::backend::TensorData::Str(values) = backend.read_sync(x)? else {
            unreachable!("string record without string data");
        };
        let handle = backend.write_strings(values, out_shape)?;
        return backend.tensor_info(handle);
    }

    let out = backend.make_output(out_shape, x_info.dtype, None)?;
    if let (Some(src), Some(dst)) = (x_info.memory_offset, out.memory_offset) {
        let num_bytes: usize = x_info.shape.iter().product::<usize>() * x_info.dtype.size_in_bytes();
        backend.arena_mut().copy_within(src, dst, num_bytes);
    }
    Ok(out)
}
