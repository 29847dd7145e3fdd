//! Generic binary elementwise kernel builder

use crate::backend::{Backend, KernelConfig, OpAttrs, TensorInfo};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::native::{ArgType, NativeModule, NativeValue, ReturnKind, shape_bytes};
use crate::registry::DataId;
use crate::shape::{broadcast_shape, get_broadcast_dims, size_of};

use super::expect_inputs;

const SIGNATURE: &[ArgType] = &[
    ArgType::I32,   // a id
    ArgType::Bytes, // a shape
    ArgType::I32,   // a rank
    ArgType::I32,   // b id
    ArgType::Bytes, // b shape
    ArgType::I32,   // b rank
    ArgType::I32,   // dtype tag
    ArgType::I32,   // out id
];

/// Build a binary elementwise kernel dispatching to the native symbol `name`
///
/// `supports_full_broadcast` marks symbols whose native implementation can
/// broadcast along outer dimensions; it only applies to f32 operands. For
/// everything else a broadcast that is not limited to inner dimensions is
/// rejected with `Unsupported` before any allocation.
///
/// `out_dtype` overrides the output dtype (comparison kernels produce bool);
/// `None` inherits the first operand's dtype.
pub fn create_binary_kernel<M: NativeModule + 'static>(
    name: &'static str,
    supports_full_broadcast: bool,
    out_dtype: Option<DType>,
) -> KernelConfig<M> {
    KernelConfig {
        name,
        setup: Some(Box::new(move |backend: &mut Backend<M>| {
            backend.bind_once(name, SIGNATURE, ReturnKind::Void)?;
            Ok(())
        })),
        kernel: Box::new(move |backend, inputs, _attrs: &OpAttrs| {
            let [a, b] = expect_inputs::<2>(name, inputs)?;
            binary_kernel(backend, name, supports_full_broadcast, out_dtype, a, b)
        }),
    }
}

fn binary_kernel<M: NativeModule>(
    backend: &mut Backend<M>,
    name: &'static str,
    supports_full_broadcast: bool,
    out_dtype: Option<DType>,
    a: DataId,
    b: DataId,
) -> Result<TensorInfo> {
    let a_info = backend.tensor_info(a)?;
    let b_info = backend.tensor_info(b)?;
    if a_info.dtype != b_info.dtype {
        return Err(Error::Unsupported {
            op: name,
            reason: format!(
                "operand dtypes differ: {} vs {}",
                a_info.dtype, b_info.dtype
            ),
        });
    }

    let new_shape = broadcast_shape(&a_info.shape, &b_info.shape)?;

    // Arbitrary broadcast is only available on the native side for f32
    // symbols flagged as supporting it. The fallback path can tile a whole
    // operand (broadcast dims forming a leading prefix) but cannot broadcast
    // along inner dimensions.
    let full_broadcast = supports_full_broadcast && a_info.dtype == DType::F32;
    if !full_broadcast {
        let loops_over_a = loops_over_all(&a_info.shape, &new_shape);
        let loops_over_b = loops_over_all(&b_info.shape, &new_shape);
        if !(loops_over_a && loops_over_b) {
            return Err(Error::Unsupported {
                op: name,
                reason: format!(
                    "broadcasting along inner dimensions is not supported for {}",
                    a_info.dtype
                ),
            });
        }
    }

    let out = backend.make_output(&new_shape, out_dtype.unwrap_or(a_info.dtype), None)?;
    if size_of(&new_shape) == 0 {
        return Ok(out);
    }

    let a_shape_bytes = shape_bytes(&a_info.shape);
    let b_shape_bytes = shape_bytes(&b_info.shape);
    let binding = backend.bind_once(name, SIGNATURE, ReturnKind::Void)?;
    backend.invoke(
        &binding,
        &[
            NativeValue::I32(a_info.id),
            NativeValue::Bytes(&a_shape_bytes),
            NativeValue::I32(a_info.shape.len() as i32),
            NativeValue::I32(b_info.id),
            NativeValue::Bytes(&b_shape_bytes),
            NativeValue::I32(b_info.shape.len() as i32),
            NativeValue::I32(a_info.dtype.native_tag()),
            NativeValue::I32(out.id),
        ],
    )?;
    Ok(out)
}

/// True when the broadcast dimensions of `in_shape` form a leading prefix of
/// the output, so the native kernel can repeat the whole operand in storage
/// order instead of striding through it
fn loops_over_all(in_shape: &[usize], out_shape: &[usize]) -> bool {
    get_broadcast_dims(in_shape, out_shape)
        .iter()
        .enumerate()
        .all(|(i, &dim)| dim == i)
}
