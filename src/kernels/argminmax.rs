//! ArgMax / ArgMin kernel builder
//!
//! Shares the axis-normalization pre-step with the reductions but is limited
//! to a single reduction axis; the native convention is outer size x inner
//! size with an i32 output of winning indices.

use crate::backend::{Backend, KernelConfig, OpAttrs, TensorInfo};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::native::{ArgType, NativeModule, NativeValue, ReturnKind};
use crate::registry::DataId;
use crate::shape::{assert_axes_inner_most, out_and_reduce_shapes, size_of};

use super::expect_inputs;
use super::reduce::{PermutedInput, permute_axes_and_transpose};

const SIGNATURE: &[ArgType] = &[
    ArgType::I32, // input id
    ArgType::I32, // input dtype tag
    ArgType::I32, // outer size
    ArgType::I32, // inner size
    ArgType::I32, // out id
];

/// Build an argmax/argmin kernel dispatching to the native symbol `name`
pub fn create_argminmax_kernel<M: NativeModule + 'static>(
    name: &'static str,
) -> KernelConfig<M> {
    KernelConfig {
        name,
        setup: Some(Box::new(move |backend: &mut Backend<M>| {
            backend.bind_once(name, SIGNATURE, ReturnKind::Void)?;
            Ok(())
        })),
        kernel: Box::new(move |backend, inputs, attrs| {
            let [x] = expect_inputs::<1>(name, inputs)?;
            let OpAttrs::Axis { axis } = attrs else {
                return Err(Error::InvalidArgument {
                    arg: "attrs",
                    reason: format!("'{name}' requires Axis attributes"),
                });
            };
            argminmax_kernel(backend, name, x, *axis)
        }),
    }
}

fn argminmax_kernel<M: NativeModule>(
    backend: &mut Backend<M>,
    name: &'static str,
    x: DataId,
    axis: isize,
) -> Result<TensorInfo> {
    let permuted = permute_axes_and_transpose(backend, x, &[axis])?;
    let result = argminmax_permuted(backend, name, &permuted);
    if permuted.was_transposed {
        backend.dispose_data(permuted.handle)?;
    }
    result
}

/// The post-permutation half; disposes the output itself when the native
/// call fails so the caller only has the scratch to clean up
fn argminmax_permuted<M: NativeModule>(
    backend: &mut Backend<M>,
    name: &'static str,
    permuted: &PermutedInput,
) -> Result<TensorInfo> {
    if permuted.axes.len() != 1 {
        return Err(Error::InvalidArgument {
            arg: "axis",
            reason: format!("'{name}' reduces exactly one axis"),
        });
    }
    let input = backend.tensor_info(permuted.handle)?;
    assert_axes_inner_most(name, &permuted.axes, input.shape.len())?;

    let (out_shape, reduce_shape) = out_and_reduce_shapes(&input.shape, &permuted.axes);
    let out = backend.make_output(&out_shape, DType::I32, None)?;
    if size_of(&input.shape) != 0 {
        let invoked = invoke_argminmax(
            backend,
            name,
            &input,
            size_of(&out_shape),
            reduce_shape[0],
            &out,
        );
        if let Err(err) = invoked {
            backend.dispose_data(out.handle)?;
            return Err(err);
        }
    }
    Ok(out)
}

fn invoke_argminmax<M: NativeModule>(
    backend: &mut Backend<M>,
    name: &'static str,
    input: &TensorInfo,
    outer_size: usize,
    inner_size: usize,
    out: &TensorInfo,
) -> Result<()> {
    let binding = backend.bind_once(name, SIGNATURE, ReturnKind::Void)?;
    backend.invoke(
        &binding,
        &[
            NativeValue::I32(input.id),
            NativeValue::I32(input.dtype.native_tag()),
            NativeValue::I32(outer_size as i32),
            NativeValue::I32(inner_size as i32),
            NativeValue::I32(out.id),
        ],
    )?;
    Ok(())
}
