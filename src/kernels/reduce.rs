//! Generic reduction kernel builder
//!
//! Native reduction symbols only reduce over the innermost, contiguous
//! dimensions. Arbitrary axes are handled by a pre-step that transposes the
//! reduced axes to the back; the transposed scratch tensor is disposed before
//! the kernel returns on every path, success or failure. Reducing over an
//! empty extent fills the output with the operation's identity instead of
//! calling the native symbol.

use crate::backend::{Backend, KernelConfig, OpAttrs, TensorInfo};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::native::{ArgType, NativeModule, NativeValue, ReturnKind};
use crate::registry::DataId;
use crate::shape::{
    assert_axes_inner_most, axes_permutation, expand_shape_to_keep_dim, inner_most_axes,
    out_and_reduce_shapes, parse_axes, size_of,
};

use super::{expect_inputs, transpose};

const SIGNATURE: &[ArgType] = &[
    ArgType::I32, // input id
    ArgType::I32, // reduce size
    ArgType::I32, // out id
];

/// Result of the axis-normalization pre-step shared by reductions and
/// argmax/argmin
pub(crate) struct PermutedInput {
    /// Tensor to reduce: the original input, or a transposed copy
    pub handle: DataId,
    /// Reduction axes valid for `handle`; innermost when a transpose ran
    pub axes: Vec<usize>,
    /// Normalized axes in terms of the original input, for keep_dims
    pub original_axes: Vec<usize>,
    /// Whether `handle` is a scratch tensor the caller must dispose
    pub was_transposed: bool,
}

/// Normalize reduction axes and transpose them to the innermost position
/// when they are not already there
pub(crate) fn permute_axes_and_transpose<M: NativeModule>(
    backend: &mut Backend<M>,
    x: DataId,
    axes: &[isize],
) -> Result<PermutedInput> {
    let x_info = backend.tensor_info(x)?;
    let ndim = x_info.shape.len();
    let original_axes = parse_axes(axes, ndim)?;

    match axes_permutation(&original_axes, ndim) {
        None => Ok(PermutedInput {
            handle: x,
            axes: original_axes.clone(),
            original_axes,
            was_transposed: false,
        }),
        Some(perm) => {
            let transposed = transpose::transpose_impl(backend, x, &perm)?;
            Ok(PermutedInput {
                handle: transposed.handle,
                axes: inner_most_axes(original_axes.len(), ndim),
                original_axes,
                was_transposed: true,
            })
        }
    }
}

/// Build a reduction kernel dispatching to the native symbol `name`
///
/// `out_dtype` overrides the output dtype (Mean always produces f32);
/// `None` inherits the input's dtype. `empty_value` is the operation's
/// identity, written to the output when the reduced extent is empty
/// (1 for Prod, -inf for Max, and so on).
pub fn create_reduce_kernel<M: NativeModule + 'static>(
    name: &'static str,
    out_dtype: Option<DType>,
    empty_value: f64,
) -> KernelConfig<M> {
    KernelConfig {
        name,
        setup: Some(Box::new(move |backend: &mut Backend<M>| {
            backend.bind_once(name, SIGNATURE, ReturnKind::Void)?;
            Ok(())
        })),
        kernel: Box::new(move |backend, inputs, attrs| {
            let [x] = expect_inputs::<1>(name, inputs)?;
            let OpAttrs::Reduce { axes, keep_dims } = attrs else {
                return Err(Error::InvalidArgument {
                    arg: "attrs",
                    reason: format!("'{name}' requires Reduce attributes"),
                });
            };
            reduce_kernel(backend, name, out_dtype, empty_value, x, axes, *keep_dims)
        }),
    }
}

fn reduce_kernel<M: NativeModule>(
    backend: &mut Backend<M>,
    name: &'static str,
    out_dtype: Option<DType>,
    empty_value: f64,
    x: DataId,
    axes: &[isize],
    keep_dims: bool,
) -> Result<TensorInfo> {
    let permuted = permute_axes_and_transpose(backend, x, axes)?;
    let reduced = reduce_permuted(backend, name, out_dtype, empty_value, &permuted);
    if permuted.was_transposed {
        backend.dispose_data(permuted.handle)?;
    }
    let out = reduced?;

    if keep_dims {
        let expanded = expand_shape_to_keep_dim(&out.shape, &permuted.original_axes);
        let view = backend.reshape(out.handle, &expanded)?;
        backend.dispose_data(out.handle)?;
        return Ok(view);
    }
    Ok(out)
}

/// Reduce an input whose axes already sit innermost; the scratch (if any) is
/// the caller's to dispose, the output is disposed here when the native call
/// fails
fn reduce_permuted<M: NativeModule>(
    backend: &mut Backend<M>,
    name: &'static str,
    out_dtype: Option<DType>,
    empty_value: f64,
    permuted: &PermutedInput,
) -> Result<TensorInfo> {
    let input = backend.tensor_info(permuted.handle)?;
    assert_axes_inner_most(name, &permuted.axes, input.shape.len())?;

    let (out_shape, reduce_shape) = out_and_reduce_shapes(&input.shape, &permuted.axes);
    let out = backend.make_output(&out_shape, out_dtype.unwrap_or(input.dtype), None)?;
    let produced = if size_of(&input.shape) == 0 {
        fill_reduction_identity(backend, &out, empty_value)
    } else {
        invoke_reduce(backend, name, &input, size_of(&reduce_shape), &out)
    };
    if let Err(err) = produced {
        backend.dispose_data(out.handle)?;
        return Err(err);
    }
    Ok(out)
}

fn invoke_reduce<M: NativeModule>(
    backend: &mut Backend<M>,
    name: &'static str,
    input: &TensorInfo,
    reduce_size: usize,
    out: &TensorInfo,
) -> Result<()> {
    let binding = backend.bind_once(name, SIGNATURE, ReturnKind::Void)?;
    backend.invoke(
        &binding,
        &[
            NativeValue::I32(input.id),
            NativeValue::I32(reduce_size as i32),
            NativeValue::I32(out.id),
        ],
    )?;
    Ok(())
}

/// Write the reduction identity into an output whose reduced extent was
/// empty (the zero-size input never reaches the native symbol)
fn fill_reduction_identity<M: NativeModule>(
    backend: &mut Backend<M>,
    out: &TensorInfo,
    value: f64,
) -> Result<()> {
    if size_of(&out.shape) == 0 {
        return Ok(());
    }
    match out.dtype {
        DType::F32 => backend.typed_slice_mut::<f32>(out.handle)?.fill(value as f32),
        DType::I32 => backend.typed_slice_mut::<i32>(out.handle)?.fill(value as i32),
        DType::Bool => backend
            .typed_slice_mut::<u8>(out.handle)?
            .fill((value != 0.0) as u8),
        dtype => {
            return Err(Error::UnsupportedDType {
                dtype,
                op: "reduce",
            });
        }
    }
    Ok(())
}
