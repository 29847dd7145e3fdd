//! Transpose kernel
//!
//! Size-1 dimensions are stripped before the native call, lowering the rank
//! the native kernel has to stride over without changing any element's
//! position. A permutation that is the identity after stripping degenerates
//! into a plain copy with the permuted shape.

use crate::backend::{Backend, KernelConfig, OpAttrs, TensorInfo};
use crate::error::{Error, Result};
use crate::native::{ArgType, NativeModule, NativeValue, ReturnKind, i32_bytes, shape_bytes};
use crate::registry::DataId;
use crate::shape::{permute_shape, remove_one_size_dims, size_of};

use super::{expect_inputs, identity};

const SIGNATURE: &[ArgType] = &[
    ArgType::I32,   // x id
    ArgType::Bytes, // x shape (rank-reduced)
    ArgType::I32,   // x rank (rank-reduced)
    ArgType::I32,   // dtype tag
    ArgType::I32,   // out id
    ArgType::Bytes, // permutation (rank-reduced)
    ArgType::I32,   // permutation length
];

/// Kernel configuration for transposition
pub fn transpose_config<M: NativeModule + 'static>() -> KernelConfig<M> {
    KernelConfig {
        name: "Transpose",
        setup: Some(Box::new(|backend: &mut Backend<M>| {
            backend.bind_once("Transpose", SIGNATURE, ReturnKind::Void)?;
            Ok(())
        })),
        kernel: Box::new(|backend, inputs, attrs| {
            let [x] = expect_inputs::<1>("Transpose", inputs)?;
            let OpAttrs::Perm { perm } = attrs else {
                return Err(Error::InvalidArgument {
                    arg: "attrs",
                    reason: "'Transpose' requires Perm attributes".to_string(),
                });
            };
            transpose_impl(backend, x, perm)
        }),
    }
}

/// Dispatch a transpose; also called directly by the reduction pre-step
pub(crate) fn transpose_impl<M: NativeModule>(
    backend: &mut Backend<M>,
    x: DataId,
    perm: &[usize],
) -> Result<TensorInfo> {
    let x_info = backend.tensor_info(x)?;
    validate_perm(perm, x_info.shape.len())?;

    let out_shape = permute_shape(&x_info.shape, perm);
    let (reduced_shape, reduced_perm) = remove_one_size_dims(&x_info.shape, perm);

    let perm_is_noop = reduced_perm.iter().enumerate().all(|(i, &p)| p == i);
    if perm_is_noop {
        // Only singleton dims moved; the storage order is unchanged.
        return identity::identity_impl(backend, x, Some(&out_shape));
    }

    let out = backend.make_output(&out_shape, x_info.dtype, None)?;
    if size_of(&out_shape) == 0 {
        return Ok(out);
    }

    let reduced_shape_bytes = shape_bytes(&reduced_shape);
    let perm_i32: Vec<i32> = reduced_perm.iter().map(|&p| p as i32).collect();
    let perm_bytes = i32_bytes(&perm_i32);
    let binding = backend.bind_once("Transpose", SIGNATURE, ReturnKind::Void)?;
    backend.invoke(
        &binding,
        &[
            NativeValue::I32(x_info.id),
            NativeValue::Bytes(&reduced_shape_bytes),
            NativeValue::I32(reduced_shape.len() as i32),
            NativeValue::I32(x_info.dtype.native_tag()),
            NativeValue::I32(out.id),
            NativeValue::Bytes(&perm_bytes),
            NativeValue::I32(reduced_perm.len() as i32),
        ],
    )?;
    Ok(out)
}

fn validate_perm(perm: &[usize], ndim: usize) -> Result<()> {
    let mut seen = perm.to_vec();
    seen.sort_unstable();
    if perm.len() != ndim || seen.iter().enumerate().any(|(i, &p)| p != i) {
        return Err(Error::InvalidArgument {
            arg: "perm",
            reason: format!("{perm:?} is not a permutation of rank {ndim}"),
        });
    }
    Ok(())
}
