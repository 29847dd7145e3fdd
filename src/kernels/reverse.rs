//! Reverse kernel: flips the listed axes through a native call
//!
//! Rank-0 tensors have nothing to flip and fall back to a plain copy.

use crate::backend::{Backend, KernelConfig, OpAttrs, TensorInfo};
use crate::error::{Error, Result};
use crate::native::{ArgType, NativeModule, NativeValue, ReturnKind, i32_bytes, shape_bytes};
use crate::registry::DataId;
use crate::shape::{parse_axes, size_of};

use super::{expect_inputs, identity};

const SIGNATURE: &[ArgType] = &[
    ArgType::I32,   // x id
    ArgType::Bytes, // axes
    ArgType::I32,   // axes length
    ArgType::Bytes, // out shape
    ArgType::I32,   // out rank
    ArgType::I32,   // out id
];

/// Kernel configuration for axis reversal
pub fn reverse_config<M: NativeModule + 'static>() -> KernelConfig<M> {
    KernelConfig {
        name: "Reverse",
        setup: Some(Box::new(|backend: &mut Backend<M>| {
            backend.bind_once("Reverse", SIGNATURE, ReturnKind::Void)?;
            Ok(())
        })),
        kernel: Box::new(|backend, inputs, attrs| {
            let [x] = expect_inputs::<1>("Reverse", inputs)?;
            let OpAttrs::Reverse { axes } = attrs else {
                return Err(Error::InvalidArgument {
                    arg: "attrs",
                    reason: "'Reverse' requires Reverse attributes".to_string(),
                });
            };
            reverse_impl(backend, x, axes)
        }),
    }
}

fn reverse_impl<M: NativeModule>(
    backend: &mut Backend<M>,
    x: DataId,
    axes: &[isize],
) -> Result<TensorInfo> {
    let x_info = backend.tensor_info(x)?;
    let rank = x_info.shape.len();
    if rank == 0 {
        return identity::identity_impl(backend, x, None);
    }
    let axes = parse_axes(axes, rank)?;

    let out = backend.make_output(&x_info.shape, x_info.dtype, None)?;
    if size_of(&x_info.shape) == 0 {
        return Ok(out);
    }

    let axes_i32: Vec<i32> = axes.iter().map(|&a| a as i32).collect();
    let axes_bytes = i32_bytes(&axes_i32);
    let out_shape_bytes = shape_bytes(&x_info.shape);
    let binding = backend.bind_once("Reverse", SIGNATURE, ReturnKind::Void)?;
    backend.invoke(
        &binding,
        &[
            NativeValue::I32(x_info.id),
            NativeValue::Bytes(&axes_bytes),
            NativeValue::I32(axes.len() as i32),
            NativeValue::Bytes(&out_shape_bytes),
            NativeValue::I32(rank as i32),
            NativeValue::I32(out.id),
        ],
    )?;
    Ok(out)
}
