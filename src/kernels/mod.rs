//! Kernel library
//!
//! Each file holds one operation family; the generic builders
//! ([`binary::create_binary_kernel`], [`unary::create_unary_kernel`],
//! [`reduce::create_reduce_kernel`], [`argminmax::create_argminmax_kernel`])
//! produce [`KernelConfig`]s that dispatch to native symbols, while the
//! byte-level kernels (identity, cast, fill, slice, concat) run entirely on
//! the host and never cross the native boundary.

pub mod argminmax;
pub mod binary;
pub mod cast;
pub mod concat;
pub mod fill;
pub mod identity;
pub mod reduce;
pub mod reshape;
pub mod reverse;
pub mod slice;
pub mod transpose;
pub mod unary;

use crate::backend::{Backend, KernelConfig};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::native::NativeModule;
use crate::registry::DataId;

/// Register the full standard kernel set on a backend
pub fn register_all<M: NativeModule + 'static>(backend: &mut Backend<M>) {
    // Binary elementwise. Full (outer-dims) broadcast is native-supported
    // for the arithmetic four; Maximum/Minimum only broadcast inner dims.
    backend.register_kernel(binary::create_binary_kernel("Add", true, None));
    backend.register_kernel(binary::create_binary_kernel("Sub", true, None));
    backend.register_kernel(binary::create_binary_kernel("Mul", true, None));
    backend.register_kernel(binary::create_binary_kernel("Div", true, None));
    backend.register_kernel(binary::create_binary_kernel("Maximum", false, None));
    backend.register_kernel(binary::create_binary_kernel("Minimum", false, None));

    // Unary elementwise.
    backend.register_kernel(unary::create_unary_kernel("Abs", None));
    backend.register_kernel(unary::create_unary_kernel("Neg", None));
    backend.register_kernel(unary::create_unary_kernel("Relu", None));
    backend.register_kernel(unary::create_unary_kernel("Square", None));
    backend.register_kernel(unary::create_unary_kernel("Sqrt", None));

    // Reductions, each with the identity an empty reduce produces.
    backend.register_kernel(reduce::create_reduce_kernel("Sum", None, 0.0));
    backend.register_kernel(reduce::create_reduce_kernel("Mean", Some(DType::F32), f64::NAN));
    backend.register_kernel(reduce::create_reduce_kernel("Prod", None, 1.0));
    backend.register_kernel(reduce::create_reduce_kernel("Max", None, f64::NEG_INFINITY));
    backend.register_kernel(reduce::create_reduce_kernel("Min", None, f64::INFINITY));
    backend.register_kernel(reduce::create_reduce_kernel("Any", None, 0.0));
    backend.register_kernel(reduce::create_reduce_kernel("All", None, 1.0));

    backend.register_kernel(argminmax::create_argminmax_kernel("ArgMax"));
    backend.register_kernel(argminmax::create_argminmax_kernel("ArgMin"));

    // Shape and data movement.
    backend.register_kernel(transpose::transpose_config());
    backend.register_kernel(reshape::reshape_config());
    backend.register_kernel(identity::identity_config());
    backend.register_kernel(cast::cast_config());
    backend.register_kernel(fill::fill_config());
    backend.register_kernel(slice::slice_config());
    backend.register_kernel(concat::concat_config());
    backend.register_kernel(reverse::reverse_config());
}

/// Exactly `N` input handles, or `InvalidArgument`
pub(crate) fn expect_inputs<const N: usize>(
    op: &'static str,
    inputs: &[DataId],
) -> Result<[DataId; N]> {
    inputs.try_into().map_err(|_| Error::InvalidArgument {
        arg: "inputs",
        reason: format!("'{op}' takes {N} input(s), got {}", inputs.len()),
    })
}

/// Build a `KernelConfig` with no setup hook
pub(crate) fn config_without_setup<M: NativeModule>(
    name: &'static str,
    kernel: impl Fn(&mut Backend<M>, &[DataId], &crate::backend::OpAttrs) -> Result<crate::backend::TensorInfo>
    + 'static,
) -> KernelConfig<M> {
    KernelConfig {
        name,
        setup: None,
        kernel: Box::new(kernel),
    }
}
