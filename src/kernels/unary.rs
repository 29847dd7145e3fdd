//! Generic unary elementwise kernel builder

use crate::backend::{Backend, KernelConfig, OpAttrs};
use crate::dtype::DType;
use crate::native::{ArgType, NativeModule, NativeValue, ReturnKind};
use crate::shape::size_of;

use super::expect_inputs;

const SIGNATURE: &[ArgType] = &[
    ArgType::I32, // x id
    ArgType::I32, // out id
];

/// Build a unary elementwise kernel dispatching to the native symbol `name`
///
/// `out_dtype` overrides the output dtype; `None` inherits the input's.
pub fn create_unary_kernel<M: NativeModule + 'static>(
    name: &'static str,
    out_dtype: Option<DType>,
) -> KernelConfig<M> {
    KernelConfig {
        name,
        setup: Some(Box::new(move |backend: &mut Backend<M>| {
            backend.bind_once(name, SIGNATURE, ReturnKind::Void)?;
            Ok(())
        })),
        kernel: Box::new(move |backend, inputs, _attrs: &OpAttrs| {
            let [x] = expect_inputs::<1>(name, inputs)?;
            let x_info = backend.tensor_info(x)?;
            let out =
                backend.make_output(&x_info.shape, out_dtype.unwrap_or(x_info.dtype), None)?;
            if size_of(&x_info.shape) == 0 {
                return Ok(out);
            }
            let binding = backend.bind_once(name, SIGNATURE, ReturnKind::Void)?;
            backend.invoke(
                &binding,
                &[NativeValue::I32(x_info.id), NativeValue::I32(out.id)],
            )?;
            Ok(out)
        }),
    }
}
