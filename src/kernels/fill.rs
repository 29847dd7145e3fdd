//! Fill kernel: constant tensor creation on the host, no native call

use crate::backend::{Backend, KernelConfig, OpAttrs, TensorInfo};
use crate::dtype::{Complex64, DType, Element};
use crate::error::{Error, Result};
use crate::native::NativeModule;

use super::config_without_setup;

/// Kernel configuration for constant tensor creation
pub fn fill_config<M: NativeModule + 'static>() -> KernelConfig<M> {
    config_without_setup("Fill", |backend, _inputs, attrs| {
        let OpAttrs::Fill {
            shape,
            dtype,
            value,
        } = attrs
        else {
            return Err(Error::InvalidArgument {
                arg: "attrs",
                reason: "'Fill' requires Fill attributes".to_string(),
            });
        };
        fill_impl(backend, shape, *dtype, *value)
    })
}

fn fill_impl<M: NativeModule>(
    backend: &mut Backend<M>,
    shape: &[usize],
    dtype: DType,
    value: f64,
) -> Result<TensorInfo> {
    fn fill_as<T: Element, M: NativeModule>(
        backend: &mut Backend<M>,
        out: &TensorInfo,
        value: f64,
    ) -> Result<()> {
        backend
            .typed_slice_mut::<T>(out.handle)?
            .fill(T::from_f64(value));
        Ok(())
    }

    if dtype == DType::Str {
        return Err(Error::UnsupportedDType {
            dtype: DType::Str,
            op: "Fill",
        });
    }
    let out = backend.make_output(shape, dtype, None)?;
    match dtype {
        DType::F32 => fill_as::<f32, M>(backend, &out, value)?,
        DType::I32 => fill_as::<i32, M>(backend, &out, value)?,
        DType::Bool => fill_as::<u8, M>(backend, &out, value)?,
        DType::Complex64 => fill_as::<Complex64, M>(backend, &out, value)?,
        DType::Str => unreachable!(),
    }
    Ok(out)
}
