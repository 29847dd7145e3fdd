//! Cast kernel: element conversion on the host, no native call

use crate::backend::{Backend, KernelConfig, OpAttrs, TensorInfo};
use crate::dtype::{Complex64, DType, Element};
use crate::error::{Error, Result};
use crate::native::NativeModule;
use crate::registry::DataId;

use super::{config_without_setup, expect_inputs, identity};

/// Kernel configuration for element dtype conversion
pub fn cast_config<M: NativeModule + 'static>() -> KernelConfig<M> {
    config_without_setup("Cast", |backend, inputs, attrs| {
        let [x] = expect_inputs::<1>("Cast", inputs)?;
        let OpAttrs::Cast { dtype } = attrs else {
            return Err(Error::InvalidArgument {
                arg: "attrs",
                reason: "'Cast' requires Cast attributes".to_string(),
            });
        };
        cast_impl(backend, x, *dtype)
    })
}

fn cast_impl<M: NativeModule>(
    backend: &mut Backend<M>,
    x: DataId,
    target: DType,
) -> Result<TensorInfo> {
    let x_info = backend.tensor_info(x)?;
    if x_info.dtype == target {
        return identity::identity_impl(backend, x, None);
    }
    if x_info.dtype == DType::Str || target == DType::Str {
        return Err(Error::UnsupportedDType {
            dtype: DType::Str,
            op: "Cast",
        });
    }

    // Two passes through f64 keep the dtype pairing table flat; the copy out
    // of the source view releases the arena borrow before the output view.
    let values = read_as_f64(backend, x, x_info.dtype)?;
    let out = backend.make_output(&x_info.shape, target, None)?;
    write_from_f64(backend, out.handle, target, &values)?;
    Ok(out)
}

fn read_as_f64<M: NativeModule>(
    backend: &Backend<M>,
    x: DataId,
    dtype: DType,
) -> Result<Vec<f64>> {
    fn collect<T: Element, M: NativeModule>(backend: &Backend<M>, x: DataId) -> Result<Vec<f64>> {
        Ok(backend
            .typed_slice::<T>(x)?
            .iter()
            .map(|v| v.to_f64())
            .collect())
    }
    match dtype {
        DType::F32 => collect::<f32, M>(backend, x),
        DType::I32 => collect::<i32, M>(backend, x),
        DType::Bool => collect::<u8, M>(backend, x),
        // Casting out of the complex domain keeps the real component.
        DType::Complex64 => Ok(backend
            .typed_slice::<Complex64>(x)?
            .iter()
            .map(|v| v.re as f64)
            .collect()),
        DType::Str => Err(Error::UnsupportedDType {
            dtype: DType::Str,
            op: "Cast",
        }),
    }
}

fn write_from_f64<M: NativeModule>(
    backend: &mut Backend<M>,
    out: DataId,
    dtype: DType,
    values: &[f64],
) -> Result<()> {
    fn fill<T: Element, M: NativeModule>(
        backend: &mut Backend<M>,
        out: DataId,
        values: &[f64],
    ) -> Result<()> {
        let slice = backend.typed_slice_mut::<T>(out)?;
        for (dst, &v) in slice.iter_mut().zip(values) {
            *dst = T::from_f64(v);
        }
        Ok(())
    }
    match dtype {
        DType::F32 => fill::<f32, M>(backend, out, values),
        DType::I32 => fill::<i32, M>(backend, out, values),
        DType::Bool => fill::<u8, M>(backend, out, values),
        DType::Complex64 => fill::<Complex64, M>(backend, out, values),
        DType::Str => Err(Error::UnsupportedDType {
            dtype: DType::Str,
            op: "Cast",
        }),
    }
}
