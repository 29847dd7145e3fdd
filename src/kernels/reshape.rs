//! Reshape kernel: pure metadata, no copy and no native call
//!
//! The result is an aliasing view over the input's storage with a bumped
//! reference count, so input and view can be disposed in either order.

use crate::backend::{KernelConfig, OpAttrs};
use crate::error::Error;
use crate::native::NativeModule;

use super::{config_without_setup, expect_inputs};

/// Kernel configuration for the aliasing reshape
pub fn reshape_config<M: NativeModule + 'static>() -> KernelConfig<M> {
    config_without_setup("Reshape", |backend, inputs, attrs| {
        let [x] = expect_inputs::<1>("Reshape", inputs)?;
        let OpAttrs::Shape { shape } = attrs else {
            return Err(Error::InvalidArgument {
                arg: "attrs",
                reason: "'Reshape' requires Shape attributes".to_string(),
            });
        };
        backend.reshape(x, shape)
    })
}
