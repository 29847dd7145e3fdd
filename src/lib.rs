//! # numw
//!
//! **Tensor memory management and kernel dispatch over a linear-memory native
//! backend.**
//!
//! numw bridges a safe, handle-based tensor API to an opaque native module
//! that executes numeric kernels against one contiguous arena of linear
//! memory. The crate owns everything on the host side of that boundary:
//!
//! - **Handle registry**: opaque [`DataId`](registry::DataId) handles mapped
//!   to `{id, offset, shape, dtype}` records
//! - **Arena allocator**: byte offsets with exact-size free-list reuse
//! - **Backend**: write / read / dispose / reshape-as-alias lifecycle, plus
//!   zero-copy typed views over the heap
//! - **Dispatch protocol**: bind-once symbol resolution and a positional
//!   i32/bytes/bool calling convention with little-endian shape encoding
//! - **Kernel library**: binary/unary/reduction/argminmax builders, transpose
//!   with singleton stripping, reshape aliasing, slice, concat, cast, fill,
//!   reverse
//!
//! ## Quick Start
//!
//! ```rust
//! use numw::prelude::*;
//!
//! # fn main() -> numw::error::Result<()> {
//! let mut backend = Backend::new(CpuModule::new());
//! numw::kernels::register_all(&mut backend);
//!
//! let a = backend.write_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3])?;
//! let b = backend.write_slice(&[10.0f32, 20.0, 30.0], &[3])?;
//!
//! let sum = backend.run("Add", &[a, b], &OpAttrs::None)?;
//! assert_eq!(
//!     backend.read_vec::<f32>(sum.handle)?,
//!     vec![11.0, 22.0, 33.0, 14.0, 25.0, 36.0]
//! );
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod backend;
pub mod cpu;
pub mod dtype;
pub mod error;
pub mod kernels;
pub mod native;
pub mod registry;
pub mod shape;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{Backend, OpAttrs, TensorData, TensorInfo};
    pub use crate::cpu::CpuModule;
    pub use crate::dtype::{Complex64, DType, Element};
    pub use crate::error::{Error, Result};
    pub use crate::native::{ArgType, NativeBinding, NativeModule, NativeValue, ReturnKind};
    pub use crate::registry::DataId;
}
