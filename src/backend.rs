//! Backend instance: tensor lifecycle and kernel dispatch
//!
//! A [`Backend`] owns one arena, one handle registry and one native module,
//! plus the per-instance state the dispatch protocol needs: the memoized
//! symbol bindings, the kernel registry, and the alias reference counts that
//! make reshape views safe to dispose in any order.

use crate::arena::Arena;
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::native::{ArgType, NativeBinding, NativeModule, NativeValue, ReturnKind, decode_failure};
use crate::registry::{DataId, HandleRegistry, TensorRecord};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

/// Everything a kernel returns about the tensor it produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TensorInfo {
    /// Opaque handle for further operations
    pub handle: DataId,
    /// Numeric id the native module knows the tensor by
    pub id: i32,
    /// Logical shape
    pub shape: Vec<usize>,
    /// Element dtype
    pub dtype: DType,
    /// Arena byte offset, `None` for string tensors
    pub memory_offset: Option<usize>,
}

/// Typed view of a tensor's contents, produced by [`Backend::read_sync`]
#[derive(Clone, Debug, PartialEq)]
pub enum TensorData {
    /// 32-bit float elements
    F32(Vec<f32>),
    /// 32-bit integer elements
    I32(Vec<i32>),
    /// One byte per element; nonzero reads as true
    Bool(Vec<u8>),
    /// Out-of-band string elements
    Str(Vec<Vec<u8>>),
    /// Complex elements
    Complex64(Vec<crate::dtype::Complex64>),
}

/// Attributes carried alongside the input handles into [`Backend::run`]
#[derive(Clone, Debug, Default)]
pub enum OpAttrs {
    /// Operation takes no attributes
    #[default]
    None,
    /// Reduction axes (negative indexing allowed) and keep_dims flag
    Reduce { axes: Vec<isize>, keep_dims: bool },
    /// Single axis for argmax / argmin
    Axis { axis: isize },
    /// Dimension permutation for transpose
    Perm { perm: Vec<usize> },
    /// Target shape for reshape
    Shape { shape: Vec<usize> },
    /// Begin coordinates and extent per dimension for slice
    Slice { begin: Vec<usize>, size: Vec<usize> },
    /// Concatenation axis
    Concat { axis: usize },
    /// Target dtype for cast
    Cast { dtype: DType },
    /// Shape, dtype and scalar value for fill
    Fill {
        shape: Vec<usize>,
        dtype: DType,
        value: f64,
    },
    /// Axes to flip for reverse (negative indexing allowed)
    Reverse { axes: Vec<isize> },
}

/// One registered operation
///
/// `setup` runs at most once per backend before the first dispatch of this
/// operation (eager shader/binding warmup in practice); `kernel` is the
/// dispatch function itself.
pub struct KernelConfig<M: NativeModule> {
    /// Operation name the registry is keyed by (e.g. "Add")
    pub name: &'static str,
    /// One-time initialization, run lazily before the first dispatch
    pub setup: Option<Box<dyn Fn(&mut Backend<M>) -> Result<()>>>,
    /// The dispatch function
    pub kernel: Box<dyn Fn(&mut Backend<M>, &[DataId], &OpAttrs) -> Result<TensorInfo>>,
}

/// Tensor lifecycle and dispatch over one native module instance
pub struct Backend<M: NativeModule> {
    arena: Arena,
    registry: HandleRegistry,
    module: M,
    /// symbol -> resolved binding; at most one bind per symbol per backend
    bindings: HashMap<String, NativeBinding>,
    kernels: HashMap<&'static str, Rc<KernelConfig<M>>>,
    setup_done: HashSet<&'static str>,
    /// numeric id -> number of live records aliasing it (reshape views)
    alias_counts: HashMap<i32, usize>,
    /// next numeric id; 0 is reserved for "no tensor"
    next_id: i32,
}

impl<M: NativeModule> Backend<M> {
    /// Create a backend over `module` with the default arena limit
    pub fn new(module: M) -> Self {
        Self {
            arena: Arena::default(),
            registry: HandleRegistry::new(),
            module,
            bindings: HashMap::new(),
            kernels: HashMap::new(),
            setup_done: HashSet::new(),
            alias_counts: HashMap::new(),
            next_id: 1,
        }
    }

    /// Create a backend whose arena refuses to grow past `limit` bytes
    pub fn with_arena_limit(module: M, limit: usize) -> Self {
        let mut backend = Self::new(module);
        backend.arena = Arena::with_limit(limit);
        backend
    }

    /// The underlying native module
    #[inline]
    pub fn module(&self) -> &M {
        &self.module
    }

    /// Mutable access to the underlying native module
    #[inline]
    pub fn module_mut(&mut self) -> &mut M {
        &mut self.module
    }

    /// The backing arena (read-only; kernels use [`arena_mut`](Self::arena_mut))
    #[inline]
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    #[inline]
    pub(crate) fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    // ========================================================================
    // Tensor lifecycle
    // ========================================================================

    /// Register a new tensor, optionally copying initial contents
    ///
    /// Allocation happens before registration, so an `OutOfMemory` failure
    /// leaves no partial state behind. String tensors go through
    /// [`write_strings`](Self::write_strings) instead.
    pub fn write(
        &mut self,
        values: Option<&[u8]>,
        shape: &[usize],
        dtype: DType,
    ) -> Result<DataId> {
        if dtype == DType::Str {
            return Err(Error::InvalidArgument {
                arg: "dtype",
                reason: "string tensors are created with write_strings".to_string(),
            });
        }
        let size: usize = shape.iter().product();
        let num_bytes = size * dtype.size_in_bytes();
        if let Some(values) = values {
            if values.len() != num_bytes {
                return Err(Error::InvalidArgument {
                    arg: "values",
                    reason: format!("expected {num_bytes} bytes, got {}", values.len()),
                });
            }
        }

        let offset = self.arena.alloc(num_bytes)?;
        if let Some(values) = values {
            self.arena.bytes_mut(offset, num_bytes).copy_from_slice(values);
        }

        let id = self.next_numeric_id();
        self.module.register_tensor(id, size, offset);
        let handle = DataId::new();
        self.registry.set(
            handle,
            TensorRecord {
                id,
                memory_offset: Some(offset),
                shape: shape.to_vec(),
                dtype,
                string_bytes: None,
            },
        );
        self.alias_counts.insert(id, 1);
        Ok(handle)
    }

    /// Typed convenience over [`write`](Self::write)
    pub fn write_slice<T: Element>(&mut self, values: &[T], shape: &[usize]) -> Result<DataId> {
        let size: usize = shape.iter().product();
        if values.len() != size {
            return Err(Error::InvalidArgument {
                arg: "values",
                reason: format!("expected {size} elements, got {}", values.len()),
            });
        }
        self.write(Some(bytemuck::cast_slice(values)), shape, T::DTYPE)
    }

    /// Register a string tensor; elements live out-of-band, never in the arena
    pub fn write_strings(&mut self, values: Vec<Vec<u8>>, shape: &[usize]) -> Result<DataId> {
        let size: usize = shape.iter().product();
        if values.len() != size {
            return Err(Error::InvalidArgument {
                arg: "values",
                reason: format!("expected {size} strings, got {}", values.len()),
            });
        }
        let id = self.next_numeric_id();
        let handle = DataId::new();
        self.registry.set(
            handle,
            TensorRecord {
                id,
                memory_offset: None,
                shape: shape.to_vec(),
                dtype: DType::Str,
                string_bytes: Some(values),
            },
        );
        self.alias_counts.insert(id, 1);
        Ok(handle)
    }

    /// Create an output tensor for a kernel
    ///
    /// Without an offset this allocates fresh zeroed storage. With an offset
    /// it takes ownership of an already-filled arena region (a result a
    /// native kernel allocated itself) and only registers it.
    pub fn make_output(
        &mut self,
        shape: &[usize],
        dtype: DType,
        memory_offset: Option<usize>,
    ) -> Result<TensorInfo> {
        match memory_offset {
            None => {
                let handle = self.write(None, shape, dtype)?;
                self.tensor_info(handle)
            }
            Some(offset) => {
                let size: usize = shape.iter().product();
                let id = self.next_numeric_id();
                self.module.register_tensor(id, size, offset);
                let handle = DataId::new();
                self.registry.set(
                    handle,
                    TensorRecord {
                        id,
                        memory_offset: Some(offset),
                        shape: shape.to_vec(),
                        dtype,
                        string_bytes: None,
                    },
                );
                self.alias_counts.insert(id, 1);
                self.tensor_info(handle)
            }
        }
    }

    /// The public face of a registered tensor
    pub fn tensor_info(&self, handle: DataId) -> Result<TensorInfo> {
        let record = self.registry.get(handle)?;
        Ok(TensorInfo {
            handle,
            id: record.id,
            shape: record.shape.clone(),
            dtype: record.dtype,
            memory_offset: record.memory_offset,
        })
    }

    /// Copy a tensor's contents out as a typed enum
    pub fn read_sync(&self, handle: DataId) -> Result<TensorData> {
        let record = self.registry.get(handle)?;
        Ok(match record.dtype {
            DType::F32 => TensorData::F32(self.typed_slice::<f32>(handle)?.to_vec()),
            DType::I32 => TensorData::I32(self.typed_slice::<i32>(handle)?.to_vec()),
            DType::Bool => TensorData::Bool(self.typed_slice::<u8>(handle)?.to_vec()),
            DType::Complex64 => {
                TensorData::Complex64(self.typed_slice::<crate::dtype::Complex64>(handle)?.to_vec())
            }
            DType::Str => TensorData::Str(
                record
                    .string_bytes
                    .clone()
                    .unwrap_or_default(),
            ),
        })
    }

    /// Copy a tensor's contents out as `Vec<T>`, checking the dtype
    pub fn read_vec<T: Element>(&self, handle: DataId) -> Result<Vec<T>> {
        Ok(self.typed_slice::<T>(handle)?.to_vec())
    }

    /// Zero-copy typed view over a tensor's arena storage
    ///
    /// The borrow pins the arena, so the view cannot outlive any later
    /// allocation or free.
    pub fn typed_slice<T: Element>(&self, handle: DataId) -> Result<&[T]> {
        let record = self.registry.get(handle)?;
        let offset = self.storage_offset(record, "typed_slice")?;
        if record.dtype != T::DTYPE {
            return Err(Error::UnsupportedDType {
                dtype: record.dtype,
                op: "typed_slice",
            });
        }
        Ok(bytemuck::cast_slice(
            self.arena.bytes(offset, record.size_in_bytes()),
        ))
    }

    /// Mutable zero-copy typed view over a tensor's arena storage
    pub fn typed_slice_mut<T: Element>(&mut self, handle: DataId) -> Result<&mut [T]> {
        let record = self.registry.get(handle)?;
        let offset = self.storage_offset(record, "typed_slice_mut")?;
        if record.dtype != T::DTYPE {
            return Err(Error::UnsupportedDType {
                dtype: record.dtype,
                op: "typed_slice_mut",
            });
        }
        let num_bytes = record.size_in_bytes();
        Ok(bytemuck::cast_slice_mut(
            self.arena.bytes_mut(offset, num_bytes),
        ))
    }

    fn storage_offset(&self, record: &TensorRecord, op: &'static str) -> Result<usize> {
        record.memory_offset.ok_or(Error::UnsupportedDType {
            dtype: record.dtype,
            op,
        })
    }

    /// Release one reference to a tensor
    ///
    /// The record is always removed; arena storage is freed and the native
    /// module notified only when the last alias of the underlying allocation
    /// goes away. Disposing an unknown handle fails with `UnknownHandle`.
    pub fn dispose_data(&mut self, handle: DataId) -> Result<()> {
        let record = self.registry.remove(handle)?;
        let count = self
            .alias_counts
            .get_mut(&record.id)
            .ok_or(Error::UnknownHandle {
                handle: handle.raw(),
            })?;
        *count -= 1;
        if *count == 0 {
            self.alias_counts.remove(&record.id);
            if let Some(offset) = record.memory_offset {
                self.arena.free(offset);
            }
            if record.dtype.has_arena_storage() {
                self.module.dispose_data(record.id);
            }
        }
        Ok(())
    }

    /// Create an aliasing view with a new shape
    ///
    /// The view shares the numeric id and arena storage of the source;
    /// either handle may be disposed first. Element counts must match.
    pub fn reshape(&mut self, handle: DataId, new_shape: &[usize]) -> Result<TensorInfo> {
        let record = self.registry.get(handle)?;
        let new_size: usize = new_shape.iter().product();
        if new_size != record.size() {
            return Err(Error::ShapeMismatch {
                lhs: record.shape.clone(),
                rhs: new_shape.to_vec(),
            });
        }
        let mut view = record.clone();
        view.shape = new_shape.to_vec();
        let id = view.id;
        let view_handle = DataId::new();
        self.registry.set(view_handle, view);
        *self.alias_counts.entry(id).or_insert(0) += 1;
        self.tensor_info(view_handle)
    }

    /// Arena offset of a tensor's storage (`None` for string tensors)
    pub fn get_memory_offset(&self, handle: DataId) -> Result<Option<usize>> {
        Ok(self.registry.get(handle)?.memory_offset)
    }

    /// Number of live tensor records
    #[inline]
    pub fn num_data_ids(&self) -> usize {
        self.registry.len()
    }

    fn next_numeric_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ========================================================================
    // Native dispatch
    // ========================================================================

    /// Resolve a symbol, memoizing the binding per backend instance
    ///
    /// The module sees at most one `bind` per symbol for the lifetime of
    /// this backend.
    pub fn bind_once(
        &mut self,
        symbol: &str,
        signature: &[ArgType],
        returns: ReturnKind,
    ) -> Result<NativeBinding> {
        if let Some(binding) = self.bindings.get(symbol) {
            return Ok(binding.clone());
        }
        let binding = self.module.bind(symbol, signature, returns)?;
        self.bindings.insert(symbol.to_string(), binding.clone());
        Ok(binding)
    }

    /// Call a bound kernel, decoding `Status` failures into errors
    ///
    /// For `Status` bindings a nonzero return is treated as the offset of a
    /// native failure record; it is decoded, freed and surfaced as
    /// `NativeKernelFailure`. The raw word is returned for `Offset` bindings.
    pub fn invoke(&mut self, binding: &NativeBinding, args: &[NativeValue<'_>]) -> Result<i32> {
        let word = self.module.invoke(binding, &mut self.arena, args)?;
        if binding.returns == ReturnKind::Status && word != 0 {
            return Err(decode_failure(&mut self.arena, &binding.symbol, word as usize));
        }
        Ok(word)
    }

    // ========================================================================
    // Kernel registry
    // ========================================================================

    /// Register an operation; later registrations under the same name win
    pub fn register_kernel(&mut self, config: KernelConfig<M>) {
        self.kernels.insert(config.name, Rc::new(config));
    }

    /// Whether an operation is registered
    pub fn has_kernel(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }

    /// Dispatch an operation by name
    ///
    /// Runs the kernel's `setup` hook the first time the name is dispatched,
    /// then the kernel itself.
    pub fn run(&mut self, name: &str, inputs: &[DataId], attrs: &OpAttrs) -> Result<TensorInfo> {
        let config = self
            .kernels
            .get(name)
            .cloned()
            .ok_or_else(|| Error::KernelNotFound {
                name: name.to_string(),
            })?;
        if !self.setup_done.contains(config.name) {
            if let Some(setup) = &config.setup {
                setup(self)?;
            }
            self.setup_done.insert(config.name);
        }
        (config.kernel)(self, inputs, attrs)
    }
}

impl<M: NativeModule> fmt::Debug for Backend<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("num_data_ids", &self.registry.len())
            .field("used_bytes", &self.arena.used_bytes())
            .field("capacity", &self.arena.capacity())
            .field("bindings", &self.bindings.len())
            .field("kernels", &self.kernels.len())
            .finish()
    }
}
