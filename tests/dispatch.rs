//! Kernel dispatch protocol: bind-once, short-circuits, the wire convention

mod common;

use common::MockModule;
use numw::arena::Arena;
use numw::error::Result;
use numw::kernels;
use numw::prelude::*;

fn backend() -> Backend<MockModule> {
    let mut backend = Backend::new(MockModule::new());
    kernels::register_all(&mut backend);
    backend
}

#[test]
fn test_add_with_inner_broadcast() {
    let mut backend = backend();
    let a = backend
        .write_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3])
        .unwrap();
    let b = backend.write_slice(&[10.0f32, 20.0, 30.0], &[3]).unwrap();

    let out = backend.run("Add", &[a, b], &OpAttrs::None).unwrap();
    assert_eq!(out.shape, vec![2, 3]);
    assert_eq!(out.dtype, DType::F32);
    assert_eq!(
        backend.read_vec::<f32>(out.handle).unwrap(),
        vec![11.0, 22.0, 33.0, 14.0, 25.0, 36.0]
    );
}

#[test]
fn test_binary_full_broadcast_f32() {
    let mut backend = backend();
    let a = backend
        .write_slice(&[1.0f32, 2.0, 3.0, 4.0], &[4, 1])
        .unwrap();
    let b = backend.write_slice(&[10.0f32, 20.0], &[1, 2]).unwrap();

    let out = backend.run("Mul", &[a, b], &OpAttrs::None).unwrap();
    assert_eq!(out.shape, vec![4, 2]);
    assert_eq!(
        backend.read_vec::<f32>(out.handle).unwrap(),
        vec![10.0, 20.0, 20.0, 40.0, 30.0, 60.0, 40.0, 80.0]
    );
}

#[test]
fn test_binary_i32_whole_operand_tiling() {
    let mut backend = backend();
    let a = backend.write_slice(&[1i32, 2, 3, 4, 5, 6], &[2, 3]).unwrap();
    let b = backend.write_slice(&[10i32, 20, 30], &[3]).unwrap();

    // b's broadcast dim is the leading output dim, so the fallback path
    // still applies for non-f32 operands.
    let out = backend.run("Sub", &[a, b], &OpAttrs::None).unwrap();
    assert_eq!(
        backend.read_vec::<i32>(out.handle).unwrap(),
        vec![-9, -18, -27, -6, -15, -24]
    );
}

#[test]
fn test_binary_rejects_inner_dim_broadcast_without_support() {
    let mut backend = backend();
    let a = backend.write_slice(&[1i32, 2, 3, 4, 5, 6], &[2, 3]).unwrap();
    let b = backend.write_slice(&[10i32, 20], &[2, 1]).unwrap();
    assert!(matches!(
        backend.run("Add", &[a, b], &OpAttrs::None),
        Err(Error::Unsupported { op: "Add", .. })
    ));

    // Maximum never advertises full broadcast, even for f32.
    let c = backend
        .write_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3])
        .unwrap();
    let d = backend.write_slice(&[10.0f32, 20.0], &[2, 1]).unwrap();
    assert!(matches!(
        backend.run("Maximum", &[c, d], &OpAttrs::None),
        Err(Error::Unsupported { op: "Maximum", .. })
    ));
}

#[test]
fn test_binary_rejects_incompatible_shapes() {
    let mut backend = backend();
    let a = backend.write_slice(&[0.0f32; 6], &[2, 3]).unwrap();
    let b = backend.write_slice(&[0.0f32; 12], &[4, 3]).unwrap();
    assert!(matches!(
        backend.run("Add", &[a, b], &OpAttrs::None),
        Err(Error::ShapeMismatch { .. })
    ));
}

#[test]
fn test_binary_rejects_mixed_dtypes() {
    let mut backend = backend();
    let a = backend.write_slice(&[0.0f32; 3], &[3]).unwrap();
    let b = backend.write_slice(&[0i32; 3], &[3]).unwrap();
    assert!(matches!(
        backend.run("Add", &[a, b], &OpAttrs::None),
        Err(Error::Unsupported { .. })
    ));
}

#[test]
fn test_zero_size_output_short_circuits_native_call() {
    let mut backend = backend();
    let a = backend.write(None, &[0, 3], DType::F32).unwrap();
    let b = backend.write(None, &[3], DType::F32).unwrap();

    let out = backend.run("Add", &[a, b], &OpAttrs::None).unwrap();
    assert_eq!(out.shape, vec![0, 3]);
    assert_eq!(backend.module().invokes_of("Add"), 0);
}

#[test]
fn test_symbol_is_bound_once_per_backend() {
    let mut backend = backend();
    let a = backend.write_slice(&[1.0f32, 2.0], &[2]).unwrap();
    let b = backend.write_slice(&[3.0f32, 4.0], &[2]).unwrap();

    backend.run("Add", &[a, b], &OpAttrs::None).unwrap();
    backend.run("Add", &[a, b], &OpAttrs::None).unwrap();
    backend.run("Add", &[b, a], &OpAttrs::None).unwrap();

    assert_eq!(backend.module().binds_of("Add"), 1);
    assert_eq!(backend.module().invokes_of("Add"), 3);
}

#[test]
fn test_unary_kernels() {
    let mut backend = backend();
    let x = backend
        .write_slice(&[-2.0f32, 0.0, 3.0, -0.5], &[4])
        .unwrap();

    let abs = backend.run("Abs", &[x], &OpAttrs::None).unwrap();
    assert_eq!(
        backend.read_vec::<f32>(abs.handle).unwrap(),
        vec![2.0, 0.0, 3.0, 0.5]
    );

    let neg = backend.run("Neg", &[x], &OpAttrs::None).unwrap();
    assert_eq!(
        backend.read_vec::<f32>(neg.handle).unwrap(),
        vec![2.0, 0.0, -3.0, 0.5]
    );

    let relu = backend.run("Relu", &[x], &OpAttrs::None).unwrap();
    assert_eq!(
        backend.read_vec::<f32>(relu.handle).unwrap(),
        vec![0.0, 0.0, 3.0, 0.0]
    );

    let square = backend.run("Square", &[x], &OpAttrs::None).unwrap();
    assert_eq!(
        backend.read_vec::<f32>(square.handle).unwrap(),
        vec![4.0, 0.0, 9.0, 0.25]
    );

    let y = backend.write_slice(&[4.0f32, 9.0], &[2]).unwrap();
    let sqrt = backend.run("Sqrt", &[y], &OpAttrs::None).unwrap();
    assert_eq!(backend.read_vec::<f32>(sqrt.handle).unwrap(), vec![2.0, 3.0]);
}

#[test]
fn test_unknown_kernel_and_unknown_symbol() {
    let mut backend = backend();
    let x = backend.write_slice(&[1.0f32], &[1]).unwrap();
    assert!(matches!(
        backend.run("Erf", &[x], &OpAttrs::None),
        Err(Error::KernelNotFound { .. })
    ));
    assert!(matches!(
        backend.bind_once("NoSuchSymbol", &[], ReturnKind::Void),
        Err(Error::UnknownSymbol { .. })
    ));
}

/// Module whose single symbol always reports a native failure through the
/// status-word convention
#[derive(Debug, Default)]
struct FailingModule;

impl NativeModule for FailingModule {
    fn bind(
        &mut self,
        symbol: &str,
        signature: &[ArgType],
        returns: ReturnKind,
    ) -> Result<NativeBinding> {
        Ok(NativeBinding {
            symbol: symbol.to_string(),
            signature: signature.to_vec(),
            returns,
            slot: 0,
        })
    }

    fn invoke(
        &mut self,
        _binding: &NativeBinding,
        arena: &mut Arena,
        _args: &[NativeValue<'_>],
    ) -> Result<i32> {
        let msg = b"unsupported layout";
        let msg_offset = arena.alloc(msg.len())?;
        arena.bytes_mut(msg_offset, msg.len()).copy_from_slice(msg);
        let record = arena.alloc(12)?;
        arena.write_i32(record, 7);
        arena.write_i32(record + 4, msg_offset as i32);
        arena.write_i32(record + 8, msg.len() as i32);
        Ok(record as i32)
    }

    fn register_tensor(&mut self, _id: i32, _size: usize, _offset: usize) {}

    fn dispose_data(&mut self, _id: i32) {}
}

#[test]
fn test_native_failure_is_decoded_and_freed() {
    let mut backend = Backend::new(FailingModule);
    let binding = backend
        .bind_once("Conv2D", &[ArgType::I32], ReturnKind::Status)
        .unwrap();

    let err = backend
        .invoke(&binding, &[NativeValue::I32(1)])
        .unwrap_err();
    match err {
        Error::NativeKernelFailure {
            symbol,
            code,
            message,
        } => {
            assert_eq!(symbol, "Conv2D");
            assert_eq!(code, 7);
            assert_eq!(message, "unsupported layout");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // The failure payload does not leak.
    assert_eq!(backend.arena().used_bytes(), 0);
}
