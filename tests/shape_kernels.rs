//! Data movement kernels: transpose, reshape, slice, concat, cast, fill,
//! reverse, identity

mod common;

use common::MockModule;
use numw::kernels;
use numw::prelude::*;

fn backend() -> Backend<MockModule> {
    let mut backend = Backend::new(MockModule::new());
    kernels::register_all(&mut backend);
    backend
}

#[test]
fn test_transpose_2d() {
    let mut backend = backend();
    let x = backend
        .write_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3])
        .unwrap();
    let out = backend
        .run("Transpose", &[x], &OpAttrs::Perm { perm: vec![1, 0] })
        .unwrap();
    assert_eq!(out.shape, vec![3, 2]);
    assert_eq!(
        backend.read_vec::<f32>(out.handle).unwrap(),
        vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]
    );
}

#[test]
fn test_transpose_i32_3d() {
    let mut backend = backend();
    let x = backend
        .write_slice(&[0i32, 1, 2, 3, 4, 5, 6, 7], &[2, 2, 2])
        .unwrap();
    let out = backend
        .run("Transpose", &[x], &OpAttrs::Perm { perm: vec![2, 0, 1] })
        .unwrap();
    assert_eq!(out.shape, vec![2, 2, 2]);
    assert_eq!(
        backend.read_vec::<i32>(out.handle).unwrap(),
        vec![0, 2, 4, 6, 1, 3, 5, 7]
    );
}

#[test]
fn test_transpose_of_singleton_dims_is_a_copy() {
    let mut backend = backend();
    let x = backend
        .write_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[1, 2, 3])
        .unwrap();
    // Moving only the size-1 dim leaves storage order untouched.
    let out = backend
        .run("Transpose", &[x], &OpAttrs::Perm { perm: vec![1, 0, 2] })
        .unwrap();
    assert_eq!(out.shape, vec![2, 1, 3]);
    assert_eq!(
        backend.read_vec::<f32>(out.handle).unwrap(),
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
    );
    assert_eq!(backend.module().invokes_of("Transpose"), 0);
}

#[test]
fn test_transpose_strips_singleton_dims_before_native_call() {
    let mut backend = backend();
    let x = backend
        .write_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[1, 2, 3])
        .unwrap();
    let out = backend
        .run("Transpose", &[x], &OpAttrs::Perm { perm: vec![2, 0, 1] })
        .unwrap();
    assert_eq!(out.shape, vec![3, 1, 2]);
    assert_eq!(
        backend.read_vec::<f32>(out.handle).unwrap(),
        vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]
    );
    assert_eq!(backend.module().invokes_of("Transpose"), 1);
}

#[test]
fn test_transpose_rejects_bad_perm() {
    let mut backend = backend();
    let x = backend.write_slice(&[1.0f32; 6], &[2, 3]).unwrap();
    assert!(matches!(
        backend.run("Transpose", &[x], &OpAttrs::Perm { perm: vec![0, 0] }),
        Err(Error::InvalidArgument { arg: "perm", .. })
    ));
}

#[test]
fn test_reshape_kernel_is_an_alias() {
    let mut backend = backend();
    let x = backend.write_slice(&[1.0f32, 2.0, 3.0, 4.0], &[4]).unwrap();
    let x_info = backend.tensor_info(x).unwrap();
    let out = backend
        .run(
            "Reshape",
            &[x],
            &OpAttrs::Shape {
                shape: vec![2, 2],
            },
        )
        .unwrap();
    assert_eq!(out.shape, vec![2, 2]);
    assert_eq!(out.id, x_info.id);
    assert_eq!(out.memory_offset, x_info.memory_offset);
}

#[test]
fn test_identity_copies_storage() {
    let mut backend = backend();
    let x = backend.write_slice(&[1.0f32, 2.0], &[2]).unwrap();
    let out = backend.run("Identity", &[x], &OpAttrs::None).unwrap();
    assert_ne!(out.memory_offset, backend.get_memory_offset(x).unwrap());

    backend.typed_slice_mut::<f32>(x).unwrap()[0] = 99.0;
    assert_eq!(backend.read_vec::<f32>(out.handle).unwrap(), vec![1.0, 2.0]);
}

#[test]
fn test_slice_contiguous_rows() {
    let mut backend = backend();
    let x = backend
        .write_slice(&(0..12).map(|v| v as f32).collect::<Vec<_>>(), &[3, 4])
        .unwrap();
    let out = backend
        .run(
            "Slice",
            &[x],
            &OpAttrs::Slice {
                begin: vec![1, 0],
                size: vec![2, 4],
            },
        )
        .unwrap();
    assert_eq!(out.shape, vec![2, 4]);
    assert_eq!(
        backend.read_vec::<f32>(out.handle).unwrap(),
        vec![4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0]
    );
}

#[test]
fn test_slice_strided_columns() {
    let mut backend = backend();
    let x = backend
        .write_slice(&(0..12).map(|v| v as f32).collect::<Vec<_>>(), &[3, 4])
        .unwrap();
    let out = backend
        .run(
            "Slice",
            &[x],
            &OpAttrs::Slice {
                begin: vec![0, 1],
                size: vec![3, 2],
            },
        )
        .unwrap();
    assert_eq!(out.shape, vec![3, 2]);
    assert_eq!(
        backend.read_vec::<f32>(out.handle).unwrap(),
        vec![1.0, 2.0, 5.0, 6.0, 9.0, 10.0]
    );
}

#[test]
fn test_slice_out_of_bounds() {
    let mut backend = backend();
    let x = backend.write_slice(&[1.0f32; 6], &[2, 3]).unwrap();
    assert!(matches!(
        backend.run(
            "Slice",
            &[x],
            &OpAttrs::Slice {
                begin: vec![1, 2],
                size: vec![1, 2],
            },
        ),
        Err(Error::InvalidArgument { arg: "size", .. })
    ));
}

#[test]
fn test_concat_axis0_and_axis1() {
    let mut backend = backend();
    let a = backend.write_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
    let b = backend.write_slice(&[5.0f32, 6.0], &[1, 2]).unwrap();
    let rows = backend
        .run("Concat", &[a, b], &OpAttrs::Concat { axis: 0 })
        .unwrap();
    assert_eq!(rows.shape, vec![3, 2]);
    assert_eq!(
        backend.read_vec::<f32>(rows.handle).unwrap(),
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
    );

    let c = backend.write_slice(&[7.0f32, 8.0], &[2, 1]).unwrap();
    let cols = backend
        .run("Concat", &[a, c], &OpAttrs::Concat { axis: 1 })
        .unwrap();
    assert_eq!(cols.shape, vec![2, 3]);
    assert_eq!(
        backend.read_vec::<f32>(cols.handle).unwrap(),
        vec![1.0, 2.0, 7.0, 3.0, 4.0, 8.0]
    );
}

#[test]
fn test_concat_rejects_mismatched_shapes() {
    let mut backend = backend();
    let a = backend.write_slice(&[1.0f32; 4], &[2, 2]).unwrap();
    let b = backend.write_slice(&[1.0f32; 6], &[2, 3]).unwrap();
    assert!(matches!(
        backend.run("Concat", &[a, b], &OpAttrs::Concat { axis: 0 }),
        Err(Error::ShapeMismatch { .. })
    ));
}

#[test]
fn test_cast_between_dtypes() {
    let mut backend = backend();
    let x = backend
        .write_slice(&[1.9f32, -2.9, 0.0], &[3])
        .unwrap();
    let ints = backend
        .run("Cast", &[x], &OpAttrs::Cast { dtype: DType::I32 })
        .unwrap();
    assert_eq!(ints.dtype, DType::I32);
    assert_eq!(backend.read_vec::<i32>(ints.handle).unwrap(), vec![1, -2, 0]);

    let bools = backend
        .run("Cast", &[x], &OpAttrs::Cast { dtype: DType::Bool })
        .unwrap();
    assert_eq!(backend.read_vec::<u8>(bools.handle).unwrap(), vec![1, 1, 0]);

    let back = backend
        .run(
            "Cast",
            &[bools.handle],
            &OpAttrs::Cast { dtype: DType::F32 },
        )
        .unwrap();
    assert_eq!(
        backend.read_vec::<f32>(back.handle).unwrap(),
        vec![1.0, 1.0, 0.0]
    );
}

#[test]
fn test_cast_complex_keeps_real_part() {
    let mut backend = backend();
    let x = backend
        .write_slice(
            &[Complex64::new(1.5, -2.0), Complex64::new(-3.0, 4.0)],
            &[2],
        )
        .unwrap();
    let out = backend
        .run("Cast", &[x], &OpAttrs::Cast { dtype: DType::F32 })
        .unwrap();
    assert_eq!(backend.read_vec::<f32>(out.handle).unwrap(), vec![1.5, -3.0]);
}

#[test]
fn test_cast_to_same_dtype_is_a_copy() {
    let mut backend = backend();
    let x = backend.write_slice(&[5i32, 6], &[2]).unwrap();
    let out = backend
        .run("Cast", &[x], &OpAttrs::Cast { dtype: DType::I32 })
        .unwrap();
    assert_ne!(out.memory_offset, backend.get_memory_offset(x).unwrap());
    assert_eq!(backend.read_vec::<i32>(out.handle).unwrap(), vec![5, 6]);
}

#[test]
fn test_fill() {
    let mut backend = backend();
    let out = backend
        .run(
            "Fill",
            &[],
            &OpAttrs::Fill {
                shape: vec![2, 2],
                dtype: DType::F32,
                value: 3.5,
            },
        )
        .unwrap();
    assert_eq!(out.shape, vec![2, 2]);
    assert_eq!(backend.read_vec::<f32>(out.handle).unwrap(), vec![3.5; 4]);

    let flags = backend
        .run(
            "Fill",
            &[],
            &OpAttrs::Fill {
                shape: vec![3],
                dtype: DType::Bool,
                value: 1.0,
            },
        )
        .unwrap();
    assert_eq!(backend.read_vec::<u8>(flags.handle).unwrap(), vec![1, 1, 1]);
}

#[test]
fn test_reverse_single_and_multiple_axes() {
    let mut backend = backend();
    let x = backend
        .write_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3])
        .unwrap();

    let cols = backend
        .run("Reverse", &[x], &OpAttrs::Reverse { axes: vec![1] })
        .unwrap();
    assert_eq!(
        backend.read_vec::<f32>(cols.handle).unwrap(),
        vec![3.0, 2.0, 1.0, 6.0, 5.0, 4.0]
    );

    let both = backend
        .run("Reverse", &[x], &OpAttrs::Reverse { axes: vec![0, 1] })
        .unwrap();
    assert_eq!(
        backend.read_vec::<f32>(both.handle).unwrap(),
        vec![6.0, 5.0, 4.0, 3.0, 2.0, 1.0]
    );
}

#[test]
fn test_reverse_rank0_falls_back_to_copy() {
    let mut backend = backend();
    let x = backend.write_slice(&[7.0f32], &[]).unwrap();
    let out = backend
        .run("Reverse", &[x], &OpAttrs::Reverse { axes: vec![] })
        .unwrap();
    assert_eq!(out.shape, Vec::<usize>::new());
    assert_eq!(backend.read_vec::<f32>(out.handle).unwrap(), vec![7.0]);
    assert_eq!(backend.module().invokes_of("Reverse"), 0);
}
