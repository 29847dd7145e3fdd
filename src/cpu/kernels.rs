//! Host implementations of the native symbol set

use crate::arena::Arena;
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::native::{NativeValue, i32_from_bytes};
use crate::shape::{broadcast_shape, compute_strides};

use super::{CpuModule, TensorEntry};

// ============================================================================
// Argument parsing
// ============================================================================

fn arg_i32(args: &[NativeValue<'_>], index: usize) -> Result<i32> {
    match args.get(index) {
        Some(NativeValue::I32(v)) => Ok(*v),
        _ => Err(Error::InvalidArgument {
            arg: "args",
            reason: format!("expected i32 at position {index}"),
        }),
    }
}

fn arg_shape(args: &[NativeValue<'_>], index: usize) -> Result<Vec<usize>> {
    match args.get(index) {
        Some(NativeValue::Bytes(b)) => {
            Ok(i32_from_bytes(b).into_iter().map(|v| v as usize).collect())
        }
        _ => Err(Error::InvalidArgument {
            arg: "args",
            reason: format!("expected bytes at position {index}"),
        }),
    }
}

fn read_elems<T: Element>(arena: &Arena, entry: TensorEntry) -> Vec<T> {
    bytemuck::cast_slice(arena.bytes(entry.offset, entry.size * std::mem::size_of::<T>())).to_vec()
}

fn write_elems<T: Element>(arena: &mut Arena, entry: TensorEntry, values: &[T]) {
    arena
        .bytes_mut(entry.offset, values.len() * std::mem::size_of::<T>())
        .copy_from_slice(bytemuck::cast_slice(values));
}

fn coords_of(mut flat: usize, strides: &[usize]) -> Vec<usize> {
    strides
        .iter()
        .map(|&s| {
            let c = flat / s;
            flat %= s;
            c
        })
        .collect()
}

// ============================================================================
// Binary elementwise (dtype-dispatched, full broadcast)
// ============================================================================

pub(super) fn binary(
    module: &CpuModule,
    arena: &mut Arena,
    args: &[NativeValue<'_>],
    f: impl Fn(f64, f64) -> f64,
) -> Result<()> {
    let a = module.entry(arg_i32(args, 0)?)?;
    let a_shape = arg_shape(args, 1)?;
    let b = module.entry(arg_i32(args, 3)?)?;
    let b_shape = arg_shape(args, 4)?;
    let dtype = DType::from_native_tag(arg_i32(args, 6)?)?;
    let out = module.entry(arg_i32(args, 7)?)?;

    match dtype {
        DType::F32 => binary_eval::<f32>(arena, a, &a_shape, b, &b_shape, out, f),
        DType::I32 => binary_eval::<i32>(arena, a, &a_shape, b, &b_shape, out, f),
        DType::Bool => binary_eval::<u8>(arena, a, &a_shape, b, &b_shape, out, f),
        other => Err(Error::UnsupportedDType {
            dtype: other,
            op: "binary",
        }),
    }
}

fn binary_eval<T: Element>(
    arena: &mut Arena,
    a: TensorEntry,
    a_shape: &[usize],
    b: TensorEntry,
    b_shape: &[usize],
    out: TensorEntry,
    f: impl Fn(f64, f64) -> f64,
) -> Result<()> {
    let out_shape = broadcast_shape(a_shape, b_shape)?;
    let out_strides = compute_strides(&out_shape);
    let a_strides = compute_strides(a_shape);
    let b_strides = compute_strides(b_shape);
    let a_vals = read_elems::<T>(arena, a);
    let b_vals = read_elems::<T>(arena, b);

    let mut result = Vec::with_capacity(out.size);
    for flat in 0..out.size {
        let coords = coords_of(flat, &out_strides);
        let a_idx = operand_index(&coords, a_shape, &a_strides);
        let b_idx = operand_index(&coords, b_shape, &b_strides);
        result.push(T::from_f64(f(
            a_vals[a_idx].to_f64(),
            b_vals[b_idx].to_f64(),
        )));
    }
    write_elems(arena, out, &result);
    Ok(())
}

/// Flat index into a (possibly broadcast) operand for one output coordinate
fn operand_index(out_coords: &[usize], shape: &[usize], strides: &[usize]) -> usize {
    let offset = out_coords.len() - shape.len();
    shape
        .iter()
        .enumerate()
        .map(|(i, &dim)| {
            let c = if dim == 1 { 0 } else { out_coords[offset + i] };
            c * strides[i]
        })
        .sum()
}

// ============================================================================
// Unary elementwise (f32)
// ============================================================================

pub(super) fn unary_f32(
    module: &CpuModule,
    arena: &mut Arena,
    args: &[NativeValue<'_>],
    f: impl Fn(f32) -> f32,
) -> Result<()> {
    let x = module.entry(arg_i32(args, 0)?)?;
    let out = module.entry(arg_i32(args, 1)?)?;
    let result: Vec<f32> = read_elems::<f32>(arena, x).into_iter().map(f).collect();
    write_elems(arena, out, &result);
    Ok(())
}

// ============================================================================
// Reductions over the innermost dimensions
// ============================================================================

pub(super) fn reduce_f32(
    module: &CpuModule,
    arena: &mut Arena,
    args: &[NativeValue<'_>],
    f: impl Fn(&[f32]) -> f32,
) -> Result<()> {
    let x = module.entry(arg_i32(args, 0)?)?;
    let reduce_size = arg_i32(args, 1)? as usize;
    let out = module.entry(arg_i32(args, 2)?)?;
    let values = read_elems::<f32>(arena, x);
    let result: Vec<f32> = values.chunks(reduce_size).map(|c| f(c)).collect();
    write_elems(arena, out, &result);
    Ok(())
}

pub(super) fn reduce_bool(
    module: &CpuModule,
    arena: &mut Arena,
    args: &[NativeValue<'_>],
    f: impl Fn(&[u8]) -> bool,
) -> Result<()> {
    let x = module.entry(arg_i32(args, 0)?)?;
    let reduce_size = arg_i32(args, 1)? as usize;
    let out = module.entry(arg_i32(args, 2)?)?;
    let values = read_elems::<u8>(arena, x);
    let result: Vec<u8> = values
        .chunks(reduce_size)
        .map(|c| u8::from(f(c)))
        .collect();
    write_elems(arena, out, &result);
    Ok(())
}

pub(super) fn argminmax(
    module: &CpuModule,
    arena: &mut Arena,
    args: &[NativeValue<'_>],
    take_max: bool,
) -> Result<()> {
    let x = module.entry(arg_i32(args, 0)?)?;
    let dtype = DType::from_native_tag(arg_i32(args, 1)?)?;
    let outer_size = arg_i32(args, 2)? as usize;
    let inner_size = arg_i32(args, 3)? as usize;
    let out = module.entry(arg_i32(args, 4)?)?;

    let values: Vec<f64> = match dtype {
        DType::F32 => read_elems::<f32>(arena, x)
            .into_iter()
            .map(|v| v.to_f64())
            .collect(),
        DType::I32 => read_elems::<i32>(arena, x)
            .into_iter()
            .map(|v| v.to_f64())
            .collect(),
        other => {
            return Err(Error::UnsupportedDType {
                dtype: other,
                op: "argminmax",
            });
        }
    };

    let mut result = Vec::with_capacity(outer_size);
    for row in 0..outer_size {
        let chunk = &values[row * inner_size..(row + 1) * inner_size];
        // First occurrence wins on ties.
        let mut best = 0;
        for (i, &v) in chunk.iter().enumerate() {
            let better = if take_max { v > chunk[best] } else { v < chunk[best] };
            if better {
                best = i;
            }
        }
        result.push(best as i32);
    }
    write_elems(arena, out, &result);
    Ok(())
}

// ============================================================================
// Data movement
// ============================================================================

pub(super) fn transpose(
    module: &CpuModule,
    arena: &mut Arena,
    args: &[NativeValue<'_>],
) -> Result<()> {
    let x = module.entry(arg_i32(args, 0)?)?;
    let x_shape = arg_shape(args, 1)?;
    let dtype = DType::from_native_tag(arg_i32(args, 3)?)?;
    let out = module.entry(arg_i32(args, 4)?)?;
    let perm = arg_shape(args, 5)?;

    let elem = dtype.size_in_bytes();
    let out_shape: Vec<usize> = perm.iter().map(|&p| x_shape[p]).collect();
    let in_strides = compute_strides(&x_shape);
    let out_strides = compute_strides(&out_shape);

    let src = arena.bytes(x.offset, x.size * elem).to_vec();
    let mut dst = vec![0u8; out.size * elem];
    let mut in_coords = vec![0usize; x_shape.len()];
    for out_flat in 0..out.size {
        let out_coords = coords_of(out_flat, &out_strides);
        for (i, &p) in perm.iter().enumerate() {
            in_coords[p] = out_coords[i];
        }
        let in_flat: usize = in_coords.iter().zip(&in_strides).map(|(c, s)| c * s).sum();
        dst[out_flat * elem..(out_flat + 1) * elem]
            .copy_from_slice(&src[in_flat * elem..(in_flat + 1) * elem]);
    }
    arena
        .bytes_mut(out.offset, dst.len())
        .copy_from_slice(&dst);
    Ok(())
}

pub(super) fn reverse(
    module: &CpuModule,
    arena: &mut Arena,
    args: &[NativeValue<'_>],
) -> Result<()> {
    let x = module.entry(arg_i32(args, 0)?)?;
    let axes = arg_shape(args, 1)?;
    let shape = arg_shape(args, 3)?;
    let out = module.entry(arg_i32(args, 5)?)?;

    let strides = compute_strides(&shape);
    let values = read_elems::<f32>(arena, x);
    let mut result = Vec::with_capacity(out.size);
    for out_flat in 0..out.size {
        let mut coords = coords_of(out_flat, &strides);
        for &axis in &axes {
            coords[axis] = shape[axis] - 1 - coords[axis];
        }
        let src_flat: usize = coords.iter().zip(&strides).map(|(c, s)| c * s).sum();
        result.push(values[src_flat]);
    }
    write_elems(arena, out, &result);
    Ok(())
}
