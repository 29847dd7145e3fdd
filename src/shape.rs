//! Pure shape and axis arithmetic shared by every kernel
//!
//! Nothing in this module touches the arena or the registry; these are the
//! closed-form helpers the dispatch layer composes: broadcasting, row-major
//! strides, reduction-axis normalization and permutation, and the
//! singleton-dimension stripping used by the transpose kernel.

use crate::error::{Error, Result};

/// Number of elements described by a shape (scalars have size 1)
#[inline]
pub fn size_of(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Row-major strides in elements; the trailing dimension has stride 1
pub fn compute_strides(shape: &[usize]) -> Vec<usize> {
    let ndim = shape.len();
    let mut strides = vec![1; ndim];
    for i in (0..ndim.saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Broadcast two shapes under the NumPy rule
///
/// Shapes are right-aligned; each dimension pair must be equal or one of them
/// must be 1. Incompatible shapes fail with `ShapeMismatch` carrying both.
pub fn broadcast_shape(lhs: &[usize], rhs: &[usize]) -> Result<Vec<usize>> {
    let ndim = lhs.len().max(rhs.len());
    let mut out = vec![0; ndim];
    for i in 0..ndim {
        let a = if i < lhs.len() { lhs[lhs.len() - 1 - i] } else { 1 };
        let b = if i < rhs.len() { rhs[rhs.len() - 1 - i] } else { 1 };
        if a != b && a != 1 && b != 1 {
            return Err(Error::ShapeMismatch {
                lhs: lhs.to_vec(),
                rhs: rhs.to_vec(),
            });
        }
        out[ndim - 1 - i] = a.max(b);
    }
    Ok(out)
}

/// Dimensions of `in_shape` (by index) that get broadcast to reach `out_shape`
///
/// Right-aligned comparison: a dimension is reported when the input extent is
/// 1 and the output extent is larger.
pub fn get_broadcast_dims(in_shape: &[usize], out_shape: &[usize]) -> Vec<usize> {
    let in_rank = in_shape.len();
    let mut dims = Vec::new();
    for i in 0..in_rank {
        let dim = in_rank - 1 - i;
        let a = in_shape[dim];
        let b = if i < out_shape.len() {
            out_shape[out_shape.len() - 1 - i]
        } else {
            1
        };
        if b > 1 && a == 1 {
            dims.push(dim);
        }
    }
    dims.reverse();
    dims
}

/// Normalize axes, supporting negative indexing, and validate range
///
/// Returned axes are sorted ascending; duplicate axes are rejected rather
/// than deduplicated.
pub fn parse_axes(axes: &[isize], ndim: usize) -> Result<Vec<usize>> {
    let mut out = Vec::with_capacity(axes.len());
    for &axis in axes {
        let idx = if axis < 0 { ndim as isize + axis } else { axis };
        if idx < 0 || idx as usize >= ndim {
            return Err(Error::InvalidAxis { axis, ndim });
        }
        let idx = idx as usize;
        if out.contains(&idx) {
            return Err(Error::InvalidArgument {
                arg: "axes",
                reason: format!("duplicate axis {idx}"),
            });
        }
        out.push(idx);
    }
    out.sort_unstable();
    Ok(out)
}

/// Whether `axes` (sorted ascending) are exactly the innermost dimensions
#[inline]
pub fn axes_are_inner_most(axes: &[usize], ndim: usize) -> bool {
    axes
        .iter()
        .enumerate()
        .all(|(i, &axis)| axis == ndim - axes.len() + i)
}

/// The trailing `num_axes` dimension indices of a rank-`ndim` tensor
pub fn inner_most_axes(num_axes: usize, ndim: usize) -> Vec<usize> {
    (ndim - num_axes..ndim).collect()
}

/// Permutation moving `axes` to the trailing position, or `None` when the
/// axes are already innermost and no transpose is needed
pub fn axes_permutation(axes: &[usize], ndim: usize) -> Option<Vec<usize>> {
    if axes_are_inner_most(axes, ndim) {
        return None;
    }
    let mut perm: Vec<usize> = (0..ndim).filter(|d| !axes.contains(d)).collect();
    perm.extend_from_slice(axes);
    Some(perm)
}

/// Split a shape into the kept (output) dims and the reduced dims
pub fn out_and_reduce_shapes(shape: &[usize], axes: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let out = shape
        .iter()
        .enumerate()
        .filter(|(i, _)| !axes.contains(i))
        .map(|(_, &d)| d)
        .collect();
    let reduce = axes.iter().map(|&i| shape[i]).collect();
    (out, reduce)
}

/// Re-insert size-1 dimensions at the reduced axes, for `keep_dims` outputs
pub fn expand_shape_to_keep_dim(shape: &[usize], axes: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(shape.len() + axes.len());
    let mut next = 0;
    for i in 0..shape.len() + axes.len() {
        if axes.contains(&i) {
            out.push(1);
        } else {
            out.push(shape[next]);
            next += 1;
        }
    }
    out
}

/// Guard used by reduction kernels after any transposition has been applied
pub fn assert_axes_inner_most(op: &'static str, axes: &[usize], ndim: usize) -> Result<()> {
    if axes_are_inner_most(axes, ndim) {
        Ok(())
    } else {
        Err(Error::Unsupported {
            op,
            reason: format!("reduction axes {axes:?} are not the innermost dimensions of rank {ndim}"),
        })
    }
}

/// Strip size-1 dimensions from a shape and its permutation
///
/// Lower-rank transposes have a simpler native memory-access pattern. The
/// returned permutation is rank-compressed so it permutes the reduced shape;
/// the caller reconstitutes the full-rank output shape separately. Output
/// values and shape are unaffected.
pub fn remove_one_size_dims(shape: &[usize], perm: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let new_shape: Vec<usize> = shape.iter().copied().filter(|&d| d != 1).collect();
    let kept: Vec<usize> = perm
        .iter()
        .copied()
        .filter(|&p| shape[p] != 1)
        .collect();

    // Rank-compress the surviving permutation entries to 0..len.
    let mut order: Vec<usize> = (0..kept.len()).collect();
    order.sort_unstable_by_key(|&i| kept[i]);
    let mut new_perm = vec![0; kept.len()];
    for (rank, &i) in order.iter().enumerate() {
        new_perm[i] = rank;
    }
    (new_shape, new_perm)
}

/// Apply a permutation to a shape
pub fn permute_shape(shape: &[usize], perm: &[usize]) -> Vec<usize> {
    perm.iter().map(|&p| shape[p]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strides_row_major() {
        assert_eq!(compute_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(compute_strides(&[5]), vec![1]);
        assert_eq!(compute_strides(&[]), Vec::<usize>::new());
    }

    #[test]
    fn test_broadcast_shape_law() {
        assert_eq!(
            broadcast_shape(&[4, 1, 3], &[1, 5, 3]).unwrap(),
            vec![4, 5, 3]
        );
        assert_eq!(broadcast_shape(&[2, 3], &[3]).unwrap(), vec![2, 3]);
        assert_eq!(broadcast_shape(&[], &[2, 2]).unwrap(), vec![2, 2]);
        assert!(matches!(
            broadcast_shape(&[2, 3], &[4, 3]),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_broadcast_dims() {
        assert_eq!(get_broadcast_dims(&[4, 1, 3], &[4, 5, 3]), vec![1]);
        assert_eq!(get_broadcast_dims(&[3], &[2, 3]), Vec::<usize>::new());
        assert_eq!(get_broadcast_dims(&[1, 1], &[4, 5]), vec![0, 1]);
    }

    #[test]
    fn test_parse_axes() {
        assert_eq!(parse_axes(&[-1], 3).unwrap(), vec![2]);
        assert_eq!(parse_axes(&[2, 0], 3).unwrap(), vec![0, 2]);
        assert!(parse_axes(&[3], 3).is_err());
        assert!(parse_axes(&[-4], 3).is_err());
        assert!(parse_axes(&[1, 1], 3).is_err());
    }

    #[test]
    fn test_axes_permutation() {
        // Already innermost: no transpose required.
        assert_eq!(axes_permutation(&[2], 3), None);
        assert_eq!(axes_permutation(&[1, 2], 3), None);
        // Leading axis must move to the back.
        assert_eq!(axes_permutation(&[0], 3), Some(vec![1, 2, 0]));
        assert_eq!(axes_permutation(&[0, 1], 3), Some(vec![2, 0, 1]));
    }

    #[test]
    fn test_out_and_reduce_shapes() {
        let (out, reduce) = out_and_reduce_shapes(&[2, 3, 4], &[1, 2]);
        assert_eq!(out, vec![2]);
        assert_eq!(reduce, vec![3, 4]);
    }

    #[test]
    fn test_expand_shape_to_keep_dim() {
        assert_eq!(expand_shape_to_keep_dim(&[2], &[1, 2]), vec![2, 1, 1]);
        assert_eq!(expand_shape_to_keep_dim(&[3, 4], &[0]), vec![1, 3, 4]);
    }

    #[test]
    fn test_remove_one_size_dims() {
        // [1, 2, 3] transposed by [2, 0, 1]: stripping the singleton leaves a
        // [2, 3] tensor whose permutation swaps the surviving dims.
        let (shape, perm) = remove_one_size_dims(&[1, 2, 3], &[2, 0, 1]);
        assert_eq!(shape, vec![2, 3]);
        assert_eq!(perm, vec![1, 0]);

        // No singletons: untouched.
        let (shape, perm) = remove_one_size_dims(&[2, 3], &[1, 0]);
        assert_eq!(shape, vec![2, 3]);
        assert_eq!(perm, vec![1, 0]);
    }

    #[test]
    fn test_permute_shape() {
        assert_eq!(permute_shape(&[2, 3, 4], &[2, 0, 1]), vec![4, 2, 3]);
    }
}
