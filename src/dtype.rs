//! Data type system for numw tensors
//!
//! The `DType` discriminants are the wire tags the native boundary parses;
//! they are stable and must never change.

use crate::error::{Error, Result};
use bytemuck::{Pod, Zeroable};
use std::fmt;

/// Data types supported by numw tensors
///
/// # Discriminant Values (Native-Boundary Stability)
///
/// The discriminants cross the native boundary as i32 tags and are **stable**:
/// `F32=0, I32=1, Bool=2, Str=3, Complex64=4`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DType {
    /// 32-bit floating point (most common)
    F32 = 0,
    /// 32-bit signed integer
    I32 = 1,
    /// Boolean, stored as one byte per element
    Bool = 2,
    /// Variable-length byte strings, stored out-of-band (never in the arena)
    Str = 3,
    /// 64-bit complex (two f32: re, im)
    Complex64 = 4,
}

impl DType {
    /// Size of one element in arena bytes
    ///
    /// `Str` elements live out-of-band and occupy no arena bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::F32 | Self::I32 => 4,
            Self::Bool => 1,
            Self::Str => 0,
            Self::Complex64 => 8,
        }
    }

    /// The i32 tag passed to native callables
    #[inline]
    pub const fn native_tag(self) -> i32 {
        self as i32
    }

    /// Decode a native tag back into a dtype
    pub fn from_native_tag(tag: i32) -> Result<Self> {
        match tag {
            0 => Ok(Self::F32),
            1 => Ok(Self::I32),
            2 => Ok(Self::Bool),
            3 => Ok(Self::Str),
            4 => Ok(Self::Complex64),
            _ => Err(Error::UnknownDType { tag }),
        }
    }

    /// Returns true if elements of this dtype live in the arena
    #[inline]
    pub const fn has_arena_storage(self) -> bool {
        !matches!(self, Self::Str)
    }

    /// Short name for display (e.g., "f32", "bool")
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::I32 => "i32",
            Self::Bool => "bool",
            Self::Str => "str",
            Self::Complex64 => "c64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// 64-bit complex number (two f32 components)
///
/// `Pod` so tensors of complex values can be viewed directly over arena bytes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Complex64 {
    /// Real component
    pub re: f32,
    /// Imaginary component
    pub im: f32,
}

impl Complex64 {
    /// Create a complex number from components
    #[inline]
    pub const fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }
}

/// Trait for types that can be elements of an arena-backed tensor
///
/// Connects Rust's type system to numw's runtime dtype system. The `Pod`
/// bound is what makes zero-copy heap views safe.
pub trait Element: Copy + Pod + Zeroable + PartialOrd + Send + Sync + 'static {
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Convert to f64 for dtype-generic cast/fill kernels
    fn to_f64(self) -> f64;

    /// Convert from f64 to this type
    fn from_f64(v: f64) -> Self;
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }
}

impl Element for i32 {
    const DTYPE: DType = DType::I32;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as i32
    }
}

// Boolean tensors use u8 storage; any nonzero byte reads as true.
impl Element for u8 {
    const DTYPE: DType = DType::Bool;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        if v != 0.0 { 1 } else { 0 }
    }
}

impl PartialOrd for Complex64 {
    /// Compared by magnitude; a single scalar ordering for generic kernels.
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        let a = self.re * self.re + self.im * self.im;
        let b = other.re * other.re + other.im * other.im;
        a.partial_cmp(&b)
    }
}

impl Element for Complex64 {
    const DTYPE: DType = DType::Complex64;

    /// Returns magnitude (|z|) - lossy; use `.re` for the real part.
    #[inline]
    fn to_f64(self) -> f64 {
        ((self.re * self.re + self.im * self.im) as f64).sqrt()
    }

    /// Creates a real complex number (im = 0)
    #[inline]
    fn from_f64(v: f64) -> Self {
        Self::new(v as f32, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_tags_are_stable() {
        assert_eq!(DType::F32.native_tag(), 0);
        assert_eq!(DType::I32.native_tag(), 1);
        assert_eq!(DType::Bool.native_tag(), 2);
        assert_eq!(DType::Str.native_tag(), 3);
        assert_eq!(DType::Complex64.native_tag(), 4);
    }

    #[test]
    fn test_tag_roundtrip() {
        for dtype in [
            DType::F32,
            DType::I32,
            DType::Bool,
            DType::Str,
            DType::Complex64,
        ] {
            assert_eq!(DType::from_native_tag(dtype.native_tag()).unwrap(), dtype);
        }
        assert!(matches!(
            DType::from_native_tag(9),
            Err(Error::UnknownDType { tag: 9 })
        ));
    }

    #[test]
    fn test_element_sizes() {
        assert_eq!(DType::F32.size_in_bytes(), 4);
        assert_eq!(DType::Bool.size_in_bytes(), 1);
        assert_eq!(DType::Complex64.size_in_bytes(), 8);
        assert_eq!(DType::Str.size_in_bytes(), 0);
        assert_eq!(
            std::mem::size_of::<Complex64>(),
            DType::Complex64.size_in_bytes()
        );
    }
}
