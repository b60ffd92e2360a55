// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Scalar Types
//!
//! The fixed set of numeric types a component kernel can be specialized for,
//! tagged scalar values with C arithmetic semantics, and tagged host arrays.
//!
//! Types are resolved once at construction; nothing on the step path inspects
//! Rust types dynamically.

use core::fmt;
use core::ops::Mul;

/// Supported element types (canonical identifiers for codegen and packing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarType {
    F32,
    F64,
    I32,
    U32,
    I64,
    U64,
}

impl ScalarType {
    pub const ALL: [ScalarType; 6] = [
        ScalarType::F32,
        ScalarType::F64,
        ScalarType::I32,
        ScalarType::U32,
        ScalarType::I64,
        ScalarType::U64,
    ];

    /// C type name substituted into kernel templates
    pub fn c_name(self) -> &'static str {
        match self {
            ScalarType::F32 => "float",
            ScalarType::F64 => "double",
            ScalarType::I32 => "int",
            ScalarType::U32 => "unsigned int",
            ScalarType::I64 => "long long",
            ScalarType::U64 => "unsigned long long",
        }
    }

    /// Canonical array descriptor (the name arrays report for this type)
    pub fn descriptor(self) -> &'static str {
        match self {
            ScalarType::F32 => "float32",
            ScalarType::F64 => "float64",
            ScalarType::I32 => "int32",
            ScalarType::U32 => "uint32",
            ScalarType::I64 => "int64",
            ScalarType::U64 => "uint64",
        }
    }

    /// One-character code used in argument-packing signatures
    pub fn packing_code(self) -> char {
        match self {
            ScalarType::F32 => 'f',
            ScalarType::F64 => 'd',
            ScalarType::I32 => 'i',
            ScalarType::U32 => 'I',
            ScalarType::I64 => 'q',
            ScalarType::U64 => 'Q',
        }
    }

    pub fn size_bytes(self) -> usize {
        match self {
            ScalarType::F32 | ScalarType::I32 | ScalarType::U32 => 4,
            ScalarType::F64 | ScalarType::I64 | ScalarType::U64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64)
    }

    pub fn is_signed(self) -> bool {
        !matches!(self, ScalarType::U32 | ScalarType::U64)
    }

    pub fn zero(self) -> Scalar {
        Scalar::from_f64(self, 0.0)
    }

    /// Result type of a binary arithmetic operation (C usual arithmetic conversions)
    pub fn common(self, other: ScalarType) -> ScalarType {
        use ScalarType::*;
        if self == F64 || other == F64 {
            return F64;
        }
        if self == F32 || other == F32 {
            return F32;
        }
        match self.size_bytes().cmp(&other.size_bytes()) {
            core::cmp::Ordering::Greater => self,
            core::cmp::Ordering::Less => other,
            core::cmp::Ordering::Equal => {
                if self.is_signed() && other.is_signed() {
                    self
                } else if self.size_bytes() == 4 {
                    U32
                } else {
                    U64
                }
            }
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_name())
    }
}

/// A single value of one of the supported types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    F32(f32),
    F64(f64),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
}

macro_rules! cast_scalar {
    ($value:expr, $t:ty) => {
        match $value {
            Scalar::F32(x) => x as $t,
            Scalar::F64(x) => x as $t,
            Scalar::I32(x) => x as $t,
            Scalar::U32(x) => x as $t,
            Scalar::I64(x) => x as $t,
            Scalar::U64(x) => x as $t,
        }
    };
}

impl Scalar {
    pub fn scalar_type(self) -> ScalarType {
        match self {
            Scalar::F32(_) => ScalarType::F32,
            Scalar::F64(_) => ScalarType::F64,
            Scalar::I32(_) => ScalarType::I32,
            Scalar::U32(_) => ScalarType::U32,
            Scalar::I64(_) => ScalarType::I64,
            Scalar::U64(_) => ScalarType::U64,
        }
    }

    pub fn from_f64(ty: ScalarType, value: f64) -> Scalar {
        Scalar::F64(value).cast(ty)
    }

    /// Value conversion as performed by a C assignment to `ty`
    pub fn cast(self, ty: ScalarType) -> Scalar {
        match ty {
            ScalarType::F32 => Scalar::F32(cast_scalar!(self, f32)),
            ScalarType::F64 => Scalar::F64(cast_scalar!(self, f64)),
            ScalarType::I32 => Scalar::I32(cast_scalar!(self, i32)),
            ScalarType::U32 => Scalar::U32(cast_scalar!(self, u32)),
            ScalarType::I64 => Scalar::I64(cast_scalar!(self, i64)),
            ScalarType::U64 => Scalar::U64(cast_scalar!(self, u64)),
        }
    }

    pub fn as_f64(self) -> f64 {
        cast_scalar!(self, f64)
    }

    /// Native-endian bytes, value in the leading `size_bytes()` bytes
    pub fn to_ne_bytes(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        match self {
            Scalar::F32(x) => out[..4].copy_from_slice(&x.to_ne_bytes()),
            Scalar::F64(x) => out.copy_from_slice(&x.to_ne_bytes()),
            Scalar::I32(x) => out[..4].copy_from_slice(&x.to_ne_bytes()),
            Scalar::U32(x) => out[..4].copy_from_slice(&x.to_ne_bytes()),
            Scalar::I64(x) => out.copy_from_slice(&x.to_ne_bytes()),
            Scalar::U64(x) => out.copy_from_slice(&x.to_ne_bytes()),
        }
        out
    }
}

impl Mul for Scalar {
    type Output = Scalar;

    /// Multiplication in the common type; integer overflow wraps
    fn mul(self, rhs: Scalar) -> Scalar {
        let ty = self.scalar_type().common(rhs.scalar_type());
        match (self.cast(ty), rhs.cast(ty)) {
            (Scalar::F32(a), Scalar::F32(b)) => Scalar::F32(a * b),
            (Scalar::F64(a), Scalar::F64(b)) => Scalar::F64(a * b),
            (Scalar::I32(a), Scalar::I32(b)) => Scalar::I32(a.wrapping_mul(b)),
            (Scalar::U32(a), Scalar::U32(b)) => Scalar::U32(a.wrapping_mul(b)),
            (Scalar::I64(a), Scalar::I64(b)) => Scalar::I64(a.wrapping_mul(b)),
            (Scalar::U64(a), Scalar::U64(b)) => Scalar::U64(a.wrapping_mul(b)),
            _ => unreachable!("both operands were cast to {ty}"),
        }
    }
}

/// Dense host-side array of one supported element type
#[derive(Debug, Clone, PartialEq)]
pub enum HostArray {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
}

macro_rules! host_array_from_vec {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$t>> for HostArray {
                fn from(values: Vec<$t>) -> Self {
                    HostArray::$variant(values)
                }
            }
        )*
    };
}

host_array_from_vec!(
    f32 => F32,
    f64 => F64,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
);

impl HostArray {
    pub fn zeros(ty: ScalarType, len: usize) -> Self {
        match ty {
            ScalarType::F32 => HostArray::F32(vec![0.0; len]),
            ScalarType::F64 => HostArray::F64(vec![0.0; len]),
            ScalarType::I32 => HostArray::I32(vec![0; len]),
            ScalarType::U32 => HostArray::U32(vec![0; len]),
            ScalarType::I64 => HostArray::I64(vec![0; len]),
            ScalarType::U64 => HostArray::U64(vec![0; len]),
        }
    }

    /// Array of `len` copies of `value`, in `value`'s type
    pub fn filled(value: Scalar, len: usize) -> Self {
        match value {
            Scalar::F32(x) => HostArray::F32(vec![x; len]),
            Scalar::F64(x) => HostArray::F64(vec![x; len]),
            Scalar::I32(x) => HostArray::I32(vec![x; len]),
            Scalar::U32(x) => HostArray::U32(vec![x; len]),
            Scalar::I64(x) => HostArray::I64(vec![x; len]),
            Scalar::U64(x) => HostArray::U64(vec![x; len]),
        }
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            HostArray::F32(_) => ScalarType::F32,
            HostArray::F64(_) => ScalarType::F64,
            HostArray::I32(_) => ScalarType::I32,
            HostArray::U32(_) => ScalarType::U32,
            HostArray::I64(_) => ScalarType::I64,
            HostArray::U64(_) => ScalarType::U64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            HostArray::F32(v) => v.len(),
            HostArray::F64(v) => v.len(),
            HostArray::I32(v) => v.len(),
            HostArray::U32(v) => v.len(),
            HostArray::I64(v) => v.len(),
            HostArray::U64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Scalar> {
        match self {
            HostArray::F32(v) => v.get(index).map(|&x| Scalar::F32(x)),
            HostArray::F64(v) => v.get(index).map(|&x| Scalar::F64(x)),
            HostArray::I32(v) => v.get(index).map(|&x| Scalar::I32(x)),
            HostArray::U32(v) => v.get(index).map(|&x| Scalar::U32(x)),
            HostArray::I64(v) => v.get(index).map(|&x| Scalar::I64(x)),
            HostArray::U64(v) => v.get(index).map(|&x| Scalar::U64(x)),
        }
    }

    /// Store `value` converted to this array's type. Returns false when out of bounds.
    pub fn set(&mut self, index: usize, value: Scalar) -> bool {
        if index >= self.len() {
            return false;
        }
        match self {
            HostArray::F32(v) => v[index] = cast_scalar!(value, f32),
            HostArray::F64(v) => v[index] = cast_scalar!(value, f64),
            HostArray::I32(v) => v[index] = cast_scalar!(value, i32),
            HostArray::U32(v) => v[index] = cast_scalar!(value, u32),
            HostArray::I64(v) => v[index] = cast_scalar!(value, i64),
            HostArray::U64(v) => v[index] = cast_scalar!(value, u64),
        }
        true
    }

    /// Element-wise copy from an array of the same type and length
    pub fn copy_from(&mut self, src: &HostArray) -> bool {
        match (self, src) {
            (HostArray::F32(d), HostArray::F32(s)) if d.len() == s.len() => d.copy_from_slice(s),
            (HostArray::F64(d), HostArray::F64(s)) if d.len() == s.len() => d.copy_from_slice(s),
            (HostArray::I32(d), HostArray::I32(s)) if d.len() == s.len() => d.copy_from_slice(s),
            (HostArray::U32(d), HostArray::U32(s)) if d.len() == s.len() => d.copy_from_slice(s),
            (HostArray::I64(d), HostArray::I64(s)) if d.len() == s.len() => d.copy_from_slice(s),
            (HostArray::U64(d), HostArray::U64(s)) if d.len() == s.len() => d.copy_from_slice(s),
            _ => return false,
        }
        true
    }

    /// Native-endian byte image of the array
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        match self {
            HostArray::F32(v) => bytemuck::cast_slice::<_, u8>(v).to_vec(),
            HostArray::F64(v) => bytemuck::cast_slice::<_, u8>(v).to_vec(),
            HostArray::I32(v) => bytemuck::cast_slice::<_, u8>(v).to_vec(),
            HostArray::U32(v) => bytemuck::cast_slice::<_, u8>(v).to_vec(),
            HostArray::I64(v) => bytemuck::cast_slice::<_, u8>(v).to_vec(),
            HostArray::U64(v) => bytemuck::cast_slice::<_, u8>(v).to_vec(),
        }
    }

    /// Decode a native-endian byte image. `None` if `bytes` is not a whole number of elements.
    pub fn from_ne_bytes(ty: ScalarType, bytes: &[u8]) -> Option<Self> {
        let size = ty.size_bytes();
        if bytes.len() % size != 0 {
            return None;
        }
        let chunks = bytes.chunks_exact(size);
        Some(match ty {
            ScalarType::F32 => HostArray::F32(chunks.map(bytemuck::pod_read_unaligned).collect()),
            ScalarType::F64 => HostArray::F64(chunks.map(bytemuck::pod_read_unaligned).collect()),
            ScalarType::I32 => HostArray::I32(chunks.map(bytemuck::pod_read_unaligned).collect()),
            ScalarType::U32 => HostArray::U32(chunks.map(bytemuck::pod_read_unaligned).collect()),
            ScalarType::I64 => HostArray::I64(chunks.map(bytemuck::pod_read_unaligned).collect()),
            ScalarType::U64 => HostArray::U64(chunks.map(bytemuck::pod_read_unaligned).collect()),
        })
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        (0..self.len())
            .filter_map(|i| self.get(i))
            .map(Scalar::as_f64)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_type_follows_c_conversions() {
        use ScalarType::*;
        assert_eq!(F32.common(I64), F32);
        assert_eq!(F32.common(F64), F64);
        assert_eq!(I32.common(U32), U32);
        assert_eq!(I64.common(U32), I64);
        assert_eq!(U64.common(I32), U64);
        assert_eq!(I32.common(I32), I32);
    }

    #[test]
    fn test_mixed_multiplication() {
        let product = Scalar::I32(3) * Scalar::F32(0.5);
        assert_eq!(product, Scalar::F32(1.5));

        let product = Scalar::U32(u32::MAX) * Scalar::U32(2);
        assert_eq!(product, Scalar::U32(u32::MAX - 1));
    }

    #[test]
    fn test_set_converts_to_array_type() {
        let mut array = HostArray::zeros(ScalarType::I32, 2);
        assert!(array.set(1, Scalar::F64(7.9)));
        assert_eq!(array.get(1), Some(Scalar::I32(7)));
        assert!(!array.set(2, Scalar::I32(1)));
    }

    #[test]
    fn test_byte_image_decodes_back() {
        let array = HostArray::from(vec![1.5f64, -2.0, 3.25]);
        let bytes = array.to_ne_bytes();
        assert_eq!(bytes.len(), 24);
        assert_eq!(HostArray::from_ne_bytes(ScalarType::F64, &bytes), Some(array));
        assert_eq!(HostArray::from_ne_bytes(ScalarType::F64, &bytes[..5]), None);
    }

    #[test]
    fn test_copy_from_rejects_other_types() {
        let mut dst = HostArray::zeros(ScalarType::F32, 3);
        assert!(!dst.copy_from(&HostArray::from(vec![1i32, 2, 3])));
        assert!(dst.copy_from(&HostArray::from(vec![1.0f32, 2.0, 3.0])));
        assert_eq!(dst.to_f64_vec(), vec![1.0, 2.0, 3.0]);
    }
}
