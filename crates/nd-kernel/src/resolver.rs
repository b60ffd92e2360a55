// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Type Resolution
//!
//! Maps the raw element-type descriptors reported by caller arrays to the
//! canonical [`ScalarType`] of every quantity a kernel touches, and derives the
//! [`TypeSignature`] that keys the kernel cache.
//!
//! Resolution happens before anything is allocated on a device, so an
//! unsupported descriptor never leaves a partially built component behind.
//!
//! ## Type table
//! - `dt` and every update take the type of the first parameter
//! - each access takes the type of its upstream buffer
//! - each parameter takes the type of its own array

use core::fmt;

use crate::types::{HostArray, KernelError, Result, ScalarType};

/// Name under which the time-step scalar appears in signatures and templates
pub const DT: &str = "dt";

/// Parse a raw descriptor into a supported scalar type.
///
/// Accepts long names (`float32`), short codes (`f4`, `i8` = 8-byte int),
/// C names (`unsigned int`) and Rust names (`u32`), case-insensitive, with an
/// optional byte-order prefix (`<`, `>`, `=`, `|`).
pub fn parse_descriptor(descriptor: &str) -> Option<ScalarType> {
    let stripped = descriptor
        .trim()
        .trim_start_matches(|c| matches!(c, '<' | '>' | '=' | '|'));
    let normalized = stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase();

    match normalized.as_str() {
        "float32" | "f4" | "float" | "f32" | "single" => Some(ScalarType::F32),
        "float64" | "f8" | "double" | "f64" => Some(ScalarType::F64),
        "int32" | "i4" | "int" | "i32" | "intc" => Some(ScalarType::I32),
        "uint32" | "u4" | "unsigned int" | "u32" | "uintc" => Some(ScalarType::U32),
        "int64" | "i8" | "long long" | "i64" => Some(ScalarType::I64),
        "uint64" | "u8" | "unsigned long long" | "u64" => Some(ScalarType::U64),
        _ => None,
    }
}

/// Array handed in by the caller: element-type descriptor plus native-endian bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArray {
    descriptor: String,
    bytes: Vec<u8>,
}

impl RawArray {
    pub fn new(descriptor: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            descriptor: descriptor.into(),
            bytes,
        }
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decode as `ty` (already resolved from this array's descriptor)
    pub fn decode(&self, quantity: &str, ty: ScalarType) -> Result<HostArray> {
        HostArray::from_ne_bytes(ty, &self.bytes).ok_or_else(|| {
            KernelError::InvalidSpec(format!(
                "array for '{}' holds {} bytes, not a whole number of {}-byte {} elements",
                quantity,
                self.bytes.len(),
                ty.size_bytes(),
                ty
            ))
        })
    }
}

impl From<HostArray> for RawArray {
    fn from(array: HostArray) -> Self {
        Self::new(array.scalar_type().descriptor(), array.to_ne_bytes())
    }
}

impl<T> From<Vec<T>> for RawArray
where
    HostArray: From<Vec<T>>,
{
    fn from(values: Vec<T>) -> Self {
        RawArray::from(HostArray::from(values))
    }
}

/// Ordered (name, type) table over `dt`, accesses, parameters and updates
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TypeSignature {
    entries: Vec<(String, ScalarType)>,
}

impl TypeSignature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, ty: ScalarType) {
        self.entries.push((name.into(), ty));
    }

    pub fn get(&self, name: &str) -> Option<ScalarType> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, ty)| *ty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ScalarType)> {
        self.entries.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .entries
            .iter()
            .map(|(name, ty)| format!("{}:{}", name, ty))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "({})", rendered)
    }
}

/// Outcome of resolving a component's quantities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTypes {
    pub signature: TypeSignature,
    /// Whether float literals in generated code need the `f` suffix
    pub float_suffix: bool,
}

impl ResolvedTypes {
    pub fn dt_type(&self) -> ScalarType {
        self.signature.get(DT).unwrap_or(ScalarType::F64)
    }

    pub fn get(&self, name: &str) -> Option<ScalarType> {
        self.signature.get(name)
    }

    /// Literal suffix substituted for the `fletter` placeholder
    pub fn literal_suffix(&self) -> &'static str {
        if self.float_suffix {
            "f"
        } else {
            ""
        }
    }
}

/// Descriptor-to-type resolution for kernel code generation
pub struct TypeResolver;

impl TypeResolver {
    /// Resolve one quantity's descriptor
    pub fn resolve(quantity: &str, descriptor: &str) -> Result<ScalarType> {
        parse_descriptor(descriptor).ok_or_else(|| KernelError::UnsupportedType {
            quantity: quantity.to_string(),
            descriptor: descriptor.to_string(),
        })
    }

    /// Resolve the full type table of a component.
    ///
    /// # Arguments
    /// * `accesses` - `(access name, upstream buffer descriptor)` in declaration order
    /// * `params` - `(parameter name, array descriptor)` in declaration order
    /// * `updates` - update names in declaration order
    pub fn resolve_component(
        accesses: &[(&str, &str)],
        params: &[(&str, &str)],
        updates: &[&str],
    ) -> Result<ResolvedTypes> {
        let (first_param, first_descriptor) = params.first().ok_or_else(|| {
            KernelError::InvalidSpec("a component needs at least one parameter".to_string())
        })?;
        let base = Self::resolve(first_param, first_descriptor)?;

        let mut signature = TypeSignature::new();
        signature.push(DT, base);
        for (name, descriptor) in accesses {
            signature.push(*name, Self::resolve(name, descriptor)?);
        }
        for (name, descriptor) in params {
            signature.push(*name, Self::resolve(name, descriptor)?);
        }
        for name in updates {
            signature.push(*name, base);
        }

        Ok(ResolvedTypes {
            signature,
            float_suffix: base == ScalarType::F32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_spellings() {
        assert_eq!(parse_descriptor("float32"), Some(ScalarType::F32));
        assert_eq!(parse_descriptor("<f8"), Some(ScalarType::F64));
        assert_eq!(parse_descriptor("Unsigned  Int"), Some(ScalarType::U32));
        assert_eq!(parse_descriptor("i8"), Some(ScalarType::I64));
        assert_eq!(parse_descriptor("u64"), Some(ScalarType::U64));
        assert_eq!(parse_descriptor("float16"), None);
        assert_eq!(parse_descriptor("complex64"), None);
        assert_eq!(parse_descriptor("bool"), None);
    }

    #[test]
    fn test_component_type_table() {
        let resolved = TypeResolver::resolve_component(
            &[("V", "float64"), ("Vd", "float32")],
            &[("weight", "float32")],
            &["I"],
        )
        .unwrap();

        let names: Vec<_> = resolved.signature.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["dt", "V", "Vd", "weight", "I"]);
        assert_eq!(resolved.dt_type(), ScalarType::F32);
        assert_eq!(resolved.get("V"), Some(ScalarType::F64));
        assert_eq!(resolved.get("I"), Some(ScalarType::F32));
        assert!(resolved.float_suffix);
        assert_eq!(resolved.literal_suffix(), "f");
    }

    #[test]
    fn test_double_parameters_need_no_suffix() {
        let resolved =
            TypeResolver::resolve_component(&[], &[("weight", "double")], &["I"]).unwrap();
        assert!(!resolved.float_suffix);
        assert_eq!(resolved.literal_suffix(), "");
    }

    #[test]
    fn test_unsupported_type_names_the_quantity() {
        let err = TypeResolver::resolve_component(
            &[("V", "float16")],
            &[("weight", "float32")],
            &["I"],
        )
        .unwrap_err();
        match err {
            KernelError::UnsupportedType {
                quantity,
                descriptor,
            } => {
                assert_eq!(quantity, "V");
                assert_eq!(descriptor, "float16");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_raw_array_decoding() {
        let raw = RawArray::from(vec![1.0f32, 2.0, 3.0]);
        assert_eq!(raw.descriptor(), "float32");
        let decoded = raw.decode("weight", ScalarType::F32).unwrap();
        assert_eq!(decoded, HostArray::from(vec![1.0f32, 2.0, 3.0]));

        let truncated = RawArray::new("float32", vec![0u8; 6]);
        assert!(matches!(
            truncated.decode("weight", ScalarType::F32),
            Err(KernelError::InvalidSpec(_))
        ));
    }
}
