// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Kernel Templates
//!
//! A component model carries one parameterized kernel source. Expansion is
//! pure text substitution of `{{name}}` placeholders; nothing is compiled here.
//!
//! Bindings produced by [`bindings_for`]:
//! - `dt` and every access/parameter/update name bind to the C type name
//! - `fletter` binds to the float literal suffix (`f` or empty)

use ahash::AHashMap;

use crate::resolver::ResolvedTypes;
use crate::types::{KernelError, Result};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Placeholder bound to the float literal suffix
pub const LITERAL_SUFFIX: &str = "fletter";

/// Parameterized kernel source with a fixed entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelTemplate {
    entry: &'static str,
    source: &'static str,
}

impl KernelTemplate {
    pub const fn new(entry: &'static str, source: &'static str) -> Self {
        Self { entry, source }
    }

    pub fn entry(&self) -> &'static str {
        self.entry
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Placeholder names in order of first appearance
    pub fn placeholders(&self) -> Result<Vec<&'static str>> {
        let mut names = Vec::new();
        let mut rest = self.source;
        while let Some(start) = rest.find(OPEN) {
            let after = &rest[start + OPEN.len()..];
            let end = after.find(CLOSE).ok_or_else(|| unterminated(self.source, rest, start))?;
            let name = after[..end].trim();
            if !names.contains(&name) {
                names.push(name);
            }
            rest = &after[end + CLOSE.len()..];
        }
        Ok(names)
    }

    /// Substitute every placeholder. Unused bindings are fine; unbound placeholders are not.
    pub fn expand(&self, bindings: &AHashMap<String, String>) -> Result<String> {
        self.check_entry()?;

        let mut out = String::with_capacity(self.source.len() + 64);
        let mut rest = self.source;
        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let after = &rest[start + OPEN.len()..];
            let end = after.find(CLOSE).ok_or_else(|| unterminated(self.source, rest, start))?;
            let name = after[..end].trim();
            let value = bindings.get(name).ok_or_else(|| {
                KernelError::Template(format!("placeholder '{{{{{}}}}}' has no binding", name))
            })?;
            out.push_str(value);
            rest = &after[end + CLOSE.len()..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn check_entry(&self) -> Result<()> {
        let declaration = format!("void {}(", self.entry);
        if self.source.contains(&declaration) {
            Ok(())
        } else {
            Err(KernelError::Template(format!(
                "template does not declare entry point '{}'",
                self.entry
            )))
        }
    }
}

fn unterminated(source: &str, rest: &str, start: usize) -> KernelError {
    let offset = source.len() - rest.len() + start;
    KernelError::Template(format!("unterminated placeholder at byte {}", offset))
}

/// Type bindings for every resolved quantity plus the literal suffix
pub fn bindings_for(resolved: &ResolvedTypes) -> AHashMap<String, String> {
    let mut bindings: AHashMap<String, String> = resolved
        .signature
        .iter()
        .map(|(name, ty)| (name.to_string(), ty.c_name().to_string()))
        .collect();
    bindings.insert(
        LITERAL_SUFFIX.to_string(),
        resolved.literal_suffix().to_string(),
    );
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::TypeResolver;

    const SCALE: KernelTemplate = KernelTemplate::new(
        "update",
        "__global__ void update({{x}} *g_x, {{y}} *g_y)\n{ g_y[0] = g_x[0] * 2.0{{fletter}}; }\n",
    );

    fn bindings(pairs: &[(&str, &str)]) -> AHashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_expand_substitutes_every_occurrence() {
        let code = SCALE
            .expand(&bindings(&[
                ("x", "float"),
                ("y", "double"),
                ("fletter", "f"),
                ("unused", "int"),
            ]))
            .unwrap();
        assert!(code.contains("update(float *g_x, double *g_y)"));
        assert!(code.contains("2.0f;"));
        assert!(!code.contains("{{"));
    }

    #[test]
    fn test_unbound_placeholder_is_rejected() {
        let err = SCALE
            .expand(&bindings(&[("x", "float"), ("fletter", "")]))
            .unwrap_err();
        assert!(matches!(err, KernelError::Template(msg) if msg.contains("'{{y}}'")));
    }

    #[test]
    fn test_unterminated_placeholder_is_rejected() {
        let broken = KernelTemplate::new("update", "void update({{x *g_x) {}");
        assert!(matches!(
            broken.expand(&bindings(&[("x", "int")])),
            Err(KernelError::Template(_))
        ));
        assert!(broken.placeholders().is_err());
    }

    #[test]
    fn test_missing_entry_point_is_rejected() {
        let wrong = KernelTemplate::new("update", "__global__ void step(int n) {}");
        assert!(matches!(
            wrong.expand(&AHashMap::new()),
            Err(KernelError::Template(msg)) if msg.contains("update")
        ));
    }

    #[test]
    fn test_placeholders_in_first_appearance_order() {
        assert_eq!(SCALE.placeholders().unwrap(), vec!["x", "y", "fletter"]);
    }

    #[test]
    fn test_bindings_cover_resolved_quantities() {
        let resolved = TypeResolver::resolve_component(
            &[("x", "int32")],
            &[("w", "float64")],
            &["y"],
        )
        .unwrap();
        let map = bindings_for(&resolved);
        assert_eq!(map["dt"], "double");
        assert_eq!(map["x"], "int");
        assert_eq!(map["w"], "double");
        assert_eq!(map["y"], "double");
        assert_eq!(map["fletter"], "");
    }
}
