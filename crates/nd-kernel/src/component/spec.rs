// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Construction-time description of a component: declared names, resolved
//! types and the instance count, validated once and immutable afterwards.

use ahash::{AHashMap, AHashSet};

use crate::models::ComponentModel;
use crate::resolver::{RawArray, ResolvedTypes, TypeResolver};
use crate::types::{HostArray, KernelError, Result, ScalarType};

/// Validated declaration of one component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSpec {
    accesses: Vec<&'static str>,
    params: Vec<&'static str>,
    updates: Vec<&'static str>,
    types: ResolvedTypes,
    num_comps: usize,
}

/// Spec plus the decoded parameter arrays it was derived from
#[derive(Debug, Clone)]
pub struct DecodedSpec {
    pub spec: ComponentSpec,
    /// In parameter declaration order
    pub params: Vec<HostArray>,
}

impl ComponentSpec {
    /// Check the model's name spaces and resolve every quantity.
    ///
    /// `access_descriptors` maps each access to its upstream buffer's element
    /// type descriptor. Nothing is allocated here.
    pub fn decode(
        model: &dyn ComponentModel,
        params: &AHashMap<String, RawArray>,
        access_descriptors: &AHashMap<String, String>,
    ) -> Result<DecodedSpec> {
        check_names(model)?;

        let mut access_table = Vec::with_capacity(model.accesses().len());
        for access in model.accesses() {
            let descriptor = access_descriptors.get(*access).ok_or_else(|| {
                KernelError::InvalidSpec(format!("no upstream buffer for access '{}'", access))
            })?;
            access_table.push((*access, descriptor.as_str()));
        }

        let mut param_table = Vec::with_capacity(model.params().len());
        for param in model.params() {
            let raw = params.get(*param).ok_or_else(|| {
                KernelError::InvalidSpec(format!("missing parameter array '{}'", param))
            })?;
            param_table.push((*param, raw.descriptor()));
        }

        let types =
            TypeResolver::resolve_component(&access_table, &param_table, model.updates())?;

        let mut decoded = Vec::with_capacity(param_table.len());
        for (name, _) in &param_table {
            let ty = types.get(name).unwrap_or(ScalarType::F64);
            decoded.push(params[*name].decode(name, ty)?);
        }

        let num_comps = decoded.first().map(HostArray::len).unwrap_or(0);
        if num_comps == 0 {
            return Err(KernelError::InvalidSpec(format!(
                "parameter '{}' is empty; a component needs at least one instance",
                model.params()[0]
            )));
        }
        for (name, array) in param_table.iter().map(|(n, _)| n).zip(&decoded) {
            if array.len() != num_comps {
                return Err(KernelError::InvalidSpec(format!(
                    "parameter '{}' has {} elements but '{}' has {}",
                    name,
                    array.len(),
                    model.params()[0],
                    num_comps
                )));
            }
        }

        Ok(DecodedSpec {
            spec: ComponentSpec {
                accesses: model.accesses().to_vec(),
                params: model.params().to_vec(),
                updates: model.updates().to_vec(),
                types,
                num_comps,
            },
            params: decoded,
        })
    }

    pub fn accesses(&self) -> &[&'static str] {
        &self.accesses
    }

    pub fn params(&self) -> &[&'static str] {
        &self.params
    }

    pub fn updates(&self) -> &[&'static str] {
        &self.updates
    }

    pub fn types(&self) -> &ResolvedTypes {
        &self.types
    }

    /// Resolved type of a declared quantity (or `dt`)
    pub fn type_of(&self, name: &str) -> Option<ScalarType> {
        self.types.get(name)
    }

    pub fn num_comps(&self) -> usize {
        self.num_comps
    }
}

fn check_names(model: &dyn ComponentModel) -> Result<()> {
    if model.params().is_empty() {
        return Err(KernelError::InvalidSpec(format!(
            "model '{}' declares no parameters",
            model.name()
        )));
    }

    let mut seen = AHashSet::new();
    let declared = model
        .accesses()
        .iter()
        .chain(model.params())
        .chain(model.updates());
    for name in declared {
        if *name == crate::resolver::DT || *name == crate::template::LITERAL_SUFFIX {
            return Err(KernelError::InvalidSpec(format!(
                "'{}' is reserved and cannot name a quantity",
                name
            )));
        }
        if !seen.insert(*name) {
            return Err(KernelError::InvalidSpec(format!(
                "'{}' is declared more than once across accesses, params and updates",
                name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HostBody;
    use crate::models::RotN;
    use crate::template::KernelTemplate;

    struct Overlapping;

    impl ComponentModel for Overlapping {
        fn name(&self) -> &'static str {
            "Overlapping"
        }
        fn accesses(&self) -> &'static [&'static str] {
            &["x"]
        }
        fn params(&self) -> &'static [&'static str] {
            &["x"]
        }
        fn updates(&self) -> &'static [&'static str] {
            &["y"]
        }
        fn template(&self) -> KernelTemplate {
            KernelTemplate::new("update", "__global__ void update() {}")
        }
        fn host_body(&self) -> HostBody {
            |_, _, _| {}
        }
    }

    fn rotn_params(weight: RawArray) -> AHashMap<String, RawArray> {
        AHashMap::from_iter([("weight".to_string(), weight)])
    }

    fn float_accesses() -> AHashMap<String, String> {
        AHashMap::from_iter([
            ("V".to_string(), "float32".to_string()),
            ("Vd".to_string(), "float32".to_string()),
        ])
    }

    #[test]
    fn test_decode_derives_instance_count() {
        let decoded = ComponentSpec::decode(
            &RotN,
            &rotn_params(RawArray::from(vec![1.0f32, 1.0, 1.0])),
            &float_accesses(),
        )
        .unwrap();
        assert_eq!(decoded.spec.num_comps(), 3);
        assert_eq!(decoded.spec.type_of("I"), Some(ScalarType::F32));
        assert_eq!(decoded.params.len(), 1);
    }

    #[test]
    fn test_empty_parameters_are_rejected() {
        let err = ComponentSpec::decode(
            &RotN,
            &rotn_params(RawArray::from(Vec::<f32>::new())),
            &float_accesses(),
        )
        .unwrap_err();
        assert!(matches!(err, KernelError::InvalidSpec(msg) if msg.contains("empty")));
    }

    #[test]
    fn test_missing_inputs_are_rejected() {
        let mut accesses = float_accesses();
        accesses.remove("Vd");
        assert!(matches!(
            ComponentSpec::decode(&RotN, &rotn_params(RawArray::from(vec![1.0f32])), &accesses),
            Err(KernelError::InvalidSpec(msg)) if msg.contains("'Vd'")
        ));
        assert!(matches!(
            ComponentSpec::decode(&RotN, &AHashMap::new(), &float_accesses()),
            Err(KernelError::InvalidSpec(msg)) if msg.contains("'weight'")
        ));
    }

    #[test]
    fn test_overlapping_names_are_rejected() {
        let params = AHashMap::from_iter([("x".to_string(), RawArray::from(vec![1.0f32]))]);
        let accesses = AHashMap::from_iter([("x".to_string(), "float32".to_string())]);
        assert!(matches!(
            ComponentSpec::decode(&Overlapping, &params, &accesses),
            Err(KernelError::InvalidSpec(msg)) if msg.contains("more than once")
        ));
    }

    #[test]
    fn test_unsupported_parameter_type() {
        let params = rotn_params(RawArray::new("float16", vec![0u8; 6]));
        assert!(matches!(
            ComponentSpec::decode(&RotN, &params, &float_accesses()),
            Err(KernelError::UnsupportedType { quantity, .. }) if quantity == "weight"
        ));
    }
}
