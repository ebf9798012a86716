use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::definition::{Category, EffectDefinition};

/// Errors raised while registering an effect.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("effect '{0}' is already registered")]
    Duplicate(String),
    #[error("effect '{0}' declares parameters but has no defaults provider")]
    MissingDefaults(String),
    #[error("'{name}' is not a usable shader identifier: {reason}")]
    InvalidName { name: String, reason: String },
    #[error("effect '{effect}' parameter '{parameter}': {reason}")]
    InvalidParameter {
        effect: String,
        parameter: String,
        reason: String,
    },
}

/// Names the engine injects into every effect shader.
pub const RESERVED_UNIFORMS: [&str; 3] = ["uResolution", "uTime", "uInput"];

/// Prefix of the uniform block field backing each parameter. A parameter
/// macro expands to `params.p_<name>`, which is rescanned for other macros.
pub const PARAMETER_FIELD_PREFIX: &str = "p_";

/// Prefix of every identifier the shader wrapper declares for itself.
pub const WRAPPER_PREFIX: &str = "monadage_";

const RESERVED_IDENTIFIERS: &[&str] = &[
    "params",
    "main",
    "mainEffect",
    "fragColor",
    "uv",
    // shader wrapper internals
    "EffectParams",
    "_uResolution",
    "_uTime",
    "_uPadding0",
    "v_uv",
    "a_position",
    "a_uv",
    // GLSL keywords and types
    "attribute", "const", "uniform", "varying", "layout", "centroid", "flat", "smooth",
    "break", "continue", "do", "for", "while", "switch", "case", "default", "if", "else",
    "in", "out", "inout", "float", "int", "uint", "void", "bool", "true", "false",
    "invariant", "discard", "return", "struct", "precision", "highp", "mediump", "lowp",
    "vec2", "vec3", "vec4", "ivec2", "ivec3", "ivec4", "bvec2", "bvec3", "bvec4",
    "mat2", "mat3", "mat4", "sampler", "sampler2D", "texture2D",
    // builtins effect shaders commonly call
    "abs", "sin", "cos", "tan", "atan", "pow", "exp", "log", "sqrt", "floor", "ceil",
    "fract", "mod", "min", "max", "clamp", "mix", "step", "smoothstep", "length",
    "distance", "dot", "cross", "normalize", "texture", "sign", "radians", "degrees",
];

/// Checks that `name` can be used verbatim as a GLSL identifier.
pub fn validate_identifier(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err("name is empty".to_string());
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err("must start with a letter or underscore".to_string());
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(format!("contains invalid character '{bad}'"));
    }
    if name.starts_with("gl_") {
        return Err("the gl_ prefix is reserved".to_string());
    }
    if name.contains("__") {
        return Err("double underscores are reserved".to_string());
    }
    if name.starts_with(PARAMETER_FIELD_PREFIX) || name.starts_with(WRAPPER_PREFIX) {
        return Err(format!(
            "the {PARAMETER_FIELD_PREFIX} and {WRAPPER_PREFIX} prefixes are reserved"
        ));
    }
    if RESERVED_UNIFORMS.contains(&name) || RESERVED_IDENTIFIERS.contains(&name) {
        return Err("collides with a reserved name".to_string());
    }
    Ok(())
}

/// Catalog of effect definitions keyed by name.
#[derive(Debug, Default, Clone)]
pub struct EffectRegistry {
    by_name: HashMap<String, Arc<EffectDefinition>>,
    order: Vec<String>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in effect catalog.
    pub fn with_builtins() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for definition in crate::builtin::definitions() {
            registry.register(definition)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, definition: EffectDefinition) -> Result<(), RegistryError> {
        validate_identifier(&definition.name).map_err(|reason| RegistryError::InvalidName {
            name: definition.name.clone(),
            reason,
        })?;
        if self.by_name.contains_key(&definition.name) {
            return Err(RegistryError::Duplicate(definition.name));
        }
        if !definition.parameters.is_empty() && definition.defaults.is_none() {
            return Err(RegistryError::MissingDefaults(definition.name));
        }
        for (parameter, spec) in &definition.parameters {
            let invalid = |reason: String| RegistryError::InvalidParameter {
                effect: definition.name.clone(),
                parameter: parameter.clone(),
                reason,
            };
            validate_identifier(parameter).map_err(invalid)?;
            if let Some(issue) = spec.validate().into_iter().next() {
                return Err(invalid(issue));
            }
        }

        tracing::debug!(
            effect = %definition.name,
            category = %definition.category,
            parameters = definition.parameters.len(),
            "registered effect"
        );
        self.order.push(definition.name.clone());
        self.by_name
            .insert(definition.name.clone(), Arc::new(definition));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<EffectDefinition>> {
        self.by_name.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All definitions in registration order.
    pub fn all(&self) -> Vec<Arc<EffectDefinition>> {
        self.order
            .iter()
            .filter_map(|name| self.by_name.get(name).cloned())
            .collect()
    }

    pub fn by_category(&self, category: Category) -> Vec<Arc<EffectDefinition>> {
        self.all()
            .into_iter()
            .filter(|definition| definition.category == category)
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ParameterSpec;

    fn plain(name: &str) -> EffectDefinition {
        EffectDefinition::new(name, name, Category::Color)
    }

    #[test]
    fn preserves_registration_order() {
        let mut registry = EffectRegistry::new();
        registry.register(plain("zeta")).unwrap();
        registry.register(plain("alpha")).unwrap();
        assert_eq!(registry.names(), vec!["zeta", "alpha"]);
        assert_eq!(registry.all()[1].name, "alpha");
    }

    #[test]
    fn rejects_duplicates() {
        let mut registry = EffectRegistry::new();
        registry.register(plain("dup")).unwrap();
        assert_eq!(
            registry.register(plain("dup")),
            Err(RegistryError::Duplicate("dup".into()))
        );
    }

    #[test]
    fn parameters_require_a_defaults_provider() {
        let definition = plain("needs_defaults")
            .with_parameter("amount", ParameterSpec::scalar("Amount", 0.5, 0.0, 1.0, 0.1));
        let mut registry = EffectRegistry::new();
        assert!(matches!(
            registry.register(definition),
            Err(RegistryError::MissingDefaults(_))
        ));
    }

    #[test]
    fn rejects_reserved_and_malformed_names() {
        let mut registry = EffectRegistry::new();
        for bad in ["1up", "gl_Position", "has space", "a__b", "uTime", "main", ""] {
            assert!(
                matches!(
                    registry.register(plain(bad)),
                    Err(RegistryError::InvalidName { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_parameter_named_like_a_reserved_uniform() {
        let definition = plain("clash")
            .with_parameter("uResolution", ParameterSpec::vec2("Res", [0.0, 0.0], 0.0, 1.0, 0.1))
            .with_spec_defaults();
        let mut registry = EffectRegistry::new();
        assert!(matches!(
            registry.register(definition),
            Err(RegistryError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn rejects_parameters_that_shadow_wrapper_internals() {
        for name in [
            "v_uv",
            "monadage_color",
            "monadage_out_color",
            "monadage_input_texture",
            "monadage_input_sampler",
            "EffectParams",
            "_uTime",
            "p_amount",
        ] {
            let definition = plain("shadow")
                .with_parameter(name, ParameterSpec::vec2("Offset", [0.0, 0.0], -1.0, 1.0, 0.1))
                .with_spec_defaults();
            let mut registry = EffectRegistry::new();
            let err = registry.register(definition).unwrap_err();
            assert!(
                matches!(err, RegistryError::InvalidParameter { ref parameter, .. } if parameter == name),
                "{name} should be rejected, got {err}"
            );
        }
    }

    #[test]
    fn accepts_names_near_wrapper_internals() {
        for name in ["uv_offset", "pixel_size", "monadage", "vuv"] {
            assert_eq!(validate_identifier(name), Ok(()), "{name}");
        }
    }

    #[test]
    fn rejects_parameter_with_out_of_range_default() {
        let definition = plain("bad_default")
            .with_parameter("amount", ParameterSpec::scalar("Amount", 2.0, 0.0, 1.0, 0.1))
            .with_spec_defaults();
        let mut registry = EffectRegistry::new();
        let err = registry.register(definition).unwrap_err();
        assert!(err.to_string().contains("outside"), "{err}");
    }

    #[test]
    fn builtins_register_cleanly() {
        let registry = EffectRegistry::with_builtins().unwrap();
        assert!(registry.contains("grayscale"));
        assert!(registry.contains("vaporwave"));
        assert!(!registry.by_category(Category::Glitch).is_empty());
        assert!(registry.get("foo").is_none());
    }
}
