use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::param::{ParamMap, ParamValue, ParameterSpec, ParameterTypeError};

/// Produces the default parameter map for an effect.
pub type DefaultsProvider = Arc<dyn Fn() -> ParamMap + Send + Sync>;

/// Broad grouping used when listing effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Color,
    Stylize,
    Distortion,
    Glitch,
    Blur,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Color,
        Category::Stylize,
        Category::Distortion,
        Category::Glitch,
        Category::Blur,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Color => "color",
            Category::Stylize => "stylize",
            Category::Distortion => "distortion",
            Category::Glitch => "glitch",
            Category::Blur => "blur",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == lowered)
            .ok_or_else(|| {
                format!(
                    "unknown category '{value}' (expected one of: {})",
                    Category::ALL.map(|c| c.as_str()).join(", ")
                )
            })
    }
}

/// Immutable description of one effect: identity, schema and defaults.
#[derive(Clone, Serialize)]
pub struct EffectDefinition {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub category: Category,
    pub parameters: BTreeMap<String, ParameterSpec>,
    #[serde(skip)]
    pub defaults: Option<DefaultsProvider>,
}

impl fmt::Debug for EffectDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectDefinition")
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .field("category", &self.category)
            .field("parameters", &self.parameters.keys().collect::<Vec<_>>())
            .field("defaults", &self.defaults.as_ref().map(|_| "<provider>"))
            .finish()
    }
}

impl EffectDefinition {
    pub fn new(name: &str, display_name: &str, category: Category) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            description: String::new(),
            category,
            parameters: BTreeMap::new(),
            defaults: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_parameter(mut self, name: &str, spec: ParameterSpec) -> Self {
        self.parameters.insert(name.to_string(), spec);
        self
    }

    pub fn with_defaults(mut self, provider: DefaultsProvider) -> Self {
        self.defaults = Some(provider);
        self
    }

    /// Installs a provider that returns each parameter spec's own default.
    pub fn with_spec_defaults(self) -> Self {
        let snapshot: ParamMap = self
            .parameters
            .iter()
            .map(|(name, spec)| (name.clone(), spec.default))
            .collect();
        self.with_defaults(Arc::new(move || snapshot.clone()))
    }

    /// Default values as produced by the provider, or an empty map.
    pub fn defaults(&self) -> ParamMap {
        self.defaults
            .as_ref()
            .map(|provider| provider())
            .unwrap_or_default()
    }

    /// Merges spec defaults, provider defaults and `overrides`, in that order
    /// of increasing precedence, then type-checks and clamps the declared
    /// parameters. Keys without a spec are carried through untouched.
    pub fn resolve_params(&self, overrides: &ParamMap) -> Result<ParamMap, ParameterTypeError> {
        let mut merged: ParamMap = self
            .parameters
            .iter()
            .map(|(name, spec)| (name.clone(), spec.default))
            .collect();
        merged.extend(self.defaults());
        merged.extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));

        let mut resolved = ParamMap::new();
        for (name, value) in merged {
            let value = match self.parameters.get(&name) {
                Some(spec) => spec.coerce(&name, value)?,
                None => value,
            };
            resolved.insert(name, value);
        }
        Ok(resolved)
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.get(name)
    }

    pub fn default_value(&self, name: &str) -> Option<ParamValue> {
        self.defaults()
            .get(name)
            .copied()
            .or_else(|| self.parameters.get(name).map(|spec| spec.default))
    }
}
