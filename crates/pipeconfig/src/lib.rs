//! TOML recipes describing a reusable effect pipeline.
//!
//! ```toml
//! version = 1
//! name = "retro"
//!
//! [engine]
//! gpu_power = "high"
//! shader_fallback = "fail"
//!
//! [output]
//! format = "jpg"
//! quality = 85
//!
//! [[stages]]
//! effect = "channel_shift"
//! params = { offset = [6, 0] }
//!
//! [[stages]]
//! id = "grade"
//! effect = "vaporwave"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use effects::{ParamMap, PipelineStage};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse recipe: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid recipe: {0}")]
    Invalid(String),
    #[error("failed to read recipe {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuPower {
    #[default]
    Low,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackSetting {
    #[default]
    PassThrough,
    Fail,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    #[serde(alias = "jpg")]
    Jpeg,
    Bmp,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EngineSection {
    #[serde(default)]
    pub gpu_power: Option<GpuPower>,
    #[serde(default)]
    pub allow_software: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_fallback_opt")]
    pub shader_fallback: Option<FallbackSetting>,
    #[serde(default)]
    pub max_texture_size: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OutputSection {
    #[serde(default)]
    pub format: Option<OutputFormat>,
    #[serde(default)]
    pub quality: Option<u8>,
    /// Replaces the `_<a>_<b>` suffix derived from the effect names.
    #[serde(default)]
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StageEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub effect: String,
    #[serde(default)]
    pub params: ParamMap,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Recipe {
    pub version: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub stages: Vec<StageEntry>,
}

fn deserialize_fallback_opt<'de, D>(deserializer: D) -> Result<Option<FallbackSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<FallbackSetting>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("\"pass_through\" or \"fail\"")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            parse_fallback(v).map(Some).map_err(E::custom)
        }

        fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(if v {
                FallbackSetting::PassThrough
            } else {
                FallbackSetting::Fail
            }))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn parse_fallback(raw: &str) -> Result<FallbackSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "pass_through" | "passthrough" | "pass-through" | "lenient" => {
            Ok(FallbackSetting::PassThrough)
        }
        "fail" | "strict" | "error" => Ok(FallbackSetting::Fail),
        other => Err(format!("invalid shader_fallback '{other}'")),
    }
}

impl Recipe {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: Recipe = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// Builds a recipe from a comma or `+` separated effect list such as
    /// `channel_shift,vaporwave`.
    pub fn from_effect_list(list: &str) -> Result<Self, ConfigError> {
        let stages = list
            .split([',', '+'])
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|effect| StageEntry {
                id: None,
                effect: effect.to_string(),
                params: ParamMap::new(),
            })
            .collect();
        let recipe = Recipe {
            version: CURRENT_VERSION,
            name: None,
            engine: EngineSection::default(),
            output: OutputSection::default(),
            stages,
        };
        recipe.validate()?;
        Ok(recipe)
    }

    /// Every problem found, in document order. Effect names are checked
    /// against the registry later, by whoever owns it.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.version != CURRENT_VERSION {
            issues.push(format!(
                "unsupported recipe version {}; expected {CURRENT_VERSION}",
                self.version
            ));
        }
        if self.stages.is_empty() {
            issues.push("recipe must define at least one stage".to_string());
        }
        if let Some(0) = self.engine.max_texture_size {
            issues.push("engine.max_texture_size must be greater than zero".to_string());
        }
        if let Some(quality) = self.output.quality {
            if !(1..=100).contains(&quality) {
                issues.push(format!("output.quality {quality} must be within 1..=100"));
            }
        }
        if let Some(suffix) = &self.output.suffix {
            if suffix.contains(['/', '\\']) {
                issues.push(format!("output.suffix '{suffix}' must not contain path separators"));
            }
        }

        let ids = self.stage_ids();
        for (index, (entry, id)) in self.stages.iter().zip(&ids).enumerate() {
            if entry.effect.trim().is_empty() {
                issues.push(format!("stage {index} has an empty effect name"));
            }
            if id.trim().is_empty() {
                issues.push(format!("stage {index} has an empty id"));
            }
            if ids[..index].contains(id) {
                issues.push(format!("stage id '{id}' is used more than once"));
            }
        }
        issues
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(issues.join("; ")))
        }
    }

    fn stage_ids(&self) -> Vec<String> {
        self.stages
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                entry
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("{index}-{}", entry.effect))
            })
            .collect()
    }

    /// Stages in order; entries without an id get `<index>-<effect>`.
    pub fn stages(&self) -> Vec<PipelineStage> {
        self.stages
            .iter()
            .zip(self.stage_ids())
            .map(|(entry, id)| PipelineStage {
                id,
                effect: entry.effect.clone(),
                params: entry.params.clone(),
            })
            .collect()
    }

    pub fn effect_names(&self) -> Vec<&str> {
        self.stages.iter().map(|entry| entry.effect.as_str()).collect()
    }

    /// Recipe name, or the `a+b` composite of its effects.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.effect_names().join("+"),
        }
    }
}
