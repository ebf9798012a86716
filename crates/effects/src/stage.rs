use serde::{Deserialize, Serialize};

use crate::param::{ParamMap, ParamValue};

/// One step of a pipeline: which effect to run and with what overrides.
///
/// `params` is partial; missing keys fall back to the effect's defaults when
/// the stage is bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStage {
    pub id: String,
    pub effect: String,
    #[serde(default)]
    pub params: ParamMap,
}

impl PipelineStage {
    pub fn new(id: impl Into<String>, effect: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            effect: effect.into(),
            params: ParamMap::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }
}

/// Display name for an ordered effect chain, e.g. `glitch+vaporwave`.
pub fn pipeline_display_name(stages: &[PipelineStage]) -> String {
    stages
        .iter()
        .map(|stage| stage.effect.as_str())
        .collect::<Vec<_>>()
        .join("+")
}

/// File-name suffix for an ordered effect chain, e.g. `_glitch_vaporwave`.
pub fn pipeline_suffix(stages: &[PipelineStage]) -> String {
    stages
        .iter()
        .map(|stage| format!("_{}", stage.effect))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_names_follow_stage_order() {
        let stages = vec![
            PipelineStage::new("0", "channel_shift"),
            PipelineStage::new("1", "vaporwave").with_param("grid", false),
        ];
        assert_eq!(pipeline_display_name(&stages), "channel_shift+vaporwave");
        assert_eq!(pipeline_suffix(&stages), "_channel_shift_vaporwave");
        assert_eq!(pipeline_suffix(&[]), "");
    }

    #[test]
    fn params_default_to_empty_when_deserialized() {
        let stage: PipelineStage = toml::from_str("id = \"a\"\neffect = \"invert\"").unwrap();
        assert!(stage.params.is_empty());
    }
}
