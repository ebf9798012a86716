use effects::PipelineStage;
use pipeconfig::{FallbackSetting, GpuPower, OutputFormat, Recipe};
use renderer::{EngineConfig, ExportFormat, GpuPowerPreference, ShaderFallback};

use crate::cli::{Assignment, RunArgs};

/// Encoder settings resolved from flags and the recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    pub format: ExportFormat,
    pub quality: Option<u8>,
    pub suffix: String,
}

/// Command-line flags win over the recipe's `[engine]` table.
pub fn engine_config(args: &RunArgs, recipe: &Recipe) -> EngineConfig {
    let section = &recipe.engine;
    let defaults = EngineConfig::default();
    let shader_fallback = if args.strict_shaders {
        ShaderFallback::Fail
    } else {
        section
            .shader_fallback
            .map(map_fallback)
            .unwrap_or(defaults.shader_fallback)
    };
    EngineConfig {
        power: args
            .gpu_power
            .or(section.gpu_power.map(map_power))
            .unwrap_or(defaults.power),
        allow_software: !args.no_software && section.allow_software.unwrap_or(defaults.allow_software),
        shader_fallback,
        max_texture_size: args.max_texture_size.or(section.max_texture_size),
    }
}

pub fn output_settings(args: &RunArgs, recipe: &Recipe, stages: &[PipelineStage]) -> OutputSettings {
    let output = &recipe.output;
    OutputSettings {
        format: args
            .format
            .or(output.format.map(map_format))
            .unwrap_or_default(),
        quality: args.quality.or(output.quality),
        suffix: output
            .suffix
            .clone()
            .unwrap_or_else(|| effects::pipeline_suffix(stages)),
    }
}

/// Applies `--set` overrides to every stage running the named effect.
/// Returns the assignments that matched no stage.
pub fn apply_assignments<'a>(
    stages: &mut [PipelineStage],
    assignments: &'a [Assignment],
) -> Vec<&'a Assignment> {
    let mut unmatched = Vec::new();
    for assignment in assignments {
        let mut matched = false;
        for stage in stages.iter_mut().filter(|stage| stage.effect == assignment.effect) {
            stage
                .params
                .insert(assignment.param.clone(), assignment.value);
            matched = true;
        }
        if !matched {
            unmatched.push(assignment);
        }
    }
    unmatched
}

fn map_power(power: GpuPower) -> GpuPowerPreference {
    match power {
        GpuPower::Low => GpuPowerPreference::Low,
        GpuPower::High => GpuPowerPreference::High,
    }
}

fn map_fallback(setting: FallbackSetting) -> ShaderFallback {
    match setting {
        FallbackSetting::PassThrough => ShaderFallback::PassThrough,
        FallbackSetting::Fail => ShaderFallback::Fail,
    }
}

fn map_format(format: OutputFormat) -> ExportFormat {
    match format {
        OutputFormat::Png => ExportFormat::Png,
        OutputFormat::Jpeg => ExportFormat::Jpeg,
        OutputFormat::Bmp => ExportFormat::Bmp,
    }
}
