use std::sync::Arc;

use anyhow::{Context, Result};
use effects::{EffectDefinition, ParamKind, ParamValue, ParameterSpec};
use renderer::{Capabilities, Engine, EngineConfig, EngineError};
use serde::Serialize;

use crate::catalog::Catalog;
use crate::cli::{EffectsArgs, InfoArgs};
use crate::paths::AppPaths;

pub fn list_effects(args: EffectsArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let catalog = Catalog::load(Some(&paths), args.shader_dir.as_deref())?;
    let definitions: Vec<Arc<EffectDefinition>> = match args.category {
        Some(category) => catalog.registry.by_category(category),
        None => catalog.registry.all(),
    };

    if args.json {
        let plain: Vec<&EffectDefinition> = definitions.iter().map(Arc::as_ref).collect();
        let json =
            serde_json::to_string_pretty(&plain).context("failed to serialise effect list")?;
        println!("{json}");
        return Ok(());
    }

    if definitions.is_empty() {
        println!("No effects match.");
        return Ok(());
    }
    println!("Available effects:");
    for definition in &definitions {
        println!(
            "  {:<20} {:<10} {}",
            definition.name, definition.category, definition.description
        );
        for (name, spec) in &definition.parameters {
            let default = definition.default_value(name).unwrap_or(spec.default);
            println!("      {name:<16} {}", describe_parameter(spec, &default));
        }
    }
    Ok(())
}

/// One-line summary of a parameter; `default` is the effect's effective
/// default, which a defaults provider may move away from the spec's own.
fn describe_parameter(spec: &ParameterSpec, default: &ParamValue) -> String {
    match &spec.kind {
        ParamKind::Choice { options } => {
            let index = default.as_scalar().unwrap_or(0.0).round() as usize;
            let default = options.get(index).map(String::as_str).unwrap_or("?");
            format!("choice of {} (default {default})", options.join("|"))
        }
        ParamKind::Bool => format!("toggle (default {})", format_value(default)),
        kind => format!(
            "{} {}..{} (default {})",
            kind_name(kind),
            spec.min,
            spec.max,
            format_value(default)
        ),
    }
}

fn kind_name(kind: &ParamKind) -> &'static str {
    match kind {
        ParamKind::Scalar => "scalar",
        ParamKind::Vec2 => "vec2",
        ParamKind::Vec3 => "vec3",
        ParamKind::Vec4 => "vec4",
        ParamKind::Choice { .. } => "choice",
        ParamKind::Bool => "toggle",
    }
}

fn format_value(value: &ParamValue) -> String {
    match value {
        ParamValue::Bool(flag) => flag.to_string(),
        ParamValue::Scalar(x) => x.to_string(),
        other => other
            .components()
            .iter()
            .map(f32::to_string)
            .collect::<Vec<_>>()
            .join(","),
    }
}

#[derive(Serialize)]
struct InfoReport {
    capabilities: Capabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<renderer::Diagnostics>,
}

pub fn show_info(args: InfoArgs) -> Result<()> {
    let config = EngineConfig {
        allow_software: !args.no_software,
        ..EngineConfig::default()
    };
    let paths = AppPaths::discover()?;
    let catalog = Catalog::load(Some(&paths), args.shader_dir.as_deref())?;
    let report = match Engine::new(config, Arc::new(catalog.registry), catalog.shaders) {
        Ok(engine) => {
            let report = InfoReport {
                capabilities: engine.capabilities().clone(),
                diagnostics: Some(engine.diagnostics()),
            };
            engine.shutdown();
            report
        }
        Err(EngineError::PlatformUnsupported(reason)) => InfoReport {
            capabilities: Capabilities::unsupported(reason),
            diagnostics: None,
        },
        Err(error) => return Err(error).context("failed to initialise the GPU effect engine"),
    };

    if args.json {
        let json =
            serde_json::to_string_pretty(&report).context("failed to serialise diagnostics")?;
        println!("{json}");
        return Ok(());
    }

    let capabilities = &report.capabilities;
    println!("GPU supported:     {}", capabilities.supported);
    if let Some(reason) = &capabilities.reason {
        println!("Reason:            {reason}");
    }
    if let Some(adapter) = &capabilities.adapter {
        println!("Adapter:           {} ({}, {})", adapter.name, adapter.backend, adapter.device_type);
        println!("Driver:            {}", adapter.driver);
        println!("Software adapter:  {}", adapter.is_software);
    }
    if capabilities.supported {
        println!("Max texture size:  {}", capabilities.max_texture_size);
    }
    if !capabilities.extensions.is_empty() {
        println!("Extensions:        {}", capabilities.extensions.join(", "));
    }
    if let Some(diagnostics) = &report.diagnostics {
        println!("Registered effects: {}", diagnostics.registered_effects);
        println!("Shader sources:     {}", diagnostics.shader_sources);
    }
    Ok(())
}
