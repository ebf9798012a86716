use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use effects::{pipeline_display_name, PipelineStage};
use pipeconfig::Recipe;
use renderer::{export_encoded, Engine, ExportFormat, SourceImage};
use tracing_subscriber::EnvFilter;

use crate::bindings::{self, OutputSettings};
use crate::catalog::Catalog;
use crate::cli::RunArgs;
use crate::paths::AppPaths;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run(args: RunArgs) -> Result<()> {
    let input = args
        .input
        .clone()
        .ok_or_else(|| anyhow!("missing INPUT; pass an image file or a folder of images"))?;
    let output_dir = args
        .output
        .clone()
        .ok_or_else(|| anyhow!("missing OUTPUT folder"))?;

    let paths = AppPaths::discover()?;
    tracing::debug!(
        config = %paths.config_dir().display(),
        data = %paths.data_dir().display(),
        "resolved monadage paths"
    );
    let recipe = resolve_recipe(&args, &paths)?;
    let catalog = Catalog::load(Some(&paths), args.shader_dir.as_deref())?;
    catalog.check_effects(recipe.effect_names())?;

    for undeclared in catalog.undeclared_parameters(&args.set) {
        tracing::warn!(
            effect = %undeclared.effect,
            param = %undeclared.param,
            "--set names a parameter the effect does not declare"
        );
    }

    let mut stages = recipe.stages();
    for unmatched in bindings::apply_assignments(&mut stages, &args.set) {
        tracing::warn!(
            effect = %unmatched.effect,
            param = %unmatched.param,
            "--set names an effect that is not in the pipeline"
        );
    }
    let output = bindings::output_settings(&args, &recipe, &stages);

    let inputs = collect_inputs(&input)?;
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create output folder {}", output_dir.display()))?;

    let config = bindings::engine_config(&args, &recipe);
    let Catalog { registry, shaders } = catalog;
    let engine = Engine::new(config, Arc::new(registry), shaders)
        .context("failed to initialise the GPU effect engine")?;
    tracing::debug!(config = ?engine.config(), "effect engine configured");

    if stages.len() == 1 {
        println!("Using pipeline: {}", recipe.display_name());
    } else {
        println!(
            "Using composite pipeline: {}",
            pipeline_display_name(&stages).replace('+', " -> ")
        );
    }
    println!("Processing images from: {}", input.display());
    println!("Saving results to: {}", output_dir.display());

    let started = Instant::now();
    let mut processed = 0usize;
    let mut failed = 0usize;
    for path in &inputs {
        let name = path.file_name().unwrap_or(path.as_os_str()).to_string_lossy();
        println!("Processing: {name}");
        match process_file(&engine, &stages, &output, &output_dir, path) {
            Ok(target) => {
                println!("  -> Saved: {}", target.display());
                processed += 1;
            }
            Err(error) => {
                println!("  -> Error processing {name}: {error:#}");
                tracing::warn!(path = %path.display(), error = %format!("{error:#}"), "image failed");
                failed += 1;
            }
        }
    }
    engine.shutdown();

    tracing::info!(
        processed,
        failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "batch finished"
    );
    println!("Processed {processed} of {} images successfully.", inputs.len());
    if processed == 0 {
        bail!("no images were processed");
    }
    Ok(())
}

fn resolve_recipe(args: &RunArgs, paths: &AppPaths) -> Result<Recipe> {
    match (&args.recipe, &args.pipeline) {
        (Some(recipe), _) => {
            let direct = PathBuf::from(recipe);
            let path = if direct.is_file() {
                direct
            } else {
                paths
                    .find_recipe(recipe)
                    .ok_or_else(|| anyhow!("recipe '{recipe}' not found"))?
            };
            Recipe::load(&path).with_context(|| format!("failed to load recipe {}", path.display()))
        }
        (None, Some(list)) => Ok(Recipe::from_effect_list(list)?),
        (None, None) => bail!("no pipeline given; use --pipeline or --recipe"),
    }
}

fn process_file(
    engine: &Engine,
    stages: &[PipelineStage],
    output: &OutputSettings,
    output_dir: &Path,
    path: &Path,
) -> Result<PathBuf> {
    let image = SourceImage::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let result = engine.process(&image, stages)?;
    for effect in &result.degraded_effects {
        println!("  -> Warning: '{effect}' ran as pass-through; its shader did not build");
    }
    let bytes = export_encoded(&result, output.format, output.quality)?;
    let target = output_dir.join(output_file_name(path, &output.suffix, output.format));
    fs::write(&target, bytes).with_context(|| format!("failed to write {}", target.display()))?;
    Ok(target)
}

/// `<stem><suffix>.<ext>`, e.g. `cat_channel_shift_vaporwave.png`.
pub fn output_file_name(input: &Path, suffix: &str, format: ExportFormat) -> String {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    format!("{stem}{suffix}.{}", format.extension())
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// A single image file, or every supported image directly inside a folder,
/// sorted by path.
pub fn collect_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        if !is_supported_image(input) {
            bail!(
                "'{}' is not a supported image (expected one of: {})",
                input.display(),
                IMAGE_EXTENSIONS.join(", ")
            );
        }
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        bail!("input '{}' does not exist", input.display());
    }

    let mut images = Vec::new();
    for entry in fs::read_dir(input).with_context(|| format!("failed to read {}", input.display()))? {
        let path = entry?.path();
        if path.is_file() && is_supported_image(&path) {
            images.push(path);
        }
    }
    images.sort();
    if images.is_empty() {
        bail!("no supported images found in {}", input.display());
    }
    Ok(images)
}
