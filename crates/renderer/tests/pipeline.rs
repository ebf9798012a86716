use std::sync::Arc;
use std::thread;

use effects::{
    Category, EffectDefinition, EffectRegistry, ParamValue, ParameterSpec, PipelineStage,
    RegistryError, ShaderLibrary,
};
use renderer::{
    export_encoded, CancelToken, Engine, EngineConfig, EngineError, ExportFormat, ProcessOptions,
    ShaderFallback, SourceImage,
};

const IDENTITY_SHADER: &str = "void mainEffect(out vec4 fragColor, in vec2 uv) {\n    fragColor = texture(uInput, uv);\n}\n";
const BROKEN_SHADER: &str = "void mainEffect(out vec4 fragColor, in vec2 uv) {\n    fragColor = ;\n}\n";
const OFFSET_SHADER: &str = "void mainEffect(out vec4 fragColor, in vec2 uv) {\n    fragColor = texture(uInput, uv + uv_offset);\n}\n";

fn try_engine(config: EngineConfig, registry: EffectRegistry, shaders: ShaderLibrary) -> Option<Engine> {
    match Engine::new(config, Arc::new(registry), shaders) {
        Ok(engine) => Some(engine),
        Err(EngineError::PlatformUnsupported(reason)) => {
            eprintln!("skipping GPU test: {reason}");
            None
        }
        Err(other) => panic!("engine construction failed: {other}"),
    }
}

fn offset_effect(parameter: &str) -> EffectDefinition {
    EffectDefinition::new("offset", "Offset", Category::Distortion)
        .with_parameter(
            parameter,
            ParameterSpec::vec2("Offset", [0.0, 0.0], -1.0, 1.0, 0.01),
        )
        .with_spec_defaults()
}

/// Built-in catalog plus `identity`, `broken`, `ghost` (no shader) and
/// `offset` (samples at `uv + uv_offset`) test effects.
fn test_catalog() -> (EffectRegistry, ShaderLibrary) {
    let mut registry = EffectRegistry::with_builtins().unwrap();
    for name in ["identity", "broken", "ghost"] {
        registry
            .register(EffectDefinition::new(name, name, Category::Color))
            .unwrap();
    }
    registry.register(offset_effect("uv_offset")).unwrap();
    let mut shaders = ShaderLibrary::builtin();
    shaders.insert("identity", IDENTITY_SHADER);
    shaders.insert("broken", BROKEN_SHADER);
    shaders.insert("offset", OFFSET_SHADER);
    (registry, shaders)
}

fn engine_with(config: EngineConfig) -> Option<Engine> {
    let (registry, shaders) = test_catalog();
    try_engine(config, registry, shaders)
}

fn engine() -> Option<Engine> {
    engine_with(EngineConfig::default())
}

macro_rules! require_gpu {
    ($engine:expr) => {
        match $engine {
            Some(engine) => engine,
            None => return,
        }
    };
}

fn stage(id: &str, effect: &str) -> PipelineStage {
    PipelineStage::new(id, effect)
}

/// Deterministic RGBA pattern with varied channels.
fn pattern(width: u32, height: u32) -> SourceImage {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[
                (x * 37 + y * 11) as u8,
                (x * 5 + y * 53) as u8,
                (255 - x * 17) as u8,
                255,
            ]);
        }
    }
    SourceImage::from_rgba8(width, height, pixels).unwrap()
}

fn assert_close(a: &[u8], b: &[u8], tolerance: u8) {
    assert_eq!(a.len(), b.len());
    for (index, (x, y)) in a.iter().zip(b).enumerate() {
        assert!(
            x.abs_diff(*y) <= tolerance,
            "byte {index} differs: {x} vs {y} (tolerance {tolerance})"
        );
    }
}

#[test]
fn grayscale_turns_pure_red_into_luma_gray() {
    let engine = require_gpu!(engine());
    let image = SourceImage::solid(4, 4, [255, 0, 0, 255]);
    let result = engine.process(&image, &[stage("g", "grayscale")]).unwrap();

    assert_eq!((result.width, result.height), (4, 4));
    assert_eq!(result.byte_size, 64);
    assert_eq!(result.applied_effects, vec!["grayscale".to_string()]);
    for px in result.pixels.chunks(4) {
        assert_close(px, &[76, 76, 76, 255], 1);
    }
}

#[test]
fn empty_pipeline_round_trips_through_png() {
    let engine = require_gpu!(engine());
    let image = SourceImage::from_rgba8(
        2,
        2,
        vec![
            255, 0, 0, 255, 0, 255, 0, 255, //
            0, 0, 255, 255, 255, 255, 255, 255,
        ],
    )
    .unwrap();

    let result = engine.process(&image, &[]).unwrap();
    assert_eq!(result.pixels, image.pixels());
    assert!(result.applied_effects.is_empty());

    let encoded = export_encoded(&result, ExportFormat::Png, None).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("round_trip.png");
    std::fs::write(&path, &encoded).unwrap();
    let reopened = SourceImage::open(&path).unwrap();
    assert_eq!(reopened.pixels(), image.pixels());
}

#[test]
fn unknown_effect_fails_without_a_result() {
    let engine = require_gpu!(engine());
    let image = SourceImage::solid(2, 2, [10, 20, 30, 255]);
    let err = engine.process(&image, &[stage("x", "foo")]).unwrap_err();
    assert!(matches!(err, EngineError::EffectNotLoaded(ref name) if name == "foo"));
    assert!(engine.live_allocations().is_empty());
}

#[test]
fn registered_effect_without_shader_is_not_loaded() {
    let engine = require_gpu!(engine());
    let image = SourceImage::solid(2, 2, [10, 20, 30, 255]);
    let err = engine.process(&image, &[stage("x", "ghost")]).unwrap_err();
    assert!(matches!(err, EngineError::EffectNotLoaded(ref name) if name == "ghost"));
}

#[test]
fn duplicate_stage_ids_are_rejected() {
    let engine = require_gpu!(engine());
    let image = SourceImage::solid(2, 2, [10, 20, 30, 255]);
    let err = engine
        .process(&image, &[stage("same", "invert"), stage("same", "grayscale")])
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateStage(ref id) if id == "same"));
}

#[test]
fn rows_keep_their_order() {
    let engine = require_gpu!(engine());
    let image = SourceImage::from_rgba8(1, 2, vec![255, 0, 0, 255, 0, 0, 255, 255]).unwrap();
    let result = engine.process(&image, &[stage("i", "identity")]).unwrap();
    assert_eq!(result.pixel(0, 0), Some([255, 0, 0, 255]));
    assert_eq!(result.pixel(0, 1), Some([0, 0, 255, 255]));
}

#[test]
fn stage_order_changes_the_result() {
    let engine = require_gpu!(engine());
    let image = SourceImage::solid(4, 4, [100, 150, 200, 255]);
    let red_only = stage("t", "tint").with_param("tint", [1.0_f32, 0.0, 0.0]);
    let gray = stage("g", "grayscale");

    let tint_first = engine.process(&image, &[red_only.clone(), gray.clone()]).unwrap();
    let gray_first = engine.process(&image, &[gray, red_only]).unwrap();

    let a = tint_first.pixel(0, 0).unwrap();
    let b = gray_first.pixel(0, 0).unwrap();
    assert_eq!(a[0], a[1], "tint then grayscale yields gray");
    assert_eq!(b[1], 0, "grayscale then red tint clears green");
    assert_ne!(tint_first.pixels, gray_first.pixels);
}

#[test]
fn tints_commute_within_rounding() {
    let engine = require_gpu!(engine());
    let image = pattern(8, 8);
    let warm = stage("warm", "tint").with_param("tint", [0.9_f32, 0.5, 0.7]);
    let cool = stage("cool", "tint").with_param("tint", [0.5_f32, 0.8, 1.0]);

    let ab = engine.process(&image, &[warm.clone(), cool.clone()]).unwrap();
    let ba = engine.process(&image, &[cool, warm]).unwrap();
    assert_close(&ab.pixels, &ba.pixels, 1);
}

#[test]
fn captured_intermediates_match_prefix_pipelines() {
    let engine = require_gpu!(engine());
    let image = pattern(6, 5);
    let stages = vec![
        stage("half-gray", "grayscale").with_param("amount", 0.5_f32),
        stage("invert", "invert"),
        stage("noop", "tint").with_param("tint", [1.0_f32, 1.0, 1.0]),
    ];

    let full = engine
        .process_with(&image, &stages, &ProcessOptions::default().capturing_intermediates())
        .unwrap();
    assert_eq!(full.intermediates.len(), 2);

    let first = engine.process(&image, &stages[..1]).unwrap();
    let second = engine.process(&image, &stages[..2]).unwrap();
    assert_eq!(full.intermediates[0], first.pixels);
    assert_eq!(full.intermediates[1], second.pixels);
    assert_eq!(full.pixels, second.pixels, "identity tint leaves the image unchanged");
}

#[test]
fn out_of_range_parameters_are_clamped() {
    let engine = require_gpu!(engine());
    let image = pattern(4, 4);
    let clamped = engine
        .process(&image, &[stage("g", "grayscale").with_param("amount", 5.0_f32)])
        .unwrap();
    let full = engine
        .process(&image, &[stage("g", "grayscale").with_param("amount", 1.0_f32)])
        .unwrap();
    assert_eq!(clamped.pixels, full.pixels);
}

#[test]
fn wrong_parameter_shape_is_a_type_error() {
    let engine = require_gpu!(engine());
    let image = pattern(2, 2);
    let err = engine
        .process(
            &image,
            &[stage("g", "grayscale").with_param("amount", ParamValue::Vec2([1.0, 1.0]))],
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::ParameterType(_)));
    assert!(engine.live_allocations().is_empty());
}

#[test]
fn allocations_are_released_after_success_and_failure() {
    let engine = require_gpu!(engine());
    let image = pattern(16, 9);
    engine
        .process(&image, &[stage("a", "invert"), stage("b", "posterize"), stage("c", "vignette")])
        .unwrap();
    assert!(engine.live_allocations().is_empty());

    let _ = engine
        .process(&image, &[stage("a", "invert"), stage("b", "foo")])
        .unwrap_err();
    assert!(engine.live_allocations().is_empty());
}

#[test]
fn broken_shader_runs_as_pass_through() {
    let engine = require_gpu!(engine());
    let image = pattern(4, 3);
    let result = engine.process(&image, &[stage("b", "broken")]).unwrap();

    assert_eq!(result.pixels, image.pixels());
    assert_eq!(result.degraded_effects, vec!["broken".to_string()]);
    assert_eq!(result.applied_effects, vec!["broken".to_string()]);

    let again = engine.process(&image, &[stage("b", "broken")]).unwrap();
    assert!(again.is_degraded());
    assert_eq!(engine.diagnostics().degraded_effects, vec!["broken".to_string()]);
}

#[test]
fn broken_shader_fails_under_strict_policy() {
    let engine = require_gpu!(engine_with(EngineConfig {
        shader_fallback: ShaderFallback::Fail,
        ..EngineConfig::default()
    }));
    let image = pattern(2, 2);
    assert_eq!(engine.config().shader_fallback, ShaderFallback::Fail);
    let err = engine.process(&image, &[stage("b", "broken")]).unwrap_err();
    assert!(matches!(err, EngineError::ShaderCompile { ref effect, .. } if effect == "broken"));
    assert!(engine.diagnostics().loaded_effects.is_empty());
    assert!(engine.live_allocations().is_empty());
}

#[test]
fn cancelled_runs_return_no_result() {
    let engine = require_gpu!(engine());
    let token = CancelToken::new();
    token.cancel();
    let err = engine
        .process_with(
            &pattern(4, 4),
            &[stage("g", "grayscale")],
            &ProcessOptions::default().with_cancel(token),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
    assert!(engine.live_allocations().is_empty());
}

#[test]
fn batch_isolates_failures() {
    let engine = require_gpu!(engine());
    let images = vec![
        pattern(3, 3),
        SourceImage::from_rgba8(0, 0, Vec::new()).unwrap(),
        pattern(5, 2),
    ];
    let results = engine.process_batch(&images, &[stage("i", "invert")], None);

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(EngineError::ImageNotLoaded)));
    let last = results[2].as_ref().unwrap();
    assert_eq!((last.width, last.height), (5, 2));
}

#[test]
fn batch_after_cancel_reports_cancelled() {
    let engine = require_gpu!(engine());
    let token = CancelToken::new();
    token.cancel();
    let images = vec![pattern(2, 2), pattern(2, 2)];
    let results = engine.process_batch(&images, &[stage("i", "invert")], Some(&token));
    assert!(results
        .iter()
        .all(|result| matches!(result, Err(EngineError::Cancelled))));
}

#[test]
fn oversized_images_exhaust_resources() {
    let engine = require_gpu!(engine_with(EngineConfig {
        max_texture_size: Some(8),
        ..EngineConfig::default()
    }));
    let err = engine
        .process(&SourceImage::solid(16, 4, [0, 0, 0, 255]), &[stage("i", "invert")])
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::ResourceExhaustion {
            width: 16,
            height: 4,
            ..
        }
    ));
    assert!(engine.live_allocations().is_empty());
}

#[test]
fn every_builtin_effect_renders() {
    let engine = require_gpu!(engine());
    let image = pattern(12, 10);
    for definition in EffectRegistry::with_builtins().unwrap().all() {
        let result = engine
            .process(&image, &[stage("only", &definition.name)])
            .unwrap_or_else(|err| panic!("{}: {err}", definition.name));
        assert!(!result.is_degraded(), "{} fell back to pass-through", definition.name);
        assert_eq!(result.byte_size, 12 * 10 * 4);
    }
}

#[test]
fn diagnostics_reflect_engine_state() {
    let engine = require_gpu!(engine());
    engine
        .process(&pattern(7, 3), &[stage("g", "grayscale")])
        .unwrap();
    let diagnostics = engine.diagnostics();
    assert_eq!(diagnostics.canvas_size, Some((7, 3)));
    assert!(diagnostics.loaded_effects.contains(&"grayscale".to_string()));
    assert!(diagnostics.live_allocations.is_empty());
    assert!(engine.capabilities().supported);

    let json = serde_json::to_value(&diagnostics).unwrap();
    assert_eq!(json["canvas_size"], serde_json::json!([7, 3]));
    assert_eq!(json["live_allocations"]["textures"], 0);
    assert!(json["adapter"]["name"].is_string());

    engine.reset_programs();
    assert!(engine.diagnostics().loaded_effects.is_empty());
    engine.shutdown();
}

#[test]
fn engine_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Engine>();
}

#[test]
fn concurrent_runs_compile_each_effect_once() {
    let engine = Arc::new(require_gpu!(engine()));
    engine.reset_programs();
    let image = Arc::new(pattern(9, 7));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let image = Arc::clone(&image);
            thread::spawn(move || {
                engine
                    .process(&image, &[stage("a", "invert"), stage("b", "invert")])
                    .unwrap()
                    .pixels
            })
        })
        .collect();
    let outputs: Vec<Vec<u8>> = workers
        .into_iter()
        .map(|worker| worker.join().unwrap())
        .collect();

    for output in &outputs {
        assert_eq!(output, &outputs[0]);
    }
    assert_close(&outputs[0], image.pixels(), 1);
    assert_eq!(engine.diagnostics().loaded_effects, vec!["invert".to_string()]);
    assert!(engine.live_allocations().is_empty());
}

#[test]
fn parameters_cannot_shadow_wrapper_identifiers() {
    let mut registry = EffectRegistry::new();
    let err = registry.register(offset_effect("v_uv")).unwrap_err();
    assert!(matches!(err, RegistryError::InvalidParameter { ref parameter, .. } if parameter == "v_uv"));
}

#[test]
fn uv_named_parameter_leaves_sampling_intact() {
    let engine = require_gpu!(engine());
    let image = pattern(8, 6);
    let result = engine.process(&image, &[stage("o", "offset")]).unwrap();
    assert!(!result.is_degraded());
    assert_eq!(result.pixels, image.pixels());
}
