use std::sync::Arc;
use std::time::Instant;

use effects::{pipeline_display_name, EffectRegistry, PipelineStage, ShaderLibrary};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::EngineError;
use crate::gpu::cache::ProgramCache;
use crate::gpu::context::{self, AdapterSummary, Capabilities, GpuContext};
use crate::gpu::executor::{PipelineRun, RunState};
use crate::gpu::pipeline::{PipelineLayouts, ShaderProgram};
use crate::gpu::resources::{LiveAllocations, ResourceManager};
use crate::types::{CancelToken, EngineConfig, ProcessOptions, ProcessedResult, SourceImage};

/// Snapshot of engine state for logs and the `info` command.
#[derive(Clone, Debug, Serialize)]
pub struct Diagnostics {
    pub adapter: AdapterSummary,
    pub max_texture_size: u32,
    pub registered_effects: usize,
    pub shader_sources: usize,
    /// Effects with a cached program, sorted.
    pub loaded_effects: Vec<String>,
    /// Cached effects whose program is the pass-through stand-in.
    pub degraded_effects: Vec<String>,
    pub canvas_size: Option<(u32, u32)>,
    pub live_allocations: LiveAllocations,
    pub uptime_seconds: f64,
}

/// GPU effect pipeline engine.
///
/// Holds the device, the program cache and the injected effect registry and
/// shader library. Each [`Engine::process`] call owns its textures; only the
/// program cache is shared between calls.
pub struct Engine {
    pub(crate) config: EngineConfig,
    capabilities: Capabilities,
    pub(crate) gpu: GpuContext,
    pub(crate) layouts: PipelineLayouts,
    pub(crate) cache: ProgramCache<ShaderProgram>,
    pub(crate) resources: ResourceManager,
    registry: Arc<EffectRegistry>,
    pub(crate) shaders: ShaderLibrary,
    started: Instant,
    last_canvas: Mutex<Option<(u32, u32)>>,
}

impl Engine {
    /// Probes the GPU and builds an engine, or fails with
    /// `PlatformUnsupported` before any work is accepted.
    pub fn new(
        config: EngineConfig,
        registry: Arc<EffectRegistry>,
        shaders: ShaderLibrary,
    ) -> Result<Self, EngineError> {
        let (gpu, capabilities) = GpuContext::new(&config)?;
        let layouts = PipelineLayouts::new(&gpu.device);
        let resources = ResourceManager::new(
            gpu.device.clone(),
            gpu.queue.clone(),
            gpu.max_texture_size,
        );

        for definition in registry.all() {
            if !shaders.contains(&definition.name) {
                tracing::warn!(effect = %definition.name, "registered effect has no shader source");
            }
        }
        tracing::info!(
            adapter = %gpu.adapter.name,
            backend = %gpu.adapter.backend,
            max_texture_size = gpu.max_texture_size,
            effects = registry.len(),
            shader_fallback = ?config.shader_fallback,
            "engine ready"
        );

        Ok(Self {
            config,
            capabilities,
            gpu,
            layouts,
            cache: ProgramCache::new(),
            resources,
            registry,
            shaders,
            started: Instant::now(),
            last_canvas: Mutex::new(None),
        })
    }

    /// Reports GPU availability for `config` without building an engine.
    pub fn probe(config: &EngineConfig) -> Capabilities {
        context::probe(config)
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<EffectRegistry> {
        &self.registry
    }

    pub(crate) fn elapsed_seconds(&self) -> f32 {
        self.started.elapsed().as_secs_f32()
    }

    /// Applies `stages` in order to `image`.
    pub fn process(
        &self,
        image: &SourceImage,
        stages: &[PipelineStage],
    ) -> Result<ProcessedResult, EngineError> {
        self.process_with(image, stages, &ProcessOptions::default())
    }

    pub fn process_with(
        &self,
        image: &SourceImage,
        stages: &[PipelineStage],
        options: &ProcessOptions,
    ) -> Result<ProcessedResult, EngineError> {
        let started = Instant::now();
        let mut run = PipelineRun::new(self);
        run.load(image)?;
        *self.last_canvas.lock() = Some((image.width(), image.height()));

        let result = run.execute(stages, options)?;
        debug_assert_eq!(run.state(), RunState::Completed);
        tracing::info!(
            pipeline = %pipeline_display_name(stages),
            width = result.width,
            height = result.height,
            degraded = result.degraded_effects.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "processed image"
        );
        Ok(result)
    }

    /// Runs the same pipeline over several images; one image failing does
    /// not affect the others. After cancellation every remaining image
    /// reports `Cancelled`.
    pub fn process_batch(
        &self,
        images: &[SourceImage],
        stages: &[PipelineStage],
        cancel: Option<&CancelToken>,
    ) -> Vec<Result<ProcessedResult, EngineError>> {
        let options = ProcessOptions {
            cancel: cancel.cloned(),
            capture_intermediates: false,
        };
        images
            .iter()
            .enumerate()
            .map(|(index, image)| {
                if options.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                self.process_with(image, stages, &options).inspect_err(|error| {
                    tracing::warn!(index, %error, "batch image failed");
                })
            })
            .collect()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let programs = self.cache.snapshot();
        Diagnostics {
            adapter: self.gpu.adapter.clone(),
            max_texture_size: self.gpu.max_texture_size,
            registered_effects: self.registry.len(),
            shader_sources: self.shaders.len(),
            loaded_effects: programs.iter().map(|(name, _)| name.clone()).collect(),
            degraded_effects: programs
                .iter()
                .filter(|(_, program)| program.passthrough)
                .map(|(name, _)| name.clone())
                .collect(),
            canvas_size: *self.last_canvas.lock(),
            live_allocations: self.resources.live(),
            uptime_seconds: self.started.elapsed().as_secs_f64(),
        }
    }

    pub fn live_allocations(&self) -> LiveAllocations {
        self.resources.live()
    }

    /// Drops every cached program; the next run recompiles on demand.
    pub fn reset_programs(&self) {
        self.cache.reset();
    }

    /// Releases cached programs and waits for the device to go idle.
    pub fn shutdown(self) {
        self.cache.reset();
        if let Err(error) = self.gpu.device.poll(wgpu::PollType::Wait) {
            tracing::warn!(%error, "device did not drain cleanly on shutdown");
        }
        tracing::debug!(live = ?self.resources.live(), "engine shut down");
    }
}
