use std::collections::HashSet;
use std::sync::Arc;

use effects::{EffectDefinition, ParamMap, PipelineStage};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::types::{ProcessOptions, ProcessedResult, ShaderFallback, SourceImage};

use super::pipeline::ShaderProgram;
use super::resources::{RenderTarget, SourceTexture, TrackedBuffer};
use super::uniforms::bind_parameters;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RunState {
    Idle,
    Loaded,
    Running(usize),
    Completed,
    Failed,
}

struct PlannedStage<'s> {
    stage: &'s PipelineStage,
    definition: Arc<EffectDefinition>,
    params: ParamMap,
}

/// One `process()` call: owns the source texture and every target it
/// allocates, all of which are dropped (and destroyed) when the run ends.
pub(crate) struct PipelineRun<'e> {
    engine: &'e Engine,
    state: RunState,
    source: Option<SourceTexture>,
}

impl<'e> PipelineRun<'e> {
    pub fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            state: RunState::Idle,
            source: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = ?self.state, to = ?next, "pipeline run state");
        self.state = next;
    }

    /// Uploads `image` as the input of the first stage.
    pub fn load(&mut self, image: &SourceImage) -> Result<(), EngineError> {
        if image.is_empty() {
            self.transition(RunState::Failed);
            return Err(EngineError::ImageNotLoaded);
        }
        match self.engine.resources.allocate_source_texture(image) {
            Ok(texture) => {
                self.source = Some(texture);
                self.transition(RunState::Loaded);
                Ok(())
            }
            Err(error) => {
                self.transition(RunState::Failed);
                Err(error)
            }
        }
    }

    /// Runs `stages` in order against the loaded image.
    pub fn execute(
        &mut self,
        stages: &[PipelineStage],
        options: &ProcessOptions,
    ) -> Result<ProcessedResult, EngineError> {
        let outcome = self.run(stages, options);
        self.source = None;
        match &outcome {
            Ok(_) => self.transition(RunState::Completed),
            Err(error) => {
                tracing::debug!(%error, "pipeline run failed");
                self.transition(RunState::Failed);
            }
        }
        outcome
    }

    fn plan<'s>(&self, stages: &'s [PipelineStage]) -> Result<Vec<PlannedStage<'s>>, EngineError> {
        let mut seen = HashSet::new();
        let mut planned = Vec::with_capacity(stages.len());
        for stage in stages {
            if !seen.insert(stage.id.as_str()) {
                return Err(EngineError::DuplicateStage(stage.id.clone()));
            }
            let definition = self
                .engine
                .registry()
                .get(&stage.effect)
                .ok_or_else(|| EngineError::EffectNotLoaded(stage.effect.clone()))?;
            let params = definition.resolve_params(&stage.params)?;
            planned.push(PlannedStage {
                stage,
                definition,
                params,
            });
        }
        Ok(planned)
    }

    fn run(
        &mut self,
        stages: &[PipelineStage],
        options: &ProcessOptions,
    ) -> Result<ProcessedResult, EngineError> {
        let Some(source) = self.source.as_ref() else {
            return Err(EngineError::ImageNotLoaded);
        };
        let (width, height) = (source.width, source.height);
        let plan = self.plan(stages)?;
        if options.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let resources = &self.engine.resources;
        let output = resources.allocate_output_target(width, height)?;

        if plan.is_empty() {
            resources.copy_texture(source, &output);
            let pixels = resources.read_back(&output)?;
            return Ok(finish(pixels, width, height, Vec::new(), Vec::new(), Vec::new()));
        }

        let intermediates = resources.allocate_intermediate_targets(plan.len() - 1, width, height)?;
        let mut uniform_buffers: Vec<TrackedBuffer> = Vec::with_capacity(plan.len());
        let mut applied = Vec::with_capacity(plan.len());
        let mut degraded: Vec<String> = Vec::new();
        let last = plan.len() - 1;

        for (index, planned) in plan.iter().enumerate() {
            if options.is_cancelled() {
                tracing::info!(stage = %planned.stage.id, "run cancelled between stages");
                return Err(EngineError::Cancelled);
            }
            self.state = RunState::Running(index);
            tracing::debug!(
                stage = %planned.stage.id,
                effect = %planned.definition.name,
                index,
                "pipeline run state"
            );

            let program = self.resolve_program(&planned.definition)?;
            if program.passthrough {
                tracing::warn!(
                    effect = %program.effect,
                    stage = %planned.stage.id,
                    "effect shader unavailable; stage runs as pass-through"
                );
                if !degraded.contains(&program.effect) {
                    degraded.push(program.effect.clone());
                }
            }

            let time = self.engine.elapsed_seconds();
            let uniform_bytes = bind_parameters(&program.uniforms, &planned.params, (width, height), time)?;
            let uniforms = resources.create_uniform_buffer(&uniform_bytes);

            let input_view = match index {
                0 => &source.view,
                _ => &intermediates[index - 1].view,
            };
            let target = if index == last {
                &output
            } else {
                &intermediates[index]
            };
            self.draw(&program, &uniforms, input_view, source, target);
            uniform_buffers.push(uniforms);
            applied.push(planned.definition.name.clone());
        }

        let pixels = resources.read_back(&output)?;
        let captured = if options.capture_intermediates {
            intermediates
                .iter()
                .map(|target| resources.read_back(target))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };

        Ok(finish(pixels, width, height, applied, degraded, captured))
    }

    fn resolve_program(&self, definition: &EffectDefinition) -> Result<Arc<ShaderProgram>, EngineError> {
        let engine = self.engine;
        let name = definition.name.as_str();
        if let Some(program) = engine.cache.get(name) {
            return Ok(program);
        }
        let Some(source) = engine.shaders.get(name) else {
            return Err(EngineError::EffectNotLoaded(name.to_string()));
        };

        let device = &engine.gpu.device;
        let build = || ShaderProgram::build(device, &engine.layouts, definition, source);
        match engine.config.shader_fallback {
            ShaderFallback::PassThrough => {
                let stand_in = || ShaderProgram::passthrough(device, &engine.layouts, name);
                match engine.cache.compile(name, build, Some(&stand_in)) {
                    Ok(program) => Ok(program),
                    Err(error) => {
                        tracing::warn!(
                            effect = name,
                            %error,
                            "shader failed to build; caching a pass-through program"
                        );
                        engine.cache.get(name).ok_or_else(|| error.into())
                    }
                }
            }
            ShaderFallback::Fail => engine
                .cache
                .compile(name, build, None)
                .map_err(EngineError::from),
        }
    }

    fn draw(
        &self,
        program: &ShaderProgram,
        uniforms: &TrackedBuffer,
        input_view: &wgpu::TextureView,
        source: &SourceTexture,
        target: &RenderTarget,
    ) {
        let device = &self.engine.gpu.device;
        let layouts = &self.engine.layouts;
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("effect uniforms"),
            layout: &layouts.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.buffer.as_entire_binding(),
            }],
        });
        let input_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("effect input"),
            layout: &layouts.input_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(input_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&source.sampler),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(program.effect.as_str()),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(program.effect.as_str()),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &uniform_bind_group, &[]);
            pass.set_bind_group(1, &input_bind_group, &[]);
            pass.set_vertex_buffer(0, layouts.quad_buffer.slice(..));
            pass.draw(0..6, 0..1);
        }
        self.engine.gpu.queue.submit(Some(encoder.finish()));
    }
}

fn finish(
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    applied_effects: Vec<String>,
    degraded_effects: Vec<String>,
    intermediates: Vec<Vec<u8>>,
) -> ProcessedResult {
    ProcessedResult {
        byte_size: pixels.len(),
        pixels,
        width,
        height,
        applied_effects,
        degraded_effects,
        intermediates,
    }
}
