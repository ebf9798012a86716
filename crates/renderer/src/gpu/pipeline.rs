use bytemuck::{Pod, Zeroable};
use effects::EffectDefinition;
use wgpu::util::DeviceExt;

use crate::compile::{
    compile_fragment_shader, compile_vertex_shader, wrap_effect_fragment, PASSTHROUGH_SOURCE,
};
use crate::error::ShaderError;

use super::uniforms::UniformLayout;

/// Every texture the engine samples or renders uses this format.
pub(crate) const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

const fn vertex(position: [f32; 2], uv: [f32; 2]) -> QuadVertex {
    QuadVertex { position, uv }
}

/// Two triangles covering clip space. Clip-space top maps to uv.y = 0, which
/// is texture row 0, so targets keep the source row order.
pub(crate) const QUAD_VERTICES: [QuadVertex; 6] = [
    vertex([-1.0, 1.0], [0.0, 0.0]),
    vertex([-1.0, -1.0], [0.0, 1.0]),
    vertex([1.0, -1.0], [1.0, 1.0]),
    vertex([-1.0, 1.0], [0.0, 0.0]),
    vertex([1.0, -1.0], [1.0, 1.0]),
    vertex([1.0, 1.0], [1.0, 0.0]),
];

const QUAD_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

/// Device objects shared by every effect program.
pub(crate) struct PipelineLayouts {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub input_layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
    pub vertex_module: wgpu::ShaderModule,
    pub quad_buffer: wgpu::Buffer,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("effect uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let input_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("effect input layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("effect pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &input_layout],
            push_constant_ranges: &[],
        });

        let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad vertices"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            uniform_layout,
            input_layout,
            pipeline_layout,
            vertex_module: compile_vertex_shader(device),
            quad_buffer,
        }
    }
}

/// A compiled effect: render pipeline plus the uniform layout it expects.
pub(crate) struct ShaderProgram {
    pub effect: String,
    pub pipeline: wgpu::RenderPipeline,
    pub uniforms: UniformLayout,
    /// Identity stand-in for an effect whose shader did not build.
    pub passthrough: bool,
}

impl ShaderProgram {
    pub fn build(
        device: &wgpu::Device,
        layouts: &PipelineLayouts,
        definition: &EffectDefinition,
        source: &str,
    ) -> Result<Self, ShaderError> {
        let uniforms = UniformLayout::for_parameters(&definition.parameters);
        Self::link(device, layouts, &definition.name, source, uniforms, false)
    }

    pub fn passthrough(
        device: &wgpu::Device,
        layouts: &PipelineLayouts,
        effect: &str,
    ) -> Result<Self, ShaderError> {
        Self::link(
            device,
            layouts,
            effect,
            PASSTHROUGH_SOURCE,
            UniformLayout::reserved_only(),
            true,
        )
    }

    fn link(
        device: &wgpu::Device,
        layouts: &PipelineLayouts,
        effect: &str,
        source: &str,
        uniforms: UniformLayout,
        passthrough: bool,
    ) -> Result<Self, ShaderError> {
        let wrapped = wrap_effect_fragment(source, &uniforms);
        let fragment_module = compile_fragment_shader(device, effect, &wrapped)?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(effect),
            layout: Some(&layouts.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &layouts.vertex_module,
                entry_point: Some("main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &QUAD_ATTRIBUTES,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ShaderError::Link {
                effect: effect.to_string(),
                diagnostic: error.to_string(),
            });
        }

        tracing::debug!(
            effect,
            passthrough,
            uniform_bytes = uniforms.size(),
            "built shader program"
        );
        Ok(Self {
            effect: effect.to_string(),
            pipeline,
            uniforms,
            passthrough,
        })
    }
}
