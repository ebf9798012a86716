use std::borrow::Cow;

use wgpu::naga::front::glsl;
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};
use wgpu::naga::ShaderStage;

use crate::error::ShaderError;
use crate::gpu::uniforms::UniformLayout;

/// Compiles the static quad vertex shader shared by every program.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("quad vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

/// Compiles a wrapped effect fragment, reporting wgpu validation failures.
pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    effect: &str,
    wrapped: &str,
) -> Result<wgpu::ShaderModule, ShaderError> {
    validate_fragment(effect, wrapped)?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(effect),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(wrapped.to_string()),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(ShaderError::Compile {
            effect: effect.to_string(),
            diagnostic: error.to_string(),
        });
    }
    Ok(module)
}

/// Parses and validates a wrapped fragment with naga so failures carry a
/// source-annotated diagnostic instead of a bare validation error.
pub(crate) fn validate_fragment(effect: &str, wrapped: &str) -> Result<(), ShaderError> {
    let compile_error = |diagnostic: String| ShaderError::Compile {
        effect: effect.to_string(),
        diagnostic,
    };

    let mut frontend = glsl::Frontend::default();
    let options = glsl::Options::from(ShaderStage::Fragment);
    let module = frontend
        .parse(&options, wrapped)
        .map_err(|errors| compile_error(errors.emit_to_string(wrapped)))?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|error| compile_error(error.emit_to_string(wrapped)))?;
    Ok(())
}

/// Produces a self-contained GLSL fragment shader from an effect body.
///
/// 1. Strip any `#version` directive.
/// 2. Prepend the uniform block (reserved header plus one `p_<name>` field per
///    parameter), the parameter macros and the `uInput` sampler.
/// 3. Append a `main` that calls `mainEffect` with the interpolated uv.
pub(crate) fn wrap_effect_fragment(source: &str, uniforms: &UniformLayout) -> String {
    let mut sanitized = String::with_capacity(source.len());
    for line in source.lines() {
        if line.trim_start().starts_with("#version") {
            continue;
        }
        sanitized.push_str(line);
        sanitized.push('\n');
    }

    let (fields, macros) = uniforms.glsl_block();
    format!(
        "{PRELUDE}\
layout(std140, set = 0, binding = 0) uniform EffectParams {{
    vec2 _uResolution;
    float _uTime;
    float _uPadding0;
{fields}}} params;

#define uResolution params._uResolution
#define uTime params._uTime
{macros}{INPUT_BINDINGS}
{sanitized}{FOOTER}"
    )
}

const PRELUDE: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 monadage_out_color;

";

const INPUT_BINDINGS: &str = r"
layout(set = 1, binding = 0) uniform texture2D monadage_input_texture;
layout(set = 1, binding = 1) uniform sampler monadage_input_sampler;
#define uInput sampler2D(monadage_input_texture, monadage_input_sampler)
";

const FOOTER: &str = r"
void main() {
    vec4 monadage_color = vec4(0.0);
    mainEffect(monadage_color, v_uv);
    monadage_out_color = monadage_color;
}
";

/// Identity effect used when an effect's own shader does not build.
pub(crate) const PASSTHROUGH_SOURCE: &str = r"void mainEffect(out vec4 fragColor, in vec2 uv) {
    fragColor = texture(uInput, uv);
}
";

/// Quad vertex shader; uv (0,0) is the top-left corner of the target.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 1) in vec2 a_uv;
layout(location = 0) out vec2 v_uv;

void main() {
    v_uv = a_uv;
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";
