//! Headless GPU effect pipeline.
//!
//! An [`Engine`] applies an ordered list of [`effects::PipelineStage`]s to a
//! [`SourceImage`]. Each stage renders a full-screen quad with the effect's
//! fragment shader, reading the previous stage's output as `uInput`; the last
//! stage renders into the output target, which is read back into a
//! [`ProcessedResult`]. Dimensions never change between stages and rows are
//! kept top-first throughout.
//!
//! Effect shaders are GLSL bodies defining
//! `void mainEffect(out vec4 fragColor, in vec2 uv)`. The engine wraps them
//! with a uniform block exposing `uResolution`, `uTime` and each declared
//! parameter by name, plus the `uInput` sampler.

mod compile;
mod engine;
mod error;
mod export;
pub mod gpu;
mod types;

pub use engine::{Diagnostics, Engine};
pub use error::{EngineError, ShaderError};
pub use export::{export_encoded, DEFAULT_JPEG_QUALITY};
pub use gpu::{AdapterSummary, Capabilities, LiveAllocations};
pub use types::{
    CancelToken, EngineConfig, ExportFormat, GpuPowerPreference, ProcessOptions, ProcessedResult,
    ShaderFallback, SourceImage,
};
