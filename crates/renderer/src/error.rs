use effects::ParameterTypeError;
use thiserror::Error;

/// Failure to turn an effect's shader text into a usable program.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShaderError {
    /// The fragment source did not parse or validate.
    #[error("shader for '{effect}' failed to compile:\n{diagnostic}")]
    Compile { effect: String, diagnostic: String },
    /// The render pipeline could not be created from the compiled module.
    #[error("shader for '{effect}' failed to link:\n{diagnostic}")]
    Link { effect: String, diagnostic: String },
}

impl ShaderError {
    pub fn effect(&self) -> &str {
        match self {
            ShaderError::Compile { effect, .. } | ShaderError::Link { effect, .. } => effect,
        }
    }
}

/// Every way a pipeline run can fail.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("shader for '{effect}' failed to compile:\n{diagnostic}")]
    ShaderCompile { effect: String, diagnostic: String },
    #[error("shader for '{effect}' failed to link:\n{diagnostic}")]
    ShaderLink { effect: String, diagnostic: String },
    #[error("effect '{0}' is not loaded")]
    EffectNotLoaded(String),
    #[error("no image is bound to the pipeline")]
    ImageNotLoaded,
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("stage id '{0}' appears more than once in the pipeline")]
    DuplicateStage(String),
    #[error(transparent)]
    ParameterType(#[from] ParameterTypeError),
    #[error("cannot allocate {width}x{height} GPU resources: {reason}")]
    ResourceExhaustion {
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("GPU rendering is unavailable: {0}")]
    PlatformUnsupported(String),
    #[error("pipeline run was cancelled")]
    Cancelled,
    #[error("failed to read rendered pixels back from the GPU: {0}")]
    Readback(String),
    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
}

impl From<ShaderError> for EngineError {
    fn from(error: ShaderError) -> Self {
        match error {
            ShaderError::Compile { effect, diagnostic } => {
                EngineError::ShaderCompile { effect, diagnostic }
            }
            ShaderError::Link { effect, diagnostic } => EngineError::ShaderLink { effect, diagnostic },
        }
    }
}
