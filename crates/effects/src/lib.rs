//! Effect catalog for the monadage pipeline engine.
//!
//! Types:
//!
//! - `EffectRegistry` is the lookup table of effect definitions. It is built
//!   once and handed to the engine behind an `Arc`.
//! - `EffectDefinition` describes one effect: name, category, parameter schema
//!   and a defaults provider.
//! - `ParameterSpec`, `ParamKind` and `ParamValue` form the parameter schema;
//!   `EffectDefinition::resolve_params` merges defaults with stage overrides
//!   and clamps them into range.
//! - `PipelineStage` is one caller-owned step of a pipeline.
//! - `ShaderLibrary` maps effect names to fragment shader text. Built-in
//!   shaders are embedded; user directories can override them.
//!
//! This crate does no GPU work.

pub mod builtin;
pub mod definition;
pub mod library;
pub mod param;
pub mod registry;
pub mod stage;

pub use definition::{Category, DefaultsProvider, EffectDefinition};
pub use library::{ShaderLibrary, SHADER_EXTENSION};
pub use param::{ParamKind, ParamMap, ParamValue, ParameterSpec, ParameterTypeError};
pub use registry::{
    validate_identifier, EffectRegistry, RegistryError, PARAMETER_FIELD_PREFIX, RESERVED_UNIFORMS,
    WRAPPER_PREFIX,
};
pub use stage::{pipeline_display_name, pipeline_suffix, PipelineStage};
