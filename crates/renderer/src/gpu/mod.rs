//! GPU side of the engine.
//!
//! - `context` acquires a headless adapter/device and answers capability
//!   probes.
//! - `pipeline` owns the shared bind group layouts, the static quad and the
//!   per-effect render pipelines.
//! - `cache` memoizes programs by effect name and stores pass-through
//!   stand-ins for shaders that fail to build.
//! - `uniforms` lays out each effect's std140 block and serializes merged
//!   parameters into it.
//! - `resources` allocates textures, render targets and buffers, tracks them
//!   in a ledger and reads results back.
//! - `executor` drives one run through its stages.

pub(crate) mod cache;
pub(crate) mod context;
pub(crate) mod executor;
pub(crate) mod pipeline;
pub(crate) mod resources;
pub(crate) mod uniforms;

pub use context::{AdapterSummary, Capabilities};
pub use resources::LiveAllocations;
