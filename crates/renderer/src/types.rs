use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Adapter power preference forwarded to wgpu.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuPowerPreference {
    #[default]
    Low,
    High,
}

/// What the program cache does with an effect whose shader will not build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaderFallback {
    /// Cache an identity program under the effect name and keep going.
    #[default]
    PassThrough,
    /// Fail the run with the shader error.
    Fail,
}

/// Engine construction options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub power: GpuPowerPreference,
    /// Accept a software (fallback) adapter when no hardware adapter exists.
    pub allow_software: bool,
    pub shader_fallback: ShaderFallback,
    /// Lower cap on image dimensions than the device limit, if set.
    pub max_texture_size: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            power: GpuPowerPreference::Low,
            allow_software: true,
            shader_fallback: ShaderFallback::PassThrough,
            max_texture_size: None,
        }
    }
}

/// Decoded RGBA8 image handed to the engine. Row 0 is the top row.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl SourceImage {
    /// Wraps a tightly packed RGBA8 buffer.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, EngineError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(EngineError::InvalidImage(format!(
                "{width}x{height} RGBA8 needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Image filled with a single RGBA color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Decodes any format the `image` crate was built with.
    pub fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|err| EngineError::InvalidImage(err.to_string()))?;
        Ok(Self::from_dynamic(decoded))
    }

    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let decoded = image::open(path)
            .map_err(|err| EngineError::InvalidImage(format!("{}: {err}", path.display())))?;
        Ok(Self::from_dynamic(decoded))
    }

    fn from_dynamic(decoded: image::DynamicImage) -> Self {
        let rgba = decoded.into_rgba8();
        let (width, height) = rgba.dimensions();
        Self {
            width,
            height,
            pixels: rgba.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Output of a pipeline run.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedResult {
    #[serde(skip)]
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub byte_size: usize,
    /// Effect names in execution order.
    pub applied_effects: Vec<String>,
    /// Effects that ran as pass-through because their shader did not build.
    pub degraded_effects: Vec<String>,
    /// Read-backs of intermediate targets, one per non-final stage, when
    /// requested through [`ProcessOptions::capture_intermediates`].
    #[serde(skip)]
    pub intermediates: Vec<Vec<u8>>,
}

impl fmt::Debug for ProcessedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessedResult")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("byte_size", &self.byte_size)
            .field("applied_effects", &self.applied_effects)
            .field("degraded_effects", &self.degraded_effects)
            .field("intermediates", &self.intermediates.len())
            .finish()
    }
}

impl ProcessedResult {
    pub fn is_degraded(&self) -> bool {
        !self.degraded_effects.is_empty()
    }

    /// RGBA value at `(x, y)`, row 0 being the top row.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels
            .get(offset..offset + 4)
            .and_then(|slice| slice.try_into().ok())
    }
}

/// Shared flag checked between stages; once set, the run stops.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Per-run options for [`crate::Engine::process_with`].
#[derive(Clone, Debug, Default)]
pub struct ProcessOptions {
    pub cancel: Option<CancelToken>,
    pub capture_intermediates: bool,
}

impl ProcessOptions {
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn capturing_intermediates(mut self) -> Self {
        self.capture_intermediates = true;
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancelToken::is_cancelled)
    }
}

/// Encoded container formats supported by [`crate::export_encoded`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    #[serde(alias = "jpg")]
    Jpeg,
    Bmp,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Bmp => "bmp",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpeg",
            ExportFormat::Bmp => "bmp",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "jpg" | "jpeg" => Ok(ExportFormat::Jpeg),
            "bmp" => Ok(ExportFormat::Bmp),
            other => Err(format!(
                "unsupported export format '{other}' (expected png, jpeg or bmp)"
            )),
        }
    }
}
