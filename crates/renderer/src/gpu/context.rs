use serde::Serialize;

use crate::error::EngineError;
use crate::types::{EngineConfig, GpuPowerPreference};

use super::pipeline::TARGET_FORMAT;

/// Adapter identity reported by the prober and in diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AdapterSummary {
    pub name: String,
    pub backend: String,
    pub device_type: String,
    pub driver: String,
    pub is_software: bool,
}

impl AdapterSummary {
    fn from_info(info: &wgpu::AdapterInfo) -> Self {
        let driver = if info.driver_info.is_empty() {
            info.driver.clone()
        } else {
            format!("{} ({})", info.driver, info.driver_info)
        };
        Self {
            name: info.name.clone(),
            backend: format!("{:?}", info.backend),
            device_type: format!("{:?}", info.device_type),
            driver,
            is_software: matches!(info.device_type, wgpu::DeviceType::Cpu),
        }
    }
}

/// Outcome of probing the platform for a usable GPU.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub supported: bool,
    /// Why rendering is unavailable; `None` when supported.
    pub reason: Option<String>,
    /// Largest accepted image edge, after any configured cap.
    pub max_texture_size: u32,
    /// Optional wgpu features the adapter offers, by name.
    pub extensions: Vec<String>,
    pub adapter: Option<AdapterSummary>,
}

impl Capabilities {
    /// Report for a platform that cannot render.
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self {
            supported: false,
            reason: Some(reason.into()),
            max_texture_size: 0,
            extensions: Vec::new(),
            adapter: None,
        }
    }
}

const REPORTED_FEATURES: &[(wgpu::Features, &str)] = &[
    (wgpu::Features::TIMESTAMP_QUERY, "timestamp_query"),
    (wgpu::Features::FLOAT32_FILTERABLE, "float32_filterable"),
    (wgpu::Features::SHADER_F16, "shader_f16"),
    (
        wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES,
        "texture_adapter_specific_format_features",
    ),
    (wgpu::Features::PUSH_CONSTANTS, "push_constants"),
    (wgpu::Features::TEXTURE_FORMAT_16BIT_NORM, "texture_format_16bit_norm"),
];

/// Headless device and queue plus the limits the engine enforces.
pub(crate) struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter: AdapterSummary,
    pub max_texture_size: u32,
}

impl GpuContext {
    /// Acquires an adapter and device without any surface.
    ///
    /// Tries a hardware adapter first and falls back to the software adapter
    /// when `allow_software` is set.
    pub(crate) fn new(config: &EngineConfig) -> Result<(Self, Capabilities), EngineError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let power_preference = match config.power {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        };
        let request = |force_fallback_adapter: bool| {
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter,
            }))
        };

        let adapter = match request(false) {
            Ok(adapter) => adapter,
            Err(hardware_err) if config.allow_software => {
                tracing::debug!(error = %hardware_err, "no hardware adapter; trying fallback");
                request(true).map_err(|err| {
                    EngineError::PlatformUnsupported(format!("no GPU adapter available: {err}"))
                })?
            }
            Err(err) => {
                return Err(EngineError::PlatformUnsupported(format!(
                    "no hardware GPU adapter available: {err}"
                )))
            }
        };

        let info = adapter.get_info();
        let summary = AdapterSummary::from_info(&info);
        if summary.is_software && !config.allow_software {
            return Err(EngineError::PlatformUnsupported(format!(
                "only a software adapter ({}) is available and software rendering is disabled",
                summary.name
            )));
        }
        tracing::debug!(
            name = %summary.name,
            backend = %summary.backend,
            device_type = %summary.device_type,
            is_software = summary.is_software,
            "selected GPU adapter"
        );

        let format_features = adapter.get_texture_format_features(TARGET_FORMAT);
        if !format_features
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING)
        {
            return Err(EngineError::PlatformUnsupported(format!(
                "{TARGET_FORMAT:?} cannot be both rendered to and sampled on {}",
                summary.name
            )));
        }

        let limits = adapter.limits();
        let max_texture_size = match config.max_texture_size {
            Some(cap) => cap.min(limits.max_texture_dimension_2d),
            None => limits.max_texture_dimension_2d,
        };
        let adapter_features = adapter.features();
        let extensions = REPORTED_FEATURES
            .iter()
            .filter(|(feature, _)| adapter_features.contains(*feature))
            .map(|(_, name)| name.to_string())
            .collect();

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("monadage device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .map_err(|err| EngineError::PlatformUnsupported(format!("failed to create device: {err}")))?;

        device.on_uncaptured_error(Box::new(|error| {
            tracing::error!(%error, "uncaptured GPU error");
        }));

        let capabilities = Capabilities {
            supported: true,
            reason: None,
            max_texture_size,
            extensions,
            adapter: Some(summary.clone()),
        };
        Ok((
            Self {
                device,
                queue,
                adapter: summary,
                max_texture_size,
            },
            capabilities,
        ))
    }
}

/// Reports whether the engine could run with `config`, without keeping the
/// device around.
pub fn probe(config: &EngineConfig) -> Capabilities {
    match GpuContext::new(config) {
        Ok((_, capabilities)) => capabilities,
        Err(EngineError::PlatformUnsupported(reason)) => Capabilities::unsupported(reason),
        Err(other) => Capabilities::unsupported(other.to_string()),
    }
}
