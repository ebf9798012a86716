use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};

use serde::Serialize;
use wgpu::util::DeviceExt;

use crate::error::EngineError;
use crate::types::SourceImage;

use super::pipeline::TARGET_FORMAT;

const BYTES_PER_PIXEL: u32 = 4;

/// Counts of GPU objects currently alive across all runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LiveAllocations {
    pub textures: usize,
    pub render_targets: usize,
    pub buffers: usize,
}

impl LiveAllocations {
    pub fn total(&self) -> usize {
        self.textures + self.render_targets + self.buffers
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[derive(Clone, Copy, Debug)]
enum AllocationKind {
    Texture,
    RenderTarget,
    Buffer,
}

#[derive(Debug, Default)]
pub(crate) struct AllocationLedger {
    textures: AtomicUsize,
    render_targets: AtomicUsize,
    buffers: AtomicUsize,
}

impl AllocationLedger {
    fn counter(&self, kind: AllocationKind) -> &AtomicUsize {
        match kind {
            AllocationKind::Texture => &self.textures,
            AllocationKind::RenderTarget => &self.render_targets,
            AllocationKind::Buffer => &self.buffers,
        }
    }

    pub fn live(&self) -> LiveAllocations {
        LiveAllocations {
            textures: self.textures.load(Ordering::SeqCst),
            render_targets: self.render_targets.load(Ordering::SeqCst),
            buffers: self.buffers.load(Ordering::SeqCst),
        }
    }
}

/// Ledger registration released on drop.
struct LedgerEntry {
    ledger: Arc<AllocationLedger>,
    kind: AllocationKind,
}

impl LedgerEntry {
    fn new(ledger: &Arc<AllocationLedger>, kind: AllocationKind) -> Self {
        ledger.counter(kind).fetch_add(1, Ordering::SeqCst);
        Self {
            ledger: Arc::clone(ledger),
            kind,
        }
    }
}

impl Drop for LedgerEntry {
    fn drop(&mut self) {
        self.ledger.counter(self.kind).fetch_sub(1, Ordering::SeqCst);
    }
}

/// Uploaded source image plus the sampler every stage reads through.
pub(crate) struct SourceTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
    _entry: LedgerEntry,
}

impl Drop for SourceTexture {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}

/// Off-screen color target sized to the active image.
pub(crate) struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    _entry: LedgerEntry,
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}

pub(crate) struct TrackedBuffer {
    pub buffer: wgpu::Buffer,
    _entry: LedgerEntry,
}

impl Drop for TrackedBuffer {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

/// Allocates per-run textures, targets and buffers and reads results back.
///
/// Every object it hands out destroys itself on drop, so a run releases its
/// GPU memory on every exit path.
pub(crate) struct ResourceManager {
    device: wgpu::Device,
    queue: wgpu::Queue,
    ledger: Arc<AllocationLedger>,
    max_texture_size: u32,
}

impl ResourceManager {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, max_texture_size: u32) -> Self {
        Self {
            device,
            queue,
            ledger: Arc::new(AllocationLedger::default()),
            max_texture_size,
        }
    }

    pub fn live(&self) -> LiveAllocations {
        self.ledger.live()
    }

    fn check_dimensions(&self, width: u32, height: u32) -> Result<(), EngineError> {
        if width > self.max_texture_size || height > self.max_texture_size {
            return Err(EngineError::ResourceExhaustion {
                width,
                height,
                reason: format!(
                    "exceeds the maximum texture dimension of {}",
                    self.max_texture_size
                ),
            });
        }
        Ok(())
    }

    /// Creates a texture inside error scopes so allocation failures come back
    /// as `ResourceExhaustion` instead of reaching the uncaptured handler.
    fn create_texture(
        &self,
        label: &str,
        width: u32,
        height: u32,
        usage: wgpu::TextureUsages,
    ) -> Result<wgpu::Texture, EngineError> {
        self.check_dimensions(width, height)?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage,
            view_formats: &[],
        });
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        let invalid = pollster::block_on(self.device.pop_error_scope());
        if let Some(error) = out_of_memory.or(invalid) {
            texture.destroy();
            return Err(EngineError::ResourceExhaustion {
                width,
                height,
                reason: error.to_string(),
            });
        }
        Ok(texture)
    }

    pub fn allocate_source_texture(&self, image: &SourceImage) -> Result<SourceTexture, EngineError> {
        let (width, height) = (image.width(), image.height());
        let texture = self.create_texture(
            "source image",
            width,
            height,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
        )?;
        self.queue.write_texture(
            texture.as_image_copy(),
            image.pixels(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * BYTES_PER_PIXEL),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("effect input sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        tracing::debug!(width, height, "uploaded source texture");
        Ok(SourceTexture {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            texture,
            sampler,
            width,
            height,
            _entry: LedgerEntry::new(&self.ledger, AllocationKind::Texture),
        })
    }

    fn allocate_render_target(
        &self,
        label: &str,
        width: u32,
        height: u32,
    ) -> Result<RenderTarget, EngineError> {
        let texture = self.create_texture(
            label,
            width,
            height,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
        )?;
        Ok(RenderTarget {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            texture,
            width,
            height,
            _entry: LedgerEntry::new(&self.ledger, AllocationKind::RenderTarget),
        })
    }

    pub fn allocate_intermediate_targets(
        &self,
        count: usize,
        width: u32,
        height: u32,
    ) -> Result<Vec<RenderTarget>, EngineError> {
        let targets = (0..count)
            .map(|index| self.allocate_render_target(&format!("intermediate {index}"), width, height))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(count, width, height, "allocated intermediate targets");
        Ok(targets)
    }

    pub fn allocate_output_target(&self, width: u32, height: u32) -> Result<RenderTarget, EngineError> {
        self.allocate_render_target("output", width, height)
    }

    pub fn create_uniform_buffer(&self, contents: &[u8]) -> TrackedBuffer {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("effect uniforms"),
            contents,
            usage: wgpu::BufferUsages::UNIFORM,
        });
        TrackedBuffer {
            buffer,
            _entry: LedgerEntry::new(&self.ledger, AllocationKind::Buffer),
        }
    }

    /// Copies the source texture into `target` unchanged.
    pub fn copy_texture(&self, source: &SourceTexture, target: &RenderTarget) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("identity copy"),
            });
        encoder.copy_texture_to_texture(
            source.texture.as_image_copy(),
            target.texture.as_image_copy(),
            wgpu::Extent3d {
                width: target.width,
                height: target.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));
    }

    /// Reads `target` back as tightly packed RGBA8 rows, top row first.
    pub fn read_back(&self, target: &RenderTarget) -> Result<Vec<u8>, EngineError> {
        let ReadbackLayout {
            unpadded_bytes_per_row,
            padded_bytes_per_row,
            buffer_size,
            packed_len,
        } = ReadbackLayout::new(target.width, target.height);

        let staging = TrackedBuffer {
            buffer: self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("readback staging"),
                size: buffer_size,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            }),
            _entry: LedgerEntry::new(&self.ledger, AllocationKind::Buffer),
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_texture_to_buffer(
            target.texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &staging.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(target.height),
                },
            },
            wgpu::Extent3d {
                width: target.width,
                height: target.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| EngineError::Readback(err.to_string()))?;
        receiver
            .recv()
            .map_err(|_| EngineError::Readback("map callback never ran".to_string()))?
            .map_err(|err| EngineError::Readback(err.to_string()))?;

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity(packed_len);
        for row in mapped.chunks_exact(padded_bytes_per_row as usize) {
            pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
        }
        drop(mapped);
        staging.buffer.unmap();
        Ok(pixels)
    }
}

/// Row sizes for copying a texture into a mappable buffer. Sizes are widened
/// before multiplying; a 32768x32768 target is 4 GiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReadbackLayout {
    unpadded_bytes_per_row: u32,
    padded_bytes_per_row: u32,
    buffer_size: u64,
    packed_len: usize,
}

impl ReadbackLayout {
    fn new(width: u32, height: u32) -> Self {
        let unpadded_bytes_per_row = width * BYTES_PER_PIXEL;
        let padded_bytes_per_row = unpadded_bytes_per_row
            .div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        Self {
            unpadded_bytes_per_row,
            padded_bytes_per_row,
            buffer_size: u64::from(padded_bytes_per_row) * u64::from(height),
            packed_len: unpadded_bytes_per_row as usize * height as usize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readback_rows_are_padded_to_copy_alignment() {
        let layout = ReadbackLayout::new(3, 2);
        assert_eq!(layout.unpadded_bytes_per_row, 12);
        assert_eq!(layout.padded_bytes_per_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        assert_eq!(layout.buffer_size, 2 * u64::from(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT));
        assert_eq!(layout.packed_len, 24);
    }

    #[test]
    fn readback_sizes_do_not_overflow_on_large_targets() {
        let layout = ReadbackLayout::new(32768, 32768);
        assert_eq!(layout.unpadded_bytes_per_row, 131_072);
        assert_eq!(layout.buffer_size, 4 * 32768 * 32768);
        assert_eq!(layout.packed_len as u64, 4 * 32768 * 32768);
    }

    #[test]
    fn ledger_entries_count_and_release() {
        let ledger = Arc::new(AllocationLedger::default());
        let texture = LedgerEntry::new(&ledger, AllocationKind::Texture);
        let targets = vec![
            LedgerEntry::new(&ledger, AllocationKind::RenderTarget),
            LedgerEntry::new(&ledger, AllocationKind::RenderTarget),
        ];
        assert_eq!(
            ledger.live(),
            LiveAllocations {
                textures: 1,
                render_targets: 2,
                buffers: 0
            }
        );
        drop(targets);
        drop(texture);
        assert!(ledger.live().is_empty());
    }
}
