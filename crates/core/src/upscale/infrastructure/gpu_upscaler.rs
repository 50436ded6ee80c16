use std::sync::Arc;

use crate::capability::domain::capability_prober::CapabilityReport;
use crate::model::domain::model_loader::ModelDescriptor;
use crate::shared::frame_surface::SurfaceHandle;
use crate::upscale::domain::frame_upscaler::{FrameUpscaler, RenderError, UpscalerBuildError};

/// Packed params matching the WGSL uniform layout (32 bytes, 8 x u32).
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct UpscaleParams {
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    dst_height: u32,
    scale: u32,
    kernel_radius: u32,
    _pad0: u32,
    _pad1: u32,
}

/// GPU resources, held behind an `Option` so `dispose` can release them
/// exactly once.
#[derive(Debug)]
struct GpuState {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    weights_buf: wgpu::Buffer,
}

/// wgpu compute upscaler bound to one source/destination surface pair.
///
/// The model's weight tensor is uploaded once at construction; each render
/// packs the source surface into an RGBA storage buffer, dispatches the
/// polyphase kernel, and reads the result back into the destination
/// surface. The destination surface is the single-writer resource of this
/// type — nothing else writes it while a job is active.
#[derive(Debug)]
pub struct GpuFrameUpscaler {
    state: Option<GpuState>,
    source: SurfaceHandle,
    destination: SurfaceHandle,
    scale: u32,
    kernel_radius: u32,
}

impl GpuFrameUpscaler {
    /// Fails closed: an unsupported capability report refuses construction
    /// before any device work happens.
    pub fn new(
        report: &CapabilityReport,
        source: SurfaceHandle,
        destination: SurfaceHandle,
        model: ModelDescriptor,
    ) -> Result<Self, UpscalerBuildError> {
        if !report.supported {
            return Err(UpscalerBuildError::Unsupported);
        }
        if model.weights.is_empty() {
            return Err(UpscalerBuildError::Model("empty weight tensor".to_string()));
        }
        let scale = model.scale_factor();
        if scale == 0 {
            return Err(UpscalerBuildError::Model(format!(
                "invalid scale {}/{}",
                model.output_scale, model.input_scale
            )));
        }

        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| UpscalerBuildError::Device("no compute adapter".to_string()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("upscale-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|e| UpscalerBuildError::Device(e.to_string()))?;

        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("upscale-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/upscale.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("upscale-bind-group-layout"),
            entries: &[
                // params uniform
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // source storage (read)
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // destination storage (read-write)
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // weights storage (read)
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("upscale-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("upscale-pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let weights_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("weights"),
            size: (model.weights.len() * 4) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&weights_buf, 0, bytemuck::cast_slice(&model.weights));

        Ok(Self {
            state: Some(GpuState {
                device,
                queue,
                pipeline,
                bind_group_layout,
                weights_buf,
            }),
            source,
            destination,
            scale,
            kernel_radius: model.kernel_size / 2,
        })
    }
}

impl FrameUpscaler for GpuFrameUpscaler {
    fn render_one_frame(&mut self) -> Result<(), RenderError> {
        let state = self.state.as_ref().ok_or(RenderError::Disposed)?;

        let (src_pixels, src_w, src_h) = {
            let src = self.source.lock().expect("source surface poisoned");
            if !src.is_sized() {
                return Err(RenderError::SourceNotReady);
            }
            (pack_rgba(src.data()), src.width(), src.height())
        };

        let dst_w = src_w * self.scale;
        let dst_h = src_h * self.scale;
        {
            let dst = self.destination.lock().expect("destination surface poisoned");
            if dst.width() != dst_w || dst.height() != dst_h {
                return Err(RenderError::DestinationMismatch {
                    expected_width: dst_w,
                    expected_height: dst_h,
                    actual_width: dst.width(),
                    actual_height: dst.height(),
                });
            }
        }

        let src_size = (src_pixels.len() * 4) as u64;
        let dst_size = (dst_w as u64) * (dst_h as u64) * 4;

        let src_buf = state.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("src"),
            size: src_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let dst_buf = state.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("dst"),
            size: dst_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging_buf = state.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging"),
            size: dst_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let params_buf = state.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("params"),
            size: std::mem::size_of::<UpscaleParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let params = UpscaleParams {
            src_width: src_w,
            src_height: src_h,
            dst_width: dst_w,
            dst_height: dst_h,
            scale: self.scale,
            kernel_radius: self.kernel_radius,
            _pad0: 0,
            _pad1: 0,
        };
        state
            .queue
            .write_buffer(&src_buf, 0, bytemuck::cast_slice(&src_pixels));
        state
            .queue
            .write_buffer(&params_buf, 0, bytemuck::bytes_of(&params));

        let bind_group = state.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("upscale-bg"),
            layout: &state.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: src_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: dst_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: state.weights_buf.as_entire_binding(),
                },
            ],
        });

        let mut encoder = state
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("upscale-enc"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("upscale"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&state.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(dst_w.div_ceil(16), dst_h.div_ceil(16), 1);
        }
        encoder.copy_buffer_to_buffer(&dst_buf, 0, &staging_buf, 0, dst_size);
        state.queue.submit(Some(encoder.finish()));

        // Read back, surfacing a lost device as a backend fault
        let slice = staging_buf.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        state.device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(RenderError::Backend(e.to_string())),
            Err(_) => return Err(RenderError::Backend("device stopped responding".to_string())),
        }

        let mapped = slice.get_mapped_range();
        let packed: &[u32] = bytemuck::cast_slice(&mapped);
        let rgb = unpack_rgba(packed);
        drop(mapped);
        staging_buf.unmap();

        let mut dst = self.destination.lock().expect("destination surface poisoned");
        dst.write_pixels(&rgb)
            .map_err(|e| RenderError::Backend(e.to_string()))?;

        Ok(())
    }

    fn dispose(&mut self) {
        // Dropping the state releases the device, queue, and buffers.
        self.state = None;
    }
}

/// Pack tight RGB24 bytes into RGBA u32 words for the storage buffer.
fn pack_rgba(rgb: &[u8]) -> Vec<u32> {
    rgb.chunks_exact(3)
        .map(|p| (p[0] as u32) | ((p[1] as u32) << 8) | ((p[2] as u32) << 16) | (0xFF << 24))
        .collect()
}

/// Unpack RGBA u32 words back into tight RGB24 bytes.
fn unpack_rgba(packed: &[u32]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(packed.len() * 3);
    for p in packed {
        rgb.push((p & 0xFF) as u8);
        rgb.push(((p >> 8) & 0xFF) as u8);
        rgb.push(((p >> 16) & 0xFF) as u8);
    }
    rgb
}
