//! GPU blend backend built on wgpu.

use std::sync::Arc;

use super::{quad_vertices, BlendBackend, SeamParams, SlotUniforms, Vertex};
use crate::compositor::CompositeFrame;
use crate::error::{BlendError, Result};

/// Canvas texture format. Linear so weights scale stored values directly.
pub const CANVAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Canvas access handed to the consumer between bind and unbind.
///
/// Encode render passes against [`view`](Self::view) with `LoadOp::Load` on
/// [`encoder`](Self::encoder), or upload CPU pixels with
/// [`write_rgba`](Self::write_rgba). Uploads land before the encoded passes.
pub struct CanvasCapture {
    encoder: wgpu::CommandEncoder,
    view: wgpu::TextureView,
    pending_upload: Option<Vec<u8>>,
    width: u32,
    height: u32,
}

impl CanvasCapture {
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        &mut self.encoder
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        CANVAS_FORMAT
    }

    /// Queue tightly packed RGBA8 pixels covering the whole canvas.
    pub fn write_rgba(&mut self, pixels: &[u8]) -> Result<()> {
        let expected = (self.width * self.height * 4) as usize;
        if pixels.len() != expected {
            return Err(BlendError::Backend(format!(
                "canvas upload has {} bytes, expected {}",
                pixels.len(),
                expected
            )));
        }
        self.pending_upload = Some(pixels.to_vec());
        Ok(())
    }
}

/// GPU resources that live from configure until reconfiguration.
struct CanvasResources {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    seam_buffer: wgpu::Buffer,
    seam_capacity: usize,
    canvas_bind_group: wgpu::BindGroup,
    slot_buffers: Vec<wgpu::Buffer>,
    slot_bind_groups: Vec<wgpu::BindGroup>,
    vertex_buffer: wgpu::Buffer,
    width: u32,
    height: u32,
}

struct OutputTarget {
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// wgpu implementation of [`BlendBackend`].
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::RenderPipeline,
    canvas_layout: wgpu::BindGroupLayout,
    slot_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    resources: Option<CanvasResources>,
    capture: Option<CanvasCapture>,
    output: Option<OutputTarget>,
}

impl WgpuBackend {
    /// Build the blend program for an output of `output_format`.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        output_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blend Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blend.wgsl").into()),
        });

        let canvas_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blend Canvas Bind Group Layout"),
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
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let slot_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blend Slot Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blend Pipeline Layout"),
            bind_group_layouts: &[&canvas_layout, &slot_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Blend Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[Vertex::LAYOUT],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: output_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Blend Canvas Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            device,
            queue,
            pipeline,
            canvas_layout,
            slot_layout,
            sampler,
            resources: None,
            capture: None,
            output: None,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Set the render target for the next [`BlendBackend::draw`].
    pub fn set_output(&mut self, view: wgpu::TextureView, width: u32, height: u32) {
        self.output = Some(OutputTarget {
            view,
            width,
            height,
        });
    }

    /// Drop the output target, e.g. before presenting a surface texture.
    pub fn clear_output(&mut self) {
        self.output = None;
    }

    fn create_resources(
        &self,
        width: u32,
        height: u32,
        seam_count: usize,
        slot_count: usize,
    ) -> CanvasResources {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Blend Canvas Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CANVAS_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Storage bindings cannot be empty.
        let seam_capacity = seam_count.max(1);
        let seam_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Blend Seam Params"),
            size: (seam_capacity * std::mem::size_of::<SeamParams>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let canvas_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Blend Canvas Bind Group"),
            layout: &self.canvas_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: seam_buffer.as_entire_binding(),
                },
            ],
        });

        let slot_buffers: Vec<wgpu::Buffer> = (0..slot_count)
            .map(|i| {
                self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("Blend Slot {} Uniforms", i)),
                    size: std::mem::size_of::<SlotUniforms>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            })
            .collect();

        let slot_bind_groups = slot_buffers
            .iter()
            .enumerate()
            .map(|(i, buffer)| {
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("Blend Slot {} Bind Group", i)),
                    layout: &self.slot_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                })
            })
            .collect();

        let vertex_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Blend Quad Vertices"),
            size: (slot_count.max(1) * 6 * std::mem::size_of::<Vertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        CanvasResources {
            texture,
            view,
            seam_buffer,
            seam_capacity,
            canvas_bind_group,
            slot_buffers,
            slot_bind_groups,
            vertex_buffer,
            width,
            height,
        }
    }
}

impl BlendBackend for WgpuBackend {
    type Surface = CanvasCapture;

    fn allocate(
        &mut self,
        canvas_width: u32,
        canvas_height: u32,
        seam_count: usize,
        slot_count: usize,
    ) -> Result<()> {
        let limit = self.device.limits().max_texture_dimension_2d;
        if canvas_width == 0 || canvas_height == 0 || canvas_width > limit || canvas_height > limit {
            return Err(BlendError::Backend(format!(
                "canvas {}x{} outside the supported 1..={} range",
                canvas_width, canvas_height, limit
            )));
        }

        self.resources = Some(self.create_resources(
            canvas_width,
            canvas_height,
            seam_count,
            slot_count,
        ));
        log::info!(
            "Created blend canvas {}x{} ({} seams)",
            canvas_width,
            canvas_height,
            seam_count
        );
        Ok(())
    }

    fn release(&mut self) {
        self.capture = None;
        if let Some(resources) = self.resources.take() {
            resources.texture.destroy();
            resources.seam_buffer.destroy();
            resources.vertex_buffer.destroy();
            for buffer in &resources.slot_buffers {
                buffer.destroy();
            }
            log::debug!("Released blend canvas {}x{}", resources.width, resources.height);
        }
    }

    fn bind_canvas(&mut self, clear_color: [f32; 4]) -> Result<()> {
        let resources = self.resources.as_ref().ok_or(BlendError::NotConfigured)?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Blend Canvas Clear"),
            });
        {
            let [r, g, b, a] = clear_color.map(f64::from);
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Blend Canvas Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &resources.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        // Submitted now so later uploads are not overwritten by the clear.
        self.queue.submit(std::iter::once(encoder.finish()));

        self.capture = Some(CanvasCapture {
            encoder: self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Blend Canvas Capture"),
                }),
            view: resources
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
            pending_upload: None,
            width: resources.width,
            height: resources.height,
        });
        Ok(())
    }

    fn surface(&mut self) -> Result<&mut CanvasCapture> {
        self.capture.as_mut().ok_or(BlendError::NotCapturing)
    }

    fn unbind_canvas(&mut self) {
        let Some(capture) = self.capture.take() else {
            return;
        };
        let Some(resources) = &self.resources else {
            return;
        };

        if let Some(pixels) = capture.pending_upload {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &resources.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(capture.width * 4),
                    rows_per_image: Some(capture.height),
                },
                wgpu::Extent3d {
                    width: capture.width,
                    height: capture.height,
                    depth_or_array_layers: 1,
                },
            );
        }
        self.queue.submit(std::iter::once(capture.encoder.finish()));
    }

    fn draw(&mut self, frame: &CompositeFrame) -> Result<()> {
        if self.capture.is_some() {
            return Err(BlendError::Backend(
                "cannot composite while the canvas is the render target".to_string(),
            ));
        }
        let resources = self.resources.as_ref().ok_or(BlendError::NotConfigured)?;
        let output = self.output.as_ref().ok_or(BlendError::NoOutputTarget)?;
        if frame.quads.len() > resources.slot_buffers.len() {
            return Err(BlendError::Backend(format!(
                "{} quads planned but only {} slot buffers allocated",
                frame.quads.len(),
                resources.slot_buffers.len()
            )));
        }

        let mut seams = SeamParams::from_frame(frame);
        seams.truncate(resources.seam_capacity);
        if !seams.is_empty() {
            self.queue
                .write_buffer(&resources.seam_buffer, 0, bytemuck::cast_slice(&seams));
        }

        let vertices: Vec<Vertex> = frame.quads.iter().flat_map(quad_vertices).collect();
        self.queue
            .write_buffer(&resources.vertex_buffer, 0, bytemuck::cast_slice(&vertices));

        for (quad, buffer) in frame.quads.iter().zip(&resources.slot_buffers) {
            let uniforms = SlotUniforms::new(frame, quad, (output.width, output.height));
            self.queue
                .write_buffer(buffer, 0, bytemuck::bytes_of(&uniforms));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Blend Composite Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Blend Composite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &output.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &resources.canvas_bind_group, &[]);
            pass.set_vertex_buffer(0, resources.vertex_buffer.slice(..));
            for (i, bind_group) in resources
                .slot_bind_groups
                .iter()
                .take(frame.quads.len())
                .enumerate()
            {
                let first = (i * 6) as u32;
                pass.set_bind_group(1, bind_group, &[]);
                pass.draw(first..first + 6, 0..1);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

impl Drop for WgpuBackend {
    fn drop(&mut self) {
        self.release();
    }
}
