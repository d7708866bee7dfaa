//! Render backends for the blend compositor.
//!
//! The compositor never talks to a graphics API directly. It plans a
//! [`CompositeFrame`] and hands it to a [`BlendBackend`], which owns the canvas
//! texture and the blend program.

mod pipeline;
mod software;

pub use pipeline::{CanvasCapture, WgpuBackend, CANVAS_FORMAT};
pub use software::{RenderTarget, SoftwareBackend};

use crate::compositor::{CompositeFrame, DrawMode, QuadDraw};
use crate::error::Result;

/// Canvas owner and draw-call sink used by [`crate::BlendCompositor`].
pub trait BlendBackend {
    /// What the consumer draws into while the canvas is captured.
    type Surface;

    /// Allocate the canvas and blend program. Called after [`release`](Self::release).
    fn allocate(
        &mut self,
        canvas_width: u32,
        canvas_height: u32,
        seam_count: usize,
        slot_count: usize,
    ) -> Result<()>;

    /// Free the canvas and program. Safe to call when nothing is allocated.
    fn release(&mut self);

    /// Make the canvas the active render target and clear it.
    fn bind_canvas(&mut self, clear_color: [f32; 4]) -> Result<()>;

    /// Consumer surface for the bound canvas.
    fn surface(&mut self) -> Result<&mut Self::Surface>;

    /// Restore the render target active before [`bind_canvas`](Self::bind_canvas).
    fn unbind_canvas(&mut self);

    /// Issue the draw calls of `frame` against the current render target.
    fn draw(&mut self, frame: &CompositeFrame) -> Result<()>;
}

/// Vertex format for slot quads.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Screen position in pixels.
    pub position: [f32; 2],
    /// Canvas position in pixels.
    pub uv: [f32; 2],
}

impl Vertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            },
            wgpu::VertexAttribute {
                offset: 8,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    };

    pub fn new(position: [f32; 2], uv: [f32; 2]) -> Self {
        Self { position, uv }
    }
}

/// Two triangles covering `quad`.
pub fn quad_vertices(quad: &QuadDraw) -> [Vertex; 6] {
    let corners = quad.corners();
    let origin = quad.source.origin();
    let size = quad.source.size();
    let uvs = [
        origin,
        origin + glam::Vec2::new(size.x, 0.0),
        origin + size,
        origin + glam::Vec2::new(0.0, size.y),
    ];
    let v = |i: usize| Vertex::new(corners[i].to_array(), uvs[i].to_array());
    [v(0), v(1), v(2), v(0), v(2), v(3)]
}

/// Per-draw uniforms of the blend shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SlotUniforms {
    /// [viewport width, viewport height, canvas width, canvas height]
    pub target: [f32; 4],
    /// [texture offset x, texture offset y, slot width, slot height]
    pub slot: [f32; 4],
    /// Overlap extents: [left, top, right, bottom]
    pub overlap: [f32; 4],
    /// [leading seam, trailing seam, threshold, mode]; seam -1 means none,
    /// mode 0 is pass-through, otherwise the curve model index.
    pub params: [f32; 4],
}

impl SlotUniforms {
    pub fn new(frame: &CompositeFrame, quad: &QuadDraw, viewport: (u32, u32)) -> Self {
        let seam = |index: Option<usize>| index.map(|i| i as f32).unwrap_or(-1.0);
        let mode = match frame.mode {
            DrawMode::PassThrough => 0.0,
            DrawMode::Blend => frame.curve.shader_index() as f32,
        };

        Self {
            target: [
                viewport.0 as f32,
                viewport.1 as f32,
                frame.canvas_size.0 as f32,
                frame.canvas_size.1 as f32,
            ],
            slot: [
                quad.source.x,
                quad.source.y,
                quad.source.width,
                quad.source.height,
            ],
            overlap: quad.edges.to_array(),
            params: [
                seam(quad.leading_seam),
                seam(quad.trailing_seam),
                frame.threshold,
                mode,
            ],
        }
    }
}

/// Per-seam curve parameters in the shader's storage array.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SeamParams {
    /// [gamma, blend power, luminance, 0]
    pub curve: [f32; 4],
}

impl SeamParams {
    pub fn from_frame(frame: &CompositeFrame) -> Vec<Self> {
        frame
            .seams
            .iter()
            .map(|seam| Self {
                curve: [seam.gamma, seam.blend_power, seam.luminance, 0.0],
            })
            .collect()
    }
}
