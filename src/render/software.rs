//! CPU reference backend.
//!
//! Rasterizes composite frames into an `RgbaImage` with nearest sampling and
//! the same weight function as the GPU fragment stage. Used for previews and
//! for checking output without a GPU.

use glam::Vec2;
use image::{Rgba, RgbaImage};

use super::BlendBackend;
use crate::compositor::{CompositeFrame, DrawMode, QuadDraw};
use crate::error::{BlendError, Result};

/// Render target currently bound on the software backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    Output,
    Canvas,
}

/// Software implementation of [`BlendBackend`].
pub struct SoftwareBackend {
    canvas: Option<RgbaImage>,
    output: RgbaImage,
    target_stack: Vec<RenderTarget>,
}

impl SoftwareBackend {
    /// Create a backend drawing into a `width` x `height` output image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: None,
            output: RgbaImage::new(width, height),
            target_stack: vec![RenderTarget::Output],
        }
    }

    pub fn output(&self) -> &RgbaImage {
        &self.output
    }

    pub fn canvas(&self) -> Option<&RgbaImage> {
        self.canvas.as_ref()
    }

    pub fn current_target(&self) -> RenderTarget {
        self.target_stack
            .last()
            .copied()
            .unwrap_or(RenderTarget::Output)
    }

    pub fn clear_output(&mut self, color: Rgba<u8>) {
        for pixel in self.output.pixels_mut() {
            *pixel = color;
        }
    }

    /// Replace the output image with a cleared one of the given size.
    pub fn resize_output(&mut self, width: u32, height: u32) {
        self.output = RgbaImage::new(width, height);
    }

    fn rasterize(canvas: &RgbaImage, output: &mut RgbaImage, frame: &CompositeFrame, quad: &QuadDraw) {
        let size = quad.source.size();
        if size.x <= 0.0 || size.y <= 0.0 || canvas.width() == 0 || canvas.height() == 0 {
            return;
        }

        let inverse = quad.transform.inverse();
        let bounds = quad.screen_bounds();
        let x0 = bounds.x.floor().max(0.0) as u32;
        let y0 = bounds.y.floor().max(0.0) as u32;
        let x1 = ((bounds.x + bounds.width).ceil().max(0.0) as u32).min(output.width());
        let y1 = ((bounds.y + bounds.height).ceil().max(0.0) as u32).min(output.height());

        let blend = frame.slot_blend(quad);
        let max_x = canvas.width() as f32 - 1.0;
        let max_y = canvas.height() as f32 - 1.0;

        for py in y0..y1 {
            for px in x0..x1 {
                let local = inverse.transform_point2(Vec2::new(px as f32 + 0.5, py as f32 + 0.5));
                if local.x < 0.0 || local.y < 0.0 || local.x >= size.x || local.y >= size.y {
                    continue;
                }

                // Clamp-to-edge, like the GPU sampler.
                let sample = (quad.source.origin() + local).floor();
                let sx = sample.x.clamp(0.0, max_x) as u32;
                let sy = sample.y.clamp(0.0, max_y) as u32;
                let color = *canvas.get_pixel(sx, sy);

                let pixel = match frame.mode {
                    DrawMode::PassThrough => color,
                    DrawMode::Blend => weighted(color, blend.weight_at(local, size)),
                };
                output.put_pixel(px, py, pixel);
            }
        }
    }
}

fn weighted(color: Rgba<u8>, weight: f32) -> Rgba<u8> {
    let [r, g, b, a] = color.0;
    let scale = |c: u8| (c as f32 * weight).round().clamp(0.0, 255.0) as u8;
    Rgba([scale(r), scale(g), scale(b), a])
}

fn to_rgba8(color: [f32; 4]) -> Rgba<u8> {
    Rgba(color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
}

impl BlendBackend for SoftwareBackend {
    type Surface = RgbaImage;

    fn allocate(
        &mut self,
        canvas_width: u32,
        canvas_height: u32,
        seam_count: usize,
        slot_count: usize,
    ) -> Result<()> {
        log::debug!(
            "Allocating {}x{} software canvas ({} seams, {} slots)",
            canvas_width,
            canvas_height,
            seam_count,
            slot_count
        );
        self.canvas = Some(RgbaImage::new(canvas_width, canvas_height));
        Ok(())
    }

    fn release(&mut self) {
        if self.canvas.take().is_some() {
            log::debug!("Released software canvas");
        }
    }

    fn bind_canvas(&mut self, clear_color: [f32; 4]) -> Result<()> {
        let canvas = self.canvas.as_mut().ok_or(BlendError::NotConfigured)?;
        let clear = to_rgba8(clear_color);
        for pixel in canvas.pixels_mut() {
            *pixel = clear;
        }
        self.target_stack.push(RenderTarget::Canvas);
        Ok(())
    }

    fn surface(&mut self) -> Result<&mut RgbaImage> {
        if self.current_target() != RenderTarget::Canvas {
            return Err(BlendError::NotCapturing);
        }
        self.canvas.as_mut().ok_or(BlendError::NotConfigured)
    }

    fn unbind_canvas(&mut self) {
        if self.current_target() == RenderTarget::Canvas {
            self.target_stack.pop();
        }
    }

    fn draw(&mut self, frame: &CompositeFrame) -> Result<()> {
        if self.current_target() == RenderTarget::Canvas {
            return Err(BlendError::Backend(
                "cannot composite while the canvas is the render target".to_string(),
            ));
        }
        let canvas = self.canvas.as_ref().ok_or(BlendError::NotConfigured)?;
        for quad in &frame.quads {
            Self::rasterize(canvas, &mut self.output, frame, quad);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_clears_and_restores_target() {
        let mut backend = SoftwareBackend::new(4, 4);
        backend.allocate(4, 4, 0, 1).unwrap();
        backend.bind_canvas([1.0, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(backend.current_target(), RenderTarget::Canvas);
        assert_eq!(*backend.surface().unwrap().get_pixel(2, 2), Rgba([255, 0, 0, 255]));

        backend.unbind_canvas();
        assert_eq!(backend.current_target(), RenderTarget::Output);
        assert!(matches!(backend.surface(), Err(BlendError::NotCapturing)));

        // Unbalanced unbind never pops the output target.
        backend.unbind_canvas();
        assert_eq!(backend.current_target(), RenderTarget::Output);
    }

    #[test]
    fn test_bind_without_canvas_fails() {
        let mut backend = SoftwareBackend::new(4, 4);
        assert!(matches!(
            backend.bind_canvas([0.0; 4]),
            Err(BlendError::NotConfigured)
        ));
        assert_eq!(backend.current_target(), RenderTarget::Output);
    }

    #[test]
    fn test_release_drops_canvas() {
        let mut backend = SoftwareBackend::new(4, 4);
        backend.allocate(8, 2, 1, 2).unwrap();
        assert_eq!(backend.canvas().map(|c| c.dimensions()), Some((8, 2)));
        backend.release();
        assert!(backend.canvas().is_none());
    }

    #[test]
    fn test_weighted_keeps_alpha() {
        assert_eq!(weighted(Rgba([200, 100, 50, 255]), 0.5), Rgba([100, 50, 25, 255]));
        assert_eq!(weighted(Rgba([200, 100, 50, 128]), 0.0), Rgba([0, 0, 0, 128]));
    }
}
