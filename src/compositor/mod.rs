//! Blend compositor.
//!
//! Owns the canvas through a [`BlendBackend`], brackets consumer drawing into
//! it, and composites it onto the output with one blended quad per projector.

mod frame;

pub use frame::{CompositeFrame, DrawMode, QuadDraw};

use glam::Vec2;

use crate::blending::{BlendMask, BlendTunables};
use crate::config::{BlendSettings, CurveModel, Layout, Rotation};
use crate::error::{BlendError, Result};
use crate::layout::BlendConfig;
use crate::render::BlendBackend;

/// Color the canvas is cleared to at the start of every capture.
pub const CANVAS_CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

/// Manual placement state of one projector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProjectorSlotState {
    /// Vertical screen nudge in pixels.
    pub height_offset: i32,
}

/// Splits a canvas across projectors and blends their overlaps.
pub struct BlendCompositor<B: BlendBackend> {
    backend: B,
    config: Option<BlendConfig>,
    slots: Vec<ProjectorSlotState>,
    tunables: BlendTunables,
}

impl<B: BlendBackend> BlendCompositor<B> {
    /// Create an unconfigured compositor. Call [`configure`](Self::configure) before use.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: None,
            slots: Vec::new(),
            tunables: BlendTunables::default(),
        }
    }

    /// Validate and apply a setup, reallocating the canvas.
    ///
    /// A rejected setup leaves the previous configuration, canvas and
    /// tunables in place.
    pub fn configure(
        &mut self,
        resolution_width: u32,
        resolution_height: u32,
        projector_count: i32,
        overlaps: &[f32],
        layout: Layout,
        rotation: Rotation,
    ) -> Result<&BlendConfig> {
        let config = crate::layout::configure(
            resolution_width,
            resolution_height,
            projector_count,
            overlaps,
            layout,
            rotation,
        )?;

        self.backend.release();
        self.config = None;

        let (canvas_width, canvas_height) = config.canvas_size();
        if let Err(e) = self.backend.allocate(
            canvas_width,
            canvas_height,
            config.seam_count(),
            config.projector_count(),
        ) {
            log::error!("Failed to allocate blend canvas: {}", e);
            self.slots.clear();
            return Err(e);
        }

        self.tunables.reset_overlaps(config.overlaps());
        self.tunables.set_max_overlap(config.slot_extent());
        self.slots = vec![ProjectorSlotState::default(); config.projector_count()];
        Ok(&*self.config.insert(config))
    }

    /// Apply a saved setup including seam curves, threshold and slot offsets.
    pub fn configure_from(&mut self, settings: &BlendSettings) -> Result<&BlendConfig> {
        self.configure(
            settings.resolution_width,
            settings.resolution_height,
            settings.projector_count,
            &settings.overlaps,
            settings.layout,
            settings.rotation,
        )?;

        let seam_count = self.tunables.seam_count();
        for (seam, seam_settings) in settings.seams.iter().take(seam_count).enumerate() {
            self.tunables.apply_seam_settings(seam, seam_settings)?;
        }
        self.tunables.set_threshold(settings.threshold);
        self.tunables.set_blend_enabled(settings.blend_enabled);
        self.tunables.set_curve(settings.curve);
        for (slot, &offset) in self.slots.iter_mut().zip(&settings.height_offsets) {
            slot.height_offset = offset;
        }

        self.config.as_ref().ok_or(BlendError::NotConfigured)
    }

    /// Snapshot of the live setup, `None` when unconfigured.
    pub fn settings(&self) -> Option<BlendSettings> {
        let config = self.config.as_ref()?;
        let (resolution_width, resolution_height) = config.resolution();
        Some(BlendSettings {
            resolution_width,
            resolution_height,
            projector_count: config.projector_count() as i32,
            layout: config.layout(),
            rotation: config.rotation(),
            overlaps: self.tunables.overlaps(),
            seams: self
                .tunables
                .seams()
                .iter()
                .map(|seam| seam.to_settings())
                .collect(),
            threshold: self.tunables.threshold(),
            blend_enabled: self.tunables.blend_enabled(),
            curve: self.tunables.curve(),
            height_offsets: self.slots.iter().map(|slot| slot.height_offset).collect(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    pub fn config(&self) -> Option<&BlendConfig> {
        self.config.as_ref()
    }

    pub fn tunables(&self) -> &BlendTunables {
        &self.tunables
    }

    pub fn slot_states(&self) -> &[ProjectorSlotState] {
        &self.slots
    }

    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        self.config.as_ref().map(BlendConfig::canvas_size)
    }

    pub fn display_size(&self) -> Option<(u32, u32)> {
        self.config.as_ref().map(BlendConfig::display_size)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Release the canvas and forget the configuration.
    pub fn shutdown(&mut self) {
        self.backend.release();
        self.config = None;
        self.slots.clear();
    }

    /// Bind the canvas as render target, cleared to transparent.
    ///
    /// The previous target is restored when the returned scope is dropped or
    /// [`CaptureScope::end`] is called.
    pub fn begin_capture(&mut self) -> Result<CaptureScope<'_, B>> {
        if self.config.is_none() {
            return Err(BlendError::NotConfigured);
        }
        self.backend.bind_canvas(CANVAS_CLEAR)?;
        log::debug!("Canvas capture started");
        Ok(CaptureScope {
            backend: &mut self.backend,
            open: true,
        })
    }

    /// Run `draw` against the canvas inside a capture bracket.
    pub fn capture<R>(&mut self, draw: impl FnOnce(&mut B::Surface) -> Result<R>) -> Result<R> {
        let mut scope = self.begin_capture()?;
        let result = draw(scope.surface()?);
        scope.end();
        result
    }

    /// Draw plan for the current state with the output at `origin`.
    pub fn plan_frame(&self, origin: Vec2) -> Result<CompositeFrame> {
        let config = self.config.as_ref().ok_or(BlendError::NotConfigured)?;
        let offsets: Vec<i32> = self.slots.iter().map(|slot| slot.height_offset).collect();
        Ok(CompositeFrame::plan(config, &self.tunables, &offsets, origin))
    }

    /// Draw the canvas to the current output target at `origin`.
    pub fn composite(&mut self, origin: Vec2) -> Result<()> {
        let frame = self.plan_frame(origin)?;
        self.backend.draw(&frame)
    }

    pub fn adjust_gamma(&mut self, seam: usize, delta: f32) -> Result<f32> {
        self.tunables.adjust_gamma(seam, delta)
    }

    pub fn adjust_blend_power(&mut self, seam: usize, delta: f32) -> Result<f32> {
        self.tunables.adjust_blend_power(seam, delta)
    }

    pub fn adjust_luminance(&mut self, seam: usize, delta: f32) -> Result<f32> {
        self.tunables.adjust_luminance(seam, delta)
    }

    /// Change a seam's overlap. Takes effect on the next composite; the
    /// canvas keeps its configured size. The width never exceeds the slot
    /// extent, so the live setup always reconfigures.
    pub fn adjust_overlap(&mut self, seam: usize, delta: f32) -> Result<f32> {
        let overlap = self.tunables.adjust_overlap(seam, delta)?;
        if let Some(config) = &self.config {
            let sampled = config.sampled_extent(&self.tunables.overlaps());
            let (canvas_width, canvas_height) = config.canvas_size();
            let canvas = config
                .axis()
                .pick(Vec2::new(canvas_width as f32, canvas_height as f32));
            if sampled != canvas {
                log::debug!(
                    "Slots now reach {} px of the {} px canvas; reconfigure to resize",
                    sampled,
                    canvas
                );
            }
        }
        Ok(overlap)
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.tunables.set_threshold(threshold);
    }

    pub fn adjust_threshold(&mut self, delta: f32) -> f32 {
        self.tunables.adjust_threshold(delta)
    }

    pub fn set_curve(&mut self, curve: CurveModel) {
        self.tunables.set_curve(curve);
    }

    /// Nudge projector `index` vertically, returning its new offset.
    pub fn move_slot(&mut self, index: usize, delta_y: i32) -> Result<i32> {
        let count = self.slots.len();
        let Some(slot) = self.slots.get_mut(index) else {
            log::error!(
                "Projector index {} is invalid ({} projectors configured)",
                index,
                count
            );
            return Err(BlendError::InvalidIndex { index, count });
        };
        slot.height_offset = slot.height_offset.saturating_add(delta_y);
        Ok(slot.height_offset)
    }

    pub fn set_blend_enabled(&mut self, enabled: bool) {
        self.tunables.set_blend_enabled(enabled);
    }

    pub fn toggle_blend(&mut self) -> bool {
        self.tunables.toggle_blend()
    }

    /// Weight mask of every slot for the live tunables.
    pub fn slot_masks(&self) -> Result<Vec<BlendMask>> {
        let config = self.config.as_ref().ok_or(BlendError::NotConfigured)?;
        Ok(config
            .slots(&self.tunables.overlaps())
            .iter()
            .map(|slot| BlendMask::for_slot(slot, &self.tunables))
            .collect())
    }
}

/// Open canvas capture. Restores the previous render target on drop.
pub struct CaptureScope<'a, B: BlendBackend> {
    backend: &'a mut B,
    open: bool,
}

impl<B: BlendBackend> CaptureScope<'_, B> {
    /// Surface to draw the scene into.
    pub fn surface(&mut self) -> Result<&mut B::Surface> {
        self.backend.surface()
    }

    /// Finish the capture.
    pub fn end(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.backend.unbind_canvas();
            log::debug!("Canvas capture ended");
        }
    }
}

impl<B: BlendBackend> Drop for CaptureScope<'_, B> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{RenderTarget, SoftwareBackend};
    use image::{Rgba, RgbaImage};
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn compositor() -> BlendCompositor<SoftwareBackend> {
        let mut compositor = BlendCompositor::new(SoftwareBackend::new(16, 4));
        compositor
            .configure(8, 4, 2, &[4.0], Layout::Horizontal, Rotation::None)
            .unwrap();
        compositor
    }

    fn fill(image: &mut RgbaImage) {
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            *pixel = Rgba([200, (x * 20) as u8, (y * 50) as u8, 255]);
        }
    }

    #[test]
    fn test_rejected_configure_keeps_state() {
        let mut compositor = BlendCompositor::new(SoftwareBackend::new(1920, 480));
        compositor
            .configure(640, 480, 3, &[20.0, 40.0], Layout::Vertical, Rotation::None)
            .unwrap();
        compositor.adjust_gamma(1, 0.2).unwrap();
        compositor.move_slot(2, 7).unwrap();
        let before = compositor.settings();

        for count in [0, -3] {
            let err = compositor
                .configure(640, 480, count, &[], Layout::Vertical, Rotation::None)
                .unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
        }

        assert_eq!(compositor.settings(), before);
        assert_eq!(compositor.canvas_size(), Some((640, 1380)));
        assert_eq!(
            compositor.backend().canvas().map(|c| c.dimensions()),
            Some((640, 1380))
        );
    }

    #[test]
    fn test_reconfigure_keeps_curves_and_resets_offsets() {
        let mut compositor = compositor();
        compositor.adjust_luminance(0, 0.1).unwrap();
        compositor.move_slot(1, 3).unwrap();
        compositor
            .configure(8, 4, 3, &[2.0, 2.0], Layout::Horizontal, Rotation::None)
            .unwrap();

        let tunables = compositor.tunables();
        assert!((tunables.seams()[0].luminance - 0.1).abs() < 1e-6);
        assert_eq!(tunables.seams()[1].luminance, 0.0);
        assert_eq!(tunables.overlaps(), vec![2.0, 2.0]);
        assert!(compositor.slot_states().iter().all(|s| s.height_offset == 0));
    }

    #[test]
    fn test_move_slot_out_of_range() {
        let mut compositor = BlendCompositor::new(SoftwareBackend::new(1920, 480));
        compositor
            .configure(640, 480, 3, &[20.0, 40.0], Layout::Vertical, Rotation::None)
            .unwrap();
        assert!(matches!(
            compositor.move_slot(5, 10),
            Err(BlendError::InvalidIndex { index: 5, count: 3 })
        ));
        assert_eq!(compositor.move_slot(1, -4).unwrap(), -4);
        assert_eq!(compositor.move_slot(1, -4).unwrap(), -8);
    }

    #[test]
    fn test_unconfigured_calls_fail() {
        let mut compositor = BlendCompositor::new(SoftwareBackend::new(4, 4));
        assert!(matches!(compositor.begin_capture(), Err(BlendError::NotConfigured)));
        assert!(matches!(compositor.composite(Vec2::ZERO), Err(BlendError::NotConfigured)));
        assert!(compositor.settings().is_none());
    }

    #[test]
    fn test_capture_scope_restores_target() {
        let mut compositor = compositor();
        {
            let mut scope = compositor.begin_capture().unwrap();
            assert_eq!(scope.surface().unwrap().dimensions(), (12, 4));
        }
        assert_eq!(compositor.backend().current_target(), RenderTarget::Output);

        let result = catch_unwind(AssertUnwindSafe(|| {
            let _scope = compositor.begin_capture().unwrap();
            panic!("scene draw failed");
        }));
        assert!(result.is_err());
        assert_eq!(compositor.backend().current_target(), RenderTarget::Output);

        let err = compositor
            .capture(|_| -> Result<()> { Err(BlendError::Backend("scene".into())) })
            .unwrap_err();
        assert!(matches!(err, BlendError::Backend(_)));
        assert_eq!(compositor.backend().current_target(), RenderTarget::Output);
    }

    #[test]
    fn test_capture_clears_to_transparent() {
        let mut compositor = compositor();
        compositor
            .capture(|canvas| {
                fill(canvas);
                Ok(())
            })
            .unwrap();
        compositor
            .capture(|canvas| {
                assert_eq!(*canvas.get_pixel(3, 3), Rgba([0, 0, 0, 0]));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_pass_through_matches_canvas() {
        let mut compositor = compositor();
        compositor.adjust_gamma(0, 1.0).unwrap();
        compositor.set_threshold(0.4);
        compositor.set_blend_enabled(false);
        compositor
            .capture(|canvas| {
                fill(canvas);
                Ok(())
            })
            .unwrap();
        compositor.composite(Vec2::ZERO).unwrap();

        let backend = compositor.backend();
        let canvas = backend.canvas().unwrap();
        for (x, y, pixel) in canvas.enumerate_pixels() {
            assert_eq!(backend.output().get_pixel(x, y), pixel);
        }
    }

    #[test]
    fn test_blend_darkens_bands_only() {
        let mut compositor = compositor();
        compositor
            .capture(|canvas| {
                fill(canvas);
                Ok(())
            })
            .unwrap();
        compositor.composite(Vec2::ZERO).unwrap();

        let backend = compositor.backend();
        let canvas = backend.canvas().unwrap();
        let output = backend.output();

        // Slot 0 interior and slot 1 interior are copied untouched.
        assert_eq!(output.get_pixel(1, 2), canvas.get_pixel(1, 2));
        assert_eq!(output.get_pixel(14, 1), canvas.get_pixel(10, 1));
        // Slot 0 trailing band and slot 1 leading band are attenuated.
        assert!(output.get_pixel(7, 0)[0] < 200);
        assert!(output.get_pixel(8, 0)[0] < 200);
        assert_eq!(output.get_pixel(7, 0)[3], 255);
    }

    #[test]
    fn test_composite_is_repeatable() {
        let mut compositor = compositor();
        compositor
            .capture(|canvas| {
                fill(canvas);
                Ok(())
            })
            .unwrap();
        compositor.composite(Vec2::ZERO).unwrap();
        let first = compositor.backend().output().clone();
        compositor.composite(Vec2::ZERO).unwrap();
        assert_eq!(compositor.backend().output(), &first);
    }

    #[test]
    fn test_live_overlap_edit_applies_next_composite() {
        let mut compositor = compositor();
        compositor
            .capture(|canvas| {
                fill(canvas);
                Ok(())
            })
            .unwrap();
        compositor.composite(Vec2::ZERO).unwrap();
        let before = compositor.backend().output().clone();

        assert_eq!(compositor.adjust_overlap(0, -4.0).unwrap(), 0.0);
        compositor.composite(Vec2::ZERO).unwrap();
        let after = compositor.backend().output();

        assert_ne!(after, &before);
        // No band left: the trailing pixel of slot 0 is copied as is.
        assert_eq!(after.get_pixel(7, 0), compositor.backend().canvas().unwrap().get_pixel(7, 0));
        assert_eq!(compositor.canvas_size(), Some((12, 4)));
    }

    #[test]
    fn test_settings_round_trip() {
        let mut compositor = compositor();
        compositor.adjust_blend_power(0, 0.5).unwrap();
        compositor.set_curve(CurveModel::Bourke);
        compositor.move_slot(1, -2).unwrap();
        compositor.set_threshold(0.25);
        let settings = compositor.settings().unwrap();

        let mut restored = BlendCompositor::new(SoftwareBackend::new(16, 4));
        restored.configure_from(&settings).unwrap();
        assert_eq!(restored.settings(), Some(settings));
        assert_eq!(restored.slot_states()[1].height_offset, -2);
    }

    #[test]
    fn test_slot_masks_cover_every_slot() {
        let compositor = compositor();
        let masks = compositor.slot_masks().unwrap();
        assert_eq!(masks.len(), 2);
        assert_eq!((masks[1].width, masks[1].height), (8, 4));
        assert_eq!(masks[1].value(7, 0), Some(1.0));
        assert!(masks[1].value(0, 0).unwrap() < 1.0);
    }

    #[test]
    fn test_shutdown_releases_canvas() {
        let mut compositor = compositor();
        compositor.shutdown();
        assert!(!compositor.is_configured());
        assert!(compositor.backend().canvas().is_none());
    }

    #[test]
    fn test_overlap_edits_stay_reconfigurable() {
        let mut compositor = BlendCompositor::new(SoftwareBackend::new(1280, 480));
        compositor
            .configure(640, 480, 2, &[20.0], Layout::Horizontal, Rotation::None)
            .unwrap();

        assert_eq!(compositor.adjust_overlap(0, 1000.0).unwrap(), 640.0);
        let config = compositor.config().unwrap();
        let slots = config.slots(&compositor.tunables().overlaps());
        assert!(slots[1].source.x >= 0.0);

        let settings = compositor.settings().unwrap();
        assert_eq!(settings.overlaps, vec![640.0]);
        let mut restored = BlendCompositor::new(SoftwareBackend::new(1280, 480));
        restored.configure_from(&settings).unwrap();
        assert_eq!(restored.settings(), Some(settings));
    }

    /// Software backend whose allocation can be made to fail.
    struct FlakyBackend {
        inner: SoftwareBackend,
        fail_allocate: bool,
    }

    impl BlendBackend for FlakyBackend {
        type Surface = RgbaImage;

        fn allocate(&mut self, width: u32, height: u32, seams: usize, slots: usize) -> Result<()> {
            if self.fail_allocate {
                return Err(BlendError::Backend("out of memory".into()));
            }
            self.inner.allocate(width, height, seams, slots)
        }

        fn release(&mut self) {
            self.inner.release();
        }

        fn bind_canvas(&mut self, clear_color: [f32; 4]) -> Result<()> {
            self.inner.bind_canvas(clear_color)
        }

        fn surface(&mut self) -> Result<&mut RgbaImage> {
            self.inner.surface()
        }

        fn unbind_canvas(&mut self) {
            self.inner.unbind_canvas();
        }

        fn draw(&mut self, frame: &CompositeFrame) -> Result<()> {
            self.inner.draw(frame)
        }
    }

    #[test]
    fn test_failed_allocation_leaves_no_slots() {
        let mut compositor = BlendCompositor::new(FlakyBackend {
            inner: SoftwareBackend::new(16, 4),
            fail_allocate: false,
        });
        compositor
            .configure(8, 4, 2, &[4.0], Layout::Horizontal, Rotation::None)
            .unwrap();

        compositor.backend_mut().fail_allocate = true;
        let err = compositor
            .configure(8, 4, 3, &[4.0, 4.0], Layout::Horizontal, Rotation::None)
            .unwrap_err();
        assert!(matches!(err, BlendError::Backend(_)));

        assert!(!compositor.is_configured());
        assert!(compositor.slot_states().is_empty());
        assert!(matches!(
            compositor.move_slot(1, 3),
            Err(BlendError::InvalidIndex { index: 1, count: 0 })
        ));
    }
}
