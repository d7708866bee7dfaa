//! Edge blending tunables for multi-projector setups.

pub mod curve;
mod mask;

use crate::config::{CurveModel, SeamSettings};
use crate::error::{BlendError, Result};

pub use curve::{seam_weight, SlotBlend, MIN_GAMMA};
pub use mask::BlendMask;

/// Gamma change per control step.
pub const GAMMA_STEP: f32 = 0.05;
/// Blend power change per control step.
pub const BLEND_POWER_STEP: f32 = 0.05;
/// Luminance floor change per control step.
pub const LUMINANCE_STEP: f32 = 0.05;
/// Overlap width change per control step, in pixels.
pub const OVERLAP_STEP: f32 = 1.0;
/// Threshold change per control step.
pub const THRESHOLD_STEP: f32 = 0.01;

/// Blend parameters for the seam between projector i and i + 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeamTunables {
    /// Gamma applied after the ramp (below 0.5 sharpens, above softens).
    pub gamma: f32,
    /// Exponent of the ramp across the band.
    pub blend_power: f32,
    /// Minimum weight inside the band.
    pub luminance: f32,
    /// Width of the band in canvas pixels.
    pub overlap: f32,
}

impl Default for SeamTunables {
    fn default() -> Self {
        Self {
            gamma: 0.5,
            blend_power: 1.0,
            luminance: 0.0,
            overlap: 0.0,
        }
    }
}

impl SeamTunables {
    /// Weight at normalized band position `t` using this seam's curve.
    pub fn weight(&self, t: f32, threshold: f32, model: CurveModel) -> f32 {
        seam_weight(
            t,
            self.gamma,
            self.blend_power,
            self.luminance,
            threshold,
            model,
        )
    }

    pub fn apply_settings(&mut self, settings: &SeamSettings) {
        self.gamma = settings.gamma.max(MIN_GAMMA);
        self.blend_power = settings.blend_power.max(0.0);
        self.luminance = settings.luminance.clamp(0.0, 1.0);
    }

    pub fn to_settings(&self) -> SeamSettings {
        SeamSettings {
            gamma: self.gamma,
            blend_power: self.blend_power,
            luminance: self.luminance,
        }
    }
}

/// Live blend state, mutated between frames and read once per composite.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendTunables {
    seams: Vec<SeamTunables>,
    threshold: f32,
    blend_enabled: bool,
    curve: CurveModel,
    /// Widest overlap a seam may take, the slot extent along the tiling axis.
    max_overlap: f32,
}

impl Default for BlendTunables {
    fn default() -> Self {
        Self {
            seams: Vec::new(),
            threshold: 0.0,
            blend_enabled: true,
            curve: CurveModel::default(),
            max_overlap: f32::INFINITY,
        }
    }
}

impl BlendTunables {
    /// One default seam per overlap.
    pub fn new(overlaps: &[f32]) -> Self {
        let mut tunables = Self::default();
        tunables.reset_overlaps(overlaps);
        tunables
    }

    /// Resize to one seam per overlap and take the overlap widths.
    ///
    /// Curve parameters of seams that still exist are kept.
    pub fn reset_overlaps(&mut self, overlaps: &[f32]) {
        self.seams.resize(overlaps.len(), SeamTunables::default());
        for (seam, &width) in self.seams.iter_mut().zip(overlaps) {
            seam.overlap = width;
        }
    }

    pub fn seams(&self) -> &[SeamTunables] {
        &self.seams
    }

    pub fn seam_count(&self) -> usize {
        self.seams.len()
    }

    pub fn seam(&self, index: usize) -> Result<&SeamTunables> {
        let count = self.seams.len();
        self.seams
            .get(index)
            .ok_or(BlendError::InvalidSeam { index, count })
    }

    fn seam_mut(&mut self, index: usize) -> Result<&mut SeamTunables> {
        let count = self.seams.len();
        self.seams.get_mut(index).ok_or_else(|| {
            log::error!("Seam index {} is invalid ({} seams configured)", index, count);
            BlendError::InvalidSeam { index, count }
        })
    }

    /// Current overlap widths, one per seam.
    pub fn overlaps(&self) -> Vec<f32> {
        self.seams.iter().map(|seam| seam.overlap).collect()
    }

    /// Change a seam's gamma, returning the new value.
    pub fn adjust_gamma(&mut self, seam: usize, delta: f32) -> Result<f32> {
        let seam = self.seam_mut(seam)?;
        seam.gamma = (seam.gamma + delta).max(MIN_GAMMA);
        Ok(seam.gamma)
    }

    /// Change a seam's blend power, returning the new value.
    pub fn adjust_blend_power(&mut self, seam: usize, delta: f32) -> Result<f32> {
        let seam = self.seam_mut(seam)?;
        seam.blend_power = (seam.blend_power + delta).max(0.0);
        Ok(seam.blend_power)
    }

    /// Change a seam's luminance floor, returning the new value.
    pub fn adjust_luminance(&mut self, seam: usize, delta: f32) -> Result<f32> {
        let seam = self.seam_mut(seam)?;
        seam.luminance = (seam.luminance + delta).clamp(0.0, 1.0);
        Ok(seam.luminance)
    }

    /// Change a seam's overlap width, returning the new value.
    ///
    /// The width stays within `[0, max_overlap]`.
    pub fn adjust_overlap(&mut self, seam: usize, delta: f32) -> Result<f32> {
        let limit = self.max_overlap;
        let seam = self.seam_mut(seam)?;
        seam.overlap = (seam.overlap + delta).max(0.0).min(limit);
        Ok(seam.overlap)
    }

    pub fn max_overlap(&self) -> f32 {
        self.max_overlap
    }

    /// Cap live overlap edits at `limit`. Wider seams are narrowed to it.
    pub fn set_max_overlap(&mut self, limit: f32) {
        self.max_overlap = limit.max(0.0);
        for seam in &mut self.seams {
            seam.overlap = seam.overlap.min(self.max_overlap);
        }
    }

    pub fn apply_seam_settings(&mut self, seam: usize, settings: &SeamSettings) -> Result<()> {
        self.seam_mut(seam)?.apply_settings(settings);
        Ok(())
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.clamp(0.0, 1.0);
    }

    pub fn adjust_threshold(&mut self, delta: f32) -> f32 {
        self.set_threshold(self.threshold + delta);
        self.threshold
    }

    pub fn blend_enabled(&self) -> bool {
        self.blend_enabled
    }

    pub fn set_blend_enabled(&mut self, enabled: bool) {
        self.blend_enabled = enabled;
    }

    pub fn toggle_blend(&mut self) -> bool {
        self.blend_enabled = !self.blend_enabled;
        self.blend_enabled
    }

    pub fn curve(&self) -> CurveModel {
        self.curve
    }

    pub fn set_curve(&mut self, curve: CurveModel) {
        self.curve = curve;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let tunables = BlendTunables::new(&[20.0, 40.0]);
        assert_eq!(tunables.seam_count(), 2);
        assert_eq!(tunables.seams()[0].gamma, 0.5);
        assert_eq!(tunables.seams()[0].blend_power, 1.0);
        assert_eq!(tunables.seams()[0].luminance, 0.0);
        assert_eq!(tunables.overlaps(), vec![20.0, 40.0]);
        assert_eq!(tunables.threshold(), 0.0);
        assert!(tunables.blend_enabled());
    }

    #[test]
    fn test_adjustments_are_clamped() {
        let mut tunables = BlendTunables::new(&[2.0]);

        assert_eq!(tunables.adjust_overlap(0, -5.0).unwrap(), 0.0);
        assert_eq!(tunables.adjust_blend_power(0, -3.0).unwrap(), 0.0);
        assert_eq!(tunables.adjust_luminance(0, 4.0).unwrap(), 1.0);
        assert_eq!(tunables.adjust_luminance(0, -4.0).unwrap(), 0.0);
        assert_eq!(tunables.adjust_gamma(0, -1.0).unwrap(), MIN_GAMMA);
        assert_eq!(tunables.adjust_threshold(2.0), 1.0);
    }

    #[test]
    fn test_adjustments_step() {
        let mut tunables = BlendTunables::new(&[20.0, 40.0]);
        let gamma = tunables.adjust_gamma(1, GAMMA_STEP).unwrap();
        assert!((gamma - 0.55).abs() < 1e-6);
        assert_eq!(tunables.seams()[0].gamma, 0.5);

        assert_eq!(tunables.adjust_overlap(0, OVERLAP_STEP).unwrap(), 21.0);
        assert_eq!(tunables.overlaps(), vec![21.0, 40.0]);
    }

    #[test]
    fn test_invalid_seam_leaves_state_unchanged() {
        let mut tunables = BlendTunables::new(&[20.0]);
        let before = tunables.clone();
        assert!(matches!(
            tunables.adjust_gamma(1, 0.1),
            Err(BlendError::InvalidSeam { index: 1, count: 1 })
        ));
        assert_eq!(tunables, before);
    }

    #[test]
    fn test_reset_overlaps_keeps_curves() {
        let mut tunables = BlendTunables::new(&[20.0, 40.0]);
        tunables.adjust_gamma(0, 0.3).unwrap();
        tunables.reset_overlaps(&[10.0, 10.0, 10.0]);

        assert_eq!(tunables.seam_count(), 3);
        assert!((tunables.seams()[0].gamma - 0.8).abs() < 1e-6);
        assert_eq!(tunables.seams()[2], SeamTunables { overlap: 10.0, ..Default::default() });
        assert_eq!(tunables.overlaps(), vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_overlap_capped_at_limit() {
        let mut tunables = BlendTunables::new(&[20.0]);
        assert_eq!(tunables.max_overlap(), f32::INFINITY);

        tunables.set_max_overlap(640.0);
        assert_eq!(tunables.adjust_overlap(0, 1000.0).unwrap(), 640.0);
        assert_eq!(tunables.adjust_overlap(0, -1.0).unwrap(), 639.0);

        tunables.set_max_overlap(100.0);
        assert_eq!(tunables.overlaps(), vec![100.0]);
    }

    #[test]
    fn test_toggle_blend() {
        let mut tunables = BlendTunables::default();
        assert!(!tunables.toggle_blend());
        assert!(tunables.toggle_blend());
        tunables.set_blend_enabled(false);
        assert!(!tunables.blend_enabled());
    }
}
