//! Attenuation curves for overlap bands.
//!
//! Everything here is pure and evaluated per pixel. The WGSL fragment stage in
//! `render/shaders/blend.wgsl` mirrors these functions.

use glam::Vec2;

use super::SeamTunables;
use crate::config::CurveModel;
use crate::layout::EdgeOverlaps;

/// Smallest gamma the curve accepts; `1 / gamma` must stay finite.
pub const MIN_GAMMA: f32 = 0.05;

/// Weight of a fragment at normalized band position `t`.
///
/// `t` is 0 at the seam-adjacent edge of the band and 1 at its far edge.
/// The result is forced to 0 when it falls below `threshold`.
pub fn seam_weight(
    t: f32,
    gamma: f32,
    blend_power: f32,
    luminance: f32,
    threshold: f32,
    model: CurveModel,
) -> f32 {
    let t = t.clamp(0.0, 1.0);
    let power = blend_power.max(0.0);

    let ramp = match model {
        CurveModel::Power => t.powf(power).clamp(luminance.clamp(0.0, 1.0), 1.0),
        CurveModel::Bourke => {
            let a = (0.5 + luminance).clamp(0.0, 1.0);
            if t < 0.5 {
                a * (2.0 * t).powf(power)
            } else {
                1.0 - (1.0 - a) * (2.0 * (1.0 - t)).powf(power)
            }
        }
    };

    let weight = ramp.powf(1.0 / gamma.max(MIN_GAMMA));
    if weight < threshold {
        0.0
    } else {
        weight
    }
}

/// Blend inputs for one slot draw.
#[derive(Debug, Clone, Copy)]
pub struct SlotBlend<'a> {
    pub edges: EdgeOverlaps,
    /// Curve on the left/top edge.
    pub leading: Option<&'a SeamTunables>,
    /// Curve on the right/bottom edge.
    pub trailing: Option<&'a SeamTunables>,
    pub threshold: f32,
    pub model: CurveModel,
}

impl SlotBlend<'_> {
    /// Weight at `local`, a position inside a slot of `size` canvas pixels.
    ///
    /// Bands on different edges are evaluated independently and multiplied.
    pub fn weight_at(&self, local: Vec2, size: Vec2) -> f32 {
        let bands = [
            (self.edges.left, local.x, self.leading),
            (self.edges.top, local.y, self.leading),
            (self.edges.right, size.x - local.x, self.trailing),
            (self.edges.bottom, size.y - local.y, self.trailing),
        ];

        bands
            .into_iter()
            .filter(|&(width, distance, _)| width > 0.0 && distance < width)
            .filter_map(|(width, distance, seam)| seam.map(|seam| (distance / width, seam)))
            .map(|(t, seam)| seam.weight(t, self.threshold, self.model))
            .product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn power(t: f32, gamma: f32, blend_power: f32, luminance: f32) -> f32 {
        seam_weight(t, gamma, blend_power, luminance, 0.0, CurveModel::Power)
    }

    #[test]
    fn test_far_edge_is_full_weight() {
        for gamma in [0.2, 0.5, 1.0, 2.2] {
            for blend_power in [0.1, 1.0, 2.0, 5.0] {
                for luminance in [0.0, 0.3, 0.9] {
                    let w = power(1.0, gamma, blend_power, luminance);
                    assert!((w - 1.0).abs() < EPS, "{} {} {}", gamma, blend_power, luminance);
                }
            }
        }
    }

    #[test]
    fn test_seam_edge_is_luminance_floor() {
        for gamma in [0.25, 0.5, 1.0, 2.0] {
            for luminance in [0.0f32, 0.1, 0.5] {
                let expected = luminance.powf(1.0 / gamma);
                let w = power(0.0, gamma, 1.5, luminance);
                assert!((w - expected).abs() < EPS);
            }
        }
    }

    #[test]
    fn test_ramp_is_monotonic() {
        let mut last = 0.0;
        for step in 0..=20 {
            let w = power(step as f32 / 20.0, 0.5, 1.0, 0.0);
            assert!(w >= last);
            last = w;
        }
    }

    #[test]
    fn test_gamma_shapes_the_transition() {
        // Default gamma 0.5 squares the linear ramp.
        assert!((power(0.5, 0.5, 1.0, 0.0) - 0.25).abs() < EPS);
        assert!((power(0.5, 1.0, 1.0, 0.0) - 0.5).abs() < EPS);
        assert!(power(0.5, 0.3, 1.0, 0.0) < power(0.5, 0.7, 1.0, 0.0));
    }

    #[test]
    fn test_threshold_cuts_dim_fragments() {
        let w = seam_weight(0.1, 1.0, 1.0, 0.0, 0.2, CurveModel::Power);
        assert_eq!(w, 0.0);
        let w = seam_weight(0.5, 1.0, 1.0, 0.0, 0.2, CurveModel::Power);
        assert!((w - 0.5).abs() < EPS);
    }

    #[test]
    fn test_degenerate_gamma_stays_finite() {
        let w = power(0.5, 0.0, 1.0, 0.0);
        assert!(w.is_finite());
    }

    #[test]
    fn test_bourke_curve_meets_at_midpoint() {
        let below = seam_weight(0.4999, 1.0, 2.0, 0.0, 0.0, CurveModel::Bourke);
        let above = seam_weight(0.5, 1.0, 2.0, 0.0, 0.0, CurveModel::Bourke);
        assert!((below - 0.5).abs() < 1e-3);
        assert!((above - 0.5).abs() < EPS);
        assert_eq!(seam_weight(0.0, 1.0, 2.0, 0.0, 0.0, CurveModel::Bourke), 0.0);
        assert!((seam_weight(1.0, 1.0, 2.0, 0.0, 0.0, CurveModel::Bourke) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_slot_weight_outside_bands_is_one() {
        let seam = SeamTunables::default();
        let blend = SlotBlend {
            edges: EdgeOverlaps::along(crate::layout::Axis::X, 20.0, 40.0),
            leading: Some(&seam),
            trailing: Some(&seam),
            threshold: 0.0,
            model: CurveModel::Power,
        };
        let size = Vec2::new(640.0, 480.0);
        assert_eq!(blend.weight_at(Vec2::new(320.0, 240.0), size), 1.0);

        // Halfway into the leading band, linear ramp squared by gamma 0.5.
        let w = blend.weight_at(Vec2::new(10.0, 240.0), size);
        assert!((w - 0.25).abs() < EPS);

        // Halfway into the trailing band.
        let w = blend.weight_at(Vec2::new(620.0, 240.0), size);
        assert!((w - 0.25).abs() < EPS);
    }

    #[test]
    fn test_overlapping_bands_multiply() {
        let seam = SeamTunables {
            gamma: 1.0,
            ..Default::default()
        };
        let blend = SlotBlend {
            edges: EdgeOverlaps::along(crate::layout::Axis::Y, 80.0, 80.0),
            leading: Some(&seam),
            trailing: Some(&seam),
            threshold: 0.0,
            model: CurveModel::Power,
        };
        // 100 px tall slot: y = 50 is 50/80 into the top band and 50/80 into the bottom band.
        let w = blend.weight_at(Vec2::new(10.0, 50.0), Vec2::new(100.0, 100.0));
        let expected = (50.0_f32 / 80.0) * (50.0 / 80.0);
        assert!((w - expected).abs() < EPS);
    }
}
