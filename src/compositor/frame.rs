//! Per-frame draw plan.
//!
//! A [`CompositeFrame`] is an immutable snapshot of everything one composite
//! needs: quad placement, texture regions, seam membership and the tunables
//! read at planning time. Backends only consume it.

use glam::{Affine2, Vec2};

use crate::blending::{BlendTunables, SeamTunables, SlotBlend};
use crate::config::CurveModel;
use crate::layout::{BlendConfig, EdgeOverlaps, Rect};

/// Whether quads are attenuated or copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    /// Whole canvas drawn unweighted, used while aligning projectors.
    PassThrough,
    Blend,
}

/// One textured quad.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadDraw {
    /// Projector slot, `None` for the pass-through quad.
    pub slot: Option<usize>,
    /// Maps slot-local canvas pixels to screen pixels.
    pub transform: Affine2,
    /// Sampled canvas region in canvas pixels.
    pub source: Rect,
    pub edges: EdgeOverlaps,
    pub leading_seam: Option<usize>,
    pub trailing_seam: Option<usize>,
}

impl QuadDraw {
    /// Screen positions of local `(0,0)`, `(w,0)`, `(w,h)` and `(0,h)`.
    pub fn corners(&self) -> [Vec2; 4] {
        let size = self.source.size();
        [
            Vec2::ZERO,
            Vec2::new(size.x, 0.0),
            size,
            Vec2::new(0.0, size.y),
        ]
        .map(|local| self.transform.transform_point2(local))
    }

    /// Axis-aligned screen rectangle covered by the quad.
    pub fn screen_bounds(&self) -> Rect {
        let corners = self.corners();
        let min = corners.iter().copied().fold(Vec2::splat(f32::MAX), Vec2::min);
        let max = corners.iter().copied().fold(Vec2::splat(f32::MIN), Vec2::max);
        Rect::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }
}

/// Everything a backend needs to draw one composite.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeFrame {
    pub mode: DrawMode,
    pub canvas_size: (u32, u32),
    pub quads: Vec<QuadDraw>,
    pub seams: Vec<SeamTunables>,
    pub threshold: f32,
    pub curve: CurveModel,
}

impl CompositeFrame {
    /// Plan the draws for `config` at `origin`.
    ///
    /// Slots are laid out left to right on screen, one physical output per
    /// slot. Rotation turns each quad inside its own screen cell and
    /// `height_offsets` nudges each cell vertically.
    pub fn plan(
        config: &BlendConfig,
        tunables: &BlendTunables,
        height_offsets: &[i32],
        origin: Vec2,
    ) -> Self {
        let (canvas_width, canvas_height) = config.canvas_size();

        let quads = if tunables.blend_enabled() {
            let (width, height) = config.single_channel_size();
            let single = Vec2::new(width as f32, height as f32);
            let turn = config.quarter_turn();
            let anchored = turn.anchored(single);
            let cell = turn.footprint(single);

            config
                .slots(&tunables.overlaps())
                .into_iter()
                .map(|slot| {
                    let nudge = height_offsets.get(slot.index).copied().unwrap_or(0) as f32;
                    let cell_origin = origin + Vec2::new(cell.x * slot.index as f32, nudge);
                    QuadDraw {
                        slot: Some(slot.index),
                        transform: Affine2::from_translation(cell_origin) * anchored,
                        source: slot.source,
                        edges: slot.edges,
                        leading_seam: slot.leading_seam,
                        trailing_seam: slot.trailing_seam,
                    }
                })
                .collect()
        } else {
            vec![QuadDraw {
                slot: None,
                transform: Affine2::from_translation(origin),
                source: Rect::new(0.0, 0.0, canvas_width as f32, canvas_height as f32),
                edges: EdgeOverlaps::default(),
                leading_seam: None,
                trailing_seam: None,
            }]
        };

        Self {
            mode: if tunables.blend_enabled() {
                DrawMode::Blend
            } else {
                DrawMode::PassThrough
            },
            canvas_size: (canvas_width, canvas_height),
            quads,
            seams: tunables.seams().to_vec(),
            threshold: tunables.threshold(),
            curve: tunables.curve(),
        }
    }

    /// Blend inputs for `quad`, resolved against this frame's seam snapshot.
    pub fn slot_blend(&self, quad: &QuadDraw) -> SlotBlend<'_> {
        SlotBlend {
            edges: quad.edges,
            leading: quad.leading_seam.and_then(|i| self.seams.get(i)),
            trailing: quad.trailing_seam.and_then(|i| self.seams.get(i)),
            threshold: self.threshold,
            model: self.curve,
        }
    }
}
