//! Layout engine: canvas sizing and per-projector slot geometry.
//!
//! Slots tile the canvas along one axis. Adjacent slots share `overlap[i]`
//! canvas pixels, so the canvas extent along the tiling axis is
//! `slot_extent * count - sum(overlaps)`.

mod transform;

use glam::Vec2;

use crate::config::{Layout, Rotation};
use crate::error::{BlendError, Result};

pub use transform::{Axis, EdgeOverlaps, QuarterTurn, Rect};

/// Overlap shared with the previous and next slot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SlotOverlap {
    pub prev: f32,
    pub next: f32,
}

/// Geometry of one projector slot for a given set of overlaps.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotGeometry {
    pub index: usize,
    pub overlap: SlotOverlap,
    /// Sampled region of the canvas, in canvas pixels.
    pub source: Rect,
    pub edges: EdgeOverlaps,
    /// Seam shared with the previous slot.
    pub leading_seam: Option<usize>,
    /// Seam shared with the next slot.
    pub trailing_seam: Option<usize>,
}

/// Validated blend setup. Immutable once produced by [`configure`].
#[derive(Debug, Clone, PartialEq)]
pub struct BlendConfig {
    resolution: (u32, u32),
    projector_count: usize,
    layout: Layout,
    rotation: Rotation,
    overlaps: Vec<f32>,
    single_channel: (u32, u32),
    canvas: (u32, u32),
    display: (u32, u32),
}

/// Validate a blend setup and derive its canvas geometry.
///
/// `overlaps` is normalized to `projector_count - 1` entries: missing values
/// become 0 and extra values are dropped.
pub fn configure(
    resolution_width: u32,
    resolution_height: u32,
    projector_count: i32,
    overlaps: &[f32],
    layout: Layout,
    rotation: Rotation,
) -> Result<BlendConfig> {
    if projector_count <= 0 {
        log::error!("Cannot initialize with {} projectors", projector_count);
        return Err(BlendError::InvalidProjectorCount(projector_count as i64));
    }
    if resolution_width == 0 || resolution_height == 0 {
        log::error!(
            "Cannot initialize with a {}x{} projector resolution",
            resolution_width,
            resolution_height
        );
        return Err(BlendError::InvalidResolution {
            width: resolution_width,
            height: resolution_height,
        });
    }

    let count = projector_count as usize;
    let seam_count = count - 1;

    if overlaps.len() < seam_count {
        log::info!(
            "Expected {} overlap values, found {}. Using 0 for the missing values.",
            seam_count,
            overlaps.len()
        );
    } else if overlaps.len() > seam_count {
        log::info!(
            "Expected {} overlap values, found {}. Ignoring the additional values.",
            seam_count,
            overlaps.len()
        );
    }

    let mut normalized: Vec<f32> = overlaps
        .iter()
        .take(seam_count)
        .enumerate()
        .map(|(seam, &width)| {
            if width.is_finite() && width >= 0.0 {
                width
            } else {
                log::warn!("Overlap {} on seam {} is not a valid width, using 0", width, seam);
                0.0
            }
        })
        .collect();
    normalized.resize(seam_count, 0.0);

    let single_channel = if rotation.is_rotated() {
        (resolution_height, resolution_width)
    } else {
        (resolution_width, resolution_height)
    };

    let axis = Axis::from(layout);
    let slot_extent = axis.pick(size_vec(single_channel));
    if let Some((seam, &width)) = normalized
        .iter()
        .enumerate()
        .find(|(_, &width)| width > slot_extent)
    {
        log::error!(
            "Overlap of {} px on seam {} is wider than the {} px slot",
            width,
            seam,
            slot_extent
        );
        return Err(BlendError::InvalidOverlap {
            seam,
            width,
            extent: slot_extent,
        });
    }

    let total_overlap: f32 = normalized.iter().sum();
    let canvas_extent = (slot_extent as f64 * count as f64 - total_overlap as f64).round();
    let display_width = u32::try_from(count)
        .ok()
        .and_then(|n| resolution_width.checked_mul(n));
    let (Some(display_width), true) = (display_width, canvas_extent <= u32::MAX as f64) else {
        log::error!(
            "A {}x{} resolution across {} projectors does not fit the canvas limits",
            resolution_width,
            resolution_height,
            count
        );
        return Err(BlendError::InvalidResolution {
            width: resolution_width,
            height: resolution_height,
        });
    };
    let canvas_extent = canvas_extent as u32;
    let canvas = match axis {
        Axis::X => (canvas_extent, single_channel.1),
        Axis::Y => (single_channel.0, canvas_extent),
    };

    let overlap_list = normalized
        .iter()
        .map(|w| w.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    log::info!(
        "Blend setup: res: {} x {} * {}, overlaps: [{}], layout: {}, rotation: {}",
        resolution_width,
        resolution_height,
        count,
        overlap_list,
        layout,
        rotation
    );

    Ok(BlendConfig {
        resolution: (resolution_width, resolution_height),
        projector_count: count,
        layout,
        rotation,
        overlaps: normalized,
        single_channel,
        canvas,
        display: (display_width, resolution_height),
    })
}

fn size_vec((width, height): (u32, u32)) -> Vec2 {
    Vec2::new(width as f32, height as f32)
}

impl BlendConfig {
    pub fn projector_count(&self) -> usize {
        self.projector_count
    }

    pub fn seam_count(&self) -> usize {
        self.projector_count - 1
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn axis(&self) -> Axis {
        Axis::from(self.layout)
    }

    pub fn quarter_turn(&self) -> QuarterTurn {
        QuarterTurn::from(self.rotation)
    }

    /// Requested per-projector resolution.
    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    /// Overlaps the canvas was sized for.
    pub fn overlaps(&self) -> &[f32] {
        &self.overlaps
    }

    /// Per-projector size in canvas space, after rotation.
    pub fn single_channel_size(&self) -> (u32, u32) {
        self.single_channel
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas
    }

    /// Size of the physical output surface, used to size the window.
    pub fn display_size(&self) -> (u32, u32) {
        self.display
    }

    /// Width of one slot along the tiling axis.
    pub fn slot_extent(&self) -> f32 {
        self.axis().pick(size_vec(self.single_channel))
    }

    /// Overlap shared with the neighbours of slot `index`.
    ///
    /// The first slot has no previous neighbour and the last slot no next
    /// one, so those sides are always 0.
    pub fn slot_overlap(&self, index: usize, overlaps: &[f32]) -> Result<SlotOverlap> {
        if index >= self.projector_count {
            return Err(BlendError::InvalidIndex {
                index,
                count: self.projector_count,
            });
        }

        let prev = if index > 0 {
            overlaps.get(index - 1).copied().unwrap_or(0.0)
        } else {
            0.0
        };
        let next = if index + 1 < self.projector_count {
            overlaps.get(index).copied().unwrap_or(0.0)
        } else {
            0.0
        };

        Ok(SlotOverlap { prev, next })
    }

    /// Geometry of every slot, in slot order, for the given overlaps.
    pub fn slots(&self, overlaps: &[f32]) -> Vec<SlotGeometry> {
        let axis = self.axis();
        let single = size_vec(self.single_channel);
        let step = axis.pick(single);
        let mut offset = 0.0;

        (0..self.projector_count)
            .map(|index| {
                let overlap = self.slot_overlap(index, overlaps).unwrap_or_default();
                let origin = axis.unit() * offset;
                let slot = SlotGeometry {
                    index,
                    overlap,
                    source: Rect::new(origin.x, origin.y, single.x, single.y),
                    edges: EdgeOverlaps::along(axis, overlap.prev, overlap.next),
                    leading_seam: (index > 0).then(|| index - 1),
                    trailing_seam: (index + 1 < self.projector_count).then_some(index),
                };
                offset += step - overlap.next;
                slot
            })
            .collect()
    }

    /// Extent along the tiling axis that the slots reach with these overlaps.
    ///
    /// Equals the canvas extent for the configured overlaps. Live overlap
    /// edits do not resize the canvas, so this drifts from it as they change.
    pub fn sampled_extent(&self, overlaps: &[f32]) -> f32 {
        self.slots(overlaps)
            .last()
            .map(|slot| self.axis().pick(slot.source.origin()) + self.slot_extent())
            .unwrap_or(0.0)
    }
}
