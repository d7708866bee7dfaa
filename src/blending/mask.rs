//! Per-slot weight masks.
//!
//! A mask holds the weight the fragment stage applies at every pixel of a
//! slot, useful for inspection or for media servers that take mask images.

use glam::Vec2;

use super::{BlendTunables, SlotBlend};
use crate::layout::SlotGeometry;

/// Weights of one slot, row-major, in slot-local canvas pixels.
#[derive(Debug, Clone)]
pub struct BlendMask {
    pub slot: usize,
    pub width: u32,
    pub height: u32,
    /// Blend values 0.0-1.0.
    pub data: Vec<f32>,
}

impl BlendMask {
    /// Evaluate the blend weight at every pixel center of `slot`.
    pub fn for_slot(slot: &SlotGeometry, tunables: &BlendTunables) -> Self {
        let width = slot.source.width.max(0.0) as u32;
        let height = slot.source.height.max(0.0) as u32;
        let size = slot.source.size();

        let blend = SlotBlend {
            edges: slot.edges,
            leading: slot.leading_seam.and_then(|i| tunables.seams().get(i)),
            trailing: slot.trailing_seam.and_then(|i| tunables.seams().get(i)),
            threshold: tunables.threshold(),
            model: tunables.curve(),
        };

        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let local = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                data.push(blend.weight_at(local, size));
            }
        }

        Self {
            slot: slot.index,
            width,
            height,
            data,
        }
    }

    pub fn value(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get((y * self.width + x) as usize).copied()
    }
}
