//! Runtime control surface.
//!
//! Key bindings (lowercase decreases, uppercase increases):
//! - SPACE: toggle blending
//! - f/F, g/G: gamma of seam 0 / 1
//! - o/O, p/P: blend power of seam 0 / 1
//! - k/K, l/L: luminance of seam 0 / 1
//! - z/Z, x/X: overlap of seam 0 / 1
//! - t/T: threshold
//! - c: cycle curve model
//! - arrow up/down: nudge the selected projector

use winit::keyboard::{Key, NamedKey};

use crate::blending::{
    BLEND_POWER_STEP, GAMMA_STEP, LUMINANCE_STEP, OVERLAP_STEP, THRESHOLD_STEP,
};
use crate::compositor::BlendCompositor;
use crate::config::CurveModel;
use crate::error::Result;
use crate::render::BlendBackend;

/// Pixels a projector moves per arrow key press.
pub const NUDGE_STEP: i32 = 1;

/// One tunable change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlendCommand {
    ToggleBlend,
    AdjustGamma { seam: usize, delta: f32 },
    AdjustBlendPower { seam: usize, delta: f32 },
    AdjustLuminance { seam: usize, delta: f32 },
    AdjustOverlap { seam: usize, delta: f32 },
    AdjustThreshold(f32),
    MoveSlot { index: usize, delta_y: i32 },
    CycleCurve,
}

impl BlendCommand {
    /// Apply to `compositor`. Out-of-range seams and slots are reported and
    /// leave the state unchanged.
    pub fn apply<B: BlendBackend>(&self, compositor: &mut BlendCompositor<B>) -> Result<()> {
        match *self {
            BlendCommand::ToggleBlend => {
                let enabled = compositor.toggle_blend();
                log::info!("Blending {}", if enabled { "enabled" } else { "disabled" });
            }
            BlendCommand::AdjustGamma { seam, delta } => {
                let value = compositor.adjust_gamma(seam, delta)?;
                log::info!("Seam {} gamma: {:.2}", seam, value);
            }
            BlendCommand::AdjustBlendPower { seam, delta } => {
                let value = compositor.adjust_blend_power(seam, delta)?;
                log::info!("Seam {} blend power: {:.2}", seam, value);
            }
            BlendCommand::AdjustLuminance { seam, delta } => {
                let value = compositor.adjust_luminance(seam, delta)?;
                log::info!("Seam {} luminance: {:.2}", seam, value);
            }
            BlendCommand::AdjustOverlap { seam, delta } => {
                let value = compositor.adjust_overlap(seam, delta)?;
                log::info!("Seam {} overlap: {} px", seam, value);
            }
            BlendCommand::AdjustThreshold(delta) => {
                let value = compositor.adjust_threshold(delta);
                log::info!("Threshold: {:.2}", value);
            }
            BlendCommand::MoveSlot { index, delta_y } => {
                let offset = compositor.move_slot(index, delta_y)?;
                log::info!("Projector {} height offset: {} px", index, offset);
            }
            BlendCommand::CycleCurve => {
                let next = match compositor.tunables().curve() {
                    CurveModel::Power => CurveModel::Bourke,
                    CurveModel::Bourke => CurveModel::Power,
                };
                compositor.set_curve(next);
                log::info!("Blend curve: {:?}", next);
            }
        }
        Ok(())
    }
}

/// Command bound to `key`, if any. Arrow keys act on `selected_slot`.
pub fn command_for_key(key: &Key, selected_slot: usize) -> Option<BlendCommand> {
    match key {
        Key::Named(NamedKey::Space) => Some(BlendCommand::ToggleBlend),
        Key::Named(NamedKey::ArrowUp) => Some(BlendCommand::MoveSlot {
            index: selected_slot,
            delta_y: -NUDGE_STEP,
        }),
        Key::Named(NamedKey::ArrowDown) => Some(BlendCommand::MoveSlot {
            index: selected_slot,
            delta_y: NUDGE_STEP,
        }),
        Key::Character(text) => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => command_for_char(c),
                _ => None,
            }
        }
        _ => None,
    }
}

fn command_for_char(c: char) -> Option<BlendCommand> {
    let sign = if c.is_ascii_uppercase() { 1.0 } else { -1.0 };
    let command = match c.to_ascii_lowercase() {
        'f' => BlendCommand::AdjustGamma { seam: 0, delta: sign * GAMMA_STEP },
        'g' => BlendCommand::AdjustGamma { seam: 1, delta: sign * GAMMA_STEP },
        'o' => BlendCommand::AdjustBlendPower { seam: 0, delta: sign * BLEND_POWER_STEP },
        'p' => BlendCommand::AdjustBlendPower { seam: 1, delta: sign * BLEND_POWER_STEP },
        'k' => BlendCommand::AdjustLuminance { seam: 0, delta: sign * LUMINANCE_STEP },
        'l' => BlendCommand::AdjustLuminance { seam: 1, delta: sign * LUMINANCE_STEP },
        'z' => BlendCommand::AdjustOverlap { seam: 0, delta: sign * OVERLAP_STEP },
        'x' => BlendCommand::AdjustOverlap { seam: 1, delta: sign * OVERLAP_STEP },
        't' => BlendCommand::AdjustThreshold(sign * THRESHOLD_STEP),
        'c' => BlendCommand::CycleCurve,
        _ => return None,
    };
    Some(command)
}
