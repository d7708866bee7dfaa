//! Axis and quarter-turn primitives used to place slots on the canvas and on screen.

use glam::{Affine2, Mat2, Vec2};

use crate::config::{Layout, Rotation};

/// Canvas axis along which slots are tiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    /// Component of `v` along this axis.
    pub fn pick(self, v: Vec2) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
        }
    }

    pub fn unit(self) -> Vec2 {
        match self {
            Axis::X => Vec2::X,
            Axis::Y => Vec2::Y,
        }
    }
}

impl From<Layout> for Axis {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::Horizontal => Axis::X,
            Layout::Vertical => Axis::Y,
        }
    }
}

/// Rotation of a slot quad in 90 degree steps, screen space y-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuarterTurn {
    Zero,
    Clockwise,
    CounterClockwise,
}

impl From<Rotation> for QuarterTurn {
    fn from(rotation: Rotation) -> Self {
        match rotation {
            Rotation::None => QuarterTurn::Zero,
            Rotation::RotatedRight => QuarterTurn::Clockwise,
            Rotation::RotatedLeft => QuarterTurn::CounterClockwise,
        }
    }
}

impl QuarterTurn {
    /// Size on screen of a quad of `size` after the turn.
    pub fn footprint(self, size: Vec2) -> Vec2 {
        match self {
            QuarterTurn::Zero => size,
            QuarterTurn::Clockwise | QuarterTurn::CounterClockwise => Vec2::new(size.y, size.x),
        }
    }

    /// Rotation about the quad origin, translated so the turned quad covers
    /// `[0, footprint.x] x [0, footprint.y]`.
    pub fn anchored(self, size: Vec2) -> Affine2 {
        match self {
            QuarterTurn::Zero => Affine2::IDENTITY,
            // (x, y) -> (h - y, x)
            QuarterTurn::Clockwise => Affine2::from_mat2_translation(
                Mat2::from_cols(Vec2::new(0.0, 1.0), Vec2::new(-1.0, 0.0)),
                Vec2::new(size.y, 0.0),
            ),
            // (x, y) -> (y, w - x)
            QuarterTurn::CounterClockwise => Affine2::from_mat2_translation(
                Mat2::from_cols(Vec2::new(0.0, -1.0), Vec2::new(1.0, 0.0)),
                Vec2::new(0.0, size.x),
            ),
        }
    }
}

/// Axis-aligned rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn origin(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }
}

/// Overlap band width on each edge of a slot, in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EdgeOverlaps {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl EdgeOverlaps {
    /// Place the leading/trailing widths on the edges crossed by `axis`.
    pub fn along(axis: Axis, leading: f32, trailing: f32) -> Self {
        match axis {
            Axis::X => Self {
                left: leading,
                right: trailing,
                ..Default::default()
            },
            Axis::Y => Self {
                top: leading,
                bottom: trailing,
                ..Default::default()
            },
        }
    }

    /// `[left, top, right, bottom]`, the order the fragment stage expects.
    pub fn to_array(self) -> [f32; 4] {
        [self.left, self.top, self.right, self.bottom]
    }

    pub fn is_empty(&self) -> bool {
        self.left <= 0.0 && self.top <= 0.0 && self.right <= 0.0 && self.bottom <= 0.0
    }
}
