//! Test scene drawn into the canvas by the demo.
//!
//! A gray background with a thick white grid, which makes seams easy to
//! judge, and a red ball bouncing off the canvas borders.

use glam::Vec2;
use image::{Rgba, RgbaImage};

const BACKGROUND: Rgba<u8> = Rgba([100, 100, 100, 255]);
const GRID: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BALL: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Grid spacing in pixels.
pub const GRID_SPACING: u32 = 40;
/// Grid line thickness in pixels.
pub const GRID_LINE_WIDTH: u32 = 3;

/// Bouncing ball over a grid.
#[derive(Debug, Clone)]
pub struct BouncingBallScene {
    size: Vec2,
    position: Vec2,
    velocity: Vec2,
    radius: f32,
}

impl BouncingBallScene {
    /// Scene filling a `width` x `height` canvas, ball starting at the center.
    pub fn new(width: u32, height: u32) -> Self {
        let size = Vec2::new(width as f32, height as f32);
        Self {
            size,
            position: size * 0.5,
            velocity: Vec2::new(10.0, 10.0),
            radius: 40.0,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Follow a canvas resize, keeping the ball inside.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = Vec2::new(width as f32, height as f32);
        self.position = self.position.clamp(self.min_position(), self.max_position());
    }

    fn min_position(&self) -> Vec2 {
        Vec2::splat(self.radius).min(self.size * 0.5)
    }

    fn max_position(&self) -> Vec2 {
        (self.size - Vec2::splat(self.radius)).max(self.size * 0.5)
    }

    /// Advance one frame, bouncing off the borders.
    pub fn update(&mut self) {
        self.position += self.velocity;
        let (min, max) = (self.min_position(), self.max_position());

        if self.position.x > max.x {
            self.position.x = max.x;
            self.velocity.x = -self.velocity.x;
        }
        if self.position.x < min.x {
            self.position.x = min.x;
            self.velocity.x = -self.velocity.x;
        }
        if self.position.y > max.y {
            self.position.y = max.y;
            self.velocity.y = -self.velocity.y;
        }
        if self.position.y < min.y {
            self.position.y = min.y;
            self.velocity.y = -self.velocity.y;
        }
    }

    /// Draw the scene over the whole of `canvas`.
    pub fn render(&self, canvas: &mut RgbaImage) {
        let radius_sq = self.radius * self.radius;
        for (x, y, pixel) in canvas.enumerate_pixels_mut() {
            let center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            *pixel = if center.distance_squared(self.position) <= radius_sq {
                BALL
            } else if on_grid_line(x) || on_grid_line(y) {
                GRID
            } else {
                BACKGROUND
            };
        }
    }
}

fn on_grid_line(coordinate: u32) -> bool {
    let half = GRID_LINE_WIDTH / 2;
    (coordinate + half) % GRID_SPACING < GRID_LINE_WIDTH
}
