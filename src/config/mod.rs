//! Configuration and serialization module.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BlendError, Result};

/// Direction in which projector slots tile the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Horizontal,
    Vertical,
}

impl TryFrom<i32> for Layout {
    type Error = BlendError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Layout::Horizontal),
            1 => Ok(Layout::Vertical),
            other => Err(BlendError::InvalidLayout(other.to_string())),
        }
    }
}

impl FromStr for Layout {
    type Err = BlendError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "horizontal" | "h" => Ok(Layout::Horizontal),
            "vertical" | "v" => Ok(Layout::Vertical),
            _ => Err(BlendError::InvalidLayout(s.to_string())),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Horizontal => write!(f, "horizontal"),
            Layout::Vertical => write!(f, "vertical"),
        }
    }
}

/// How each projector is mounted relative to the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "left")]
    RotatedLeft,
    #[serde(rename = "right")]
    RotatedRight,
}

impl Rotation {
    /// True when the projector is turned a quarter turn, which swaps width and height.
    pub fn is_rotated(self) -> bool {
        !matches!(self, Rotation::None)
    }
}

impl TryFrom<i32> for Rotation {
    type Error = BlendError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Rotation::None),
            1 => Ok(Rotation::RotatedLeft),
            2 => Ok(Rotation::RotatedRight),
            other => Err(BlendError::InvalidRotation(other.to_string())),
        }
    }
}

impl FromStr for Rotation {
    type Err = BlendError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "normal" => Ok(Rotation::None),
            "left" | "rotated-left" => Ok(Rotation::RotatedLeft),
            "right" | "rotated-right" => Ok(Rotation::RotatedRight),
            _ => Err(BlendError::InvalidRotation(s.to_string())),
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rotation::None => write!(f, "normal"),
            Rotation::RotatedLeft => write!(f, "rotated left"),
            Rotation::RotatedRight => write!(f, "rotated right"),
        }
    }
}

/// Shape of the attenuation ramp inside an overlap band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveModel {
    /// `clamp(t^power, luminance, 1)` followed by the gamma step.
    #[default]
    Power,
    /// Two-segment curve meeting at the band midpoint, followed by the gamma step.
    Bourke,
}

impl CurveModel {
    pub fn shader_index(self) -> u32 {
        match self {
            CurveModel::Power => 1,
            CurveModel::Bourke => 2,
        }
    }
}

/// Saved blend parameters for one seam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeamSettings {
    pub gamma: f32,
    pub blend_power: f32,
    pub luminance: f32,
}

impl Default for SeamSettings {
    fn default() -> Self {
        Self {
            gamma: 0.5,
            blend_power: 1.0,
            luminance: 0.0,
        }
    }
}

/// Complete blend setup as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendSettings {
    /// Native width of one projector.
    pub resolution_width: u32,
    /// Native height of one projector.
    pub resolution_height: u32,
    pub projector_count: i32,
    pub layout: Layout,
    pub rotation: Rotation,
    /// Overlap in pixels between projector i and i + 1.
    pub overlaps: Vec<f32>,
    pub seams: Vec<SeamSettings>,
    pub threshold: f32,
    pub blend_enabled: bool,
    pub curve: CurveModel,
    /// Manual vertical nudge per projector.
    pub height_offsets: Vec<i32>,
}

impl Default for BlendSettings {
    fn default() -> Self {
        Self {
            resolution_width: 640,
            resolution_height: 480,
            projector_count: 3,
            layout: Layout::Vertical,
            rotation: Rotation::None,
            overlaps: vec![20.0, 40.0],
            seams: Vec::new(),
            threshold: 0.0,
            blend_enabled: true,
            curve: CurveModel::Power,
            height_offsets: Vec::new(),
        }
    }
}

impl BlendSettings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        log::info!("Loaded blend settings from {}", path.display());
        Ok(settings)
    }

    /// Save settings as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("Saved blend settings to {}", path.display());
        Ok(())
    }

    /// `<config dir>/projector-blend/settings.json`, falling back to the working directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("projector-blend"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("settings.json")
    }
}
