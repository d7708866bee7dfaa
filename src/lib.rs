//! Projector Blend
//!
//! Splits one large canvas across several overlapping projectors and blends
//! the overlap bands so the seams disappear:
//! - Layout engine sizing the canvas and slot geometry
//! - Per-seam gamma, blend power and luminance tunables
//! - Compositor with wgpu and software render backends
//! - Blend mask export for external media servers

pub mod app;
pub mod blending;
pub mod compositor;
pub mod config;
pub mod controls;
pub mod error;
pub mod export;
pub mod layout;
pub mod render;
pub mod scene;

pub use blending::{BlendMask, BlendTunables, SeamTunables};
pub use compositor::{BlendCompositor, CaptureScope, CompositeFrame, ProjectorSlotState};
pub use config::{BlendSettings, CurveModel, Layout, Rotation};
pub use error::{BlendError, ErrorKind, Result};
pub use layout::{configure, BlendConfig};
pub use render::{BlendBackend, SoftwareBackend, WgpuBackend};
