//! Projector blend demo.
//!
//! Usage: `projector-blend [settings.json]`. Without an argument the settings
//! are read from the user config directory, falling back to defaults.

use std::path::PathBuf;

use anyhow::Context;
use projector_blend::app::BlendDemoApp;
use projector_blend::BlendSettings;
use winit::event_loop::EventLoop;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("Projector Blend starting...");

    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(BlendSettings::default_path);

    let settings = if settings_path.exists() {
        BlendSettings::load(&settings_path).unwrap_or_else(|e| {
            log::warn!("Could not read {}: {}", settings_path.display(), e);
            BlendSettings::default()
        })
    } else {
        log::info!("No settings at {}, using defaults", settings_path.display());
        BlendSettings::default()
    };

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = BlendDemoApp::new(settings, settings_path);
    event_loop.run_app(&mut app).context("Event loop error")?;

    log::info!("Projector Blend exiting");
    Ok(())
}
