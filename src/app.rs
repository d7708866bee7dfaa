//! Demo application: a bouncing ball blended across projectors.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use glam::Vec2;
use image::RgbaImage;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use crate::compositor::BlendCompositor;
use crate::config::BlendSettings;
use crate::controls::command_for_key;
use crate::export::MaskExporter;
use crate::render::WgpuBackend;
use crate::scene::BouncingBallScene;

/// Window surface and device.
struct GpuState {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

impl GpuState {
    fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .context("Failed to create surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("Failed to get adapter")?;

        log::info!("Using adapter: {:?}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Blend Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("Failed to create device")?;

        // Canvas pixels are already display encoded, so skip sRGB conversion.
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("Surface reports no formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            surface,
            config,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
    }
}

/// Blend demo state.
pub struct BlendDemoApp {
    settings: BlendSettings,
    settings_path: PathBuf,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    compositor: Option<BlendCompositor<WgpuBackend>>,
    scene: BouncingBallScene,
    canvas_pixels: RgbaImage,
    selected_slot: usize,
}

impl BlendDemoApp {
    pub fn new(settings: BlendSettings, settings_path: PathBuf) -> Self {
        Self {
            settings,
            settings_path,
            window: None,
            gpu: None,
            compositor: None,
            scene: BouncingBallScene::new(1, 1),
            canvas_pixels: RgbaImage::new(1, 1),
            selected_slot: 0,
        }
    }

    fn initialize_graphics(&mut self, window: Arc<Window>) -> anyhow::Result<()> {
        let gpu = GpuState::new(window.clone())?;
        let backend = WgpuBackend::new(gpu.device.clone(), gpu.queue.clone(), gpu.config.format);
        let mut compositor = BlendCompositor::new(backend);

        if let Err(e) = compositor.configure_from(&self.settings) {
            log::warn!("Settings rejected ({}), falling back to defaults", e);
            self.settings = BlendSettings::default();
            compositor.configure_from(&self.settings)?;
        }

        let (canvas_width, canvas_height) = compositor
            .canvas_size()
            .context("Compositor has no canvas")?;
        self.scene = BouncingBallScene::new(canvas_width, canvas_height);
        self.canvas_pixels = RgbaImage::new(canvas_width, canvas_height);

        if let Some((width, height)) = compositor.display_size() {
            // Resized follows if the platform honors the request.
            let _ = window.request_inner_size(PhysicalSize::new(width, height));
        }

        self.window = Some(window);
        self.gpu = Some(gpu);
        self.compositor = Some(compositor);
        Ok(())
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        if let Some(gpu) = &mut self.gpu {
            gpu.resize(size.width, size.height);
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, key: KeyEvent) {
        if key.state != ElementState::Pressed {
            return;
        }

        match &key.logical_key {
            Key::Named(NamedKey::Escape) => {
                event_loop.exit();
                return;
            }
            Key::Character(text) => match text.as_str() {
                "s" => return self.save_settings(),
                "e" => return self.export_masks(),
                _ => {}
            },
            _ => {}
        }

        let Some(compositor) = &mut self.compositor else {
            return;
        };

        if let Some(index) = selected_projector(&key.logical_key) {
            if index < compositor.slot_states().len() {
                self.selected_slot = index;
                log::info!("Selected projector {}", index);
            }
            return;
        }

        if let Some(command) = command_for_key(&key.logical_key, self.selected_slot) {
            if let Err(e) = command.apply(compositor) {
                log::warn!("{:?} ignored: {}", command, e);
            }
        }
    }

    fn save_settings(&mut self) {
        let Some(settings) = self.compositor.as_ref().and_then(|c| c.settings()) else {
            return;
        };
        match settings.save(&self.settings_path) {
            Ok(()) => self.settings = settings,
            Err(e) => log::error!("Failed to save settings: {}", e),
        }
    }

    fn export_masks(&self) {
        let Some(compositor) = &self.compositor else {
            return;
        };
        let output_dir = self
            .settings_path
            .parent()
            .map(|dir| dir.join("masks"))
            .unwrap_or_else(|| PathBuf::from("masks"));

        let result = compositor
            .slot_masks()
            .and_then(|masks| MaskExporter::export_all_blend_masks(&masks, &output_dir, true));
        match result {
            Ok(paths) => log::info!("Exported {} blend masks to {:?}", paths.len(), output_dir),
            Err(e) => log::error!("Failed to export blend masks: {}", e),
        }
    }

    fn render_frame(&mut self) {
        let (Some(gpu), Some(compositor)) = (&mut self.gpu, &mut self.compositor) else {
            return;
        };

        self.scene.update();
        self.scene.render(&mut self.canvas_pixels);
        let pixels = self.canvas_pixels.as_raw();
        if let Err(e) = compositor.capture(|canvas| canvas.write_rgba(pixels)) {
            log::error!("Canvas capture failed: {}", e);
            return;
        }

        let output = match gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let (width, height) = (gpu.config.width, gpu.config.height);
                gpu.resize(width, height);
                return;
            }
            Err(e) => {
                log::error!("Surface error: {:?}", e);
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Output Clear Encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Output Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let target = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        compositor
            .backend_mut()
            .set_output(target, gpu.config.width, gpu.config.height);
        if let Err(e) = compositor.composite(Vec2::ZERO) {
            log::error!("Composite failed: {}", e);
        }
        compositor.backend_mut().clear_output();

        output.present();
    }
}

/// Digit keys 1-9 select a projector.
fn selected_projector(key: &Key) -> Option<usize> {
    let Key::Character(text) = key else {
        return None;
    };
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.to_digit(10).filter(|&d| d > 0).map(|d| d as usize - 1),
        _ => None,
    }
}

impl ApplicationHandler for BlendDemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title("Projector Blend")
            .with_inner_size(PhysicalSize::new(1280, 480));

        let result = event_loop
            .create_window(window_attrs)
            .context("Failed to create window")
            .and_then(|window| self.initialize_graphics(Arc::new(window)));

        if let Err(e) = result {
            log::error!("Failed to start: {:#}", e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                self.handle_resize(size);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.handle_key(event_loop, event);
            }
            WindowEvent::RedrawRequested => {
                self.render_frame();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
