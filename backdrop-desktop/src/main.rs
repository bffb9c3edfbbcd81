use backdrop::{render, Backdrop, PointerLatch, Scheduler, Settings};

use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

// #0A0A0A, shown when the simulation can't run.
const STATIC_BACKGROUND: wgpu::Color = wgpu::Color {
    r: 10.0 / 255.0,
    g: 10.0 / 255.0,
    b: 10.0 / 255.0,
    a: 1.0,
};

fn main() -> Result<(), winit::error::EventLoopError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let settings = Arc::new(load_settings(std::env::args().nth(1)));
    let event_loop = EventLoop::new()?;
    let mut app = App::new(settings);
    event_loop.run_app(&mut app)
}

fn load_settings(path: Option<String>) -> Settings {
    let Some(path) = path else {
        return Settings::default();
    };

    match read_settings(&path) {
        Ok(settings) => {
            log::info!("⚙️ Loaded settings from {}", path);
            settings
        }
        Err(message) => {
            log::error!("Can’t use the settings in {}: {}. Using defaults.", path, message);
            Settings::default()
        }
    }
}

fn read_settings(path: &str) -> Result<Settings, String> {
    let json = std::fs::read_to_string(path).map_err(|err| err.to_string())?;
    let settings: Settings = serde_json::from_str(&json).map_err(|err| err.to_string())?;
    settings.validate()?;
    Ok(settings)
}

struct Gpu {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

enum Canvas {
    Animated {
        scheduler: Scheduler<Backdrop>,
        pointer: PointerLatch,
    },
    // The simulation couldn't start, but the surface still works.
    Static,
}

struct App {
    settings: Arc<Settings>,
    window: Option<Arc<Window>>,
    gpu: Option<Gpu>,
    canvas: Option<Canvas>,
}

impl App {
    fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            window: None,
            gpu: None,
            canvas: None,
        }
    }

    fn pointer(&self) -> Option<&PointerLatch> {
        match &self.canvas {
            Some(Canvas::Animated { pointer, .. }) => Some(pointer),
            _ => None,
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        self.gpu
            .as_ref()
            .map_or((0, 0), |gpu| (gpu.config.width, gpu.config.height))
    }

    fn shut_down(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(Canvas::Animated { scheduler, .. }) = &mut self.canvas {
            scheduler.stop();
        }
        event_loop.exit();
    }

    fn resize(&mut self, width: u32, height: u32) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };

        gpu.config.width = width.max(1);
        gpu.config.height = height.max(1);
        gpu.surface.configure(&gpu.device, &gpu.config);

        if let Some(Canvas::Animated { scheduler, .. }) = &mut self.canvas {
            scheduler.request_resize(gpu.config.width, gpu.config.height);
        }
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };

        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Skipping frame: the surface timed out");
                return;
            }
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                log::warn!("Reconfiguring the surface");
                gpu.surface.configure(&gpu.device, &gpu.config);
                return;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of memory while acquiring the surface");
                self.shut_down(event_loop);
                return;
            }
            Err(err) => {
                log::warn!("Skipping frame: {}", err);
                return;
            }
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("encoder:frame"),
            });

        let backdrop = match &mut self.canvas {
            Some(Canvas::Animated { scheduler, .. }) => scheduler.tick(),
            _ => None,
        };

        match backdrop {
            Some(backdrop) => backdrop.animate(&mut encoder, &view),
            None => clear(&mut encoder, &view, STATIC_BACKGROUND),
        }

        gpu.queue.submit(Some(encoder.finish()));
        frame.present();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match event_loop.create_window(
            Window::default_attributes()
                .with_title("Backdrop")
                .with_inner_size(winit::dpi::LogicalSize::new(1280, 800)),
        ) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Can’t open a window: {}", err);
                event_loop.exit();
                return;
            }
        };
        self.window = Some(Arc::clone(&window));

        let physical_size = window.inner_size();
        let logical_size = physical_size.to_logical::<u32>(window.scale_factor());
        log::info!("📐 Logical size: {}x{}", logical_size.width, logical_size.height);
        log::info!("📏 Physical size: {}x{}", physical_size.width, physical_size.height);

        let connected = pollster::block_on(connect(window));
        let (gpu, adapter) = match connected {
            Ok(connected) => connected,
            Err(problem) if problem.is_recoverable() => {
                log::warn!("Running without a simulation: {}", problem);
                return;
            }
            Err(problem) => {
                log::error!("{}", problem);
                event_loop.exit();
                return;
            }
        };

        let created = pollster::block_on(Backdrop::new(
            &adapter,
            &gpu.device,
            &gpu.queue,
            gpu.config.format,
            gpu.config.width,
            gpu.config.height,
            &self.settings,
        ));

        match created {
            Ok(backdrop) => {
                let pointer = backdrop.pointer();
                let mut scheduler = Scheduler::new(backdrop);
                scheduler.start();
                self.canvas = Some(Canvas::Animated { scheduler, pointer });
            }
            Err(problem) if problem.is_recoverable() => {
                log::warn!("Showing a static background: {}", problem);
                self.canvas = Some(Canvas::Static);
            }
            Err(problem) => {
                log::error!("{}", problem);
                event_loop.exit();
            }
        }

        self.gpu = Some(gpu);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Released,
                        ..
                    },
                ..
            } => self.shut_down(event_loop),

            WindowEvent::Resized(size) => self.resize(size.width, size.height),

            WindowEvent::CursorMoved { position, .. } => {
                let (width, height) = self.surface_size();
                if let Some(pointer) = self.pointer() {
                    pointer.record_move(position.x, position.y, width, height);
                }
            }

            WindowEvent::CursorLeft { .. } => {
                if let Some(pointer) = self.pointer() {
                    pointer.forget();
                }
            }

            WindowEvent::Touch(touch) => {
                let (width, height) = self.surface_size();
                if let Some(pointer) = self.pointer() {
                    match touch.phase {
                        TouchPhase::Started => pointer.forget(),
                        TouchPhase::Moved => {
                            pointer.record_move(touch.location.x, touch.location.y, width, height)
                        }
                        TouchPhase::Ended | TouchPhase::Cancelled => (),
                    }
                }
            }

            WindowEvent::RedrawRequested => self.draw(event_loop),

            _ => (),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Open a device for `window` and configure its surface.
async fn connect(window: Arc<Window>) -> render::Result<(Gpu, wgpu::Adapter)> {
    let size = window.inner_size();
    let instance = wgpu::Instance::default();
    let surface = instance
        .create_surface(window)
        .map_err(|err| render::Problem::ContextUnavailable(err.to_string()))?;

    let (adapter, device, queue) = render::request_context(&instance, &surface).await?;

    let capabilities = surface.get_capabilities(&adapter);
    // The display program writes final colors, so skip the sRGB encode.
    let format = capabilities
        .formats
        .iter()
        .copied()
        .find(|format| !format.is_srgb())
        .or_else(|| capabilities.formats.first().copied())
        .ok_or_else(|| {
            render::Problem::ContextUnavailable("the surface has no usable formats".into())
        })?;
    let alpha_mode = capabilities
        .alpha_modes
        .first()
        .copied()
        .unwrap_or(wgpu::CompositeAlphaMode::Auto);

    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: wgpu::PresentMode::Fifo,
        desired_maximum_frame_latency: 2,
        alpha_mode,
        view_formats: vec![],
    };
    surface.configure(&device, &config);
    log::info!("🖼️ Surface format: {:?}", format);

    Ok((
        Gpu {
            surface,
            config,
            device,
            queue,
        },
        adapter,
    ))
}

fn clear(encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView, color: wgpu::Color) {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("pass:static_background"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(color),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    });
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn falls_back_to_defaults_without_a_path() {
        let settings = load_settings(None);
        assert_eq!(settings.pressure_iterations, 20);
    }

    #[test]
    fn falls_back_to_defaults_for_unreadable_files() {
        let settings = load_settings(Some("/nonexistent/backdrop.json".into()));
        assert_eq!(settings.simulation_width, 128);
    }

    #[test]
    fn rejects_invalid_settings_files() {
        let path = std::env::temp_dir().join("backdrop-invalid-settings.json");
        std::fs::write(&path, r#"{ "velocityDissipation": 1.5 }"#).unwrap();

        let path = path.to_string_lossy().into_owned();
        assert!(read_settings(&path).is_err());
        assert_eq!(load_settings(Some(path)).velocity_dissipation, 0.998);
    }
}
