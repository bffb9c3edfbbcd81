pub mod display;
pub mod fluid;
pub mod program;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Problem {
    #[error("No GPU context is available: {0}")]
    ContextUnavailable(String),

    #[error("The {format:?} format can’t be used as a {usage} field")]
    UnsupportedTextureFormat {
        format: wgpu::TextureFormat,
        usage: &'static str,
    },

    #[error("Cannot compile the {stage} program: {message}")]
    ShaderCompilation {
        stage: program::Stage,
        message: String,
    },

    #[error("The GPU rejected {label}: {message}")]
    Validation { label: String, message: String },
}

impl Problem {
    /// Whether the host can carry on without a simulation, showing a static
    /// background instead.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Problem::ContextUnavailable(_) | Problem::UnsupportedTextureFormat { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Problem>;

/// Find an adapter that can draw to `surface` and open a device on it.
pub async fn request_context(
    instance: &wgpu::Instance,
    surface: &wgpu::Surface<'_>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: Some(surface),
        })
        .await
        .map_err(|err| Problem::ContextUnavailable(err.to_string()))?;

    let info = adapter.get_info();
    log::info!("🖥️ Adapter: {} ({:?})", info.name, info.backend);

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("device:backdrop"),
            // Use the adapter's texture limits, so the dye grid can match large surfaces.
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            ..Default::default()
        })
        .await
        .map_err(|err| Problem::ContextUnavailable(err.to_string()))?;

    Ok((adapter, device, queue))
}

/// Check that fields of `format` can be rendered into and filtered.
pub fn check_texture_format(
    adapter: &wgpu::Adapter,
    format: wgpu::TextureFormat,
    usage: &'static str,
) -> Result<()> {
    let features = adapter.get_texture_format_features(format);
    let renderable = features
        .allowed_usages
        .contains(wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING);
    let filterable = features
        .flags
        .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE);

    if renderable && filterable {
        Ok(())
    } else {
        Err(Problem::UnsupportedTextureFormat { format, usage })
    }
}

/// Surface validation errors raised by `build` as a `Problem` rather than
/// letting the device's uncaptured-error handler panic.
pub async fn validated<T>(
    device: &wgpu::Device,
    label: &str,
    build: impl FnOnce() -> T,
) -> Result<T> {
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();

    match scope.pop().await {
        None => Ok(value),
        Some(err) => Err(Problem::Validation {
            label: label.to_string(),
            message: err.to_string(),
        }),
    }
}
