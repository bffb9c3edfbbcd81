use super::{Problem, Result};
use crate::splat::SplatUniforms;

use std::borrow::Cow;
use std::fmt;

pub const VELOCITY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg16Float;
pub const DYE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const SCALAR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;

static FULLSCREEN_SHADER: &str = include_str!("../../shader/fullscreen.wgsl");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Advect,
    Divergence,
    Pressure,
    SubtractGradient,
    Splat,
    Display,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Advect,
        Stage::Divergence,
        Stage::Pressure,
        Stage::SubtractGradient,
        Stage::Splat,
        Stage::Display,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Advect => "advect",
            Stage::Divergence => "divergence",
            Stage::Pressure => "pressure",
            Stage::SubtractGradient => "subtract_gradient",
            Stage::Splat => "splat",
            Stage::Display => "display",
        }
    }

    fn fragment_source(&self) -> &'static str {
        match self {
            Stage::Advect => include_str!("../../shader/advect.wgsl"),
            Stage::Divergence => include_str!("../../shader/divergence.wgsl"),
            Stage::Pressure => include_str!("../../shader/pressure.wgsl"),
            Stage::SubtractGradient => include_str!("../../shader/subtract_gradient.wgsl"),
            Stage::Splat => include_str!("../../shader/splat.wgsl"),
            Stage::Display => include_str!("../../shader/display.wgsl"),
        }
    }

    /// The full module: the shared vertex stage followed by this stage's fragment.
    pub fn source(&self) -> String {
        format!("{}\n{}", FULLSCREEN_SHADER, self.fragment_source())
    }

    /// The bindings of group 0, in the order the fragment program declares them.
    pub fn layout_entries(&self) -> Vec<wgpu::BindGroupLayoutEntry> {
        match self {
            // uniforms, sampler, velocity_texture, source_texture
            Stage::Advect => vec![
                uniform_entry(0, false),
                sampler_entry(1),
                texture_entry(2),
                texture_entry(3),
            ],
            Stage::Divergence => vec![texture_entry(0)],
            Stage::Pressure | Stage::SubtractGradient => vec![texture_entry(0), texture_entry(1)],
            // One dynamic slot per splat.
            Stage::Splat => vec![uniform_entry(0, true), texture_entry(1)],
            Stage::Display => vec![uniform_entry(0, false), sampler_entry(1), texture_entry(2)],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Compile a stage, turning both compilation diagnostics and validation
/// errors into `ShaderCompilation`.
async fn compile(device: &wgpu::Device, stage: Stage) -> Result<wgpu::ShaderModule> {
    let label = format!("shader:{}", stage.label());
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&label),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(stage.source())),
    });
    let validation = scope.pop().await;

    let info = module.get_compilation_info().await;
    let diagnostic = info
        .messages
        .iter()
        .find(|message| message.message_type == wgpu::CompilationMessageType::Error)
        .map(|message| message.message.clone())
        .or_else(|| validation.map(|err| err.to_string()));

    match diagnostic {
        Some(message) => Err(Problem::ShaderCompilation { stage, message }),
        None => Ok(module),
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn uniform_entry(binding: u32, has_dynamic_offset: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Every compiled program, with the layouts and sampler its bind groups are
/// built against.
///
/// Nothing here depends on the surface size, so programs survive a resize.
pub struct Programs {
    pub linear_sampler: wgpu::Sampler,

    pub advection_layout: wgpu::BindGroupLayout,
    pub divergence_layout: wgpu::BindGroupLayout,
    pub pressure_layout: wgpu::BindGroupLayout,
    pub subtract_gradient_layout: wgpu::BindGroupLayout,
    pub splat_layout: wgpu::BindGroupLayout,
    pub display_layout: wgpu::BindGroupLayout,

    pub advect_velocity_pipeline: wgpu::RenderPipeline,
    pub advect_dye_pipeline: wgpu::RenderPipeline,
    pub divergence_pipeline: wgpu::RenderPipeline,
    pub pressure_pipeline: wgpu::RenderPipeline,
    pub subtract_gradient_pipeline: wgpu::RenderPipeline,
    pub splat_velocity_pipeline: wgpu::RenderPipeline,
    pub splat_dye_pipeline: wgpu::RenderPipeline,
    pub display_pipeline: wgpu::RenderPipeline,
}

impl Programs {
    pub async fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Result<Self> {
        log::debug!("🛠️ Compiling {} programs", Stage::ALL.len());

        let advect_shader = compile(device, Stage::Advect).await?;
        let divergence_shader = compile(device, Stage::Divergence).await?;
        let pressure_shader = compile(device, Stage::Pressure).await?;
        let subtract_gradient_shader = compile(device, Stage::SubtractGradient).await?;
        let splat_shader = compile(device, Stage::Splat).await?;
        let display_shader = compile(device, Stage::Display).await?;

        super::validated(device, "the program set", || {
            let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("sampler:linear"),
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                ..Default::default()
            });

            let layout = |stage: Stage| {
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("bind_group_layout:{}", stage.label())),
                    entries: &stage.layout_entries(),
                })
            };

            let advection_layout = layout(Stage::Advect);
            let divergence_layout = layout(Stage::Divergence);
            let pressure_layout = layout(Stage::Pressure);
            let subtract_gradient_layout = layout(Stage::SubtractGradient);
            let splat_layout = layout(Stage::Splat);
            let display_layout = layout(Stage::Display);

            let pipeline = |label: &str,
                            layout: &wgpu::BindGroupLayout,
                            module: &wgpu::ShaderModule,
                            format: wgpu::TextureFormat| {
                let pipeline_layout =
                    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some(&format!("pipeline_layout:{}", label)),
                        bind_group_layouts: &[layout],
                        immediate_size: 0,
                    });

                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(&format!("pipeline:{}", label)),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module,
                        entry_point: Some("vs"),
                        buffers: &[],
                        compilation_options: Default::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module,
                        entry_point: Some("fs"),
                        targets: &[Some(format.into())],
                        compilation_options: Default::default(),
                    }),
                    primitive: wgpu::PrimitiveState::default(),
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview_mask: None,
                    cache: None,
                })
            };

            let advect_velocity_pipeline = pipeline(
                "advect_velocity",
                &advection_layout,
                &advect_shader,
                VELOCITY_FORMAT,
            );
            let advect_dye_pipeline =
                pipeline("advect_dye", &advection_layout, &advect_shader, DYE_FORMAT);
            let divergence_pipeline = pipeline(
                "divergence",
                &divergence_layout,
                &divergence_shader,
                SCALAR_FORMAT,
            );
            let pressure_pipeline =
                pipeline("pressure", &pressure_layout, &pressure_shader, SCALAR_FORMAT);
            let subtract_gradient_pipeline = pipeline(
                "subtract_gradient",
                &subtract_gradient_layout,
                &subtract_gradient_shader,
                VELOCITY_FORMAT,
            );
            let splat_velocity_pipeline =
                pipeline("splat_velocity", &splat_layout, &splat_shader, VELOCITY_FORMAT);
            let splat_dye_pipeline =
                pipeline("splat_dye", &splat_layout, &splat_shader, DYE_FORMAT);
            let display_pipeline =
                pipeline("display", &display_layout, &display_shader, surface_format);

            Self {
                linear_sampler,
                advection_layout,
                divergence_layout,
                pressure_layout,
                subtract_gradient_layout,
                splat_layout,
                display_layout,
                advect_velocity_pipeline,
                advect_dye_pipeline,
                divergence_pipeline,
                pressure_pipeline,
                subtract_gradient_pipeline,
                splat_velocity_pipeline,
                splat_dye_pipeline,
                display_pipeline,
            }
        })
        .await
    }
}

/// The size of one splat slot in the dynamic uniform buffer.
pub fn splat_stride(device: &wgpu::Device) -> wgpu::BufferAddress {
    let alignment = device.limits().min_uniform_buffer_offset_alignment as wgpu::BufferAddress;
    let size = std::mem::size_of::<SplatUniforms>() as wgpu::BufferAddress;
    size.div_ceil(alignment) * alignment
}

/// Draw one full-screen triangle with `pipeline` into `target`.
pub fn draw(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    offsets: &[wgpu::DynamicOffset],
    target: &wgpu::TextureView,
) {
    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                // The triangle covers every texel.
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    });

    rpass.set_pipeline(pipeline);
    rpass.set_bind_group(0, bind_group, offsets);
    rpass.draw(0..3, 0..1);
}
