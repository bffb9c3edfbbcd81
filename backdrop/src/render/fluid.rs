use super::program::{self, Programs, DYE_FORMAT, SCALAR_FORMAT, VELOCITY_FORMAT};
use super::Result;
use crate::double_buffer::DoubleBuffer;
use crate::grid::{Grid, Grids};
use crate::settings::{PressureMode, Settings};
use crate::splat::{Splat, SplatUniforms};
use crate::stepper::Passes;

use std::num::NonZeroU64;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct AdvectionUniforms {
    timestep: f32,      // 0
    dissipation: f32,   // 4
    _padding: [f32; 2], // 8
                        // 16
}

impl AdvectionUniforms {
    fn new(timestep: f32, dissipation: f32) -> Self {
        Self {
            timestep,
            dissipation,
            _padding: [0.0; 2],
        }
    }
}

/// A field texture and the view that passes sample from and render into.
///
/// New textures are zero-initialized by wgpu.
pub struct FieldTexture {
    texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl FieldTexture {
    pub fn allocate(
        device: &wgpu::Device,
        label: &str,
        grid: Grid,
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("texture:{}", label)),
            size: grid.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            view_formats: &[],
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&format!("view:{}", label)),
            ..Default::default()
        });

        Self { texture, view }
    }

    fn allocate_pair(
        device: &wgpu::Device,
        label: &str,
        grid: Grid,
        format: wgpu::TextureFormat,
    ) -> DoubleBuffer<Self> {
        DoubleBuffer::from_fn(|index| {
            Self::allocate(device, &format!("{}_{}", label, index), grid, format)
        })
    }

    pub fn destroy(&self) {
        self.texture.destroy();
    }
}

/// Bind groups for every combination of read indices, so that a pass only
/// has to look up the group for the current roles.
struct BindGroups {
    // [velocity]
    advect_velocity: [wgpu::BindGroup; 2],
    // [velocity][dye]
    advect_dye: [[wgpu::BindGroup; 2]; 2],
    // [velocity]
    divergence: [wgpu::BindGroup; 2],
    // [pressure]
    pressure: [wgpu::BindGroup; 2],
    // [pressure][velocity]
    subtract_gradient: [[wgpu::BindGroup; 2]; 2],
    // [velocity]
    splat_velocity: [wgpu::BindGroup; 2],
    // [dye]
    splat_dye: [wgpu::BindGroup; 2],
}

/// The GPU-resident simulation state.
pub struct Context {
    device: wgpu::Device,
    grids: Grids,

    velocity_dissipation: f32,
    dye_dissipation: f32,
    pressure_mode: PressureMode,
    splat_radius: f32,

    velocity: DoubleBuffer<FieldTexture>,
    dye: DoubleBuffer<FieldTexture>,
    pressure: DoubleBuffer<FieldTexture>,
    divergence: FieldTexture,

    advect_velocity_uniforms: wgpu::Buffer,
    advect_dye_uniforms: wgpu::Buffer,
    splat_uniforms: wgpu::Buffer,
    splat_stride: wgpu::BufferAddress,
    splat_capacity: u32,

    bind_groups: BindGroups,
}

impl Context {
    pub fn new(
        adapter: &wgpu::Adapter,
        device: &wgpu::Device,
        programs: &Programs,
        grids: Grids,
        settings: &Settings,
        splat_capacity: u32,
    ) -> Result<Self> {
        super::check_texture_format(adapter, VELOCITY_FORMAT, "velocity")?;
        super::check_texture_format(adapter, DYE_FORMAT, "dye")?;
        super::check_texture_format(adapter, SCALAR_FORMAT, "pressure")?;

        let advect_velocity_uniforms = create_advection_uniforms(
            device,
            "uniform:advect_velocity",
            settings.timestep,
            settings.velocity_dissipation,
        );
        let advect_dye_uniforms = create_advection_uniforms(
            device,
            "uniform:advect_dye",
            settings.timestep,
            settings.dye_dissipation,
        );

        let splat_stride = program::splat_stride(device);
        let splat_capacity = splat_capacity.max(1);
        let splat_uniforms = create_splat_uniforms(device, splat_stride, splat_capacity);

        let velocity =
            FieldTexture::allocate_pair(device, "velocity", grids.simulation, VELOCITY_FORMAT);
        let dye = FieldTexture::allocate_pair(device, "dye", grids.dye, DYE_FORMAT);
        let pressure =
            FieldTexture::allocate_pair(device, "pressure", grids.simulation, SCALAR_FORMAT);
        let divergence =
            FieldTexture::allocate(device, "divergence", grids.simulation, SCALAR_FORMAT);

        let bind_groups = BindGroups::new(
            device,
            programs,
            &velocity,
            &dye,
            &pressure,
            &divergence,
            &advect_velocity_uniforms,
            &advect_dye_uniforms,
            &splat_uniforms,
        );

        log::info!(
            "🌊 Simulation grid {}×{}, dye grid {}×{}",
            grids.simulation.width,
            grids.simulation.height,
            grids.dye.width,
            grids.dye.height
        );

        Ok(Self {
            device: device.clone(),
            grids,
            velocity_dissipation: settings.velocity_dissipation,
            dye_dissipation: settings.dye_dissipation,
            pressure_mode: settings.pressure_mode,
            splat_radius: settings.splat_radius,
            velocity,
            dye,
            pressure,
            divergence,
            advect_velocity_uniforms,
            advect_dye_uniforms,
            splat_uniforms,
            splat_stride,
            splat_capacity,
            bind_groups,
        })
    }

    pub fn grids(&self) -> Grids {
        self.grids
    }

    pub fn dye(&self) -> &DoubleBuffer<FieldTexture> {
        &self.dye
    }

    /// Pick up new tunables. Grid widths only take effect on the next resize.
    pub fn update(&mut self, settings: &Settings) {
        self.velocity_dissipation = settings.velocity_dissipation;
        self.dye_dissipation = settings.dye_dissipation;
        self.pressure_mode = settings.pressure_mode;
        self.splat_radius = settings.splat_radius;
    }

    /// Throw away every field and allocate new, zeroed ones for `grids`.
    pub fn resize(&mut self, programs: &Programs, grids: Grids) {
        self.destroy_fields();

        self.grids = grids;
        self.velocity = FieldTexture::allocate_pair(
            &self.device,
            "velocity",
            grids.simulation,
            VELOCITY_FORMAT,
        );
        self.dye = FieldTexture::allocate_pair(&self.device, "dye", grids.dye, DYE_FORMAT);
        self.pressure = FieldTexture::allocate_pair(
            &self.device,
            "pressure",
            grids.simulation,
            SCALAR_FORMAT,
        );
        self.divergence =
            FieldTexture::allocate(&self.device, "divergence", grids.simulation, SCALAR_FORMAT);

        self.rebind(programs);
    }

    /// Make room for `count` splats in the next frame.
    pub fn reserve_splats(&mut self, programs: &Programs, count: u32) {
        if count <= self.splat_capacity {
            return;
        }

        let capacity = count.next_power_of_two();
        log::debug!("Growing splat uniforms to {} slots", capacity);

        self.splat_uniforms.destroy();
        self.splat_uniforms = create_splat_uniforms(&self.device, self.splat_stride, capacity);
        self.splat_capacity = capacity;
        self.rebind(programs);
    }

    pub fn destroy(&self) {
        self.destroy_fields();
        self.advect_velocity_uniforms.destroy();
        self.advect_dye_uniforms.destroy();
        self.splat_uniforms.destroy();
    }

    fn destroy_fields(&self) {
        self.velocity
            .iter()
            .chain(self.dye.iter())
            .chain(self.pressure.iter())
            .chain(std::iter::once(&self.divergence))
            .for_each(FieldTexture::destroy);
    }

    fn rebind(&mut self, programs: &Programs) {
        self.bind_groups = BindGroups::new(
            &self.device,
            programs,
            &self.velocity,
            &self.dye,
            &self.pressure,
            &self.divergence,
            &self.advect_velocity_uniforms,
            &self.advect_dye_uniforms,
            &self.splat_uniforms,
        );
    }
}

fn create_advection_uniforms(
    device: &wgpu::Device,
    label: &str,
    timestep: f32,
    dissipation: f32,
) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(&AdvectionUniforms::new(timestep, dissipation)),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

// Two slots per splat: velocity, then dye.
fn create_splat_uniforms(
    device: &wgpu::Device,
    stride: wgpu::BufferAddress,
    capacity: u32,
) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("uniform:splat"),
        size: 2 * capacity as wgpu::BufferAddress * stride,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn texture_binding(binding: u32, field: &FieldTexture) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: wgpu::BindingResource::TextureView(&field.view),
    }
}

impl BindGroups {
    #[allow(clippy::too_many_arguments)]
    fn new(
        device: &wgpu::Device,
        programs: &Programs,
        velocity: &DoubleBuffer<FieldTexture>,
        dye: &DoubleBuffer<FieldTexture>,
        pressure: &DoubleBuffer<FieldTexture>,
        divergence: &FieldTexture,
        advect_velocity_uniforms: &wgpu::Buffer,
        advect_dye_uniforms: &wgpu::Buffer,
        splat_uniforms: &wgpu::Buffer,
    ) -> Self {
        let sampler = wgpu::BindGroupEntry {
            binding: 1,
            resource: wgpu::BindingResource::Sampler(&programs.linear_sampler),
        };
        let splat_binding = wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: splat_uniforms,
                offset: 0,
                size: NonZeroU64::new(std::mem::size_of::<SplatUniforms>() as u64),
            }),
        };

        let advect_velocity: [wgpu::BindGroup; 2] = std::array::from_fn(|v| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("bind_group:advect_velocity_{}", v)),
                layout: &programs.advection_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: advect_velocity_uniforms.as_entire_binding(),
                    },
                    sampler.clone(),
                    texture_binding(2, velocity.slot(v)),
                    texture_binding(3, velocity.slot(v)),
                ],
            })
        });

        let advect_dye: [[wgpu::BindGroup; 2]; 2] = std::array::from_fn(|v| {
            std::array::from_fn(|d| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("bind_group:advect_dye_{}_{}", v, d)),
                    layout: &programs.advection_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: advect_dye_uniforms.as_entire_binding(),
                        },
                        sampler.clone(),
                        texture_binding(2, velocity.slot(v)),
                        texture_binding(3, dye.slot(d)),
                    ],
                })
            })
        });

        let divergence_groups: [wgpu::BindGroup; 2] = std::array::from_fn(|v| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("bind_group:divergence_{}", v)),
                layout: &programs.divergence_layout,
                entries: &[texture_binding(0, velocity.slot(v))],
            })
        });

        let pressure_groups: [wgpu::BindGroup; 2] = std::array::from_fn(|p| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("bind_group:pressure_{}", p)),
                layout: &programs.pressure_layout,
                entries: &[
                    texture_binding(0, pressure.slot(p)),
                    texture_binding(1, divergence),
                ],
            })
        });

        let subtract_gradient: [[wgpu::BindGroup; 2]; 2] = std::array::from_fn(|p| {
            std::array::from_fn(|v| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("bind_group:subtract_gradient_{}_{}", p, v)),
                    layout: &programs.subtract_gradient_layout,
                    entries: &[
                        texture_binding(0, pressure.slot(p)),
                        texture_binding(1, velocity.slot(v)),
                    ],
                })
            })
        });

        let splat_group = |name: &str, field: &DoubleBuffer<FieldTexture>| -> [wgpu::BindGroup; 2] {
            std::array::from_fn(|index| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("bind_group:splat_{}_{}", name, index)),
                    layout: &programs.splat_layout,
                    entries: &[splat_binding.clone(), texture_binding(1, field.slot(index))],
                })
            })
        };

        Self {
            advect_velocity,
            advect_dye,
            divergence: divergence_groups,
            pressure: pressure_groups,
            subtract_gradient,
            splat_velocity: splat_group("velocity", velocity),
            splat_dye: splat_group("dye", dye),
        }
    }
}

/// Records one frame's passes into a command encoder.
///
/// Uniform writes are queued and land before the encoder's commands run, so
/// every splat in a frame gets its own slot in the splat buffer.
pub struct GpuFrame<'a> {
    context: &'a mut Context,
    programs: &'a Programs,
    queue: &'a wgpu::Queue,
    encoder: &'a mut wgpu::CommandEncoder,
    next_splat: u32,
}

impl<'a> GpuFrame<'a> {
    pub fn new(
        context: &'a mut Context,
        programs: &'a Programs,
        queue: &'a wgpu::Queue,
        encoder: &'a mut wgpu::CommandEncoder,
    ) -> Self {
        Self {
            context,
            programs,
            queue,
            encoder,
            next_splat: 0,
        }
    }

    fn write_splat(&self, slot: u64, uniforms: &SplatUniforms) -> wgpu::DynamicOffset {
        let offset = slot * self.context.splat_stride;
        self.queue.write_buffer(
            &self.context.splat_uniforms,
            offset,
            bytemuck::bytes_of(uniforms),
        );
        offset as wgpu::DynamicOffset
    }
}

impl Passes for GpuFrame<'_> {
    fn splat(&mut self, splat: &Splat) {
        if self.next_splat >= self.context.splat_capacity {
            log::warn!("Dropping splat: no room left in this frame’s splat buffer");
            return;
        }

        let slot = 2 * self.next_splat as u64;
        self.next_splat += 1;

        let radius = self.context.splat_radius;
        let aspect_ratio = self.context.grids.aspect_ratio;
        let velocity_offset =
            self.write_splat(slot, &SplatUniforms::velocity(splat, radius, aspect_ratio));
        let dye_offset = self.write_splat(slot + 1, &SplatUniforms::dye(splat, radius, aspect_ratio));

        let context = &mut *self.context;
        program::draw(
            self.encoder,
            "pass:splat_velocity",
            &self.programs.splat_velocity_pipeline,
            &context.bind_groups.splat_velocity[context.velocity.read_index()],
            &[velocity_offset],
            &context.velocity.write().view,
        );
        context.velocity.swap();

        program::draw(
            self.encoder,
            "pass:splat_dye",
            &self.programs.splat_dye_pipeline,
            &context.bind_groups.splat_dye[context.dye.read_index()],
            &[dye_offset],
            &context.dye.write().view,
        );
        context.dye.swap();
    }

    fn advect_velocity(&mut self, timestep: f32) {
        let context = &mut *self.context;
        self.queue.write_buffer(
            &context.advect_velocity_uniforms,
            0,
            bytemuck::bytes_of(&AdvectionUniforms::new(
                timestep,
                context.velocity_dissipation,
            )),
        );

        program::draw(
            self.encoder,
            "pass:advect_velocity",
            &self.programs.advect_velocity_pipeline,
            &context.bind_groups.advect_velocity[context.velocity.read_index()],
            &[],
            &context.velocity.write().view,
        );
        context.velocity.swap();
    }

    fn advect_dye(&mut self, timestep: f32) {
        let context = &mut *self.context;
        self.queue.write_buffer(
            &context.advect_dye_uniforms,
            0,
            bytemuck::bytes_of(&AdvectionUniforms::new(timestep, context.dye_dissipation)),
        );

        let (v, d) = (context.velocity.read_index(), context.dye.read_index());
        program::draw(
            self.encoder,
            "pass:advect_dye",
            &self.programs.advect_dye_pipeline,
            &context.bind_groups.advect_dye[v][d],
            &[],
            &context.dye.write().view,
        );
        context.dye.swap();
    }

    fn compute_divergence(&mut self) {
        let context = &*self.context;
        program::draw(
            self.encoder,
            "pass:divergence",
            &self.programs.divergence_pipeline,
            &context.bind_groups.divergence[context.velocity.read_index()],
            &[],
            &context.divergence.view,
        );
    }

    fn begin_pressure_solve(&mut self) {
        let context = &mut *self.context;
        let PressureMode::ClearWith(pressure) = context.pressure_mode else {
            return;
        };

        // An empty pass: the clear load op does the work.
        self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("pass:clear_pressure"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &context.pressure.write().view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: pressure as f64,
                        g: 0.0,
                        b: 0.0,
                        a: 0.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        context.pressure.swap();
    }

    fn relax_pressure(&mut self) {
        let context = &mut *self.context;
        program::draw(
            self.encoder,
            "pass:pressure",
            &self.programs.pressure_pipeline,
            &context.bind_groups.pressure[context.pressure.read_index()],
            &[],
            &context.pressure.write().view,
        );
        context.pressure.swap();
    }

    fn subtract_gradient(&mut self) {
        let context = &mut *self.context;
        let (p, v) = (context.pressure.read_index(), context.velocity.read_index());
        program::draw(
            self.encoder,
            "pass:subtract_gradient",
            &self.programs.subtract_gradient_pipeline,
            &context.bind_groups.subtract_gradient[p][v],
            &[],
            &context.velocity.write().view,
        );
        context.velocity.swap();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn advection_uniforms_match_the_shader_layout() {
        assert_eq!(std::mem::size_of::<AdvectionUniforms>(), 16);
    }

    #[test]
    fn splat_uniforms_match_the_shader_layout() {
        // vec2 point, f32 radius, f32 aspect_ratio, vec4 value
        assert_eq!(std::mem::size_of::<SplatUniforms>(), 32);
    }
}
