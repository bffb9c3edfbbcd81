use super::fluid::Context;
use super::program::Programs;
use crate::settings;

use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct DisplayUniforms {
    dim: f32,           // 0
    vignette: f32,      // 4
    _padding: [f32; 2], // 8
                        // 16
}

impl From<settings::Display> for DisplayUniforms {
    fn from(display: settings::Display) -> Self {
        Self {
            dim: display.dim,
            vignette: display.vignette,
            _padding: [0.0; 2],
        }
    }
}

/// Draws the current dye field to the surface, dimmed and vignetted.
pub struct Compositor {
    uniforms: wgpu::Buffer,
    // [dye]
    bind_groups: [wgpu::BindGroup; 2],
}

impl Compositor {
    pub fn new(
        device: &wgpu::Device,
        programs: &Programs,
        context: &Context,
        display: settings::Display,
    ) -> Self {
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("uniform:display"),
            contents: bytemuck::bytes_of(&DisplayUniforms::from(display)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_groups = create_bind_groups(device, programs, context, &uniforms);

        Self {
            uniforms,
            bind_groups,
        }
    }

    pub fn update(&self, queue: &wgpu::Queue, display: settings::Display) {
        queue.write_buffer(
            &self.uniforms,
            0,
            bytemuck::bytes_of(&DisplayUniforms::from(display)),
        );
    }

    /// Point the bind groups at the dye textures of a resized context.
    pub fn rebind(&mut self, device: &wgpu::Device, programs: &Programs, context: &Context) {
        self.bind_groups = create_bind_groups(device, programs, context, &self.uniforms);
    }

    pub fn render(
        &self,
        programs: &Programs,
        context: &Context,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
    ) {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("pass:display"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_pipeline(&programs.display_pipeline);
        rpass.set_bind_group(0, &self.bind_groups[context.dye().read_index()], &[]);
        rpass.draw(0..3, 0..1);
    }

    pub fn destroy(&self) {
        self.uniforms.destroy();
    }
}

fn create_bind_groups(
    device: &wgpu::Device,
    programs: &Programs,
    context: &Context,
    uniforms: &wgpu::Buffer,
) -> [wgpu::BindGroup; 2] {
    std::array::from_fn(|d| {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("bind_group:display_{}", d)),
            layout: &programs.display_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&programs.linear_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&context.dye().slot(d).view),
                },
            ],
        })
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn uniforms_carry_the_display_settings() {
        let uniforms = DisplayUniforms::from(settings::Display::default());
        assert_eq!(std::mem::size_of::<DisplayUniforms>(), 16);
        assert_eq!(uniforms.dim, 0.4);
        assert_eq!(uniforms.vignette, 0.4);
    }
}
