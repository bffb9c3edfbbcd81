use crate::emitter::EmitterSet;
use crate::grid::Grids;
use crate::pointer::PointerLatch;
use crate::render::{display, fluid, program};
use crate::scheduler::Animation;
use crate::settings::Settings;
use crate::splat::Splat;
use crate::stepper::Stepper;
use crate::{render, rng};

use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Problem {
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error(transparent)]
    Render(#[from] render::Problem),
}

impl Problem {
    pub fn is_recoverable(&self) -> bool {
        match self {
            Problem::Render(problem) => problem.is_recoverable(),
            Problem::InvalidSettings(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Problem>;

pub struct Backdrop {
    device: wgpu::Device,
    queue: wgpu::Queue,

    settings: Arc<Settings>,
    screen_size: wgpu::Extent3d,

    programs: program::Programs,
    fluid: fluid::Context,
    compositor: display::Compositor,

    stepper: Stepper,
    emitters: EmitterSet,
    pointer: PointerLatch,

    // Splats waiting for the next step, such as the seed ring after a resize.
    pending_splats: Vec<Splat>,
}

impl Backdrop {
    pub async fn new(
        adapter: &wgpu::Adapter,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        settings: &Arc<Settings>,
    ) -> Result<Backdrop> {
        log::info!("✨ Initialising backdrop");

        settings.validate().map_err(Problem::InvalidSettings)?;

        let screen_size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        log::info!("📐 Surface size: {}x{}", width, height);

        let mut emitters = EmitterSet::new(settings, rng::from_seed(&settings.seed));
        let grids = Grids::new(
            width,
            height,
            settings.simulation_width,
            settings.dye_width,
        );

        let programs = program::Programs::new(device, surface_format).await?;
        let fluid = fluid::Context::new(
            adapter,
            device,
            &programs,
            grids,
            settings,
            emitters.max_splats_per_frame() as u32,
        )?;
        let compositor = display::Compositor::new(device, &programs, &fluid, settings.display);

        let pending_splats = emitters.seed_splats();

        Ok(Backdrop {
            device: device.clone(),
            queue: queue.clone(),
            settings: Arc::clone(settings),
            screen_size,
            programs,
            fluid,
            compositor,
            stepper: Stepper::new(settings),
            emitters,
            pointer: PointerLatch::new(),
            pending_splats,
        })
    }

    /// A handle for the host's input handlers.
    pub fn pointer(&self) -> PointerLatch {
        self.pointer.clone()
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Reinitialize every field for a new surface size and seed the canvas
    /// again.
    pub fn resize(&mut self, width: u32, height: u32) {
        log::info!("📐 Resizing to {}x{}", width, height);

        self.screen_size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let grids = Grids::new(
            width,
            height,
            self.settings.simulation_width,
            self.settings.dye_width,
        );
        self.fluid.resize(&self.programs, grids);
        self.compositor
            .rebind(&self.device, &self.programs, &self.fluid);

        self.pending_splats = self.emitters.seed_splats();
    }

    pub fn update(&mut self, settings: &Arc<Settings>) -> Result<()> {
        settings.validate().map_err(Problem::InvalidSettings)?;

        let regrid = settings.simulation_width != self.settings.simulation_width
            || settings.dye_width != self.settings.dye_width;

        self.settings = Arc::clone(settings);
        self.stepper = Stepper::new(settings);
        self.emitters = EmitterSet::new(settings, rng::from_seed(&settings.seed));
        self.fluid.update(settings);
        self.compositor.update(&self.queue, settings.display);

        if regrid {
            self.resize(self.screen_size.width, self.screen_size.height);
        }

        Ok(())
    }

    /// Record one simulation step.
    pub fn compute(&mut self, encoder: &mut wgpu::CommandEncoder) {
        let splats = collect_splats(&mut self.pending_splats, &self.pointer, &mut self.emitters);
        self.fluid
            .reserve_splats(&self.programs, splats.len() as u32);

        let mut frame =
            fluid::GpuFrame::new(&mut self.fluid, &self.programs, &self.queue, encoder);
        self.stepper.frame(&mut frame, &splats);
    }

    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        self.compositor
            .render(&self.programs, &self.fluid, encoder, view);
    }

    pub fn animate(&mut self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        self.compute(encoder);
        self.render(encoder, view);
    }
}

impl Animation for Backdrop {
    fn resize(&mut self, width: u32, height: u32) {
        Backdrop::resize(self, width, height);
    }

    fn teardown(self) {
        log::info!("🧹 Releasing GPU resources");
        self.fluid.destroy();
        self.compositor.destroy();
    }
}

/// This frame's splats, in injection order: anything pending, the pointer,
/// then the emitters.
fn collect_splats(
    pending: &mut Vec<Splat>,
    pointer: &PointerLatch,
    emitters: &mut EmitterSet,
) -> Vec<Splat> {
    let mut splats = std::mem::take(pending);

    if let Some(input) = pointer.take() {
        splats.push(emitters.pointer_splat(input));
    }

    splats.extend(emitters.advance());
    splats
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn create_test_emitters() -> EmitterSet {
        EmitterSet::new(
            &Settings::default(),
            rng::from_seed(&Some("backdrop".to_string())),
        )
    }

    #[test]
    fn pending_splats_go_first_and_only_once() {
        let mut emitters = create_test_emitters();
        let mut pending = emitters.seed_splats();
        let seeds = pending.clone();
        let pointer = PointerLatch::new();

        let first = collect_splats(&mut pending, &pointer, &mut emitters);
        assert_eq!(&first[..seeds.len()], &seeds[..]);
        assert!(pending.is_empty());

        let second = collect_splats(&mut pending, &pointer, &mut emitters);
        assert!(second.iter().all(|splat| !seeds.contains(splat)));
    }

    #[test]
    fn pointer_splat_precedes_emitter_splats() {
        let mut emitters = create_test_emitters();
        let pointer = PointerLatch::new();

        // Emitters fire on every third frame.
        collect_splats(&mut Vec::new(), &pointer, &mut emitters);
        collect_splats(&mut Vec::new(), &pointer, &mut emitters);

        pointer.record_move(10.0, 10.0, 100, 100);
        pointer.record_move(20.0, 10.0, 100, 100);
        let splats = collect_splats(&mut Vec::new(), &pointer, &mut emitters);

        assert_eq!(splats.len(), 1 + Settings::default().emitters.count as usize);
        assert_relative_eq!(splats[0].point[0], 0.2, epsilon = 1e-6);
        assert_relative_eq!(splats[0].point[1], 0.9, epsilon = 1e-6);
        assert!(splats.len() <= emitters.max_splats_per_frame());
    }

    #[test]
    fn only_gpu_context_problems_are_recoverable() {
        let unavailable = Problem::from(render::Problem::ContextUnavailable("no adapter".into()));
        assert!(unavailable.is_recoverable());

        let unsupported = Problem::from(render::Problem::UnsupportedTextureFormat {
            format: wgpu::TextureFormat::Rg16Float,
            usage: "velocity",
        });
        assert!(unsupported.is_recoverable());

        let shader = Problem::from(render::Problem::ShaderCompilation {
            stage: program::Stage::Pressure,
            message: "bad".into(),
        });
        assert!(!shader.is_recoverable());

        assert!(!Problem::InvalidSettings("timestep".into()).is_recoverable());
    }
}
