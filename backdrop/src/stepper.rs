use crate::settings::Settings;
use crate::splat::Splat;

/// The passes of one simulation step.
///
/// Implemented by the GPU encoder and by the CPU reference solver.
pub trait Passes {
    /// Add a splat's impulse to velocity and its color to dye.
    fn splat(&mut self, splat: &Splat);

    fn advect_velocity(&mut self, timestep: f32);

    /// Carry dye along the current velocity field.
    fn advect_dye(&mut self, timestep: f32);

    fn compute_divergence(&mut self);

    /// Prepare the pressure field for a fresh solve: keep the last solution
    /// as a warm start, or clear it.
    fn begin_pressure_solve(&mut self);

    /// One Jacobi iteration against the current divergence.
    fn relax_pressure(&mut self);

    fn subtract_gradient(&mut self);
}

/// Orders the passes of a step.
///
/// Divergence is computed from the advected velocity, and the pressure solve
/// reads the divergence of the same step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stepper {
    pub timestep: f32,
    pub pressure_iterations: u32,
}

impl Stepper {
    pub fn new(settings: &Settings) -> Self {
        Self {
            timestep: settings.timestep,
            pressure_iterations: settings.pressure_iterations,
        }
    }

    pub fn inject<P: Passes>(&self, passes: &mut P, splats: &[Splat]) {
        for splat in splats {
            passes.splat(splat);
        }
    }

    pub fn step<P: Passes>(&self, passes: &mut P) {
        passes.advect_velocity(self.timestep);
        passes.advect_dye(self.timestep);
        self.project(passes);
    }

    /// Make the velocity field (approximately) divergence-free.
    pub fn project<P: Passes>(&self, passes: &mut P) {
        passes.compute_divergence();
        passes.begin_pressure_solve();
        for _ in 0..self.pressure_iterations {
            passes.relax_pressure();
        }
        passes.subtract_gradient();
    }

    /// Everything a frame does to the fields: inject this frame's splats,
    /// then advance one step.
    pub fn frame<P: Passes>(&self, passes: &mut P, splats: &[Splat]) {
        self.inject(passes, splats);
        self.step(passes);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    enum Pass {
        Splat([f32; 2]),
        AdvectVelocity(f32),
        AdvectDye(f32),
        Divergence,
        BeginPressure,
        RelaxPressure,
        SubtractGradient,
    }

    #[derive(Default)]
    struct Recorder {
        passes: Vec<Pass>,
    }

    impl Passes for Recorder {
        fn splat(&mut self, splat: &Splat) {
            self.passes.push(Pass::Splat(splat.point));
        }

        fn advect_velocity(&mut self, timestep: f32) {
            self.passes.push(Pass::AdvectVelocity(timestep));
        }

        fn advect_dye(&mut self, timestep: f32) {
            self.passes.push(Pass::AdvectDye(timestep));
        }

        fn compute_divergence(&mut self) {
            self.passes.push(Pass::Divergence);
        }

        fn begin_pressure_solve(&mut self) {
            self.passes.push(Pass::BeginPressure);
        }

        fn relax_pressure(&mut self) {
            self.passes.push(Pass::RelaxPressure);
        }

        fn subtract_gradient(&mut self) {
            self.passes.push(Pass::SubtractGradient);
        }
    }

    fn splat_at(point: [f32; 2]) -> Splat {
        Splat {
            point,
            impulse: [1.0, 0.0],
            color: [1.0, 1.0, 1.0],
        }
    }

    #[test]
    fn runs_passes_in_order() {
        let stepper = Stepper {
            timestep: 0.016,
            pressure_iterations: 3,
        };
        let mut recorder = Recorder::default();
        stepper.step(&mut recorder);

        use Pass::*;
        assert_eq!(
            recorder.passes,
            vec![
                AdvectVelocity(0.016),
                AdvectDye(0.016),
                Divergence,
                BeginPressure,
                RelaxPressure,
                RelaxPressure,
                RelaxPressure,
                SubtractGradient,
            ]
        );
    }

    #[test]
    fn relaxes_pressure_the_configured_number_of_times() {
        let stepper = Stepper::new(&Settings::default());
        let mut recorder = Recorder::default();
        stepper.step(&mut recorder);

        let relaxations = recorder
            .passes
            .iter()
            .filter(|pass| **pass == Pass::RelaxPressure)
            .count();
        assert_eq!(relaxations, 20);
    }

    #[test]
    fn splats_land_before_the_step() {
        let stepper = Stepper::new(&Settings::default());
        let mut recorder = Recorder::default();
        stepper.frame(&mut recorder, &[splat_at([0.1, 0.2]), splat_at([0.3, 0.4])]);

        assert_eq!(recorder.passes[0], Pass::Splat([0.1, 0.2]));
        assert_eq!(recorder.passes[1], Pass::Splat([0.3, 0.4]));
        assert_eq!(recorder.passes[2], Pass::AdvectVelocity(0.016));
        assert_eq!(recorder.passes.last(), Some(&Pass::SubtractGradient));
    }
}
