use crate::pointer::PointerInput;
use crate::rng::FRng;
use crate::settings::{self, Settings};
use crate::splat::Splat;

use rand::Rng;
use std::f32::consts::TAU;

/// A flow source orbiting the center of the canvas.
///
/// Position and emission direction evolve every frame, whether or not the
/// emitter fires.
#[derive(Clone, Debug, PartialEq)]
pub struct AutonomousEmitter {
    // Orbit phases, each kept in [0, TAU).
    horizontal_phase: f32,
    vertical_phase: f32,
    drift_speed: f32,
    direction: f32,
}

impl AutonomousEmitter {
    pub fn position(&self, settings: &settings::Emitters) -> [f32; 2] {
        [
            0.5 + settings.orbit_radius * self.horizontal_phase.cos(),
            0.5 + settings.orbit_radius * self.vertical_phase.sin(),
        ]
    }

    pub fn impulse(&self, settings: &settings::Emitters) -> [f32; 2] {
        [
            settings.impulse * self.direction.cos(),
            settings.impulse * self.direction.sin(),
        ]
    }

    fn advance(&mut self, settings: &settings::Emitters) {
        self.horizontal_phase = (self.horizontal_phase + self.drift_speed).rem_euclid(TAU);
        self.vertical_phase = (self.vertical_phase + self.drift_speed * settings.vertical_drift)
            .rem_euclid(TAU);
        self.direction = (self.direction + settings.rotation_speed) % TAU;
    }
}

/// The autonomous emitters, the palette, and the frame counter that decides
/// when the emitters fire.
pub struct EmitterSet {
    emitters: Vec<AutonomousEmitter>,
    settings: settings::Emitters,
    seeding: settings::Seeding,
    palette: Vec<[f32; 3]>,
    pointer_force: f32,
    frame: u64,
    rng: FRng,
}

impl EmitterSet {
    pub fn new(settings: &Settings, mut rng: FRng) -> Self {
        let emitter_settings = settings.emitters.clone();
        let count = emitter_settings.count;
        let settings::DriftSpeed { min, max } = emitter_settings.drift_speed;

        let emitters = (0..count)
            .map(|i| {
                let drift = rng.random_range(0.0..TAU);
                AutonomousEmitter {
                    horizontal_phase: drift,
                    vertical_phase: (drift * emitter_settings.vertical_drift).rem_euclid(TAU),
                    drift_speed: if min < max {
                        rng.random_range(min..max)
                    } else {
                        min
                    },
                    direction: TAU * i as f32 / count as f32,
                }
            })
            .collect();

        let attenuation = settings.palette_attenuation;
        let palette = settings
            .palette
            .colors()
            .iter()
            .map(|[r, g, b]| [r * attenuation, g * attenuation, b * attenuation])
            .collect();

        Self {
            emitters,
            settings: emitter_settings,
            seeding: settings.seeding.clone(),
            palette,
            pointer_force: settings.pointer_force,
            frame: 0,
            rng,
        }
    }

    pub fn emitters(&self) -> &[AutonomousEmitter] {
        &self.emitters
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Move every emitter one frame forward and collect the splats of those
    /// that fire on this frame.
    pub fn advance(&mut self) -> Vec<Splat> {
        self.frame += 1;
        let fires = self.frame % u64::from(self.settings.fire_interval.max(1)) == 0;

        let mut splats = Vec::new();
        for i in 0..self.emitters.len() {
            self.emitters[i].advance(&self.settings);

            if fires {
                let emitter = &self.emitters[i];
                let point = emitter.position(&self.settings);
                let impulse = emitter.impulse(&self.settings);
                let color = self.random_color();
                splats.push(Splat {
                    point,
                    impulse,
                    color,
                });
            }
        }

        splats
    }

    /// A ring of outward-pointing splats around the center, used to fill a
    /// freshly allocated canvas.
    pub fn seed_splats(&mut self) -> Vec<Splat> {
        let settings::Seeding {
            splat_count,
            ring_radius,
            impulse,
        } = self.seeding;

        (0..splat_count)
            .map(|i| {
                let angle = TAU * i as f32 / splat_count as f32;
                let (sin, cos) = angle.sin_cos();
                Splat {
                    point: [0.5 + ring_radius * cos, 0.5 + ring_radius * sin],
                    impulse: [impulse * cos, impulse * sin],
                    color: self.random_color(),
                }
            })
            .collect()
    }

    pub fn pointer_splat(&mut self, input: PointerInput) -> Splat {
        let [dx, dy] = input.delta;
        Splat {
            point: input.position,
            impulse: [dx * self.pointer_force, dy * self.pointer_force],
            color: self.random_color(),
        }
    }

    /// The most splats a single frame can produce: the seed ring, one pointer
    /// splat and every emitter firing at once.
    pub fn max_splats_per_frame(&self) -> usize {
        self.seeding.splat_count as usize + 1 + self.emitters.len()
    }

    fn random_color(&mut self) -> [f32; 3] {
        if self.palette.is_empty() {
            return [0.0; 3];
        }

        let index = self.rng.random_range(0..self.palette.len());
        self.palette[index]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rng;
    use approx::assert_relative_eq;

    fn create_test_emitters(settings: &Settings) -> EmitterSet {
        EmitterSet::new(settings, rng::from_seed(&Some("emitters".to_string())))
    }

    #[test]
    fn fires_on_every_third_frame() {
        let mut emitters = create_test_emitters(&Settings::default());

        let counts: Vec<usize> = (0..9).map(|_| emitters.advance().len()).collect();
        assert_eq!(counts, vec![0, 0, 6, 0, 0, 6, 0, 0, 6]);
    }

    #[test]
    fn emitters_evolve_when_idle() {
        let settings = Settings::default();
        let mut emitters = create_test_emitters(&settings);
        let before = emitters.emitters().to_vec();

        assert!(emitters.advance().is_empty());
        for (old, new) in before.iter().zip(emitters.emitters()) {
            assert_ne!(old.position(&settings.emitters), new.position(&settings.emitters));
            assert_relative_eq!(
                new.direction,
                old.direction + settings.emitters.rotation_speed,
                epsilon = 1e-5
            );
        }
    }

    #[test]
    fn emitters_keep_drifting_in_long_sessions() {
        let settings = Settings::default();
        let mut emitter = AutonomousEmitter {
            horizontal_phase: 70_000.0,
            vertical_phase: 70_000.0 * settings.emitters.vertical_drift,
            drift_speed: 0.003,
            direction: 0.0,
        };

        emitter.advance(&settings.emitters);
        assert!((0.0..TAU).contains(&emitter.horizontal_phase));
        assert!((0.0..TAU).contains(&emitter.vertical_phase));

        let before = emitter.position(&settings.emitters);
        for _ in 0..600 {
            emitter.advance(&settings.emitters);
        }
        let after = emitter.position(&settings.emitters);
        assert_ne!(before, after, "emitters stopped drifting");

        // 600 frames at 0.003 is 1.8 radians of horizontal phase.
        let expected = (before[0] - 0.5) / settings.emitters.orbit_radius;
        let phase = expected.clamp(-1.0, 1.0).acos();
        let moved = (after[0] - 0.5) / settings.emitters.orbit_radius;
        assert!(
            (moved - (phase + 1.8).cos()).abs() < 1e-3
                || (moved - (-phase + 1.8).cos()).abs() < 1e-3
        );
    }

    #[test]
    fn phases_stay_wrapped() {
        let settings = Settings::default();
        let mut emitters = create_test_emitters(&settings);

        for _ in 0..10_000 {
            emitters.advance();
        }
        for emitter in emitters.emitters() {
            assert!((0.0..TAU).contains(&emitter.horizontal_phase));
            assert!((0.0..TAU).contains(&emitter.vertical_phase));
        }
    }

    #[test]
    fn directions_start_evenly_spread() {
        let emitters = create_test_emitters(&Settings::default());
        for (i, emitter) in emitters.emitters().iter().enumerate() {
            assert_relative_eq!(emitter.direction, TAU * i as f32 / 6.0);
        }
    }

    #[test]
    fn drift_speed_stays_in_range() {
        let settings = Settings::default();
        let emitters = create_test_emitters(&settings);
        for emitter in emitters.emitters() {
            assert!(emitter.drift_speed >= settings.emitters.drift_speed.min);
            assert!(emitter.drift_speed < settings.emitters.drift_speed.max);
        }
    }

    #[test]
    fn emitters_stay_within_orbit() {
        let settings = Settings::default();
        let mut emitters = create_test_emitters(&settings);

        for _ in 0..3000 {
            for splat in emitters.advance() {
                let [x, y] = splat.point;
                assert!((0.149..=0.851).contains(&x), "x = {}", x);
                assert!((0.149..=0.851).contains(&y), "y = {}", y);
                let [dx, dy] = splat.impulse;
                assert_relative_eq!((dx * dx + dy * dy).sqrt(), 8.0, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn colors_come_from_the_attenuated_palette() {
        let settings = Settings::default();
        let mut emitters = create_test_emitters(&settings);
        let palette: Vec<[f32; 3]> = settings
            .palette
            .colors()
            .iter()
            .map(|c| [c[0] * 0.18, c[1] * 0.18, c[2] * 0.18])
            .collect();

        for splat in emitters.seed_splats() {
            assert!(palette.contains(&splat.color));
        }
    }

    #[test]
    fn seeds_a_ring_of_outward_splats() {
        let mut emitters = create_test_emitters(&Settings::default());
        let splats = emitters.seed_splats();
        assert_eq!(splats.len(), 12);

        for splat in splats {
            let offset = [splat.point[0] - 0.5, splat.point[1] - 0.5];
            assert_relative_eq!(offset[0].hypot(offset[1]), 0.3, epsilon = 1e-5);
            assert_relative_eq!(splat.impulse[0], offset[0] / 0.3 * 20.0, epsilon = 1e-3);
            assert_relative_eq!(splat.impulse[1], offset[1] / 0.3 * 20.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn pointer_delta_is_scaled_by_force() {
        let mut emitters = create_test_emitters(&Settings::default());
        let splat = emitters.pointer_splat(PointerInput {
            position: [0.2, 0.4],
            delta: [0.001, -0.002],
        });

        assert_eq!(splat.point, [0.2, 0.4]);
        assert_relative_eq!(splat.impulse[0], 10.0, epsilon = 1e-4);
        assert_relative_eq!(splat.impulse[1], -20.0, epsilon = 1e-4);
    }

    #[test]
    fn same_seed_gives_same_animation() {
        let settings = Settings::default();
        let mut a = create_test_emitters(&settings);
        let mut b = create_test_emitters(&settings);

        for _ in 0..30 {
            assert_eq!(a.advance(), b.advance());
        }
    }
}
