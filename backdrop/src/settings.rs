use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub seed: Option<String>,

    pub simulation_width: u32,
    pub dye_width: u32,
    pub timestep: f32,
    pub velocity_dissipation: f32,
    pub dye_dissipation: f32,
    pub pressure_mode: PressureMode,
    pub pressure_iterations: u32,

    pub splat_radius: f32,
    pub pointer_force: f32,
    pub emitters: Emitters,
    pub seeding: Seeding,

    pub palette: Palette,
    pub palette_attenuation: f32,
    pub display: Display,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            seed: None,
            simulation_width: 128,
            dye_width: 512,
            timestep: 0.016,
            velocity_dissipation: 0.998,
            dye_dissipation: 0.998,
            pressure_mode: PressureMode::Retain,
            pressure_iterations: 20,
            splat_radius: 0.015,
            pointer_force: 10000.0,
            emitters: Emitters::default(),
            seeding: Seeding::default(),
            palette: Palette::default(),
            palette_attenuation: 0.18,
            display: Display::default(),
        }
    }
}

impl Settings {
    /// Reject configurations that would let the fields grow without bound or
    /// leave the solver with nothing to do.
    pub fn validate(&self) -> Result<(), String> {
        if self.simulation_width == 0 || self.dye_width == 0 {
            return Err("grid widths must be at least 1".into());
        }

        let clear_pressure = match self.pressure_mode {
            PressureMode::ClearWith(pressure) => pressure,
            PressureMode::Retain => 0.0,
        };
        let scalars = [
            ("timestep", self.timestep),
            ("velocity dissipation", self.velocity_dissipation),
            ("dye dissipation", self.dye_dissipation),
            ("pressure clear value", clear_pressure),
            ("splat radius", self.splat_radius),
            ("pointer force", self.pointer_force),
            ("orbit radius", self.emitters.orbit_radius),
            ("vertical drift", self.emitters.vertical_drift),
            ("minimum drift speed", self.emitters.drift_speed.min),
            ("maximum drift speed", self.emitters.drift_speed.max),
            ("rotation speed", self.emitters.rotation_speed),
            ("emitter impulse", self.emitters.impulse),
            ("seed ring radius", self.seeding.ring_radius),
            ("seed impulse", self.seeding.impulse),
            ("palette attenuation", self.palette_attenuation),
            ("dim", self.display.dim),
            ("vignette", self.display.vignette),
        ];
        if let Some((name, value)) = scalars.into_iter().find(|(_, value)| !value.is_finite()) {
            return Err(format!("{} must be finite, got {}", name, value));
        }

        if !self.palette.colors().iter().flatten().all(|c| c.is_finite()) {
            return Err("palette colors must be finite".into());
        }

        if !(self.timestep > 0.0) {
            return Err(format!("timestep must be positive, got {}", self.timestep));
        }

        for (name, dissipation) in [
            ("velocity", self.velocity_dissipation),
            ("dye", self.dye_dissipation),
        ] {
            if !(dissipation > 0.0 && dissipation <= 1.0) {
                return Err(format!(
                    "{} dissipation must be in (0, 1], got {}",
                    name, dissipation
                ));
            }
        }

        if self.pressure_iterations == 0 {
            return Err("at least one pressure iteration is required".into());
        }

        if !(self.splat_radius > 0.0) {
            return Err(format!(
                "splat radius must be positive, got {}",
                self.splat_radius
            ));
        }

        if self.emitters.fire_interval == 0 {
            return Err("emitter fire interval must be at least 1".into());
        }

        let DriftSpeed { min, max } = self.emitters.drift_speed;
        if min > max {
            return Err(format!("drift speed range is inverted: {}..{}", min, max));
        }

        if self.palette.colors().is_empty() {
            return Err("the palette has no colors".into());
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub enum PressureMode {
    Retain,
    ClearWith(f32),
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Emitters {
    pub count: u32,
    pub orbit_radius: f32,
    pub vertical_drift: f32,
    pub drift_speed: DriftSpeed,
    pub rotation_speed: f32,
    pub impulse: f32,
    pub fire_interval: u32,
}

impl Default for Emitters {
    fn default() -> Self {
        Self {
            count: 6,
            orbit_radius: 0.35,
            vertical_drift: 0.7,
            drift_speed: DriftSpeed {
                min: 0.002,
                max: 0.005,
            },
            rotation_speed: 0.008,
            impulse: 8.0,
            fire_interval: 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct DriftSpeed {
    pub min: f32,
    pub max: f32,
}

// The ring of splats painted when the fields are (re)allocated.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Seeding {
    pub splat_count: u32,
    pub ring_radius: f32,
    pub impulse: f32,
}

impl Default for Seeding {
    fn default() -> Self {
        Self {
            splat_count: 12,
            ring_radius: 0.3,
            impulse: 20.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Display {
    pub dim: f32,
    pub vignette: f32,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            dim: 0.4,
            vignette: 0.4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub enum Palette {
    Preset(ColorPreset),
    Custom(Vec<[f32; 3]>),
}

impl Default for Palette {
    fn default() -> Self {
        Self::Preset(Default::default())
    }
}

impl Palette {
    pub fn colors(&self) -> &[[f32; 3]] {
        match self {
            Palette::Preset(ColorPreset::Violet) => &COLOR_SCHEME_VIOLET,
            Palette::Preset(ColorPreset::Poolside) => &COLOR_SCHEME_POOLSIDE,
            Palette::Custom(colors) => colors,
        }
    }
}

#[derive(Copy, Clone, Default, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum ColorPreset {
    #[default]
    Violet,
    Poolside,
}

#[rustfmt::skip]
pub static COLOR_SCHEME_VIOLET: [[f32; 3]; 5] = [
    [0.49, 0.23, 0.93], // violet
    [0.93, 0.29, 0.60], // pink
    [0.85, 0.24, 0.85], // fuchsia
    [0.31, 0.27, 0.90], // indigo
    [0.56, 0.18, 0.78], // purple
];
#[rustfmt::skip]
pub static COLOR_SCHEME_POOLSIDE: [[f32; 3]; 5] = [
    [76.0  / 255.0, 156.0 / 255.0, 228.0 / 255.0],
    [140.0 / 255.0, 204.0 / 255.0, 244.0 / 255.0],
    [108.0 / 255.0, 180.0 / 255.0, 236.0 / 255.0],
    [188.0 / 255.0, 228.0 / 255.0, 244.0 / 255.0],
    [124.0 / 255.0, 220.0 / 255.0, 236.0 / 255.0],
];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        assert_eq!(Settings::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_amplifying_dissipation() {
        let settings = Settings {
            dye_dissipation: 1.01,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_non_finite_forces() {
        // 1e39 overflows f32 and deserializes as infinity.
        let settings: Settings = serde_json::from_str(r#"{ "pointerForce": 1e39 }"#).unwrap();
        assert!(settings.pointer_force.is_infinite());
        assert!(settings.validate().is_err());

        let settings: Settings =
            serde_json::from_str(r#"{ "seeding": { "impulse": -1e39 } }"#).unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_non_finite_scalars() {
        let cases = [
            Settings {
                emitters: Emitters {
                    impulse: f32::INFINITY,
                    ..Default::default()
                },
                ..Default::default()
            },
            Settings {
                emitters: Emitters {
                    orbit_radius: f32::NAN,
                    ..Default::default()
                },
                ..Default::default()
            },
            Settings {
                palette_attenuation: f32::INFINITY,
                ..Default::default()
            },
            Settings {
                pressure_mode: PressureMode::ClearWith(f32::NAN),
                ..Default::default()
            },
            Settings {
                palette: Palette::Custom(vec![[0.5, f32::INFINITY, 0.5]]),
                ..Default::default()
            },
        ];

        for settings in cases {
            assert!(settings.validate().is_err(), "{:?}", settings);
        }
    }

    #[test]
    fn rejects_empty_custom_palette() {
        let settings = Settings {
            palette: Palette::Custom(vec![]),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_zero_pressure_iterations() {
        let settings = Settings {
            pressure_iterations: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn fills_missing_fields_from_defaults() {
        let settings: Settings = serde_json::from_str(
            r#"{ "simulationWidth": 64, "pressureMode": { "ClearWith": 0.0 }, "emitters": { "count": 2 } }"#,
        )
        .unwrap();

        assert_eq!(settings.simulation_width, 64);
        assert_eq!(settings.dye_width, 512);
        assert_eq!(settings.pressure_mode, PressureMode::ClearWith(0.0));
        assert_eq!(settings.emitters.count, 2);
        assert_eq!(settings.emitters.fire_interval, 3);
        assert_eq!(settings.palette, Palette::Preset(ColorPreset::Violet));
    }
}
