/// A localized impulse injected into velocity and dye at the same point.
///
/// Coordinates are normalized to the surface with the origin at the bottom
/// left, so `impulse` is `(right, up)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Splat {
    pub point: [f32; 2],
    pub impulse: [f32; 2],
    pub color: [f32; 3],
}

/// Gaussian weight of a splat at `offset` from its center. The horizontal
/// component is stretched by the aspect ratio, which keeps the footprint
/// round on screen rather than in grid space.
pub fn falloff(offset: [f32; 2], aspect_ratio: f32, radius: f32) -> f32 {
    let x = offset[0] * aspect_ratio;
    let y = offset[1];
    (-(x * x + y * y) / radius).exp()
}

/// The aspect-corrected distance beyond which `falloff` stays below `epsilon`.
pub fn locality_radius(radius: f32, epsilon: f32) -> f32 {
    (-radius * epsilon.ln()).sqrt()
}

// Fields on the GPU are stored top row first.
fn to_texture_space(point: [f32; 2]) -> [f32; 2] {
    [point[0], 1.0 - point[1]]
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SplatUniforms {
    point: [f32; 2],     // 0
    radius: f32,         // 8
    aspect_ratio: f32,   // 12
    value: [f32; 4],     // 16
                         // 32
}

impl SplatUniforms {
    pub fn velocity(splat: &Splat, radius: f32, aspect_ratio: f32) -> Self {
        let [dx, dy] = splat.impulse;
        Self {
            point: to_texture_space(splat.point),
            radius,
            aspect_ratio,
            value: [dx, -dy, 0.0, 0.0],
        }
    }

    pub fn dye(splat: &Splat, radius: f32, aspect_ratio: f32) -> Self {
        let [r, g, b] = splat.color;
        Self {
            point: to_texture_space(splat.point),
            radius,
            aspect_ratio,
            value: [r, g, b, 0.0],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn peaks_at_the_center() {
        assert_relative_eq!(falloff([0.0, 0.0], 1.6, 0.015), 1.0);
    }

    #[test]
    fn locality_radius_bounds_the_tail() {
        let radius = 0.015;
        let epsilon = 1e-4;
        let reach = locality_radius(radius, epsilon);

        assert_relative_eq!(falloff([0.0, reach], 1.0, radius), epsilon, max_relative = 1e-3);
        assert!(falloff([0.0, reach * 1.01], 1.0, radius) < epsilon);
        assert!(falloff([reach * 1.01 / 2.0, 0.0], 2.0, radius) < epsilon);
    }

    #[test]
    fn footprint_is_round_in_pixels() {
        // A 1000x500 surface: a pixel is 1/1000 wide and 1/500 tall.
        let aspect_ratio = 2.0;
        for pixels in [1.0, 5.0, 20.0, 60.0] {
            let horizontal = falloff([pixels / 1000.0, 0.0], aspect_ratio, 0.015);
            let vertical = falloff([0.0, pixels / 500.0], aspect_ratio, 0.015);
            assert_relative_eq!(horizontal, vertical, max_relative = 1e-6);
        }
    }

    #[test]
    fn flips_into_texture_space() {
        let splat = Splat {
            point: [0.25, 0.75],
            impulse: [3.0, 4.0],
            color: [0.1, 0.2, 0.3],
        };

        let velocity = SplatUniforms::velocity(&splat, 0.015, 1.0);
        assert_eq!(velocity.point, [0.25, 0.25]);
        assert_eq!(velocity.value, [3.0, -4.0, 0.0, 0.0]);

        let dye = SplatUniforms::dye(&splat, 0.015, 1.0);
        assert_eq!(dye.value, [0.1, 0.2, 0.3, 0.0]);
    }
}
