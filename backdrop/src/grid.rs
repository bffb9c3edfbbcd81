/// A regular lattice of cells backing one field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grid {
    pub width: u32,
    pub height: u32,
}

impl Grid {
    /// Keep the requested width and derive the height from the surface's
    /// aspect ratio, so that every cell is square in screen space.
    pub fn fit(width: u32, surface_width: u32, surface_height: u32) -> Self {
        let (surface_width, surface_height) = clamp_surface_size(surface_width, surface_height);
        let width = width.max(1);
        let height = (width as f32 * surface_height as f32 / surface_width as f32).round() as u32;

        Self {
            width,
            height: height.max(1),
        }
    }

    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

/// The coarse simulation grid and the fine dye grid for one surface size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grids {
    pub simulation: Grid,
    pub dye: Grid,
    pub aspect_ratio: f32,
}

impl Grids {
    pub fn new(
        surface_width: u32,
        surface_height: u32,
        simulation_width: u32,
        dye_width: u32,
    ) -> Self {
        let (width, height) = clamp_surface_size(surface_width, surface_height);

        Self {
            simulation: Grid::fit(simulation_width, width, height),
            dye: Grid::fit(dye_width, width, height),
            aspect_ratio: width as f32 / height as f32,
        }
    }
}

// Minimised windows report a zero-sized surface.
fn clamp_surface_size(width: u32, height: u32) -> (u32, u32) {
    (width.max(1), height.max(1))
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn create_test_grids(width: u32, height: u32) -> ((u32, u32), (u32, u32)) {
        let Grids {
            simulation, dye, ..
        } = Grids::new(width, height, 128, 512);
        (
            (simulation.width, simulation.height),
            (dye.width, dye.height),
        )
    }

    #[test]
    fn is_sane_grid_for_iphone_xr() {
        assert_eq!(create_test_grids(414, 896), ((128, 277), (512, 1108)));
    }

    #[test]
    fn is_sane_grid_for_macbook_pro_13_with_1280_800_scaling() {
        assert_eq!(create_test_grids(1280, 800), ((128, 80), (512, 320)));
    }

    #[test]
    fn is_sane_grid_for_ultrawide_4k() {
        assert_eq!(create_test_grids(3840, 1600), ((128, 53), (512, 213)));
    }

    #[test]
    fn is_sane_grid_for_triple_2560_1440() {
        assert_eq!(create_test_grids(2560 * 3, 1440), ((128, 24), (512, 96)));
    }

    #[test]
    fn is_sane_grid_for_minimised_window() {
        let grids = Grids::new(0, 0, 128, 512);
        assert_eq!(grids.simulation, Grid { width: 128, height: 128 });
        assert_relative_eq!(grids.aspect_ratio, 1.0);
    }

    #[test]
    fn never_collapses_to_zero_rows() {
        assert_eq!(Grid::fit(16, 10_000, 10).height, 1);
    }

    #[test]
    fn texel_size_is_reciprocal_of_resolution() {
        let grid = Grid::fit(128, 1280, 800);
        let [x, y] = grid.texel_size();
        assert_relative_eq!(x, 1.0 / 128.0);
        assert_relative_eq!(y, 1.0 / 80.0);
    }
}
