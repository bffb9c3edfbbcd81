//! A CPU rendition of the GPU passes.
//!
//! It applies the same per-texel equations as the shaders, with bilinear
//! clamp-to-edge sampling at texel centers, so the solver's properties can be
//! checked without a GPU. It also renders snapshots of the composited canvas.

use crate::double_buffer::DoubleBuffer;
use crate::grid::{Grid, Grids};
use crate::scheduler::Animation;
use crate::settings::{PressureMode, Settings};
use crate::splat::{self, Splat};
use crate::stepper::Passes;

/// One field sampled on a grid, stored bottom row first.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    grid: Grid,
    channels: usize,
    data: Vec<f32>,
}

impl Field {
    pub fn zeroed(grid: Grid, channels: usize) -> Self {
        Self {
            grid,
            channels,
            data: vec![0.0; grid.cell_count() * channels],
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// The value of the cell at column `i`, row `j`, clamped to the edges.
    pub fn at(&self, i: i64, j: i64) -> &[f32] {
        let i = i.clamp(0, self.grid.width as i64 - 1) as usize;
        let j = j.clamp(0, self.grid.height as i64 - 1) as usize;
        let start = (j * self.grid.width as usize + i) * self.channels;
        &self.data[start..start + self.channels]
    }

    fn at_mut(&mut self, i: usize, j: usize) -> &mut [f32] {
        let start = (j * self.grid.width as usize + i) * self.channels;
        &mut self.data[start..start + self.channels]
    }

    /// Bilinear sample at normalized coordinates.
    pub fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        let x = u * self.grid.width as f32 - 0.5;
        let y = v * self.grid.height as f32 - 0.5;
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let (i, j) = (x0 as i64, y0 as i64);

        let mut out = [0.0; 4];
        for c in 0..self.channels {
            let bottom = self.at(i, j)[c] * (1.0 - fx) + self.at(i + 1, j)[c] * fx;
            let top = self.at(i, j + 1)[c] * (1.0 - fx) + self.at(i + 1, j + 1)[c] * fx;
            out[c] = bottom * (1.0 - fy) + top * fy;
        }
        out
    }

    /// The largest Euclidean norm over all cells.
    pub fn max_magnitude(&self) -> f32 {
        self.data
            .chunks(self.channels)
            .map(|cell| cell.iter().map(|x| x * x).sum::<f32>().sqrt())
            .fold(0.0, f32::max)
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|x| *x == 0.0)
    }

    fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    // The normalized coordinates of a cell center.
    fn uv(&self, i: usize, j: usize) -> (f32, f32) {
        (
            (i as f32 + 0.5) / self.grid.width as f32,
            (j as f32 + 0.5) / self.grid.height as f32,
        )
    }

    fn cells(&self) -> impl Iterator<Item = (usize, usize)> {
        let Grid { width, height } = self.grid;
        (0..height as usize).flat_map(move |j| (0..width as usize).map(move |i| (i, j)))
    }
}

pub struct CpuFluid {
    settings: Settings,
    grids: Grids,
    velocity: DoubleBuffer<Field>,
    dye: DoubleBuffer<Field>,
    pressure: DoubleBuffer<Field>,
    divergence: Field,
}

impl CpuFluid {
    pub fn new(surface_width: u32, surface_height: u32, settings: &Settings) -> Self {
        let grids = Grids::new(
            surface_width,
            surface_height,
            settings.simulation_width,
            settings.dye_width,
        );

        Self {
            settings: settings.clone(),
            grids,
            velocity: DoubleBuffer::from_fn(|_| Field::zeroed(grids.simulation, 2)),
            dye: DoubleBuffer::from_fn(|_| Field::zeroed(grids.dye, 3)),
            pressure: DoubleBuffer::from_fn(|_| Field::zeroed(grids.simulation, 1)),
            divergence: Field::zeroed(grids.simulation, 1),
        }
    }

    pub fn grids(&self) -> Grids {
        self.grids
    }

    pub fn velocity(&self) -> &Field {
        self.velocity.read()
    }

    pub fn dye(&self) -> &Field {
        self.dye.read()
    }

    pub fn pressure(&self) -> &Field {
        self.pressure.read()
    }

    pub fn divergence(&self) -> &Field {
        &self.divergence
    }

    /// Mean absolute divergence of the current velocity field.
    pub fn mean_abs_divergence(&self) -> f32 {
        let velocity = self.velocity.read();
        let total: f32 = velocity
            .cells()
            .map(|(i, j)| divergence_at(velocity, i as i64, j as i64).abs())
            .sum();
        total / velocity.grid().cell_count() as f32
    }

    /// The dye-weighted center of mass, in normalized coordinates.
    pub fn dye_centroid(&self) -> Option<[f32; 2]> {
        let dye = self.dye.read();
        let (mut mass, mut x, mut y) = (0.0, 0.0, 0.0);
        for (i, j) in dye.cells() {
            let weight: f32 = dye.at(i as i64, j as i64).iter().sum();
            let (u, v) = dye.uv(i, j);
            mass += weight;
            x += weight * u;
            y += weight * v;
        }

        (mass > 0.0).then(|| [x / mass, y / mass])
    }

    /// Composite the dye field the way the display program does.
    pub fn display(&self, width: u32, height: u32) -> image::RgbaImage {
        let dye = self.dye.read();
        let crate::settings::Display { dim, vignette } = self.settings.display;

        image::RgbaImage::from_fn(width, height, |x, y| {
            let u = (x as f32 + 0.5) / width as f32;
            let v = (y as f32 + 0.5) / height as f32;
            // Image rows run top to bottom.
            let color = dye.sample(u, 1.0 - v);
            let falloff = 1.0 - vignette * (u - 0.5).hypot(v - 0.5);

            let channel = |c: f32| ((c * dim * falloff).clamp(0.0, 1.0) * 255.0).round() as u8;
            image::Rgba([channel(color[0]), channel(color[1]), channel(color[2]), 255])
        })
    }

    pub fn resize(&mut self, surface_width: u32, surface_height: u32) {
        *self = Self::new(surface_width, surface_height, &self.settings);
    }
}

impl Passes for CpuFluid {
    fn splat(&mut self, splat: &Splat) {
        let radius = self.settings.splat_radius;
        let aspect_ratio = self.grids.aspect_ratio;
        let [dx, dy] = splat.impulse;

        add_splat(&mut self.velocity, splat.point, &[dx, dy], radius, aspect_ratio);
        add_splat(&mut self.dye, splat.point, &splat.color, radius, aspect_ratio);
    }

    fn advect_velocity(&mut self, timestep: f32) {
        let [texel_x, texel_y] = self.grids.simulation.texel_size();
        let dissipation = self.settings.velocity_dissipation;
        let (velocity, out) = self.velocity.split_mut();

        for (i, j) in velocity.cells() {
            let (u, v) = velocity.uv(i, j);
            let here = velocity.at(i as i64, j as i64);
            let source = velocity.sample(
                u - timestep * here[0] * texel_x,
                v - timestep * here[1] * texel_y,
            );
            let cell = out.at_mut(i, j);
            cell[0] = dissipation * source[0];
            cell[1] = dissipation * source[1];
        }

        self.velocity.swap();
    }

    fn advect_dye(&mut self, timestep: f32) {
        let [texel_x, texel_y] = self.grids.dye.texel_size();
        let dissipation = self.settings.dye_dissipation;
        let velocity = self.velocity.read();
        let (dye, out) = self.dye.split_mut();

        for (i, j) in dye.cells() {
            let (u, v) = dye.uv(i, j);
            let [vx, vy, ..] = velocity.sample(u, v);
            let source = dye.sample(u - timestep * vx * texel_x, v - timestep * vy * texel_y);
            let cell = out.at_mut(i, j);
            for c in 0..3 {
                cell[c] = dissipation * source[c];
            }
        }

        self.dye.swap();
    }

    fn compute_divergence(&mut self) {
        let velocity = self.velocity.read();
        for (i, j) in velocity.cells() {
            self.divergence.at_mut(i, j)[0] = divergence_at(velocity, i as i64, j as i64);
        }
    }

    fn begin_pressure_solve(&mut self) {
        match self.settings.pressure_mode {
            PressureMode::ClearWith(pressure) => self.pressure.write_mut().fill(pressure),
            PressureMode::Retain => return,
        }
        self.pressure.swap();
    }

    fn relax_pressure(&mut self) {
        let divergence = &self.divergence;
        let (pressure, out) = self.pressure.split_mut();

        for (i, j) in pressure.cells() {
            let (x, y) = (i as i64, j as i64);
            let neighbors = pressure.at(x - 1, y)[0]
                + pressure.at(x + 1, y)[0]
                + pressure.at(x, y - 1)[0]
                + pressure.at(x, y + 1)[0];
            out.at_mut(i, j)[0] = 0.25 * (neighbors - divergence.at(x, y)[0]);
        }

        self.pressure.swap();
    }

    fn subtract_gradient(&mut self) {
        let pressure = self.pressure.read();
        let (velocity, out) = self.velocity.split_mut();

        for (i, j) in velocity.cells() {
            let (x, y) = (i as i64, j as i64);
            let gradient_x = pressure.at(x + 1, y)[0] - pressure.at(x - 1, y)[0];
            let gradient_y = pressure.at(x, y + 1)[0] - pressure.at(x, y - 1)[0];
            let here = velocity.at(x, y);
            let cell = out.at_mut(i, j);
            cell[0] = here[0] - 0.5 * gradient_x;
            cell[1] = here[1] - 0.5 * gradient_y;
        }

        self.velocity.swap();
    }
}

impl Animation for CpuFluid {
    fn resize(&mut self, width: u32, height: u32) {
        CpuFluid::resize(self, width, height);
    }

    fn teardown(self) {}
}

fn divergence_at(velocity: &Field, i: i64, j: i64) -> f32 {
    let left = velocity.at(i - 1, j)[0];
    let right = velocity.at(i + 1, j)[0];
    let bottom = velocity.at(i, j - 1)[1];
    let top = velocity.at(i, j + 1)[1];
    0.5 * ((right - left) + (top - bottom))
}

fn add_splat(
    field: &mut DoubleBuffer<Field>,
    point: [f32; 2],
    value: &[f32],
    radius: f32,
    aspect_ratio: f32,
) {
    let (current, out) = field.split_mut();

    for (i, j) in current.cells() {
        let (u, v) = current.uv(i, j);
        let weight = splat::falloff([u - point[0], v - point[1]], aspect_ratio, radius);
        let base = current.at(i as i64, j as i64);
        let cell = out.at_mut(i, j);
        for (c, amount) in value.iter().enumerate() {
            cell[c] = base[c] + weight * amount;
        }
    }

    field.swap();
}
