//! 2D stable-fluids solver for mist, pollen and splash fields.
//!
//! Classic semi-Lagrangian scheme on a square grid: diffuse, project,
//! advect, project for velocity, then diffuse and advect density. Density
//! fades by 1% per step so injected puffs dissipate on their own.

/// Default grid side (16384 cells)
pub const DEFAULT_GRID_SIZE: usize = 128;

/// Gauss-Seidel relaxation passes per linear solve
const SOLVER_ITERATIONS: usize = 20;

/// Density kept per step
const DENSITY_FADE: f32 = 0.99;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Boundary {
    /// Scalar field: copy neighbours
    Scalar,
    /// Horizontal velocity: mirror at left/right walls
    VelocityX,
    /// Vertical velocity: mirror at top/bottom walls
    VelocityY,
}

pub struct FluidGrid {
    n: usize,
    u: Vec<f32>,
    v: Vec<f32>,
    u_prev: Vec<f32>,
    v_prev: Vec<f32>,
    density: Vec<f32>,
    density_prev: Vec<f32>,
}

impl FluidGrid {
    /// Create a grid of `size` x `size` cells (minimum 4)
    pub fn new(size: usize) -> Self {
        let n = size.max(4);
        let cells = n * n;
        Self {
            n,
            u: vec![0.0; cells],
            v: vec![0.0; cells],
            u_prev: vec![0.0; cells],
            v_prev: vec![0.0; cells],
            density: vec![0.0; cells],
            density_prev: vec![0.0; cells],
        }
    }

    pub fn size(&self) -> usize {
        self.n
    }

    #[inline]
    fn ix(&self, x: usize, y: usize) -> usize {
        x + y * self.n
    }

    /// Zero all fields
    pub fn reset(&mut self) {
        for field in [
            &mut self.u,
            &mut self.v,
            &mut self.u_prev,
            &mut self.v_prev,
            &mut self.density,
            &mut self.density_prev,
        ] {
            field.fill(0.0);
        }
    }

    /// Inject density at a cell. Out-of-range cells are ignored.
    pub fn add_density(&mut self, x: i32, y: i32, amount: f32) {
        if let Some(i) = self.cell(x, y) {
            self.density[i] += amount;
        }
    }

    /// Inject velocity at a cell. Out-of-range cells are ignored.
    pub fn add_velocity(&mut self, x: i32, y: i32, amount_x: f32, amount_y: f32) {
        if let Some(i) = self.cell(x, y) {
            self.u[i] += amount_x;
            self.v[i] += amount_y;
        }
    }

    fn cell(&self, x: i32, y: i32) -> Option<usize> {
        let n = self.n as i32;
        if x < 0 || y < 0 || x >= n || y >= n {
            return None;
        }
        Some(self.ix(x as usize, y as usize))
    }

    pub fn density(&self) -> &[f32] {
        &self.density
    }

    pub fn density_at(&self, x: usize, y: usize) -> f32 {
        if x >= self.n || y >= self.n {
            return 0.0;
        }
        self.density[self.ix(x, y)]
    }

    pub fn velocity_at(&self, x: usize, y: usize) -> (f32, f32) {
        if x >= self.n || y >= self.n {
            return (0.0, 0.0);
        }
        let i = self.ix(x, y);
        (self.u[i], self.v[i])
    }

    /// Sum of all density, mostly for diagnostics
    pub fn total_density(&self) -> f32 {
        self.density.iter().sum()
    }

    /// Advance the simulation by `dt` with viscosity `visc` and density
    /// diffusion `diff`.
    pub fn step(&mut self, dt: f32, visc: f32, diff: f32) {
        let n = self.n;

        // velocity
        std::mem::swap(&mut self.u_prev, &mut self.u);
        std::mem::swap(&mut self.v_prev, &mut self.v);
        diffuse(n, Boundary::VelocityX, &mut self.u, &self.u_prev, visc, dt);
        diffuse(n, Boundary::VelocityY, &mut self.v, &self.v_prev, visc, dt);
        project(n, &mut self.u, &mut self.v, &mut self.u_prev, &mut self.v_prev);

        std::mem::swap(&mut self.u_prev, &mut self.u);
        std::mem::swap(&mut self.v_prev, &mut self.v);
        advect(n, Boundary::VelocityX, &mut self.u, &self.u_prev, &self.u_prev, &self.v_prev, dt);
        advect(n, Boundary::VelocityY, &mut self.v, &self.v_prev, &self.u_prev, &self.v_prev, dt);
        project(n, &mut self.u, &mut self.v, &mut self.u_prev, &mut self.v_prev);

        // density
        std::mem::swap(&mut self.density_prev, &mut self.density);
        diffuse(n, Boundary::Scalar, &mut self.density, &self.density_prev, diff, dt);
        std::mem::swap(&mut self.density_prev, &mut self.density);
        advect(n, Boundary::Scalar, &mut self.density, &self.density_prev, &self.u, &self.v, dt);

        for d in &mut self.density {
            *d *= DENSITY_FADE;
        }
    }
}

impl Default for FluidGrid {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_SIZE)
    }
}

#[inline]
fn idx(n: usize, x: usize, y: usize) -> usize {
    x + y * n
}

fn set_boundary(n: usize, b: Boundary, x: &mut [f32]) {
    for i in 1..n - 1 {
        let (top, bottom) = (x[idx(n, i, 1)], x[idx(n, i, n - 2)]);
        let flip = b == Boundary::VelocityY;
        x[idx(n, i, 0)] = if flip { -top } else { top };
        x[idx(n, i, n - 1)] = if flip { -bottom } else { bottom };
    }
    for j in 1..n - 1 {
        let (left, right) = (x[idx(n, 1, j)], x[idx(n, n - 2, j)]);
        let flip = b == Boundary::VelocityX;
        x[idx(n, 0, j)] = if flip { -left } else { left };
        x[idx(n, n - 1, j)] = if flip { -right } else { right };
    }

    x[idx(n, 0, 0)] = 0.5 * (x[idx(n, 1, 0)] + x[idx(n, 0, 1)]);
    x[idx(n, 0, n - 1)] = 0.5 * (x[idx(n, 1, n - 1)] + x[idx(n, 0, n - 2)]);
    x[idx(n, n - 1, 0)] = 0.5 * (x[idx(n, n - 2, 0)] + x[idx(n, n - 1, 1)]);
    x[idx(n, n - 1, n - 1)] = 0.5 * (x[idx(n, n - 2, n - 1)] + x[idx(n, n - 1, n - 2)]);
}

// In-place Gauss-Seidel; kept sequential because each cell reads freshly
// written neighbours.
fn lin_solve(n: usize, b: Boundary, x: &mut [f32], x0: &[f32], a: f32, c: f32) {
    let c_recip = 1.0 / c;
    for _ in 0..SOLVER_ITERATIONS {
        for j in 1..n - 1 {
            for i in 1..n - 1 {
                let neighbours = x[idx(n, i + 1, j)]
                    + x[idx(n, i - 1, j)]
                    + x[idx(n, i, j + 1)]
                    + x[idx(n, i, j - 1)];
                x[idx(n, i, j)] = (x0[idx(n, i, j)] + a * neighbours) * c_recip;
            }
        }
        set_boundary(n, b, x);
    }
}

fn diffuse(n: usize, b: Boundary, x: &mut [f32], x0: &[f32], diff: f32, dt: f32) {
    let inner = (n - 2) as f32;
    let a = dt * diff * inner * inner;
    lin_solve(n, b, x, x0, a, 1.0 + 4.0 * a);
}

fn advect(n: usize, b: Boundary, d: &mut [f32], d0: &[f32], u: &[f32], v: &[f32], dt: f32) {
    let dt0 = dt * (n - 2) as f32;
    let max = n as f32 - 1.5;

    for j in 1..n - 1 {
        for i in 1..n - 1 {
            let x = (i as f32 - dt0 * u[idx(n, i, j)]).clamp(0.5, max);
            let y = (j as f32 - dt0 * v[idx(n, i, j)]).clamp(0.5, max);

            let (i0, j0) = (x.floor() as usize, y.floor() as usize);
            let (i1, j1) = (i0 + 1, j0 + 1);
            let s1 = x - i0 as f32;
            let s0 = 1.0 - s1;
            let t1 = y - j0 as f32;
            let t0 = 1.0 - t1;

            d[idx(n, i, j)] = s0 * (t0 * d0[idx(n, i0, j0)] + t1 * d0[idx(n, i0, j1)])
                + s1 * (t0 * d0[idx(n, i1, j0)] + t1 * d0[idx(n, i1, j1)]);
        }
    }
    set_boundary(n, b, d);
}

fn project(n: usize, u: &mut [f32], v: &mut [f32], p: &mut [f32], div: &mut [f32]) {
    let h = 1.0 / n as f32;

    for j in 1..n - 1 {
        for i in 1..n - 1 {
            div[idx(n, i, j)] = -0.5
                * h
                * (u[idx(n, i + 1, j)] - u[idx(n, i - 1, j)] + v[idx(n, i, j + 1)]
                    - v[idx(n, i, j - 1)]);
            p[idx(n, i, j)] = 0.0;
        }
    }
    set_boundary(n, Boundary::Scalar, div);
    set_boundary(n, Boundary::Scalar, p);

    lin_solve(n, Boundary::Scalar, p, div, 1.0, 4.0);

    for j in 1..n - 1 {
        for i in 1..n - 1 {
            u[idx(n, i, j)] -= 0.5 * (p[idx(n, i + 1, j)] - p[idx(n, i - 1, j)]) / h;
            v[idx(n, i, j)] -= 0.5 * (p[idx(n, i, j + 1)] - p[idx(n, i, j - 1)]) / h;
        }
    }
    set_boundary(n, Boundary::VelocityX, u);
    set_boundary(n, Boundary::VelocityY, v);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_injection_ignored() {
        let mut grid = FluidGrid::new(16);
        grid.add_density(-1, 3, 5.0);
        grid.add_density(3, 16, 5.0);
        grid.add_velocity(99, 0, 1.0, 1.0);
        assert_eq!(grid.total_density(), 0.0);
        assert_eq!(grid.density_at(40, 40), 0.0);
    }

    #[test]
    fn test_density_spreads_and_fades() {
        let mut grid = FluidGrid::new(32);
        grid.add_density(16, 16, 100.0);
        grid.step(0.1, 0.0, 0.001);
        let total = grid.total_density();
        assert!(total > 0.0 && total <= 100.0);
        // diffusion moved some mass to the neighbours
        assert!(grid.density_at(17, 16) > 0.0);
        assert!(grid.density_at(16, 16) < 100.0);
    }

    #[test]
    fn test_velocity_carries_density() {
        let mut grid = FluidGrid::new(32);
        grid.add_density(10, 16, 50.0);
        for _ in 0..10 {
            // keep the fan running
            for y in 10..22 {
                grid.add_velocity(10, y, 5.0, 0.0);
            }
            grid.step(0.02, 0.0, 0.0);
        }
        let left: f32 = (1..10).map(|x| grid.density_at(x, 16)).sum();
        let right: f32 = (11..31).map(|x| grid.density_at(x, 16)).sum();
        assert!(right > left, "density should drift with the flow: {left} vs {right}");
    }

    #[test]
    fn test_reset() {
        let mut grid = FluidGrid::default();
        assert_eq!(grid.size(), DEFAULT_GRID_SIZE);
        grid.add_density(5, 5, 1.0);
        grid.add_velocity(5, 5, 1.0, 1.0);
        grid.reset();
        assert_eq!(grid.total_density(), 0.0);
        assert_eq!(grid.velocity_at(5, 5), (0.0, 0.0));
    }

    #[test]
    fn test_quiet_grid_stays_quiet() {
        let mut grid = FluidGrid::new(16);
        grid.step(0.1, 0.0001, 0.0001);
        assert_eq!(grid.total_density(), 0.0);
    }
}
