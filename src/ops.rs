//! Field operators for one simulation step.
//!
//! Every operator reads from explicit source grids and writes a full new
//! field into a destination grid; the caller swaps buffers afterwards. None
//! of them allocate, so the orchestrator preallocates all scratch grids up
//! front and the hot loop stays allocation free.

use crate::grid::{cells, Grid};
use crate::math::{Cell, Vec2};

/// Guard added to the confinement direction length before dividing.
const CONFINEMENT_EPS: f32 = 1e-5;

/// Semi-Lagrangian advection: back-trace along `velocity` over `dt` and
/// bilinearly sample `src` at the traced position.
///
/// Unconditionally stable for any `dt`, at the cost of numerical smoothing.
/// For velocity self-advection pass the same grid as `src` and `velocity`;
/// all reads happen before any write because `dst` is a separate buffer.
pub fn advect<T: Cell>(dst: &mut Grid<T>, src: &Grid<T>, velocity: &Grid<Vec2>, dt: f32) {
    for (x, y) in cells(src.nx(), src.ny()) {
        let pos = Vec2::new(x as f32, y as f32).sub(velocity.get(x, y).scale(dt));
        dst.set(x, y, src.sample(pos));
    }
}

/// One implicit-style Jacobi relaxation pass:
/// `dst = (src + a * neighbor_sum) / (1 + 4a)` with `a = rate * dt`.
pub fn diffuse<T: Cell>(dst: &mut Grid<T>, src: &Grid<T>, rate: f32, dt: f32) {
    let a = rate * dt;
    let norm = 1.0 / (1.0 + 4.0 * a);
    for (x, y) in cells(src.nx(), src.ny()) {
        let neighbors = src
            .get(x - 1, y)
            .add(src.get(x + 1, y))
            .add(src.get(x, y - 1))
            .add(src.get(x, y + 1));
        dst.set(x, y, src.get(x, y).add(neighbors.scale(a)).scale(norm));
    }
}

/// Central-difference divergence of a velocity field.
pub fn divergence(dst: &mut Grid<f32>, velocity: &Grid<Vec2>) {
    for (x, y) in cells(velocity.nx(), velocity.ny()) {
        let dx = velocity.get(x + 1, y).x - velocity.get(x - 1, y).x;
        let dy = velocity.get(x, y + 1).y - velocity.get(x, y - 1).y;
        dst.set(x, y, dx + dy);
    }
}

/// Remove the divergent component of `velocity`.
///
/// Solves `laplacian(p) = div` by Jacobi iteration, then subtracts the
/// pressure gradient. `iterations` trades accuracy for cost; zero
/// iterations leaves the velocity untouched (the pressure stays zero). The
/// three scratch grids are caller owned.
pub fn project(
    velocity: &mut Grid<Vec2>,
    pressure: &mut Grid<f32>,
    pressure_next: &mut Grid<f32>,
    div: &mut Grid<f32>,
    iterations: usize,
) {
    divergence(div, velocity);
    pressure.fill(0.0);

    for _ in 0..iterations {
        for (x, y) in cells(div.nx(), div.ny()) {
            let sum = -div.get(x, y)
                + pressure.get(x + 1, y)
                + pressure.get(x - 1, y)
                + pressure.get(x, y + 1)
                + pressure.get(x, y - 1);
            pressure_next.set(x, y, 0.25 * sum);
        }
        pressure.swap(pressure_next);
    }

    for (x, y) in cells(velocity.nx(), velocity.ny()) {
        let grad = Vec2::new(
            0.5 * (pressure.get(x + 1, y) - pressure.get(x - 1, y)),
            0.5 * (pressure.get(x, y + 1) - pressure.get(x, y - 1)),
        );
        velocity.set(x, y, velocity.get(x, y).sub(grad));
    }
}

/// Scalar curl of the velocity field at one cell.
pub fn curl(velocity: &Grid<Vec2>, x: i32, y: i32) -> f32 {
    velocity.get(x, y + 1).x - velocity.get(x, y - 1).x + velocity.get(x - 1, y).y
        - velocity.get(x + 1, y).y
}

/// Vorticity confinement: re-inject rotational energy lost to advection
/// smoothing.
///
/// The force points along the gradient of `|curl|`, scaled by `strength`
/// and divided by the epsilon-guarded gradient length. Cells where
/// `active` returns false receive no force and are copied through
/// unchanged; the caller swaps `dst` in afterwards.
pub fn vorticity_confinement(
    dst: &mut Grid<Vec2>,
    velocity: &Grid<Vec2>,
    abs_curl: &mut Grid<f32>,
    strength: f32,
    dt: f32,
    active: impl Fn(i32, i32) -> bool,
) {
    for (x, y) in cells(velocity.nx(), velocity.ny()) {
        abs_curl.set(x, y, curl(velocity, x, y).abs());
    }

    for (x, y) in cells(velocity.nx(), velocity.ny()) {
        let old = velocity.get(x, y);
        if !active(x, y) {
            dst.set(x, y, old);
            continue;
        }
        let direction = Vec2::new(
            abs_curl.get(x, y - 1) - abs_curl.get(x, y + 1),
            abs_curl.get(x + 1, y) - abs_curl.get(x - 1, y),
        );
        let force = direction.normalized_eps(CONFINEMENT_EPS).scale(strength);
        dst.set(x, y, old.add(force.scale(dt * curl(velocity, x, y))));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_abs_divergence(velocity: &Grid<Vec2>, div: &mut Grid<f32>) -> f32 {
        divergence(div, velocity);
        div.raw().iter().map(|d| d.abs()).sum()
    }

    #[test]
    fn advect_with_zero_velocity_is_identity() {
        let velocity = Grid::new(6, 6);
        let density = Grid::from_fn(6, 6, |x, y| (x * y) as f32 * 0.1);
        let mut next = Grid::new(6, 6);
        advect(&mut next, &density, &velocity, 0.02);
        assert_eq!(next.raw(), density.raw());

        let mut vel_next = Grid::new(6, 6);
        advect(&mut vel_next, &velocity, &velocity, 0.02);
        assert_eq!(vel_next.raw(), velocity.raw());
    }

    #[test]
    fn advect_moves_spike_downstream() {
        // Uniform velocity (1, 0) and a displacement of exactly one cell:
        // the spike at (0, 0) must reappear at (1, 0) via back-tracing.
        let velocity = Grid::from_fn(8, 8, |_, _| Vec2::new(1.0, 0.0));
        let density = Grid::from_fn(8, 8, |x, y| if x == 0 && y == 0 { 1.0 } else { 0.0 });
        let mut next = Grid::new(8, 8);
        advect(&mut next, &density, &velocity, 1.0);
        assert!((next.get(1, 0) - 1.0).abs() < 1e-6);
        assert!(next.get(0, 0).abs() < 1e-6);
    }

    #[test]
    fn diffuse_relaxes_toward_neighbors() {
        let src = Grid::from_fn(5, 5, |x, y| if x == 2 && y == 2 { 1.0 } else { 0.0 });
        let mut dst = Grid::new(5, 5);
        diffuse(&mut dst, &src, 1.0, 1.0);
        // The peak loses mass to its neighbors but stays the maximum.
        assert!(dst.get(2, 2) < 1.0);
        assert!(dst.get(1, 2) > 0.0);
        assert!(dst.get(2, 2) > dst.get(1, 2));
    }

    #[test]
    fn project_reduces_divergence() {
        let mut velocity = Grid::from_fn(16, 16, |x, y| {
            Vec2::new(
                (x as f32 * 0.7).sin() + (y as f32 * 0.3).cos(),
                (y as f32 * 1.1).sin() - (x as f32 * 0.5).cos(),
            )
        });
        let mut pressure = Grid::new(16, 16);
        let mut pressure_next = Grid::new(16, 16);
        let mut div = Grid::new(16, 16);

        let before = total_abs_divergence(&velocity, &mut div);
        assert!(before > 1.0, "test field should start divergent");
        project(&mut velocity, &mut pressure, &mut pressure_next, &mut div, 20);
        let after = total_abs_divergence(&velocity, &mut div);
        assert!(after < before, "divergence {after} not below {before}");
    }

    #[test]
    fn project_with_zero_iterations_is_identity() {
        let mut velocity = Grid::from_fn(8, 8, |x, y| Vec2::new(x as f32, y as f32));
        let original: Vec<Vec2> = velocity.raw().to_vec();
        let mut pressure = Grid::new(8, 8);
        let mut pressure_next = Grid::new(8, 8);
        let mut div = Grid::new(8, 8);
        project(&mut velocity, &mut pressure, &mut pressure_next, &mut div, 0);
        assert_eq!(velocity.raw(), &original[..]);
    }

    #[test]
    fn confinement_respects_region_mask() {
        // Shear flow with a curl that varies in y, so the confinement
        // direction is nonzero away from the symmetry rows.
        let velocity = Grid::from_fn(8, 8, |_, y| Vec2::new((y * y) as f32 * 0.1, 0.0));
        let mut abs_curl = Grid::new(8, 8);
        let mut next = Grid::new(8, 8);
        vorticity_confinement(&mut next, &velocity, &mut abs_curl, 10.0, 0.02, |x, _| x >= 4);

        for (x, y) in cells(8, 8) {
            if x < 4 {
                assert_eq!(next.get(x, y), velocity.get(x, y), "masked cell ({x},{y}) moved");
            }
        }
        let changed = cells(8, 8)
            .filter(|&(x, _)| x >= 4)
            .any(|(x, y)| next.get(x, y) != velocity.get(x, y));
        assert!(changed, "active half should receive confinement force");
    }
}
