//! External forcing: density injection, turbulence, buoyancy, and the
//! boundary reset band.
//!
//! All of these are pointwise updates (no neighbor reads), so unlike the
//! operators in [`crate::ops`] they mutate their target field in place.

use std::sync::Arc;

use rand::Rng;

use crate::grid::{cells, Grid};
use crate::math::{smoothstep, Vec2};

/// Per-cell spatial predicate used to restrict a forcing term (or the
/// vorticity confinement force) to a sub-region of the domain.
///
/// The stock regions below mirror scripted asymmetries in the reference
/// scene; their placement is visual tuning, not physics, which is why they
/// stay configurable instead of hard-coded.
pub type RegionMask = Arc<dyn Fn(i32, i32) -> bool + Send + Sync>;

pub fn everywhere() -> RegionMask {
    Arc::new(|_, _| true)
}

pub fn nowhere() -> RegionMask {
    Arc::new(|_, _| false)
}

pub fn left_of(bound: i32) -> RegionMask {
    Arc::new(move |x, _| x < bound)
}

pub fn right_of(bound: i32) -> RegionMask {
    Arc::new(move |x, _| x >= bound)
}

/// Cells with `x0 <= x < x1`, e.g. the middle third of the domain.
pub fn column_band(x0: i32, x1: i32) -> RegionMask {
    Arc::new(move |x, _| x >= x0 && x < x1)
}

/// Add a soft circular blob of density centered at `(px, py)`.
///
/// The contribution per cell is `smoothstep(radius, 0, distance) * value`,
/// a falloff that reaches zero at `radius` rather than a hard disk edge.
/// Coordinates may land anywhere; writes wrap with the grid.
pub fn inject_density(density: &mut Grid<f32>, px: f32, py: f32, radius: i32, value: f32) {
    let cx = px as i32;
    let cy = py as i32;
    for y in -radius..=radius {
        for x in -radius..=radius {
            let d = ((x * x + y * y) as f32).sqrt();
            let u = smoothstep(radius as f32, 0.0, d);
            let cell = density.get(cx + x, cy + y);
            density.set(cx + x, cy + y, cell + u * value);
        }
    }
}

/// Ambient turbulence: per-cell uniform random kicks in `[-amplitude,
/// amplitude)` on both axes, applied only inside `region`.
pub fn turbulence(
    velocity: &mut Grid<Vec2>,
    rng: &mut impl Rng,
    amplitude: f32,
    region: &RegionMask,
) {
    if amplitude <= 0.0 {
        return;
    }
    let region = region.as_ref();
    for (x, y) in cells(velocity.nx(), velocity.ny()) {
        if !region(x, y) {
            continue;
        }
        let kick = Vec2::new(
            rng.gen_range(-amplitude..amplitude),
            rng.gen_range(-amplitude..amplitude),
        );
        velocity.set(x, y, velocity.get(x, y).add(kick));
    }
}

/// Buoyancy coupling: dense cells rise, near-empty cells sink.
///
/// Adds `(density * lift - sink_offset) * dt` to the vertical velocity, so
/// `sink_offset / lift` is the neutral-buoyancy density threshold.
pub fn buoyancy(
    velocity: &mut Grid<Vec2>,
    density: &Grid<f32>,
    lift: f32,
    sink_offset: f32,
    dt: f32,
) {
    for (x, y) in cells(velocity.nx(), velocity.ny()) {
        let mut v = velocity.get(x, y);
        v.y += (density.get(x, y) * lift - sink_offset) * dt;
        velocity.set(x, y, v);
    }
}

/// Force every cell with `y < height` back to rest. Emulates an absorbing
/// open edge along the bottom without touching the wraparound math used by
/// the operators.
pub fn clear_bottom_band(density: &mut Grid<f32>, velocity: &mut Grid<Vec2>, height: i32) {
    let height = height.min(density.ny());
    for y in 0..height {
        for x in 0..density.nx() {
            density.set(x, y, 0.0);
            velocity.set(x, y, Vec2::ZERO);
        }
    }
}
