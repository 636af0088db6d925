use crate::math::{Cell, Vec2};

/// A fixed-size 2D array with toroidal indexing.
///
/// Any integer coordinate maps to a valid cell by wrapping modulo the grid
/// dimensions, so neighbor lookups never need edge cases. The backing
/// storage is allocated once and never resized; grids are deliberately not
/// `Clone` (copies are expensive and almost always unintended), but two
/// same-shape grids can swap their storage in O(1) for double buffering.
pub struct Grid<T> {
    values: Vec<T>,
    nx: i32,
    ny: i32,
}

/// Row-major cell coordinates: y outer, x inner. All full-grid passes use
/// this order so any debug output is reproducible.
pub fn cells(nx: i32, ny: i32) -> impl Iterator<Item = (i32, i32)> {
    (0..ny).flat_map(move |y| (0..nx).map(move |x| (x, y)))
}

impl<T: Cell> Grid<T> {
    pub fn new(nx: usize, ny: usize) -> Self {
        assert!(nx > 0 && ny > 0, "grid dimensions must be positive");
        Self {
            values: vec![T::zero(); nx * ny],
            nx: nx as i32,
            ny: ny as i32,
        }
    }

    pub fn from_fn(nx: usize, ny: usize, f: impl Fn(i32, i32) -> T) -> Self {
        let mut grid = Self::new(nx, ny);
        for (x, y) in cells(grid.nx, grid.ny) {
            grid.set(x, y, f(x, y));
        }
        grid
    }

    pub fn nx(&self) -> i32 {
        self.nx
    }

    pub fn ny(&self) -> i32 {
        self.ny
    }

    fn idx(&self, x: i32, y: i32) -> usize {
        let x = x.rem_euclid(self.nx);
        let y = y.rem_euclid(self.ny);
        (x + y * self.nx) as usize
    }

    pub fn get(&self, x: i32, y: i32) -> T {
        self.values[self.idx(x, y)]
    }

    pub fn set(&mut self, x: i32, y: i32, value: T) {
        let idx = self.idx(x, y);
        self.values[idx] = value;
    }

    /// Exchange backing storage with another grid of the same shape.
    pub fn swap(&mut self, other: &mut Grid<T>) {
        assert!(
            self.nx == other.nx && self.ny == other.ny,
            "can only swap same-shape grids"
        );
        std::mem::swap(&mut self.values, &mut other.values);
    }

    /// Contiguous row-major storage, row 0 first.
    pub fn raw(&self) -> &[T] {
        &self.values
    }

    pub fn fill(&mut self, value: T) {
        self.values.fill(value);
    }

    /// Multiply every cell by `k` in place.
    pub fn scale_by(&mut self, k: f32) {
        for value in &mut self.values {
            *value = value.scale(k);
        }
    }

    /// Bilinear sample at an arbitrary position in grid space. The four
    /// taps wrap like every other lookup, so the result is defined for any
    /// finite position.
    pub fn sample(&self, p: Vec2) -> T {
        let ix = p.x.floor() as i32;
        let iy = p.y.floor() as i32;
        let ux = p.x - ix as f32;
        let uy = p.y - iy as f32;
        let bottom = T::lerp(self.get(ix, iy), self.get(ix + 1, iy), ux);
        let top = T::lerp(self.get(ix, iy + 1), self.get(ix + 1, iy + 1), ux);
        T::lerp(bottom, top, uy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toroidal_indexing_wraps_any_offset() {
        let grid = Grid::from_fn(4, 3, |x, y| (x + y * 10) as f32);
        for (x, y) in cells(4, 3) {
            for k in [-2_i32, -1, 1, 3] {
                assert_eq!(grid.get(x + k * 4, y), grid.get(x, y));
                assert_eq!(grid.get(x, y + k * 3), grid.get(x, y));
            }
        }
        // Negative coordinates wrap to the opposite side.
        assert_eq!(grid.get(-1, 0), grid.get(3, 0));
        assert_eq!(grid.get(0, -1), grid.get(0, 2));
    }

    #[test]
    fn swap_twice_restores_contents() {
        let mut a = Grid::from_fn(3, 3, |x, y| (x * y) as f32);
        let mut b = Grid::from_fn(3, 3, |x, y| (x + y) as f32);
        let a_before: Vec<f32> = a.raw().to_vec();
        let b_before: Vec<f32> = b.raw().to_vec();
        a.swap(&mut b);
        assert_eq!(a.raw(), &b_before[..]);
        a.swap(&mut b);
        assert_eq!(a.raw(), &a_before[..]);
        assert_eq!(b.raw(), &b_before[..]);
    }

    #[test]
    #[should_panic(expected = "same-shape")]
    fn swap_rejects_shape_mismatch() {
        let mut a = Grid::<f32>::new(3, 3);
        let mut b = Grid::<f32>::new(3, 4);
        a.swap(&mut b);
    }

    #[test]
    fn sample_at_integer_coordinates_is_exact() {
        let grid = Grid::from_fn(5, 4, |x, y| (x * 7 + y * 13) as f32);
        for (x, y) in cells(5, 4) {
            let sampled = grid.sample(Vec2::new(x as f32, y as f32));
            assert_eq!(sampled, grid.get(x, y));
        }
    }

    #[test]
    fn sample_blends_between_cells() {
        let grid = Grid::from_fn(4, 4, |x, _| x as f32);
        let v = grid.sample(Vec2::new(1.5, 2.0));
        assert!((v - 1.5).abs() < 1e-6);
    }

    #[test]
    fn cells_are_row_major() {
        let order: Vec<(i32, i32)> = cells(2, 2).collect();
        assert_eq!(order, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
    }
}
