//! Density-to-color encoding for display.
//!
//! Purely a presentation transform: it reads the density field and never
//! feeds anything back into simulation state.

use crate::grid::Grid;

/// Scale applied to density inside the log curve.
const LOG_SCALE: f32 = 0.25;
/// Gain on the red/green channels.
const BRIGHTNESS: f32 = 1.5;

/// Tone curve: `f = log2(density * scale + 1)`, then `(1.5f, 1.5f^3, f^6)`.
/// The `+ 1` keeps the log defined for zero density; the rising powers push
/// green and blue toward the bright core of a plume.
pub fn shade_density(density: f32) -> (f32, f32, f32) {
    let f = (density * LOG_SCALE + 1.0).log2();
    let f3 = f * f * f;
    (BRIGHTNESS * f, BRIGHTNESS * f3, f3 * f3)
}

/// Pack floating-point channels in `[0, 1]` into little-endian RGBA,
/// clamping each to `[0, 255]`.
pub fn pack_rgba(r: f32, g: f32, b: f32, a: f32) -> u32 {
    let to_byte = |c: f32| (c * 256.0).clamp(0.0, 255.0) as u32;
    (to_byte(a) << 24) | (to_byte(b) << 16) | (to_byte(g) << 8) | to_byte(r)
}

/// Split a packed pixel back into `[r, g, b, a]` bytes.
pub fn unpack_rgba(pixel: u32) -> [u8; 4] {
    [
        (pixel & 0xff) as u8,
        ((pixel >> 8) & 0xff) as u8,
        ((pixel >> 16) & 0xff) as u8,
        ((pixel >> 24) & 0xff) as u8,
    ]
}

/// Encode the whole density field into `pixels`, row-major, one packed
/// RGBA value per cell. Reuses the buffer's capacity across ticks.
pub fn encode_to_rgba(density: &Grid<f32>, pixels: &mut Vec<u32>) {
    pixels.clear();
    pixels.extend(density.raw().iter().map(|&d| {
        let (r, g, b) = shade_density(d);
        pack_rgba(r, g, b, 1.0)
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn red_channel_is_monotone_in_density() {
        let mut last = 0;
        for i in 0..=200 {
            let density = i as f32 * 0.1;
            let (r, g, b) = shade_density(density);
            let red = unpack_rgba(pack_rgba(r, g, b, 1.0))[0];
            assert!(red >= last, "red fell from {last} to {red} at density {density}");
            last = red;
        }
    }

    #[test]
    fn zero_density_is_black_and_opaque() {
        let (r, g, b) = shade_density(0.0);
        let px = pack_rgba(r, g, b, 1.0);
        let [r8, g8, b8, a8] = unpack_rgba(px);
        assert_eq!((r8, g8, b8), (0, 0, 0));
        assert_eq!(a8, 255);
    }

    #[test]
    fn pack_clamps_out_of_range_channels() {
        let [r, g, b, a] = unpack_rgba(pack_rgba(2.0, -1.0, 0.5, 1.0));
        assert_eq!(r, 255);
        assert_eq!(g, 0);
        assert_eq!(b, 128);
        assert_eq!(a, 255);
    }

    #[test]
    fn encode_fills_one_pixel_per_cell() {
        let density = Grid::from_fn(4, 3, |x, _| x as f32);
        let mut pixels = Vec::new();
        encode_to_rgba(&density, &mut pixels);
        assert_eq!(pixels.len(), 12);
        // Brighter cells encode to larger red values.
        assert!(unpack_rgba(pixels[3])[0] > unpack_rgba(pixels[0])[0]);
    }
}
