//! Frame export for offline video capture.
//!
//! Frames are written as binary PPM; a dumped sequence can be stitched
//! with `ffmpeg -i frame_%d.ppm video.mp4`.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};

use crate::encode::unpack_rgba;

/// Write an 8-bit binary PPM (`P6`).
///
/// `rgb` holds packed RGB rows bottom-to-top, the order a graphics
/// back-buffer readback produces; the file is written top row first as the
/// format expects.
pub fn write_ppm(path: &Path, width: usize, height: usize, rgb: &[u8]) -> Result<()> {
    ensure!(
        rgb.len() == width * height * 3,
        "rgb buffer is {} bytes, expected {}",
        rgb.len(),
        width * height * 3
    );
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write!(out, "P6\n{width} {height}\n255\n")?;
    for y in (0..height).rev() {
        let row = &rgb[y * width * 3..(y + 1) * width * 3];
        out.write_all(row)?;
    }
    out.flush().with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Strip alpha from a packed RGBA pixel buffer, keeping row order.
pub fn rgba_to_rgb(pixels: &[u32]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(pixels.len() * 3);
    for &pixel in pixels {
        let [r, g, b, _] = unpack_rgba(pixel);
        rgb.extend_from_slice(&[r, g, b]);
    }
    rgb
}

/// Writes numbered `frame_<n>.ppm` files into a directory.
pub struct FrameRecorder {
    dir: PathBuf,
    frame: usize,
}

impl FrameRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(Self { dir, frame: 0 })
    }

    pub fn frames_written(&self) -> usize {
        self.frame
    }

    /// Capture one frame from the encoder's pixel buffer (row 0 = bottom).
    pub fn capture(&mut self, width: usize, height: usize, pixels: &[u32]) -> Result<PathBuf> {
        let path = self.dir.join(format!("frame_{}.ppm", self.frame));
        write_ppm(&path, width, height, &rgba_to_rgb(pixels))?;
        self.frame += 1;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::pack_rgba;

    #[test]
    fn ppm_header_and_row_order() {
        let dir = std::env::temp_dir().join("smoke-playground-ppm-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("frame.ppm");

        // 2x2: bottom row red, top row blue (input is bottom-to-top).
        let rgb = [255, 0, 0, 255, 0, 0, 0, 0, 255, 0, 0, 255];
        write_ppm(&path, 2, 2, &rgb).unwrap();

        let bytes = fs::read(&path).unwrap();
        let header = b"P6\n2 2\n255\n";
        assert_eq!(&bytes[..header.len()], header);
        assert_eq!(bytes.len(), header.len() + 12);
        // First file row is the top of the image, i.e. the blue row.
        assert_eq!(&bytes[header.len()..header.len() + 3], &[0, 0, 255]);
    }

    #[test]
    fn write_ppm_rejects_wrong_length() {
        let dir = std::env::temp_dir();
        let err = write_ppm(&dir.join("bad.ppm"), 4, 4, &[0; 5]);
        assert!(err.is_err());
    }

    #[test]
    fn recorder_numbers_frames() {
        let dir = std::env::temp_dir().join("smoke-playground-recorder-test");
        let _ = fs::remove_dir_all(&dir);
        let mut recorder = FrameRecorder::new(&dir).unwrap();
        let pixels = vec![pack_rgba(1.0, 0.0, 0.0, 1.0); 4];
        let first = recorder.capture(2, 2, &pixels).unwrap();
        let second = recorder.capture(2, 2, &pixels).unwrap();
        assert!(first.ends_with("frame_0.ppm"));
        assert!(second.ends_with("frame_1.ppm"));
        assert_eq!(recorder.frames_written(), 2);
    }
}
