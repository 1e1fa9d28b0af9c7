//! Offscreen 2D surfaces rasterized on the CPU with tiny-skia.
//!
//! A [`Canvas`] is the pixel store (premultiplied RGBA8), and a
//! [`CanvasRenderingContext2d`] owns one and draws into it.

pub mod context;
pub mod style;

pub use context::CanvasRenderingContext2d;
pub use style::{parse_color, CompositeOperation};

use std::path::Path;
use tiny_skia::{ColorU8, Pixmap};

/// Errors that can occur when creating or converting surfaces.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("Invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("Pixel data has {actual} bytes, expected {expected}")]
    DataLength { expected: usize, actual: usize },
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// An offscreen 2D surface.
///
/// Width and height are always non-zero; zero-sized surfaces are rejected
/// at construction instead of being left to the rasterizer.
#[derive(Clone, Debug, PartialEq)]
pub struct Canvas {
    pixmap: Pixmap,
}

impl Canvas {
    /// Create a fully transparent surface.
    pub fn new(width: u32, height: u32) -> Result<Self, SurfaceError> {
        Pixmap::new(width, height)
            .map(|pixmap| Self { pixmap })
            .ok_or(SurfaceError::InvalidSize { width, height })
    }

    /// Create a surface from straight-alpha RGBA8 rows.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<Self, SurfaceError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(SurfaceError::DataLength {
                expected,
                actual: rgba.len(),
            });
        }

        let mut canvas = Self::new(width, height)?;
        for (dst, src) in canvas
            .pixmap
            .pixels_mut()
            .iter_mut()
            .zip(rgba.chunks_exact(4))
        {
            *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
        }
        Ok(canvas)
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Export the surface as straight-alpha RGBA8 rows.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.pixmap.data().len());
        for pixel in self.pixmap.pixels() {
            let color = pixel.demultiply();
            rgba.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        rgba
    }

    /// Read a single straight-alpha pixel, `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixmap.pixel(x, y).map(|pixel| {
            let color = pixel.demultiply();
            [color.red(), color.green(), color.blue(), color.alpha()]
        })
    }

    /// Convert to an `image` buffer (straight alpha).
    pub fn to_image(&self) -> image::RgbaImage {
        let width = self.width();
        let pixels = self.pixmap.pixels();
        image::RgbaImage::from_fn(width, self.height(), |x, y| {
            let color = pixels[(y * width + x) as usize].demultiply();
            image::Rgba([color.red(), color.green(), color.blue(), color.alpha()])
        })
    }

    /// Write the surface to a PNG file.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), SurfaceError> {
        self.to_image().save(path)?;
        Ok(())
    }

    pub(crate) fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub(crate) fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sized_surface_is_rejected() {
        assert!(matches!(
            Canvas::new(0, 16),
            Err(SurfaceError::InvalidSize {
                width: 0,
                height: 16
            })
        ));
        assert!(Canvas::new(16, 0).is_err());
    }

    #[test]
    fn test_new_surface_is_transparent() {
        let canvas = Canvas::new(4, 3).unwrap();
        assert_eq!(canvas.width(), 4);
        assert_eq!(canvas.height(), 3);
        assert!(canvas.to_rgba().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_rgba_import_keeps_opaque_pixels() {
        let rgba = [255, 0, 0, 255, 0, 128, 255, 255];
        let canvas = Canvas::from_rgba(2, 1, &rgba).unwrap();
        assert_eq!(canvas.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(canvas.pixel(1, 0), Some([0, 128, 255, 255]));
        assert_eq!(canvas.pixel(2, 0), None);
    }

    #[test]
    fn test_rgba_import_rejects_wrong_length() {
        let result = Canvas::from_rgba(2, 2, &[0u8; 12]);
        assert!(matches!(
            result,
            Err(SurfaceError::DataLength {
                expected: 16,
                actual: 12
            })
        ));
    }

    #[test]
    fn test_translucent_pixels_survive_premultiplication() {
        let canvas = Canvas::from_rgba(1, 1, &[200, 100, 50, 128]).unwrap();
        let [r, g, b, a] = canvas.pixel(0, 0).unwrap();
        assert_eq!(a, 128);
        assert!((r as i32 - 200).abs() <= 2);
        assert!((g as i32 - 100).abs() <= 2);
        assert!((b as i32 - 50).abs() <= 2);
    }

    #[test]
    fn test_to_image_matches_pixels() {
        let canvas = Canvas::from_rgba(2, 1, &[1, 2, 3, 255, 4, 5, 6, 255]).unwrap();
        let image = canvas.to_image();
        assert_eq!(image.dimensions(), (2, 1));
        assert_eq!(image.get_pixel(1, 0).0, [4, 5, 6, 255]);
    }
}
