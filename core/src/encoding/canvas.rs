use crate::prelude::{EncodeError, EncodeResult};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder as _};
use log::debug;
use plotters::coord::Shift;
use plotters::prelude::*;

/// Largest side of every rendered figure, in pixels.
pub const MAX_SIDE_PX: u32 = 512;

const BYTES_PER_PIXEL: usize = 3;

/// Drawing surface handed to renderers.
pub type Surface<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Scoped RGB drawing buffer reused across renders.
///
/// The pixel buffer is cleared before each render and released when the
/// canvas goes out of scope, on success and error paths alike.
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    renders: usize,
}

impl Canvas {
    /// Allocates a canvas with the given aspect ratio, scaled so the larger
    /// side is [`MAX_SIDE_PX`].
    pub fn with_units(width_units: f64, height_units: f64) -> Self {
        let (width, height) = pixel_size(width_units, height_units);
        debug!("allocating {}x{} canvas", width, height);
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
            renders: 0,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Clears the buffer, runs `paint` on it and returns the result as PNG.
    pub fn render<F>(&mut self, paint: F) -> EncodeResult<Vec<u8>>
    where
        F: FnOnce(&Surface<'_>) -> EncodeResult<()>,
    {
        {
            let root = BitMapBackend::with_buffer(&mut self.pixels, (self.width, self.height))
                .into_drawing_area();
            root.fill(&WHITE).map_err(render_error)?;
            paint(&root)?;
            root.present().map_err(render_error)?;
        }
        self.renders += 1;

        let mut png = Vec::new();
        PngEncoder::new(&mut png).write_image(
            &self.pixels,
            self.width,
            self.height,
            ExtendedColorType::Rgb8,
        )?;
        Ok(png)
    }
}

impl Drop for Canvas {
    fn drop(&mut self) {
        debug!(
            "releasing {}x{} canvas after {} renders",
            self.width, self.height, self.renders
        );
        self.pixels = Vec::new();
    }
}

/// Pixel size for a figure of the given proportions; the larger side maps to
/// [`MAX_SIDE_PX`] and the other is truncated.
pub fn pixel_size(width_units: f64, height_units: f64) -> (u32, u32) {
    let max = MAX_SIDE_PX as f64;
    if width_units > height_units {
        (MAX_SIDE_PX, ((max * height_units / width_units) as u32).max(1))
    } else {
        (((max * width_units / height_units) as u32).max(1), MAX_SIDE_PX)
    }
}

pub(crate) fn render_error<E: std::fmt::Display>(err: E) -> EncodeError {
    EncodeError::Render(err.to_string())
}
