//! Pixel checks on frames served by the image endpoint.

use std::io::Cursor;
use std::ops::Range;

use anyhow::{bail, Context, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

pub const REQUESTED_WIDTH: u32 = 654;
pub const REQUESTED_HEIGHT: u32 = 468;

/// Height of the control bar drawn above the page content.
pub const CONTROL_BAR_ROWS: u32 = 27;

/// Colours of the 2x4 test image, row by row.
pub const TEST_COLORS: [[[u8; 3]; 4]; 2] = [
    [[0, 212, 133], [6, 85, 41], [43, 142, 46], [229, 245, 6]],
    [[46, 182, 102], [174, 99, 239], [235, 116, 241], [95, 91, 113]],
];
pub const TEST_IMAGE_SCALE: u32 = 150;
pub const MIN_TEST_COLOR_PIXELS: usize = 20_000;

/// A decoded 8-bit frame, row-major with `channels` bytes per pixel.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    data: Vec<u8>,
}

impl Frame {
    /// Decode a PNG or JPEG response body.
    ///
    /// Only 8-bit images with a channel axis (RGB, RGBA, grey+alpha) are
    /// accepted; plain greyscale has no channel axis and is rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes).context("decoding image")?;
        let (width, height) = (img.width(), img.height());
        let (channels, data) = match img {
            DynamicImage::ImageRgb8(buf) => (3, buf.into_raw()),
            DynamicImage::ImageRgba8(buf) => (4, buf.into_raw()),
            DynamicImage::ImageLumaA8(buf) => (2, buf.into_raw()),
            DynamicImage::ImageLuma8(_) => {
                bail!("Image has incorrect dimensionality 2 != 3")
            }
            other => bail!("Image has incorrect datatype {:?} != u8", other.color()),
        };
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn from_rgb(img: &RgbImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            channels: 3,
            data: img.as_raw().clone(),
        }
    }

    pub fn shape(&self) -> (u32, u32, u8) {
        (self.height, self.width, self.channels)
    }

    /// The server may round the requested size up by a pixel or two.
    pub fn has_expected_shape(&self) -> bool {
        (REQUESTED_HEIGHT..=REQUESTED_HEIGHT + 2).contains(&self.height)
            && (REQUESTED_WIDTH..=REQUESTED_WIDTH + 1).contains(&self.width)
            && self.channels == 3
    }

    fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let channels = usize::from(self.channels);
        let start = (y as usize * self.width as usize + x as usize) * channels;
        &self.data[start..start + channels]
    }

    /// Mean over every channel of `rows` x `0..REQUESTED_WIDTH`, clipped to the frame.
    pub fn mean_brightness(&self, rows: Range<u32>) -> f64 {
        let rows = rows.start.min(self.height)..rows.end.min(self.height);
        let cols = 0..REQUESTED_WIDTH.min(self.width);
        let mut sum = 0u64;
        let mut count = 0u64;
        for y in rows {
            for x in cols.clone() {
                for &value in self.pixel(x, y) {
                    sum += u64::from(value);
                    count += 1;
                }
            }
        }
        if count == 0 {
            0.0
        } else {
            sum as f64 / count as f64
        }
    }

    pub fn control_bar_brightness(&self) -> f64 {
        self.mean_brightness(0..CONTROL_BAR_ROWS)
    }

    pub fn content_brightness(&self) -> f64 {
        self.mean_brightness(CONTROL_BAR_ROWS..REQUESTED_HEIGHT)
    }

    /// Number of pixels exactly equal to `color`.
    pub fn count_color(&self, color: [u8; 3]) -> usize {
        if self.channels != 3 {
            return 0;
        }
        self.data
            .chunks_exact(3)
            .filter(|px| *px == color.as_slice())
            .count()
    }
}

/// Grey control bar over an empty white page.
pub fn is_empty_page(frame: &Frame) -> bool {
    (frame.control_bar_brightness() - 196.0).abs() < 8.0
        && (frame.content_brightness() - 255.0).abs() < 1e-3
}

/// Page content darkened by text.
pub fn has_text_content(frame: &Frame) -> bool {
    (128.0..=224.0).contains(&frame.content_brightness())
}

pub fn test_color_counts(frame: &Frame) -> Vec<usize> {
    TEST_COLORS
        .iter()
        .flatten()
        .map(|color| frame.count_color(*color))
        .collect()
}

pub fn shows_test_image(frame: &Frame) -> bool {
    test_color_counts(frame)
        .iter()
        .all(|&count| count >= MIN_TEST_COLOR_PIXELS)
}

/// The test image: each colour of [`TEST_COLORS`] as a 150x150 block.
pub fn test_image() -> RgbImage {
    let cols = TEST_COLORS[0].len() as u32;
    let rows = TEST_COLORS.len() as u32;
    RgbImage::from_fn(cols * TEST_IMAGE_SCALE, rows * TEST_IMAGE_SCALE, |x, y| {
        Rgb(TEST_COLORS[(y / TEST_IMAGE_SCALE) as usize][(x / TEST_IMAGE_SCALE) as usize])
    })
}

pub fn test_image_png() -> Result<Vec<u8>> {
    let mut png = Cursor::new(Vec::new());
    test_image()
        .write_to(&mut png, ImageFormat::Png)
        .context("encoding test image")?;
    Ok(png.into_inner())
}
