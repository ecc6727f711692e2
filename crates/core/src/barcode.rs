//! QR encoding of the dashboard token into a fixed 512×512 bitmap
//!
//! The symbol is laid out with a 4-module quiet zone, scaled by the largest
//! integer factor that fits, and centred. Each output pixel is pure black or
//! pure white.

use std::fmt;

use qrcode::render::{unicode, Renderer};
use qrcode::{Color, EcLevel, QrCode};
use tracing::debug;

use crate::error::Result;

/// Side length of the rendered bitmap in pixels
pub const MATRIX_SIZE: usize = 512;

/// Light modules around the symbol required by scanners
pub const QUIET_ZONE: usize = 4;

/// Square monochrome bitmap of a QR symbol
#[derive(Clone, PartialEq, Eq)]
pub struct BarcodeMatrix {
    size: usize,
    /// Row-major, `true` = black
    pixels: Vec<bool>,
    /// Module grid without quiet zone
    modules: Vec<Color>,
    module_count: usize,
}

impl BarcodeMatrix {
    /// Side length in pixels
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the pixel at column `x`, row `y` is black
    ///
    /// Out-of-range coordinates read as white.
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.size && y < self.size && self.pixels[y * self.size + x]
    }

    /// Row-major pixels, `true` = black
    pub fn pixels(&self) -> &[bool] {
        &self.pixels
    }

    /// Modules per side of the underlying symbol
    pub fn module_count(&self) -> usize {
        self.module_count
    }

    pub fn dark_pixel_count(&self) -> usize {
        self.pixels.iter().filter(|&&dark| dark).count()
    }

    /// 8-bit greyscale pixels (0 = black, 255 = white), row-major
    pub fn to_luma8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .map(|&dark| if dark { 0 } else { 255 })
            .collect()
    }

    /// Render the symbol as Unicode half blocks for terminal display
    ///
    /// Colours are inverted so the code reads correctly on dark terminals.
    pub fn to_terminal(&self) -> String {
        Renderer::<unicode::Dense1x2>::new(&self.modules, self.module_count, QUIET_ZONE as u32)
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .build()
    }
}

impl fmt::Debug for BarcodeMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BarcodeMatrix")
            .field("size", &self.size)
            .field("module_count", &self.module_count)
            .field("dark_pixels", &self.dark_pixel_count())
            .finish()
    }
}

/// Encodes payloads as QR Code bitmaps
#[derive(Debug, Clone, Copy)]
pub struct BarcodeEncoder {
    ec_level: EcLevel,
}

impl Default for BarcodeEncoder {
    /// Lowest error correction, maximising capacity
    fn default() -> Self {
        Self {
            ec_level: EcLevel::L,
        }
    }
}

impl BarcodeEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ec_level(mut self, ec_level: EcLevel) -> Self {
        self.ec_level = ec_level;
        self
    }

    /// Encode `payload` into a 512×512 bitmap
    ///
    /// # Errors
    /// `Encoding` when the payload exceeds the symbology's capacity at the
    /// configured error-correction level.
    pub fn encode(&self, payload: &str) -> Result<BarcodeMatrix> {
        let code = QrCode::with_error_correction_level(payload.as_bytes(), self.ec_level)?;
        let module_count = code.width();
        let modules = code.to_colors();

        let quiet_width = module_count + 2 * QUIET_ZONE;
        let multiple = MATRIX_SIZE / quiet_width;
        let padding = (MATRIX_SIZE - module_count * multiple) / 2;

        let mut pixels = vec![false; MATRIX_SIZE * MATRIX_SIZE];
        for y in 0..MATRIX_SIZE {
            let Some(my) = module_index(y, padding, multiple, module_count) else {
                continue;
            };
            for x in 0..MATRIX_SIZE {
                if let Some(mx) = module_index(x, padding, multiple, module_count) {
                    pixels[y * MATRIX_SIZE + x] = modules[my * module_count + mx] == Color::Dark;
                }
            }
        }

        debug!(
            "Encoded {} byte payload as {}x{} modules, {}px per module",
            payload.len(),
            module_count,
            module_count,
            multiple
        );

        Ok(BarcodeMatrix {
            size: MATRIX_SIZE,
            pixels,
            modules,
            module_count,
        })
    }
}

/// Module covering pixel offset `pos`, if inside the symbol
fn module_index(pos: usize, padding: usize, multiple: usize, module_count: usize) -> Option<usize> {
    let offset = pos.checked_sub(padding)?;
    let index = offset / multiple;
    (index < module_count).then_some(index)
}

/// Encode with the default encoder (level L)
pub fn encode(payload: &str) -> Result<BarcodeMatrix> {
    BarcodeEncoder::default().encode(payload)
}
