//! 8x8 LED matrix backed by the "RPi-Sense FB" framebuffer
//!
//! Pixels are RGB565, row-major, 128 bytes per frame. Single characters are drawn
//! from a small built-in glyph table covering the joystick acknowledgement letters.
//! Text has no scrolling renderer: it is logged and signalled by a wash of the text
//! colour.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::{colors, MatrixDisplay, Rgb, SensorError};

const FRAMEBUFFER_NAME: &str = "RPi-Sense FB";
const GRAPHICS_CLASS_DIR: &str = "/sys/class/graphics";
const DEV_DIR: &str = "/dev";

pub const PIXELS: usize = 64;
type Frame = [u16; PIXELS];

pub fn rgb565((r, g, b): Rgb) -> u16 {
    ((u16::from(r) >> 3) << 11) | ((u16::from(g) >> 2) << 5) | (u16::from(b) >> 3)
}

fn glyph(ch: char) -> Option<[u8; 8]> {
    let rows = match ch.to_ascii_uppercase() {
        'U' => [0x00, 0x42, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00],
        'D' => [0x00, 0x78, 0x44, 0x42, 0x42, 0x44, 0x78, 0x00],
        'L' => [0x00, 0x40, 0x40, 0x40, 0x40, 0x40, 0x7E, 0x00],
        'R' => [0x00, 0x7C, 0x42, 0x42, 0x7C, 0x48, 0x44, 0x00],
        'M' => [0x00, 0x42, 0x66, 0x5A, 0x42, 0x42, 0x42, 0x00],
        _ => return None,
    };
    Some(rows)
}

pub fn fill_frame(color: Rgb) -> Frame {
    [rgb565(color); PIXELS]
}

/// Draws `ch` in `foreground` over `background`; characters without a glyph
/// fill the whole matrix with the foreground colour.
pub fn character_frame(ch: char, foreground: Rgb, background: Rgb) -> Frame {
    let Some(rows) = glyph(ch) else {
        return fill_frame(foreground);
    };
    let (fg, bg) = (rgb565(foreground), rgb565(background));
    let mut frame = [bg; PIXELS];
    for (y, row) in rows.iter().enumerate() {
        for x in 0..8 {
            if row & (0x80 >> x) != 0 {
                frame[y * 8 + x] = fg;
            }
        }
    }
    frame
}

fn frame_bytes(frame: &Frame) -> [u8; PIXELS * 2] {
    let mut bytes = [0u8; PIXELS * 2];
    for (chunk, pixel) in bytes.chunks_exact_mut(2).zip(frame.iter()) {
        chunk.copy_from_slice(&pixel.to_le_bytes());
    }
    bytes
}

pub struct LedMatrix {
    device: PathBuf,
}

impl LedMatrix {
    pub fn open() -> Result<Self, SensorError> {
        let device = find_framebuffer()?;
        info!("Using LED matrix framebuffer {}", device.display());
        Ok(Self { device })
    }

    fn write_frame(&self, frame: &Frame) {
        let result = OpenOptions::new()
            .write(true)
            .open(&self.device)
            .and_then(|mut fb| fb.write_all(&frame_bytes(frame)));
        if let Err(e) = result {
            warn!("Failed to write LED frame to {}: {}", self.device.display(), e);
        }
    }
}

impl MatrixDisplay for LedMatrix {
    fn clear(&mut self) {
        debug!("Clearing LED matrix");
        self.write_frame(&fill_frame(colors::BLACK));
    }

    fn show_text(&mut self, text: &str, scroll_speed: f32, color: Rgb) {
        info!("LED text ({:?}, speed {}): {}", color, scroll_speed, text);
        self.write_frame(&fill_frame(color));
    }

    fn show_single_character(&mut self, ch: char, foreground: Rgb, background: Rgb) {
        debug!("LED character '{}'", ch);
        self.write_frame(&character_frame(ch, foreground, background));
    }
}

fn find_framebuffer() -> Result<PathBuf, SensorError> {
    for entry in std::fs::read_dir(GRAPHICS_CLASS_DIR)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.starts_with("fb") {
            continue;
        }
        let fb_name = std::fs::read_to_string(entry.path().join("name")).unwrap_or_default();
        if fb_name.trim() == FRAMEBUFFER_NAME {
            return Ok(PathBuf::from(DEV_DIR).join(name));
        }
    }
    Err(SensorError::DeviceNotFound(FRAMEBUFFER_NAME))
}
