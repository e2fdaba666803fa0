use super::overlay::OverlayStyle;
use crate::frame::{FrameSize, SourceId};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use std::collections::HashMap;
use std::sync::Arc;

/// Renders and caches the stand-in frame shown for a source without data
pub struct PlaceholderRenderer {
    size: FrameSize,
    style: OverlayStyle,
    cache: HashMap<SourceId, Arc<RgbImage>>,
}

impl PlaceholderRenderer {
    pub fn new(size: FrameSize, style: OverlayStyle) -> Self {
        Self {
            size,
            style,
            cache: HashMap::new(),
        }
    }

    pub fn size(&self) -> FrameSize {
        self.size
    }

    /// Black frame of the configured size labelled with the source id.
    /// Falls back to block digits when no font is available.
    pub fn render(&mut self, source_id: SourceId) -> Arc<RgbImage> {
        let size = self.size;
        let style = &self.style;
        Arc::clone(
            self.cache
                .entry(source_id)
                .or_insert_with(|| Arc::new(draw_placeholder(source_id, size, style))),
        )
    }
}

fn draw_placeholder(source_id: SourceId, size: FrameSize, style: &OverlayStyle) -> RgbImage {
    let mut image = RgbImage::new(size.width, size.height);

    if let Some(font) = &style.font {
        let text = format!("Camera {} Disconnected", source_id);
        let y = (size.height as f32 / 2.0 - style.size / 2.0).max(0.0) as i32;
        font.draw(&mut image, &text, 20, y, style.size, style.color);
    } else {
        draw_block_digits(&mut image, source_id.0, style.color);
    }

    image
}

/// 3x5 bitmaps for 0-9, one row per byte, high bit on the left
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b011, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b010, 0b010, 0b010],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

/// Source id as centred block digits, used when no font could be loaded.
/// The top-left corner stays black for `is_likely_placeholder`.
fn draw_block_digits(image: &mut RgbImage, id: u32, color: Rgb<u8>) {
    let digits: Vec<usize> = id
        .to_string()
        .bytes()
        .map(|b| (b - b'0') as usize)
        .collect();

    let cell = (image.height() / 40).max(1);
    // Each glyph is 3 cells wide with a 1 cell gap
    let text_w = (digits.len() as u32 * 4 - 1) * cell;
    let text_h = 5 * cell;
    let left = image.width().saturating_sub(text_w) / 2;
    let top = image.height().saturating_sub(text_h) / 2;

    for (i, digit) in digits.iter().enumerate() {
        let glyph_x = left + i as u32 * 4 * cell;
        for (row, bits) in DIGITS[*digit].iter().enumerate() {
            for col in 0..3u32 {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                let x = glyph_x + col * cell;
                let y = top + row as u32 * cell;
                draw_filled_rect_mut(
                    image,
                    Rect::at(x as i32, y as i32).of_size(cell, cell),
                    color,
                );
            }
        }
    }
}

/// Cheap check for a generated placeholder: the top-left `probe` x `probe`
/// square is entirely black. A genuinely dark camera frame also matches.
pub fn is_likely_placeholder(image: &RgbImage, probe: u32) -> bool {
    let w = probe.min(image.width());
    let h = probe.min(image.height());
    if w == 0 || h == 0 {
        return false;
    }

    (0..h).all(|y| (0..w).all(|x| image.get_pixel(x, y).0 == [0, 0, 0]))
}
