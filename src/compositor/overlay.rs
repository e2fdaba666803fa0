use crate::annotation::Detection;
use crate::config::DisplayConfig;
use crate::error::{Result, SentryError};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const SUMMARY_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const INFO_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const DETECTION_TEXT_SIZE: f32 = 16.0;

/// TrueType font used for every label
pub struct LabelFont {
    font: Font<'static>,
}

impl LabelFont {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| {
            SentryError::component(
                "overlay".to_string(),
                format!("Failed to read font file '{}': {}", path.display(), e),
            )
        })?;

        let font = Font::try_from_vec(data).ok_or_else(|| {
            SentryError::component(
                "overlay".to_string(),
                format!("Failed to parse font file '{}'", path.display()),
            )
        })?;

        debug!("Loaded label font {}", path.display());
        Ok(Self { font })
    }

    pub fn text_size(&self, size: f32, text: &str) -> (i32, i32) {
        text_size(Scale::uniform(size), &self.font, text)
    }

    /// Draw `text` with its top-left corner at (x, y)
    pub fn draw(&self, image: &mut RgbImage, text: &str, x: i32, y: i32, size: f32, color: Rgb<u8>) {
        draw_text_mut(image, color, x, y, Scale::uniform(size), &self.font, text);
    }
}

/// Font and colour choices for drawn labels
#[derive(Clone)]
pub struct OverlayStyle {
    pub font: Option<Arc<LabelFont>>,
    pub color: Rgb<u8>,
    pub size: f32,
}

impl OverlayStyle {
    /// Build the style from display settings. A missing or unreadable font
    /// disables text but keeps box drawing.
    pub fn from_config(config: &DisplayConfig) -> Self {
        let font = match LabelFont::load(&config.font_path) {
            Ok(font) => Some(Arc::new(font)),
            Err(e) => {
                warn!("Labels disabled: {}", e);
                None
            }
        };

        Self {
            font,
            color: config.label_color.rgb(),
            size: config.label_size.pixels(),
        }
    }

    /// Style without text rendering
    pub fn boxes_only() -> Self {
        Self {
            font: None,
            color: Rgb([255, 0, 0]),
            size: 16.0,
        }
    }
}

/// Draw detection boxes, per-box labels and a summary line onto `image`
pub fn draw_detections(
    image: &mut RgbImage,
    detections: &[Detection],
    camera_id: u32,
    style: &OverlayStyle,
    show_identity: bool,
) {
    for (i, detection) in detections.iter().enumerate() {
        let Some(rect) = detection.bbox.clamped_rect(image.width(), image.height()) else {
            continue;
        };

        draw_hollow_rect_mut(image, rect, BOX_COLOR);
        if rect.width() > 2 && rect.height() > 2 {
            let inner = Rect::at(rect.left() + 1, rect.top() + 1)
                .of_size(rect.width() - 2, rect.height() - 2);
            draw_hollow_rect_mut(image, inner, BOX_COLOR);
        }

        let Some(font) = &style.font else {
            continue;
        };

        let mut label = format!("Human {}: {:.2}", i + 1, detection.confidence);
        if show_identity {
            if let Some(identity) = &detection.label {
                label.push_str(&format!(" ({})", identity));
            }
        }

        let (text_w, text_h) = font.text_size(DETECTION_TEXT_SIZE, &label);
        let top = (rect.top() - text_h - 6).max(0);
        if text_w > 0 && text_h > 0 {
            draw_filled_rect_mut(
                image,
                Rect::at(rect.left(), top).of_size(text_w as u32, (text_h + 6) as u32),
                BOX_COLOR,
            );
        }
        font.draw(image, &label, rect.left(), top + 3, DETECTION_TEXT_SIZE, BOX_TEXT_COLOR);
    }

    if let Some(font) = &style.font {
        let summary = format!("Cam {}: {} humans detected", camera_id, detections.len());
        font.draw(image, &summary, 10, 10, DETECTION_TEXT_SIZE + 2.0, SUMMARY_COLOR);
    }
}

/// Target-rate banner across the top of the composite
pub fn draw_info_overlay(image: &mut RgbImage, target_fps: u32, style: &OverlayStyle) {
    let Some(font) = &style.font else {
        return;
    };
    let text = format!("FPS Target: {} | Sync Check", target_fps);
    let y = image.height().saturating_sub(30) as i32;
    font.draw(image, &text, 10, y, DETECTION_TEXT_SIZE + 2.0, INFO_COLOR);
}
