use crate::error::CompositorError;
use crate::frame::FrameSize;
use image::{imageops, RgbImage};
use std::time::{Duration, Instant};

/// Canvas size and per-frame origins for a given source count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub positions: Vec<(u32, u32)>,
}

/// Grid placement for `count` frames of `frame` size.
///
/// One or two frames sit side by side in a single row. From three frames on
/// the first row holds frames 0 and 1 and the second row holds the rest. A
/// lone frame in the second row is centred; otherwise rows are left aligned
/// and the narrower row is zero padded on the right.
pub fn layout(count: usize, frame: FrameSize) -> Option<Layout> {
    let w = frame.width;
    let h = frame.height;

    match count {
        0 => None,
        1 => Some(Layout {
            width: w,
            height: h,
            positions: vec![(0, 0)],
        }),
        2 => Some(Layout {
            width: 2 * w,
            height: h,
            positions: vec![(0, 0), (w, 0)],
        }),
        _ => {
            let second_row = (count - 2) as u32;
            let width = (2 * w).max(second_row * w);
            let offset = if second_row == 1 { (width - w) / 2 } else { 0 };

            let mut positions = vec![(0, 0), (w, 0)];
            positions.extend((0..second_row).map(|i| (offset + i * w, h)));

            Some(Layout {
                width,
                height: 2 * h,
                positions,
            })
        }
    }
}

/// Assemble equally sized frames into one buffer per [`layout`].
///
/// Returns `Ok(None)` for an empty list. Padding is zero filled.
pub fn compose(frames: &[&RgbImage]) -> Result<Option<RgbImage>, CompositorError> {
    let Some(first) = frames.first() else {
        return Ok(None);
    };
    let size = FrameSize::of(first);

    for (index, frame) in frames.iter().enumerate() {
        if FrameSize::of(frame) != size {
            return Err(CompositorError::MismatchedFrame {
                index,
                expected_width: size.width,
                expected_height: size.height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }
    }

    if frames.len() == 1 {
        return Ok(Some((*first).clone()));
    }

    let Some(grid) = layout(frames.len(), size) else {
        return Ok(None);
    };

    let mut canvas = RgbImage::new(grid.width, grid.height);
    for (frame, (x, y)) in frames.iter().zip(grid.positions.iter()) {
        imageops::replace(&mut canvas, *frame, *x as i64, *y as i64);
    }

    Ok(Some(canvas))
}

/// Largest capture time difference among the given timestamps
pub fn max_timestamp_skew<I>(timestamps: I) -> Duration
where
    I: IntoIterator<Item = Instant>,
{
    let mut bounds: Option<(Instant, Instant)> = None;
    for at in timestamps {
        bounds = Some(match bounds {
            None => (at, at),
            Some((lo, hi)) => (lo.min(at), hi.max(at)),
        });
    }

    bounds.map(|(lo, hi)| hi - lo).unwrap_or_default()
}
