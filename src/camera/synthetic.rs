use super::stream::VideoStream;
use crate::error::CameraError;
use crate::frame::{FrameSize, SourceId};
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, trace};

const PALETTE: [[u8; 3]; 6] = [
    [40, 90, 160],
    [150, 60, 40],
    [50, 130, 70],
    [140, 120, 30],
    [100, 50, 140],
    [30, 120, 130],
];

const BAR_WIDTH: u32 = 8;

/// Generated test pattern: a solid fill with a sweeping light bar.
///
/// Endpoint form: `synthetic://<label>[?color=r,g,b][&frames=N]`. With
/// `frames` set the stream ends after N frames, which exercises the
/// reconnect path.
pub struct SyntheticStream {
    source_id: SourceId,
    size: FrameSize,
    fill: Rgb<u8>,
    frame_limit: Option<u64>,
    produced: u64,
    ticker: Interval,
    released: bool,
}

impl SyntheticStream {
    pub const SCHEME: &'static str = "synthetic://";

    pub fn from_endpoint(
        source_id: SourceId,
        target: &str,
        size: FrameSize,
        fps: u32,
    ) -> Result<Self, CameraError> {
        let mut fill = Rgb(PALETTE[source_id.0 as usize % PALETTE.len()]);
        let mut frame_limit = None;

        if let Some((_, query)) = target.split_once('?') {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                match key {
                    "color" => fill = parse_color(value).ok_or_else(|| invalid(source_id, pair))?,
                    "frames" => {
                        frame_limit =
                            Some(value.parse::<u64>().map_err(|_| invalid(source_id, pair))?)
                    }
                    _ => return Err(invalid(source_id, pair)),
                }
            }
        }

        let period = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            "Synthetic source {} ({}, fill {:?}, limit {:?})",
            source_id, size, fill.0, frame_limit
        );

        Ok(Self {
            source_id,
            size,
            fill,
            frame_limit,
            produced: 0,
            ticker,
            released: false,
        })
    }

    fn render(&self) -> RgbImage {
        let mut image = RgbImage::from_pixel(self.size.width, self.size.height, self.fill);
        let span = self.size.width.max(1);
        let bar_start = ((self.produced * 4) % span as u64) as u32;

        for x in bar_start..(bar_start + BAR_WIDTH).min(self.size.width) {
            for y in 0..self.size.height {
                image.put_pixel(x, y, Rgb([230, 230, 230]));
            }
        }
        image
    }
}

#[async_trait]
impl VideoStream for SyntheticStream {
    async fn next_frame(&mut self) -> Result<RgbImage, CameraError> {
        if self.released {
            return Err(CameraError::Read {
                source_id: self.source_id,
                details: "stream released".to_string(),
            });
        }
        if let Some(limit) = self.frame_limit {
            if self.produced >= limit {
                return Err(CameraError::EndOfStream {
                    source_id: self.source_id,
                });
            }
        }

        self.ticker.tick().await;
        let frame = self.render();
        self.produced += 1;
        trace!("Synthetic source {} frame {}", self.source_id, self.produced);
        Ok(frame)
    }

    async fn release(&mut self) {
        self.released = true;
    }
}

fn parse_color(value: &str) -> Option<Rgb<u8>> {
    let parts: Vec<u8> = value
        .split(',')
        .map(|p| p.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [r, g, b] => Some(Rgb([*r, *g, *b])),
        _ => None,
    }
}

fn invalid(source_id: SourceId, pair: &str) -> CameraError {
    CameraError::Open {
        source_id,
        details: format!("invalid synthetic parameter '{}'", pair),
    }
}
