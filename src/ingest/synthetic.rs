//! Synthetic frame source for `stub://` paths.
//!
//! Produces a forest-like test pattern with a drifting hot spot so that
//! overlays and snapshots have something to show. Query parameters:
//! - `frames=N`: end the stream after N frames (default: endless)
//! - `live=true`: report as a live source (frames get mirrored)

use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use rand::Rng;
use url::Url;

use super::{FrameSource, SourceStats};
use crate::config::SourceSettings;
use crate::frame::Frame;

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub frame_limit: Option<u64>,
    pub live: bool,
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    connected: bool,
    released: bool,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            connected: false,
            released: false,
        }
    }

    /// Parse a `stub://name?frames=N` URL.
    pub fn from_url(url: &str, settings: &SourceSettings) -> Result<Self> {
        let parsed = Url::parse(url).with_context(|| format!("parse stub url '{}'", url))?;
        if parsed.scheme() != "stub" {
            return Err(anyhow!("synthetic source needs a stub:// url, got '{}'", url));
        }
        let mut config = SyntheticConfig {
            name: parsed.host_str().unwrap_or("synthetic").to_string(),
            width: settings.width,
            height: settings.height,
            frame_limit: None,
            live: false,
        };
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "frames" => {
                    config.frame_limit = Some(
                        value
                            .parse()
                            .map_err(|_| anyhow!("stub frames must be an integer"))?,
                    )
                }
                "live" => config.live = value == "true" || value == "1",
                other => log::debug!("SyntheticSource: ignoring query parameter '{}'", other),
            }
        }
        Ok(Self::new(config))
    }

    fn render(&self) -> RgbImage {
        let (w, h) = (self.config.width.max(1), self.config.height.max(1));
        let mut rng = rand::thread_rng();
        let spot_x = (self.frame_count * 4) % u64::from(w);
        let spot_y = u64::from(h) / 2;
        let radius = u64::from(w.min(h) / 10).max(2);

        RgbImage::from_fn(w, h, |x, y| {
            let dx = u64::from(x).abs_diff(spot_x);
            let dy = u64::from(y).abs_diff(spot_y);
            if dx * dx + dy * dy <= radius * radius {
                return Rgb([255, 120 + rng.gen_range(0..60), 0]);
            }
            let shade = ((y * 80) / h) as u8;
            Rgb([20, 60 + shade, 25 + rng.gen_range(0..8)])
        })
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("stub://{}", self.config.name)
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!("SyntheticSource: connected to {} (synthetic)", self.describe());
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.released {
            return Ok(None);
        }
        if !self.connected {
            return Err(anyhow!("synthetic source not connected; call connect() first"));
        }
        if self
            .config
            .frame_limit
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return Ok(None);
        }
        let image = self.render();
        self.frame_count += 1;
        Ok(Some(Frame::new(image)))
    }

    fn is_live(&self) -> bool {
        self.config.live
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            log::info!(
                "SyntheticSource: released {} after {} frames",
                self.describe(),
                self.frame_count
            );
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.describe(),
        }
    }
}
