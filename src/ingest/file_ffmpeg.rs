//! Local video file source using FFmpeg.
//!
//! Frames are decoded in-memory and converted to RGB24. End of file drains the
//! decoder and then reports end of stream.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;
use std::path::PathBuf;

use super::SourceStats;
use crate::frame::Frame;

struct FfmpegState {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    eof_sent: bool,
}

pub(crate) struct FfmpegFileSource {
    path: PathBuf,
    state: Option<FfmpegState>,
    frame_count: u64,
}

impl FfmpegFileSource {
    pub(crate) fn new(path: PathBuf) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        Ok(Self {
            path,
            state: None,
            frame_count: 0,
        })
    }

    pub(crate) fn describe(&self) -> String {
        self.path.display().to_string()
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        let input = ffmpeg::format::input(&self.path).with_context(|| {
            format!("failed to open file input '{}' with ffmpeg", self.path.display())
        })?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "FileSource: connected to {} (ffmpeg, {}x{})",
            self.path.display(),
            decoder.width(),
            decoder.height()
        );
        self.state = Some(FfmpegState {
            input,
            stream_index,
            decoder,
            scaler,
            eof_sent: false,
        });
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        let mut decoded = ffmpeg::frame::Video::empty();
        let mut rgb_frame = ffmpeg::frame::Video::empty();

        loop {
            if state.decoder.receive_frame(&mut decoded).is_ok() {
                state
                    .scaler
                    .run(&decoded, &mut rgb_frame)
                    .context("scale frame to RGB")?;
                let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
                self.frame_count += 1;
                return Frame::from_rgb(pixels, width, height).map(Some);
            }
            if state.eof_sent {
                return Ok(None);
            }

            let mut fed = false;
            let stream_index = state.stream_index;
            for (stream, packet) in state.input.packets() {
                if stream.index() != stream_index {
                    continue;
                }
                state
                    .decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?;
                fed = true;
                break;
            }
            if !fed {
                state.decoder.send_eof().context("flush ffmpeg decoder")?;
                state.eof_sent = true;
            }
        }
    }

    pub(crate) fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!(
                "FileSource: released {} after {} frames",
                self.path.display(),
                self.frame_count
            );
        }
    }

    pub(crate) fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.describe(),
        }
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let packed = data
            .get(..row_bytes * height as usize)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Ok((packed.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
