//! Video source contract and the `VideoCapture`-backed file implementation.

use crate::{Error, Result};
use log::info;
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use std::path::Path;

/// Sequential frame supplier for a session
///
/// End of stream is signaled by `read` returning `Ok(None)`; `rewind` seeks
/// back to the first frame.
pub trait FrameSource: Send {
    /// Pull the next frame, or `None` when the source is exhausted
    fn read(&mut self) -> Result<Option<Mat>>;

    /// Seek back to the first frame
    fn rewind(&mut self) -> Result<()>;

    /// Nominal frame rate, 0.0 when unknown
    fn frames_per_second(&self) -> f64;

    /// Total frame count, 0.0 when unknown
    fn frame_count(&self) -> f64;

    /// Source duration in seconds derived from rate and count
    fn duration_seconds(&self) -> f64 {
        let fps = self.frames_per_second();
        if fps > 0.0 {
            self.frame_count() / fps
        } else {
            0.0
        }
    }
}

/// Video file read through `OpenCV`'s `VideoCapture`
pub struct VideoFile {
    capture: VideoCapture,
    fps: f64,
    frame_count: f64,
}

impl VideoFile {
    /// Open a video file.
    ///
    /// Failing to open the container is the one unrecoverable session-start
    /// error; everything downstream degrades per frame.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::VideoSource(format!("Non-UTF8 video path: {}", path.display())))?;

        info!("Opening video file: {path_str}");
        let capture = VideoCapture::from_file(path_str, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(Error::VideoSource(format!("Cannot open video file: {path_str}")));
        }

        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        let frame_count = capture.get(videoio::CAP_PROP_FRAME_COUNT)?;
        info!("Video source: {fps:.2} fps, {frame_count:.0} frames");

        Ok(Self {
            capture,
            fps,
            frame_count,
        })
    }
}

impl FrameSource for VideoFile {
    fn read(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    fn rewind(&mut self) -> Result<()> {
        self.capture.set(videoio::CAP_PROP_POS_FRAMES, 0.0)?;
        Ok(())
    }

    fn frames_per_second(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> f64 {
        self.frame_count
    }
}
