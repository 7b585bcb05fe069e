use anyhow::Result;

use crate::{Detection, PixelCoord};

/// Raw RGB8 frame as returned by the detector service.
///
/// `pixels` may be empty when the service returns detections only.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0xff; width as usize * height as usize * 3],
        }
    }

    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: Vec::new(),
        }
    }

    pub fn has_pixels(&self) -> bool {
        !self.pixels.is_empty()
    }
}

/// One poll of the detector: what it saw and the frame it saw it in.
#[derive(Clone, Debug, Default)]
pub struct DetectorFrame {
    pub detections: Vec<Detection>,
    pub frame: Frame,
}

/// External flavor detector.
///
/// Each call to `next_frame` blocks until the service hands back one frame of
/// classified detections. Implementations own their camera or connection.
pub trait Detector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Poll the next frame.
    fn next_frame(&mut self) -> Result<DetectorFrame>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called after a pickup macro for `label` at `at` was dispatched.
    fn notify_picked(&mut self, _label: &str, _at: PixelCoord) {}
}
