use anyhow::{anyhow, Result};
use std::collections::VecDeque;

use crate::detect::backend::{Detector, DetectorFrame, Frame};
use crate::Detection;

/// Scripted backend for tests and dry runs.
///
/// Replays queued frames in order; once the script runs out every poll
/// returns an empty frame.
pub struct ScriptedDetector {
    script: VecDeque<Result<Vec<Detection>, String>>,
    width: u32,
    height: u32,
    polls: usize,
}

impl ScriptedDetector {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            script: VecDeque::new(),
            width,
            height,
            polls: 0,
        }
    }

    pub fn with_frames(mut self, frames: Vec<Vec<Detection>>) -> Self {
        self.script.extend(frames.into_iter().map(Ok));
        self
    }

    pub fn push_frame(&mut self, detections: Vec<Detection>) {
        self.script.push_back(Ok(detections));
    }

    /// Queue a poll that fails with `message`.
    pub fn push_failure(&mut self, message: impl Into<String>) {
        self.script.push_back(Err(message.into()));
    }

    pub fn polls(&self) -> usize {
        self.polls
    }
}

impl Detector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn next_frame(&mut self) -> Result<DetectorFrame> {
        self.polls += 1;
        let detections = match self.script.pop_front() {
            Some(Ok(detections)) => detections,
            Some(Err(message)) => return Err(anyhow!(message)),
            None => Vec::new(),
        };
        Ok(DetectorFrame {
            detections,
            frame: Frame::blank(self.width, self.height),
        })
    }
}
