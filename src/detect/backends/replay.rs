//! JSON-lines replay backend.
//!
//! Each non-empty line is one recorded detector response. Useful for
//! reproducing a sorting run offline.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use crate::detect::backend::{Detector, DetectorFrame, Frame};
use crate::detect::wire::parse_predictions;

pub struct ReplayDetector {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
    confidence_threshold: f64,
    width: u32,
    height: u32,
}

impl ReplayDetector {
    pub fn open(
        path: impl AsRef<Path>,
        confidence_threshold: f64,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .with_context(|| format!("failed to open replay file {}", path.display()))?;
        Ok(Self {
            path,
            lines: BufReader::new(file).lines(),
            line_no: 0,
            confidence_threshold,
            width,
            height,
        })
    }
}

impl Detector for ReplayDetector {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn next_frame(&mut self) -> Result<DetectorFrame> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line.with_context(|| format!("failed to read {}", self.path.display()))?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let parsed = parse_predictions(trimmed, self.confidence_threshold)
                .with_context(|| format!("{}:{}", self.path.display(), self.line_no))?;
            let (width, height) = parsed.image_size.unwrap_or((self.width, self.height));
            return Ok(DetectorFrame {
                detections: parsed.detections,
                frame: Frame::empty(width, height),
            });
        }
        Err(anyhow!("replay {} exhausted", self.path.display()))
    }
}
