//! External flavor detector boundary.
//!
//! The detector is a black box: ask for the next frame, get back classified
//! detections and the frame they came from. Backends:
//! - `sim://tray?beans=N&seed=S`: simulated tray (no camera needed)
//! - `http(s)://...`: hosted inference endpoint (feature: detector-http)
//! - anything else: path to a JSON-lines replay file

mod backend;
pub mod backends;
pub mod wire;

use anyhow::{anyhow, Result};

pub use backend::{Detector, DetectorFrame, Frame};
pub use backends::{ReplayDetector, ScriptedDetector, SimulatedTray};
pub use wire::parse_predictions;

use crate::config::{DetectorSettings, FrameSettings};

const SIM_TRAY_PREFIX: &str = "sim://tray";

/// Build the detector named by `settings.source`.
pub fn open_detector(
    settings: &DetectorSettings,
    frame: &FrameSettings,
) -> Result<Box<dyn Detector>> {
    let source = settings.source.trim();
    if let Some(rest) = source.strip_prefix(SIM_TRAY_PREFIX) {
        let query = rest.strip_prefix('?').unwrap_or(rest);
        if !rest.is_empty() && !rest.starts_with('?') {
            return Err(anyhow!("unknown simulated source '{}'", source));
        }
        let tray = SimulatedTray::from_query(query, frame.width, frame.height)?;
        log::info!("detector: simulated tray with {} beans", tray.remaining());
        return Ok(Box::new(tray));
    }
    if source.starts_with("http://") || source.starts_with("https://") {
        #[cfg(feature = "detector-http")]
        {
            let detector = backends::HttpDetector::new(settings, frame.width, frame.height)?;
            log::info!(
                "detector: hosted model {} v{} at {}",
                settings.model,
                settings.version,
                source
            );
            return Ok(Box::new(detector));
        }
        #[cfg(not(feature = "detector-http"))]
        {
            return Err(anyhow!("http detector requires the detector-http feature"));
        }
    }
    if source.contains("://") {
        return Err(anyhow!("unsupported detector source '{}'", source));
    }
    let replay = ReplayDetector::open(source, settings.confidence, frame.width, frame.height)?;
    log::info!("detector: replaying {}", source);
    Ok(Box::new(replay))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(source: &str) -> DetectorSettings {
        DetectorSettings {
            source: source.to_string(),
            ..DetectorSettings::default()
        }
    }

    #[test]
    fn sim_tray_sources() {
        let frame = FrameSettings::default();
        let mut detector = open_detector(&settings("sim://tray?beans=4&seed=9"), &frame).unwrap();
        assert_eq!(detector.name(), "sim-tray");
        assert_eq!(detector.next_frame().unwrap().detections.len(), 4);
        assert!(open_detector(&settings("sim://tray"), &frame).is_ok());
        assert!(open_detector(&settings("sim://trayful"), &frame).is_err());
    }

    #[test]
    fn unknown_scheme_and_missing_replay_fail() {
        let frame = FrameSettings::default();
        assert!(open_detector(&settings("rtsp://camera"), &frame).is_err());
        assert!(open_detector(&settings("/nonexistent/replay.jsonl"), &frame).is_err());
    }
}
