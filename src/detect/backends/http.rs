#![cfg(feature = "detector-http")]

//! Hosted inference backend.
//!
//! Polls an inference endpoint that owns the camera and answers each GET with
//! one frame of predictions. Thresholds are sent as percentages, the way the
//! hosted service expects them.

use anyhow::{anyhow, Context, Result};
use url::Url;

use crate::config::DetectorSettings;
use crate::detect::backend::{Detector, DetectorFrame, Frame};
use crate::detect::wire::parse_predictions;

pub struct HttpDetector {
    endpoint: Url,
    api_key: Option<String>,
    confidence_threshold: f64,
    width: u32,
    height: u32,
}

impl HttpDetector {
    pub fn new(settings: &DetectorSettings, width: u32, height: u32) -> Result<Self> {
        let mut endpoint = Url::parse(&settings.source).context("parse detector url")?;
        match endpoint.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported detector scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        endpoint
            .query_pairs_mut()
            .append_pair("model", &settings.model)
            .append_pair("version", &settings.version)
            .append_pair("confidence", &percent(settings.confidence))
            .append_pair("overlap", &percent(settings.overlap));
        Ok(Self {
            endpoint,
            api_key: settings.api_key.clone(),
            confidence_threshold: settings.confidence,
            width,
            height,
        })
    }
}

/// Outcome of an API key check against the detector endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyStatus {
    Valid,
    Invalid,
    Unexpected(u16, String),
}

pub fn classify_status(code: u16, body: String) -> KeyStatus {
    match code {
        200..=299 => KeyStatus::Valid,
        401 | 403 => KeyStatus::Invalid,
        _ => KeyStatus::Unexpected(code, body),
    }
}

impl HttpDetector {
    fn request(&self) -> ureq::Request {
        let request = ureq::get(self.endpoint.as_str());
        match &self.api_key {
            Some(key) => request.set("Authorization", &format!("Bearer {}", key)),
            None => request,
        }
    }

    /// Ask the endpoint whether it accepts the configured key.
    ///
    /// Transport failures are errors; any HTTP answer is a `KeyStatus`.
    pub fn check_key(&self) -> Result<KeyStatus> {
        match self.request().call() {
            Ok(response) => Ok(classify_status(response.status(), String::new())),
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                Ok(classify_status(code, body))
            }
            Err(err) => Err(err).context("detector request failed"),
        }
    }
}

impl Detector for HttpDetector {
    fn name(&self) -> &'static str {
        "http"
    }

    /// Checks the API key before streaming starts.
    fn warm_up(&mut self) -> Result<()> {
        match self.check_key()? {
            KeyStatus::Valid => Ok(()),
            KeyStatus::Invalid => Err(anyhow!("invalid API key")),
            KeyStatus::Unexpected(code, body) => Err(anyhow!(
                "unexpected detector response: {} - {}",
                code,
                body.trim()
            )),
        }
    }

    fn next_frame(&mut self) -> Result<DetectorFrame> {
        let body = match self.request().call() {
            Ok(response) => response.into_string().context("read detector response")?,
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(match classify_status(code, body) {
                    KeyStatus::Invalid => anyhow!("invalid API key (HTTP {})", code),
                    _ => anyhow!("detector returned HTTP {}", code),
                });
            }
            Err(err) => return Err(err).context("detector request failed"),
        };
        let parsed = parse_predictions(&body, self.confidence_threshold)?;
        let (width, height) = parsed.image_size.unwrap_or((self.width, self.height));
        Ok(DetectorFrame {
            detections: parsed.detections,
            frame: Frame::empty(width, height),
        })
    }
}

fn percent(fraction: f64) -> String {
    format!("{}", (fraction * 100.0).round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_query_with_percent_thresholds() {
        let settings = DetectorSettings {
            source: "http://127.0.0.1:9001/infer".to_string(),
            ..DetectorSettings::default()
        };
        let detector = HttpDetector::new(&settings, 640, 640).unwrap();
        let query = detector.endpoint.query().unwrap_or_default().to_string();
        assert!(query.contains("model=jellybelly5"));
        assert!(query.contains("confidence=10"));
        assert!(query.contains("overlap=50"));
    }

    #[test]
    fn status_codes_map_to_key_status() {
        assert_eq!(classify_status(200, String::new()), KeyStatus::Valid);
        assert_eq!(classify_status(401, "nope".to_string()), KeyStatus::Invalid);
        assert_eq!(classify_status(403, String::new()), KeyStatus::Invalid);
        assert_eq!(
            classify_status(500, "boom".to_string()),
            KeyStatus::Unexpected(500, "boom".to_string())
        );
    }

    #[test]
    fn rejects_non_http_scheme() {
        let settings = DetectorSettings {
            source: "ftp://camera/infer".to_string(),
            ..DetectorSettings::default()
        };
        assert!(HttpDetector::new(&settings, 640, 640).is_err());
    }
}
