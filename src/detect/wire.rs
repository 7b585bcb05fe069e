//! Detector service response parsing.
//!
//! Accepts the hosted inference shape:
//! `{ "predictions": [{ "class", "confidence", "x", "y", ... }], "image": { "width", "height" } }`.
//! `class_name` is accepted as an alias for `class`. Unknown fields are ignored.

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::Detection;

#[derive(Debug, Deserialize)]
pub struct PredictionResponse {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
    #[serde(default)]
    pub image: Option<ImageInfo>,
}

#[derive(Debug, Deserialize)]
pub struct Prediction {
    #[serde(rename = "class", alias = "class_name")]
    pub class_name: String,
    pub confidence: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Deserialize)]
pub struct ImageInfo {
    pub width: Dimension,
    pub height: Dimension,
}

/// Some service versions report image dimensions as strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Dimension {
    Number(u32),
    Text(String),
}

impl Dimension {
    pub fn value(&self) -> Result<u32> {
        match self {
            Dimension::Number(n) => Ok(*n),
            Dimension::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| anyhow!("invalid image dimension '{}'", text)),
        }
    }
}

/// Parsed response: detections above threshold plus reported image size.
#[derive(Debug, Default)]
pub struct ParsedPredictions {
    pub detections: Vec<Detection>,
    pub image_size: Option<(u32, u32)>,
}

pub fn parse_predictions(json: &str, confidence_threshold: f64) -> Result<ParsedPredictions> {
    let response: PredictionResponse =
        serde_json::from_str(json).map_err(|e| anyhow!("invalid detector response: {}", e))?;
    let image_size = match response.image {
        Some(image) => Some((image.width.value()?, image.height.value()?)),
        None => None,
    };
    let detections = response
        .predictions
        .into_iter()
        .filter(|p| p.confidence >= confidence_threshold)
        .map(|p| Detection::new(p.class_name, p.confidence, p.x, p.y))
        .collect();
    Ok(ParsedPredictions {
        detections,
        image_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOSTED_RESPONSE: &str = r#"{
        "time": 0.042,
        "image": { "width": "640", "height": "640" },
        "predictions": [
            { "x": 120.5, "y": 88.0, "width": 22, "height": 30,
              "confidence": 0.91, "class": "buttered_popcorn", "class_id": 3 },
            { "x": 400.0, "y": 300.0, "width": 20, "height": 28,
              "confidence": 0.05, "class": "licorice", "class_id": 7 }
        ]
    }"#;

    #[test]
    fn parses_hosted_shape_and_filters_threshold() {
        let parsed = parse_predictions(HOSTED_RESPONSE, 0.10).unwrap();
        assert_eq!(parsed.image_size, Some((640, 640)));
        assert_eq!(parsed.detections.len(), 1);
        assert_eq!(parsed.detections[0].label, "buttered_popcorn");
        assert_eq!(parsed.detections[0].x, 120.5);
    }

    #[test]
    fn accepts_class_name_alias_and_numeric_dimensions() {
        let json = r#"{ "image": { "width": 320, "height": 240 },
            "predictions": [{ "class_name": "cherry", "confidence": 0.5, "x": 1, "y": 2 }] }"#;
        let parsed = parse_predictions(json, 0.0).unwrap();
        assert_eq!(parsed.image_size, Some((320, 240)));
        assert_eq!(parsed.detections[0].label, "cherry");
    }

    #[test]
    fn missing_predictions_is_an_empty_frame() {
        let parsed = parse_predictions("{}", 0.1).unwrap();
        assert!(parsed.detections.is_empty());
        assert!(parsed.image_size.is_none());
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(parse_predictions("{ predictions: ", 0.1).is_err());
        assert!(parse_predictions(r#"{"image":{"width":"wide","height":1}}"#, 0.1).is_err());
    }
}
