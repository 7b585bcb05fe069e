//! Per-frame flavor aggregation.

use std::collections::HashMap;

use serde::Serialize;

use crate::{Detection, PixelCoord};

/// One row per distinct label in a frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlavorStat {
    pub label: String,
    pub count: usize,
    pub avg_confidence: f64,
    /// Coordinate of the last detection of this label in the frame.
    pub last_coord: PixelCoord,
}

struct Accumulator {
    label: String,
    count: usize,
    total_confidence: f64,
    last_coord: PixelCoord,
}

/// Reduce one frame's detections to ranked flavor rows.
///
/// Rows are ordered by average confidence, then count, both descending.
/// Exact ties keep the order in which labels were first seen.
pub fn aggregate(detections: &[Detection]) -> Vec<FlavorStat> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Accumulator> = Vec::new();

    for detection in detections {
        match index.get(detection.label.as_str()) {
            Some(&slot) => {
                let group = &mut groups[slot];
                group.count += 1;
                group.total_confidence += detection.confidence;
                group.last_coord = detection.coord();
            }
            None => {
                index.insert(detection.label.as_str(), groups.len());
                groups.push(Accumulator {
                    label: detection.label.clone(),
                    count: 1,
                    total_confidence: detection.confidence,
                    last_coord: detection.coord(),
                });
            }
        }
    }

    let mut stats: Vec<FlavorStat> = groups
        .into_iter()
        .map(|group| FlavorStat {
            avg_confidence: group.total_confidence / group.count as f64,
            label: group.label,
            count: group.count,
            last_coord: group.last_coord,
        })
        .collect();

    // sort_by is stable, which keeps first-seen order for exact ties.
    stats.sort_by(|a, b| {
        b.avg_confidence
            .total_cmp(&a.avg_confidence)
            .then_with(|| b.count.cmp(&a.count))
    });
    stats
}
