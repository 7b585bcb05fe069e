//! Simulated tray of beans.
//!
//! Reports every bean still on the tray each frame, with a little confidence
//! noise. Beans disappear when a pickup is dispatched for them, so auto-pick
//! runs to completion without hardware.

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::detect::backend::{Detector, DetectorFrame, Frame};
use crate::{Detection, PixelCoord};

pub const FLAVORS: &[&str] = &[
    "buttered_popcorn",
    "very_cherry",
    "green_apple",
    "licorice",
    "lemon_lime",
    "blueberry",
    "cinnamon",
    "coconut",
];

const DEFAULT_BEANS: usize = 12;
const DEFAULT_SEED: u64 = 7;
/// Keep beans away from the frame edge.
const MARGIN: f64 = 24.0;

pub struct SimulatedTray {
    beans: Vec<Detection>,
    width: u32,
    height: u32,
    rng: StdRng,
}

impl SimulatedTray {
    /// Tray with exactly these beans.
    pub fn new(beans: Vec<Detection>, width: u32, height: u32) -> Self {
        Self {
            beans,
            width,
            height,
            rng: StdRng::seed_from_u64(DEFAULT_SEED),
        }
    }

    /// Random tray layout; the same seed always gives the same tray.
    pub fn random(count: usize, seed: u64, width: u32, height: u32) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let max_x = (f64::from(width) - MARGIN).max(MARGIN + 1.0);
        let max_y = (f64::from(height) - MARGIN).max(MARGIN + 1.0);
        let beans = (0..count)
            .map(|_| {
                let label = FLAVORS[rng.gen_range(0..FLAVORS.len())];
                Detection::new(
                    label,
                    rng.gen_range(0.55..0.98),
                    rng.gen_range(MARGIN..max_x).round(),
                    rng.gen_range(MARGIN..max_y).round(),
                )
            })
            .collect();
        Self {
            beans,
            width,
            height,
            rng,
        }
    }

    /// Parse the query part of `sim://tray?beans=N&seed=S`.
    pub fn from_query(query: &str, width: u32, height: u32) -> Result<Self> {
        let mut beans = DEFAULT_BEANS;
        let mut seed = DEFAULT_SEED;
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed tray parameter '{}'", pair))?;
            match key {
                "beans" => {
                    beans = value
                        .parse()
                        .map_err(|_| anyhow!("tray beans must be an integer"))?
                }
                "seed" => {
                    seed = value
                        .parse()
                        .map_err(|_| anyhow!("tray seed must be an integer"))?
                }
                other => return Err(anyhow!("unknown tray parameter '{}'", other)),
            }
        }
        Ok(Self::random(beans, seed, width, height))
    }

    pub fn remaining(&self) -> usize {
        self.beans.len()
    }
}

impl Detector for SimulatedTray {
    fn name(&self) -> &'static str {
        "sim-tray"
    }

    fn next_frame(&mut self) -> Result<DetectorFrame> {
        let rng = &mut self.rng;
        let detections = self
            .beans
            .iter()
            .map(|bean| {
                let jitter: f64 = rng.gen_range(-0.02..0.02);
                Detection {
                    confidence: (bean.confidence + jitter).clamp(0.0, 1.0),
                    ..bean.clone()
                }
            })
            .collect();
        Ok(DetectorFrame {
            detections,
            frame: Frame::blank(self.width, self.height),
        })
    }

    fn notify_picked(&mut self, label: &str, at: PixelCoord) {
        let nearest = self
            .beans
            .iter()
            .enumerate()
            .filter(|(_, bean)| bean.label == label)
            .min_by(|(_, a), (_, b)| {
                distance_sq(a.coord(), at).total_cmp(&distance_sq(b.coord(), at))
            })
            .map(|(index, _)| index);
        if let Some(index) = nearest {
            let bean = self.beans.remove(index);
            log::debug!(
                "sim tray: removed {} at ({}, {}), {} left",
                bean.label,
                bean.x,
                bean.y,
                self.beans.len()
            );
        }
    }
}

fn distance_sq(a: PixelCoord, b: PixelCoord) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_tray() {
        let mut a = SimulatedTray::random(5, 42, 640, 640);
        let mut b = SimulatedTray::random(5, 42, 640, 640);
        let fa = a.next_frame().unwrap();
        let fb = b.next_frame().unwrap();
        let labels_a: Vec<_> = fa.detections.iter().map(|d| (&d.label, d.x, d.y)).collect();
        let labels_b: Vec<_> = fb.detections.iter().map(|d| (&d.label, d.x, d.y)).collect();
        assert_eq!(labels_a, labels_b);
        for d in &fa.detections {
            assert!(d.x >= MARGIN && d.x <= 640.0 - MARGIN);
            assert!((0.0..=1.0).contains(&d.confidence));
        }
    }

    #[test]
    fn picking_removes_nearest_bean_of_that_label() {
        let mut tray = SimulatedTray::new(
            vec![
                Detection::new("lemon_lime", 0.9, 10.0, 10.0),
                Detection::new("lemon_lime", 0.9, 100.0, 100.0),
                Detection::new("licorice", 0.8, 12.0, 12.0),
            ],
            640,
            640,
        );
        tray.notify_picked("lemon_lime", PixelCoord::new(98.0, 97.0));
        let frame = tray.next_frame().unwrap();
        assert_eq!(tray.remaining(), 2);
        assert!(frame
            .detections
            .iter()
            .any(|d| d.label == "lemon_lime" && d.x == 10.0));

        tray.notify_picked("blueberry", PixelCoord::new(0.0, 0.0));
        assert_eq!(tray.remaining(), 2);
    }

    #[test]
    fn query_parsing() {
        let tray = SimulatedTray::from_query("beans=3&seed=1", 640, 640).unwrap();
        assert_eq!(tray.remaining(), 3);
        assert!(SimulatedTray::from_query("beans=lots", 640, 640).is_err());
        assert!(SimulatedTray::from_query("color=red", 640, 640).is_err());
        assert_eq!(
            SimulatedTray::from_query("", 640, 640).unwrap().remaining(),
            DEFAULT_BEANS
        );
    }
}
