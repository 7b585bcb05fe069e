//! Jelly bean sorter core.
//!
//! The sorter watches a tray through an external flavor detector, ranks what it
//! sees, and drives a G-code pick-and-place machine over a serial line.
//!
//! Data flow for one pick:
//! 1. `detect` produces one frame of `Detection`s.
//! 2. `aggregate` reduces them to ranked `FlavorStat` rows.
//! 3. `mapping` converts the chosen row's pixel coordinate to machine units.
//! 4. `gcode` builds the fixed pickup macro.
//! 5. `dispatch` sends each command and waits for the acknowledgement.
//!
//! `session` owns the run state and wires the stages together.

pub mod aggregate;
pub mod config;
pub mod console;
pub mod detect;
pub mod dispatch;
pub mod gcode;
pub mod mapping;
pub mod render;
pub mod session;

use serde::{Deserialize, Serialize};

pub use aggregate::{aggregate, FlavorStat};
pub use config::SorterConfig;
pub use console::ConsoleCommand;
pub use detect::{open_detector, Detector, DetectorFrame, Frame};
pub use dispatch::{Channel, Dispatcher, Endpoint, MockChannel};
pub use gcode::{build_sequence, Command, MachineProfile, MaintenanceAction, TravelBounds};
pub use mapping::{AxisTransform, CoordinateMapper, Orientation};
pub use session::{
    transition, CycleError, PickError, Session, SessionAction, SessionState, TransitionError,
};

/// A position in frame pixels, as reported by the detector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelCoord {
    pub x: f64,
    pub y: f64,
}

impl PixelCoord {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A position in machine units, ready to embed in a move command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineCoordinate {
    pub x_mm: f64,
    pub y_mm: f64,
}

/// One classified object reported by the detector for a single frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f64,
    pub x: f64,
    pub y: f64,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f64, x: f64, y: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
            x,
            y,
        }
    }

    pub fn coord(&self) -> PixelCoord {
        PixelCoord::new(self.x, self.y)
    }
}
