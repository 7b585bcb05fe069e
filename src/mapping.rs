//! Pixel to machine coordinate mapping.
//!
//! The camera looks at the tray from a mounting that may be mirrored relative
//! to the machine axes. Each flipped axis is re-mirrored first
//! (`corrected = frame_dim - pixel`), then a per-axis affine transform is
//! applied: `mm = (scale * corrected + offset) / divisor`.
//!
//! No clamping or validation happens here. Out-of-frame input maps like any
//! other value.

use serde::{Deserialize, Serialize};

use crate::{MachineCoordinate, PixelCoord};

/// Which frame axes are mirrored relative to the machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orientation {
    pub flip_x: bool,
    pub flip_y: bool,
}

impl Orientation {
    /// Both axes mirrored (camera mounted upside down over the tray).
    pub const MIRRORED: Orientation = Orientation {
        flip_x: true,
        flip_y: true,
    };

    pub const IDENTITY: Orientation = Orientation {
        flip_x: false,
        flip_y: false,
    };
}

impl Default for Orientation {
    fn default() -> Self {
        Self::MIRRORED
    }
}

/// Scale and offset for one axis. Either may be negative to invert the axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisTransform {
    pub scale: f64,
    pub offset: f64,
}

impl AxisTransform {
    pub const fn new(scale: f64, offset: f64) -> Self {
        Self { scale, offset }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CoordinateMapper {
    frame_width: f64,
    frame_height: f64,
    orientation: Orientation,
    x: AxisTransform,
    y: AxisTransform,
    divisor: f64,
}

impl CoordinateMapper {
    pub fn new(
        frame_width: u32,
        frame_height: u32,
        orientation: Orientation,
        x: AxisTransform,
        y: AxisTransform,
        divisor: f64,
    ) -> Self {
        Self {
            frame_width: f64::from(frame_width),
            frame_height: f64::from(frame_height),
            orientation,
            x,
            y,
            divisor,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Undo the camera mirroring. Identity on axes that are not flipped.
    pub fn correct(&self, px: f64, py: f64) -> PixelCoord {
        let x = if self.orientation.flip_x {
            self.frame_width - px
        } else {
            px
        };
        let y = if self.orientation.flip_y {
            self.frame_height - py
        } else {
            py
        };
        PixelCoord::new(x, y)
    }

    pub fn map(&self, px: f64, py: f64) -> MachineCoordinate {
        let corrected = self.correct(px, py);
        MachineCoordinate {
            x_mm: (self.x.scale * corrected.x + self.x.offset) / self.divisor,
            y_mm: (self.y.scale * corrected.y + self.y.offset) / self.divisor,
        }
    }

    pub fn map_coord(&self, coord: PixelCoord) -> MachineCoordinate {
        self.map(coord.x, coord.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployed() -> CoordinateMapper {
        CoordinateMapper::new(
            640,
            640,
            Orientation::MIRRORED,
            AxisTransform::new(0.41, 150.0),
            AxisTransform::new(-0.41, 262.0),
            100.0,
        )
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn frame_center_maps_through_both_axes() {
        let mm = deployed().map(320.0, 320.0);
        assert!(close(mm.x_mm, (0.41 * 320.0 + 150.0) / 100.0));
        assert!(close(mm.y_mm, (-0.41 * 320.0 + 262.0) / 100.0));
    }

    #[test]
    fn mirrored_origin_is_far_corner() {
        let mapper = deployed();
        let corrected = mapper.correct(0.0, 0.0);
        assert_eq!(corrected, PixelCoord::new(640.0, 640.0));
        let mm = mapper.map(640.0, 640.0);
        assert!(close(mm.x_mm, 1.5));
        assert!(close(mm.y_mm, 2.62));
    }

    #[test]
    fn identity_orientation_skips_correction() {
        let mapper = CoordinateMapper::new(
            640,
            480,
            Orientation::IDENTITY,
            AxisTransform::new(1.0, 0.0),
            AxisTransform::new(1.0, 0.0),
            1.0,
        );
        let mm = mapper.map(10.0, 20.0);
        assert_eq!(mm.x_mm, 10.0);
        assert_eq!(mm.y_mm, 20.0);
    }

    #[test]
    fn single_axis_flip() {
        let mapper = CoordinateMapper::new(
            100,
            50,
            Orientation {
                flip_x: false,
                flip_y: true,
            },
            AxisTransform::new(1.0, 0.0),
            AxisTransform::new(1.0, 0.0),
            1.0,
        );
        assert_eq!(mapper.correct(10.0, 10.0), PixelCoord::new(10.0, 40.0));
    }

    #[test]
    fn mapping_is_deterministic() {
        let mapper = deployed();
        for (px, py) in [(0.0, 0.0), (12.5, 600.25), (640.0, 1.0), (333.3, 444.4)] {
            assert_eq!(mapper.map(px, py), mapper.map(px, py));
        }
    }

    #[test]
    fn out_of_frame_input_is_not_rejected() {
        let mm = deployed().map(-100.0, 5000.0);
        assert!(mm.x_mm.is_finite());
        assert!(close(mm.x_mm, (0.41 * 740.0 + 150.0) / 100.0));
        assert!(close(mm.y_mm, (-0.41 * -4360.0 + 262.0) / 100.0));
    }
}
