//! Sample types produced by the sensor adapter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw acceleration on three axes, in milli-g.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axes {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Axes {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// One measurement with its derived tilt angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    /// Tilt from the Z axis in tenths of a degree
    pub tilt_angle: i32,
}

impl Sample {
    pub fn from_axes(axes: Axes) -> Self {
        Self {
            x: axes.x,
            y: axes.y,
            z: axes.z,
            tilt_angle: tilt_angle(axes.x, axes.y, axes.z),
        }
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.tilt_angle < 0 { "-" } else { "" };
        let tenths = self.tilt_angle.unsigned_abs();
        write!(
            f,
            "X {} mg, Y {} mg, Z {} mg, angle {}{}.{} degrees",
            self.x,
            self.y,
            self.z,
            sign,
            tenths / 10,
            tenths % 10
        )
    }
}

/// Tilt of the acceleration vector away from the Z axis, in tenths of a degree.
///
/// `573` approximates `10 * 180 / pi`. A zero Z component yields `0`.
pub fn tilt_angle(x: i32, y: i32, z: i32) -> i32 {
    if z == 0 {
        return 0;
    }
    let (x, y, z) = (f64::from(x), f64::from(y), f64::from(z));
    let ratio = (x * x + y * y).sqrt() / z;
    (573.0 * ratio.atan()).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_sensor_has_no_tilt() {
        assert_eq!(tilt_angle(0, 0, 1000), 0);
    }

    #[test]
    fn test_tilt_angle_values() {
        assert_eq!(tilt_angle(1000, 0, 1000), 450);
        assert_eq!(tilt_angle(364, 0, 1000), 200);
        assert_eq!(tilt_angle(0, 500, 866), 300);
        // Both horizontal axes contribute
        assert_eq!(tilt_angle(200, 200, 1000), 158);
    }

    #[test]
    fn test_negative_z_gives_negative_angle() {
        assert_eq!(tilt_angle(1000, 0, -1000), -450);
    }

    #[test]
    fn test_zero_z_guard() {
        assert_eq!(tilt_angle(1000, 1000, 0), 0);
        assert_eq!(tilt_angle(0, 0, 0), 0);
    }

    #[test]
    fn test_sample_display() {
        let sample = Sample::from_axes(Axes::new(364, 0, 1000));
        assert_eq!(
            sample.to_string(),
            "X 364 mg, Y 0 mg, Z 1000 mg, angle 20.0 degrees"
        );

        let sample = Sample {
            x: 0,
            y: 0,
            z: -1,
            tilt_angle: -5,
        };
        assert!(sample.to_string().ends_with("angle -0.5 degrees"));
    }
}
