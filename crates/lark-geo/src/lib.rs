pub mod utm;

use serde::{Deserialize, Serialize};

pub use utm::{planar_distance, project, ProjectedPoint};

/// A decimal-degree coordinate pair. This is the only representation the
/// public API accepts; the wire encoding is [`DegE7`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn in_valid_range(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && self.lat.abs() <= 90.0
            && self.lon.abs() <= 180.0
    }
}

/// Fixed-point degrees, scaled by 1e7: the autopilot's wire encoding.
///
/// Kept as a distinct type so decimal degrees and encoded degrees can never
/// be mixed in a waypoint or distance computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DegE7(pub i32);

const DEG_E7_SCALE: f64 = 1e7;

impl DegE7 {
    /// Encode decimal degrees, rounding to the nearest 1e-7 degree.
    pub fn encode(deg: f64) -> Self {
        Self((deg * DEG_E7_SCALE).round() as i32)
    }

    /// Decode back to decimal degrees. Exact to ±1e-7 of the encoded input.
    pub fn decode(self) -> f64 {
        self.0 as f64 / DEG_E7_SCALE
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("coordinate out of range: lat={lat} lon={lon}")]
    OutOfRange { lat: f64, lon: f64 },

    #[error("projected points not comparable: zone {a_zone} (north={a_north}) vs zone {b_zone} (north={b_north})")]
    ZoneMismatch {
        a_zone: u8,
        a_north: bool,
        b_zone: u8,
        b_north: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        for &deg in &[0.0, 42.2935566, -71.2652217, 89.9999999, -180.0, 180.0] {
            let rt = DegE7::encode(deg).decode();
            assert!(
                (rt - deg).abs() <= 1e-7,
                "round trip of {} drifted to {}",
                deg,
                rt
            );
        }
    }

    #[test]
    fn encode_rounds_to_nearest() {
        // 1.00000004 deg is closer to 10000000 than 10000001
        assert_eq!(DegE7::encode(1.00000004), DegE7(10000000));
        assert_eq!(DegE7::encode(1.00000006), DegE7(10000001));
        assert_eq!(DegE7::encode(-1.00000006), DegE7(-10000001));
    }

    #[test]
    fn range_check() {
        assert!(GeoPoint::new(42.0, -71.0).in_valid_range());
        assert!(!GeoPoint::new(90.1, 0.0).in_valid_range());
        assert!(!GeoPoint::new(0.0, -180.5).in_valid_range());
        assert!(!GeoPoint::new(f64::NAN, 0.0).in_valid_range());
    }
}
