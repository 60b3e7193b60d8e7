use lark_geo::{DegE7, GeoPoint};
use serde::{Deserialize, Serialize};

use crate::error::MissionError;

pub const DEFAULT_ALTITUDE_M: f64 = 8.0;
pub const DEFAULT_HOLD_S: f64 = 3.0;

/// One raw mission-file entry. Latitude/longitude in decimal degrees,
/// altitude in meters, hold time in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointRecord {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub hold_time: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WaypointKind {
    Nav,
}

/// A waypoint in autopilot-native units. Lat/lon are only ever produced by
/// [`DegE7::encode`] inside [`build_waypoint`], so a `Waypoint` can never
/// carry a stray decimal-degree value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Waypoint {
    pub lat: DegE7,
    pub lon: DegE7,
    pub alt_mm: i32,
    pub hold_ms: u32,
    pub kind: WaypointKind,
}

impl Waypoint {
    /// The target back in decimal degrees, for projection and logging.
    pub fn target(&self) -> GeoPoint {
        GeoPoint::new(self.lat.decode(), self.lon.decode())
    }
}

/// Convert a raw record into the command payload shape the autopilot
/// expects: fixed-point degrees, millimeters, milliseconds.
pub fn build_waypoint(rec: &WaypointRecord) -> Result<Waypoint, MissionError> {
    let point = GeoPoint::new(rec.latitude, rec.longitude);
    if !point.in_valid_range() {
        return Err(MissionError::InvalidWaypointData(format!(
            "lat/lon out of range: {}, {}",
            rec.latitude, rec.longitude
        )));
    }

    let alt_m = rec.altitude.unwrap_or(DEFAULT_ALTITUDE_M);
    if !alt_m.is_finite() {
        return Err(MissionError::InvalidWaypointData(format!(
            "altitude not finite: {alt_m}"
        )));
    }

    let hold_s = rec.hold_time.unwrap_or(DEFAULT_HOLD_S);
    if !hold_s.is_finite() || hold_s < 0.0 {
        return Err(MissionError::InvalidWaypointData(format!(
            "hold_time invalid: {hold_s}"
        )));
    }

    Ok(Waypoint {
        lat: DegE7::encode(rec.latitude),
        lon: DegE7::encode(rec.longitude),
        alt_mm: (alt_m * 1000.0).round() as i32,
        hold_ms: (hold_s * 1000.0).round() as u32,
        kind: WaypointKind::Nav,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(lat: f64, lon: f64) -> WaypointRecord {
        WaypointRecord {
            latitude: lat,
            longitude: lon,
            altitude: None,
            hold_time: None,
        }
    }

    #[test]
    fn defaults_applied() {
        let wp = build_waypoint(&record(42.2935566, -71.2652217)).unwrap();
        assert_eq!(wp.alt_mm, 8000);
        assert_eq!(wp.hold_ms, 3000);
        assert_eq!(wp.kind, WaypointKind::Nav);
    }

    #[test]
    fn explicit_fields_converted() {
        let rec = WaypointRecord {
            altitude: Some(5.0),
            hold_time: Some(1.5),
            ..record(42.0, -71.0)
        };
        let wp = build_waypoint(&rec).unwrap();
        assert_eq!(wp.alt_mm, 5000);
        assert_eq!(wp.hold_ms, 1500);
        assert_eq!(wp.lat, DegE7(420000000));
        assert_eq!(wp.lon, DegE7(-710000000));
    }

    #[test]
    fn out_of_range_rejected() {
        for rec in [record(90.5, 0.0), record(0.0, 181.0), record(f64::NAN, 0.0)] {
            assert!(matches!(
                build_waypoint(&rec),
                Err(MissionError::InvalidWaypointData(_))
            ));
        }
    }

    #[test]
    fn negative_hold_rejected() {
        let rec = WaypointRecord {
            hold_time: Some(-1.0),
            ..record(42.0, -71.0)
        };
        assert!(matches!(
            build_waypoint(&rec),
            Err(MissionError::InvalidWaypointData(_))
        ));
    }

    #[test]
    fn target_round_trips_within_encoding_precision() {
        let wp = build_waypoint(&record(42.2935566, -71.2652217)).unwrap();
        let t = wp.target();
        assert!((t.lat - 42.2935566).abs() <= 1e-7);
        assert!((t.lon - -71.2652217).abs() <= 1e-7);
    }

    #[test]
    fn record_parses_without_optionals() {
        let rec: WaypointRecord =
            serde_json::from_str(r#"{"latitude": 42.0, "longitude": -71.0}"#).unwrap();
        assert_eq!(rec.altitude, None);
        assert_eq!(rec.hold_time, None);
    }
}
