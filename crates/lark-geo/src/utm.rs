//! WGS-84 UTM forward projection and planar distance.
//!
//! Reach detection only ever compares short same-zone baselines, so a
//! standard transverse-Mercator series is far more accuracy than needed;
//! what matters is that vehicle fixes and waypoint targets land in the same
//! absolute frame for the whole mission.

use crate::{GeoError, GeoPoint};

// WGS-84 ellipsoid
const A: f64 = 6_378_137.0;
const F: f64 = 1.0 / 298.257_223_563;
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Easting/northing in meters within a single UTM zone. Only comparable to
/// points from the same zone and hemisphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    pub easting: f64,
    pub northing: f64,
    pub zone: u8,
    pub north: bool,
}

/// Project a decimal-degree point into its UTM zone.
pub fn project(p: GeoPoint) -> Result<ProjectedPoint, GeoError> {
    if !p.in_valid_range() {
        return Err(GeoError::OutOfRange {
            lat: p.lat,
            lon: p.lon,
        });
    }

    let zone = zone_for(p.lon);
    let lon0 = ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians();

    let e2 = F * (2.0 - F);
    let ep2 = e2 / (1.0 - e2);

    let lat = p.lat.to_radians();
    let lon = p.lon.to_radians();

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = ep2 * cos_lat * cos_lat;
    let a = cos_lat * (lon - lon0);

    // Meridional arc (Snyder 3-21)
    let m = A
        * ((1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0) * lat
            - (3.0 * e2 / 8.0 + 3.0 * e2 * e2 / 32.0 + 45.0 * e2 * e2 * e2 / 1024.0)
                * (2.0 * lat).sin()
            + (15.0 * e2 * e2 / 256.0 + 45.0 * e2 * e2 * e2 / 1024.0) * (4.0 * lat).sin()
            - (35.0 * e2 * e2 * e2 / 3072.0) * (6.0 * lat).sin());

    let easting = K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + FALSE_EASTING;

    let mut northing = K0
        * (m + n
            * tan_lat
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));

    let north = p.lat >= 0.0;
    if !north {
        northing += FALSE_NORTHING_SOUTH;
    }

    Ok(ProjectedPoint {
        easting,
        northing,
        zone,
        north,
    })
}

/// Euclidean distance on the projected plane, in meters.
///
/// Errors (rather than returning a bogus number) when the points come from
/// different zones or hemispheres; callers treat that as "not reached".
pub fn planar_distance(a: &ProjectedPoint, b: &ProjectedPoint) -> Result<f64, GeoError> {
    if a.zone != b.zone || a.north != b.north {
        return Err(GeoError::ZoneMismatch {
            a_zone: a.zone,
            a_north: a.north,
            b_zone: b.zone,
            b_north: b.north,
        });
    }
    let de = a.easting - b.easting;
    let dn = a.northing - b.northing;
    Ok((de * de + dn * dn).sqrt())
}

fn zone_for(lon: f64) -> u8 {
    // lon == 180.0 wraps into zone 1
    let z = ((lon + 180.0) / 6.0).floor() as i32 + 1;
    z.clamp(1, 60) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
        let r = 6_371_000.0_f64;
        let dlat = (b.lat - a.lat).to_radians();
        let dlon = (b.lon - a.lon).to_radians();
        let h = (dlat / 2.0).sin().powi(2)
            + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
        2.0 * r * h.sqrt().atan2((1.0 - h).sqrt())
    }

    #[test]
    fn distance_zero_iff_identical() {
        let p = project(GeoPoint::new(42.2935566, -71.2652217)).unwrap();
        assert!(planar_distance(&p, &p).unwrap() < 1e-9);

        let q = project(GeoPoint::new(42.2936, -71.2652217)).unwrap();
        assert!(planar_distance(&p, &q).unwrap() > 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let p = project(GeoPoint::new(42.2935566, -71.2652217)).unwrap();
        let q = project(GeoPoint::new(42.2941, -71.2660)).unwrap();
        let d1 = planar_distance(&p, &q).unwrap();
        let d2 = planar_distance(&q, &p).unwrap();
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn short_baseline_agrees_with_haversine() {
        // ~100 m apart, same zone; UTM and great-circle should agree well
        // under the 3 m reach tolerance.
        let a = GeoPoint::new(42.2935566, -71.2652217);
        let b = GeoPoint::new(42.2944566, -71.2652217);
        let d_utm =
            planar_distance(&project(a).unwrap(), &project(b).unwrap()).unwrap();
        let d_hav = haversine_m(a, b);
        let rel = (d_utm - d_hav).abs() / d_hav;
        assert!(rel < 0.01, "utm={} hav={} rel={}", d_utm, d_hav, rel);
    }

    #[test]
    fn zone_mismatch_is_an_error() {
        // Boston (zone 19) vs Tokyo (zone 54)
        let p = project(GeoPoint::new(42.29, -71.26)).unwrap();
        let q = project(GeoPoint::new(35.67, 139.65)).unwrap();
        assert_ne!(p.zone, q.zone);
        assert!(matches!(
            planar_distance(&p, &q),
            Err(GeoError::ZoneMismatch { .. })
        ));
    }

    #[test]
    fn hemisphere_mismatch_is_an_error() {
        // Same zone number, opposite hemispheres.
        let p = project(GeoPoint::new(10.0, 15.0)).unwrap();
        let q = project(GeoPoint::new(-10.0, 15.0)).unwrap();
        assert_eq!(p.zone, q.zone);
        assert!(matches!(
            planar_distance(&p, &q),
            Err(GeoError::ZoneMismatch { .. })
        ));
    }

    #[test]
    fn out_of_range_rejected() {
        assert!(matches!(
            project(GeoPoint::new(91.0, 0.0)),
            Err(GeoError::OutOfRange { .. })
        ));
    }
}
