//! crates/geoattend_core/src/geo.rs
//!
//! Pure geodesy helpers: great-circle distance and geofence containment.
//! Accuracy at the meter scale is all a 10-1000 m fence needs.

use crate::domain::{Geofence, GeoPoint};
use crate::error::{CoreError, CoreResult};

/// Mean Earth radius in meters.
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

fn validate(point: &GeoPoint) -> CoreResult<()> {
    let lat_ok = point.latitude.is_finite() && (-90.0..=90.0).contains(&point.latitude);
    let lon_ok = point.longitude.is_finite() && (-180.0..=180.0).contains(&point.longitude);
    if lat_ok && lon_ok {
        Ok(())
    } else {
        Err(CoreError::InvalidCoordinate {
            latitude: point.latitude,
            longitude: point.longitude,
        })
    }
}

/// Haversine great-circle distance between two points, in meters.
///
/// Symmetric, and zero for identical points. Rejects out-of-range or NaN
/// coordinates with `CoreError::InvalidCoordinate`.
pub fn distance_meters(a: &GeoPoint, b: &GeoPoint) -> CoreResult<f64> {
    validate(a)?;
    validate(b)?;

    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();

    Ok(EARTH_RADIUS_METERS * c)
}

/// True iff `point` lies within `fence`, boundary inclusive. Pure.
pub fn is_within(point: &GeoPoint, fence: &Geofence) -> CoreResult<bool> {
    let distance = distance_meters(point, &fence.center)?;
    Ok(distance <= fence.radius_meters)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon)
    }

    #[test]
    fn distance_is_zero_for_identical_points() {
        let a = p(-1.2921, 36.8219);
        assert_eq!(distance_meters(&a, &a).unwrap(), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = p(-1.2921, 36.8219);
        let b = p(-1.3032, 36.8083);
        let ab = distance_meters(&a, &b).unwrap();
        let ba = distance_meters(&b, &a).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn one_degree_of_longitude_at_the_equator_is_about_111_km() {
        let d = distance_meters(&p(0.0, 0.0), &p(0.0, 1.0)).unwrap();
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
    }

    #[test]
    fn small_offsets_resolve_at_meter_scale() {
        // 0.001 deg of longitude at the equator is roughly 111 m.
        let d = distance_meters(&p(0.0, 0.0), &p(0.0, 0.001)).unwrap();
        assert!((d - 111.2).abs() < 0.5, "got {d}");
    }

    #[test]
    fn out_of_range_latitude_is_rejected() {
        let err = distance_meters(&p(91.0, 0.0), &p(0.0, 0.0)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidCoordinate { .. }));
    }

    #[test]
    fn nan_coordinates_are_rejected() {
        let err = distance_meters(&p(f64::NAN, 0.0), &p(0.0, 0.0)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidCoordinate { .. }));
    }

    #[test]
    fn containment_is_boundary_inclusive() {
        let center = p(0.0, 0.0);
        let inside = p(0.0, 0.0005);
        let outside = p(0.0, 0.01);

        // Build the fence so the "inside" point sits exactly on the boundary.
        let boundary = distance_meters(&center, &inside).unwrap();
        let fence = Geofence {
            center: center.clone(),
            radius_meters: boundary,
        };

        assert!(is_within(&inside, &fence).unwrap());
        assert!(!is_within(&outside, &fence).unwrap());
    }
}
