//! crates/geoattend_core/src/geofence.rs
//!
//! The per-session geofence manager: holds the draft center point and
//! radius while the operator is setting a session up, and pushes every
//! change to the injected map display.

use crate::domain::{Geofence, GeoPoint, PlaceCandidate};
use crate::error::{CoreError, CoreResult};
use crate::ports::MapDisplay;

pub const MIN_RADIUS_METERS: f64 = 10.0;
pub const MAX_RADIUS_METERS: f64 = 1000.0;
pub const DEFAULT_RADIUS_METERS: f64 = 100.0;

/// Holds one draft geofence. State machine: `Unset` until the first center
/// arrives, `Set` from then on; every further update stays `Set`.
///
/// The manager owns only the data. Rendering happens in the `MapDisplay`
/// collaborator it is handed on each mutation.
#[derive(Debug)]
pub struct GeofenceManager {
    center: Option<GeoPoint>,
    radius_meters: f64,
    location_error: Option<String>,
}

impl Default for GeofenceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl GeofenceManager {
    pub fn new() -> Self {
        Self {
            center: None,
            radius_meters: DEFAULT_RADIUS_METERS,
            location_error: None,
        }
    }

    pub fn is_set(&self) -> bool {
        self.center.is_some()
    }

    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    /// The last device-location failure, kept for display until the next
    /// successful center update.
    pub fn location_error(&self) -> Option<&str> {
        self.location_error.as_deref()
    }

    /// Records a device-location failure. The existing center (if any) is
    /// deliberately left alone: a failed acquisition never clears a good fence.
    pub fn note_location_error(&mut self, reason: &str) {
        self.location_error = Some(reason.to_string());
    }

    /// Overwrites the center with a freshly acquired device position and
    /// clears any prior location error.
    pub fn set_center_from_device(&mut self, point: GeoPoint, map: &dyn MapDisplay) {
        self.location_error = None;
        self.apply_center(point, map);
    }

    /// Overwrites the center from a map click or marker drag. A 2-D map
    /// interaction carries no altitude, so a previously known altitude is
    /// preserved.
    pub fn set_center_from_map(&mut self, latitude: f64, longitude: f64, map: &dyn MapDisplay) {
        let altitude = self.center.as_ref().and_then(|c| c.altitude);
        self.location_error = None;
        self.apply_center(
            GeoPoint {
                latitude,
                longitude,
                altitude,
            },
            map,
        );
    }

    /// Overwrites the center from a selected search result. Malformed
    /// coordinate strings fail with `GeocodeParse` and leave the current
    /// center untouched; there is no silent 0/0 fallback.
    pub fn set_center_from_search(
        &mut self,
        candidate: &PlaceCandidate,
        map: &dyn MapDisplay,
    ) -> CoreResult<()> {
        let latitude = parse_coordinate(&candidate.latitude, -90.0..=90.0)?;
        let longitude = parse_coordinate(&candidate.longitude, -180.0..=180.0)?;
        self.location_error = None;
        self.apply_center(GeoPoint::new(latitude, longitude), map);
        Ok(())
    }

    /// Sets the radius, silently clamped to [10, 1000] m. Out-of-range
    /// input is an input-control bug, not a runtime error. NaN is ignored:
    /// `clamp` would propagate it and break the radius invariant.
    pub fn set_radius(&mut self, meters: f64, map: &dyn MapDisplay) {
        if meters.is_nan() {
            return;
        }
        self.radius_meters = meters.clamp(MIN_RADIUS_METERS, MAX_RADIUS_METERS);
        if let Some(center) = &self.center {
            map.set_circle(center, self.radius_meters);
        }
    }

    /// A snapshot of the current fence, consumed by the attendance workflow
    /// when the session starts.
    pub fn current_fence(&self) -> CoreResult<Geofence> {
        let center = self.center.clone().ok_or(CoreError::FenceUnset)?;
        Ok(Geofence {
            center,
            radius_meters: self.radius_meters,
        })
    }

    fn apply_center(&mut self, point: GeoPoint, map: &dyn MapDisplay) {
        map.set_view(&point);
        map.set_marker(&point);
        map.set_circle(&point, self.radius_meters);
        self.center = Some(point);
    }
}

fn parse_coordinate(raw: &str, range: std::ops::RangeInclusive<f64>) -> CoreResult<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| CoreError::GeocodeParse(format!("'{raw}' is not a number")))?;
    if !value.is_finite() || !range.contains(&value) {
        return Err(CoreError::GeocodeParse(format!("'{raw}' is out of range")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every call the manager pushes to the map surface.
    #[derive(Default)]
    struct RecordingMap {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingMap {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl MapDisplay for RecordingMap {
        fn set_view(&self, center: &GeoPoint) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("view {:.4},{:.4}", center.latitude, center.longitude));
        }
        fn set_marker(&self, center: &GeoPoint) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("marker {:.4},{:.4}", center.latitude, center.longitude));
        }
        fn set_circle(&self, center: &GeoPoint, radius_meters: f64) {
            self.calls.lock().unwrap().push(format!(
                "circle {:.4},{:.4} r={}",
                center.latitude, center.longitude, radius_meters
            ));
        }
    }

    fn candidate(lat: &str, lon: &str) -> PlaceCandidate {
        PlaceCandidate {
            id: "1".to_string(),
            display_name: "Somewhere".to_string(),
            latitude: lat.to_string(),
            longitude: lon.to_string(),
        }
    }

    #[test]
    fn fence_is_unset_until_a_center_arrives() {
        let manager = GeofenceManager::new();
        assert!(matches!(
            manager.current_fence().unwrap_err(),
            CoreError::FenceUnset
        ));
    }

    #[test]
    fn device_center_sets_the_fence_and_clears_the_error_flag() {
        let map = RecordingMap::default();
        let mut manager = GeofenceManager::new();
        manager.note_location_error("permission denied");

        manager.set_center_from_device(GeoPoint::new(-1.29, 36.82), &map);

        assert!(manager.location_error().is_none());
        let fence = manager.current_fence().unwrap();
        assert_eq!(fence.center.latitude, -1.29);
        assert_eq!(fence.radius_meters, DEFAULT_RADIUS_METERS);
        // The display got the full view/marker/circle update.
        assert_eq!(map.calls().len(), 3);
    }

    #[test]
    fn location_failure_leaves_a_good_fence_untouched() {
        let map = RecordingMap::default();
        let mut manager = GeofenceManager::new();
        manager.set_center_from_device(GeoPoint::new(-1.29, 36.82), &map);

        manager.note_location_error("timed out");

        assert_eq!(manager.location_error(), Some("timed out"));
        assert_eq!(manager.current_fence().unwrap().center.latitude, -1.29);
    }

    #[test]
    fn map_interaction_preserves_known_altitude() {
        let map = RecordingMap::default();
        let mut manager = GeofenceManager::new();
        manager.set_center_from_device(GeoPoint::with_altitude(-1.29, 36.82, 1661.0), &map);

        manager.set_center_from_map(-1.30, 36.81, &map);

        let fence = manager.current_fence().unwrap();
        assert_eq!(fence.center.latitude, -1.30);
        assert_eq!(fence.center.altitude, Some(1661.0));
    }

    #[test]
    fn search_result_with_malformed_coordinates_is_rejected() {
        let map = RecordingMap::default();
        let mut manager = GeofenceManager::new();
        manager.set_center_from_device(GeoPoint::new(-1.29, 36.82), &map);

        let err = manager
            .set_center_from_search(&candidate("not-a-number", "36.8"), &map)
            .unwrap_err();
        assert!(matches!(err, CoreError::GeocodeParse(_)));
        // No silent 0/0 default: the old center survives.
        assert_eq!(manager.current_fence().unwrap().center.latitude, -1.29);

        let err = manager
            .set_center_from_search(&candidate("95.0", "36.8"), &map)
            .unwrap_err();
        assert!(matches!(err, CoreError::GeocodeParse(_)));
    }

    #[test]
    fn search_result_with_valid_coordinates_moves_the_center() {
        let map = RecordingMap::default();
        let mut manager = GeofenceManager::new();

        manager
            .set_center_from_search(&candidate(" -1.3032 ", "36.8083"), &map)
            .unwrap();

        let fence = manager.current_fence().unwrap();
        assert_eq!(fence.center.latitude, -1.3032);
        assert_eq!(fence.center.longitude, 36.8083);
    }

    #[test]
    fn radius_clamps_silently_at_both_bounds() {
        let map = RecordingMap::default();
        let mut manager = GeofenceManager::new();
        manager.set_center_from_device(GeoPoint::new(0.0, 0.0), &map);

        manager.set_radius(5.0, &map);
        assert_eq!(manager.current_fence().unwrap().radius_meters, 10.0);

        manager.set_radius(5000.0, &map);
        assert_eq!(manager.current_fence().unwrap().radius_meters, 1000.0);

        manager.set_radius(250.0, &map);
        assert_eq!(manager.current_fence().unwrap().radius_meters, 250.0);
    }

    #[test]
    fn nan_radius_is_ignored_and_keeps_the_current_value() {
        let map = RecordingMap::default();
        let mut manager = GeofenceManager::new();
        manager.set_center_from_device(GeoPoint::new(0.0, 0.0), &map);
        manager.set_radius(250.0, &map);
        let calls_before = map.calls().len();

        manager.set_radius(f64::NAN, &map);

        let radius = manager.current_fence().unwrap().radius_meters;
        assert_eq!(radius, 250.0);
        assert!(!radius.is_nan());
        // No circle update is pushed for a rejected radius.
        assert_eq!(map.calls().len(), calls_before);
    }

    #[test]
    fn radius_change_updates_the_map_circle() {
        let map = RecordingMap::default();
        let mut manager = GeofenceManager::new();
        manager.set_center_from_device(GeoPoint::new(0.0, 0.0), &map);

        manager.set_radius(300.0, &map);

        assert!(map.calls().last().unwrap().ends_with("r=300"));
    }
}
