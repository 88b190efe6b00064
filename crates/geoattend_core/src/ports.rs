//! crates/geoattend_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like geocoders, the
//! browser's geolocation API, or the face-matching model.

use crate::domain::{FaceMatch, GeoPoint, PlaceCandidate};
use crate::error::CoreResult;
use async_trait::async_trait;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The external collaborator that judges whether two face images depict the
/// same person.
#[async_trait]
pub trait FaceComparisonService: Send + Sync {
    /// Compares a stored reference photo against a freshly captured one.
    ///
    /// `Ok(FaceMatch { same_person: false, .. })` means "compared, not a
    /// match"; transport or parse failures come back as
    /// `CoreError::VerificationService` so callers can distinguish the two.
    async fn compare(&self, reference: &[u8], capture: &[u8]) -> CoreResult<FaceMatch>;
}

/// The platform location service. May fail with permission-denied, timeout
/// or position-unavailable, all surfaced as `CoreError::LocationUnavailable`.
#[async_trait]
pub trait GeolocationService: Send + Sync {
    async fn current_position(&self) -> CoreResult<GeoPoint>;
}

/// Free-text place search. An empty candidate list is a successful "no
/// matches"; only transport-level failures are errors.
#[async_trait]
pub trait PlaceSearchService: Send + Sync {
    async fn search(&self, query: &str) -> CoreResult<Vec<PlaceCandidate>>;
}

/// The map rendering surface the geofence manager pushes updates to.
/// Purely a display; it carries no business logic and its calls are
/// fire-and-forget.
pub trait MapDisplay: Send + Sync {
    fn set_view(&self, center: &GeoPoint);
    fn set_marker(&self, center: &GeoPoint);
    fn set_circle(&self, center: &GeoPoint, radius_meters: f64);
}
