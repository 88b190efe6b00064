//! crates/geoattend_core/src/error.rs
//!
//! The error taxonomy shared by the core workflows and the service ports.
//! None of these are fatal: location/search/geofence errors are recovered
//! by prompting the operator, and check-in rejections are actionable
//! feedback for the submitting user.

/// The error type for all core operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Latitude outside [-90, 90], longitude outside [-180, 180], or NaN.
    #[error("invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// The geofence manager was asked for a fence before a center was set.
    #[error("no geofence center has been set")]
    FenceUnset,

    /// A search result carried coordinates that could not be parsed.
    #[error("could not parse coordinates from search result: {0}")]
    GeocodeParse(String),

    /// The device location service failed (permission denied, timeout,
    /// position unavailable). The last known fence is left untouched.
    #[error("device location unavailable: {0}")]
    LocationUnavailable(String),

    /// The place-search collaborator failed at the transport level.
    /// An empty result list is NOT this error.
    #[error("place search unavailable: {0}")]
    SearchUnavailable(String),

    /// The submitter is outside the session's geofence. Reported to the
    /// user as "move closer"; the face collaborator is never invoked.
    #[error(
        "you are {distance_meters:.0} m from the session location, outside the {radius_meters:.0} m attendance radius"
    )]
    OutsideGeofence {
        distance_meters: f64,
        radius_meters: f64,
    },

    /// The collaborator compared the photos and decided they are not the
    /// same person (or confidence fell below the acceptance threshold).
    #[error("face verification did not match the reference photo (confidence {confidence:.2})")]
    FaceMismatch { confidence: f64 },

    /// The face collaborator was unreachable or returned a malformed
    /// response. No attendance side effect occurs, so retries are safe.
    #[error("face verification service error: {0}")]
    VerificationService(String),

    /// The session is not accepting submissions (never started, or ended
    /// while a submission was in flight).
    #[error("attendance session is not active")]
    SessionNotActive,

    #[error("not found: {0}")]
    NotFound(String),

    /// Referential-integrity rejection: the entity is still referenced by
    /// dependent units, students or attendance records.
    #[error("cannot delete: {0}")]
    InUse(String),

    #[error("{0}")]
    Validation(String),
}

/// A convenience type alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;
