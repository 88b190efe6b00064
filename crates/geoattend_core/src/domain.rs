//! crates/geoattend_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A point on the globe. Immutable value; compared by distance, never by identity.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
        }
    }

    pub fn with_altitude(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: Some(altitude),
        }
    }
}

/// A circular spatial boundary owned by exactly one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Geofence {
    pub center: GeoPoint,
    pub radius_meters: f64,
}

/// Lifecycle of an attendance session. The transition Active -> Ended
/// happens exactly once and is irreversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Ended,
}

/// The cohort a session takes attendance for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionScope {
    /// Faculty-wide session: lecturers check in (e.g. a staff meeting).
    Faculty,
    /// A class session for one unit, held at a venue. Students of the
    /// unit's course check in.
    Class { unit_id: Uuid, venue_id: Uuid },
}

/// A time-bounded attendance-taking event with one fixed geofence.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub geofence: Geofence,
    pub scope: SessionScope,
    pub started_by: Uuid,
    pub started_at: DateTime<Utc>,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Lecturer,
    Student,
}

/// Represents a user - used throughout the app. The reference photo is what
/// fresh captures are compared against at check-in time.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub role: Role,
    pub reference_photo: Vec<u8>,
    /// Set for students only: the course they are enrolled in.
    pub course_id: Option<Uuid>,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Course {
    pub id: Uuid,
    pub name: String,
}

/// A teaching unit belonging to a course.
#[derive(Debug, Clone)]
pub struct Unit {
    pub id: Uuid,
    pub name: String,
    pub course_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct Venue {
    pub id: Uuid,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// The dedup key for an attendance record: at most one record exists per
/// (user, UTC day, context).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceContext {
    Faculty,
    Unit(Uuid),
}

impl SessionScope {
    pub fn context(&self) -> AttendanceContext {
        match self {
            SessionScope::Faculty => AttendanceContext::Faculty,
            SessionScope::Class { unit_id, .. } => AttendanceContext::Unit(*unit_id),
        }
    }

    pub fn venue_id(&self) -> Option<Uuid> {
        match self {
            SessionScope::Faculty => None,
            SessionScope::Class { venue_id, .. } => Some(*venue_id),
        }
    }
}

/// One present-mark. Append-only; owned by the process-wide attendance log
/// and referenced by id everywhere else.
#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub context: AttendanceContext,
    pub venue_id: Option<Uuid>,
    pub taken_at: DateTime<Utc>,
}

/// One candidate returned by the place-search collaborator. Coordinates are
/// kept as the raw strings the geocoder produced; parsing them (and failing
/// on malformed input) is the geofence manager's job.
#[derive(Debug, Clone)]
pub struct PlaceCandidate {
    pub id: String,
    pub display_name: String,
    pub latitude: String,
    pub longitude: String,
}

/// The face-comparison collaborator's verdict on a (reference, capture) pair.
#[derive(Debug, Clone, Copy)]
pub struct FaceMatch {
    pub same_person: bool,
    pub confidence: f64,
}
