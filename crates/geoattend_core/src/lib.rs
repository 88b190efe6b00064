pub mod domain;
pub mod error;
pub mod geo;
pub mod geofence;
pub mod location;
pub mod ports;
pub mod roster;
pub mod store;
pub mod workflow;

pub use domain::{
    AttendanceContext, AttendanceRecord, AuthSession, Course, FaceMatch, Geofence, GeoPoint,
    PlaceCandidate, Role, Session, SessionScope, SessionStatus, Unit, User, Venue,
};
pub use error::{CoreError, CoreResult};
pub use geofence::GeofenceManager;
pub use location::LocationTracker;
pub use ports::{FaceComparisonService, GeolocationService, MapDisplay, PlaceSearchService};
pub use roster::{presence, PresencePartition};
pub use store::{CheckInOutcome, Registry};
pub use workflow::{AttendanceWorkflow, FACE_CONFIDENCE_THRESHOLD};
