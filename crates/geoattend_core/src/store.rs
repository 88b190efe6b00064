//! crates/geoattend_core/src/store.rs
//!
//! The explicitly owned in-memory repository. Every workflow that needs
//! shared state receives a reference to this registry; nothing lives in
//! ambient globals. The attendance log it owns is append-only, and the
//! duplicate check plus append happen inside one `&mut self` call so the
//! read-check-then-append step is atomic under the caller's write lock.

use crate::domain::{
    AttendanceContext, AttendanceRecord, AuthSession, Course, Geofence, Role, Session,
    SessionScope, SessionStatus, Unit, User, Venue,
};
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// What a successful check-in produced. `AlreadyMarked` is idempotent
/// success, not an error: the user was present before and still is.
#[derive(Debug, Clone)]
pub enum CheckInOutcome {
    Recorded(AttendanceRecord),
    AlreadyMarked,
}

#[derive(Default)]
pub struct Registry {
    users: HashMap<Uuid, User>,
    courses: HashMap<Uuid, Course>,
    units: HashMap<Uuid, Unit>,
    venues: HashMap<Uuid, Venue>,
    sessions: HashMap<Uuid, Session>,
    attendance: Vec<AttendanceRecord>,
    auth_sessions: HashMap<String, AuthSession>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    //=====================================================================================
    // Users
    //=====================================================================================

    pub fn add_user(
        &mut self,
        name: &str,
        email: &str,
        hashed_password: &str,
        role: Role,
        reference_photo: Vec<u8>,
        course_id: Option<Uuid>,
    ) -> CoreResult<User> {
        if name.trim().is_empty() || email.trim().is_empty() {
            return Err(CoreError::Validation(
                "user name and email are required".into(),
            ));
        }
        if self.users.values().any(|u| u.email == email) {
            return Err(CoreError::Validation(format!(
                "a user with email {email} already exists"
            )));
        }
        if role == Role::Student {
            let course_id =
                course_id.ok_or_else(|| CoreError::Validation("students need a course".into()))?;
            if !self.courses.contains_key(&course_id) {
                return Err(CoreError::NotFound(format!("course {course_id}")));
            }
        }
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
            role,
            reference_photo,
            course_id,
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub fn user(&self, id: Uuid) -> CoreResult<&User> {
        self.users
            .get(&id)
            .ok_or_else(|| CoreError::NotFound(format!("user {id}")))
    }

    pub fn user_by_email(&self, email: &str) -> CoreResult<&User> {
        self.users
            .values()
            .find(|u| u.email == email)
            .ok_or_else(|| CoreError::NotFound(format!("user with email {email}")))
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn users_with_role(&self, role: Role) -> Vec<User> {
        self.users
            .values()
            .filter(|u| u.role == role)
            .cloned()
            .collect()
    }

    //=====================================================================================
    // Courses / Units / Venues
    //=====================================================================================

    pub fn add_course(&mut self, name: &str) -> CoreResult<Course> {
        if name.trim().is_empty() {
            return Err(CoreError::Validation("course name is required".into()));
        }
        let course = Course {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.courses.insert(course.id, course.clone());
        Ok(course)
    }

    pub fn courses(&self) -> impl Iterator<Item = &Course> {
        self.courses.values()
    }

    /// Deleting a course is rejected, not cascaded, while anything still
    /// references it.
    pub fn delete_course(&mut self, id: Uuid) -> CoreResult<()> {
        if !self.courses.contains_key(&id) {
            return Err(CoreError::NotFound(format!("course {id}")));
        }
        if self.units.values().any(|u| u.course_id == id) {
            return Err(CoreError::InUse(
                "course is associated with units".into(),
            ));
        }
        if self.users.values().any(|u| u.course_id == Some(id)) {
            return Err(CoreError::InUse("course has enrolled students".into()));
        }
        self.courses.remove(&id);
        Ok(())
    }

    pub fn add_unit(&mut self, name: &str, course_id: Uuid) -> CoreResult<Unit> {
        if name.trim().is_empty() {
            return Err(CoreError::Validation("unit name is required".into()));
        }
        if !self.courses.contains_key(&course_id) {
            return Err(CoreError::NotFound(format!("course {course_id}")));
        }
        let unit = Unit {
            id: Uuid::new_v4(),
            name: name.to_string(),
            course_id,
        };
        self.units.insert(unit.id, unit.clone());
        Ok(unit)
    }

    pub fn unit(&self, id: Uuid) -> CoreResult<&Unit> {
        self.units
            .get(&id)
            .ok_or_else(|| CoreError::NotFound(format!("unit {id}")))
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    pub fn delete_unit(&mut self, id: Uuid) -> CoreResult<()> {
        if !self.units.contains_key(&id) {
            return Err(CoreError::NotFound(format!("unit {id}")));
        }
        if self
            .attendance
            .iter()
            .any(|r| r.context == AttendanceContext::Unit(id))
        {
            return Err(CoreError::InUse(
                "unit has existing attendance records".into(),
            ));
        }
        self.units.remove(&id);
        Ok(())
    }

    pub fn add_venue(
        &mut self,
        name: &str,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> CoreResult<Venue> {
        if name.trim().is_empty() {
            return Err(CoreError::Validation("venue name is required".into()));
        }
        let venue = Venue {
            id: Uuid::new_v4(),
            name: name.to_string(),
            latitude,
            longitude,
        };
        self.venues.insert(venue.id, venue.clone());
        Ok(venue)
    }

    pub fn venues(&self) -> impl Iterator<Item = &Venue> {
        self.venues.values()
    }

    pub fn delete_venue(&mut self, id: Uuid) -> CoreResult<()> {
        if !self.venues.contains_key(&id) {
            return Err(CoreError::NotFound(format!("venue {id}")));
        }
        if self.attendance.iter().any(|r| r.venue_id == Some(id)) {
            return Err(CoreError::InUse(
                "venue has existing attendance records".into(),
            ));
        }
        self.venues.remove(&id);
        Ok(())
    }

    //=====================================================================================
    // Sessions
    //=====================================================================================

    /// Starts a session. Requires a non-empty name; the geofence must have
    /// been resolved by the caller (`GeofenceManager::current_fence`).
    pub fn start_session(
        &mut self,
        name: &str,
        geofence: Geofence,
        scope: SessionScope,
        started_by: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<Session> {
        if name.trim().is_empty() {
            return Err(CoreError::Validation("session name cannot be empty".into()));
        }
        if let SessionScope::Class { unit_id, venue_id } = &scope {
            if !self.units.contains_key(unit_id) {
                return Err(CoreError::NotFound(format!("unit {unit_id}")));
            }
            if !self.venues.contains_key(venue_id) {
                return Err(CoreError::NotFound(format!("venue {venue_id}")));
            }
        }
        let session = Session {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            geofence,
            scope,
            started_by,
            started_at: now,
            status: SessionStatus::Active,
        };
        self.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    pub fn session(&self, id: Uuid) -> CoreResult<&Session> {
        self.sessions
            .get(&id)
            .ok_or_else(|| CoreError::NotFound(format!("session {id}")))
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Flips Active -> Ended. The transition happens exactly once; ending
    /// an already-ended session is rejected.
    pub fn end_session(&mut self, id: Uuid) -> CoreResult<Session> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("session {id}")))?;
        if session.status != SessionStatus::Active {
            return Err(CoreError::SessionNotActive);
        }
        session.status = SessionStatus::Ended;
        Ok(session.clone())
    }

    //=====================================================================================
    // Attendance log
    //=====================================================================================

    /// The atomic tail of the check-in workflow: re-checks that the session
    /// is still active, enforces at-most-one record per (user, UTC day,
    /// context), then appends. Runs entirely under the caller's write lock,
    /// so a session ended mid-flight can never gain a record, and two racing
    /// submissions can never both insert.
    pub fn record_attendance(
        &mut self,
        session_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<CheckInOutcome> {
        let session = self.session(session_id)?;
        if session.status != SessionStatus::Active {
            return Err(CoreError::SessionNotActive);
        }
        let context = session.scope.context();
        let venue_id = session.scope.venue_id();

        let day = now.date_naive();
        let already_marked = self.attendance.iter().any(|r| {
            r.user_id == user_id && r.context == context && r.taken_at.date_naive() == day
        });
        if already_marked {
            return Ok(CheckInOutcome::AlreadyMarked);
        }

        let record = AttendanceRecord {
            id: Uuid::new_v4(),
            user_id,
            session_id,
            context,
            venue_id,
            taken_at: now,
        };
        self.attendance.push(record.clone());
        Ok(CheckInOutcome::Recorded(record))
    }

    pub fn attendance(&self) -> &[AttendanceRecord] {
        &self.attendance
    }

    //=====================================================================================
    // Auth sessions (browser login cookies)
    //=====================================================================================

    pub fn create_auth_session(
        &mut self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) {
        self.auth_sessions.insert(
            session_id.to_string(),
            AuthSession {
                id: session_id.to_string(),
                user_id,
                expires_at,
            },
        );
    }

    pub fn validate_auth_session(&self, session_id: &str, now: DateTime<Utc>) -> CoreResult<Uuid> {
        match self.auth_sessions.get(session_id) {
            Some(auth) if auth.expires_at > now => Ok(auth.user_id),
            _ => Err(CoreError::NotFound("auth session".into())),
        }
    }

    pub fn delete_auth_session(&mut self, session_id: &str) {
        self.auth_sessions.remove(session_id);
    }
}
