//! crates/geoattend_core/src/workflow.rs
//!
//! The attendance matching workflow: geofence check, face verification,
//! then the atomic dedup-and-append. The geofence check runs strictly
//! before the face-comparison call so an out-of-fence submission never
//! costs an external round trip.

use crate::domain::{GeoPoint, SessionStatus};
use crate::error::{CoreError, CoreResult};
use crate::geo;
use crate::ports::FaceComparisonService;
use crate::store::{CheckInOutcome, Registry};
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Acceptance threshold applied to the collaborator's confidence score.
pub const FACE_CONFIDENCE_THRESHOLD: f64 = 0.8;

pub struct AttendanceWorkflow {
    face: Arc<dyn FaceComparisonService>,
    confidence_threshold: f64,
}

impl AttendanceWorkflow {
    pub fn new(face: Arc<dyn FaceComparisonService>) -> Self {
        Self {
            face,
            confidence_threshold: FACE_CONFIDENCE_THRESHOLD,
        }
    }

    pub fn with_threshold(face: Arc<dyn FaceComparisonService>, threshold: f64) -> Self {
        Self {
            face,
            confidence_threshold: threshold,
        }
    }

    /// Processes one attendance submission.
    ///
    /// The registry lock is held only for the read snapshot and for the
    /// final dedup-and-append; the face-comparison await happens with no
    /// lock held. The session's ACTIVE status is re-checked inside the
    /// final write section, so ending the session mid-flight wins over any
    /// submission still awaiting its face verdict.
    pub async fn check_in(
        &self,
        registry: &RwLock<Registry>,
        session_id: Uuid,
        user_id: Uuid,
        current_location: &GeoPoint,
        captured_photo: &[u8],
        now: DateTime<Utc>,
    ) -> CoreResult<CheckInOutcome> {
        // Snapshot the session fence and the user's reference photo.
        let (fence, reference_photo) = {
            let reg = registry.read().unwrap();
            let session = reg.session(session_id)?;
            if session.status != SessionStatus::Active {
                return Err(CoreError::SessionNotActive);
            }
            let user = reg.user(user_id)?;
            (session.geofence.clone(), user.reference_photo.clone())
        };

        // 1. Geofence containment, strictly before any external call.
        if !geo::is_within(current_location, &fence)? {
            let distance_meters = geo::distance_meters(current_location, &fence.center)?;
            return Err(CoreError::OutsideGeofence {
                distance_meters,
                radius_meters: fence.radius_meters,
            });
        }

        // 2. Face verification against the stored reference photo.
        let verdict = self.face.compare(&reference_photo, captured_photo).await?;
        if !verdict.same_person || verdict.confidence < self.confidence_threshold {
            return Err(CoreError::FaceMismatch {
                confidence: verdict.confidence,
            });
        }

        // 3. Atomic dedup + append, with the ACTIVE re-check inside.
        let mut reg = registry.write().unwrap();
        reg.record_attendance(session_id, user_id, now)
    }
}
