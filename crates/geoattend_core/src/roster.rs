//! crates/geoattend_core/src/roster.rs
//!
//! The read-side presence projection: given a roster, a session and the
//! attendance log, partition the roster into present and absent. Pure and
//! recomputed on every query, so it stays correct as the log grows.

use crate::domain::{AttendanceRecord, Session, User};

#[derive(Debug, Clone, Default)]
pub struct PresencePartition {
    pub present: Vec<User>,
    pub absent: Vec<User>,
}

/// Partitions `roster` by whether a matching record exists for the
/// session's date and context. Membership in `present` is monotonic: once
/// a user has a record for the day, later records never remove them.
pub fn presence(
    roster: &[User],
    session: &Session,
    log: &[AttendanceRecord],
) -> PresencePartition {
    let day = session.started_at.date_naive();
    let context = session.scope.context();

    let mut partition = PresencePartition::default();
    for user in roster {
        let marked = log.iter().any(|r| {
            r.user_id == user.id && r.context == context && r.taken_at.date_naive() == day
        });
        if marked {
            partition.present.push(user.clone());
        } else {
            partition.absent.push(user.clone());
        }
    }
    partition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Geofence, GeoPoint, Role, SessionScope, SessionStatus};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn user(name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            hashed_password: "hash".to_string(),
            role: Role::Lecturer,
            reference_photo: vec![],
            course_id: None,
        }
    }

    fn session() -> Session {
        Session {
            id: Uuid::new_v4(),
            name: "Staff Meeting".to_string(),
            geofence: Geofence {
                center: GeoPoint::new(0.0, 0.0),
                radius_meters: 100.0,
            },
            scope: SessionScope::Faculty,
            started_by: Uuid::new_v4(),
            started_at: Utc.with_ymd_and_hms(2025, 9, 8, 9, 0, 0).unwrap(),
            status: SessionStatus::Active,
        }
    }

    fn record_for(user: &User, session: &Session) -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4(),
            user_id: user.id,
            session_id: session.id,
            context: session.scope.context(),
            venue_id: None,
            taken_at: session.started_at + chrono::Duration::minutes(5),
        }
    }

    #[test]
    fn partitions_roster_by_attendance_on_the_session_date() {
        let (a, b, c) = (user("Amina"), user("Brian"), user("Cherono"));
        let session = session();
        let mut log = vec![record_for(&a, &session)];

        let p = presence(&[a.clone(), b.clone(), c.clone()], &session, &log);
        assert_eq!(p.present.iter().map(|u| u.id).collect::<Vec<_>>(), [a.id]);
        assert_eq!(
            p.absent.iter().map(|u| u.id).collect::<Vec<_>>(),
            [b.id, c.id]
        );

        // Present only grows as records are added within the same day.
        log.push(record_for(&b, &session));
        let p = presence(&[a.clone(), b.clone(), c.clone()], &session, &log);
        assert_eq!(
            p.present.iter().map(|u| u.id).collect::<Vec<_>>(),
            [a.id, b.id]
        );
        assert_eq!(p.absent.iter().map(|u| u.id).collect::<Vec<_>>(), [c.id]);
    }

    #[test]
    fn records_from_another_day_do_not_count() {
        let a = user("Amina");
        let session = session();
        let mut stale = record_for(&a, &session);
        stale.taken_at = session.started_at - chrono::Duration::days(1);

        let p = presence(&[a.clone()], &session, &[stale]);
        assert!(p.present.is_empty());
        assert_eq!(p.absent.len(), 1);
    }

    #[test]
    fn records_from_another_context_do_not_count() {
        let a = user("Amina");
        let session = session();
        let mut other = record_for(&a, &session);
        other.context = crate::domain::AttendanceContext::Unit(Uuid::new_v4());

        let p = presence(&[a.clone()], &session, &[other]);
        assert!(p.present.is_empty());
    }
}
