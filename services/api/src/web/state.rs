//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::{BroadcastMapDisplay, ReportedFix};
use crate::config::Config;
use crate::web::protocol::ServerMessage;
use geoattend_core::{AttendanceWorkflow, GeofenceManager, LocationTracker, Registry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// The registry lock is a `std::sync` lock, never held across an await point;
/// the attendance workflow takes it only for its read snapshot and its final
/// dedup-and-append section.
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<RwLock<Registry>>,
    pub workflow: AttendanceWorkflow,
    pub tracker: Arc<LocationTracker>,
    /// Fan-out channel for the live session feed. The WebSocket handler
    /// subscribes here; map frames and attendance events are published here.
    pub events: broadcast::Sender<ServerMessage>,
    /// One draft geofence per operator, keyed by user id, alive between
    /// "new session" and "start session".
    pub drafts: Mutex<HashMap<Uuid, GeofenceManager>>,
    /// Where `POST /location/report` publishes browser-reported fixes.
    pub location_tx: watch::Sender<Option<ReportedFix>>,
}

impl AppState {
    /// Runs `f` against the calling operator's draft geofence, creating the
    /// draft on first touch.
    pub fn with_draft<T>(&self, user_id: Uuid, f: impl FnOnce(&mut GeofenceManager) -> T) -> T {
        let mut drafts = self.drafts.lock().unwrap();
        let draft = drafts.entry(user_id).or_default();
        f(draft)
    }

    /// A `MapDisplay` bound to one operator, so the frames a draft
    /// mutation emits are attributable to the operator who made it.
    pub fn map_for(&self, user_id: Uuid) -> BroadcastMapDisplay {
        BroadcastMapDisplay::new(self.events.clone(), user_id)
    }
}
