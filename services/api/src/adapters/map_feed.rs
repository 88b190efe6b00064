//! services/api/src/adapters/map_feed.rs
//!
//! This module contains the adapter for the map-display collaborator.
//! The browser renders the actual map; this adapter implements the
//! `MapDisplay` port by fanning view/marker/circle frames out on a
//! broadcast channel that the WebSocket handler subscribes to.

use crate::web::protocol::ServerMessage;
use geoattend_core::{domain::GeoPoint, ports::MapDisplay};
use tokio::sync::broadcast;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `MapDisplay` port over a broadcast
/// channel. Each instance is bound to one operator: the frames it emits
/// carry that operator's id, and a feed drops frames from other
/// operators' drafts. Sends are fire-and-forget: with no connected
/// operator the frames are simply dropped.
#[derive(Clone)]
pub struct BroadcastMapDisplay {
    events: broadcast::Sender<ServerMessage>,
    operator_id: Uuid,
}

impl BroadcastMapDisplay {
    /// Creates a new `BroadcastMapDisplay` for one operator on an existing
    /// event channel.
    pub fn new(events: broadcast::Sender<ServerMessage>, operator_id: Uuid) -> Self {
        Self {
            events,
            operator_id,
        }
    }
}

//=========================================================================================
// `MapDisplay` Trait Implementation
//=========================================================================================

impl MapDisplay for BroadcastMapDisplay {
    fn set_view(&self, center: &GeoPoint) {
        let _ = self.events.send(ServerMessage::MapView {
            operator_id: self.operator_id,
            latitude: center.latitude,
            longitude: center.longitude,
        });
    }

    fn set_marker(&self, center: &GeoPoint) {
        let _ = self.events.send(ServerMessage::MapMarker {
            operator_id: self.operator_id,
            latitude: center.latitude,
            longitude: center.longitude,
        });
    }

    fn set_circle(&self, center: &GeoPoint, radius_meters: f64) {
        let _ = self.events.send(ServerMessage::MapCircle {
            operator_id: self.operator_id,
            latitude: center.latitude,
            longitude: center.longitude,
            radius_meters,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_reach_a_subscriber() {
        let (tx, mut rx) = broadcast::channel(8);
        let map = BroadcastMapDisplay::new(tx, Uuid::new_v4());

        map.set_marker(&GeoPoint::new(-1.29, 36.82));
        map.set_circle(&GeoPoint::new(-1.29, 36.82), 150.0);

        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerMessage::MapMarker { .. }
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerMessage::MapCircle { radius_meters, .. } if radius_meters == 150.0
        ));
    }

    #[test]
    fn frames_carry_the_operator_identity() {
        let (tx, mut rx) = broadcast::channel(8);
        let operator = Uuid::new_v4();
        let map = BroadcastMapDisplay::new(tx, operator);

        map.set_view(&GeoPoint::new(0.0, 0.0));

        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerMessage::MapView { operator_id, .. } if operator_id == operator
        ));
    }

    #[test]
    fn sending_without_subscribers_does_not_panic() {
        let (tx, _) = broadcast::channel(8);
        let map = BroadcastMapDisplay::new(tx, Uuid::new_v4());
        map.set_view(&GeoPoint::new(0.0, 0.0));
    }
}
