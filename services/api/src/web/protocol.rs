//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the operator's browser and
//! the API server for the live session map and presence feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribes to a session's feed. This must be the first message sent
    /// on the connection.
    Init { session_id: Uuid },

    /// The operator dragged the geofence marker to a new position.
    MarkerDragged { latitude: f64, longitude: f64 },

    /// The operator clicked the map to move the geofence center.
    MapClicked { latitude: f64, longitude: f64 },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms successful feed subscription.
    SessionInitialized { session_id: Uuid },

    /// Reports an error to the client, which should display a message.
    Error { message: String },

    /// The map should recenter its viewport. Map frames carry the id of
    /// the operator whose draft produced them; a feed only renders its
    /// own operator's frames.
    MapView {
        operator_id: Uuid,
        latitude: f64,
        longitude: f64,
    },

    /// The geofence marker moved.
    MapMarker {
        operator_id: Uuid,
        latitude: f64,
        longitude: f64,
    },

    /// The geofence circle moved or was resized.
    MapCircle {
        operator_id: Uuid,
        latitude: f64,
        longitude: f64,
        radius_meters: f64,
    },

    /// A user was just marked present; the live counts should update.
    AttendanceMarked {
        session_id: Uuid,
        user_id: Uuid,
        user_name: String,
        taken_at: DateTime<Utc>,
    },

    /// The session was ended by its operator.
    SessionEnded { session_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_snake_case_tags() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"map_clicked","latitude":-1.29,"longitude":36.82}"#)
                .unwrap();
        assert!(matches!(msg, ClientMessage::MapClicked { latitude, .. } if latitude == -1.29));
    }

    #[test]
    fn server_messages_serialize_with_type_tags() {
        let json = serde_json::to_string(&ServerMessage::MapCircle {
            operator_id: Uuid::nil(),
            latitude: 0.0,
            longitude: 0.0,
            radius_meters: 100.0,
        })
        .unwrap();
        assert!(json.contains(r#""type":"map_circle""#));
        assert!(json.contains(r#""radius_meters":100.0"#));
    }
}
