//! services/api/src/adapters/geocode.rs
//!
//! This module contains the adapter for the place-search collaborator.
//! It implements the `PlaceSearchService` port from the `core` crate
//! against a Nominatim-compatible geocoder.

use async_trait::async_trait;
use geoattend_core::{
    domain::PlaceCandidate,
    error::{CoreError, CoreResult},
    ports::PlaceSearchService,
};
use serde::Deserialize;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `PlaceSearchService` port using a
/// Nominatim-style HTTP geocoder.
#[derive(Clone)]
pub struct NominatimAdapter {
    http: reqwest::Client,
    base_url: String,
}

impl NominatimAdapter {
    /// Creates a new `NominatimAdapter`. Nominatim's usage policy requires
    /// an identifying User-Agent, so the client is built with one here.
    pub fn new(base_url: String) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("geoattend/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, base_url })
    }
}

/// One row of the geocoder's JSON response. Coordinates stay strings; the
/// geofence manager owns parsing them.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    place_id: u64,
    display_name: String,
    lat: String,
    lon: String,
}

fn to_candidates(places: Vec<NominatimPlace>) -> Vec<PlaceCandidate> {
    places
        .into_iter()
        .map(|p| PlaceCandidate {
            id: p.place_id.to_string(),
            display_name: p.display_name,
            latitude: p.lat,
            longitude: p.lon,
        })
        .collect()
}

//=========================================================================================
// `PlaceSearchService` Trait Implementation
//=========================================================================================

#[async_trait]
impl PlaceSearchService for NominatimAdapter {
    /// Runs a free-text search. An empty candidate list is success ("no
    /// matches"); only transport-level failures become `SearchUnavailable`.
    async fn search(&self, query: &str) -> CoreResult<Vec<PlaceCandidate>> {
        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .get(url)
            .query(&[("format", "jsonv2"), ("q", query)])
            .send()
            .await
            .map_err(|e| CoreError::SearchUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| CoreError::SearchUnavailable(e.to_string()))?;

        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| CoreError::SearchUnavailable(format!("malformed response: {e}")))?;

        debug!(query, results = places.len(), "place search completed");
        Ok(to_candidates(places))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_geocoder_rows_to_candidates() {
        let payload = r#"[
            {
                "place_id": 297716,
                "licence": "Data (c) OpenStreetMap contributors",
                "display_name": "Nairobi, Kenya",
                "lat": "-1.2832533",
                "lon": "36.8172449"
            }
        ]"#;
        let places: Vec<NominatimPlace> = serde_json::from_str(payload).unwrap();
        let candidates = to_candidates(places);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "297716");
        assert_eq!(candidates[0].display_name, "Nairobi, Kenya");
        assert_eq!(candidates[0].latitude, "-1.2832533");
    }

    #[test]
    fn an_empty_response_is_no_matches() {
        let places: Vec<NominatimPlace> = serde_json::from_str("[]").unwrap();
        assert!(to_candidates(places).is_empty());
    }
}
