//! crates/geoattend_core/src/location.rs
//!
//! Wraps the device-geolocation and place-search collaborators behind a
//! tracker that enforces the "last response wins" rule: every request is
//! tagged with a generation token, and a response whose token has been
//! superseded is discarded instead of applied. Without this, a slow
//! in-flight response could overwrite a newer one after its await point.

use crate::domain::{GeoPoint, PlaceCandidate};
use crate::error::{CoreError, CoreResult};
use crate::ports::{GeolocationService, PlaceSearchService};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub struct LocationTracker {
    geolocation: Arc<dyn GeolocationService>,
    place_search: Arc<dyn PlaceSearchService>,
    last_known: Mutex<Option<GeoPoint>>,
    acquire_generation: AtomicU64,
    search_generation: AtomicU64,
}

impl LocationTracker {
    pub fn new(
        geolocation: Arc<dyn GeolocationService>,
        place_search: Arc<dyn PlaceSearchService>,
    ) -> Self {
        Self {
            geolocation,
            place_search,
            last_known: Mutex::new(None),
            acquire_generation: AtomicU64::new(0),
            search_generation: AtomicU64::new(0),
        }
    }

    /// The most recent successfully acquired position, if any. Survives
    /// later failures: an error never clears a good fix.
    pub fn last_known(&self) -> Option<GeoPoint> {
        self.last_known.lock().unwrap().clone()
    }

    /// Acquires the current device position.
    ///
    /// Returns `Ok(None)` when this request was superseded by a newer one
    /// while it was in flight; the stale response is discarded, not applied.
    /// On failure the last known position is left untouched and the reason
    /// is surfaced as `LocationUnavailable`.
    pub async fn acquire(&self) -> CoreResult<Option<GeoPoint>> {
        let token = self.acquire_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let result = self.geolocation.current_position().await;

        if self.acquire_generation.load(Ordering::SeqCst) != token {
            return Ok(None);
        }
        match result {
            Ok(point) => {
                *self.last_known.lock().unwrap() = Some(point.clone());
                Ok(Some(point))
            }
            Err(CoreError::LocationUnavailable(reason)) => {
                Err(CoreError::LocationUnavailable(reason))
            }
            Err(other) => Err(CoreError::LocationUnavailable(other.to_string())),
        }
    }

    /// Runs a free-text place search.
    ///
    /// `Ok(None)` means a newer search superseded this one. An empty
    /// candidate list is a successful "no matches"; transport failures are
    /// `SearchUnavailable`.
    pub async fn search(&self, query: &str) -> CoreResult<Option<Vec<PlaceCandidate>>> {
        let token = self.search_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let result = self.place_search.search(query).await;

        if self.search_generation.load(Ordering::SeqCst) != token {
            return Ok(None);
        }
        match result {
            Ok(candidates) => Ok(Some(candidates)),
            Err(CoreError::SearchUnavailable(reason)) => Err(CoreError::SearchUnavailable(reason)),
            Err(other) => Err(CoreError::SearchUnavailable(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Resolves the first call only after `release` is notified; later calls
    /// resolve immediately. Lets a test hold one request in flight while a
    /// second one completes.
    struct StalledGeolocation {
        release: Arc<Notify>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GeolocationService for StalledGeolocation {
        async fn current_position(&self) -> CoreResult<GeoPoint> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                self.release.notified().await;
                Ok(GeoPoint::new(10.0, 10.0))
            } else {
                Ok(GeoPoint::new(20.0, 20.0))
            }
        }
    }

    struct FailingGeolocation;

    #[async_trait]
    impl GeolocationService for FailingGeolocation {
        async fn current_position(&self) -> CoreResult<GeoPoint> {
            Err(CoreError::LocationUnavailable("permission denied".into()))
        }
    }

    struct WorkingGeolocation;

    #[async_trait]
    impl GeolocationService for WorkingGeolocation {
        async fn current_position(&self) -> CoreResult<GeoPoint> {
            Ok(GeoPoint::new(-1.29, 36.82))
        }
    }

    /// Search twin of `StalledGeolocation`: the first query resolves only
    /// after `release` is notified, later queries resolve immediately.
    struct StalledSearch {
        release: Arc<Notify>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PlaceSearchService for StalledSearch {
        async fn search(&self, _query: &str) -> CoreResult<Vec<PlaceCandidate>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let name = if call == 0 {
                self.release.notified().await;
                "Old Library"
            } else {
                "New Library"
            };
            Ok(vec![PlaceCandidate {
                id: call.to_string(),
                display_name: name.to_string(),
                latitude: "0.0".to_string(),
                longitude: "0.0".to_string(),
            }])
        }
    }

    struct StaticSearch(Vec<PlaceCandidate>);

    #[async_trait]
    impl PlaceSearchService for StaticSearch {
        async fn search(&self, _query: &str) -> CoreResult<Vec<PlaceCandidate>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSearch;

    #[async_trait]
    impl PlaceSearchService for BrokenSearch {
        async fn search(&self, _query: &str) -> CoreResult<Vec<PlaceCandidate>> {
            Err(CoreError::SearchUnavailable("connection refused".into()))
        }
    }

    fn tracker(
        geolocation: Arc<dyn GeolocationService>,
        place_search: Arc<dyn PlaceSearchService>,
    ) -> Arc<LocationTracker> {
        Arc::new(LocationTracker::new(geolocation, place_search))
    }

    #[tokio::test]
    async fn successful_acquire_updates_last_known() {
        let t = tracker(Arc::new(WorkingGeolocation), Arc::new(StaticSearch(vec![])));
        let point = t.acquire().await.unwrap().unwrap();
        assert_eq!(point.latitude, -1.29);
        assert_eq!(t.last_known().unwrap().latitude, -1.29);
    }

    #[tokio::test]
    async fn failed_acquire_leaves_last_known_untouched() {
        let t = tracker(Arc::new(WorkingGeolocation), Arc::new(StaticSearch(vec![])));
        t.acquire().await.unwrap();

        let t2 = Arc::new(LocationTracker {
            geolocation: Arc::new(FailingGeolocation),
            place_search: Arc::new(StaticSearch(vec![])),
            last_known: Mutex::new(t.last_known()),
            acquire_generation: AtomicU64::new(0),
            search_generation: AtomicU64::new(0),
        });

        let err = t2.acquire().await.unwrap_err();
        assert!(matches!(err, CoreError::LocationUnavailable(_)));
        assert_eq!(t2.last_known().unwrap().latitude, -1.29);
    }

    #[tokio::test]
    async fn stale_in_flight_acquire_is_discarded() {
        let release = Arc::new(Notify::new());
        let geolocation = Arc::new(StalledGeolocation {
            release: release.clone(),
            calls: AtomicUsize::new(0),
        });
        let t = tracker(geolocation, Arc::new(StaticSearch(vec![])));

        // First request stalls at its await point.
        let first = tokio::spawn({
            let t = t.clone();
            async move { t.acquire().await }
        });
        tokio::task::yield_now().await;

        // Second request supersedes it and completes.
        let second = t.acquire().await.unwrap().unwrap();
        assert_eq!(second.latitude, 20.0);

        // Now let the stale first response arrive: it must be discarded.
        release.notify_one();
        let first = first.await.unwrap().unwrap();
        assert!(first.is_none());
        assert_eq!(t.last_known().unwrap().latitude, 20.0);
    }

    #[tokio::test]
    async fn stale_in_flight_search_is_discarded() {
        let release = Arc::new(Notify::new());
        let place_search = Arc::new(StalledSearch {
            release: release.clone(),
            calls: AtomicUsize::new(0),
        });
        let t = tracker(Arc::new(WorkingGeolocation), place_search);

        // First search stalls at its await point.
        let first = tokio::spawn({
            let t = t.clone();
            async move { t.search("library").await }
        });
        tokio::task::yield_now().await;

        // Second search supersedes it and completes.
        let second = t.search("library").await.unwrap().unwrap();
        assert_eq!(second[0].display_name, "New Library");

        // Now let the stale first response arrive: it must be discarded.
        release.notify_one();
        let first = first.await.unwrap().unwrap();
        assert!(first.is_none());
    }

    #[tokio::test]
    async fn empty_search_results_are_success_not_error() {
        let t = tracker(Arc::new(WorkingGeolocation), Arc::new(StaticSearch(vec![])));
        let results = t.search("nowhere in particular").await.unwrap().unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_search_unavailable() {
        let t = tracker(Arc::new(WorkingGeolocation), Arc::new(BrokenSearch));
        let err = t.search("library").await.unwrap_err();
        assert!(matches!(err, CoreError::SearchUnavailable(_)));
    }
}
