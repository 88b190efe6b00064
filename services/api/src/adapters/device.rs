//! services/api/src/adapters/device.rs
//!
//! This module contains the adapter for the device-geolocation collaborator.
//! The browser owns the actual geolocation API; it pushes fixes (or
//! permission failures) to `POST /location/report`, and this adapter turns
//! the most recent report into the `GeolocationService` port, waiting up to
//! a configured deadline for the first fix to arrive.

use async_trait::async_trait;
use geoattend_core::{
    domain::GeoPoint,
    error::{CoreError, CoreResult},
    ports::GeolocationService,
};
use std::time::Duration;
use tokio::sync::watch;

/// What the browser last told us about the device's position.
#[derive(Debug, Clone)]
pub enum ReportedFix {
    Position(GeoPoint),
    /// The browser's geolocation call failed (permission denied, timeout,
    /// position unavailable); the reason is relayed verbatim.
    Failed(String),
}

/// Creates the channel pair: the sender is held by the REST handler that
/// receives browser reports, the receiver by the adapter.
pub fn reported_location_channel() -> (
    watch::Sender<Option<ReportedFix>>,
    watch::Receiver<Option<ReportedFix>>,
) {
    watch::channel(None)
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `GeolocationService` port from
/// browser-reported fixes.
#[derive(Clone)]
pub struct ReportedLocationAdapter {
    fixes: watch::Receiver<Option<ReportedFix>>,
    wait: Duration,
}

impl ReportedLocationAdapter {
    /// Creates a new `ReportedLocationAdapter`.
    pub fn new(fixes: watch::Receiver<Option<ReportedFix>>, wait: Duration) -> Self {
        Self { fixes, wait }
    }

    fn resolve(fix: ReportedFix) -> CoreResult<GeoPoint> {
        match fix {
            ReportedFix::Position(point) => Ok(point),
            ReportedFix::Failed(reason) => Err(CoreError::LocationUnavailable(reason)),
        }
    }
}

//=========================================================================================
// `GeolocationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl GeolocationService for ReportedLocationAdapter {
    /// Returns the most recent browser-reported fix, waiting up to the
    /// configured deadline for the first report.
    async fn current_position(&self) -> CoreResult<GeoPoint> {
        let mut fixes = self.fixes.clone();

        if let Some(fix) = fixes.borrow_and_update().clone() {
            return Self::resolve(fix);
        }

        // No report yet: wait for the first one, bounded by the deadline.
        match tokio::time::timeout(self.wait, fixes.changed()).await {
            Err(_) => Err(CoreError::LocationUnavailable(
                "timed out waiting for the browser to report a position".to_string(),
            )),
            Ok(Err(_)) => Err(CoreError::LocationUnavailable(
                "location reporting channel closed".to_string(),
            )),
            Ok(Ok(())) => {
                let fix = fixes.borrow().clone().ok_or_else(|| {
                    CoreError::LocationUnavailable("no position reported".to_string())
                })?;
                Self::resolve(fix)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_the_reported_position() {
        let (tx, rx) = reported_location_channel();
        tx.send(Some(ReportedFix::Position(GeoPoint::new(-1.29, 36.82))))
            .unwrap();

        let adapter = ReportedLocationAdapter::new(rx, Duration::from_millis(50));
        let point = adapter.current_position().await.unwrap();
        assert_eq!(point.latitude, -1.29);
    }

    #[tokio::test]
    async fn relays_a_browser_permission_failure() {
        let (tx, rx) = reported_location_channel();
        tx.send(Some(ReportedFix::Failed(
            "User denied Geolocation".to_string(),
        )))
        .unwrap();

        let adapter = ReportedLocationAdapter::new(rx, Duration::from_millis(50));
        let err = adapter.current_position().await.unwrap_err();
        assert!(
            matches!(err, CoreError::LocationUnavailable(reason) if reason.contains("denied"))
        );
    }

    #[tokio::test]
    async fn times_out_when_nothing_is_reported() {
        let (_tx, rx) = reported_location_channel();
        let adapter = ReportedLocationAdapter::new(rx, Duration::from_millis(10));
        let err = adapter.current_position().await.unwrap_err();
        assert!(matches!(err, CoreError::LocationUnavailable(_)));
    }

    #[tokio::test]
    async fn picks_up_a_fix_that_arrives_while_waiting() {
        let (tx, rx) = reported_location_channel();
        let adapter = ReportedLocationAdapter::new(rx, Duration::from_secs(1));

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = tx.send(Some(ReportedFix::Position(GeoPoint::new(1.0, 2.0))));
        });

        let point = adapter.current_position().await.unwrap();
        assert_eq!(point.longitude, 2.0);
    }
}
