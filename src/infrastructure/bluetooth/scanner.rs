//! BLE Scanner Module
//!
//! Finds the display by address. A scan ends on the first matching
//! advertisement, when the scan window elapses, or when it is cancelled,
//! whichever happens first.

use crate::domain::models::Advertisement;
use crate::error::{Error, Result};
use crate::infrastructure::bluetooth::adapter::BleAdapter;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Cancels an in-progress scan from outside, e.g. on operator interrupt.
///
/// Clones share the same signal. Cancelling more than once has no further effect.
#[derive(Debug, Clone)]
pub struct ScanCancel {
    tx: watch::Sender<bool>,
}

impl ScanCancel {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives in self, so wait_for cannot observe a closed channel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for ScanCancel {
    fn default() -> Self {
        Self::new()
    }
}

enum ScanEnd {
    Found(Advertisement),
    Cancelled,
    TimedOut,
    StreamClosed,
}

async fn scan_window(max_scan_time: Option<Duration>) {
    match max_scan_time {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending().await,
    }
}

/// Scan until an advertisement from `address` is seen.
///
/// `max_scan_time` of `None` scans until found or cancelled.
pub async fn discover<A: BleAdapter>(
    adapter: &A,
    address: &str,
    max_scan_time: Option<Duration>,
    cancel: &ScanCancel,
) -> Result<Advertisement> {
    let not_found = |reason: String| Error::DeviceNotFound {
        address: address.to_string(),
        reason,
    };

    match max_scan_time {
        Some(limit) => info!("Scanning for {} for up to {:?}", address, limit),
        None => info!("Scanning for {} until found or cancelled", address),
    }

    let mut advertisements = adapter
        .scan()
        .await
        .map_err(|e| not_found(format!("scan did not start: {}", e)))?;

    let window = scan_window(max_scan_time);
    tokio::pin!(window);

    let end = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break ScanEnd::Cancelled,
            _ = &mut window => break ScanEnd::TimedOut,
            next = advertisements.next() => match next {
                Some(adv) if adv.matches_address(address) => break ScanEnd::Found(adv),
                Some(adv) => debug!("Ignoring advertisement from {}", adv.address),
                None => break ScanEnd::StreamClosed,
            },
        }
    };
    drop(advertisements);

    if let Err(e) = adapter.stop_scan().await {
        warn!("Failed to stop scan: {}", e);
    }

    match end {
        ScanEnd::Found(adv) => {
            info!(
                "Found {} ({}, RSSI {:?})",
                adv.address,
                adv.local_name.as_deref().unwrap_or("Unknown"),
                adv.rssi
            );
            Ok(adv)
        }
        ScanEnd::Cancelled => Err(not_found("scan cancelled".to_string())),
        ScanEnd::TimedOut => Err(not_found(format!(
            "no advertisement within {:?}",
            max_scan_time.unwrap_or_default()
        ))),
        ScanEnd::StreamClosed => Err(not_found("scan ended without a match".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::fake::{FakeAdapter, TARGET};

    #[tokio::test]
    async fn test_first_match_wins() {
        let adapter = FakeAdapter::builder()
            .advertise("11:11:11:11:11:11")
            .advertise_named(TARGET, "IDM-first")
            .advertise_named(TARGET, "IDM-second")
            .build();

        let adv = discover(&adapter, TARGET, None, &ScanCancel::new())
            .await
            .unwrap();
        assert_eq!(adv.local_name.as_deref(), Some("IDM-first"));
        assert_eq!(adapter.stop_scan_calls(), 1);
    }

    #[tokio::test]
    async fn test_address_match_ignores_case() {
        let adapter = FakeAdapter::builder().advertise(TARGET).build();
        let lower = TARGET.to_ascii_lowercase();
        assert!(discover(&adapter, &lower, None, &ScanCancel::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_scan_window_elapses() {
        let adapter = FakeAdapter::builder()
            .advertise("11:11:11:11:11:11")
            .keep_scanning()
            .build();

        let err = discover(
            &adapter,
            TARGET,
            Some(Duration::from_millis(20)),
            &ScanCancel::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound { .. }));
        assert_eq!(adapter.stop_scan_calls(), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_unbounded_scan() {
        let adapter = FakeAdapter::builder().keep_scanning().build();
        let cancel = ScanCancel::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
            trigger.cancel();
        });

        let err = discover(&adapter, TARGET, None, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound { ref reason, .. } if reason.contains("cancelled")));
        assert!(cancel.is_cancelled());
        assert_eq!(adapter.stop_scan_calls(), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let adapter = FakeAdapter::builder().advertise(TARGET).build();
        let cancel = ScanCancel::new();
        cancel.cancel();

        let err = discover(&adapter, TARGET, None, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_scan_start_failure() {
        let adapter = FakeAdapter::builder().fail_scan().build();
        let err = discover(&adapter, TARGET, None, &ScanCancel::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound { .. }));
    }
}
