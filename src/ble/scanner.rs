//! BLE scanning functionality.
//!
//! Provides the bounded-window scanner for discovering nearby peripherals.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::ble::adapter::{BleAdapter, DiscoveredDevice};
use crate::error::Result;

/// How long a scan runs before stopping on its own.
pub const SCAN_WINDOW: Duration = Duration::from_secs(10);

/// Scanner for discovering nearby BLE peripherals.
///
/// Results are deduplicated by identifier; the first sighting wins and
/// first-seen ordering is preserved.
pub struct Scanner {
    /// The BLE adapter to scan with.
    adapter: Arc<dyn BleAdapter>,
    /// Whether scanning is currently active.
    is_scanning: Arc<RwLock<bool>>,
    /// Discovered devices, in first-seen order.
    devices: Arc<RwLock<Vec<DiscoveredDevice>>>,
    /// Identifiers seen during the current scan.
    seen: Arc<RwLock<HashSet<String>>>,
    /// Channel for discovery events.
    event_tx: broadcast::Sender<DiscoveredDevice>,
    /// Handle to the scanning task.
    scan_handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl Scanner {
    /// Create a new scanner over the given adapter.
    pub fn new(adapter: Arc<dyn BleAdapter>) -> Self {
        let (event_tx, _) = broadcast::channel(100);

        Self {
            adapter,
            is_scanning: Arc::new(RwLock::new(false)),
            devices: Arc::new(RwLock::new(Vec::new())),
            seen: Arc::new(RwLock::new(HashSet::new())),
            event_tx,
            scan_handle: Arc::new(RwLock::new(None)),
        }
    }

    /// Start scanning for peripherals.
    ///
    /// Clears previous results and runs for [`SCAN_WINDOW`] unless stopped
    /// early with [`Self::stop_scan`].
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter cannot be initialized or scanning
    /// cannot start; the scanner stays idle in that case.
    pub async fn start_scan(&self) -> Result<()> {
        if *self.is_scanning.read() {
            debug!("Already scanning, ignoring start request");
            return Ok(());
        }

        info!("Starting BLE scan ({}s window)", SCAN_WINDOW.as_secs());

        self.devices.write().clear();
        self.seen.write().clear();

        self.adapter.initialize().await?;

        let mut rx = self.adapter.scan_events();
        self.adapter.start_scan().await?;

        *self.is_scanning.write() = true;

        let adapter = self.adapter.clone();
        let is_scanning = self.is_scanning.clone();
        let devices = self.devices.clone();
        let seen = self.seen.clone();
        let event_tx = self.event_tx.clone();

        let handle = tokio::spawn(async move {
            let deadline = tokio::time::sleep(SCAN_WINDOW);
            tokio::pin!(deadline);

            loop {
                tokio::select! {
                    _ = &mut deadline => {
                        debug!("Scan window elapsed");
                        break;
                    }
                    result = rx.recv() => match result {
                        Ok(device) => {
                            Self::record_discovery(&devices, &seen, &event_tx, device);
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!("Discovery channel lagged, {} events dropped", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = tokio::time::sleep(Duration::from_millis(100)) => {
                        // Check if we should stop scanning
                        if !*is_scanning.read() {
                            break;
                        }
                    }
                }
            }

            // Only stop the underlying scan if stop_scan() hasn't already
            if *is_scanning.read() {
                *is_scanning.write() = false;
                if let Err(e) = adapter.stop_scan().await {
                    error!("Failed to stop scan: {}", e);
                }
            }

            debug!("Scan task ended");
        });

        *self.scan_handle.write() = Some(handle);

        Ok(())
    }

    /// Stop scanning before the window elapses.
    pub async fn stop_scan(&self) -> Result<()> {
        if !*self.is_scanning.read() {
            debug!("Not scanning, ignoring stop request");
            return Ok(());
        }

        info!("Stopping BLE scan");

        *self.is_scanning.write() = false;

        self.adapter.stop_scan().await?;

        // Wait for the scan task to complete
        if let Some(handle) = self.scan_handle.write().take() {
            let _ = handle.await;
        }

        Ok(())
    }

    /// Check if currently scanning.
    pub fn is_scanning(&self) -> bool {
        *self.is_scanning.read()
    }

    /// Snapshot of discovered devices, in first-seen order.
    pub fn devices(&self) -> Vec<DiscoveredDevice> {
        self.devices.read().clone()
    }

    /// Look up a discovered device by identifier.
    pub fn device(&self, id: &str) -> Option<DiscoveredDevice> {
        self.devices.read().iter().find(|d| d.id == id).cloned()
    }

    /// Subscribe to discovery events.
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveredDevice> {
        self.event_tx.subscribe()
    }

    /// Record a discovery, dropping identifiers already seen this scan.
    fn record_discovery(
        devices: &Arc<RwLock<Vec<DiscoveredDevice>>>,
        seen: &Arc<RwLock<HashSet<String>>>,
        event_tx: &broadcast::Sender<DiscoveredDevice>,
        device: DiscoveredDevice,
    ) {
        if !seen.write().insert(device.id.clone()) {
            return;
        }

        debug!("Discovered {} ({})", device.display_name(), device.id);

        devices.write().push(device.clone());
        let _ = event_tx.send(device);
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        *self.is_scanning.write() = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn device(id: &str) -> DiscoveredDevice {
        DiscoveredDevice {
            id: id.to_string(),
            name: None,
            rssi: None,
        }
    }

    fn record_all(ids: &[String]) -> Vec<String> {
        let devices = Arc::new(RwLock::new(Vec::new()));
        let seen = Arc::new(RwLock::new(HashSet::new()));
        let (tx, _rx) = broadcast::channel(128);

        for id in ids {
            Scanner::record_discovery(&devices, &seen, &tx, device(id));
        }

        let result = devices.read().iter().map(|d| d.id.clone()).collect();
        result
    }

    #[test]
    fn test_duplicate_discovery_recorded_once() {
        let ids = vec!["AA:BB".to_string(), "AA:BB".to_string()];
        assert_eq!(record_all(&ids), vec!["AA:BB".to_string()]);
    }

    #[test]
    fn test_first_seen_order_preserved() {
        let ids = ["CC:DD", "AA:BB", "CC:DD", "EE:FF", "AA:BB"]
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        assert_eq!(record_all(&ids), vec!["CC:DD", "AA:BB", "EE:FF"]);
    }

    proptest! {
        #[test]
        fn discovery_list_unique_in_first_seen_order(
            ids in proptest::collection::vec("[0-9A-F]{2}:[0-9A-F]{2}", 0..40)
        ) {
            let result = record_all(&ids);

            let mut expected = Vec::new();
            let mut seen = HashSet::new();
            for id in &ids {
                if seen.insert(id.clone()) {
                    expected.push(id.clone());
                }
            }

            prop_assert_eq!(result, expected);
        }
    }
}
