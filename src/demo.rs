//! Simulated device feed.
//!
//! Reproduces the demo board's behavior without hardware: an environment
//! reading every 2 seconds, LED 1 toggling at 1 Hz, and a button press
//! every 5 seconds that releases after 200 ms. Useful for developing
//! consumers of this crate when no nRF52833 DK is in range.

use parking_lot::RwLock;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

use crate::data::environment::EnvironmentReading;

/// Number of environment readings kept in the history.
pub const HISTORY_LIMIT: usize = 50;

/// Event emitted by the demo feed.
#[derive(Debug, Clone)]
pub enum DemoEvent {
    /// A new environment reading.
    Environment(EnvironmentReading),
    /// An LED changed state.
    Led {
        /// LED number on the DK (1-4).
        index: u8,
        /// Whether the LED is lit.
        on: bool,
    },
    /// The user button changed state.
    Button {
        /// Whether the button is held down.
        pressed: bool,
    },
}

/// Simulated nRF52833 DK event source.
pub struct DemoFeed {
    /// Channel for demo events.
    event_tx: broadcast::Sender<DemoEvent>,
    /// Recent environment readings, oldest first.
    history: Arc<RwLock<Vec<EnvironmentReading>>>,
    /// Whether the feed is running.
    is_running: Arc<AtomicBool>,
    /// Handle to the generator task.
    handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl DemoFeed {
    /// Create a stopped demo feed.
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);

        Self {
            event_tx,
            history: Arc::new(RwLock::new(Vec::new())),
            is_running: Arc::new(AtomicBool::new(false)),
            handle: RwLock::new(None),
        }
    }

    /// Start generating events. Idempotent.
    pub fn start(&self) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            debug!("Demo feed already running");
            return;
        }

        let event_tx = self.event_tx.clone();
        let history = self.history.clone();
        let is_running = self.is_running.clone();

        let handle = tokio::spawn(async move {
            let mut led_on = false;
            let mut env_timer = tokio::time::interval(Duration::from_secs(2));
            let mut led_timer = tokio::time::interval(Duration::from_millis(500));
            let mut button_timer = tokio::time::interval(Duration::from_secs(5));

            while is_running.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = env_timer.tick() => {
                        let reading = Self::sample();
                        Self::push_capped(&mut history.write(), reading.clone());
                        let _ = event_tx.send(DemoEvent::Environment(reading));
                    }
                    _ = led_timer.tick() => {
                        led_on = !led_on;
                        let _ = event_tx.send(DemoEvent::Led { index: 1, on: led_on });
                    }
                    _ = button_timer.tick() => {
                        let _ = event_tx.send(DemoEvent::Button { pressed: true });
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        let _ = event_tx.send(DemoEvent::Button { pressed: false });
                    }
                }
            }

            debug!("Demo feed task ended");
        });

        *self.handle.write() = Some(handle);
    }

    /// Stop generating events.
    pub fn stop(&self) {
        self.is_running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.handle.write().take() {
            handle.abort();
        }
    }

    /// Check if the feed is running.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Subscribe to demo events.
    pub fn subscribe(&self) -> broadcast::Receiver<DemoEvent> {
        self.event_tx.subscribe()
    }

    /// Recent environment readings, oldest first, capped at [`HISTORY_LIMIT`].
    pub fn history(&self) -> Vec<EnvironmentReading> {
        self.history.read().clone()
    }

    /// Draw a plausible indoor reading.
    fn sample() -> EnvironmentReading {
        let mut rng = rand::thread_rng();
        EnvironmentReading::new(
            22.0 + rng.gen::<f32>() * 3.0,
            45.0 + rng.gen::<f32>() * 10.0,
            1013.0 + rng.gen::<f32>() * 5.0,
        )
    }

    fn push_capped(history: &mut Vec<EnvironmentReading>, reading: EnvironmentReading) {
        history.push(reading);
        let overflow = history.len().saturating_sub(HISTORY_LIMIT);
        if overflow > 0 {
            history.drain(..overflow);
        }
    }
}

impl Default for DemoFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DemoFeed {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_in_range() {
        for _ in 0..100 {
            let reading = DemoFeed::sample();
            assert!((22.0..=25.0).contains(&reading.temperature_c));
            assert!((45.0..=55.0).contains(&reading.humidity_pct));
            assert!((1013.0..=1018.0).contains(&reading.pressure_hpa));
        }
    }

    #[test]
    fn test_history_capped() {
        let mut history = Vec::new();
        for i in 0..(HISTORY_LIMIT + 10) {
            DemoFeed::push_capped(
                &mut history,
                EnvironmentReading::new(i as f32, 50.0, 1013.0),
            );
        }

        assert_eq!(history.len(), HISTORY_LIMIT);
        // Oldest entries were dropped
        assert_eq!(history[0].temperature_c, 10.0);
    }

    #[test]
    fn test_feed_emits_environment_readings() {
        tokio_test::block_on(async {
            let feed = DemoFeed::new();
            let mut rx = feed.subscribe();
            feed.start();
            assert!(feed.is_running());

            // The first environment tick fires immediately
            loop {
                match rx.recv().await.expect("feed closed") {
                    DemoEvent::Environment(reading) => {
                        assert!(reading.temperature_c >= 22.0);
                        break;
                    }
                    _ => continue,
                }
            }

            feed.stop();
            assert!(!feed.is_running());
        });
    }
}
