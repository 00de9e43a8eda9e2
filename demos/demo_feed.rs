//! Watch the simulated nRF52833 DK without hardware.
//!
//! Run with: cargo run --example demo_feed

use nrf_monitor_ble::{DemoEvent, DemoFeed};
use std::time::Duration;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("nrf_monitor_ble=debug")
        .init();

    let feed = DemoFeed::new();
    let mut events = feed.subscribe();
    feed.start();

    println!("Demo feed running for 20 seconds. Press Ctrl+C to exit.\n");

    let deadline = tokio::time::sleep(Duration::from_secs(20));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(DemoEvent::Environment(reading)) => {
                    println!(
                        "ENV   {:.1} C  {:.1} %RH  {:.1} hPa",
                        reading.temperature_c,
                        reading.humidity_pct,
                        reading.pressure_hpa
                    );
                }
                Ok(DemoEvent::Led { index, on }) => {
                    println!("LED{}  {}", index, if on { "ON" } else { "OFF" });
                }
                Ok(DemoEvent::Button { pressed }) => {
                    println!("BTN   {}", if pressed { "PRESSED" } else { "RELEASED" });
                }
                Err(_) => break,
            }
        }
    }

    feed.stop();
    println!("\nDone! {} readings collected.", feed.history().len());
}
