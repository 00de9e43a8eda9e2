//! Basic example: discover nearby BLE devices
//!
//! Run with: cargo run --example scan_devices

use nrf_monitor_ble::{DeviceManager, Result, SCAN_WINDOW};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nrf_monitor_ble=debug".parse().unwrap()),
        )
        .init();

    println!(
        "Scanning for BLE devices ({} second window)...",
        SCAN_WINDOW.as_secs()
    );
    println!("Press Ctrl+C to stop early.\n");

    let manager = DeviceManager::new().await?;
    let mut discoveries = manager.subscribe_discoveries();

    manager.start_scanning().await?;

    let deadline = tokio::time::sleep(SCAN_WINDOW);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            result = discoveries.recv() => match result {
                Ok(device) => {
                    println!(
                        "  {} ({})  RSSI: {:?} dBm",
                        device.display_name(),
                        device.id,
                        device.rssi
                    );
                }
                Err(_) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\nInterrupted!");
                break;
            }
        }
    }

    println!("\n--- Scan Complete ---");
    println!("Total devices found: {}", manager.devices().len());

    manager.shutdown().await?;
    println!("\nDone!");

    Ok(())
}
