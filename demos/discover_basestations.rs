//! Basic example: Discover nearby lighthouse base stations
//!
//! Run with: cargo run --example discover_basestations

use lighthouse_ble::{BtleTransport, EngineConfig, LighthouseManager, NoActivity, Result};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lighthouse_ble=debug".parse().unwrap()),
        )
        .init();

    println!("Starting base station discovery...");
    println!("Base stations advertise as LHB-XXXXXX.\n");

    let transport = Arc::new(BtleTransport::new().await?);
    let engine = LighthouseManager::new(transport, Arc::new(NoActivity), EngineConfig::default());

    let _alerts = engine.on_alert(|alert| {
        println!("[alert] {:?}", alert);
    });

    engine.start().await?;

    println!("Scanning, this takes about 10 seconds...");
    println!("Press Ctrl+C to exit early.\n");

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(20)) => {}
        _ = tokio::signal::ctrl_c() => {
            println!("\nInterrupted!");
        }
    }

    println!("\n--- Discovery Complete ---");
    let devices = engine.devices();
    println!("Base stations found: {}", devices.len());

    for device in devices {
        println!("  {} ({}): {}", device.identifier, device.address, device.status);
    }

    engine.shutdown().await;
    println!("\nDone!");

    Ok(())
}
