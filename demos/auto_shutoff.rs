//! Unattended auto-shutoff: monitor base stations and power them off once
//! the foreground consumer goes away.
//!
//! The activity probe here treats the presence of a marker file as "the VR
//! compositor is running"; a real deployment would inspect the process
//! table instead.
//!
//! Run with: cargo run --example auto_shutoff [marker-file]

use lighthouse_ble::{AlertEvent, BtleTransport, EngineConfig, LighthouseManager, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lighthouse_ble=info".parse().unwrap()),
        )
        .init();

    let marker: PathBuf = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/tmp/vr-active".to_string())
        .into();

    println!("Auto-shutoff monitor");
    println!("Foreground activity marker: {}\n", marker.display());

    let probe = {
        let marker = marker.clone();
        move || marker.exists()
    };

    let transport = Arc::new(BtleTransport::new().await?);
    let engine = LighthouseManager::new(
        transport,
        Arc::new(probe),
        EngineConfig::conservative_shutoff(),
    );

    let _alerts = engine.on_alert(|alert| match alert {
        AlertEvent::Scanning => println!("[engine] scanning..."),
        AlertEvent::ActivityDetected => println!("[engine] foreground active, holding off"),
        AlertEvent::Terminating => println!("[engine] powering base stations off"),
        AlertEvent::PoweringOn => println!("[engine] powering base stations on"),
        _ => {}
    });

    engine.start().await?;

    println!("Monitoring. Create/remove the marker file to simulate activity.");
    println!("Press Ctrl+C to stop.\n");

    let mut status_interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = status_interval.tick() => {
                for device in engine.devices() {
                    println!("  {}: {}", device.identifier, device.status);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!("\nStopping...");
    engine.shutdown().await;

    Ok(())
}
