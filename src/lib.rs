// Allow holding locks across await points - we use parking_lot which is designed for this
#![allow(clippy::await_holding_lock)]
// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # lighthouse-ble
//!
//! A cross-platform Rust library for discovering, health-monitoring, and
//! power-controlling Valve lighthouse V2 base stations over Bluetooth Low
//! Energy.
//!
//! Base stations advertise a local name starting with `LHB-` and expose a
//! vendor power service. This library runs an unattended background engine
//! that scans for them, validates each candidate against that service, polls
//! their power state every tick, and powers them off once no foreground
//! consumer (e.g. a running VR compositor) has been detected for long enough.
//! Manual refresh and power commands can be issued from any thread.
//!
//! ## Features
//!
//! - **Auto-discovery**: scan rounds filtered by the `LHB-` name prefix
//! - **Validation**: candidates are checked for the vendor power service
//! - **Health monitoring**: per-tick power status derived from raw bytes
//! - **Debounced auto-shutoff**: gated by a pluggable foreground activity probe
//! - **Manual control**: fire-and-forget refresh / power-on / power-off
//! - **Alert events**: coarse notifications for a presentation layer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lighthouse_ble::{BtleTransport, EngineConfig, LighthouseManager, NoActivity, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let transport = Arc::new(BtleTransport::new().await?);
//!     let engine = LighthouseManager::new(transport, Arc::new(NoActivity), EngineConfig::default());
//!
//!     let _alerts = engine.on_alert(|alert| println!("alert: {:?}", alert));
//!
//!     // Starts the background worker and immediately scans.
//!     engine.start().await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(15)).await;
//!
//!     for device in engine.devices() {
//!         println!("{} ({}): {}", device.identifier, device.address, device.status);
//!     }
//!
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.

// Public modules
pub mod activity;
pub mod config;
pub mod engine;
pub mod error;
pub mod lighthouse;
pub mod tasks;
pub mod transport;
pub mod uuids;

// Re-exports for convenience
pub use activity::{ActivityProbe, NoActivity};
pub use config::EngineConfig;
pub use engine::{AlertEvent, CallbackHandle, LighthouseManager, Phase};
pub use error::{Error, Result};
pub use lighthouse::{derive_status, CharacteristicValue, DeviceSnapshot, Lighthouse, PowerStatus};
pub use tasks::{BackgroundTaskRegistry, CancelFlag, TaskId};
pub use transport::{BtleTransport, PeripheralLink, ServiceTopology, Transport};
pub use uuids::{
    LIGHTHOUSE_NAME_PREFIX, POWER_CHARACTERISTIC_UUID, POWER_OFF, POWER_ON, POWER_SERVICE_UUID,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that key types are exported
        let _ = std::any::TypeId::of::<LighthouseManager>();
        let _ = std::any::TypeId::of::<Lighthouse>();
        let _ = std::any::TypeId::of::<Error>();
        let _ = std::any::TypeId::of::<AlertEvent>();
        let _ = std::any::TypeId::of::<Phase>();
        let _ = std::any::TypeId::of::<EngineConfig>();
    }

    #[test]
    fn test_status_derivation_exported() {
        assert_eq!(derive_status(&[POWER_OFF]), PowerStatus::Off);
        assert_eq!(derive_status(&[POWER_ON]), PowerStatus::On(POWER_ON));
    }
}
