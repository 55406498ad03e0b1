//! Abstract BLE transport.
//!
//! The engine and device proxy talk to the BLE stack exclusively through
//! these traits so that failure categories stay distinguishable in tests
//! and the production stack ([`btle::BtleTransport`]) remains swappable.

pub mod btle;
#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;

pub use btle::BtleTransport;

/// Service/characteristic layout of a peripheral.
///
/// Ids only; values are read separately per characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTopology {
    /// The service UUID.
    pub service: Uuid,
    /// UUIDs of the characteristics within the service.
    pub characteristics: Vec<Uuid>,
}

/// One peripheral's connection and GATT access.
///
/// All fallible calls return crate [`Result`]s; callers at the device-proxy
/// layer convert failures to booleans or status markers, never propagate.
#[async_trait]
pub trait PeripheralLink: Send + Sync {
    /// Transport-level identity (immutable).
    fn address(&self) -> String;

    /// Advertised name (immutable).
    fn identifier(&self) -> String;

    /// Open a connection. Idempotent: a no-op when already connected.
    async fn connect(&self) -> Result<()>;

    /// Close the connection. Idempotent.
    async fn disconnect(&self) -> Result<()>;

    /// Whether the connection is currently open.
    async fn is_connected(&self) -> bool;

    /// Enumerate services and their characteristics.
    ///
    /// Requires an open connection.
    async fn service_topology(&self) -> Result<Vec<ServiceTopology>>;

    /// Read a characteristic's value.
    async fn read(&self, service: Uuid, characteristic: Uuid) -> Result<Vec<u8>>;

    /// Issue a write request (with response) to a characteristic.
    async fn write_request(&self, service: Uuid, characteristic: Uuid, value: &[u8])
        -> Result<()>;
}

/// Adapter-level BLE access: availability checks and scanning.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether the BLE subsystem is enabled and usable.
    async fn bluetooth_enabled(&self) -> bool;

    /// Number of usable adapters. Only the first adapter is ever scanned.
    async fn adapter_count(&self) -> Result<usize>;

    /// Run a bounded scan on the active adapter and return every peripheral
    /// seen, in discovery order.
    async fn scan(&self, duration: Duration) -> Result<Vec<Arc<dyn PeripheralLink>>>;
}
