//! Lighthouse base station proxy.
//!
//! Wraps one peripheral with connect-per-operation access, a lazily
//! discovered characteristic cache, and a power status derived from the raw
//! power characteristic byte. Transport failures never escape this layer;
//! callers observe boolean results and the derived status only.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::transport::PeripheralLink;
use crate::uuids::{POWER_CHARACTERISTIC_UUID, POWER_OFF, POWER_ON, POWER_SERVICE_UUID};

/// Power state derived from the power characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerStatus {
    /// Not read yet.
    #[default]
    Unknown,
    /// Base station reports powered off.
    Off,
    /// Base station reports powered on, with the raw state byte.
    On(u8),
    /// The characteristic read back empty.
    Error,
}

impl PowerStatus {
    /// Whether this status counts as "observed on" for the shutoff debounce.
    pub fn is_on(&self) -> bool {
        matches!(self, Self::On(_))
    }
}

impl std::fmt::Display for PowerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "UNKNOWN"),
            Self::Off => write!(f, "OFF (0x00)"),
            Self::On(b) => write!(f, "ON ({:#04x})", b),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Last known state of one cached characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CharacteristicValue {
    /// Discovered but never read.
    #[default]
    Unread,
    /// Last read succeeded with these bytes.
    Value(Vec<u8>),
    /// Last read failed at the transport.
    ReadFailed,
}

/// Derive a power status from a successfully read power characteristic value.
///
/// Pure: empty data means the device answered but reported nothing usable.
pub fn derive_status(data: &[u8]) -> PowerStatus {
    match data.first() {
        None => PowerStatus::Error,
        Some(0x00) => PowerStatus::Off,
        Some(&b) => PowerStatus::On(b),
    }
}

/// Immutable per-device view handed out to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSnapshot {
    /// Transport-level identity.
    pub address: String,
    /// Advertised name.
    pub identifier: String,
    /// Last derived power status.
    pub status: PowerStatus,
}

/// Proxy for one lighthouse base station.
pub struct Lighthouse {
    address: String,
    identifier: String,
    peripheral: Arc<dyn PeripheralLink>,
    status: RwLock<PowerStatus>,
    /// service -> characteristic -> last value. Ordered so read passes are
    /// deterministic. Topology is discovered once per proxy lifetime.
    services: RwLock<BTreeMap<Uuid, BTreeMap<Uuid, CharacteristicValue>>>,
}

impl Lighthouse {
    /// Wrap a peripheral discovered during a scan.
    pub fn new(peripheral: Arc<dyn PeripheralLink>) -> Self {
        Self {
            address: peripheral.address(),
            identifier: peripheral.identifier(),
            peripheral,
            status: RwLock::new(PowerStatus::Unknown),
            services: RwLock::new(BTreeMap::new()),
        }
    }

    /// Transport-level identity.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Advertised name.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Last derived power status.
    pub fn status(&self) -> PowerStatus {
        *self.status.read()
    }

    /// Immutable snapshot of this device.
    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            address: self.address.clone(),
            identifier: self.identifier.clone(),
            status: self.status(),
        }
    }

    /// Cached value of one characteristic, if it exists in the cache.
    pub fn cached_value(&self, service: Uuid, characteristic: Uuid) -> Option<CharacteristicValue> {
        self.services
            .read()
            .get(&service)
            .and_then(|chars| chars.get(&characteristic))
            .cloned()
    }

    /// True iff the power service/characteristic pair exists in the cache.
    ///
    /// Membership only; the cached value is not inspected.
    pub fn is_valid_lighthouse(&self) -> bool {
        self.services
            .read()
            .get(&POWER_SERVICE_UUID)
            .map(|chars| chars.contains_key(&POWER_CHARACTERISTIC_UUID))
            .unwrap_or(false)
    }

    /// Connect, refresh every cached characteristic, derive status, and
    /// disconnect.
    ///
    /// On the first successful pass the service/characteristic topology is
    /// enumerated and cached. Individual read failures are recorded per
    /// entry and do not abort the pass. Returns false only if the initial
    /// connect failed.
    pub async fn read_all_characteristics(&self) -> bool {
        if !self.connect().await {
            return false;
        }

        if self.services.read().is_empty() {
            match self.peripheral.service_topology().await {
                Ok(topology) => {
                    let mut services = self.services.write();
                    for entry in topology {
                        let chars = services.entry(entry.service).or_default();
                        for characteristic in entry.characteristics {
                            chars.entry(characteristic).or_default();
                        }
                    }
                }
                Err(e) => {
                    warn!("{}: service discovery failed: {}", self.identifier, e);
                }
            }
        }

        debug!("Reading characteristics of {}", self.identifier);

        let keys: Vec<(Uuid, Uuid)> = self
            .services
            .read()
            .iter()
            .flat_map(|(s, chars)| chars.keys().map(move |c| (*s, *c)))
            .collect();

        for (service, characteristic) in keys {
            let value = match self.peripheral.read(service, characteristic).await {
                Ok(data) => {
                    trace!("{} {} = {:02X?}", service, characteristic, data);
                    CharacteristicValue::Value(data)
                }
                Err(e) => {
                    trace!("{} {} read failed: {}", service, characteristic, e);
                    CharacteristicValue::ReadFailed
                }
            };

            if let Some(chars) = self.services.write().get_mut(&service) {
                chars.insert(characteristic, value);
            }
        }

        // A failed power read keeps the previous status; the next tick is
        // the retry.
        if let Some(CharacteristicValue::Value(data)) =
            self.cached_value(POWER_SERVICE_UUID, POWER_CHARACTERISTIC_UUID)
        {
            *self.status.write() = derive_status(&data);
        }

        self.disconnect().await;

        true
    }

    /// Refresh one cached characteristic and return its value.
    ///
    /// Returns `None` when the entry is not in the cache. The cached value
    /// is left untouched if the connect or read fails.
    pub async fn read_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Option<CharacteristicValue> {
        self.cached_value(service, characteristic)?;

        if self.connect().await {
            if let Ok(data) = self.peripheral.read(service, characteristic).await {
                if let Some(chars) = self.services.write().get_mut(&service) {
                    chars.insert(characteristic, CharacteristicValue::Value(data));
                }
            }
            self.disconnect().await;
        }

        self.cached_value(service, characteristic)
    }

    /// Connect, issue a write request, and disconnect.
    ///
    /// Returns false only if the connect failed; the caller re-reads to
    /// observe the effect.
    pub async fn write_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> bool {
        if !self.connect().await {
            return false;
        }

        if let Err(e) = self
            .peripheral
            .write_request(service, characteristic, value)
            .await
        {
            warn!("{}: write failed: {}", self.identifier, e);
        }

        self.disconnect().await;

        true
    }

    /// Write the power-off byte and verify via a full re-read.
    pub async fn power_off(&self) -> bool {
        if !self
            .write_characteristic(POWER_SERVICE_UUID, POWER_CHARACTERISTIC_UUID, &[POWER_OFF])
            .await
        {
            return false;
        }

        self.read_all_characteristics().await && self.status() == PowerStatus::Off
    }

    /// Write the power-on byte and verify via a full re-read.
    pub async fn power_on(&self) -> bool {
        if !self
            .write_characteristic(POWER_SERVICE_UUID, POWER_CHARACTERISTIC_UUID, &[POWER_ON])
            .await
        {
            return false;
        }

        self.read_all_characteristics().await && self.status().is_on()
    }

    /// Open a connection, swallowing transport errors.
    async fn connect(&self) -> bool {
        if let Err(e) = self.peripheral.connect().await {
            warn!("{}: connect failed: {}", self.identifier, e);
        }

        self.peripheral.is_connected().await
    }

    /// Close the connection, swallowing transport errors.
    async fn disconnect(&self) {
        if let Err(e) = self.peripheral.disconnect().await {
            warn!("{}: disconnect failed: {}", self.identifier, e);
        }
    }
}

impl std::fmt::Debug for Lighthouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lighthouse")
            .field("address", &self.address)
            .field("identifier", &self.identifier)
            .field("status", &self.status())
            .finish()
    }
}
