//! Scriptable in-memory transport for unit tests.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::transport::{PeripheralLink, ServiceTopology, Transport};
use crate::uuids::{POWER_CHARACTERISTIC_UUID, POWER_SERVICE_UUID};

/// In-memory peripheral with injectable failures.
pub struct MockPeripheral {
    address: String,
    identifier: String,
    topology: Vec<ServiceTopology>,
    values: RwLock<HashMap<(Uuid, Uuid), Vec<u8>>>,
    connected: AtomicBool,
    connect_fails: AtomicBool,
    fail_reads: RwLock<HashSet<(Uuid, Uuid)>>,
    connect_count: AtomicUsize,
    write_log: RwLock<Vec<(Uuid, Uuid, Vec<u8>)>>,
}

impl MockPeripheral {
    /// A well-formed base station exposing the power service, currently
    /// reporting `power_byte`.
    pub fn lighthouse(identifier: &str, address: &str, power_byte: u8) -> Arc<Self> {
        let mut values = HashMap::new();
        values.insert(
            (POWER_SERVICE_UUID, POWER_CHARACTERISTIC_UUID),
            vec![power_byte],
        );

        Arc::new(Self {
            address: address.to_string(),
            identifier: identifier.to_string(),
            topology: vec![ServiceTopology {
                service: POWER_SERVICE_UUID,
                characteristics: vec![POWER_CHARACTERISTIC_UUID],
            }],
            values: RwLock::new(values),
            connected: AtomicBool::new(false),
            connect_fails: AtomicBool::new(false),
            fail_reads: RwLock::new(HashSet::new()),
            connect_count: AtomicUsize::new(0),
            write_log: RwLock::new(Vec::new()),
        })
    }

    /// A peripheral without the power service (fails validation).
    pub fn plain(identifier: &str, address: &str) -> Arc<Self> {
        let service = Uuid::from_u128(0x0000_180a_0000_1000_8000_00805f9b34fb);
        let characteristic = Uuid::from_u128(0x0000_2a29_0000_1000_8000_00805f9b34fb);

        let mut values = HashMap::new();
        values.insert((service, characteristic), b"Mock".to_vec());

        Arc::new(Self {
            address: address.to_string(),
            identifier: identifier.to_string(),
            topology: vec![ServiceTopology {
                service,
                characteristics: vec![characteristic],
            }],
            values: RwLock::new(values),
            connected: AtomicBool::new(false),
            connect_fails: AtomicBool::new(false),
            fail_reads: RwLock::new(HashSet::new()),
            connect_count: AtomicUsize::new(0),
            write_log: RwLock::new(Vec::new()),
        })
    }

    /// Make subsequent connect attempts fail.
    pub fn set_connect_fails(&self, fails: bool) {
        self.connect_fails.store(fails, Ordering::SeqCst);
    }

    /// Make reads of one characteristic fail.
    pub fn set_read_fails(&self, service: Uuid, characteristic: Uuid, fails: bool) {
        if fails {
            self.fail_reads.write().insert((service, characteristic));
        } else {
            self.fail_reads.write().remove(&(service, characteristic));
        }
    }

    /// Overwrite a characteristic's stored value.
    pub fn set_value(&self, service: Uuid, characteristic: Uuid, value: Vec<u8>) {
        self.values.write().insert((service, characteristic), value);
    }

    /// Current stored power byte, if any.
    pub fn power_value(&self) -> Option<Vec<u8>> {
        self.values
            .read()
            .get(&(POWER_SERVICE_UUID, POWER_CHARACTERISTIC_UUID))
            .cloned()
    }

    /// Number of successful connects so far.
    pub fn connect_count(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// Every write issued, in order.
    pub fn writes(&self) -> Vec<(Uuid, Uuid, Vec<u8>)> {
        self.write_log.read().clone()
    }
}

#[async_trait]
impl PeripheralLink for MockPeripheral {
    fn address(&self) -> String {
        self.address.clone()
    }

    fn identifier(&self) -> String {
        self.identifier.clone()
    }

    async fn connect(&self) -> Result<()> {
        if self.connect_fails.load(Ordering::SeqCst) {
            return Err(Error::ConnectionFailed {
                reason: "mock connect failure".to_string(),
            });
        }

        self.connected.store(true, Ordering::SeqCst);
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn service_topology(&self) -> Result<Vec<ServiceTopology>> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        Ok(self.topology.clone())
    }

    async fn read(&self, service: Uuid, characteristic: Uuid) -> Result<Vec<u8>> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }

        if self.fail_reads.read().contains(&(service, characteristic)) {
            return Err(Error::Timeout);
        }

        self.values
            .read()
            .get(&(service, characteristic))
            .cloned()
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: characteristic.to_string(),
            })
    }

    async fn write_request(
        &self,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }

        let key = (service, characteristic);
        if !self.values.read().contains_key(&key) {
            return Err(Error::CharacteristicNotFound {
                uuid: characteristic.to_string(),
            });
        }

        self.write_log
            .write()
            .push((service, characteristic, value.to_vec()));
        self.values.write().insert(key, value.to_vec());
        Ok(())
    }
}

/// In-memory transport replaying a fixed peripheral set per scan.
pub struct MockTransport {
    enabled: AtomicBool,
    adapters: AtomicUsize,
    peripherals: RwLock<Vec<Arc<MockPeripheral>>>,
    scan_count: AtomicUsize,
}

impl MockTransport {
    /// Transport with one adapter and the given peripherals in the air.
    pub fn new(peripherals: Vec<Arc<MockPeripheral>>) -> Arc<Self> {
        Arc::new(Self {
            enabled: AtomicBool::new(true),
            adapters: AtomicUsize::new(1),
            peripherals: RwLock::new(peripherals),
            scan_count: AtomicUsize::new(0),
        })
    }

    /// Transport whose BLE subsystem reports disabled.
    pub fn disabled() -> Arc<Self> {
        let transport = Self::new(Vec::new());
        transport.enabled.store(false, Ordering::SeqCst);
        transport
    }

    /// Transport with zero adapters.
    pub fn without_adapters() -> Arc<Self> {
        let transport = Self::new(Vec::new());
        transport.adapters.store(0, Ordering::SeqCst);
        transport
    }

    /// Replace the peripherals future scans will return.
    pub fn set_peripherals(&self, peripherals: Vec<Arc<MockPeripheral>>) {
        *self.peripherals.write() = peripherals;
    }

    /// Number of scans performed so far.
    pub fn scan_count(&self) -> usize {
        self.scan_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn bluetooth_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn adapter_count(&self) -> Result<usize> {
        Ok(self.adapters.load(Ordering::SeqCst))
    }

    async fn scan(&self, _duration: Duration) -> Result<Vec<Arc<dyn PeripheralLink>>> {
        self.scan_count.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .peripherals
            .read()
            .iter()
            .map(|p| p.clone() as Arc<dyn PeripheralLink>)
            .collect())
    }
}
