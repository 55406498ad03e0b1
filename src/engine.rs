//! Discovery engine for lighthouse base stations.
//!
//! Owns the transport handle and the discovered device set, and drives the
//! scan/validate/monitor/power phases from a single background worker. All
//! BLE I/O and all alert emission happen on that worker; callers interact
//! through non-blocking command requests and snapshot reads.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::activity::ActivityProbe;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::lighthouse::{DeviceSnapshot, Lighthouse};
use crate::tasks::{BackgroundTaskRegistry, CancelFlag, TaskId};
use crate::transport::{PeripheralLink, Transport};
use crate::uuids::is_lighthouse_name;

/// Engine phase. Mutated only by the background worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No devices tracked, waiting for a refresh request.
    #[default]
    Idle,
    /// A scan round is pending or in progress.
    Scanning,
    /// Tracked devices are polled every tick.
    Monitoring,
    /// Devices are being powered off.
    Terminating,
    /// Devices are being powered on.
    PoweringOn,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Scanning => write!(f, "Scanning"),
            Self::Monitoring => write!(f, "Monitoring"),
            Self::Terminating => write!(f, "Terminating"),
            Self::PoweringOn => write!(f, "PoweringOn"),
        }
    }
}

/// Fire-and-forget notification emitted on phase transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertEvent {
    /// The BLE subsystem is disabled; the engine never started.
    BluetoothDisabled,
    /// No BLE adapters are present; the engine never started.
    NoAdaptersFound,
    /// A scan round has started.
    Scanning,
    /// A scan round finished, or a monitoring tick passed without incident.
    Ready,
    /// The foreground consumer is active; auto-shutoff is suspended.
    ActivityDetected,
    /// Devices are being powered on.
    PoweringOn,
    /// Devices are being powered off.
    Terminating,
}

/// Callback handle for unregistering callbacks.
pub struct CallbackHandle {
    id: u64,
    unregister_fn: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl CallbackHandle {
    pub(crate) fn new(id: u64, unregister_fn: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            unregister_fn: Some(Box::new(unregister_fn)),
        }
    }

    /// Unregister this callback.
    pub fn unregister(mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }

    /// Get the callback ID.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }
}

/// State shared between the manager handle and its worker.
struct EngineShared {
    transport: Arc<dyn Transport>,
    activity: Arc<dyn ActivityProbe>,
    config: EngineConfig,
    phase: RwLock<Phase>,
    devices: RwLock<Vec<Arc<Lighthouse>>>,
    pending_rescan: AtomicBool,
    pending_power_on: AtomicBool,
    pending_power_off: AtomicBool,
    alert_tx: broadcast::Sender<AlertEvent>,
}

impl EngineShared {
    fn emit(&self, alert: AlertEvent) {
        debug!("Alert: {:?}", alert);
        let _ = self.alert_tx.send(alert);
    }

    fn set_phase(&self, phase: Phase) {
        let previous = {
            let mut current = self.phase.write();
            std::mem::replace(&mut *current, phase)
        };

        if previous != phase {
            debug!("Phase: {} -> {}", previous, phase);
        }
    }
}

/// Central manager for discovering and power-controlling lighthouse base
/// stations.
pub struct LighthouseManager {
    shared: Arc<EngineShared>,
    registry: BackgroundTaskRegistry,
    worker: RwLock<Option<TaskId>>,
    callback_counter: AtomicU64,
}

impl LighthouseManager {
    /// Create a manager over a transport and an activity probe.
    ///
    /// Cheap: no BLE access happens until [`start`](Self::start).
    pub fn new(
        transport: Arc<dyn Transport>,
        activity: Arc<dyn ActivityProbe>,
        config: EngineConfig,
    ) -> Self {
        let (alert_tx, _) = broadcast::channel(32);

        Self {
            shared: Arc::new(EngineShared {
                transport,
                activity,
                config,
                phase: RwLock::new(Phase::Idle),
                devices: RwLock::new(Vec::new()),
                pending_rescan: AtomicBool::new(false),
                pending_power_on: AtomicBool::new(false),
                pending_power_off: AtomicBool::new(false),
                alert_tx,
            }),
            registry: BackgroundTaskRegistry::new(),
            worker: RwLock::new(None),
            callback_counter: AtomicU64::new(0),
        }
    }

    /// Check BLE availability and start the background worker.
    ///
    /// Emits `BluetoothDisabled` or `NoAdaptersFound` and returns an error
    /// without starting the worker when the BLE subsystem is unusable. On
    /// success the worker starts in `Idle` with a refresh already requested.
    pub async fn start(&self) -> Result<()> {
        if self.is_running() {
            return Err(Error::AlreadyStarted);
        }

        if !self.shared.transport.bluetooth_enabled().await {
            self.shared.emit(AlertEvent::BluetoothDisabled);
            return Err(Error::BluetoothUnavailable);
        }

        if self.shared.transport.adapter_count().await? == 0 {
            self.shared.emit(AlertEvent::NoAdaptersFound);
            return Err(Error::NoAdaptersFound);
        }

        info!("Starting lighthouse discovery engine");

        self.shared.set_phase(Phase::Idle);
        self.shared.pending_rescan.store(true, Ordering::SeqCst);

        let shared = self.shared.clone();
        let id = self
            .registry
            .spawn(move |cancel| Self::run_worker(shared, cancel));

        *self.worker.write() = Some(id);

        Ok(())
    }

    /// Whether the background worker is running.
    pub fn is_running(&self) -> bool {
        let worker = *self.worker.read();
        worker.map(|id| self.registry.is_alive(id)).unwrap_or(false)
    }

    /// Cooperatively stop the worker and wait for it to exit.
    pub async fn shutdown(&self) {
        let id = self.worker.write().take();
        if let Some(id) = id {
            info!("Shutting down lighthouse discovery engine");
            self.registry.request_cancel(id, false);
            self.registry.join(id).await;
        }
    }

    /// Request a new scan round. Non-blocking, safe from any thread.
    ///
    /// Coalesced: repeat requests before the worker consumes the flag are
    /// no-ops. Acted on from `Idle` or `Monitoring`; retained otherwise.
    pub fn request_refresh(&self) {
        self.shared.pending_rescan.store(true, Ordering::SeqCst);
    }

    /// Request powering on all tracked devices. Non-blocking, coalesced.
    pub fn request_power_on(&self) {
        self.shared.pending_power_on.store(true, Ordering::SeqCst);
    }

    /// Request powering off all tracked devices. Non-blocking, coalesced.
    ///
    /// Honored only when [`EngineConfig::manual_power_off`] is set;
    /// otherwise power-off happens solely through the automatic shutoff
    /// threshold.
    pub fn request_power_off(&self) {
        if !self.shared.config.manual_power_off {
            debug!("Manual power-off is disabled, ignoring request");
            return;
        }
        self.shared.pending_power_off.store(true, Ordering::SeqCst);
    }

    /// Current engine phase.
    pub fn phase(&self) -> Phase {
        *self.shared.phase.read()
    }

    /// Immutable snapshot of the tracked devices, in discovery order.
    pub fn devices(&self) -> Vec<DeviceSnapshot> {
        self.shared
            .devices
            .read()
            .iter()
            .map(|d| d.snapshot())
            .collect()
    }

    /// Subscribe to alert events.
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AlertEvent> {
        self.shared.alert_tx.subscribe()
    }

    /// Register a callback invoked for every alert event.
    ///
    /// The callback runs on an engine-owned task; marshal to your own
    /// context before touching UI state.
    pub fn on_alert<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(AlertEvent) + Send + Sync + 'static,
    {
        let callback_id = self.callback_counter.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.shared.alert_tx.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(alert) => callback(alert),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        CallbackHandle::new(callback_id, move || {
            handle.abort();
        })
    }

    /// Worker entry point: one tick per interval until cancelled.
    async fn run_worker(shared: Arc<EngineShared>, cancel: CancelFlag) {
        let mut shutoff_tick: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            Self::tick(&shared, &cancel, &mut shutoff_tick).await;

            tokio::time::sleep(shared.config.tick_interval).await;
        }

        debug!("Engine worker exited");
    }

    /// Resolve one tick to exactly one next phase.
    async fn tick(shared: &Arc<EngineShared>, cancel: &CancelFlag, shutoff_tick: &mut u32) {
        let phase = *shared.phase.read();

        match phase {
            Phase::Idle => {
                if shared.pending_rescan.swap(false, Ordering::SeqCst) {
                    shared.set_phase(Phase::Scanning);
                }
            }
            Phase::Scanning => Self::scan_phase(shared, cancel).await,
            Phase::Monitoring => Self::monitor_phase(shared, cancel, shutoff_tick).await,
            Phase::Terminating => {
                shared.emit(AlertEvent::Terminating);
                Self::power_all(shared, cancel, false).await;
                shared.set_phase(Phase::Monitoring);
            }
            Phase::PoweringOn => {
                shared.emit(AlertEvent::PoweringOn);
                Self::power_all(shared, cancel, true).await;
                shared.set_phase(Phase::Monitoring);
            }
        }
    }

    /// Run one scan round: discover, filter by name, validate each
    /// candidate. Ends in `Monitoring` when at least one candidate is a
    /// valid base station, `Idle` otherwise. Exactly one `Ready` alert
    /// fires per round.
    async fn scan_phase(shared: &Arc<EngineShared>, cancel: &CancelFlag) {
        shared.emit(AlertEvent::Scanning);

        // The device set is rebuilt from scratch each round.
        shared.devices.write().clear();

        let peripherals = match shared.transport.scan(shared.config.scan_duration).await {
            Ok(peripherals) => peripherals,
            Err(e) => {
                warn!("Scan failed: {}", e);
                shared.set_phase(Phase::Idle);
                shared.emit(AlertEvent::Ready);
                return;
            }
        };

        let candidates: Vec<Arc<Lighthouse>> = peripherals
            .into_iter()
            .filter(|p| is_lighthouse_name(&p.identifier()))
            .map(|p| Arc::new(Lighthouse::new(p)))
            .collect();

        info!("Scan found {} lighthouse candidates", candidates.len());

        if candidates.is_empty() {
            shared.set_phase(Phase::Idle);
            shared.emit(AlertEvent::Ready);
            return;
        }

        let mut any_valid = false;
        for candidate in &candidates {
            if cancel.is_cancelled() {
                return;
            }

            candidate.read_all_characteristics().await;
            if candidate.is_valid_lighthouse() {
                any_valid = true;
            } else {
                debug!("{} failed validation", candidate.identifier());
            }
        }

        if any_valid {
            // Keep the whole candidate set, valid and invalid alike.
            *shared.devices.write() = candidates;
            shared.set_phase(Phase::Monitoring);
        } else {
            shared.set_phase(Phase::Idle);
        }

        shared.emit(AlertEvent::Ready);
    }

    /// One monitoring tick: activity gate, per-device health poll, debounced
    /// shutoff decision, then pending command consumption.
    async fn monitor_phase(
        shared: &Arc<EngineShared>,
        cancel: &CancelFlag,
        shutoff_tick: &mut u32,
    ) {
        if shared.activity.foreground_active() {
            *shutoff_tick = 0;
            shared.emit(AlertEvent::ActivityDetected);
            return;
        }

        let devices: Vec<Arc<Lighthouse>> = shared.devices.read().clone();

        for device in &devices {
            if cancel.is_cancelled() {
                return;
            }

            if device.read_all_characteristics().await && device.status().is_on() {
                *shutoff_tick += 1;
            }
        }

        // Accumulated across ticks: one tick of all-On observations is never
        // enough on its own to trip the threshold.
        let threshold = devices.len() as u32 * shared.config.shutoff_multiplier;
        if *shutoff_tick > threshold {
            debug!(
                "Shutoff threshold exceeded ({} > {})",
                *shutoff_tick, threshold
            );
            *shutoff_tick = 0;
            shared.set_phase(Phase::Terminating);
            return;
        }

        if shared.pending_rescan.swap(false, Ordering::SeqCst) {
            shared.set_phase(Phase::Scanning);
            return;
        }

        if shared.pending_power_on.swap(false, Ordering::SeqCst) {
            shared.set_phase(Phase::PoweringOn);
            return;
        }

        if shared.pending_power_off.swap(false, Ordering::SeqCst) {
            shared.set_phase(Phase::Terminating);
            return;
        }

        shared.emit(AlertEvent::Ready);
    }

    /// Best-effort power write to every tracked device, failures logged and
    /// ignored.
    async fn power_all(shared: &Arc<EngineShared>, cancel: &CancelFlag, on: bool) {
        let devices: Vec<Arc<Lighthouse>> = shared.devices.read().clone();

        for device in &devices {
            if cancel.is_cancelled() {
                return;
            }

            let ok = if on {
                device.power_on().await
            } else {
                device.power_off().await
            };

            if !ok {
                warn!(
                    "Failed to power {} {}",
                    if on { "on" } else { "off" },
                    device.identifier()
                );
            }
        }
    }
}

impl Drop for LighthouseManager {
    fn drop(&mut self) {
        if let Some(id) = self.worker.write().take() {
            self.registry.request_cancel(id, false);
        }
    }
}
