//! Foreground activity detection.
//!
//! While a foreground consumer of the base stations (e.g. a running VR
//! compositor) is active, the engine suspends its auto-shutoff countdown.
//! How that consumer is detected is up to the embedder; the engine only
//! needs a yes/no answer per tick.

/// Capability answering whether a competing foreground consumer of the
/// base stations is currently active.
pub trait ActivityProbe: Send + Sync + 'static {
    /// Returns true while the foreground consumer is running.
    fn foreground_active(&self) -> bool;
}

impl<F> ActivityProbe for F
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    fn foreground_active(&self) -> bool {
        self()
    }
}

/// Probe that never reports activity. Auto-shutoff runs unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoActivity;

impl ActivityProbe for NoActivity {
    fn foreground_active(&self) -> bool {
        false
    }
}
