//! Live-reloadable routing configuration.
//!
//! Placement passes read [`RoutingConfig`] through a `tokio::sync::watch`
//! channel so an operator can flip GPU routing on or off, or change the
//! search-device pool, without restarting the scheduler. Updates only take
//! effect for tasks submitted after the change; a task already placed on a
//! resource keeps running there.

use tokio::sync::watch;

/// Tunables for placement passes, sourced from `GpuConfig` at the
/// composition root.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingConfig {
    /// Whether GPU placement is considered at all.
    pub gpu_enable: bool,
    /// Minimum query batch size (row count) before a search is eligible
    /// for GPU placement.
    pub gpu_search_threshold: u32,
    /// GPU device ids eligible for search and build placement, in the
    /// order they are round-robined.
    pub search_devices: Vec<u32>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            gpu_enable: false,
            gpu_search_threshold: 1_000,
            search_devices: Vec::new(),
        }
    }
}

/// Read-only handle to the current [`RoutingConfig`], cheap to clone and
/// share across placement passes.
#[derive(Clone)]
pub struct RoutingConfigHandle {
    rx: watch::Receiver<RoutingConfig>,
}

impl RoutingConfigHandle {
    /// Returns a snapshot of the configuration in effect right now.
    #[must_use]
    pub fn current(&self) -> RoutingConfig {
        self.rx.borrow().clone()
    }
}

/// Owning side of the configuration channel, held by the scheduler's
/// composition root.
pub struct RoutingConfigSender {
    tx: watch::Sender<RoutingConfig>,
}

impl RoutingConfigSender {
    /// Creates a new channel seeded with `initial`, returning the sender and
    /// a handle passes can subscribe through.
    #[must_use]
    pub fn new(initial: RoutingConfig) -> (Self, RoutingConfigHandle) {
        let (tx, rx) = watch::channel(initial);
        (Self { tx }, RoutingConfigHandle { rx })
    }

    /// Publishes a new configuration. Tasks already scheduled keep their
    /// original placement; only subsequently-submitted tasks observe this.
    pub fn update(&self, config: RoutingConfig) {
        // A closed receiver side just means every handle was dropped.
        let _ = self.tx.send(config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_observes_updates() {
        let (sender, handle) = RoutingConfigSender::new(RoutingConfig::default());
        assert!(!handle.current().gpu_enable);

        sender.update(RoutingConfig {
            gpu_enable: true,
            gpu_search_threshold: 500,
            search_devices: vec![0, 1],
        });

        let updated = handle.current();
        assert!(updated.gpu_enable);
        assert_eq!(updated.search_devices, vec![0, 1]);
    }

    #[test]
    fn default_disables_gpu_routing() {
        let config = RoutingConfig::default();
        assert!(!config.gpu_enable);
        assert!(config.search_devices.is_empty());
        assert_eq!(config.gpu_search_threshold, 1_000);
    }
}
