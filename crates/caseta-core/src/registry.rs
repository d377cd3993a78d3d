// ── Device registry ──
//
// Snapshot of the bridge's device list. Readers load the current snapshot
// without locking; every mutation swaps in a whole new one.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::debug;

use crate::connection::BridgeConnection;
use crate::error::CoreError;
use crate::model::{Device, Domain};

/// Lock-free device snapshot keyed by device id.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: ArcSwap<Vec<Arc<Device>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-read the device list from the bridge and replace the snapshot.
    pub async fn refresh(
        &self,
        connection: &BridgeConnection,
    ) -> Result<Arc<Vec<Arc<Device>>>, CoreError> {
        let devices = connection.fetch_devices().await?;
        self.replace(devices);
        Ok(self.snapshot())
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.devices.load_full()
    }

    pub fn get(&self, device_id: &str) -> Result<Arc<Device>, CoreError> {
        self.devices
            .load()
            .iter()
            .find(|d| d.id == device_id)
            .cloned()
            .ok_or_else(|| CoreError::UnknownDevice {
                device_id: device_id.to_owned(),
            })
    }

    pub fn by_domain(&self, domain: Domain) -> Vec<Arc<Device>> {
        self.devices
            .load()
            .iter()
            .filter(|d| d.domain == domain)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.devices.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.load().is_empty()
    }

    /// Set `last_known_level` for one device. Returns `false` when the id is
    /// not in the snapshot.
    pub fn record_level(&self, device_id: &str, level: u8) -> bool {
        let mut found = false;
        self.devices.rcu(|current| {
            found = false;
            current
                .iter()
                .map(|d| {
                    if d.id == device_id {
                        found = true;
                        Arc::new(d.with_level(Some(level)))
                    } else {
                        Arc::clone(d)
                    }
                })
                .collect::<Vec<_>>()
        });
        if found {
            debug!(device_id, level, "cached level updated");
        }
        found
    }

    pub(crate) fn replace(&self, devices: Vec<Device>) {
        self.devices
            .store(Arc::new(devices.into_iter().map(Arc::new).collect()));
    }

    pub(crate) fn clear(&self) {
        self.devices.store(Arc::new(Vec::new()));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registry() -> DeviceRegistry {
        let registry = DeviceRegistry::new();
        registry.replace(vec![
            Device::new("3", "Den Lamp", Domain::Light, "PlugInDimmer", Some("1".into())),
            Device::new("5", "Porch", Domain::Switch, "WallSwitch", Some("2".into())),
        ]);
        registry
    }

    #[test]
    fn get_and_filter() {
        let registry = registry();
        assert_eq!(registry.get("5").unwrap().name, "Porch");
        assert!(matches!(
            registry.get("42"),
            Err(CoreError::UnknownDevice { ref device_id }) if device_id == "42"
        ));
        assert_eq!(registry.by_domain(Domain::Light).len(), 1);
        assert!(registry.by_domain(Domain::Fan).is_empty());
    }

    #[test]
    fn record_level_swaps_snapshot() {
        let registry = registry();
        let before = registry.snapshot();

        assert!(registry.record_level("3", 40));
        assert!(!registry.record_level("99", 40));

        // Old snapshot is untouched; the new one carries the level.
        assert_eq!(before[0].last_known_level, None);
        assert_eq!(registry.get("3").unwrap().last_known_level, Some(40));
    }

    #[test]
    fn clear_empties() {
        let registry = registry();
        registry.clear();
        assert!(registry.is_empty());
    }
}
