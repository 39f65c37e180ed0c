use ahash::AHashMap;

use crate::soc::device::{Device, DeviceError, DeviceResult};

pub type DeviceRef = Box<dyn Device>;

/// Registration table mapping 16-bit ids to device handles. Populated before
/// execution begins and then touched only by the executing thread.
#[derive(Default)]
pub struct DeviceTable {
    devices: AHashMap<u16, DeviceRef>,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: u16, device: impl Device + 'static) -> DeviceResult<()> {
        if let Some(existing) = self.devices.get(&id) {
            return Err(DeviceError::DuplicateId {
                id,
                existing: existing.name().to_string(),
            });
        }
        tracing::debug!(id, name = device.name(), "registered device");
        self.devices.insert(id, Box::new(device));
        Ok(())
    }

    pub fn unregister(&mut self, id: u16) -> DeviceResult<DeviceRef> {
        self.devices
            .remove(&id)
            .ok_or(DeviceError::NotRegistered { id })
    }

    pub fn get_mut(&mut self, id: u16) -> Option<&mut (dyn Device + 'static)> {
        self.devices.get_mut(&id).map(|device| device.as_mut())
    }

    pub fn contains(&self, id: u16) -> bool {
        self.devices.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl std::fmt::Debug for DeviceTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.devices.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("DeviceTable").field("ids", &ids).finish()
    }
}
