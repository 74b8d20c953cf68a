/// Proximity state machine.
///
/// A device becomes nearby on its first observation stronger than the RSSI
/// threshold and stays nearby while strong observations keep renewing its
/// deadline. Weak observations refresh what we know about it but do not
/// keep it nearby. `sweep()` reports departures once the deadline passes.
use heapless::Vec;

use crate::device::{Device, DeviceEvent};
use crate::mac::MacAddr;

/// Default capacity of the tracked-device set
pub const MAX_TRACKED: usize = 32;

/// Default proximity timeout
pub const DEFAULT_TIMEOUT_MS: u32 = 60_000;

#[derive(Debug, Clone)]
struct Tracked {
    device: Device,
    /// `None` is treated as already expired
    deadline_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ProximityTracker<const N: usize = MAX_TRACKED> {
    devices: Vec<Tracked, N>,
    rssi_threshold: i8,
    timeout_ms: u32,
}

impl<const N: usize> ProximityTracker<N> {
    pub const fn new(rssi_threshold: i8, timeout_ms: u32) -> Self {
        Self {
            devices: Vec::new(),
            rssi_threshold,
            timeout_ms,
        }
    }

    pub fn rssi_threshold(&self) -> i8 {
        self.rssi_threshold
    }

    pub fn set_rssi_threshold(&mut self, rssi: i8) {
        self.rssi_threshold = rssi;
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Applies to deadlines set from now on.
    pub fn set_timeout_ms(&mut self, timeout_ms: u32) {
        self.timeout_ms = timeout_ms;
    }

    /// Known signal stronger than the threshold.
    pub fn is_strong(&self, device: &Device) -> bool {
        matches!(device.rssi(), Some(rssi) if rssi > self.rssi_threshold)
    }

    /// Feed one observation. Events are reported through `emit` in order.
    pub fn observe(&mut self, observation: &Device, now_ms: u64, mut emit: impl FnMut(&Device, DeviceEvent)) {
        if observation.rssi().is_none() {
            return;
        }
        let strong = self.is_strong(observation);
        let deadline = now_ms.saturating_add(self.timeout_ms as u64);

        if let Some(entry) = self.entry_mut(&observation.mac()) {
            entry.device.update(observation);
            if strong {
                entry.deadline_ms = Some(deadline);
                emit(&entry.device, entry.device.traffic_event());
            }
            return;
        }

        if !strong {
            return;
        }

        let entry = Tracked {
            device: observation.clone(),
            deadline_ms: Some(deadline),
        };
        if self.devices.push(entry).is_err() {
            log::warn!("Proximity tracker full, dropping {}", observation.mac());
            return;
        }

        log::info!("{} arrived (rssi {})", observation.mac(), observation.rssi().unwrap_or_default());
        emit(observation, DeviceEvent::Arrive);
        emit(observation, observation.traffic_event());
    }

    /// Remove every device whose deadline has passed, reporting `Depart`.
    pub fn sweep(&mut self, now_ms: u64, mut emit: impl FnMut(&Device, DeviceEvent)) {
        let mut i = 0;
        while i < self.devices.len() {
            let expired = match self.devices[i].deadline_ms {
                Some(deadline) => now_ms > deadline,
                None => true,
            };
            if expired {
                let gone = self.devices.swap_remove(i);
                log::info!("{} departed", gone.device.mac());
                emit(&gone.device, DeviceEvent::Depart);
            } else {
                i += 1;
            }
        }
    }

    pub fn get(&self, mac: &MacAddr) -> Option<&Device> {
        self.devices.iter().find(|t| t.device.matches(mac)).map(|t| &t.device)
    }

    pub fn is_nearby(&self, mac: &MacAddr) -> bool {
        self.get(mac).is_some()
    }

    pub fn deadline_ms(&self, mac: &MacAddr) -> Option<u64> {
        self.devices
            .iter()
            .find(|t| t.device.matches(mac))
            .and_then(|t| t.deadline_ms)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().map(|t| &t.device)
    }

    /// Forget everything without reporting departures.
    pub fn clear(&mut self) {
        self.devices.clear();
    }

    fn entry_mut(&mut self, mac: &MacAddr) -> Option<&mut Tracked> {
        self.devices.iter_mut().find(|t| t.device.matches(mac))
    }
}

impl<const N: usize> Default for ProximityTracker<N> {
    fn default() -> Self {
        Self::new(crate::config::rssi::PERSONAL, DEFAULT_TIMEOUT_MS)
    }
}
