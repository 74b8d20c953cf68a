/// Observed device state and the events reported about it.
///
/// A `Device` is built for every accepted frame (an observation). The
/// proximity tracker keeps its own copy for devices that are nearby.
use core::net::Ipv4Addr;

use crate::frame::{Frame, Ssid};
use crate::mac::MacAddr;

/// RSSI value meaning "not measured". Real readings are always negative dBm.
pub const UNKNOWN_RSSI: i8 = 0;

/// What happened to a device, as reported to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// First strong observation of a device that was not nearby
    Arrive,
    /// Nearby device timed out
    Depart,
    /// Device transmitted data towards the network
    Send,
    /// Device received data from the network
    Receive,
}

impl DeviceEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceEvent::Arrive => "ARRIVE",
            DeviceEvent::Depart => "DEPART",
            DeviceEvent::Send => "SEND",
            DeviceEvent::Receive => "RECEIVE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    mac: MacAddr,
    bssid: MacAddr,
    channel: u8,
    rssi: i8,
    last_seen_ms: u64,
    /// Negative while uploading, positive while downloading
    data_flow_bytes: i32,
    ip: Option<Ipv4Addr>,
    ssid: Option<Ssid>,
}

impl Device {
    pub fn new(mac: MacAddr, bssid: MacAddr, channel: u8, rssi: i8, last_seen_ms: u64) -> Self {
        Self {
            mac,
            bssid,
            channel,
            rssi,
            last_seen_ms,
            data_flow_bytes: 0,
            ip: None,
            ssid: None,
        }
    }

    /// Observation of the device a parsed frame is attributed to.
    pub fn from_frame(frame: &Frame, now_ms: u64) -> Self {
        let mut device = Self::new(
            frame.client(),
            frame.bssid.unwrap_or(MacAddr::ANY),
            frame.channel,
            frame.rssi,
            now_ms,
        );
        device.data_flow_bytes = frame.data_flow_bytes();
        device.ssid = frame.ssid().cloned();
        device
    }

    pub fn with_data_flow(mut self, bytes: i32) -> Self {
        self.data_flow_bytes = bytes;
        self
    }

    pub fn with_ip(mut self, ip: Ipv4Addr) -> Self {
        self.ip = Some(ip);
        self
    }

    /// Refresh from a newer observation of the same device.
    ///
    /// Optional attributes the newer observation lacks (IP, SSID) keep their
    /// previous value.
    pub fn update(&mut self, newer: &Device) {
        self.bssid = newer.bssid;
        self.channel = newer.channel;
        self.rssi = newer.rssi;
        self.last_seen_ms = newer.last_seen_ms;
        self.data_flow_bytes = newer.data_flow_bytes;
        if newer.ip.is_some() {
            self.ip = newer.ip;
        }
        if newer.ssid.is_some() {
            self.ssid = newer.ssid.clone();
        }
    }

    pub fn mac(&self) -> MacAddr {
        self.mac
    }

    pub fn matches(&self, mac: &MacAddr) -> bool {
        self.mac == *mac
    }

    pub fn oui(&self) -> u32 {
        self.mac.oui()
    }

    pub fn bssid(&self) -> MacAddr {
        self.bssid
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Signal strength in dBm, `None` when the radio did not report one.
    pub fn rssi(&self) -> Option<i8> {
        (self.rssi < 0).then_some(self.rssi)
    }

    pub fn last_seen_ms(&self) -> u64 {
        self.last_seen_ms
    }

    pub fn ip(&self) -> Option<Ipv4Addr> {
        self.ip
    }

    pub fn has_ip(&self) -> bool {
        self.ip.is_some()
    }

    pub fn set_ip(&mut self, ip: Ipv4Addr) {
        self.ip = Some(ip);
    }

    pub fn ssid(&self) -> Option<&Ssid> {
        self.ssid.as_ref()
    }

    pub fn data_flow_bytes(&self) -> i32 {
        self.data_flow_bytes
    }

    pub fn is_uploading(&self) -> bool {
        self.data_flow_bytes < 0
    }

    pub fn is_downloading(&self) -> bool {
        self.data_flow_bytes > 0
    }

    pub fn payload_bytes(&self) -> u32 {
        self.data_flow_bytes.unsigned_abs()
    }

    pub fn upload_bytes(&self) -> u32 {
        if self.is_uploading() {
            self.payload_bytes()
        } else {
            0
        }
    }

    pub fn download_bytes(&self) -> u32 {
        if self.is_downloading() {
            self.payload_bytes()
        } else {
            0
        }
    }

    /// `Send` while uploading, `Receive` otherwise.
    pub fn traffic_event(&self) -> DeviceEvent {
        if self.is_uploading() {
            DeviceEvent::Send
        } else {
            DeviceEvent::Receive
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC: MacAddr = MacAddr([0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA]);
    const NET: MacAddr = MacAddr([0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);

    fn device(flow: i32) -> Device {
        Device::new(MAC, NET, 6, -50, 1000).with_data_flow(flow)
    }

    // ── Traffic direction ───────────────────────────────────────────

    #[test]
    fn negative_flow_is_uploading() {
        for flow in [-1, -100, i32::MIN] {
            let d = device(flow);
            assert!(d.is_uploading());
            assert!(!d.is_downloading());
            assert_eq!(d.traffic_event(), DeviceEvent::Send);
        }
    }

    #[test]
    fn positive_flow_is_downloading() {
        let d = device(100);
        assert!(d.is_downloading());
        assert!(!d.is_uploading());
        assert_eq!(d.download_bytes(), 100);
        assert_eq!(d.upload_bytes(), 0);
        assert_eq!(d.traffic_event(), DeviceEvent::Receive);
    }

    #[test]
    fn zero_flow_is_neither() {
        let d = device(0);
        assert!(!d.is_uploading());
        assert!(!d.is_downloading());
        assert_eq!(d.payload_bytes(), 0);
    }

    #[test]
    fn payload_is_absolute_flow() {
        assert_eq!(device(-1500).payload_bytes(), 1500);
        assert_eq!(device(-1500).upload_bytes(), 1500);
        assert_eq!(device(i32::MIN).payload_bytes(), 2_147_483_648);
    }

    // ── Attributes ──────────────────────────────────────────────────

    #[test]
    fn unknown_rssi_is_none() {
        let d = Device::new(MAC, NET, 1, UNKNOWN_RSSI, 0);
        assert_eq!(d.rssi(), None);
        assert_eq!(device(0).rssi(), Some(-50));
    }

    #[test]
    fn oui_from_address() {
        let d = Device::new(MacAddr([0xB4, 0x1E, 0x52, 1, 2, 3]), NET, 1, -40, 0);
        assert_eq!(d.oui(), 0xB41E52);
    }

    #[test]
    fn update_keeps_known_ip() {
        let mut tracked = device(-10).with_ip(Ipv4Addr::new(192, 168, 1, 7));
        let newer = Device::new(MAC, NET, 11, -30, 2000).with_data_flow(50);
        tracked.update(&newer);
        assert_eq!(tracked.ip(), Some(Ipv4Addr::new(192, 168, 1, 7)));
        assert_eq!(tracked.channel(), 11);
        assert_eq!(tracked.rssi(), Some(-30));
        assert_eq!(tracked.last_seen_ms(), 2000);
        assert!(tracked.is_downloading());
    }

    #[test]
    fn update_takes_newer_ip() {
        let mut tracked = device(0).with_ip(Ipv4Addr::new(192, 168, 1, 7));
        tracked.update(&device(0).with_ip(Ipv4Addr::new(192, 168, 1, 9)));
        assert_eq!(tracked.ip(), Some(Ipv4Addr::new(192, 168, 1, 9)));
    }

    #[test]
    fn event_names() {
        assert_eq!(DeviceEvent::Arrive.as_str(), "ARRIVE");
        assert_eq!(DeviceEvent::Depart.as_str(), "DEPART");
        assert_eq!(DeviceEvent::Send.as_str(), "SEND");
        assert_eq!(DeviceEvent::Receive.as_str(), "RECEIVE");
    }
}
