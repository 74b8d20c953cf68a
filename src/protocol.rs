/// JSON message protocol between the sniffer and its host.
///
/// All messages are newline-delimited JSON (NDJSON).
/// Uses `heapless` types for no_std/no-alloc operation.
use core::fmt::Write;

use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

use crate::csi::{ChannelSample, SUBCARRIER_COUNT};
use crate::device::{Device, DeviceEvent};
use crate::filter::Filter;
use crate::mac::MacAddr;
use crate::sniffer::Event;

/// Dotted IPv4 text ("255.255.255.255")
pub type IpString = String<15>;

/// Two-letter country code
pub type CountryString = String<2>;

/// Interleaved real/imaginary values, subcarriers -26..=26 without DC
pub type IqValues = Vec<i8, { 2 * SUBCARRIER_COUNT }>;

/// Which path produced a device message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPath {
    Proximity,
    Active,
}

impl EventPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventPath::Proximity => "proximity",
            EventPath::Active => "active",
        }
    }
}

/// Messages sent from the device to the host
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum DeviceMessage<'a> {
    /// Device event from the proximity or active path
    #[serde(rename = "device")]
    Device {
        mac: MacAddr,
        bssid: MacAddr,
        #[serde(skip_serializing_if = "Option::is_none")]
        ip: Option<IpString>,
        #[serde(skip_serializing_if = "Option::is_none")]
        ssid: Option<&'a str>,
        rssi: i8,
        ch: u8,
        /// "ARRIVE", "DEPART", "SEND", "RECEIVE"
        event: &'static str,
        /// Signed payload size: negative upload, positive download
        bytes: i32,
        /// "proximity" or "active"
        path: &'static str,
        /// Uptime in milliseconds when observed
        ts: u32,
    },
    /// Channel state sample
    #[serde(rename = "csi")]
    Csi {
        bssid: MacAddr,
        rssi: i8,
        ch: u8,
        iq: IqValues,
        ts: u32,
    },
    /// Status report
    #[serde(rename = "status")]
    Status {
        running: bool,
        nearby: u16,
        filters: u8,
        bssid: MacAddr,
        rssi_threshold: i8,
        timeout_ms: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        country: Option<CountryString>,
        frames: u32,
        accepted: u32,
        rejected: u32,
        resolved: u32,
        /// Uptime in seconds
        uptime: u32,
        version: &'static str,
    },
    /// A host command could not be applied
    #[serde(rename = "error")]
    Error { cmd: &'static str, reason: &'static str },
}

impl<'a> DeviceMessage<'a> {
    pub fn device(device: &'a Device, kind: DeviceEvent, path: EventPath, ts: u32) -> Self {
        DeviceMessage::Device {
            mac: device.mac(),
            bssid: device.bssid(),
            ip: device.ip().map(|ip| {
                let mut s = IpString::new();
                // 15 bytes always fit
                let _ = write!(s, "{}", ip);
                s
            }),
            ssid: device.ssid().map(|s| s.as_str()),
            rssi: device.rssi().unwrap_or_default(),
            ch: device.channel(),
            event: kind.as_str(),
            bytes: device.data_flow_bytes(),
            path: path.as_str(),
            ts,
        }
    }

    pub fn csi(sample: &ChannelSample, ts: u32) -> Self {
        let mut iq = IqValues::new();
        for (_, sc) in sample.subcarriers() {
            // 52 pairs always fit
            let _ = iq.push(sc.real);
            let _ = iq.push(sc.imaginary);
        }
        DeviceMessage::Csi {
            bssid: sample.bssid,
            rssi: sample.rssi,
            ch: sample.channel,
            iq,
            ts,
        }
    }

    pub fn from_event(event: Event<'a>, ts: u32) -> Self {
        match event {
            Event::Proximity { device, kind } => Self::device(device, kind, EventPath::Proximity, ts),
            Event::Active { device, kind } => Self::device(device, kind, EventPath::Active, ts),
            Event::Channel(sample) => Self::csi(sample, ts),
        }
    }
}

/// Commands sent from the host to the device.
///
/// Deserialized manually via [`RawCommand`] in `comm::parse_command()` because
/// `serde_json_core` does not support internally tagged enums (`deserialize_any`).
#[derive(Debug, PartialEq)]
pub enum HostCommand {
    /// Accept frames again
    Start,
    /// Stop and forget tracked devices
    Stop,
    /// Request current status
    GetStatus,
    /// Proximity threshold (negative dBm)
    SetRssi { rssi: i8 },
    /// Proximity timeout
    SetTimeout { timeout_ms: u32 },
    /// Network to watch
    SetBssid { bssid: MacAddr },
    AddFilter { filter: Filter },
    /// Remove filters by pattern (full address or OUI wildcard)
    RemoveFilter { pattern: MacAddr },
    ClearFilters,
}

impl HostCommand {
    pub fn name(&self) -> &'static str {
        match self {
            HostCommand::Start => "start",
            HostCommand::Stop => "stop",
            HostCommand::GetStatus => "status",
            HostCommand::SetRssi { .. } => "set_rssi",
            HostCommand::SetTimeout { .. } => "set_timeout",
            HostCommand::SetBssid { .. } => "set_bssid",
            HostCommand::AddFilter { .. } => "add_filter",
            HostCommand::RemoveFilter { .. } => "remove_filter",
            HostCommand::ClearFilters => "clear_filters",
        }
    }
}

/// Wire format for host commands: flat struct that `serde_json_core` can
/// deserialize without `deserialize_any`. Converted to [`HostCommand`] in
/// `comm::parse_command()`.
#[derive(Deserialize)]
pub(crate) struct RawCommand {
    pub cmd: String<16>,
    #[serde(default)]
    pub rssi: Option<i8>,
    #[serde(default)]
    pub timeout_ms: Option<u32>,
    /// Full address "AA:BB:CC:DD:EE:FF"
    #[serde(default)]
    pub mac: Option<String<17>>,
    /// Manufacturer prefix "AA:BB:CC"
    #[serde(default)]
    pub oui: Option<String<8>>,
    /// "sends", "receives", "either", "neither"
    #[serde(default)]
    pub dir: Option<String<8>>,
}

/// Firmware version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 768;

/// Buffer type for serialized JSON messages
pub type MsgBuffer = Vec<u8, MAX_MSG_LEN>;
