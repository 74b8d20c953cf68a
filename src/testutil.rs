//! Frame builders shared by the unit tests.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::arp::ArpTable;
use crate::mac::MacAddr;

/// The network under observation
pub const LOCAL: MacAddr = MacAddr([0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);
/// Some neighbour's network
pub const OTHER_NET: MacAddr = MacAddr([0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);
pub const CLIENT: MacAddr = MacAddr([0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA]);
pub const AP: MacAddr = MacAddr([0x10, 0x20, 0x30, 0x40, 0x50, 0x61]);

pub const SUBTYPE_PROBE_REQ: u8 = 4;
pub const SUBTYPE_BEACON: u8 = 8;
pub const SUBTYPE_RTS: u8 = 11;

pub const DS_TO_AP: u8 = 0b01;
pub const DS_FROM_AP: u8 = 0b10;

/// 24-byte management header: FC, duration, three addresses, sequence.
pub fn mgmt_header(subtype: u8, addr1: MacAddr, addr2: MacAddr, addr3: MacAddr) -> Vec<u8> {
    let mut buf = vec![subtype << 4, 0x00, 0x00, 0x00];
    buf.extend_from_slice(&addr1.0);
    buf.extend_from_slice(&addr2.0);
    buf.extend_from_slice(&addr3.0);
    buf.extend_from_slice(&[0x10, 0x00]);
    buf
}

/// Probe request with an SSID element and a supported-rates element.
pub fn probe_request(source: MacAddr, ssid: &[u8]) -> Vec<u8> {
    let mut buf = mgmt_header(SUBTYPE_PROBE_REQ, MacAddr::BROADCAST, source, MacAddr::BROADCAST);
    buf.push(0);
    buf.push(ssid.len() as u8);
    buf.extend_from_slice(ssid);
    buf.extend_from_slice(&[1, 4, 0x82, 0x84, 0x8B, 0x96]);
    buf
}

/// Beacon from `AP` for network `bssid`, optionally carrying a Country
/// element with the given payload.
pub fn beacon(bssid: MacAddr, country: Option<&[u8]>) -> Vec<u8> {
    let mut buf = mgmt_header(SUBTYPE_BEACON, MacAddr::BROADCAST, AP, bssid);
    // timestamp, beacon interval (100 TU), capability
    buf.extend_from_slice(&[0u8; 8]);
    buf.extend_from_slice(&[0x64, 0x00, 0x11, 0x04]);
    buf.extend_from_slice(&[0, 4, b'h', b'o', b'm', b'e']);
    if let Some(payload) = country {
        buf.push(7);
        buf.push(payload.len() as u8);
        buf.extend_from_slice(payload);
    }
    buf
}

/// Control frame with receiver and transmitter addresses (16 bytes).
pub fn control(subtype: u8, receiver: MacAddr, transmitter: MacAddr) -> Vec<u8> {
    let mut buf = vec![(subtype << 4) | 0x04, 0x00, 0x00, 0x00];
    buf.extend_from_slice(&receiver.0);
    buf.extend_from_slice(&transmitter.0);
    buf
}

/// Data frame padded with zero payload to `total_len` bytes.
pub fn data_frame(ds: u8, addr1: MacAddr, addr2: MacAddr, addr3: MacAddr, total_len: usize) -> Vec<u8> {
    let mut buf = vec![0x08, ds & 0x03, 0x00, 0x00];
    buf.extend_from_slice(&addr1.0);
    buf.extend_from_slice(&addr2.0);
    buf.extend_from_slice(&addr3.0);
    buf.extend_from_slice(&[0x20, 0x00]);
    buf.resize(total_len.max(buf.len()), 0);
    buf
}

/// Channel-state buffer whose subcarrier `n` holds `(imag, real)`.
pub fn csi_buffer(pairs: &[(i32, i8, i8)]) -> [i8; 128] {
    let mut buf = [0i8; 128];
    for &(n, imag, real) in pairs {
        let offset = (if n > 0 { 2 * n + 2 } else { 126 + 2 * n }) as usize;
        buf[offset] = imag;
        buf[offset + 1] = real;
    }
    buf
}

/// ARP table whose hosts answer only after being asked, like a real network.
pub struct FakeArp {
    pub connected: bool,
    pub local_ip: Option<Ipv4Addr>,
    pub hosts: HashMap<Ipv4Addr, MacAddr>,
    pub table: HashMap<Ipv4Addr, MacAddr>,
    pub requests: Vec<Ipv4Addr>,
}

impl FakeArp {
    /// Station at 192.168.1.42 with the given `(host, mac)` neighbours.
    pub fn new(hosts: &[(u8, MacAddr)]) -> Self {
        Self {
            connected: true,
            local_ip: Some(Ipv4Addr::new(192, 168, 1, 42)),
            hosts: hosts
                .iter()
                .map(|&(h, mac)| (Ipv4Addr::new(192, 168, 1, h), mac))
                .collect(),
            table: HashMap::new(),
            requests: Vec::new(),
        }
    }
}

impl ArpTable for FakeArp {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        self.local_ip
    }

    fn find(&mut self, ip: Ipv4Addr) -> Option<MacAddr> {
        self.table.get(&ip).copied()
    }

    fn request(&mut self, ip: Ipv4Addr) {
        self.requests.push(ip);
        if let Some(mac) = self.hosts.get(&ip) {
            self.table.insert(ip, *mac);
        }
    }
}
