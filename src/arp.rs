/// Hardware address to IPv4 resolution over the local /24.
///
/// The platform's ARP table is reached through the [`ArpTable`] trait. The
/// cache keeps one slot per host octet holding the [`MacAddr::suffix_hash`]
/// of the address last seen there. Two devices whose last four bytes agree
/// collide; the lower host octet wins. That is accepted: the lookup is a
/// best-effort enrichment.
///
/// `scan()` blocks for roughly `256 * MIN_UPDATE_INTERVAL_MS` and must only
/// run at startup. `poll()` re-probes one host per tick afterwards.
use core::net::Ipv4Addr;

use crate::mac::MacAddr;

/// Probing the platform ARP table faster than this is unsafe on ESP32
pub const MIN_UPDATE_INTERVAL_MS: u32 = 50;

/// Hosts in the local /24
pub const SUBNET_HOSTS: usize = 256;

/// The platform's ARP table and station state.
pub trait ArpTable {
    /// Station is associated and has an address
    fn is_connected(&self) -> bool;

    fn local_ip(&self) -> Option<Ipv4Addr>;

    /// Address currently held for `ip`, without generating traffic.
    fn find(&mut self, ip: Ipv4Addr) -> Option<MacAddr>;

    /// Send an ARP request; any answer lands in the table later.
    fn request(&mut self, ip: Ipv4Addr);
}

/// Table for builds without a network stack. Never connected.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

impl ArpTable for Offline {
    fn is_connected(&self) -> bool {
        false
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        None
    }

    fn find(&mut self, _ip: Ipv4Addr) -> Option<MacAddr> {
        None
    }

    fn request(&mut self, _ip: Ipv4Addr) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpConfig {
    /// Interval between incremental re-probes (clamped to the minimum)
    pub update_interval_ms: u32,
    /// Keep cycling through the subnet instead of stopping after one pass
    pub repeated_scans: bool,
}

impl ArpConfig {
    pub const fn new() -> Self {
        Self {
            update_interval_ms: 500,
            repeated_scans: true,
        }
    }

    pub fn effective_interval_ms(&self) -> u32 {
        self.update_interval_ms.max(MIN_UPDATE_INTERVAL_MS)
    }
}

impl Default for ArpConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ArpCache {
    slots: [Option<u32>; SUBNET_HOSTS],
    /// First three octets of the local network
    network: Option<[u8; 3]>,
    config: ArpConfig,
    running: bool,
    next_host: u8,
    last_update_ms: Option<u64>,
}

impl ArpCache {
    pub const fn new(config: ArpConfig) -> Self {
        Self {
            slots: [None; SUBNET_HOSTS],
            network: None,
            config,
            running: false,
            next_host: 0,
            last_update_ms: None,
        }
    }

    pub fn config(&self) -> &ArpConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ArpConfig) {
        self.config = config;
    }

    /// Network address (`a.b.c.0`) once known.
    pub fn network(&self) -> Option<Ipv4Addr> {
        self.network.map(|[a, b, c]| Ipv4Addr::new(a, b, c, 0))
    }

    /// Start incremental re-probing from `poll()`.
    pub fn begin(&mut self) {
        self.running = true;
    }

    pub fn end(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of host slots holding an address.
    pub fn cached_hosts(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn clear(&mut self) {
        self.slots = [None; SUBNET_HOSTS];
        self.next_host = 0;
        self.last_update_ms = None;
    }

    /// Blocking full sweep of the /24: request every host, pausing
    /// `MIN_UPDATE_INTERVAL_MS` between requests via `delay`, then copy the
    /// answers into the cache.
    ///
    /// Returns `false` without probing when the station is not attached.
    pub fn scan<T: ArpTable>(&mut self, table: &mut T, mut delay: impl FnMut(u32)) -> bool {
        if !table.is_connected() {
            log::warn!("ARP scan skipped: not connected");
            return false;
        }
        if !self.learn_network(table) {
            log::warn!("ARP scan skipped: no local address");
            return false;
        }

        log::info!(
            "Building ARP table, takes {} s",
            (MIN_UPDATE_INTERVAL_MS as usize * SUBNET_HOSTS) / 1000
        );

        for host in 0..=u8::MAX {
            self.probe(table, host, true);
            delay(MIN_UPDATE_INTERVAL_MS);
        }
        for host in 0..=u8::MAX {
            self.probe(table, host, false);
        }

        log::info!("ARP table built: {} hosts", self.cached_hosts());
        true
    }

    /// Resolve an address to an IPv4 address on the local network.
    ///
    /// Checks the cache first, then falls back to walking the platform table.
    /// A fallback hit is written back to the cache.
    pub fn lookup<T: ArpTable>(&mut self, mac: &MacAddr, table: &mut T) -> Option<Ipv4Addr> {
        let [a, b, c] = self.network?;
        let hash = mac.suffix_hash();

        if let Some(host) = self.slots.iter().position(|s| *s == Some(hash)) {
            return Some(Ipv4Addr::new(a, b, c, host as u8));
        }

        for host in 0..=u8::MAX {
            let ip = Ipv4Addr::new(a, b, c, host);
            if table.find(ip) == Some(*mac) {
                self.slots[host as usize] = Some(hash);
                return Some(ip);
            }
        }

        None
    }

    /// One incremental re-probe, throttled to the configured interval.
    /// Stops after host 255 unless `repeated_scans` is set.
    pub fn poll<T: ArpTable>(&mut self, now_ms: u64, table: &mut T) {
        if !self.running || !table.is_connected() {
            return;
        }
        if self.network.is_none() && !self.learn_network(table) {
            return;
        }

        let interval = self.config.effective_interval_ms() as u64;
        if let Some(last) = self.last_update_ms {
            if now_ms.saturating_sub(last) < interval {
                return;
            }
        }
        self.last_update_ms = Some(now_ms);

        let host = self.next_host;
        if !self.probe(table, host, true) {
            // Host went quiet; drop its stale hash
            self.slots[host as usize] = None;
        }

        if host == u8::MAX && !self.config.repeated_scans {
            log::debug!("ARP re-probe pass complete");
            self.next_host = 0;
            self.end();
        } else {
            self.next_host = host.wrapping_add(1);
        }
    }

    fn learn_network<T: ArpTable>(&mut self, table: &T) -> bool {
        match table.local_ip() {
            Some(ip) => {
                let [a, b, c, _] = ip.octets();
                self.network = Some([a, b, c]);
                true
            }
            None => false,
        }
    }

    /// Look one host up in the platform table; cache a hit, optionally
    /// request a miss.
    fn probe<T: ArpTable>(&mut self, table: &mut T, host: u8, request: bool) -> bool {
        let Some([a, b, c]) = self.network else {
            return false;
        };
        let ip = Ipv4Addr::new(a, b, c, host);

        match table.find(ip) {
            Some(mac) => {
                self.slots[host as usize] = Some(mac.suffix_hash());
                true
            }
            None => {
                if request && table.is_connected() {
                    table.request(ip);
                }
                false
            }
        }
    }
}

impl Default for ArpCache {
    fn default() -> Self {
        Self::new(ArpConfig::new())
    }
}
