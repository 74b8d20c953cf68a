/// Runtime configuration. Compiled-in defaults, adjustable by host
/// commands without reflashing.
use crate::arp::ArpConfig;
use crate::filter::FilterSet;
use crate::mac::MacAddr;
use crate::tracker::DEFAULT_TIMEOUT_MS;

/// Proximity threshold presets (dBm).
pub mod rssi {
    /// Touching distance
    pub const INTIMATE: i8 = -20;
    /// Arm's length
    pub const PERSONAL: i8 = -40;
    /// Same room
    pub const SOCIAL: i8 = -60;
    /// Same building
    pub const PUBLIC: i8 = -80;
}

#[derive(Debug, Clone)]
pub struct Config {
    /// The network to watch. All-zero means not yet known.
    pub local_bssid: MacAddr,
    /// Observations must be stronger than this to count as nearby
    pub rssi_threshold: i8,
    pub last_seen_timeout_ms: u32,
    /// Resolve device IPs through the ARP table
    pub arp_resolution: bool,
    pub arp: ArpConfig,
    /// Ignore group and junk addresses in data frames
    pub individual_only: bool,
    /// Also apply `filters` to the proximity path
    pub filter_proximity: bool,
    pub filters: FilterSet,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            local_bssid: MacAddr::ANY,
            rssi_threshold: rssi::PERSONAL,
            last_seen_timeout_ms: DEFAULT_TIMEOUT_MS,
            arp_resolution: false,
            arp: ArpConfig::new(),
            individual_only: true,
            filter_proximity: false,
            filters: FilterSet::new(),
        }
    }

    pub fn with_local_bssid(mut self, bssid: MacAddr) -> Self {
        self.local_bssid = bssid;
        self
    }

    pub fn with_rssi_threshold(mut self, rssi: i8) -> Self {
        self.rssi_threshold = rssi;
        self
    }

    pub fn with_arp_resolution(mut self, enabled: bool) -> Self {
        self.arp_resolution = enabled;
        self
    }

    pub fn has_local_bssid(&self) -> bool {
        self.local_bssid != MacAddr::ANY
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
