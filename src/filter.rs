/// Address and traffic-direction filters for the active-device path.
///
/// A filter pattern is either a full address or an OUI wildcard
/// (`AA:BB:CC:FF:FF:FF`). Two patterns are reserved: all-zero matches every
/// address, all-ones matches none. A `FilterSet` accepts a device when any
/// member accepts it; an empty set accepts everything.
use heapless::Vec;

use crate::device::Device;
use crate::mac::MacAddr;

/// Default number of filters a `FilterSet` can hold
pub const MAX_FILTERS: usize = 8;

/// Which traffic direction a filter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrafficDirection {
    /// Device is uploading
    Sends,
    /// Device is downloading
    Receives,
    #[default]
    Either,
    Neither,
}

impl TrafficDirection {
    pub fn accepts(&self, device: &Device) -> bool {
        match self {
            TrafficDirection::Sends => device.is_uploading(),
            TrafficDirection::Receives => device.is_downloading(),
            TrafficDirection::Either => true,
            TrafficDirection::Neither => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficDirection::Sends => "sends",
            TrafficDirection::Receives => "receives",
            TrafficDirection::Either => "either",
            TrafficDirection::Neither => "neither",
        }
    }

    /// Parse the lowercase names used by host commands.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sends" | "send" => Some(TrafficDirection::Sends),
            "receives" | "receive" => Some(TrafficDirection::Receives),
            "either" => Some(TrafficDirection::Either),
            "neither" => Some(TrafficDirection::Neither),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    pattern: MacAddr,
    direction: TrafficDirection,
}

impl Filter {
    pub const fn new(pattern: MacAddr, direction: TrafficDirection) -> Self {
        Self { pattern, direction }
    }

    /// Match every address in either direction.
    pub const fn any() -> Self {
        Self::new(MacAddr::ANY, TrafficDirection::Either)
    }

    /// Match nothing. Added to an otherwise empty set it turns the open
    /// default into "reject all".
    pub const fn none() -> Self {
        Self::new(MacAddr::NONE, TrafficDirection::Neither)
    }

    /// Match one manufacturer (24-bit OUI).
    pub const fn oui(oui: u32, direction: TrafficDirection) -> Self {
        Self::new(MacAddr::from_oui(oui), direction)
    }

    pub fn pattern(&self) -> MacAddr {
        self.pattern
    }

    pub fn direction(&self) -> TrafficDirection {
        self.direction
    }

    pub fn matches_address(&self, mac: &MacAddr) -> bool {
        if self.pattern == MacAddr::ANY {
            return true;
        }
        if self.pattern == MacAddr::NONE {
            return false;
        }
        if self.pattern.is_oui_wildcard() {
            self.pattern.0[..3] == mac.0[..3]
        } else {
            self.pattern == *mac
        }
    }

    pub fn matches(&self, device: &Device) -> bool {
        self.matches_address(&device.mac()) && self.direction.accepts(device)
    }
}

/// Bounded set of filters, matched as a logical OR.
#[derive(Debug, Clone, Default)]
pub struct FilterSet<const N: usize = MAX_FILTERS> {
    filters: Vec<Filter, N>,
}

impl<const N: usize> FilterSet<N> {
    pub const fn new() -> Self {
        Self { filters: Vec::new() }
    }

    /// Add a filter. Hands the filter back when the set is full.
    pub fn add(&mut self, filter: Filter) -> Result<(), Filter> {
        self.filters.push(filter)
    }

    /// Replace all filters with one.
    pub fn set(&mut self, filter: Filter) {
        self.filters.clear();
        // Empty set always has room unless N == 0
        let _ = self.filters.push(filter);
    }

    /// Remove every filter with this pattern. Returns how many were removed.
    pub fn remove(&mut self, pattern: &MacAddr) -> usize {
        let before = self.filters.len();
        self.filters.retain(|f| f.pattern != *pattern);
        before - self.filters.len()
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    pub fn matches(&self, device: &Device) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.matches(device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NET: MacAddr = MacAddr([0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);

    fn device(mac: [u8; 6], flow: i32) -> Device {
        Device::new(MacAddr(mac), NET, 6, -50, 0).with_data_flow(flow)
    }

    // ── Address matching ────────────────────────────────────────────

    #[test]
    fn full_address_exact() {
        let f = Filter::new(MacAddr([1, 2, 3, 4, 5, 6]), TrafficDirection::Either);
        assert!(f.matches_address(&MacAddr([1, 2, 3, 4, 5, 6])));
        assert!(!f.matches_address(&MacAddr([1, 2, 3, 4, 5, 7])));
        assert!(!f.matches_address(&MacAddr([9, 2, 3, 4, 5, 6])));
    }

    #[test]
    fn oui_wildcard_ignores_suffix() {
        let f = Filter::oui(0xAABBCC, TrafficDirection::Either);
        assert!(f.matches_address(&MacAddr([0xAA, 0xBB, 0xCC, 0, 0, 1])));
        assert!(f.matches_address(&MacAddr([0xAA, 0xBB, 0xCC, 0x12, 0x34, 0x56])));
        assert!(!f.matches_address(&MacAddr([0xAA, 0xBB, 0xCD, 0x12, 0x34, 0x56])));
    }

    #[test]
    fn reserved_patterns() {
        let addrs = [MacAddr::ANY, MacAddr::NONE, MacAddr([0xAA; 6])];
        for mac in &addrs {
            assert!(Filter::any().matches_address(mac));
            assert!(!Filter::new(MacAddr::NONE, TrafficDirection::Either).matches_address(mac));
        }
    }

    // ── Direction ───────────────────────────────────────────────────

    #[test]
    fn direction_predicates() {
        let mac = [0xAA, 0xBB, 0xCC, 1, 2, 3];
        let up = device(mac, -10);
        let down = device(mac, 10);
        let idle = device(mac, 0);
        let pattern = MacAddr(mac);

        let sends = Filter::new(pattern, TrafficDirection::Sends);
        assert!(sends.matches(&up));
        assert!(!sends.matches(&down));
        assert!(!sends.matches(&idle));

        let receives = Filter::new(pattern, TrafficDirection::Receives);
        assert!(!receives.matches(&up));
        assert!(receives.matches(&down));

        let either = Filter::new(pattern, TrafficDirection::Either);
        assert!(either.matches(&up) && either.matches(&down) && either.matches(&idle));

        let neither = Filter::new(pattern, TrafficDirection::Neither);
        assert!(!neither.matches(&up) && !neither.matches(&down) && !neither.matches(&idle));
    }

    #[test]
    fn direction_names() {
        for dir in [
            TrafficDirection::Sends,
            TrafficDirection::Receives,
            TrafficDirection::Either,
            TrafficDirection::Neither,
        ] {
            assert_eq!(TrafficDirection::from_name(dir.as_str()), Some(dir));
        }
        assert_eq!(TrafficDirection::from_name("both"), None);
    }

    // ── FilterSet ───────────────────────────────────────────────────

    #[test]
    fn empty_set_matches_everything() {
        let set: FilterSet = FilterSet::new();
        assert!(set.is_empty());
        assert!(set.matches(&device([1, 2, 3, 4, 5, 6], 0)));
    }

    #[test]
    fn oui_filter_matches_any_suffix_and_direction() {
        let mut set: FilterSet = FilterSet::new();
        set.add(Filter::new(MacAddr([0xAA, 0xBB, 0xCC, 0xFF, 0xFF, 0xFF]), TrafficDirection::Either))
            .unwrap();
        for (suffix, flow) in [([0, 0, 1], -5), ([0x12, 0x34, 0x56], 0), ([0xFE, 0xFE, 0xFE], 99)] {
            let mac = [0xAA, 0xBB, 0xCC, suffix[0], suffix[1], suffix[2]];
            assert!(set.matches(&device(mac, flow)));
        }
        assert!(!set.matches(&device([0xAA, 0xBB, 0xCD, 0, 0, 1], 0)));
    }

    #[test]
    fn set_is_logical_or() {
        let mut set: FilterSet = FilterSet::new();
        set.add(Filter::new(MacAddr([1, 1, 1, 1, 1, 1]), TrafficDirection::Sends)).unwrap();
        set.add(Filter::oui(0x020202, TrafficDirection::Receives)).unwrap();
        assert!(set.matches(&device([1, 1, 1, 1, 1, 1], -1)));
        assert!(!set.matches(&device([1, 1, 1, 1, 1, 1], 1)));
        assert!(set.matches(&device([2, 2, 2, 9, 9, 9], 1)));
        assert!(!set.matches(&device([3, 3, 3, 3, 3, 3], 1)));
    }

    #[test]
    fn none_filter_makes_set_exclusive() {
        let mut set: FilterSet = FilterSet::new();
        set.add(Filter::none()).unwrap();
        assert!(!set.matches(&device([1, 2, 3, 4, 5, 6], 10)));
        set.add(Filter::oui(0x010203, TrafficDirection::Either)).unwrap();
        assert!(set.matches(&device([1, 2, 3, 4, 5, 6], 10)));
    }

    #[test]
    fn full_set_hands_filter_back() {
        let mut set: FilterSet<2> = FilterSet::new();
        set.add(Filter::any()).unwrap();
        set.add(Filter::none()).unwrap();
        let extra = Filter::oui(0x112233, TrafficDirection::Sends);
        assert_eq!(set.add(extra), Err(extra));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn set_replaces_and_remove_by_pattern() {
        let mut set: FilterSet = FilterSet::new();
        set.add(Filter::oui(0x112233, TrafficDirection::Sends)).unwrap();
        set.add(Filter::oui(0x112233, TrafficDirection::Receives)).unwrap();
        set.add(Filter::any()).unwrap();
        assert_eq!(set.remove(&MacAddr::from_oui(0x112233)), 2);
        assert_eq!(set.len(), 1);
        assert_eq!(set.remove(&MacAddr::from_oui(0x112233)), 0);

        set.set(Filter::none());
        assert_eq!(set.iter().copied().collect::<std::vec::Vec<_>>(), vec![Filter::none()]);
        set.clear();
        assert!(set.is_empty());
    }
}
