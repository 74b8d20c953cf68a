/// The sniffer: one context object owning all mutable state.
///
/// The platform forwards driver callbacks into `on_frame()` and
/// `on_channel_sample()`, and calls `poll()` from its main loop. Everything
/// the sniffer reports goes to a single [`EventSink`] as [`Event`] values.
///
/// ```text
/// capture ─► FrameParser ─► Device ─┬─► ArpCache (optional IP)
///                                   ├─► ProximityTracker ─► Event::Proximity
///                                   └─► FilterSet ────────► Event::Active
/// ```
use crate::arp::{ArpCache, ArpTable, Offline};
use crate::config::Config;
use crate::csi::{ChannelSample, ChannelSampleDecoder};
use crate::device::{Device, DeviceEvent};
use crate::filter::{Filter, FilterSet};
use crate::frame::{Capture, Country, FrameParser, Rejection};
use crate::mac::MacAddr;
use crate::tracker::{ProximityTracker, MAX_TRACKED};

/// Everything the sniffer reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event<'a> {
    /// Proximity state change or traffic from a nearby device
    Proximity {
        device: &'a Device,
        kind: DeviceEvent,
    },
    /// Any accepted observation passing the filter set
    Active {
        device: &'a Device,
        kind: DeviceEvent,
    },
    /// Decoded channel state from the local network
    Channel(&'a ChannelSample),
}

/// Receiver of sniffer events. Implemented for every `FnMut(Event<'_>)`.
pub trait EventSink {
    fn on_event(&mut self, event: Event<'_>);
}

impl<F: FnMut(Event<'_>)> EventSink for F {
    fn on_event(&mut self, event: Event<'_>) {
        self(event)
    }
}

/// Frame counters, for the status message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnifferStats {
    pub frames: u32,
    pub accepted: u32,
    pub malformed: u32,
    pub not_on_network: u32,
    pub unsupported: u32,
    pub ignored_address: u32,
    pub channel_samples: u32,
    pub resolved: u32,
}

impl SnifferStats {
    pub fn record(&mut self, rejection: Rejection) {
        let counter = match rejection {
            Rejection::Malformed => &mut self.malformed,
            Rejection::NotOnNetwork => &mut self.not_on_network,
            Rejection::Unsupported => &mut self.unsupported,
            Rejection::IgnoredAddress => &mut self.ignored_address,
        };
        *counter = counter.wrapping_add(1);
    }

    pub fn rejected(&self) -> u32 {
        self.malformed
            .wrapping_add(self.not_on_network)
            .wrapping_add(self.unsupported)
            .wrapping_add(self.ignored_address)
    }
}

pub struct Sniffer<A: ArpTable = Offline, const N: usize = MAX_TRACKED> {
    config: Config,
    parser: FrameParser,
    csi: ChannelSampleDecoder,
    arp: ArpCache,
    table: A,
    tracker: ProximityTracker<N>,
    running: bool,
    stats: SnifferStats,
}

impl<const N: usize> Sniffer<Offline, N> {
    /// A sniffer without IP resolution.
    pub fn offline(config: Config) -> Self {
        Self::new(config, Offline)
    }
}

impl<A: ArpTable, const N: usize> Sniffer<A, N> {
    pub fn new(config: Config, table: A) -> Self {
        Self {
            parser: FrameParser::new(config.local_bssid, config.individual_only),
            csi: ChannelSampleDecoder::new(config.local_bssid),
            arp: ArpCache::new(config.arp),
            tracker: ProximityTracker::new(config.rssi_threshold, config.last_seen_timeout_ms),
            table,
            config,
            running: false,
            stats: SnifferStats::default(),
        }
    }

    /// Start accepting frames. With ARP resolution enabled this first runs
    /// the blocking subnet scan, sleeping through `delay`.
    ///
    /// Returns `false` when resolution is enabled but the scan was skipped
    /// because the station is not attached. Frames are accepted either way;
    /// devices then carry no IP.
    pub fn begin(&mut self, delay: impl FnMut(u32)) -> bool {
        let scanned = !self.config.arp_resolution || self.arp.scan(&mut self.table, delay);
        if self.config.arp_resolution && scanned {
            self.arp.begin();
        }
        self.running = true;
        log::info!(
            "Sniffer started: bssid={} threshold={} dBm timeout={} ms",
            self.config.local_bssid,
            self.config.rssi_threshold,
            self.config.last_seen_timeout_ms
        );
        scanned
    }

    /// Accept frames again after `end()` without repeating the ARP scan.
    pub fn resume(&mut self) {
        if self.config.arp_resolution && self.arp.network().is_some() {
            self.arp.begin();
        }
        self.running = true;
        log::info!("Sniffer resumed");
    }

    /// Stop accepting frames and forget every tracked device.
    pub fn end(&mut self) {
        self.running = false;
        self.arp.end();
        self.tracker.clear();
        log::info!("Sniffer stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Handle one capture from the promiscuous callback.
    pub fn on_frame(&mut self, capture: &Capture<'_>, now_ms: u64, sink: &mut impl EventSink) {
        if !self.running {
            return;
        }
        self.stats.frames = self.stats.frames.wrapping_add(1);

        let frame = match self.parser.parse(capture) {
            Ok(frame) => frame,
            Err(rejection) => {
                log::trace!("frame dropped: {}", rejection);
                self.stats.record(rejection);
                return;
            }
        };
        self.stats.accepted = self.stats.accepted.wrapping_add(1);

        let mut device = Device::from_frame(&frame, now_ms);
        if self.config.arp_resolution && frame.wants_resolution() {
            if let Some(ip) = self.resolve(&device.mac()) {
                device.set_ip(ip);
            }
        }

        self.dispatch(&device, now_ms, sink);
    }

    /// Handle one CSI buffer from the driver.
    pub fn on_channel_sample(&mut self, bssid: MacAddr, rssi: i8, channel: u8, buf: &[i8], sink: &mut impl EventSink) {
        if !self.running {
            return;
        }
        match self.csi.decode(bssid, rssi, channel, buf) {
            Ok(sample) => {
                self.stats.channel_samples = self.stats.channel_samples.wrapping_add(1);
                sink.on_event(Event::Channel(&sample));
            }
            Err(rejection) => self.stats.record(rejection),
        }
    }

    /// Periodic tick: one ARP re-probe and the proximity timeout sweep.
    pub fn poll(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        if !self.running {
            return;
        }
        if self.config.arp_resolution {
            self.arp.poll(now_ms, &mut self.table);
        }
        self.tracker
            .sweep(now_ms, |device, kind| sink.on_event(Event::Proximity { device, kind }));
    }

    fn resolve(&mut self, mac: &MacAddr) -> Option<core::net::Ipv4Addr> {
        let ip = self.arp.lookup(mac, &mut self.table)?;
        self.stats.resolved = self.stats.resolved.wrapping_add(1);
        Some(ip)
    }

    fn dispatch(&mut self, device: &Device, now_ms: u64, sink: &mut impl EventSink) {
        let passes = self.config.filters.matches(device);

        if passes || !self.config.filter_proximity {
            self.tracker
                .observe(device, now_ms, |device, kind| sink.on_event(Event::Proximity { device, kind }));
        }

        if passes {
            sink.on_event(Event::Active {
                device,
                kind: device.traffic_event(),
            });
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn is_nearby(&self, mac: &MacAddr) -> bool {
        self.tracker.is_nearby(mac)
    }

    pub fn nearby(&self) -> impl Iterator<Item = &Device> {
        self.tracker.iter()
    }

    pub fn nearby_count(&self) -> usize {
        self.tracker.len()
    }

    /// Country element from the most recent local beacon.
    pub fn country(&self) -> Option<Country> {
        self.parser.country()
    }

    pub fn stats(&self) -> &SnifferStats {
        &self.stats
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn arp(&self) -> &ArpCache {
        &self.arp
    }

    pub fn table_mut(&mut self) -> &mut A {
        &mut self.table
    }

    // ── Settings ────────────────────────────────────────────────────

    pub fn set_local_bssid(&mut self, bssid: MacAddr) {
        self.config.local_bssid = bssid;
        self.parser.set_local_bssid(bssid);
        self.csi.set_local_bssid(bssid);
        log::info!("Local network set to {}", bssid);
    }

    pub fn set_rssi_threshold(&mut self, rssi: i8) {
        self.config.rssi_threshold = rssi;
        self.tracker.set_rssi_threshold(rssi);
        log::info!("Proximity threshold set to {} dBm", rssi);
    }

    pub fn set_last_seen_timeout_ms(&mut self, timeout_ms: u32) {
        self.config.last_seen_timeout_ms = timeout_ms;
        self.tracker.set_timeout_ms(timeout_ms);
        log::info!("Proximity timeout set to {} ms", timeout_ms);
    }

    pub fn set_individual_only(&mut self, individual_only: bool) {
        self.config.individual_only = individual_only;
        self.parser.set_individual_only(individual_only);
    }

    /// Takes effect at the next `begin()`.
    pub fn set_arp_resolution(&mut self, enabled: bool) {
        self.config.arp_resolution = enabled;
    }

    pub fn set_filter_proximity(&mut self, enabled: bool) {
        self.config.filter_proximity = enabled;
    }

    pub fn filters(&self) -> &FilterSet {
        &self.config.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterSet {
        &mut self.config.filters
    }

    pub fn add_filter(&mut self, filter: Filter) -> Result<(), Filter> {
        self.config.filters.add(filter).inspect_err(|f| {
            log::warn!("Filter set full, dropping {}", f.pattern());
        })
    }

    /// Replace every filter with `filter`.
    pub fn set_filter(&mut self, filter: Filter) {
        self.config.filters.set(filter);
    }

    pub fn remove_filter(&mut self, pattern: &MacAddr) -> usize {
        self.config.filters.remove(pattern)
    }

    pub fn clear_filters(&mut self) {
        self.config.filters.clear();
    }

    /// Stop accepting devices that no other filter names.
    pub fn exclusive(&mut self) -> Result<(), Filter> {
        self.add_filter(Filter::none())
    }
}
