/// Communication layer: serial NDJSON transport.
///
/// The device streams events as newline-delimited JSON. Commands arrive as
/// JSON lines from the same link and are applied to the sniffer.
use crate::arp::ArpTable;
use crate::filter::{Filter, TrafficDirection};
use crate::mac::MacAddr;
use crate::protocol::{CountryString, DeviceMessage, HostCommand, RawCommand, MAX_MSG_LEN, VERSION};
use crate::sniffer::Sniffer;

// ── Serialization helpers ──────────────────────────────────────────────

/// Serialize a DeviceMessage to JSON bytes and write to the output buffer.
/// Returns the number of bytes written, or None if serialization failed.
pub fn serialize_message(msg: &DeviceMessage, buf: &mut [u8]) -> Option<usize> {
    match serde_json_core::to_slice(msg, buf) {
        Ok(len) => {
            // Append newline for NDJSON
            if len < buf.len() {
                buf[len] = b'\n';
                Some(len + 1)
            } else {
                Some(len)
            }
        }
        Err(_) => None,
    }
}

/// Status snapshot of a sniffer.
pub fn status_message<A: ArpTable, const N: usize>(sniffer: &Sniffer<A, N>, uptime_s: u32) -> DeviceMessage<'static> {
    let config = sniffer.config();
    let stats = sniffer.stats();
    DeviceMessage::Status {
        running: sniffer.is_running(),
        nearby: sniffer.nearby_count().min(u16::MAX as usize) as u16,
        filters: config.filters.len().min(u8::MAX as usize) as u8,
        bssid: config.local_bssid,
        rssi_threshold: config.rssi_threshold,
        timeout_ms: config.last_seen_timeout_ms,
        country: sniffer
            .country()
            .and_then(|c| c.code_str().and_then(|s| CountryString::try_from(s).ok())),
        frames: stats.frames,
        accepted: stats.accepted,
        rejected: stats.rejected(),
        resolved: stats.resolved,
        uptime: uptime_s,
        version: VERSION,
    }
}

// ── Command parsing ────────────────────────────────────────────────────

/// Deserialize a HostCommand from a JSON byte slice.
///
/// Uses [`RawCommand`] as an intermediate because `serde_json_core` does not
/// support internally tagged enums.
pub fn parse_command(data: &[u8]) -> Option<HostCommand> {
    // Strip trailing newline/whitespace
    let trimmed = data.trim_ascii();
    if trimmed.is_empty() {
        return None;
    }
    let (raw, _) = serde_json_core::from_slice::<RawCommand>(trimmed).ok()?;

    match raw.cmd.as_str() {
        "start" => Some(HostCommand::Start),
        "stop" => Some(HostCommand::Stop),
        "status" => Some(HostCommand::GetStatus),
        "set_rssi" => raw.rssi.map(|rssi| HostCommand::SetRssi { rssi }),
        "set_timeout" => raw
            .timeout_ms
            .map(|timeout_ms| HostCommand::SetTimeout { timeout_ms }),
        "set_bssid" => {
            let bssid = MacAddr::parse(raw.mac.as_deref()?).ok()?;
            Some(HostCommand::SetBssid { bssid })
        }
        "add_filter" => {
            let pattern = pattern(&raw)?;
            let direction = match raw.dir.as_deref() {
                Some(name) => TrafficDirection::from_name(name)?,
                None => TrafficDirection::Either,
            };
            Some(HostCommand::AddFilter {
                filter: Filter::new(pattern, direction),
            })
        }
        "remove_filter" => pattern(&raw).map(|pattern| HostCommand::RemoveFilter { pattern }),
        "clear_filters" => Some(HostCommand::ClearFilters),
        _ => None,
    }
}

/// Filter pattern from either a full `mac` or an `oui` prefix.
fn pattern(raw: &RawCommand) -> Option<MacAddr> {
    if let Some(mac) = raw.mac.as_deref() {
        return MacAddr::parse(mac).ok();
    }
    let oui = raw.oui.as_deref()?;
    let mut full: heapless::String<17> = heapless::String::new();
    full.push_str(oui).ok()?;
    full.push_str(":FF:FF:FF").ok()?;
    MacAddr::parse(&full).ok()
}

/// Process a received host command and update state accordingly.
///
/// Returns a message to send back when the command could not be applied.
/// `GetStatus` returns `None`: the caller builds the status with
/// [`status_message`] using its own uptime.
pub fn handle_command<A: ArpTable, const N: usize>(
    cmd: HostCommand,
    sniffer: &mut Sniffer<A, N>,
) -> Option<DeviceMessage<'static>> {
    let name = cmd.name();
    match cmd {
        HostCommand::Start => {
            if !sniffer.is_running() {
                sniffer.resume();
            }
            log::info!("Sniffing started by host command");
            None
        }
        HostCommand::Stop => {
            sniffer.end();
            log::info!("Sniffing stopped by host command");
            None
        }
        HostCommand::GetStatus => None,
        HostCommand::SetRssi { rssi } => {
            if rssi >= 0 {
                return Some(DeviceMessage::Error {
                    cmd: name,
                    reason: "rssi must be negative",
                });
            }
            sniffer.set_rssi_threshold(rssi);
            None
        }
        HostCommand::SetTimeout { timeout_ms } => {
            sniffer.set_last_seen_timeout_ms(timeout_ms);
            None
        }
        HostCommand::SetBssid { bssid } => {
            sniffer.set_local_bssid(bssid);
            None
        }
        HostCommand::AddFilter { filter } => match sniffer.add_filter(filter) {
            Ok(()) => {
                log::info!("Filter added: {} {}", filter.pattern(), filter.direction().as_str());
                None
            }
            Err(_) => Some(DeviceMessage::Error {
                cmd: name,
                reason: "filter set full",
            }),
        },
        HostCommand::RemoveFilter { pattern } => {
            if sniffer.remove_filter(&pattern) == 0 {
                return Some(DeviceMessage::Error {
                    cmd: name,
                    reason: "no such filter",
                });
            }
            None
        }
        HostCommand::ClearFilters => {
            sniffer.clear_filters();
            log::info!("Filters cleared");
            None
        }
    }
}

// ── Serial NDJSON reader ───────────────────────────────────────────────

/// Serial NDJSON reader state machine.
/// Accumulates bytes until a newline is found, then yields the line.
///
/// A line longer than the buffer is dropped whole: everything up to the
/// next newline is discarded rather than parsed as a fragment.
pub struct LineReader<const N: usize = MAX_MSG_LEN> {
    buf: [u8; N],
    pos: usize,
    overflowed: bool,
}

impl<const N: usize> LineReader<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            pos: 0,
            overflowed: false,
        }
    }

    /// Feed a byte into the reader. Returns a complete line (without newline)
    /// when one is detected.
    pub fn feed(&mut self, byte: u8) -> Option<&[u8]> {
        if byte == b'\n' || byte == b'\r' {
            let complete = !self.overflowed && self.pos > 0;
            let len = self.pos;
            self.pos = 0;
            self.overflowed = false;
            complete.then(|| &self.buf[..len])
        } else if self.overflowed {
            None
        } else if self.pos < N {
            self.buf[self.pos] = byte;
            self.pos += 1;
            None
        } else {
            log::warn!("Command line longer than {} bytes dropped", N);
            self.overflowed = true;
            self.pos = 0;
            None
        }
    }
}

impl<const N: usize> Default for LineReader<N> {
    fn default() -> Self {
        Self::new()
    }
}
