/// 802.11 frame classification and field extraction.
///
/// The capture layer hands over a frame-type discriminant, the raw MAC frame
/// (radio header already stripped), a declared length and out-of-band
/// RSSI/channel. `FrameParser::parse()` turns that into a typed [`Frame`] or a
/// [`Rejection`].
///
/// Probe request SSIDs go through the ieee80211 crate first; everything else
/// (and the SSID fallback) is read with the bounds-checked [`Reader`], so a
/// truncated or lying frame never reads past the declared length.
use core::fmt;

use ieee80211::match_frames;
use ieee80211::mgmt_frame::ProbeRequestFrame;

use crate::mac::MacAddr;
use crate::reader::{Elements, Reader};

/// SSID as observed in a probe request (UTF-8 only)
pub type Ssid = heapless::String<32>;

/// Longest SSID the standard allows
pub const MAX_SSID_LEN: usize = 32;

/// FC + duration + 3 addresses + sequence control
const MGMT_HEADER_LEN: usize = 24;
const DATA_HEADER_LEN: usize = 24;
/// FC + duration + RA + TA
const CTRL_TA_HEADER_LEN: usize = 16;
/// Beacon / probe response: timestamp (8) + interval (2) + capability (2)
const BEACON_FIXED_LEN: usize = 12;

const IE_SSID: u8 = 0;
const IE_COUNTRY: u8 = 7;

/// Frame class as reported by the capture layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Management,
    Control,
    Data,
    /// Aggregates and zero-length captures
    Misc,
}

impl FrameKind {
    /// Map the 2-bit type field of frame control.
    pub fn from_type_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => FrameKind::Management,
            1 => FrameKind::Control,
            2 => FrameKind::Data,
            _ => FrameKind::Misc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MgmtSubtype {
    AssociationRequest,
    AssociationResponse,
    ReassociationRequest,
    ReassociationResponse,
    ProbeRequest,
    ProbeResponse,
    Beacon,
    Disassociation,
    Authentication,
    Deauthentication,
    Action,
    Other(u8),
}

impl MgmtSubtype {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x0F {
            0 => MgmtSubtype::AssociationRequest,
            1 => MgmtSubtype::AssociationResponse,
            2 => MgmtSubtype::ReassociationRequest,
            3 => MgmtSubtype::ReassociationResponse,
            4 => MgmtSubtype::ProbeRequest,
            5 => MgmtSubtype::ProbeResponse,
            8 => MgmtSubtype::Beacon,
            10 => MgmtSubtype::Disassociation,
            11 => MgmtSubtype::Authentication,
            12 => MgmtSubtype::Deauthentication,
            13 => MgmtSubtype::Action,
            other => MgmtSubtype::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtrlSubtype {
    BlockAckRequest,
    BlockAck,
    PsPoll,
    Rts,
    Cts,
    Ack,
    CfEnd,
    CfEndAck,
    Other(u8),
}

impl CtrlSubtype {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x0F {
            8 => CtrlSubtype::BlockAckRequest,
            9 => CtrlSubtype::BlockAck,
            10 => CtrlSubtype::PsPoll,
            11 => CtrlSubtype::Rts,
            12 => CtrlSubtype::Cts,
            13 => CtrlSubtype::Ack,
            14 => CtrlSubtype::CfEnd,
            15 => CtrlSubtype::CfEndAck,
            other => CtrlSubtype::Other(other),
        }
    }

    /// Subtypes whose header carries a transmitter address.
    pub fn has_transmitter(&self) -> bool {
        matches!(
            self,
            CtrlSubtype::Rts | CtrlSubtype::BlockAckRequest | CtrlSubtype::BlockAck | CtrlSubtype::PsPoll
        )
    }
}

/// Direction of a data frame relative to the access point (ToDS/FromDS).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DsDirection {
    /// ToDS=1, FromDS=0: client uploading through the AP
    ToAp,
    /// ToDS=0, FromDS=1: AP delivering to the client
    FromAp,
}

/// Country information element (tag 7) from a local beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Country {
    pub code: [u8; 2],
    /// ' ' any, 'O' outdoor, 'I' indoor
    pub environment: u8,
}

impl Country {
    pub fn code_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.code).ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameBody {
    Management {
        subtype: MgmtSubtype,
        ssid: Option<Ssid>,
        country: Option<Country>,
    },
    Control {
        subtype: CtrlSubtype,
    },
    Data {
        direction: DsDirection,
    },
}

/// A parsed, accepted frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub source: MacAddr,
    pub destination: MacAddr,
    pub bssid: Option<MacAddr>,
    /// dBm, `UNKNOWN_RSSI` when not measured
    pub rssi: i8,
    pub channel: u8,
    /// Bytes actually available for this frame
    pub len: u16,
    pub body: FrameBody,
}

impl Frame {
    /// The station this frame is evidence of.
    pub fn client(&self) -> MacAddr {
        match self.body {
            FrameBody::Data {
                direction: DsDirection::FromAp,
            } => self.destination,
            _ => self.source,
        }
    }

    /// Signed payload size: negative for uploads, positive for downloads,
    /// zero for anything that is not a data frame.
    pub fn data_flow_bytes(&self) -> i32 {
        match self.body {
            FrameBody::Data {
                direction: DsDirection::ToAp,
            } => -(self.len as i32),
            FrameBody::Data {
                direction: DsDirection::FromAp,
            } => self.len as i32,
            _ => 0,
        }
    }

    pub fn ssid(&self) -> Option<&Ssid> {
        match &self.body {
            FrameBody::Management { ssid, .. } => ssid.as_ref(),
            _ => None,
        }
    }

    /// Whether the client address is worth an ARP lookup. Beacons come from
    /// the AP itself and deauth/disassoc senders are leaving.
    pub fn wants_resolution(&self) -> bool {
        match self.body {
            FrameBody::Management { subtype, .. } => matches!(
                subtype,
                MgmtSubtype::ProbeRequest
                    | MgmtSubtype::Authentication
                    | MgmtSubtype::AssociationRequest
                    | MgmtSubtype::ReassociationRequest
            ),
            FrameBody::Control { .. } | FrameBody::Data { .. } => true,
        }
    }
}

/// Why a capture produced no observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Buffer shorter than the header the frame type requires
    Malformed,
    /// BSSID does not match the local network
    NotOnNetwork,
    /// Subtype or DS combination we do not attribute
    Unsupported,
    /// Group, broadcast or junk transmitter address
    IgnoredAddress,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::Malformed => "malformed",
            Rejection::NotOnNetwork => "not_on_network",
            Rejection::Unsupported => "unsupported",
            Rejection::IgnoredAddress => "ignored_address",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw capture as delivered by the radio driver.
#[derive(Debug, Clone, Copy)]
pub struct Capture<'a> {
    pub kind: FrameKind,
    pub data: &'a [u8],
    /// Declared frame length; never trusted beyond `data.len()`
    pub len: usize,
    pub rssi: i8,
    pub channel: u8,
}

impl<'a> Capture<'a> {
    pub fn new(kind: FrameKind, data: &'a [u8], rssi: i8, channel: u8) -> Self {
        Self {
            kind,
            data,
            len: data.len(),
            rssi,
            channel,
        }
    }

    /// Classify from the frame control field, for capture paths that do not
    /// report a type (pcap, replay).
    pub fn classify(data: &'a [u8], rssi: i8, channel: u8) -> Self {
        let kind = match data.first() {
            Some(fc) => FrameKind::from_type_bits(fc >> 2),
            None => FrameKind::Misc,
        };
        Self::new(kind, data, rssi, channel)
    }

    pub fn with_len(mut self, len: usize) -> Self {
        self.len = len;
        self
    }

    /// The bytes that may be read: the declared length clipped to the buffer.
    pub fn bytes(&self) -> &'a [u8] {
        &self.data[..self.len.min(self.data.len())]
    }
}

/// Frame parser bound to one local network.
///
/// Also holds the most recent Country element seen in a local beacon.
#[derive(Debug, Clone)]
pub struct FrameParser {
    local_bssid: MacAddr,
    individual_only: bool,
    country: Option<Country>,
}

impl FrameParser {
    pub const fn new(local_bssid: MacAddr, individual_only: bool) -> Self {
        Self {
            local_bssid,
            individual_only,
            country: None,
        }
    }

    pub fn local_bssid(&self) -> MacAddr {
        self.local_bssid
    }

    pub fn set_local_bssid(&mut self, bssid: MacAddr) {
        self.local_bssid = bssid;
    }

    pub fn set_individual_only(&mut self, individual_only: bool) {
        self.individual_only = individual_only;
    }

    pub fn country(&self) -> Option<Country> {
        self.country
    }

    /// Parse one capture. Safe to call from the driver callback: no
    /// allocation, no blocking, bounded by the capture length.
    pub fn parse(&mut self, capture: &Capture<'_>) -> Result<Frame, Rejection> {
        let bytes = capture.bytes();
        let len = bytes.len().min(u16::MAX as usize) as u16;
        let (rssi, channel) = (capture.rssi, capture.channel);

        match capture.kind {
            FrameKind::Management => self.parse_mgmt(bytes, len, rssi, channel),
            FrameKind::Control => parse_ctrl(bytes, len, rssi, channel),
            FrameKind::Data => self.parse_data(bytes, len, rssi, channel),
            FrameKind::Misc => Err(Rejection::Unsupported),
        }
    }

    fn parse_mgmt(&mut self, bytes: &[u8], len: u16, rssi: i8, channel: u8) -> Result<Frame, Rejection> {
        let header = Header3::read(bytes).ok_or(Rejection::Malformed)?;
        if bytes.len() < MGMT_HEADER_LEN {
            return Err(Rejection::Malformed);
        }
        let body = &bytes[MGMT_HEADER_LEN..];

        // Addr1 = DA, Addr2 = SA (transmitter), Addr3 = BSSID
        let source = header.addr2;
        if !source.is_individual() {
            return Err(Rejection::IgnoredAddress);
        }

        let subtype = MgmtSubtype::from_bits(header.subtype);
        let mut ssid = None;
        let mut country = None;

        match subtype {
            // Probe requests usually carry a wildcard BSSID, accept regardless
            MgmtSubtype::ProbeRequest => {
                ssid = typed_probe_ssid(bytes).or_else(|| find_ssid(body));
            }
            MgmtSubtype::ProbeResponse | MgmtSubtype::Beacon => {
                if header.addr3 != self.local_bssid {
                    return Err(Rejection::NotOnNetwork);
                }
                country = body.get(BEACON_FIXED_LEN..).and_then(find_country);
                if country.is_some() {
                    self.country = country;
                }
            }
            MgmtSubtype::Authentication
            | MgmtSubtype::AssociationRequest
            | MgmtSubtype::ReassociationRequest
            | MgmtSubtype::Deauthentication
            | MgmtSubtype::Disassociation => {}
            _ => return Err(Rejection::Unsupported),
        }

        Ok(Frame {
            source,
            destination: header.addr1,
            bssid: Some(header.addr3),
            rssi,
            channel,
            len,
            body: FrameBody::Management {
                subtype,
                ssid,
                country,
            },
        })
    }

    fn parse_data(&self, bytes: &[u8], len: u16, rssi: i8, channel: u8) -> Result<Frame, Rejection> {
        let header = Header3::read(bytes).ok_or(Rejection::Malformed)?;
        if bytes.len() < DATA_HEADER_LEN {
            return Err(Rejection::Malformed);
        }

        let (direction, bssid, source, destination) = match header.ds {
            // Addr1 = BSSID, Addr2 = SA, Addr3 = DA
            1 => (DsDirection::ToAp, header.addr1, header.addr2, header.addr3),
            // Addr1 = DA, Addr2 = BSSID, Addr3 = SA
            2 => (DsDirection::FromAp, header.addr2, header.addr3, header.addr1),
            // IBSS and WDS are not attributed
            _ => return Err(Rejection::Unsupported),
        };

        if bssid != self.local_bssid {
            return Err(Rejection::NotOnNetwork);
        }

        let frame = Frame {
            source,
            destination,
            bssid: Some(bssid),
            rssi,
            channel,
            len,
            body: FrameBody::Data { direction },
        };

        if self.individual_only && !frame.client().is_individual() {
            return Err(Rejection::IgnoredAddress);
        }

        Ok(frame)
    }
}

fn parse_ctrl(bytes: &[u8], len: u16, rssi: i8, channel: u8) -> Result<Frame, Rejection> {
    let fc = bytes.first().ok_or(Rejection::Malformed)?;
    let subtype = CtrlSubtype::from_bits(fc >> 4);

    // CTS and ACK only name the receiver; the transmitter is unknowable
    if !subtype.has_transmitter() {
        return Err(Rejection::Unsupported);
    }

    let mut r = Reader::new(bytes);
    r.skip(4).ok_or(Rejection::Malformed)?;
    let receiver = r.read_mac().ok_or(Rejection::Malformed)?;
    let transmitter = r.read_mac().ok_or(Rejection::Malformed)?;
    debug_assert_eq!(r.position(), CTRL_TA_HEADER_LEN);

    if !transmitter.is_individual() {
        return Err(Rejection::IgnoredAddress);
    }

    Ok(Frame {
        source: transmitter,
        destination: receiver,
        bssid: None,
        rssi,
        channel,
        len,
        body: FrameBody::Control { subtype },
    })
}

/// The three-address prefix shared by management and data headers.
struct Header3 {
    subtype: u8,
    /// ToDS | FromDS << 1
    ds: u8,
    addr1: MacAddr,
    addr2: MacAddr,
    addr3: MacAddr,
}

impl Header3 {
    fn read(bytes: &[u8]) -> Option<Self> {
        let mut r = Reader::new(bytes);
        let fc0 = r.read_u8()?;
        let fc1 = r.read_u8()?;
        r.skip(2)?; // duration
        let addr1 = r.read_mac()?;
        let addr2 = r.read_mac()?;
        let addr3 = r.read_mac()?;
        Some(Self {
            subtype: fc0 >> 4,
            ds: fc1 & 0x03,
            addr1,
            addr2,
            addr3,
        })
    }
}

/// SSID via the ieee80211 crate's typed probe request parser.
fn typed_probe_ssid(frame: &[u8]) -> Option<Ssid> {
    let result = match_frames! {
        frame,
        probe_req = ProbeRequestFrame<'_> => {
            probe_req.body.ssid().and_then(|s| ssid_from_bytes(s.as_bytes()))
        }
    };
    result.ok().flatten()
}

/// First non-empty SSID element in a management body.
fn find_ssid(body: &[u8]) -> Option<Ssid> {
    Elements::new(body)
        .find(|e| e.id == IE_SSID)
        .and_then(|e| ssid_from_bytes(e.data))
}

fn ssid_from_bytes(data: &[u8]) -> Option<Ssid> {
    if data.is_empty() || data.len() > MAX_SSID_LEN {
        return None;
    }
    let s = core::str::from_utf8(data).ok()?;
    Ssid::try_from(s).ok()
}

/// Country element: 2-letter code + environment byte, then triplets.
fn find_country(elements: &[u8]) -> Option<Country> {
    Elements::new(elements)
        .find(|e| e.id == IE_COUNTRY && e.data.len() >= 3)
        .map(|e| Country {
            code: [e.data[0], e.data[1]],
            environment: e.data[2],
        })
}
