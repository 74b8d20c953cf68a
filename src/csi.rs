/// Channel state information decoding.
///
/// The radio delivers a 128-byte buffer of signed `(imaginary, real)` pairs
/// for the 52 data subcarriers of a 20 MHz HT-LTF, indexed -26..=26 without
/// the DC carrier. Positive subcarriers start at byte 4, negative ones end at
/// byte 126.
use crate::frame::Rejection;
use crate::mac::MacAddr;

/// Raw CSI buffer length
pub const CSI_BUFFER_LEN: usize = 128;

/// Highest subcarrier index (either side of DC)
pub const MAX_SUBCARRIER: i8 = 26;

/// Subcarriers carried per sample
pub const SUBCARRIER_COUNT: usize = 52;

/// One decoded subcarrier.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Subcarrier {
    pub real: i8,
    pub imaginary: i8,
}

impl Subcarrier {
    pub fn magnitude(&self) -> f32 {
        let (re, im) = (self.real as f32, self.imaginary as f32);
        libm::sqrtf(re * re + im * im)
    }

    /// Radians in (-π, π]. Zero at the origin, where atan2 is undefined.
    pub fn phase(&self) -> f32 {
        if self.real == 0 && self.imaginary == 0 {
            return 0.0;
        }
        libm::atan2f(self.imaginary as f32, self.real as f32)
    }
}

/// Byte offset of subcarrier `n`'s pair, `None` outside ±1..=26.
pub fn subcarrier_offset(n: i8) -> Option<usize> {
    match n {
        1..=26 => Some(2 * n as usize + 2),
        -26..=-1 => Some((126 + 2 * n as isize) as usize),
        _ => None,
    }
}

/// A validated CSI capture from the local network.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSample {
    pub bssid: MacAddr,
    pub rssi: i8,
    pub channel: u8,
    data: [i8; CSI_BUFFER_LEN],
}

impl ChannelSample {
    /// Subcarrier `n`; a zeroed sample for 0 or |n| > 26.
    pub fn subcarrier(&self, n: i8) -> Subcarrier {
        match subcarrier_offset(n) {
            Some(i) => Subcarrier {
                imaginary: self.data[i],
                real: self.data[i + 1],
            },
            None => Subcarrier::default(),
        }
    }

    /// All 52 subcarriers from -26 to 26.
    pub fn subcarriers(&self) -> impl Iterator<Item = (i8, Subcarrier)> + '_ {
        (-MAX_SUBCARRIER..=MAX_SUBCARRIER)
            .filter(|n| *n != 0)
            .map(move |n| (n, self.subcarrier(n)))
    }

    pub fn raw(&self) -> &[i8; CSI_BUFFER_LEN] {
        &self.data
    }
}

/// Accepts CSI only for the local network.
#[derive(Debug, Clone, Copy)]
pub struct ChannelSampleDecoder {
    local_bssid: MacAddr,
}

impl ChannelSampleDecoder {
    pub const fn new(local_bssid: MacAddr) -> Self {
        Self { local_bssid }
    }

    pub fn set_local_bssid(&mut self, bssid: MacAddr) {
        self.local_bssid = bssid;
    }

    pub fn decode(&self, bssid: MacAddr, rssi: i8, channel: u8, buf: &[i8]) -> Result<ChannelSample, Rejection> {
        if bssid != self.local_bssid {
            return Err(Rejection::NotOnNetwork);
        }
        let data: [i8; CSI_BUFFER_LEN] = buf
            .get(..CSI_BUFFER_LEN)
            .and_then(|b| b.try_into().ok())
            .ok_or(Rejection::Malformed)?;

        Ok(ChannelSample {
            bssid,
            rssi,
            channel,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{csi_buffer, LOCAL, OTHER_NET};
    use core::f32::consts::{FRAC_PI_2, PI};

    fn decode(buf: &[i8]) -> ChannelSample {
        ChannelSampleDecoder::new(LOCAL).decode(LOCAL, -50, 6, buf).unwrap()
    }

    // ── Offsets ─────────────────────────────────────────────────────

    #[test]
    fn offsets_at_band_edges() {
        assert_eq!(subcarrier_offset(1), Some(4));
        assert_eq!(subcarrier_offset(26), Some(54));
        assert_eq!(subcarrier_offset(-1), Some(124));
        assert_eq!(subcarrier_offset(-26), Some(74));
        assert_eq!(subcarrier_offset(0), None);
        assert_eq!(subcarrier_offset(27), None);
        assert_eq!(subcarrier_offset(-27), None);
        assert_eq!(subcarrier_offset(i8::MIN), None);
    }

    #[test]
    fn offsets_never_overlap_and_fit() {
        let mut used = [false; CSI_BUFFER_LEN];
        for n in (-26i8..=26).filter(|n| *n != 0) {
            let i = subcarrier_offset(n).unwrap();
            assert!(i + 1 < CSI_BUFFER_LEN);
            assert!(!used[i] && !used[i + 1], "overlap at {n}");
            used[i] = true;
            used[i + 1] = true;
        }
    }

    // ── Decoding ────────────────────────────────────────────────────

    #[test]
    fn zero_buffer_has_zero_magnitude_and_phase() {
        let sample = decode(&[0; CSI_BUFFER_LEN]);
        assert_eq!(sample.subcarriers().count(), SUBCARRIER_COUNT);
        for (_, sc) in sample.subcarriers() {
            assert_eq!(sc.magnitude(), 0.0);
            assert_eq!(sc.phase(), 0.0);
        }
    }

    #[test]
    fn pair_is_imaginary_then_real() {
        let sample = decode(&csi_buffer(&[(5, 4, 3), (-5, -4, 3)]));
        assert_eq!(sample.subcarrier(5), Subcarrier { real: 3, imaginary: 4 });
        assert_eq!(sample.subcarrier(5).magnitude(), 5.0);
        assert_eq!(sample.subcarrier(-5).imaginary, -4);
    }

    #[test]
    fn phase_quadrants() {
        let sample = decode(&csi_buffer(&[(1, 1, 0), (2, 0, -1), (3, -1, 0), (4, 0, 1)]));
        assert!((sample.subcarrier(1).phase() - FRAC_PI_2).abs() < 1e-6);
        assert!((sample.subcarrier(2).phase() - PI).abs() < 1e-6);
        assert!((sample.subcarrier(3).phase() + FRAC_PI_2).abs() < 1e-6);
        assert_eq!(sample.subcarrier(4).phase(), 0.0);
    }

    #[test]
    fn out_of_range_index_is_zeroed() {
        let sample = decode(&[7; CSI_BUFFER_LEN]);
        assert_eq!(sample.subcarrier(0), Subcarrier::default());
        assert_eq!(sample.subcarrier(27), Subcarrier::default());
        assert_eq!(sample.subcarrier(-100), Subcarrier::default());
    }

    #[test]
    fn extreme_values() {
        let sample = decode(&csi_buffer(&[(26, i8::MIN, i8::MIN)]));
        let m = sample.subcarrier(26).magnitude();
        assert!((m - 181.019_33).abs() < 1e-3);
    }

    // ── Rejection ───────────────────────────────────────────────────

    #[test]
    fn foreign_bssid_rejected() {
        let decoder = ChannelSampleDecoder::new(LOCAL);
        let buf = [0i8; CSI_BUFFER_LEN];
        assert_eq!(decoder.decode(OTHER_NET, -50, 6, &buf), Err(Rejection::NotOnNetwork));
    }

    #[test]
    fn short_buffer_rejected() {
        let decoder = ChannelSampleDecoder::new(LOCAL);
        let buf = [0i8; CSI_BUFFER_LEN - 1];
        assert_eq!(decoder.decode(LOCAL, -50, 6, &buf), Err(Rejection::Malformed));
    }

    #[test]
    fn longer_buffer_uses_first_128_bytes() {
        let mut buf = [0i8; 384];
        buf[4] = 9;
        buf[200] = 1;
        let sample = decode(&buf);
        assert_eq!(sample.subcarrier(1).imaginary, 9);
        assert_eq!(sample.raw().len(), CSI_BUFFER_LEN);
    }
}
