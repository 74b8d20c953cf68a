/// Bounds-checked cursor over untrusted capture bytes.
///
/// Every read checks the remaining length first and returns `None` instead
/// of indexing out of range. Nothing here can panic on attacker-controlled
/// content.
use crate::mac::MacAddr;

#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub const fn position(&self) -> usize {
        self.pos
    }

    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if n > self.remaining() {
            return None;
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Some(out)
    }

    pub fn skip(&mut self, n: usize) -> Option<()> {
        self.take(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    pub fn read_u16_le(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_mac(&mut self) -> Option<MacAddr> {
        self.take(6).and_then(MacAddr::from_slice)
    }

    /// Everything not yet consumed.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}

/// One tag-length-value information element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element<'a> {
    pub id: u8,
    pub data: &'a [u8],
}

/// Iterator over the information elements of a management frame body.
///
/// Stops at the first element whose header or declared length does not fit
/// in what is left of the buffer; anything already yielded stays valid.
pub struct Elements<'a> {
    reader: Reader<'a>,
}

impl<'a> Elements<'a> {
    pub const fn new(body: &'a [u8]) -> Self {
        Self {
            reader: Reader::new(body),
        }
    }
}

impl<'a> Iterator for Elements<'a> {
    type Item = Element<'a>;

    fn next(&mut self) -> Option<Element<'a>> {
        if self.reader.remaining() < 2 {
            return None;
        }
        let rest = self.reader.rest();
        let (id, len) = (rest[0], rest[1] as usize);
        if self.reader.remaining() < 2 + len {
            // Truncated element: poison the cursor so iteration ends here
            let _ = self.reader.skip(self.reader.remaining());
            return None;
        }
        self.reader.skip(2)?;
        let data = self.reader.take(len)?;
        Some(Element { id, data })
    }
}
