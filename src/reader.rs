use std::io::Read;

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};
use crate::fourcc::FourCC;

/// A reader scoped to one box body.
///
/// Every decoder receives one of these instead of the raw source, so a
/// decoder structurally cannot read past its box boundary: a field that
/// would exceed the remaining budget is a format error, while an underlying
/// short read is a truncation error. The walker checks `remaining()` after
/// each decoder returns.
///
/// `BodyReader` itself implements [`Read`] (bounded like [`Read::take`]),
/// which is how the walker recurses into container boxes: a child body is
/// just another `BodyReader` drawing from its parent's budget.
pub struct BodyReader<'a> {
    inner: &'a mut dyn Read,
    remaining: u64,
}

impl<'a> BodyReader<'a> {
    pub fn new(inner: &'a mut dyn Read, body_size: u64) -> Self {
        Self {
            inner,
            remaining: body_size,
        }
    }

    /// Bytes of the body not yet consumed.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    fn charge(&mut self, n: u64) -> Result<()> {
        if n > self.remaining {
            return Err(Error::Format(format!(
                "field of {} bytes exceeds box body ({} bytes left)",
                n, self.remaining
            )));
        }
        self.remaining -= n;
        Ok(())
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut got = 0usize;
        while got < buf.len() {
            let n = self.inner.read(&mut buf[got..])?;
            if n == 0 {
                return Err(Error::Truncated {
                    needed: buf.len() as u64,
                    available: got as u64,
                });
            }
            got += n;
        }
        Ok(())
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.charge(buf.len() as u64)?;
        self.fill(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_exact(&mut b)?;
        Ok(b[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let mut b = [0u8; 2];
        self.read_exact(&mut b)?;
        Ok(BigEndian::read_u16(&b))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let mut b = [0u8; 2];
        self.read_exact(&mut b)?;
        Ok(BigEndian::read_i16(&b))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(BigEndian::read_u32(&b))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(BigEndian::read_i32(&b))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let mut b = [0u8; 8];
        self.read_exact(&mut b)?;
        Ok(BigEndian::read_u64(&b))
    }

    /// Read a 24-bit big-endian flags field.
    pub fn read_u24(&mut self) -> Result<u32> {
        let mut f = [0u8; 3];
        self.read_exact(&mut f)?;
        Ok(((f[0] as u32) << 16) | ((f[1] as u32) << 8) | (f[2] as u32))
    }

    /// Read a four-character tag.
    pub fn read_fourcc(&mut self) -> Result<FourCC> {
        let mut t = [0u8; 4];
        self.read_exact(&mut t)?;
        Ok(FourCC(t))
    }

    /// Read `n` bytes and decode them as text, dropping NULs and
    /// trimming padding spaces.
    pub fn read_str(&mut self, n: u64) -> Result<String> {
        let mut buf = vec![0u8; n as usize];
        self.read_exact(&mut buf)?;
        buf.retain(|&b| b != 0);
        Ok(String::from_utf8_lossy(&buf).trim_matches(' ').to_owned())
    }

    /// Read `n` bytes as a lowercase hex string, for opaque fields.
    pub fn read_hex(&mut self, n: u64) -> Result<String> {
        let mut buf = vec![0u8; n as usize];
        self.read_exact(&mut buf)?;
        Ok(hex::encode(&buf))
    }

    /// Read a NUL-terminated string bounded by the remaining body.
    pub fn read_cstr(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        while self.remaining > 0 {
            let b = self.read_u8()?;
            if b == 0 {
                break;
            }
            buf.push(b);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Consume and discard `n` bytes.
    pub fn skip(&mut self, n: u64) -> Result<()> {
        self.charge(n)?;
        let copied = std::io::copy(&mut (&mut *self.inner).take(n), &mut std::io::sink())?;
        if copied < n {
            return Err(Error::Truncated {
                needed: n,
                available: copied,
            });
        }
        Ok(())
    }

    /// Consume whatever is left of the body.
    pub fn skip_remaining(&mut self) -> Result<()> {
        let n = self.remaining;
        self.skip(n)
    }
}

impl Read for BodyReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let cap = buf.len().min(self.remaining.min(usize::MAX as u64) as usize);
        let n = self.inner.read(&mut buf[..cap])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Extract `len` bits (MSB-first) starting at bit index `start`.
///
/// This treats the buffer as one fixed-width binary string, which is how
/// sub-byte-aligned fields (ADTS headers, packed language codes) are laid
/// out. `len` must be at most 32 and the range must lie inside `buf`.
pub fn bits(buf: &[u8], start: usize, len: usize) -> u32 {
    debug_assert!(len <= 32);
    debug_assert!(start + len <= buf.len() * 8);
    let mut v = 0u32;
    for i in start..start + len {
        let bit = (buf[i / 8] >> (7 - (i % 8))) & 1;
        v = (v << 1) | bit as u32;
    }
    v
}

/// Single-bit convenience over [`bits`].
pub fn bit(buf: &[u8], index: usize) -> bool {
    bits(buf, index, 1) == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn bits_slices_across_byte_boundaries() {
        let buf = [0b1010_1100, 0b0101_0011];
        assert_eq!(bits(&buf, 0, 4), 0b1010);
        assert_eq!(bits(&buf, 6, 4), 0b0001);
        assert_eq!(bits(&buf, 4, 12), 0b1100_0101_0011);
        assert!(bit(&buf, 0));
        assert!(!bit(&buf, 1));
    }

    #[test]
    fn over_budget_field_is_a_format_error() {
        let data = [0u8; 2];
        let mut cur = Cursor::new(&data[..]);
        let mut body = BodyReader::new(&mut cur, 2);
        assert!(matches!(body.read_u32(), Err(Error::Format(_))));
    }

    #[test]
    fn short_source_is_a_truncation_error() {
        let data = [0u8; 2];
        let mut cur = Cursor::new(&data[..]);
        let mut body = BodyReader::new(&mut cur, 8);
        assert!(matches!(
            body.read_u32(),
            Err(Error::Truncated {
                needed: 4,
                available: 2
            })
        ));
    }

    #[test]
    fn skip_discards_exactly_n_bytes() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let mut cur = Cursor::new(&data[..]);
        let mut body = BodyReader::new(&mut cur, 6);
        body.skip(4).unwrap();
        assert_eq!(body.remaining(), 2);
        assert_eq!(body.read_u8().unwrap(), 5);

        let mut cur = Cursor::new(&data[..2]);
        let mut body = BodyReader::new(&mut cur, 6);
        assert!(matches!(
            body.skip(5),
            Err(Error::Truncated {
                needed: 5,
                available: 2
            })
        ));
    }

    #[test]
    fn cstr_stops_at_nul_or_budget() {
        let data = b"abc\0def";
        let mut cur = Cursor::new(&data[..]);
        let mut body = BodyReader::new(&mut cur, data.len() as u64);
        assert_eq!(body.read_cstr().unwrap(), "abc");
        assert_eq!(body.remaining(), 3);

        let mut cur = Cursor::new(&b"xy"[..]);
        let mut body = BodyReader::new(&mut cur, 2);
        assert_eq!(body.read_cstr().unwrap(), "xy");
    }
}
