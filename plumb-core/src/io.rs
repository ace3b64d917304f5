use crate::error::{BitError, BitGenericError, BitResult};
use crate::hash::SHA1Hash;
use crate::obj::Oid;
use crate::serialize::{Deserialize, Serialize};
use sha1::Digest;
use std::fmt::Display;
use std::io::{self, prelude::*, BufReader};
use std::str::FromStr;

/// Big-endian and git-specific variable-length integer decoders layered on
/// top of `std::io::Read`, mirroring the way the data model in SPEC_FULL.md
/// §4.1 names them as cursor operations rather than free functions.
pub trait ReadExt: Read {
    #[inline]
    fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0u8];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Offset-delta base-offset prefix (SPEC_FULL.md §3): big-endian-first
    /// seven-bit groups with a "plus one per additional byte" accumulator.
    /// Distinct from [`ReadExt::read_le_varint`] below — note the asymmetry
    /// the spec calls out explicitly.
    fn read_offset_delta_base(&mut self) -> io::Result<u64> {
        let mut byte = self.read_u8()? as u64;
        let mut offset = byte & 0x7f;
        while byte & 0x80 != 0 {
            offset += 1;
            byte = self.read_u8()? as u64;
            offset = (offset << 7) | (byte & 0x7f);
        }
        Ok(offset)
    }

    #[inline]
    fn read_le_varint(&mut self) -> io::Result<u64> {
        self.read_le_varint_with_shift(0).map(|(_, n)| n)
    }

    /// Variable-length little-endian integer with `init_shift` low bits of
    /// the first byte reserved for another field (used by the pack entry
    /// header, which packs a 3-bit type into those bits alongside the low
    /// size bits). Returns `(those bits, decoded value)`.
    fn read_le_varint_with_shift(&mut self, init_shift: u64) -> io::Result<(u8, u64)> {
        assert!(init_shift < 8);
        let byte = self.read_u8()?;
        let anti_shift = 7 - init_shift;
        let k_mask = ((1u16 << init_shift) - 1) << anti_shift;
        let k = ((byte as u16 & k_mask) >> anti_shift) as u8;

        let mask = (1u8 << anti_shift) - 1;
        let mut n = (byte & mask) as u64;

        if byte & 0x80 != 0 {
            let mut shift = anti_shift;
            loop {
                let byte = self.read_u8()? as u64;
                n |= (byte & 0x7f) << shift;
                shift += 7;
                if byte & 0x80 == 0 {
                    break;
                }
            }
        }

        Ok((k, n))
    }

    /// Delta copy-instruction operand encoding (SPEC_FULL.md §3): `header`'s
    /// set bits select which of up to 7 following bytes are present, each
    /// contributing 8 bits, **least-significant byte first**.
    fn read_le_packed(&mut self, header: u8) -> io::Result<u64> {
        debug_assert!(header & 0x80 != 0, "copy instruction header must have the high bit set");
        let mut value = 0u64;
        for i in 0..7 {
            if header & (1 << i) == 0 {
                continue;
            }
            let byte = self.read_u8()? as u64;
            value |= byte << (i * 8);
        }
        Ok(value)
    }

    #[inline]
    fn read_u16(&mut self) -> io::Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    #[inline]
    fn read_u32(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    #[inline]
    fn read_u64(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    #[inline]
    fn read_oid(&mut self) -> io::Result<Oid> {
        let mut buf = [0u8; 20];
        self.read_exact(&mut buf)?;
        Ok(Oid::new(buf))
    }

    #[inline]
    fn read_to_vec(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = vec![];
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl<R: Read + ?Sized> ReadExt for R {}

impl Deserialize for u32 {
    fn deserialize(reader: &mut impl BufRead) -> BitResult<Self> {
        Ok(reader.read_u32()?)
    }
}

impl Deserialize for Oid {
    fn deserialize(reader: &mut impl BufRead) -> BitResult<Self> {
        Ok(reader.read_oid()?)
    }
}

impl Deserialize for Vec<u8> {
    fn deserialize(reader: &mut impl BufRead) -> BitResult<Self> {
        Ok(reader.read_to_vec()?)
    }
}

impl Serialize for [u8] {
    fn serialize(&self, writer: &mut dyn Write) -> BitResult<()> {
        Ok(writer.write_all(self)?)
    }
}

pub trait BufReadExt: BufRead {
    fn as_zlib_decode_stream(&mut self) -> flate2::bufread::ZlibDecoder<&mut Self> {
        flate2::bufread::ZlibDecoder::new(self)
    }

    /// Reads bytes up to (and consuming) `sep`, parsing them as ascii.
    fn read_ascii_str<T: FromStr<Err = E>, E: Into<BitGenericError>>(
        &mut self,
        sep: u8,
        what: &'static str,
    ) -> BitResult<T> {
        let mut buf = vec![];
        let n = self.read_until(sep, &mut buf)?;
        if n == 0 {
            return Err(BitError::Truncated(what).into());
        }
        let s = std::str::from_utf8(&buf[..n - 1])
            .map_err(|_| BitError::corrupt(what, "not valid utf8"))?;
        s.parse().map_err(|e: E| e.into())
    }

    fn consume_literal(&mut self, literal: &[u8], what: &'static str) -> BitResult<()> {
        let mut buf = vec![0u8; literal.len()];
        self.read_exact(&mut buf).map_err(|_| BitError::Truncated(what))?;
        if buf != literal {
            return Err(BitError::corrupt(
                what,
                format!("expected {:?}, found {:?}", literal, buf),
            )
            .into());
        }
        Ok(())
    }

    fn is_at_eof(&mut self) -> io::Result<bool> {
        Ok(self.fill_buf()?.is_empty())
    }
}

impl<R: BufRead + ?Sized> BufReadExt for R {}

pub trait WriteExt: Write {
    fn write_u8(&mut self, u: u8) -> io::Result<()> {
        self.write_all(&[u])
    }

    fn write_u32(&mut self, u: u32) -> io::Result<()> {
        self.write_all(&u.to_be_bytes())
    }

    fn write_ascii_num(&mut self, i: impl Display, sep: u8) -> io::Result<()> {
        self.write_all(i.to_string().as_bytes())?;
        self.write_u8(sep)
    }

    fn write_oid(&mut self, oid: Oid) -> io::Result<()> {
        self.write_all(oid.as_bytes())
    }
}

impl<W: Write + ?Sized> WriteExt for W {}

/// Wraps a reader and incrementally hashes every byte read through it, so a
/// single pass can both parse a stream and verify it hashes to an expected
/// identifier without buffering the whole thing twice.
pub(crate) struct HashReader<'a, D> {
    reader: &'a mut dyn BufRead,
    hasher: D,
}

impl<'a, D: Digest> BufRead for HashReader<'a, D> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.reader.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.reader.consume(amt)
    }
}

impl<'a, D: Digest> Read for HashReader<'a, D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

impl<'a, D: Digest> HashReader<'a, D> {
    pub fn new(reader: &'a mut dyn BufRead) -> Self {
        Self { reader, hasher: D::new() }
    }
}

impl<'a> HashReader<'a, sha1::Sha1> {
    pub fn new_sha1(reader: &'a mut dyn BufRead) -> Self {
        Self::new(reader)
    }

    pub fn finalize_sha1_hash(&mut self) -> SHA1Hash {
        SHA1Hash::from(self.hasher.finalize_reset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn le_varint_with_shift_splits_leading_bits() {
        // 0xff = 1111_1111: continuation set, 3-bit kind = 0b111, low 4 bits = 0b1111
        let mut cursor = Cursor::new(vec![0b1111_1111u8, 0b0000_0001]);
        let (kind, size) = cursor.read_le_varint_with_shift(3).unwrap();
        assert_eq!(kind, 0b111);
        // low 4 bits (0b1111 = 15) plus one more 7-bit group (1) shifted by 4
        assert_eq!(size, 15 | (1 << 4));
    }

    #[test]
    fn offset_delta_base_of_one_byte_roundtrips_smallest_value() {
        let mut cursor = Cursor::new(vec![0x01u8]);
        assert_eq!(cursor.read_offset_delta_base().unwrap(), 1);
    }

    #[test]
    fn le_packed_reads_only_selected_bytes_lsb_first() {
        // header selects only bit 0 (first operand byte)
        let header = 0x80 | 0b0000_0001;
        let mut cursor = Cursor::new(vec![0x42u8]);
        let value = cursor.read_le_packed(header).unwrap();
        assert_eq!(value, 0x42);
    }

    #[test]
    fn le_packed_skips_unset_bits() {
        // header selects bit 0 and bit 2 only; the gap (bit 1) contributes nothing
        let header = 0x80 | 0b0000_0101;
        let mut cursor = Cursor::new(vec![0x01u8, 0x02u8]);
        let value = cursor.read_le_packed(header).unwrap();
        assert_eq!(value, 0x01 | (0x02 << 16));
    }
}
