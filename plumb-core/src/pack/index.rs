use crate::error::{BitError, BitResult};
use crate::hash::{SHA1Hash, OID_SIZE};
use crate::io::ReadExt;
use crate::obj::{Oid, PartialOid};
use crate::serialize::BufReadSeek;
use std::io::{Read, Seek, SeekFrom};

pub const PACK_IDX_EXT: &str = "idx";
const PACK_IDX_MAGIC: u32 = 0xff744f63;
const FANOUT_ENTRYC: usize = 256;
const FANOUT_SIZE: u64 = FANOUT_ENTRYC as u64 * 4;
const PACK_IDX_HEADER_SIZE: u64 = 8;
const CRC_SIZE: u64 = 4;
const OFFSET_SIZE: u64 = 4;
const EXT_OFFSET_SIZE: u64 = 8;
/// highest bit of a layer-2 offset marks it as an index into the 64-bit
/// extension table rather than a literal offset.
const EXT_MARKER: u32 = 0x8000_0000;
const MAX_DIRECT_OFFSET: u32 = 0x7fff_ffff;

/// A parsed `.idx` file: the 256-entry fanout table plus the three parallel
/// layer-2 tables (sorted ids, crcs, offsets) every pack index carries.
pub struct PackIndexReader<R> {
    reader: R,
    fanout: [u32; FANOUT_ENTRYC],
    /// number of objects, i.e. the last fanout entry
    n: u64,
    ext_offset_count: u64,
}

impl<R: BufReadSeek> PackIndexReader<R> {
    pub fn new(mut reader: R) -> BitResult<Self> {
        let magic = reader.read_u32()?;
        if magic != PACK_IDX_MAGIC {
            return Err(BitError::corrupt("pack index", "bad magic number").into());
        }
        let version = reader.read_u32()?;
        if version != 2 {
            return Err(BitError::corrupt("pack index", format!("unsupported version {}", version)).into());
        }

        let mut fanout = [0u32; FANOUT_ENTRYC];
        for slot in &mut fanout {
            *slot = reader.read_u32()?;
        }
        let n = fanout[FANOUT_ENTRYC - 1] as u64;

        // the extension table's size isn't stored explicitly; it is exactly
        // as many 8-byte entries as there are marked layer-2 offsets, which
        // we only know after scanning the offset table once.
        let offsets_start = PACK_IDX_HEADER_SIZE + FANOUT_SIZE + n * (OID_SIZE as u64 + CRC_SIZE);
        reader.seek(SeekFrom::Start(offsets_start))?;
        let mut ext_offset_count = 0u64;
        for _ in 0..n {
            if reader.read_u32()? & EXT_MARKER != 0 {
                ext_offset_count += 1;
            }
        }

        Ok(Self { reader, fanout, n, ext_offset_count })
    }

    pub fn len(&self) -> u64 {
        self.n
    }

    fn oid_table_start(&self) -> u64 {
        PACK_IDX_HEADER_SIZE + FANOUT_SIZE
    }

    fn crc_table_start(&self) -> u64 {
        self.oid_table_start() + self.n * OID_SIZE as u64
    }

    fn offset_table_start(&self) -> u64 {
        self.crc_table_start() + self.n * CRC_SIZE
    }

    fn ext_table_start(&self) -> u64 {
        self.offset_table_start() + self.n * OFFSET_SIZE
    }

    pub fn oid_at(&mut self, index: u64) -> BitResult<Oid> {
        self.reader.seek(SeekFrom::Start(self.oid_table_start() + index * OID_SIZE as u64))?;
        Ok(self.reader.read_oid()?)
    }

    fn crc_at(&mut self, index: u64) -> BitResult<u32> {
        self.reader.seek(SeekFrom::Start(self.crc_table_start() + index * CRC_SIZE))?;
        Ok(self.reader.read_u32()?)
    }

    fn offset_at(&mut self, index: u64) -> BitResult<u64> {
        self.reader.seek(SeekFrom::Start(self.offset_table_start() + index * OFFSET_SIZE))?;
        let raw = self.reader.read_u32()?;
        if raw & EXT_MARKER == 0 {
            return Ok(raw as u64);
        }
        let ext_index = (raw & MAX_DIRECT_OFFSET) as u64;
        if ext_index >= self.ext_offset_count {
            return Err(BitError::corrupt("pack index", "extension offset index out of range").into());
        }
        self.reader.seek(SeekFrom::Start(self.ext_table_start() + ext_index * EXT_OFFSET_SIZE))?;
        Ok(self.reader.read_u64()?)
    }

    /// Binary search within the fanout-delimited bucket for `oid`'s byte
    /// value, returning the layer-2 index it occupies.
    fn find_index(&mut self, oid: Oid) -> BitResult<u64> {
        let byte = oid.as_bytes()[0] as usize;
        let mut low = if byte == 0 { 0 } else { self.fanout[byte - 1] as u64 };
        let mut high = self.fanout[byte] as u64;

        while low < high {
            let mid = low + (high - low) / 2;
            let candidate = self.oid_at(mid)?;
            match candidate.cmp(&oid) {
                std::cmp::Ordering::Equal => return Ok(mid),
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid,
            }
        }

        Err(BitError::ObjectNotFound(oid.into()).into())
    }

    /// Returns `(crc32, pack-file byte offset)` for `oid`.
    pub fn find_oid_crc_offset(&mut self, oid: Oid) -> BitResult<(u32, u64)> {
        let index = self.find_index(oid)?;
        let crc = self.crc_at(index)?;
        let offset = self.offset_at(index)?;
        Ok((crc, offset))
    }

    /// All ids in the fanout bucket(s) that start with `prefix`, relying on
    /// the fact that ids sharing a prefix are contiguous in sorted order.
    pub fn oids_with_prefix(&mut self, prefix: PartialOid) -> BitResult<Vec<Oid>> {
        let lower = prefix.into_oid();
        let byte = lower.as_bytes()[0] as usize;
        let mut low = if byte == 0 { 0 } else { self.fanout[byte - 1] as u64 };
        let high = self.fanout[byte] as u64;

        // advance to the first id >= lower bound within the bucket
        while low < high {
            let mid = low + (high - low) / 2;
            if self.oid_at(mid)? < lower {
                low = mid + 1;
            } else {
                break;
            }
        }

        let mut matches = vec![];
        let mut index = low;
        while index < high {
            let oid = self.oid_at(index)?;
            if !oid.has_prefix(prefix) {
                break;
            }
            matches.push(oid);
            index += 1;
        }
        Ok(matches)
    }

    pub fn all_oids(&mut self) -> BitResult<Vec<Oid>> {
        (0..self.n).map(|i| self.oid_at(i)).collect()
    }

    pub fn verify_trailer(&mut self) -> BitResult<(SHA1Hash, SHA1Hash)> {
        self.reader.seek(SeekFrom::Start(0))?;
        let idx_end = self.ext_table_start() + self.ext_offset_count * EXT_OFFSET_SIZE;
        let mut body = vec![0u8; idx_end as usize];
        self.reader.read_exact(&mut body)?;
        let computed = crate::hash::hash_bytes(&body);

        let pack_hash = self.reader.read_oid()?;
        let idx_hash = self.reader.read_oid()?;
        if idx_hash != computed {
            return Err(BitError::corrupt("pack index", "trailing checksum does not match contents").into());
        }
        Ok((pack_hash, idx_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::build_pack_index;
    use std::io::Cursor;

    #[test]
    fn finds_every_oid_by_exact_match() -> BitResult<()> {
        let oids: Vec<Oid> = (0u8..40)
            .map(|i| {
                let mut bytes = [0u8; 20];
                bytes[0] = i;
                Oid::from_bytes(bytes)
            })
            .collect();
        let idx_bytes = build_pack_index(&oids, Oid::from_bytes([0u8; 20]), |i| (i as u32, i as u64 * 100));

        let mut reader = PackIndexReader::new(Cursor::new(idx_bytes))?;
        for (i, &oid) in oids.iter().enumerate() {
            let (crc, offset) = reader.find_oid_crc_offset(oid)?;
            assert_eq!(crc, i as u32);
            assert_eq!(offset, i as u64 * 100);
        }
        Ok(())
    }

    #[test]
    fn missing_oid_is_not_found() -> BitResult<()> {
        let oids: Vec<Oid> = (0u8..4).map(|i| Oid::from_bytes([i; 20])).collect();
        let idx_bytes = build_pack_index(&oids, Oid::from_bytes([0u8; 20]), |i| (i as u32, i as u64));
        let mut reader = PackIndexReader::new(Cursor::new(idx_bytes))?;
        let missing = Oid::from_bytes([0xff; 20]);
        assert!(reader.find_oid_crc_offset(missing).is_err());
        Ok(())
    }

    #[test]
    fn prefix_search_returns_contiguous_matches() -> BitResult<()> {
        let oids = vec![
            "aaaa000000000000000000000000000000000a".parse::<Oid>().unwrap(),
            "aaaa000000000000000000000000000000000b".parse::<Oid>().unwrap(),
            "aaab000000000000000000000000000000000a".parse::<Oid>().unwrap(),
        ];
        let idx_bytes = build_pack_index(&oids, Oid::from_bytes([0u8; 20]), |i| (i as u32, i as u64));
        let mut reader = PackIndexReader::new(Cursor::new(idx_bytes))?;
        let prefix: PartialOid = "aaaa".parse()?;
        let matches = reader.oids_with_prefix(prefix)?;
        assert_eq!(matches.len(), 2);
        Ok(())
    }
}
