//! Packfile reading: the variable-length entry header, zlib-inflated
//! payloads, and the offset/ref-delta chains a `.pack`/`.idx` pair encodes,
//! layered behind a `Pack` facade that resolves an oid straight to fully
//! expanded bytes.

mod index;

pub use index::{PackIndexReader, PACK_IDX_EXT};

use crate::cache::{PackId, PackObjCache, DEFAULT_CAPACITY_BYTES};
use crate::delta::Delta;
use crate::error::{BitError, BitResult, BitResultExt};
use crate::io::ReadExt;
use crate::obj::{ObjType, Oid, PartialOid};
use crate::serialize::BufReadSeek;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Resolves a reference-delta's base id when it doesn't live in the pack
/// currently being read. A pack has no handle back to its owning object
/// store, so callers that can see other packs/the loose store (`crate::odb`)
/// inject one of these; a bare `Pack` used on its own (tests, `verify-pack`)
/// falls back to `unresolved_base`, which reports the base as not found.
pub type BaseResolver<'a> = dyn Fn(Oid) -> BitResult<PackObjRaw> + 'a;

fn unresolved_base(oid: Oid) -> BitResult<PackObjRaw> {
    Err(BitError::ObjectNotFound(oid.into()).into())
}

pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_EXT: &str = "pack";

/// Default cap on how many bases a delta chain may traverse before
/// resolution gives up and reports corruption, guarding against a pack
/// whose ofs-delta offsets form (or claim to form) an unbounded chain.
pub const DEFAULT_MAX_DELTA_DEPTH: usize = 50;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum PackObjType {
    Commit = 1,
    Tree = 2,
    Blob = 3,
    Tag = 4,
    OfsDelta = 6,
    RefDelta = 7,
}

impl PackObjType {
    fn from_u8(ty: u8) -> BitResult<Self> {
        Ok(match ty {
            1 => Self::Commit,
            2 => Self::Tree,
            3 => Self::Blob,
            4 => Self::Tag,
            6 => Self::OfsDelta,
            7 => Self::RefDelta,
            _ => return Err(BitError::corrupt("pack entry header", format!("unknown type tag {}", ty)).into()),
        })
    }
}

impl PackObjType {
    /// Panics if called on a delta type; only ever called from match arms
    /// that have already excluded `OfsDelta`/`RefDelta`.
    fn base_obj_type(self) -> ObjType {
        match self {
            Self::Commit => ObjType::Commit,
            Self::Tree => ObjType::Tree,
            Self::Blob => ObjType::Blob,
            Self::Tag => ObjType::Tag,
            Self::OfsDelta | Self::RefDelta => unreachable!("delta type has no direct object type"),
        }
    }
}

#[derive(Copy, Clone)]
struct PackObjHeader {
    obj_type: PackObjType,
    /// uncompressed size, matching what `git verify-pack` reports as `size`
    size: u64,
}

/// One entry's payload, still in whichever of the three wire shapes it was
/// stored as: a whole inflated object, or an inflated delta stream keyed by
/// an offset or an id to its base.
enum PackEntry {
    Whole(ObjType, Vec<u8>),
    OfsDelta { distance: u64, delta: Vec<u8> },
    RefDelta { base: Oid, delta: Vec<u8> },
}

/// A fully resolved object pulled out of a pack: its type and its expanded
/// (never delta-encoded) bytes.
#[derive(Clone, Debug)]
pub struct PackObjRaw {
    pub obj_type: ObjType,
    pub bytes: Vec<u8>,
}

pub struct PackfileReader<R> {
    reader: R,
    object_count: u32,
}

impl<R: BufRead> PackfileReader<R> {
    pub fn new(mut reader: R) -> BitResult<Self> {
        let object_count = Self::parse_header(&mut reader)?;
        Ok(Self { reader, object_count })
    }

    fn parse_header(reader: &mut R) -> BitResult<u32> {
        let mut sig = [0u8; 4];
        reader.read_exact(&mut sig)?;
        if &sig != PACK_SIGNATURE {
            return Err(BitError::corrupt("packfile", "bad signature").into());
        }
        let version = reader.read_u32()?;
        if version != 2 {
            return Err(BitError::corrupt("packfile", format!("unsupported version {}", version)).into());
        }
        Ok(reader.read_u32()?)
    }

    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    /// 3 type bits packed into the low bits of the first varint byte; the
    /// `size` here is the uncompressed size, so the zlib stream that follows
    /// can be read to exactly that many bytes once inflated.
    fn read_pack_obj_header(&mut self) -> BitResult<PackObjHeader> {
        let (ty, size) = self.reader.read_le_varint_with_shift(3)?;
        Ok(PackObjHeader { obj_type: PackObjType::from_u8(ty)?, size })
    }

    fn inflate(&mut self, size: u64) -> BitResult<Vec<u8>> {
        Ok(crate::zlib::inflate_embedded(&mut self.reader, size, "packfile entry")?.bytes)
    }

    fn read_pack_entry(&mut self) -> BitResult<PackEntry> {
        let PackObjHeader { obj_type, size } = self.read_pack_obj_header()?;
        Ok(match obj_type {
            PackObjType::Commit | PackObjType::Tree | PackObjType::Blob | PackObjType::Tag =>
                PackEntry::Whole(obj_type.base_obj_type(), self.inflate(size)?),
            PackObjType::OfsDelta => {
                let distance = self.reader.read_offset_delta_base()?;
                PackEntry::OfsDelta { distance, delta: self.inflate(size)? }
            }
            PackObjType::RefDelta => {
                let base = self.reader.read_oid()?;
                PackEntry::RefDelta { base, delta: self.inflate(size)? }
            }
        })
    }
}

impl<R: BufReadSeek> PackfileReader<R> {
    fn read_header_at(&mut self, offset: u64) -> BitResult<PackObjHeader> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.read_pack_obj_header()
    }

    fn read_entry_at(&mut self, offset: u64) -> BitResult<PackEntry> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.read_pack_entry()
    }
}

/// A pack/idx pair plus the object cache and identity it is known by within
/// a repository's pack list.
pub struct Pack {
    id: PackId,
    pack_reader: PackfileReader<BufReader<File>>,
    idx_reader: PackIndexReader<BufReader<File>>,
    cache: PackObjCache,
    max_delta_depth: usize,
}

impl Pack {
    /// Opens a pack/idx pair, verifying both trailing checksums the first
    /// time the pack is seen: the idx's own self-checksum (checked inside
    /// `PackIndexReader::new`'s caller, `verify_trailer`) and the idx's
    /// stored copy of the pack-data checksum against the pack file's
    /// trailing 20 bytes.
    pub fn new(id: PackId, pack: impl AsRef<Path>, idx: impl AsRef<Path>) -> BitResult<Self> {
        Self::new_with(id, pack, idx, DEFAULT_MAX_DELTA_DEPTH, DEFAULT_CAPACITY_BYTES)
    }

    /// Like `new`, but with the delta chain depth cap and the object cache's
    /// byte budget passed in explicitly rather than defaulted.
    pub fn new_with(
        id: PackId,
        pack: impl AsRef<Path>,
        idx: impl AsRef<Path>,
        max_delta_depth: usize,
        cache_capacity_bytes: u64,
    ) -> BitResult<Self> {
        let pack_path = pack.as_ref();
        let idx_path = idx.as_ref();

        let pack_reader =
            PackfileReader::new(BufReader::new(File::open(pack_path).map_err(|e| BitError::io(pack_path.display().to_string(), e))?))?;
        let mut idx_reader =
            PackIndexReader::new(BufReader::new(File::open(idx_path).map_err(|e| BitError::io(idx_path.display().to_string(), e))?))?;

        let (idx_pack_hash, _idx_self_hash) = idx_reader.verify_trailer()?;

        let pack_len =
            std::fs::metadata(pack_path).map_err(|e| BitError::io(pack_path.display().to_string(), e))?.len();
        if pack_len < 20 {
            return Err(BitError::corrupt("packfile", "too short to contain a trailing checksum").into());
        }
        let mut trailer_file =
            File::open(pack_path).map_err(|e| BitError::io(pack_path.display().to_string(), e))?;
        trailer_file.seek(SeekFrom::Start(pack_len - 20))?;
        let mut trailer = [0u8; 20];
        trailer_file.read_exact(&mut trailer)?;
        if trailer != *idx_pack_hash.as_bytes() {
            return Err(BitError::corrupt("packfile", "trailing checksum does not match pack index").into());
        }

        Ok(Self {
            id,
            pack_reader,
            idx_reader,
            cache: PackObjCache::new(cache_capacity_bytes),
            max_delta_depth,
        })
    }

    pub fn object_count(&self) -> u32 {
        self.pack_reader.object_count()
    }

    pub fn obj_crc_offset(&mut self, oid: Oid) -> BitResult<(u32, u64)> {
        self.idx_reader.find_oid_crc_offset(oid)
    }

    pub fn obj_offset(&mut self, oid: Oid) -> BitResult<u64> {
        self.obj_crc_offset(oid).map(|(_, offset)| offset)
    }

    pub fn prefix_matches(&mut self, prefix: PartialOid) -> BitResult<Vec<Oid>> {
        self.idx_reader.oids_with_prefix(prefix)
    }

    pub fn obj_exists(&mut self, oid: Oid) -> BitResult<bool> {
        match self.obj_offset(oid) {
            Ok(..) => Ok(true),
            Err(err) if err.is_not_found_err() => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub fn all_oids(&mut self) -> BitResult<Vec<Oid>> {
        self.idx_reader.all_oids()
    }

    /// Resolves the entry at `offset`, following its delta chain (if any)
    /// to a whole, expanded object. Chain traversal is bounded by
    /// `max_delta_depth` and detects a cycle the moment an offset it has
    /// already visited this call reappears.
    pub fn read_obj_raw_at(&mut self, offset: u64) -> BitResult<PackObjRaw> {
        self.read_obj_raw_at_with(offset, &unresolved_base)
    }

    pub fn read_obj_raw(&mut self, oid: Oid) -> BitResult<PackObjRaw> {
        self.read_obj_raw_with(oid, &unresolved_base)
    }

    /// Like `read_obj_raw`, but a reference-delta whose base isn't present
    /// in this pack's own index is handed to `resolve_base` instead of
    /// immediately reporting not-found. Used by `crate::odb` to reach across
    /// packs and into the loose store.
    pub fn read_obj_raw_with(&mut self, oid: Oid, resolve_base: &BaseResolver<'_>) -> BitResult<PackObjRaw> {
        let offset = self.obj_offset(oid)?;
        self.read_obj_raw_at_with(offset, resolve_base)
    }

    pub fn read_obj_raw_at_with(&mut self, offset: u64, resolve_base: &BaseResolver<'_>) -> BitResult<PackObjRaw> {
        if let Some((obj_type, bytes)) = self.cache.get(self.id, offset) {
            return Ok(PackObjRaw { obj_type, bytes });
        }

        let resolved = self.resolve_chain(offset, &mut vec![], resolve_base)?;
        self.cache.insert(self.id, offset, resolved.obj_type, resolved.bytes.clone());
        Ok(resolved)
    }

    /// `visiting` accumulates every offset walked this call, both for cycle
    /// detection and to cap chain length: the check fires only once more
    /// than `max_delta_depth` bases have been walked, so a chain of exactly
    /// `max_delta_depth` deltas (i.e. `max_delta_depth + 1` objects,
    /// including the final whole base) succeeds and one deeper fails.
    fn resolve_chain(
        &mut self,
        offset: u64,
        visiting: &mut Vec<u64>,
        resolve_base: &BaseResolver<'_>,
    ) -> BitResult<PackObjRaw> {
        if visiting.len() > self.max_delta_depth {
            return Err(BitError::corrupt("pack delta chain", "exceeded maximum delta depth").into());
        }
        if visiting.contains(&offset) {
            return Err(BitError::corrupt("pack delta chain", "cycle detected").into());
        }
        visiting.push(offset);

        if let Some((obj_type, bytes)) = self.cache.get(self.id, offset) {
            visiting.pop();
            return Ok(PackObjRaw { obj_type, bytes });
        }

        let entry = self.pack_reader.read_entry_at(offset)?;
        let resolved = match entry {
            PackEntry::Whole(obj_type, bytes) => PackObjRaw { obj_type, bytes },
            PackEntry::OfsDelta { distance, delta } => {
                let base_offset = offset.checked_sub(distance).ok_or_else(|| {
                    BitError::corrupt("pack delta chain", "offset-delta base offset underflows")
                })?;
                let base = self.resolve_chain(base_offset, visiting, resolve_base)?;
                let parsed_delta = Delta::parse(&mut delta.as_slice(), delta.len() as u64)?;
                let expanded = parsed_delta.expand(&base.bytes)?;
                PackObjRaw { obj_type: base.obj_type, bytes: expanded }
            }
            PackEntry::RefDelta { base, delta } => {
                // the base may live in this pack (common: packs delta
                // against recently-added objects of their own), but it may
                // also sit in a different pack or the loose store, which
                // only the caller-supplied resolver can reach.
                let base_obj = match self.obj_offset(base) {
                    Ok(base_offset) => self.resolve_chain(base_offset, visiting, resolve_base)?,
                    Err(err) if err.is_not_found_err() => resolve_base(base)?,
                    Err(err) => return Err(err),
                };
                let parsed_delta = Delta::parse(&mut delta.as_slice(), delta.len() as u64)?;
                let expanded = parsed_delta.expand(&base_obj.bytes)?;
                PackObjRaw { obj_type: base_obj.obj_type, bytes: expanded }
            }
        };

        self.cache.insert(self.id, offset, resolved.obj_type, resolved.bytes.clone());
        visiting.pop();
        Ok(resolved)
    }

    pub fn read_obj_header(&mut self, oid: Oid) -> BitResult<(ObjType, u64)> {
        let offset = self.obj_offset(oid)?;
        self.read_obj_header_at(offset)
    }

    fn read_obj_header_at(&mut self, offset: u64) -> BitResult<(ObjType, u64)> {
        let header = self.pack_reader.read_header_at(offset)?;
        match header.obj_type {
            PackObjType::Commit | PackObjType::Tree | PackObjType::Blob | PackObjType::Tag =>
                Ok((header.obj_type.base_obj_type(), header.size)),
            PackObjType::OfsDelta => {
                let distance = self.pack_reader.reader.read_offset_delta_base()?;
                let base_offset = offset.checked_sub(distance).ok_or_else(|| {
                    BitError::corrupt("pack delta chain", "offset-delta base offset underflows")
                })?;
                let (obj_type, _) = self.read_obj_header_at(base_offset)?;
                Ok((obj_type, header.size))
            }
            PackObjType::RefDelta => {
                let base = self.pack_reader.reader.read_oid()?;
                let base_offset = self.obj_offset(base)?;
                let (obj_type, _) = self.read_obj_header_at(base_offset)?;
                Ok((obj_type, header.size))
            }
        }
    }
}
