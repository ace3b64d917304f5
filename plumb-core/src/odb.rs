//! The two storage tiers a repository's objects live in: a loose store
//! (one zlib-framed file per object under `objects/<xx>/<38-hex>`) and a
//! packed store (any number of `pack-<hex>.{pack,idx}` pairs under
//! `objects/pack/`). `BitObjDb` combines both behind the lookup order
//! `crate::repo` relies on: loose first, since it's cheaper to check,
//! packs afterward.

use crate::cache::DEFAULT_CAPACITY_BYTES;
use crate::error::{BitError, BitResult, BitResultExt};
use crate::obj::{read_obj_header, ObjType, Oid, PartialOid};
use crate::pack::{Pack, PackObjRaw, DEFAULT_MAX_DELTA_DEPTH, PACK_EXT, PACK_IDX_EXT};
use flate2::bufread::ZlibDecoder;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// One object read out of either tier, not yet parsed into a structured
/// [`crate::obj::Object`].
pub struct RawObj {
    pub obj_type: ObjType,
    pub bytes: Vec<u8>,
}

pub struct LooseObjDb {
    objects_path: PathBuf,
}

impl LooseObjDb {
    pub fn new(objects_path: impl Into<PathBuf>) -> Self {
        Self { objects_path: objects_path.into() }
    }

    fn path_for(&self, oid: Oid) -> PathBuf {
        let hex = oid.to_hex();
        self.objects_path.join(&hex[..2]).join(&hex[2..])
    }

    pub fn find(&self, oid: Oid) -> BitResult<Option<RawObj>> {
        let path = self.path_for(oid);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(BitError::io(path.display().to_string(), err).into()),
        };

        let mut decoder = ZlibDecoder::new(BufReader::new(file));
        let mut framed = vec![];
        decoder.read_to_end(&mut framed).map_err(|err| BitError::io(path.display().to_string(), err))?;

        let mut cursor = framed.as_slice();
        let header = read_obj_header(&mut cursor)?;
        if cursor.len() as u64 != header.size {
            return Err(BitError::corrupt("loose object", "declared size does not match payload length").into());
        }
        Ok(Some(RawObj { obj_type: header.obj_type, bytes: cursor.to_vec() }))
    }

    pub fn find_by_prefix(&self, prefix: PartialOid) -> BitResult<Vec<Oid>> {
        let (dir, file_prefix) = prefix.split();
        let dir_path = self.objects_path.join(&dir);
        let entries = match fs::read_dir(&dir_path) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(BitError::io(dir_path.display().to_string(), err).into()),
        };

        let mut matches = vec![];
        for entry in entries {
            let entry = entry.map_err(|err| BitError::io(dir_path.display().to_string(), err))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&file_prefix) {
                matches.push(format!("{}{}", dir, name).parse()?);
            }
        }
        Ok(matches)
    }

    /// All loose ids, found by walking `objects/<xx>/` and skipping the
    /// `info`/`pack` siblings that aren't fanout directories.
    pub fn all_ids(&self) -> BitResult<Vec<Oid>> {
        let mut ids = vec![];
        let entries = match fs::read_dir(&self.objects_path) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(err) => return Err(BitError::io(self.objects_path.display().to_string(), err).into()),
        };

        for entry in entries {
            let entry = entry.map_err(|err| BitError::io(self.objects_path.display().to_string(), err))?;
            let Ok(file_type) = entry.file_type() else { continue };
            if !file_type.is_dir() {
                continue;
            }
            let dir_name = entry.file_name();
            let Some(dir_name) = dir_name.to_str() else { continue };
            if dir_name.len() != 2 {
                continue;
            }

            for file in fs::read_dir(entry.path()).map_err(|err| BitError::io(entry.path().display().to_string(), err))? {
                let file = file.map_err(|err| BitError::io(entry.path().display().to_string(), err))?;
                if let Some(name) = file.file_name().to_str() {
                    if let Ok(oid) = format!("{}{}", dir_name, name).parse() {
                        ids.push(oid);
                    }
                }
            }
        }
        Ok(ids)
    }
}

/// The packed tier: every `pack-<hex>.{idx,pack}` pair found under
/// `objects/pack/` at construction time, each guarded by its own lock so a
/// read against one pack doesn't block a concurrent read against another.
pub struct PackedObjDb {
    packs: Vec<Mutex<Pack>>,
}

impl PackedObjDb {
    pub fn new(objects_path: &Path) -> BitResult<Self> {
        Self::new_with(objects_path, DEFAULT_MAX_DELTA_DEPTH, DEFAULT_CAPACITY_BYTES)
    }

    pub fn new_with(objects_path: &Path, max_delta_depth: usize, cache_capacity_bytes: u64) -> BitResult<Self> {
        let pack_dir = objects_path.join("pack");
        let entries = match fs::read_dir(&pack_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self { packs: vec![] }),
            Err(err) => return Err(BitError::io(pack_dir.display().to_string(), err).into()),
        };

        let mut idx_paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some(PACK_IDX_EXT))
            .collect();
        // stable order for the handle's lifetime, per the concurrency model
        idx_paths.sort();

        let mut packs = vec![];
        for (id, idx_path) in idx_paths.into_iter().enumerate() {
            let pack_path = idx_path.with_extension(PACK_EXT);
            if !pack_path.is_file() {
                log::warn!("pack index `{}` has no matching packfile, skipping", idx_path.display());
                continue;
            }
            match Pack::new_with(id as u32, &pack_path, &idx_path, max_delta_depth, cache_capacity_bytes) {
                Ok(pack) => packs.push(Mutex::new(pack)),
                Err(err) => log::warn!("disqualifying pack `{}`: {}", pack_path.display(), err),
            }
        }
        Ok(Self { packs })
    }

    /// Looks `oid` up across every pack. A reference-delta whose base isn't
    /// in the pack holding it is resolved by searching the other packs
    /// (skipping whichever ones are already being read further up this same
    /// call, to avoid re-locking a pack against itself) and finally
    /// `loose_fallback`, matching the lookup order of a top-level `find`.
    pub fn find(&self, oid: Oid, loose_fallback: &dyn Fn(Oid) -> BitResult<Option<RawObj>>) -> BitResult<Option<RawObj>> {
        self.find_excluding(oid, &[], loose_fallback)
    }

    fn find_excluding(
        &self,
        oid: Oid,
        locked: &[usize],
        loose_fallback: &dyn Fn(Oid) -> BitResult<Option<RawObj>>,
    ) -> BitResult<Option<RawObj>> {
        for (i, entry) in self.packs.iter().enumerate() {
            if locked.contains(&i) {
                continue;
            }
            let mut next_locked = locked.to_vec();
            next_locked.push(i);
            let resolve_base = |base: Oid| -> BitResult<PackObjRaw> {
                if let Some(raw) = self.find_excluding(base, &next_locked, loose_fallback)? {
                    return Ok(PackObjRaw { obj_type: raw.obj_type, bytes: raw.bytes });
                }
                loose_fallback(base)?
                    .map(|raw| PackObjRaw { obj_type: raw.obj_type, bytes: raw.bytes })
                    .ok_or_else(|| BitError::ObjectNotFound(base.into()).into())
            };

            let mut pack = entry.lock();
            match pack.read_obj_raw_with(oid, &resolve_base) {
                Ok(raw) => return Ok(Some(RawObj { obj_type: raw.obj_type, bytes: raw.bytes })),
                Err(err) if err.is_not_found_err() => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }

    pub fn find_by_prefix(&self, prefix: PartialOid) -> BitResult<Vec<Oid>> {
        let mut matches = vec![];
        for pack in &self.packs {
            matches.extend(pack.lock().prefix_matches(prefix)?);
        }
        Ok(matches)
    }

    pub fn all_ids(&self) -> BitResult<Vec<Oid>> {
        let mut ids = vec![];
        for pack in &self.packs {
            ids.extend(pack.lock().all_oids()?);
        }
        Ok(ids)
    }
}

/// Combines the loose and packed tiers behind the lookup order the
/// repository facade relies on: loose is consulted first within a single
/// call, packs afterward in construction order.
pub struct BitObjDb {
    loose: LooseObjDb,
    packed: PackedObjDb,
}

impl BitObjDb {
    pub fn new(objects_path: impl Into<PathBuf>) -> BitResult<Self> {
        Self::new_with(objects_path, DEFAULT_MAX_DELTA_DEPTH, DEFAULT_CAPACITY_BYTES)
    }

    pub fn new_with(
        objects_path: impl Into<PathBuf>,
        max_delta_depth: usize,
        cache_capacity_bytes: u64,
    ) -> BitResult<Self> {
        let objects_path = objects_path.into();
        let packed = PackedObjDb::new_with(&objects_path, max_delta_depth, cache_capacity_bytes)?;
        Ok(Self { loose: LooseObjDb::new(objects_path), packed })
    }

    pub fn find(&self, oid: Oid) -> BitResult<Option<RawObj>> {
        if let Some(raw) = self.loose.find(oid)? {
            return Ok(Some(raw));
        }
        self.packed.find(oid, &|id| self.loose.find(id))
    }

    /// Aggregates matches from both tiers; callers decide whether the total
    /// count constitutes `NotFound`/unique/`Ambiguous`.
    pub fn find_by_prefix(&self, prefix: PartialOid) -> BitResult<Vec<Oid>> {
        let mut matches = self.loose.find_by_prefix(prefix)?;
        matches.extend(self.packed.find_by_prefix(prefix)?);
        matches.sort();
        matches.dedup();
        Ok(matches)
    }

    pub fn all_ids(&self) -> BitResult<std::collections::BTreeSet<Oid>> {
        let mut ids: std::collections::BTreeSet<Oid> = self.loose.all_ids()?.into_iter().collect();
        ids.extend(self.packed.all_ids()?);
        Ok(ids)
    }
}

#[cfg(test)]
mod tests;
