//! The read-only repository facade: resolves a filesystem path to a `.git`
//! directory, lazily builds the combined object store and the supplementary
//! ref reader the first time either is needed, and exposes the handful of
//! operations everything else in this crate is built to serve.

use crate::cache::DEFAULT_CAPACITY_BYTES;
use crate::error::{BitError, BitResult};
use crate::obj::{hash_of, BitId, Object, ObjType, Oid, ParseMode, PartialOid};
use crate::odb::BitObjDb;
use crate::pack::DEFAULT_MAX_DELTA_DEPTH;
use crate::refs::RefDb;
use once_cell::sync::OnceCell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const OBJECTS_DIR: &str = "objects";

/// A repository handle. Cheap to construct (`open` does no I/O beyond the
/// upward directory search); the object store and ref reader are built on
/// first use and cached for the handle's lifetime.
pub struct Repo {
    git_dir: PathBuf,
    max_delta_depth: usize,
    cache_capacity_bytes: u64,
    odb: OnceCell<BitObjDb>,
    refs: OnceCell<RefDb>,
}

impl Repo {
    pub fn open(path: impl AsRef<Path>) -> BitResult<Self> {
        Self::open_with(path, DEFAULT_MAX_DELTA_DEPTH, DEFAULT_CAPACITY_BYTES)
    }

    /// Like `open`, but overrides the pack reader's delta-chain depth limit
    /// and object cache size instead of taking the crate defaults.
    pub fn open_with(path: impl AsRef<Path>, max_delta_depth: usize, cache_capacity_bytes: u64) -> BitResult<Self> {
        let path = path.as_ref();
        let canonical =
            path.canonicalize().map_err(|err| BitError::io(path.display().to_string(), err))?;
        let git_dir = Self::find_git_dir(&canonical)?;
        Ok(Self {
            git_dir,
            max_delta_depth,
            cache_capacity_bytes,
            odb: OnceCell::new(),
            refs: OnceCell::new(),
        })
    }

    /// `path` qualifies either because it is itself the directory holding
    /// `HEAD`/`objects`/etc, or because one of its children is named
    /// `.git` and holds them; otherwise the search continues at the parent.
    fn find_git_dir(path: &Path) -> BitResult<PathBuf> {
        if path.join("HEAD").is_file() && path.join(OBJECTS_DIR).is_dir() {
            return Ok(path.to_path_buf());
        }
        let candidate = path.join(".git");
        if candidate.is_dir() {
            return Ok(candidate);
        }
        match path.parent() {
            Some(parent) => Self::find_git_dir(parent),
            None => Err(BitError::BadRepo { path: path.display().to_string() }.into()),
        }
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn odb(&self) -> BitResult<&BitObjDb> {
        self.odb.get_or_try_init(|| {
            BitObjDb::new_with(self.git_dir.join(OBJECTS_DIR), self.max_delta_depth, self.cache_capacity_bytes)
        })
    }

    /// The supplementary, read-only reference reader (see `crate::refs`).
    pub fn refs(&self) -> &RefDb {
        self.refs.get_or_init(|| RefDb::open(&self.git_dir))
    }

    pub fn object_from_id(&self, oid: Oid) -> BitResult<Object> {
        let raw = self.odb()?.find(oid)?.ok_or_else(|| BitError::ObjectNotFound(oid.into()))?;
        if hash_of(raw.obj_type, &raw.bytes) != oid {
            return Err(BitError::corrupt("object", "stored content does not hash to the requested id").into());
        }
        Object::parse(raw.obj_type, &raw.bytes, ParseMode::Strict)
    }

    pub fn object_from_prefix(&self, prefix: PartialOid) -> BitResult<Object> {
        let matches = self.odb()?.find_by_prefix(prefix)?;
        match matches.as_slice() {
            [] => Err(BitError::ObjectNotFound(prefix.into()).into()),
            [oid] => self.object_from_id(*oid),
            _ => Err(BitError::AmbiguousPrefix(prefix, matches).into()),
        }
    }

    pub fn object_from_bit_id(&self, id: BitId) -> BitResult<Object> {
        match id {
            BitId::Full(oid) => self.object_from_id(oid),
            BitId::Partial(prefix) => self.object_from_prefix(prefix),
        }
    }

    /// The type and declared size of an object without parsing its payload,
    /// used by `cat-file -t`/`-s`-style diagnostics that don't need the
    /// fully parsed value.
    pub fn header_from_id(&self, oid: Oid) -> BitResult<(ObjType, u64)> {
        let raw = self.odb()?.find(oid)?.ok_or_else(|| BitError::ObjectNotFound(oid.into()))?;
        Ok((raw.obj_type, raw.bytes.len() as u64))
    }

    pub fn list_all_ids(&self) -> BitResult<BTreeSet<Oid>> {
        self.odb()?.all_ids()
    }
}
