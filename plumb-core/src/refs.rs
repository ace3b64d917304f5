//! A minimal, read-only reference reader: resolves a ref name to the id it
//! points at by consulting loose `refs/**` files and `packed-refs`, chasing
//! at most one level of symbolic indirection (the `HEAD -> refs/heads/...`
//! case). No revision-expression grammar, no annotated-tag peeling, no
//! writing.

use crate::error::{BitError, BitResult};
use crate::obj::Oid;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

lazy_static! {
    /// a reference name is invalid if any of the following hold: a path
    /// component starts with `.`, it contains `..`, it contains any of
    /// `* : ? [ \ ^ ~ <space> <tab>`, it ends with `/` or `.lock`, or it
    /// contains `@{`.
    static ref INVALID_REF_REGEX: Regex =
        Regex::new(r#"^\.|/\.|\.\.|\*|:|\?|\[|\\|\^|~| |\t|/$|\.lock$|@\{"#).unwrap();
}

pub fn is_valid_name(s: &str) -> bool {
    !INVALID_REF_REGEX.is_match(s)
}

const SYMBOLIC_REF_PREFIX: &str = "ref: ";

/// What a ref file or `packed-refs` line directly contains, prior to any
/// indirection being chased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    Direct(Oid),
    Symbolic(String),
}

impl FromStr for RefTarget {
    type Err = BitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_end();
        if let Some(target) = s.strip_prefix(SYMBOLIC_REF_PREFIX) {
            return Ok(Self::Symbolic(target.trim().to_owned()));
        }
        s.parse::<Oid>().map(Self::Direct).map_err(|_| BitError::corrupt("ref file", format!("`{}` is neither an id nor a symbolic ref", s)))
    }
}

/// Reads `packed-refs` and loose `refs/**` files rooted at a `.git` (or
/// equivalent) directory.
pub struct RefDb {
    git_dir: PathBuf,
}

impl RefDb {
    pub fn open(git_dir: impl Into<PathBuf>) -> Self {
        Self { git_dir: git_dir.into() }
    }

    /// Reads the direct target of `name`, without chasing any indirection.
    /// `name` is a path relative to the git directory, e.g. `HEAD` or
    /// `refs/heads/master`.
    fn read_target(&self, name: &str) -> BitResult<Option<RefTarget>> {
        let loose_path = self.git_dir.join(name);
        if loose_path.is_file() {
            let contents = fs::read_to_string(&loose_path)
                .map_err(|e| BitError::io(loose_path.display().to_string(), e))?;
            return Ok(Some(contents.parse()?));
        }

        for (packed_name, oid) in self.read_packed_refs()? {
            if packed_name == name {
                return Ok(Some(RefTarget::Direct(oid)));
            }
        }

        Ok(None)
    }

    /// Resolves `name` to the id it (possibly indirectly, through exactly
    /// one level of symbolic indirection) points at.
    pub fn resolve(&self, name: &str) -> BitResult<Oid> {
        match self.read_target(name)?.ok_or_else(|| BitError::BadRepo { path: name.to_owned() })? {
            RefTarget::Direct(oid) => Ok(oid),
            RefTarget::Symbolic(target) => match self.read_target(&target)? {
                Some(RefTarget::Direct(oid)) => Ok(oid),
                Some(RefTarget::Symbolic(..)) =>
                    Err(BitError::corrupt("ref chain", format!("`{}` exceeds one level of indirection", name)).into()),
                None => Err(BitError::BadRepo { path: target }.into()),
            },
        }
    }

    /// All `(name, id)` pairs in `packed-refs`, skipping comment lines and
    /// the `^<id>` peeled-tag continuation lines this reader doesn't follow.
    fn read_packed_refs(&self) -> BitResult<Vec<(String, Oid)>> {
        let path = self.git_dir.join("packed-refs");
        if !path.is_file() {
            return Ok(vec![]);
        }
        let contents =
            fs::read_to_string(&path).map_err(|e| BitError::io(path.display().to_string(), e))?;

        let mut entries = vec![];
        for line in contents.lines() {
            if line.starts_with('#') || line.starts_with('^') || line.is_empty() {
                continue;
            }
            let (hex, name) = line
                .split_once(' ')
                .ok_or_else(|| BitError::corrupt("packed-refs", format!("`{}` has no name", line)))?;
            entries.push((name.to_owned(), hex.parse()?));
        }
        Ok(entries)
    }

    /// Every `(name, direct_id)` pair reachable without chasing indirection:
    /// every packed ref plus every loose file under `refs/`, loose taking
    /// precedence over a packed entry of the same name.
    pub fn all_direct_refs(&self) -> BitResult<BTreeMap<String, Oid>> {
        let mut refs = BTreeMap::new();
        for (name, oid) in self.read_packed_refs()? {
            refs.insert(name, oid);
        }

        let refs_dir = self.git_dir.join("refs");
        if refs_dir.is_dir() {
            for entry in walkdir::WalkDir::new(&refs_dir).into_iter().filter_map(Result::ok) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let name = entry
                    .path()
                    .strip_prefix(&self.git_dir)
                    .unwrap()
                    .to_str()
                    .ok_or_else(|| BitError::corrupt("refs", "non-utf8 ref path"))?
                    .replace(std::path::MAIN_SEPARATOR, "/");
                if let RefTarget::Direct(oid) = self.read_target(&name)?.unwrap() {
                    refs.insert(name, oid);
                }
            }
        }

        Ok(refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_name_validity() {
        assert!(is_valid_name("sometext"));
        assert!(!is_valid_name(".test"));
        assert!(!is_valid_name("test.."));
        assert!(!is_valid_name("tes t"));
        assert!(!is_valid_name("tes~y"));
        assert!(!is_valid_name("te*s"));
        assert!(!is_valid_name("file.lock"));
        assert!(!is_valid_name("file@{}"));
        assert!(!is_valid_name("caret^"));
        assert!(!is_valid_name("badendingslash/"));
        assert!(!is_valid_name("bads/.dot"));
    }

    #[test]
    fn resolves_loose_ref() -> BitResult<()> {
        let dir = tempfile::tempdir()?;
        let oid: Oid = "e98b3d7be9979411127f93a1b9027c1eb5fe83b4".parse()?;
        fs::create_dir_all(dir.path().join("refs/heads"))?;
        fs::write(dir.path().join("refs/heads/master"), format!("{}\n", oid))?;

        let db = RefDb::open(dir.path());
        assert_eq!(db.resolve("refs/heads/master")?, oid);
        Ok(())
    }

    #[test]
    fn resolves_head_through_one_level_of_indirection() -> BitResult<()> {
        let dir = tempfile::tempdir()?;
        let oid: Oid = "e98b3d7be9979411127f93a1b9027c1eb5fe83b4".parse()?;
        fs::create_dir_all(dir.path().join("refs/heads"))?;
        fs::write(dir.path().join("refs/heads/master"), format!("{}\n", oid))?;
        fs::write(dir.path().join("HEAD"), "ref: refs/heads/master\n")?;

        let db = RefDb::open(dir.path());
        assert_eq!(db.resolve("HEAD")?, oid);
        Ok(())
    }

    #[test]
    fn resolves_packed_ref() -> BitResult<()> {
        let dir = tempfile::tempdir()?;
        let oid: Oid = "e98b3d7be9979411127f93a1b9027c1eb5fe83b4".parse()?;
        fs::write(
            dir.path().join("packed-refs"),
            format!("# pack-refs with: peeled fully-peeled sorted\n{} refs/heads/master\n", oid),
        )?;

        let db = RefDb::open(dir.path());
        assert_eq!(db.resolve("refs/heads/master")?, oid);
        Ok(())
    }

    #[test]
    fn loose_ref_shadows_packed_ref_of_the_same_name() -> BitResult<()> {
        let dir = tempfile::tempdir()?;
        let packed_oid: Oid = "e98b3d7be9979411127f93a1b9027c1eb5fe83b4".parse()?;
        let loose_oid: Oid = "8e5c7a9c2f37f315375d26ae8148690f920d2b62".parse()?;
        fs::write(dir.path().join("packed-refs"), format!("{} refs/heads/master\n", packed_oid))?;
        fs::create_dir_all(dir.path().join("refs/heads"))?;
        fs::write(dir.path().join("refs/heads/master"), format!("{}\n", loose_oid))?;

        let db = RefDb::open(dir.path());
        assert_eq!(db.resolve("refs/heads/master")?, loose_oid);
        Ok(())
    }

    #[test]
    fn missing_ref_is_bad_repo() {
        let dir = tempfile::tempdir().unwrap();
        let db = RefDb::open(dir.path());
        assert!(db.resolve("refs/heads/nonexistent").is_err());
    }
}
