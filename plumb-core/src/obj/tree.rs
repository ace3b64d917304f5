use crate::error::{BitError, BitResult};
use crate::io::BufReadExt;
use crate::obj::{ObjType, Oid, ParseMode};
use crate::serialize::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::{self, Debug, Display, Formatter};
use std::io::prelude::*;
use std::str::FromStr;

// 100644 normal
// 100755 executable
// 40000 directory
// 120000 symlink
// 160000 gitlink (submodule)
#[derive(Copy, PartialEq, Eq, Clone)]
pub struct FileMode(u32);

impl FileMode {
    pub const DIR: Self = Self(Self::IFDIR);
    pub const EXEC: Self = Self(Self::IFEXEC);
    pub const GITLINK: Self = Self(Self::IFGITLINK);
    pub const IFDIR: u32 = 0o40000;
    pub const IFEXEC: u32 = 0o100755;
    const IFFMT: u32 = 0o170000;
    pub const IFGITLINK: u32 = 0o160000;
    pub const IFLNK: u32 = 0o120000;
    pub const IFREG: u32 = 0o100644;
    pub const LINK: Self = Self(Self::IFLNK);
    pub const REG: Self = Self(Self::IFREG);

    pub const fn new(u: u32) -> Self {
        Self(u)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn infer_obj_type(self) -> Option<ObjType> {
        match self {
            Self::DIR => Some(ObjType::Tree),
            Self::EXEC | Self::REG | Self::LINK | Self::GITLINK => Some(ObjType::Blob),
            _ => None,
        }
    }

    pub fn is_type(self, mask: u32) -> bool {
        self.0 & Self::IFFMT == mask
    }

    pub fn is_dir(self) -> bool {
        self.is_type(Self::IFDIR)
    }

    fn is_recognised(self) -> bool {
        matches!(self, Self::DIR | Self::EXEC | Self::REG | Self::LINK | Self::GITLINK)
    }
}

impl Display for FileMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if f.alternate() { write!(f, "{:o}", self.0) } else { write!(f, "{:06o}", self.0) }
    }
}

impl Debug for FileMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for FileMode {
    type Err = crate::error::BitGenericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = u32::from_str_radix(s, 8)
            .map_err(|_| BitError::corrupt("tree entry mode", format!("`{}` is not octal", s)))?;
        Ok(Self(mode))
    }
}

#[derive(PartialEq, Debug, Default, Clone)]
pub struct Tree {
    pub entries: BTreeSet<TreeEntry>,
}

impl Display for Tree {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            for entry in &self.entries {
                write!(f, "{:#}", entry)?;
            }
        } else {
            for entry in &self.entries {
                writeln!(f, "{}", entry)?;
            }
        }
        Ok(())
    }
}

impl Serialize for Tree {
    fn serialize(&self, writer: &mut dyn Write) -> BitResult<()> {
        for entry in &self.entries {
            entry.serialize(writer)?;
        }
        Ok(())
    }
}

impl Tree {
    pub(crate) fn parse(reader: &mut impl BufRead, mode: ParseMode) -> BitResult<Self> {
        let mut tree = Self::default();
        let mut previous: Option<TreeEntry> = None;

        while !reader.is_at_eof()? {
            let entry = TreeEntry::parse(reader, mode)?;

            if mode == ParseMode::Strict {
                if !entry.mode.is_recognised() {
                    return Err(BitError::corrupt(
                        "tree entry",
                        format!("unrecognised file mode `{}`", entry.mode),
                    )
                    .into());
                }
                if let Some(prev) = &previous {
                    if prev.sort_path() >= entry.sort_path() {
                        return Err(BitError::corrupt(
                            "tree",
                            format!("entries out of order: `{}` after `{}`", entry.path, prev.path),
                        )
                        .into());
                    }
                }
            }

            previous = Some(entry.clone());
            tree.entries.insert(entry);
        }

        Ok(tree)
    }
}

#[derive(PartialEq, Debug, Clone, Eq)]
pub struct TreeEntry {
    pub mode: FileMode,
    pub path: String,
    pub hash: Oid,
}

impl PartialOrd for TreeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_path().cmp(&other.sort_path())
    }
}

impl TreeEntry {
    // files sort before directories with the same prefix, i.e. `index.rs` < `index/`.
    // the trailing slash is not actually stored in the entry's path; we append
    // one only for the purposes of comparison.
    fn sort_path(&self) -> String {
        if self.mode.is_dir() { format!("{}/", self.path) } else { self.path.clone() }
    }

    fn parse(reader: &mut impl BufRead, mode: ParseMode) -> BitResult<Self> {
        let file_mode: FileMode = reader.read_ascii_str(b' ', "tree entry mode")?;

        let mut name_buf = vec![];
        let n = reader.read_until(0x00, &mut name_buf)?;
        if n == 0 {
            return Err(BitError::Truncated("tree entry name").into());
        }
        let path = std::str::from_utf8(&name_buf[..n - 1])
            .map_err(|_| BitError::corrupt("tree entry name", "not valid utf8"))?
            .to_owned();
        if mode == ParseMode::Strict && (path.is_empty() || path.contains('/')) {
            return Err(BitError::corrupt("tree entry name", format!("`{}` is not a single path component", path)).into());
        }

        let mut hash_bytes = [0u8; 20];
        reader.read_exact(&mut hash_bytes).map_err(|_| BitError::Truncated("tree entry id"))?;
        let hash = Oid::from_bytes(hash_bytes);

        Ok(Self { mode: file_mode, path, hash })
    }
}

impl Display for TreeEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{:o} {}\0{}", self.mode.as_u32(), self.path, self.hash)
        } else {
            let kind = self.mode.infer_obj_type().map(|t| t.to_string()).unwrap_or_else(|| "?".to_owned());
            write!(f, "{} {} {}\t{}", self.mode, kind, self.hash, self.path)
        }
    }
}

impl Serialize for TreeEntry {
    fn serialize(&self, writer: &mut dyn Write) -> BitResult<()> {
        write!(writer, "{:#}", self.mode)?;
        writer.write_all(b" ")?;
        write!(writer, "{}", self.path)?;
        writer.write_all(b"\0")?;
        writer.write_all(self.hash.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(mode: FileMode, path: &str) -> TreeEntry {
        TreeEntry { mode, path: path.to_owned(), hash: Oid::from_bytes([0u8; 20]) }
    }

    #[test]
    fn directories_sort_after_files_with_the_same_prefix() {
        let file = entry(FileMode::REG, "index");
        let dir = entry(FileMode::DIR, "index");
        assert!(file < dir);
    }

    #[test]
    fn parse_then_serialize_round_trips() -> BitResult<()> {
        let original = {
            let mut tree = Tree::default();
            tree.entries.insert(entry(FileMode::REG, "README.md"));
            tree.entries.insert(entry(FileMode::DIR, "src"));
            tree
        };
        let mut bytes = vec![];
        original.serialize(&mut bytes)?;
        let parsed = Tree::parse(&mut bytes.as_slice(), ParseMode::Strict)?;
        assert_eq!(original, parsed);
        Ok(())
    }

    #[test]
    fn strict_mode_rejects_unrecognised_file_mode() {
        let mut bytes = vec![];
        entry(FileMode::new(0o100000), "weird").serialize(&mut bytes).unwrap();
        let err = Tree::parse(&mut bytes.as_slice(), ParseMode::Strict).unwrap_err();
        assert!(matches!(err.downcast_ref::<BitError>(), Some(BitError::Corrupt { .. })));
    }

    #[test]
    fn strict_mode_rejects_out_of_order_entries() {
        let mut bytes = vec![];
        entry(FileMode::REG, "b").serialize(&mut bytes).unwrap();
        entry(FileMode::REG, "a").serialize(&mut bytes).unwrap();
        let err = Tree::parse(&mut bytes.as_slice(), ParseMode::Strict).unwrap_err();
        assert!(matches!(err.downcast_ref::<BitError>(), Some(BitError::Corrupt { .. })));
    }

    #[test]
    fn lenient_mode_accepts_unrecognised_file_mode() {
        let mut bytes = vec![];
        entry(FileMode::new(0o100000), "weird").serialize(&mut bytes).unwrap();
        assert!(Tree::parse(&mut bytes.as_slice(), ParseMode::Lenient).is_ok());
    }
}
