use crate::error::{BitError, BitGenericError};
use crate::hash::SHA1Hash;
use rustc_hex::FromHex;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

pub type Oid = SHA1Hash;

/// Either a full 20-byte id or a hex prefix of one, as accepted from the
/// command line or an external revision resolver.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum BitId {
    Full(Oid),
    Partial(PartialOid),
}

impl BitId {
    pub fn into_oid(self) -> Oid {
        match self {
            Self::Full(oid) => oid,
            Self::Partial(..) => panic!("expected a full oid"),
        }
    }
}

impl From<PartialOid> for BitId {
    fn from(v: PartialOid) -> Self {
        Self::Partial(v)
    }
}

impl From<Oid> for BitId {
    fn from(hash: Oid) -> Self {
        Self::Full(hash)
    }
}

impl FromStr for BitId {
    type Err = BitGenericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 40 {
            Ok(Self::Full(Oid::from_str(s)?))
        } else if (4..40).contains(&s.len()) && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self::Partial(PartialOid::from_str(s)?))
        } else {
            Err(BitError::BadPrefix(s.to_owned()).into())
        }
    }
}

impl Oid {
    pub fn has_prefix(&self, prefix: PartialOid) -> bool {
        let n = prefix.len / 2;
        let oid_bytes = self.as_bytes();
        if oid_bytes[..n] != prefix.nibbles()[..n] {
            return false;
        }
        if prefix.len % 2 == 0 {
            return true;
        }
        // odd trailing nibble: compare only the high nibble of the next byte
        oid_bytes[n] & 0xf0 == prefix.nibbles()[n] & 0xf0
    }
}

/// A hex prefix of an [`Oid`], 4 to 39 characters long. Stored as a fixed
/// 40-byte stack buffer (rather than a heap `String`) since the longest
/// legal value is known at compile time and this type is copied freely
/// through lookup code.
#[derive(PartialEq, Eq, Debug, Hash, Clone, Ord, PartialOrd, Copy)]
pub struct PartialOid {
    bytes: [u8; 40],
    len: usize,
}

impl PartialOid {
    /// Zero-pads the missing low nibbles and decodes to a full 20-byte value,
    /// for locating the lower bound of a binary search.
    pub fn into_oid(&self) -> Oid {
        let mut padded = [b'0'; 40];
        padded[..self.len].copy_from_slice(&self.bytes[..self.len]);
        let padded_str = std::str::from_utf8(&padded).expect("validated ascii hex on construction");
        let bytes: Vec<u8> =
            padded_str.from_hex().expect("validated hex digits on construction");
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Oid::from_bytes(out)
    }

    fn nibbles(&self) -> [u8; 20] {
        *self.into_oid().as_bytes()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len]).expect("constructed from a &str")
    }

    /// Splits into the loose-store `(dir, file)` components, zero-padding the
    /// tail of a short prefix so callers can still list `objects/<dir>/` and
    /// filter entries by the (possibly partial) `file` prefix.
    pub fn split(&self) -> (String, String) {
        let s = self.as_str();
        (s[0..2].to_owned(), s[2..].to_owned())
    }
}

impl FromStr for PartialOid {
    type Err = BitGenericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !(4..40).contains(&s.len()) || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BitError::BadPrefix(s.to_owned()).into());
        }
        let mut bytes = [0u8; 40];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self { bytes, len: s.len() })
    }
}

impl Display for PartialOid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Display for BitId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BitId::Full(oid) => write!(f, "{}", oid),
            BitId::Partial(partial) => write!(f, "{}", partial),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_length_prefix_matches_exact_bytes() {
        let oid = Oid::from_str("e98b3d7be9979411127f93a1b9027c1eb5fe83b4").unwrap();
        let prefix: PartialOid = "e98b3d7b".parse().unwrap();
        assert!(oid.has_prefix(prefix));
        let wrong: PartialOid = "e98b3d7c".parse().unwrap();
        assert!(!oid.has_prefix(wrong));
    }

    #[test]
    fn odd_length_prefix_masks_trailing_nibble() {
        let oid = Oid::from_str("e98b3d7be9979411127f93a1b9027c1eb5fe83b4").unwrap();
        let prefix: PartialOid = "e98b3".parse().unwrap();
        assert!(oid.has_prefix(prefix));
        let wrong: PartialOid = "e98b4".parse().unwrap();
        assert!(!oid.has_prefix(wrong));
    }

    #[test]
    fn bit_id_from_str_dispatches_on_length() {
        assert!(matches!(
            BitId::from_str("e98b3d7be9979411127f93a1b9027c1eb5fe83b4").unwrap(),
            BitId::Full(..)
        ));
        assert!(matches!(BitId::from_str("e98b").unwrap(), BitId::Partial(..)));
        assert!(BitId::from_str("xyz").is_err());
        assert!(BitId::from_str("e9").is_err());
    }
}
