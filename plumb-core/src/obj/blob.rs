use crate::error::BitResult;
use crate::io::ReadExt;
use crate::serialize::Serialize;
use std::fmt::{self, Display, Formatter};
use std::io::prelude::*;

/// An opaque byte payload, stored verbatim.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Blob {
    bytes: Vec<u8>,
}

impl Display for Blob {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.bytes) {
            Ok(utf8) => write!(f, "{}", utf8),
            Err(..) => write!(f, "<binary>"),
        }
    }
}

impl Blob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn parse(reader: &mut impl BufRead) -> BitResult<Self> {
        Ok(Self::new(reader.read_to_vec()?))
    }
}

impl Serialize for Blob {
    fn serialize(&self, writer: &mut dyn Write) -> BitResult<()> {
        writer.write_all(&self.bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_raw_bytes() {
        let mut out = vec![];
        Blob::new(b"abc".to_vec()).serialize(&mut out).unwrap();
        assert_eq!(out, b"abc");
    }
}
