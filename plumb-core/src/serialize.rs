use crate::error::BitResult;
use std::io::{prelude::*, BufReader};

pub trait Serialize {
    fn serialize(&self, writer: &mut dyn Write) -> BitResult<()>;
}

pub trait BufReadSeek: BufRead + Seek {}

impl<R: BufRead + Seek> BufReadSeek for R {}

/// `Deserialize` where the size to read is known up front. Kept separate
/// from [`Deserialize`] (rather than folded in as an optional parameter)
/// because the two are interpreted differently at different call sites: a
/// loose object's declared size covers its whole payload, while a pack
/// delta's declared size covers only the delta stream, not a trailing
/// base-offset or base-id that precedes it in the same entry.
pub trait DeserializeSized {
    fn deserialize_sized(reader: &mut impl BufRead, size: u64) -> BitResult<Self>
    where
        Self: Sized;

    fn deserialize_from_slice(slice: &[u8]) -> BitResult<Self>
    where
        Self: Sized,
    {
        Self::deserialize_sized_unbuffered(slice, slice.len() as u64)
    }

    fn deserialize_sized_unbuffered(reader: impl Read, size: u64) -> BitResult<Self>
    where
        Self: Sized,
    {
        Self::deserialize_sized(&mut BufReader::new(reader), size)
    }
}

pub trait Deserialize {
    fn deserialize(reader: &mut impl BufRead) -> BitResult<Self>
    where
        Self: Sized;

    fn deserialize_unbuffered(reader: impl Read) -> BitResult<Self>
    where
        Self: Sized,
    {
        Self::deserialize(&mut BufReader::new(reader))
    }
}

impl<D: Deserialize> DeserializeSized for D {
    fn deserialize_sized(reader: &mut impl BufRead, _size: u64) -> BitResult<Self>
    where
        Self: Sized,
    {
        Self::deserialize(reader)
    }
}
