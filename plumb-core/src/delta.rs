use crate::error::{BitError, BitResult};
use crate::io::{BufReadExt, ReadExt};
use log::trace;
use std::io::{BufRead, Read};

/// A reconstructed-payload delta: a base size, a target size, and a sequence
/// of copy/insert instructions that rebuild the target from a base buffer of
/// exactly `source_size` bytes.
#[derive(PartialEq, Clone, Debug)]
pub struct Delta {
    source_size: u64,
    target_size: u64,
    ops: Vec<DeltaOp>,
}

impl Delta {
    pub(crate) fn parse(reader: &mut impl BufRead, size: u64) -> BitResult<Self> {
        let source_size = reader.read_le_varint()?;
        let target_size = reader.read_le_varint()?;
        trace!("Delta::parse(size: {}); source_size: {}; target_size: {}", size, source_size, target_size);

        let mut limited = reader.take(size);
        let mut ops = vec![];
        while !limited.is_at_eof()? {
            ops.push(DeltaOp::parse(&mut limited)?);
        }

        Ok(Self { source_size, target_size, ops })
    }

    /// Applies every instruction in order against `bytes`, which must be
    /// exactly `source_size` long.
    pub fn expand(&self, bytes: impl AsRef<[u8]>) -> BitResult<Vec<u8>> {
        let bytes = bytes.as_ref();
        if bytes.len() as u64 != self.source_size {
            return Err(BitError::corrupt(
                "delta",
                format!("expected base of size {}, got {}", self.source_size, bytes.len()),
            )
            .into());
        }

        let mut expanded = Vec::with_capacity(self.target_size as usize);
        for op in &self.ops {
            match op {
                &DeltaOp::Copy(offset, size) => {
                    let (offset, size) = (offset as usize, size as usize);
                    let end = offset.checked_add(size).filter(|&end| end <= bytes.len()).ok_or_else(
                        || BitError::corrupt("delta", format!("copy op ({}, {}) exceeds base", offset, size)),
                    )?;
                    expanded.extend_from_slice(&bytes[offset..end]);
                }
                DeltaOp::Insert(slice) => expanded.extend_from_slice(slice),
            }
        }

        if expanded.len() as u64 != self.target_size {
            return Err(BitError::corrupt(
                "delta",
                format!("expected target of size {}, got {}", self.target_size, expanded.len()),
            )
            .into());
        }

        Ok(expanded)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DeltaOp {
    /// copy (offset, size)
    Copy(u64, u64),
    Insert(Vec<u8>),
}

impl DeltaOp {
    fn parse(reader: &mut impl BufRead) -> BitResult<Self> {
        // the MSB of the first byte tells us whether this is a copy or an insert
        let byte = reader.read_u8()?;
        if byte & 0x80 != 0 {
            let n = reader.read_le_packed(byte)?;
            let (offset, mut size) = (n & 0xFFFFFFFF, n >> 32);
            // an omitted size field means the maximal 0x10000 (64 KiB), not 0
            if size == 0 {
                size = 0x10000;
            }
            Ok(Self::Copy(offset, size))
        } else {
            let n = (byte & 0x7f) as usize;
            if n == 0 {
                return Err(BitError::corrupt("delta insert op", "zero-length insert is malformed").into());
            }
            let mut buf = vec![0u8; n];
            reader.read_exact(&mut buf).map_err(|_| BitError::Truncated("delta insert op"))?;
            Ok(Self::Insert(buf))
        }
    }
}

#[cfg(test)]
mod tests;
