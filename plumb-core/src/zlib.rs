//! Streamed zlib inflation that reports how many compressed bytes were
//! consumed, so a caller positioned inside a larger stream (a pack file) can
//! find the byte offset the next entry starts at without a length prefix.

use crate::error::{BitError, BitResult};
use flate2::{Decompress, FlushDecompress, Status};
use std::io::BufRead;

/// Result of decoding one zlib-framed region embedded in a larger stream.
pub struct Inflated {
    pub bytes: Vec<u8>,
    /// number of compressed bytes consumed from the source
    pub compressed_len: u64,
}

/// Inflates a zlib stream positioned at `source`'s current read position,
/// stopping as soon as the zlib end-of-stream marker is seen. `expected_size`
/// is the declared uncompressed size from the surrounding framing; a mismatch
/// is `Corrupt`, not `Truncated`, since the stream did decode successfully.
pub fn inflate_embedded(
    mut source: impl BufRead,
    expected_size: u64,
    what: &'static str,
) -> BitResult<Inflated> {
    let mut decompress = Decompress::new(true);
    let mut out = vec![0u8; expected_size as usize];
    let mut written = 0usize;
    let mut scratch = [0u8; 4096];

    loop {
        let input = source.fill_buf().map_err(|e| BitError::io("<pack/loose stream>", e))?;
        if input.is_empty() {
            return Err(BitError::Truncated(what).into());
        }

        let before_in = decompress.total_in();
        let before_out = decompress.total_out();
        let status = if written < out.len() {
            decompress
                .decompress(input, &mut out[written..], FlushDecompress::None)
                .map_err(|e| BitError::corrupt(what, e.to_string()))?
        } else {
            // declared size already satisfied; any remaining input is the
            // zlib trailer (adler32), which doesn't produce output bytes.
            decompress
                .decompress(input, &mut scratch, FlushDecompress::None)
                .map_err(|e| BitError::corrupt(what, e.to_string()))?
        };
        let consumed_in = (decompress.total_in() - before_in) as usize;
        let consumed_out = (decompress.total_out() - before_out) as usize;
        source.consume(consumed_in);
        written += consumed_out;

        match status {
            Status::StreamEnd => break,
            Status::Ok | Status::BufError if consumed_in == 0 && consumed_out == 0 =>
                return Err(BitError::corrupt(what, "inflate made no progress")),
            Status::Ok | Status::BufError => continue,
        }
    }

    out.truncate(written.min(out.len()));
    if out.len() as u64 != expected_size {
        return Err(BitError::corrupt(
            what,
            format!("declared size {} does not match inflated size {}", expected_size, out.len()),
        )
        .into());
    }

    Ok(Inflated { bytes: out, compressed_len: decompress.total_in() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    fn zlib_compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn round_trips_exact_size() {
        let payload = b"blob 3\0abc";
        let compressed = zlib_compress(payload);
        let result = inflate_embedded(Cursor::new(compressed), payload.len() as u64, "test").unwrap();
        assert_eq!(result.bytes, payload);
    }

    #[test]
    fn size_mismatch_is_corrupt() {
        let payload = b"blob 3\0abc";
        let compressed = zlib_compress(payload);
        let err =
            inflate_embedded(Cursor::new(compressed), (payload.len() - 1) as u64, "test").unwrap_err();
        assert!(matches!(err.downcast_ref::<BitError>(), Some(BitError::Corrupt { .. })));
    }

    #[test]
    fn reports_consumed_compressed_length_for_back_to_back_streams() {
        let first = zlib_compress(b"hello");
        let second = zlib_compress(b"world!!");
        let mut combined = first.clone();
        combined.extend_from_slice(&second);

        let mut cursor = Cursor::new(combined);
        let r1 = inflate_embedded(&mut cursor, 5, "first").unwrap();
        assert_eq!(r1.bytes, b"hello");
        assert_eq!(r1.compressed_len, first.len() as u64);

        let r2 = inflate_embedded(&mut cursor, 7, "second").unwrap();
        assert_eq!(r2.bytes, b"world!!");
    }
}
