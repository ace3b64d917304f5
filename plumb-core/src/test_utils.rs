//! Test-only helpers: random string generation for quickcheck `Arbitrary`
//! impls, and in-process construction of loose objects / packfiles / pack
//! indices so tests never depend on checked-in binary fixtures.

use crate::hash::{crc_of, hash_bytes};
use crate::obj::{ObjType, Oid};
use rand::Rng;
use std::io::Write;

pub fn generate_random_string(range: std::ops::Range<usize>) -> String {
    let size = rand::thread_rng().gen_range(range);
    rand::thread_rng().sample_iter(&rand::distributions::Alphanumeric).take(size).map(char::from).collect()
}

/// A single-line variant of [`generate_sane_string_with_newlines`], for
/// fields (commit messages in quickcheck roundtrips, tag names) that don't
/// need to exercise the continuation-line parsing path.
pub fn generate_sane_string(range: std::ops::Range<usize>) -> String {
    generate_random_string(range)
}

// String::arbitrary is not so good sometimes as it doesn't generate printable strings
// not ideal as it doesn't generate '\n',' ','/' and other valid characters
// does some really arbitrary crap logic but should be fine
pub fn generate_sane_string_with_newlines(range: std::ops::Range<usize>) -> String {
    let mut newlines = rand::thread_rng().gen_range(0..10);
    let size = rand::thread_rng().gen_range(range);
    let mut s = String::new();

    loop {
        s.extend(
            rand::thread_rng().sample_iter(&rand::distributions::Alphanumeric).take(size / (newlines + 1)).map(char::from),
        );

        if newlines == 0 {
            break;
        }
        newlines -= 1;
        s.push('\n');
    }
    s
}

/// Deflates `payload` the way a loose object store would, returning the
/// compressed bytes alongside the id they hash to under the `"<kind> <len>\0"`
/// framing every object type shares.
pub fn build_loose_object(kind: ObjType, payload: &[u8]) -> (Oid, Vec<u8>) {
    let mut framed = format!("{} {}\0", kind, payload.len()).into_bytes();
    framed.extend_from_slice(payload);
    let oid = hash_bytes(&framed);

    let mut encoder = flate2::write::ZlibEncoder::new(vec![], flate2::Compression::default());
    encoder.write_all(&framed).unwrap();
    (oid, encoder.finish().unwrap())
}

/// One packed object ready to be laid out by [`build_pack`]: its type, its
/// uncompressed payload, and how it should be stored (as a whole object or
/// as an offset-delta against an earlier entry in the same pack).
pub enum PackInput {
    Whole(ObjType, Vec<u8>),
    OfsDelta { base_index: usize, delta: Vec<u8> },
    /// a delta keyed by the literal id of its base, which may live outside
    /// this pack entirely (see `build_pack`'s `RefDelta` arm)
    RefDelta { base: Oid, delta: Vec<u8> },
}

fn write_pack_obj_header(buf: &mut Vec<u8>, type_bits: u8, size: u64) {
    let mut byte = (type_bits << 4) | (size & 0xf) as u8;
    let mut rest = size >> 4;
    if rest > 0 {
        byte |= 0x80;
    }
    buf.push(byte);
    while rest > 0 {
        let mut next = (rest & 0x7f) as u8;
        rest >>= 7;
        if rest > 0 {
            next |= 0x80;
        }
        buf.push(next);
    }
}

fn write_ofs_delta_base(buf: &mut Vec<u8>, mut distance: u64) {
    // MSB-first 7-bit groups with the "minus one per additional byte" bias
    // used by offset-delta base-offset encoding.
    let mut groups = vec![(distance & 0x7f) as u8];
    distance >>= 7;
    while distance > 0 {
        distance -= 1;
        groups.push((distance & 0x7f) as u8 | 0x80);
        distance >>= 7;
    }
    groups.reverse();
    buf.extend_from_slice(&groups);
}

fn type_bits(kind: ObjType) -> u8 {
    match kind {
        ObjType::Commit => 1,
        ObjType::Tree => 2,
        ObjType::Blob => 3,
        ObjType::Tag => 4,
    }
}

/// Builds a minimal but valid v2 pack (`PACK` header, entries, trailing
/// checksum) plus the matching `.idx` bytes, returning `(pack, idx, oids,
/// entry_offsets)` in entry order so callers can locate delta entries
/// (whose placeholder oid isn't independently lookup-able) by offset.
pub fn build_pack(inputs: Vec<PackInput>) -> (Vec<u8>, Vec<u8>, Vec<Oid>, Vec<u64>) {
    let mut pack = Vec::new();
    pack.extend_from_slice(b"PACK");
    pack.extend_from_slice(&2u32.to_be_bytes());
    pack.extend_from_slice(&(inputs.len() as u32).to_be_bytes());

    let mut offsets = vec![];
    let mut oids = vec![];
    let mut crcs = vec![];

    for input in &inputs {
        let entry_offset = pack.len() as u64;
        offsets.push(entry_offset);

        match input {
            PackInput::Whole(kind, payload) => {
                write_pack_obj_header(&mut pack, type_bits(*kind), payload.len() as u64);
                let mut encoder = flate2::write::ZlibEncoder::new(vec![], flate2::Compression::default());
                encoder.write_all(payload).unwrap();
                let compressed = encoder.finish().unwrap();
                let entry_start = entry_offset as usize;
                pack.extend_from_slice(&compressed);
                crcs.push(crc_of(&pack[entry_start..]));

                let mut framed = format!("{} {}\0", kind, payload.len()).into_bytes();
                framed.extend_from_slice(payload);
                oids.push(hash_bytes(&framed));
            }
            PackInput::OfsDelta { base_index, delta } => {
                let base_offset = offsets[*base_index];
                write_pack_obj_header(&mut pack, 6, delta.len() as u64);
                let entry_start = pack.len();
                write_ofs_delta_base(&mut pack, entry_offset - base_offset);
                let mut encoder = flate2::write::ZlibEncoder::new(vec![], flate2::Compression::default());
                encoder.write_all(delta).unwrap();
                let compressed = encoder.finish().unwrap();
                pack.extend_from_slice(&compressed);
                crcs.push(crc_of(&pack[entry_start..]));

                // the real oid of a delta entry is whatever id its resolved
                // bytes hash to, which build_pack doesn't compute; callers
                // that need to address a delta entry do so by offset
                // (returned alongside), so this only needs to be distinct
                // per entry to keep the index well-formed.
                let mut placeholder = [0u8; 20];
                placeholder[..8].copy_from_slice(&entry_offset.to_be_bytes());
                oids.push(Oid::from_bytes(placeholder));
            }
            PackInput::RefDelta { base, delta } => {
                write_pack_obj_header(&mut pack, 7, delta.len() as u64);
                let entry_start = pack.len();
                pack.extend_from_slice(base.as_bytes());
                let mut encoder = flate2::write::ZlibEncoder::new(vec![], flate2::Compression::default());
                encoder.write_all(delta).unwrap();
                let compressed = encoder.finish().unwrap();
                pack.extend_from_slice(&compressed);
                crcs.push(crc_of(&pack[entry_start..]));

                let mut placeholder = [0u8; 20];
                placeholder[..8].copy_from_slice(&entry_offset.to_be_bytes());
                oids.push(Oid::from_bytes(placeholder));
            }
        }
    }

    let pack_hash = hash_bytes(&pack);
    pack.extend_from_slice(pack_hash.as_bytes());

    let idx = build_pack_index_with_crcs(&oids, &offsets, &crcs, pack_hash);
    (pack, idx, oids, offsets)
}

/// Builds v2 `.idx` bytes for `oids`, deriving each entry's `(crc, offset)`
/// from `f`. Used directly by index-reader tests that don't need a real
/// packfile alongside it; `pack_hash` should be the real trailing checksum
/// of whatever packfile (if any) these ids' offsets point into, since
/// `Pack::new` checks the two against each other on open.
pub fn build_pack_index(oids: &[Oid], pack_hash: Oid, f: impl Fn(usize) -> (u32, u64)) -> Vec<u8> {
    let mut sorted: Vec<(Oid, usize)> = oids.iter().copied().zip(0..).collect();
    sorted.sort_by_key(|(oid, _)| *oid);
    let crcs_offsets: Vec<(u32, u64)> = sorted.iter().map(|(_, i)| f(*i)).collect();
    let sorted_oids: Vec<Oid> = sorted.iter().map(|(oid, _)| *oid).collect();
    let offsets: Vec<u64> = crcs_offsets.iter().map(|(_, o)| *o).collect();
    let crcs: Vec<u32> = crcs_offsets.iter().map(|(c, _)| *c).collect();
    build_pack_index_with_crcs(&sorted_oids, &offsets, &crcs, pack_hash)
}

fn build_pack_index_with_crcs(oids: &[Oid], offsets: &[u64], crcs: &[u32], pack_hash: Oid) -> Vec<u8> {
    let mut entries: Vec<(Oid, u32, u64)> =
        oids.iter().copied().zip(crcs.iter().copied()).zip(offsets.iter().copied()).map(|((o, c), off)| (o, c, off)).collect();
    entries.sort_by_key(|(oid, ..)| *oid);

    let mut idx = Vec::new();
    idx.extend_from_slice(&0xff744f63u32.to_be_bytes());
    idx.extend_from_slice(&2u32.to_be_bytes());

    let mut fanout = [0u32; 256];
    for (oid, ..) in &entries {
        fanout[oid.as_bytes()[0] as usize] += 1;
    }
    let mut cumulative = 0u32;
    for slot in &mut fanout {
        cumulative += *slot;
        *slot = cumulative;
    }
    for count in fanout {
        idx.extend_from_slice(&count.to_be_bytes());
    }

    for (oid, ..) in &entries {
        idx.extend_from_slice(oid.as_bytes());
    }
    for (_, crc, _) in &entries {
        idx.extend_from_slice(&crc.to_be_bytes());
    }

    let mut ext_offsets = vec![];
    for (_, _, offset) in &entries {
        if *offset > 0x7fff_ffff {
            let ext_index = ext_offsets.len() as u32;
            ext_offsets.push(*offset);
            idx.extend_from_slice(&(ext_index | 0x8000_0000).to_be_bytes());
        } else {
            idx.extend_from_slice(&(*offset as u32).to_be_bytes());
        }
    }
    for offset in ext_offsets {
        idx.extend_from_slice(&offset.to_be_bytes());
    }

    idx.extend_from_slice(pack_hash.as_bytes());
    let idx_hash = hash_bytes(&idx);
    idx.extend_from_slice(idx_hash.as_bytes());
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loose_object_round_trips_through_inflate() {
        let (oid, compressed) = build_loose_object(ObjType::Blob, b"hello world");
        let mut decoder = flate2::bufread::ZlibDecoder::new(compressed.as_slice());
        let mut out = vec![];
        std::io::Read::read_to_end(&mut decoder, &mut out).unwrap();
        assert_eq!(out, b"blob 11\0hello world");
        assert_eq!(oid.to_hex().len(), 40);
    }

    #[test]
    fn build_pack_produces_valid_header_and_trailer() {
        let (pack, _idx, oids, offsets) = build_pack(vec![PackInput::Whole(ObjType::Blob, b"abc".to_vec())]);
        assert_eq!(&pack[0..4], b"PACK");
        assert_eq!(oids.len(), 1);
        assert_eq!(offsets, vec![12]);
    }
}
