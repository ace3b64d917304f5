use super::*;
use crate::test_utils::{build_loose_object, build_pack, PackInput};

fn write_loose(objects_path: &Path, oid: Oid, compressed: &[u8]) {
    let hex = oid.to_hex();
    let dir = objects_path.join(&hex[..2]);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(&hex[2..]), compressed).unwrap();
}

#[test]
fn finds_a_loose_object_by_exact_id() -> BitResult<()> {
    let dir = tempfile::tempdir()?;
    let (oid, compressed) = build_loose_object(ObjType::Blob, b"hello");
    write_loose(dir.path(), oid, &compressed);

    let loose = LooseObjDb::new(dir.path());
    let raw = loose.find(oid)?.expect("object was written");
    assert_eq!(raw.obj_type, ObjType::Blob);
    assert_eq!(raw.bytes, b"hello");
    Ok(())
}

#[test]
fn missing_loose_object_is_none_not_an_error() -> BitResult<()> {
    let dir = tempfile::tempdir()?;
    let loose = LooseObjDb::new(dir.path());
    assert!(loose.find(Oid::from_bytes([0xaa; 20]))?.is_none());
    Ok(())
}

#[test]
fn loose_prefix_search_across_two_objects_with_shared_fanout_byte() -> BitResult<()> {
    let dir = tempfile::tempdir()?;
    let (oid_a, compressed_a) = build_loose_object(ObjType::Blob, b"a");
    let (oid_b, compressed_b) = build_loose_object(ObjType::Blob, b"bbbbbbbbbbbbbbb");
    write_loose(dir.path(), oid_a, &compressed_a);
    write_loose(dir.path(), oid_b, &compressed_b);

    let loose = LooseObjDb::new(dir.path());
    let matches = loose.find_by_prefix(oid_a.to_hex()[..6].parse()?)?;
    assert_eq!(matches, vec![oid_a]);
    Ok(())
}

#[test]
fn loose_all_ids_skips_non_fanout_directories() -> BitResult<()> {
    let dir = tempfile::tempdir()?;
    let (oid, compressed) = build_loose_object(ObjType::Blob, b"hello");
    write_loose(dir.path(), oid, &compressed);
    fs::create_dir_all(dir.path().join("info")).unwrap();
    fs::create_dir_all(dir.path().join("pack")).unwrap();

    let loose = LooseObjDb::new(dir.path());
    assert_eq!(loose.all_ids()?, vec![oid]);
    Ok(())
}

#[test]
fn missing_objects_directory_reports_empty_rather_than_erroring() -> BitResult<()> {
    let dir = tempfile::tempdir()?;
    let loose = LooseObjDb::new(dir.path().join("does-not-exist"));
    assert!(loose.all_ids()?.is_empty());
    assert!(loose.find_by_prefix("aabbcc".parse()?)?.is_empty());
    Ok(())
}

#[test]
fn combined_db_prefers_loose_over_packed_for_the_same_id() -> BitResult<()> {
    let dir = tempfile::tempdir()?;
    let objects_path = dir.path();
    let (oid, compressed) = build_loose_object(ObjType::Blob, b"loose wins");
    write_loose(objects_path, oid, &compressed);
    // no pack directory at all; packed tier should just come up empty
    let db = BitObjDb::new(objects_path)?;
    let raw = db.find(oid)?.expect("loose object is found");
    assert_eq!(raw.bytes, b"loose wins");
    Ok(())
}

#[test]
fn pack_with_no_matching_packfile_is_skipped_not_fatal() -> BitResult<()> {
    let dir = tempfile::tempdir()?;
    let pack_dir = dir.path().join("pack");
    fs::create_dir_all(&pack_dir).unwrap();
    fs::write(pack_dir.join("pack-orphan.idx"), b"not a real idx").unwrap();

    let packed = PackedObjDb::new(dir.path())?;
    assert!(packed.find(Oid::from_bytes([0u8; 20]), &|_| Ok(None))?.is_none());
    Ok(())
}

fn write_pack(pack_dir: &Path, stem: &str, pack: &[u8], idx: &[u8]) {
    fs::write(pack_dir.join(format!("{}.pack", stem)), pack).unwrap();
    fs::write(pack_dir.join(format!("{}.idx", stem)), idx).unwrap();
}

#[test]
fn ref_delta_base_in_a_different_pack_is_resolved() -> BitResult<()> {
    let dir = tempfile::tempdir()?;
    let pack_dir = dir.path().join("pack");
    fs::create_dir_all(&pack_dir).unwrap();

    let base = b"hello world".to_vec();
    let (pack_a, idx_a, oids_a, _) = build_pack(vec![PackInput::Whole(ObjType::Blob, base.clone())]);
    write_pack(&pack_dir, "pack-a", &pack_a, &idx_a);

    // delta that just copies the whole base back out unchanged
    let delta = vec![base.len() as u8, base.len() as u8, 0b1001_0001, 0, base.len() as u8];
    let (pack_b, idx_b, oids_b, _) =
        build_pack(vec![PackInput::RefDelta { base: oids_a[0], delta }]);
    write_pack(&pack_dir, "pack-b", &pack_b, &idx_b);

    let db = BitObjDb::new(dir.path())?;
    let raw = db.find(oids_b[0])?.expect("ref-delta in the other pack should resolve");
    assert_eq!(raw.obj_type, ObjType::Blob);
    assert_eq!(raw.bytes, base);
    Ok(())
}
