use super::*;

#[test]
fn parse_delta_insert_op() -> BitResult<()> {
    let op = DeltaOp::parse(&mut &[0x3, 0xa, 0xb, 0xc][..])?;
    assert_eq!(op, DeltaOp::Insert(vec![0xa, 0xb, 0xc]));
    Ok(())
}

#[test]
fn parse_delta_copy_op() -> BitResult<()> {
    let op = DeltaOp::parse(&mut &[0b11111111, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd][..])?;
    // little endian encoding
    assert_eq!(op, DeltaOp::Copy(0x67452301, 0xcdab89));
    Ok(())
}

#[test]
fn parse_delta_zero_size_means_0x10000() -> BitResult<()> {
    let op = DeltaOp::parse(&mut &[0x80][..])?;
    assert_eq!(op, DeltaOp::Copy(0, 0x10000));
    Ok(())
}

#[test]
fn rejects_zero_length_insert() {
    let err = DeltaOp::parse(&mut &[0x00][..]).unwrap_err();
    assert!(matches!(err.downcast_ref::<BitError>(), Some(BitError::Corrupt { .. })));
}

#[test]
fn expand_applies_copy_and_insert_in_order() -> BitResult<()> {
    let base = b"the quick brown fox";
    let delta = Delta {
        source_size: base.len() as u64,
        target_size: 14,
        ops: vec![DeltaOp::Copy(4, 5), DeltaOp::Insert(b" lazy ".to_vec()), DeltaOp::Copy(16, 3)],
    };
    assert_eq!(delta.expand(base)?, b"quick lazy fox");
    Ok(())
}

#[test]
fn expand_rejects_mismatched_source_size() {
    let delta = Delta { source_size: 100, target_size: 0, ops: vec![] };
    assert!(delta.expand(b"too short").is_err());
}

#[test]
fn expand_rejects_out_of_bounds_copy() {
    let delta = Delta { source_size: 4, target_size: 10, ops: vec![DeltaOp::Copy(0, 10)] };
    assert!(delta.expand(b"abcd").is_err());
}
