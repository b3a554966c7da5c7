use super::*;

fn crc_only(crc: u32) -> Hashes {
    Hashes {
        crc: Some(crc),
        ..Hashes::default()
    }
}

fn sha1_only(byte: u8) -> Hashes {
    Hashes {
        sha1: Some([byte; 20]),
        ..Hashes::default()
    }
}

#[test]
fn compare_no_common_algorithm() {
    let a = crc_only(0xdeadbeef);
    let b = sha1_only(7);
    assert_eq!(a.compare(&b), HashCompare::NoCommon);
    assert_eq!(b.compare(&a), HashCompare::NoCommon);
}

#[test]
fn compare_match_on_shared_subset() {
    let mut a = crc_only(0x12345678);
    a.sha1 = Some([1; 20]);
    let b = crc_only(0x12345678);
    assert_eq!(a.compare(&b), HashCompare::Match);
    assert_eq!(b.compare(&a), HashCompare::Match);
}

#[test]
fn compare_mismatch_wins_over_other_agreement() {
    let mut a = crc_only(0x12345678);
    a.sha1 = Some([1; 20]);
    let mut b = crc_only(0x12345678);
    b.sha1 = Some([2; 20]);
    assert_eq!(a.compare(&b), HashCompare::Mismatch);
    assert_eq!(b.compare(&a), HashCompare::Mismatch);
}

#[test]
fn compare_empty_sets() {
    let a = Hashes::new();
    let b = crc_only(1);
    assert_eq!(a.compare(&b), HashCompare::NoCommon);
    assert_eq!(a.compare(&Hashes::new()), HashCompare::NoCommon);
}

#[test]
fn crc_bytes_are_big_endian() {
    let h = crc_only(0x11223344);
    assert_eq!(h.bytes(HashKind::Crc).unwrap(), vec![0x11, 0x22, 0x33, 0x44]);
    assert_eq!(h.hex(HashKind::Crc).unwrap(), "11223344");
}

#[test]
fn hex_round_trip() {
    let mut h = Hashes::new();
    h.set_hex(HashKind::Crc, "ba58ed29").unwrap();
    h.set_hex(HashKind::Md5, "4187a797e33bc96a96993220da6f09f7").unwrap();
    h.set_hex(HashKind::Sha1, "56fe858d1035dce4b68520f457a0858bae7bb16d")
        .unwrap();

    assert_eq!(h.crc, Some(0xba58ed29));
    assert_eq!(h.hex(HashKind::Md5).unwrap(), "4187a797e33bc96a96993220da6f09f7");
    assert_eq!(
        h.hex(HashKind::Sha1).unwrap(),
        "56fe858d1035dce4b68520f457a0858bae7bb16d"
    );
    assert_eq!(
        h.kinds(),
        HashKind::Crc.bit() | HashKind::Md5.bit() | HashKind::Sha1.bit()
    );
}

#[test]
fn set_hex_rejects_bad_input() {
    let mut h = Hashes::new();
    assert!(h.set_hex(HashKind::Crc, "xyz").is_err());
    assert!(h.set_hex(HashKind::Crc, "112233").is_err());
    assert!(h.set_hex(HashKind::Sha1, "ba58ed29").is_err());
}

#[test]
fn hasher_matches_known_digests() {
    let mut hasher = Hasher::new();
    hasher.update(b"hello ");
    hasher.update(b"world");
    let h = hasher.finalize();

    // Digests of "hello world".
    assert_eq!(h.crc, Some(0x0d4a1185));
    assert_eq!(h.hex(HashKind::Md5).unwrap(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    assert_eq!(
        h.hex(HashKind::Sha1).unwrap(),
        "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
    );
}

#[test]
fn hash_reader_respects_limit() {
    let data = b"hello worldXXXX";
    let mut cursor = std::io::Cursor::new(&data[..]);
    let (n, h) = hash_reader(&mut cursor, Some(11)).unwrap();
    assert_eq!(n, 11);
    assert_eq!(h.crc, Some(0x0d4a1185));

    let mut cursor = std::io::Cursor::new(&data[..]);
    let (n, _) = hash_reader(&mut cursor, None).unwrap();
    assert_eq!(n, data.len() as u64);
}
