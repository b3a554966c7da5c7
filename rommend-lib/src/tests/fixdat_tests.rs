use super::*;

use rommend_core::checksum::Hashes;

fn missing_rom(name: &str, size: u64, crc: u32) -> FileDesc {
    FileDesc {
        name: name.to_string(),
        size: Some(size),
        hashes: Hashes {
            crc: Some(crc),
            ..Hashes::default()
        },
        ..FileDesc::default()
    }
}

#[test]
fn writes_missing_roms_as_logiqx_xml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fix.dat");

    let mut fixdat = Fixdat::new(&path, "Fixdat by rommend");
    fixdat.record("pacman", vec![missing_rom("pm1.6e", 4096, 0xc1e6ab10)]);
    fixdat.write().unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("<?xml"));
    assert!(text.contains("<datafile>"));
    assert!(text.contains("<name>Fixdat</name>"));
    assert!(text.contains(r#"<game name="pacman">"#));
    assert!(text.contains(r#"name="pm1.6e""#));
    assert!(text.contains(r#"size="4096""#));
    assert!(text.contains(r#"crc="c1e6ab10""#));
}

#[test]
fn rerecording_replaces_and_empty_removes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fix.dat");

    let mut fixdat = Fixdat::new(&path, "d");
    fixdat.record("g", vec![missing_rom("a.bin", 1, 1)]);
    assert!(!fixdat.is_empty());

    // The second pass found the file: the game drops out.
    fixdat.record("g", Vec::new());
    assert!(fixdat.is_empty());

    fixdat.write().unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(!text.contains("<game"));
}

#[test]
fn games_are_sorted_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fix.dat");

    let mut fixdat = Fixdat::new(&path, "d");
    fixdat.record("zaxxon", vec![missing_rom("z.bin", 1, 1)]);
    fixdat.record("asteroid", vec![missing_rom("a.bin", 1, 2)]);
    fixdat.write().unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let z = text.find("zaxxon").unwrap();
    let a = text.find("asteroid").unwrap();
    assert!(a < z);
}
