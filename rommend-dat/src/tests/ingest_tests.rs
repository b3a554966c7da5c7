use super::*;
use rommend_core::file::Where;
use rommend_db::RomDb;

fn ingest_text(text: &str) -> (RomDb, Result<IngestStats, DatError>) {
    let mut db = RomDb::open_memory().unwrap();
    let result = ingest(&mut db, text.as_bytes(), 0);
    (db, result)
}

const FAMILY: &str = r#"emulator (
	name mame
	version 0.1
)

game (
	name parent
	rom ( name base.bin size 1024 crc aabbccdd )
	rom ( name own.bin size 512 crc 11111111 )
)

game (
	name child
	romof parent
	rom ( name base.bin merge base.bin size 1024 crc aabbccdd )
	rom ( name delta.bin size 256 crc 22222222 )
)
"#;

#[test]
fn family_links_resolve_in_order() {
    let (db, result) = ingest_text(FAMILY);
    let stats = result.unwrap();
    assert_eq!(stats.games, 2);

    let parent = db.read_game("parent").unwrap().unwrap();
    assert_eq!(parent.role(Role::Rom).clones, vec!["child".to_string()]);

    let child = db.read_game("child").unwrap().unwrap();
    assert_eq!(child.role(Role::Rom).parent.as_deref(), Some("parent"));
    assert_eq!(child.roms()[0].where_, Where::InParent);
    assert_eq!(child.roms()[1].where_, Where::InZip);
}

#[test]
fn forward_reference_resolves_after_stream() {
    // Clone arrives before its parent.
    let text = r#"game (
	name child
	romof parent
	rom ( name base.bin merge base.bin size 1024 crc aabbccdd )
)

game (
	name parent
	rom ( name base.bin size 1024 crc aabbccdd )
)
"#;
    let (db, result) = ingest_text(text);
    let stats = result.unwrap();
    assert_eq!(stats.deferred, 1);

    assert_eq!(
        db.read_game_list().unwrap(),
        vec!["child".to_string(), "parent".to_string()]
    );
    let parent = db.read_game("parent").unwrap().unwrap();
    assert_eq!(parent.role(Role::Rom).clones, vec!["child".to_string()]);
    let child = db.read_game("child").unwrap().unwrap();
    assert_eq!(child.roms()[0].where_, Where::InParent);
}

#[test]
fn grandparent_chain_propagates() {
    let text = r#"game (
	name root
	rom ( name a.bin size 16 crc 01 )
)

game (
	name mid
	romof root
	rom ( name a.bin merge a.bin size 16 crc 01 )
)

game (
	name leaf
	romof mid
	rom ( name a.bin merge a.bin size 16 crc 01 )
)
"#;
    let (db, result) = ingest_text(text);
    result.unwrap();

    let leaf = db.read_game("leaf").unwrap().unwrap();
    assert_eq!(leaf.role(Role::Rom).grandparent.as_deref(), Some("root"));
    assert_eq!(leaf.roms()[0].where_, Where::InGrandparent);

    // The root hears about its grandchild as well as its child.
    let root = db.read_game("root").unwrap().unwrap();
    assert_eq!(
        root.role(Role::Rom).clones,
        vec!["leaf".to_string(), "mid".to_string()]
    );
}

#[test]
fn self_parent_is_cleared() {
    let text = r#"game (
	name loner
	romof loner
	sampleof loner
	rom ( name a.bin size 16 crc 01 )
)
"#;
    let (db, result) = ingest_text(text);
    result.unwrap();

    let game = db.read_game("loner").unwrap().unwrap();
    assert_eq!(game.role(Role::Rom).parent, None);
    assert_eq!(game.role(Role::Sample).parent, None);
}

#[test]
fn two_cycle_reports_dangling_parents() {
    let text = r#"game (
	name alpha
	romof beta
	rom ( name a.bin size 16 crc 01 )
)

game (
	name beta
	romof alpha
	rom ( name a.bin size 16 crc 01 )
)
"#;
    let (db, result) = ingest_text(text);
    match result {
        Err(DatError::DanglingParent { orphans }) => {
            assert_eq!(orphans, vec!["alpha".to_string(), "beta".to_string()]);
        }
        other => panic!("expected dangling parent, got {:?}", other.err()),
    }

    // Partial state survives: both records are there, unresolved.
    let alpha = db.read_game("alpha").unwrap().unwrap();
    assert_eq!(alpha.roms()[0].where_, Where::InZip);
    assert_eq!(db.read_game_list().unwrap().len(), 2);
}

#[test]
fn missing_parent_reports_dangling() {
    let text = r#"game (
	name orphan
	romof nowhere
	rom ( name a.bin size 16 crc 01 )
)
"#;
    let (_, result) = ingest_text(text);
    match result {
        Err(DatError::DanglingParent { orphans }) => {
            assert_eq!(orphans, vec!["orphan".to_string()]);
        }
        other => panic!("expected dangling parent, got {:?}", other.err()),
    }
}

#[test]
fn sample_parent_resolves_through_sample_role() {
    let text = r#"game (
	name sparent
	sample boom.wav
	rom ( name a.bin size 16 crc 01 )
)

game (
	name schild
	sampleof sparent
	sample boom.wav
	rom ( name b.bin size 16 crc 02 )
)
"#;
    let (db, result) = ingest_text(text);
    result.unwrap();

    let parent = db.read_game("sparent").unwrap().unwrap();
    assert_eq!(parent.role(Role::Sample).clones, vec!["schild".to_string()]);
    assert!(parent.role(Role::Rom).clones.is_empty());

    let child = db.read_game("schild").unwrap().unwrap();
    assert_eq!(child.samples()[0].where_, Where::InParent);
    assert_eq!(child.roms()[0].where_, Where::InZip);
}

#[test]
fn lists_prog_and_dat_entry_are_written() {
    let (db, result) = ingest_text(FAMILY);
    result.unwrap();

    assert_eq!(
        db.read_game_list().unwrap(),
        vec!["child".to_string(), "parent".to_string()]
    );
    assert_eq!(db.read_list(ListKind::Game).unwrap().len(), 2);
    assert!(db.read_list(ListKind::Disk).unwrap().is_empty());

    let prog = db.read_prog().unwrap();
    assert_eq!(prog.name.as_deref(), Some("mame"));

    let dats = db.read_dat_entries().unwrap();
    assert_eq!(dats.len(), 1);
    assert_eq!(dats[0].name, "mame");
    assert_eq!(dats[0].version, "0.1");
}

#[test]
fn sample_list_names_games_with_samples() {
    let text = r#"game (
	name hassamples
	sample boom.wav
)

game (
	name nosamples
	rom ( name a.bin size 16 crc 01 )
)
"#;
    let (db, result) = ingest_text(text);
    result.unwrap();
    assert_eq!(
        db.read_list(ListKind::Sample).unwrap(),
        vec!["hassamples".to_string()]
    );
}
