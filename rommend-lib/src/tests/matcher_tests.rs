use super::*;

use std::io::Write as _;
use std::path::Path;

use rommend_db::RomDb;

use crate::archive::{ArchiveKind, BackendKind, OpenFlags};
use crate::context::CheckConfig;

fn crc_hex(data: &[u8]) -> String {
    let mut h = rommend_core::checksum::Hasher::new();
    h.update(data);
    format!("{:08x}", h.finalize().crc.unwrap())
}

fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options = ::zip::write::SimpleFileOptions::default()
        .compression_method(::zip::CompressionMethod::Stored);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

fn make_db(text: &str) -> RomDb {
    let mut db = RomDb::open_memory().unwrap();
    rommend_dat::ingest(&mut db, text.as_bytes(), 0).unwrap();
    db
}

fn make_ctx(rom_dir: &Path, text: &str) -> CheckContext {
    let config = CheckConfig {
        rom_dir: rom_dir.to_path_buf(),
        ..CheckConfig::default()
    };
    CheckContext::new(make_db(text), None, config).unwrap()
}

fn open_own(ctx: &CheckContext, game: &str) -> GameArchives {
    let path = ctx.game_path(game);
    let own = if path.exists() {
        Some(
            Archive::open(
                &path,
                BackendKind::Zip,
                ArchiveKind::Rom,
                OpenFlags {
                    writable: true,
                    create: true,
                    ..OpenFlags::default()
                },
            )
            .unwrap(),
        )
    } else {
        None
    };
    GameArchives {
        own,
        parent: None,
        grandparent: None,
    }
}

const CONTENT: &[u8] = b"rom-content-0001";
const OTHER: &[u8] = b"other-content-02";

fn one_game_catalog(rom_name: &str, data: &[u8]) -> String {
    format!(
        "game (\n name g\n rom ( name {} size {} crc {} )\n)\n",
        rom_name,
        data.len(),
        crc_hex(data)
    )
}

#[test]
fn correct_file_is_ok() {
    let tmp = tempfile::tempdir().unwrap();
    let mut ctx = make_ctx(tmp.path(), &one_game_catalog("a.bin", CONTENT));
    write_zip(&tmp.path().join("g.zip"), &[("a.bin", CONTENT)]);

    let game = ctx.db.read_game("g").unwrap().unwrap();
    let mut archives = open_own(&ctx, "g");
    let result = check_game(&mut ctx, &game, &mut archives).unwrap();

    assert_eq!(result.files, vec![FileQuality::Ok]);
    assert_eq!(result.usage, vec![Usage::Used]);
    assert_eq!(result.status, GameStatus::Correct);
}

#[test]
fn misnamed_file_is_name_error() {
    let tmp = tempfile::tempdir().unwrap();
    let mut ctx = make_ctx(tmp.path(), &one_game_catalog("right.bin", CONTENT));
    write_zip(&tmp.path().join("g.zip"), &[("wrong.bin", CONTENT)]);

    let game = ctx.db.read_game("g").unwrap().unwrap();
    let mut archives = open_own(&ctx, "g");
    let result = check_game(&mut ctx, &game, &mut archives).unwrap();

    assert_eq!(result.files, vec![FileQuality::NameErr { index: 0 }]);
    assert_eq!(result.usage, vec![Usage::Used]);
    assert_eq!(result.status, GameStatus::Fixable);
}

#[test]
fn long_file_with_valid_prefix() {
    let tmp = tempfile::tempdir().unwrap();
    let mut long = CONTENT.to_vec();
    long.extend_from_slice(b"TRAILING-JUNK");

    let mut ctx = make_ctx(tmp.path(), &one_game_catalog("a.bin", CONTENT));
    write_zip(&tmp.path().join("g.zip"), &[("a.bin", &long)]);

    let game = ctx.db.read_game("g").unwrap().unwrap();
    let mut archives = open_own(&ctx, "g");
    let result = check_game(&mut ctx, &game, &mut archives).unwrap();

    assert_eq!(result.files, vec![FileQuality::Long { index: 0 }]);
    assert_eq!(result.usage, vec![Usage::PartUsed]);
    assert_eq!(result.status, GameStatus::Fixable);
}

#[test]
fn wrong_content_same_size_is_hash_error() {
    let tmp = tempfile::tempdir().unwrap();
    let mut ctx = make_ctx(tmp.path(), &one_game_catalog("a.bin", CONTENT));
    write_zip(&tmp.path().join("g.zip"), &[("a.bin", OTHER)]);

    let game = ctx.db.read_game("g").unwrap().unwrap();
    let mut archives = open_own(&ctx, "g");
    let result = check_game(&mut ctx, &game, &mut archives).unwrap();

    assert_eq!(result.files, vec![FileQuality::HashErr]);
    assert_eq!(result.status, GameStatus::Missing);
}

#[test]
fn absent_file_is_missing() {
    let tmp = tempfile::tempdir().unwrap();
    let mut ctx = make_ctx(tmp.path(), &one_game_catalog("a.bin", CONTENT));

    let game = ctx.db.read_game("g").unwrap().unwrap();
    let mut archives = GameArchives::none();
    let result = check_game(&mut ctx, &game, &mut archives).unwrap();

    assert_eq!(result.files, vec![FileQuality::Missing]);
    assert_eq!(result.status, GameStatus::Missing);
}

#[test]
fn donor_in_another_set_archive_is_copied() {
    let tmp = tempfile::tempdir().unwrap();
    let mut ctx = make_ctx(tmp.path(), &one_game_catalog("a.bin", CONTENT));

    // Another archive in the set holds identical bytes.
    let donor_path = tmp.path().join("donor.zip");
    write_zip(&donor_path, &[("stash.bin", CONTENT)]);
    let mut donor = Archive::open(
        &donor_path,
        BackendKind::Zip,
        ArchiveKind::Rom,
        OpenFlags::default(),
    )
    .unwrap();
    let root = tmp.path().to_path_buf();
    for i in 0..donor.len() {
        donor
            .ensure_hashes(i, all_hash_kinds(), Some((&mut ctx.caches, &root)))
            .unwrap();
    }
    ctx.index.add_archive(&donor, Source::RomSet);

    let game = ctx.db.read_game("g").unwrap().unwrap();
    let mut archives = GameArchives::none();
    let result = check_game(&mut ctx, &game, &mut archives).unwrap();

    match &result.files[0] {
        FileQuality::Copied { location } => {
            assert_eq!(location.archive.as_deref(), Some(donor_path.as_path()));
            assert_eq!(location.source, Source::RomSet);
        }
        other => panic!("expected copied, got {:?}", other),
    }
    assert_eq!(result.status, GameStatus::Fixable);
}

#[test]
fn rom_only_in_old_database_counts_as_old() {
    let tmp = tempfile::tempdir().unwrap();

    let mut old_db = RomDb::open_memory().unwrap();
    rommend_dat::ingest(
        &mut old_db,
        one_game_catalog("archived.bin", CONTENT).as_bytes(),
        0,
    )
    .unwrap();

    let config = CheckConfig {
        rom_dir: tmp.path().to_path_buf(),
        ..CheckConfig::default()
    };
    let mut ctx = CheckContext::new(
        make_db(&one_game_catalog("a.bin", CONTENT)),
        Some(old_db),
        config,
    )
    .unwrap();

    let game = ctx.db.read_game("g").unwrap().unwrap();
    let mut archives = GameArchives::none();
    let result = check_game(&mut ctx, &game, &mut archives).unwrap();

    assert!(matches!(result.files[0], FileQuality::Old { .. }));
    assert_eq!(result.status, GameStatus::Old);
}

#[test]
fn set_copy_of_old_content_is_duplicate_unless_kept() {
    let tmp = tempfile::tempdir().unwrap();

    let make_old = || {
        let mut old_db = RomDb::open_memory().unwrap();
        rommend_dat::ingest(
            &mut old_db,
            one_game_catalog("archived.bin", CONTENT).as_bytes(),
            0,
        )
        .unwrap();
        old_db
    };

    write_zip(&tmp.path().join("g.zip"), &[("a.bin", CONTENT)]);

    // Default policy: the set copy is redundant.
    let config = CheckConfig {
        rom_dir: tmp.path().to_path_buf(),
        ..CheckConfig::default()
    };
    let mut ctx = CheckContext::new(
        make_db(&one_game_catalog("a.bin", CONTENT)),
        Some(make_old()),
        config,
    )
    .unwrap();
    let game = ctx.db.read_game("g").unwrap().unwrap();
    let mut archives = open_own(&ctx, "g");
    let result = check_game(&mut ctx, &game, &mut archives).unwrap();
    assert_eq!(result.files, vec![FileQuality::Ok]);
    assert_eq!(result.usage, vec![Usage::Duplicate]);

    // keep-old-duplicate: both remain.
    let config = CheckConfig {
        rom_dir: tmp.path().to_path_buf(),
        keep_old_duplicate: true,
        ..CheckConfig::default()
    };
    let mut ctx = CheckContext::new(
        make_db(&one_game_catalog("a.bin", CONTENT)),
        Some(make_old()),
        config,
    )
    .unwrap();
    let game = ctx.db.read_game("g").unwrap().unwrap();
    let mut archives = open_own(&ctx, "g");
    let result = check_game(&mut ctx, &game, &mut archives).unwrap();
    assert_eq!(result.usage, vec![Usage::Used]);
}

#[test]
fn inherited_file_checks_the_parent_archive() {
    let tmp = tempfile::tempdir().unwrap();
    let text = format!(
        "game (\n name parent\n rom ( name base.bin size {} crc {} )\n)\n\n\
         game (\n name child\n romof parent\n rom ( name base.bin merge base.bin size {} crc {} )\n rom ( name delta.bin size {} crc {} )\n)\n",
        CONTENT.len(),
        crc_hex(CONTENT),
        CONTENT.len(),
        crc_hex(CONTENT),
        OTHER.len(),
        crc_hex(OTHER),
    );
    let mut ctx = make_ctx(tmp.path(), &text);

    write_zip(&tmp.path().join("parent.zip"), &[("base.bin", CONTENT)]);
    write_zip(&tmp.path().join("child.zip"), &[("delta.bin", OTHER)]);

    let game = ctx.db.read_game("child").unwrap().unwrap();
    let mut archives = open_own(&ctx, "child");
    archives.parent = Some(
        Archive::open(
            &tmp.path().join("parent.zip"),
            BackendKind::Zip,
            ArchiveKind::Rom,
            OpenFlags::default(),
        )
        .unwrap(),
    );

    let result = check_game(&mut ctx, &game, &mut archives).unwrap();
    assert_eq!(result.files, vec![FileQuality::Ok, FileQuality::Ok]);
    assert_eq!(result.status, GameStatus::Correct);
}

#[test]
fn inherited_file_in_own_archive_is_noted() {
    let tmp = tempfile::tempdir().unwrap();
    let text = format!(
        "game (\n name parent\n rom ( name base.bin size {} crc {} )\n)\n\n\
         game (\n name child\n romof parent\n rom ( name base.bin merge base.bin size {} crc {} )\n)\n",
        CONTENT.len(),
        crc_hex(CONTENT),
        CONTENT.len(),
        crc_hex(CONTENT),
    );
    let mut ctx = make_ctx(tmp.path(), &text);

    // The parent archive is missing; the child wrongly stores the file.
    write_zip(&tmp.path().join("child.zip"), &[("base.bin", CONTENT)]);

    let game = ctx.db.read_game("child").unwrap().unwrap();
    let mut archives = open_own(&ctx, "child");
    let result = check_game(&mut ctx, &game, &mut archives).unwrap();

    assert_eq!(result.files, vec![FileQuality::InZip { index: 0 }]);
    // The stray copy is wanted by the catalog (it is the parent's file).
    assert_eq!(result.usage, vec![Usage::Needed]);
}

#[test]
fn nodump_files_are_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let text = format!(
        "game (\n name g\n rom ( name a.bin size {} crc {} )\n rom ( name prot.bin size 16 crc 00000000 flags nodump )\n)\n",
        CONTENT.len(),
        crc_hex(CONTENT),
    );
    let mut ctx = make_ctx(tmp.path(), &text);
    write_zip(&tmp.path().join("g.zip"), &[("a.bin", CONTENT)]);

    let game = ctx.db.read_game("g").unwrap().unwrap();
    let mut archives = open_own(&ctx, "g");
    let result = check_game(&mut ctx, &game, &mut archives).unwrap();

    assert_eq!(result.files[1], FileQuality::NoDump);
    assert_eq!(result.status, GameStatus::Correct);
}
