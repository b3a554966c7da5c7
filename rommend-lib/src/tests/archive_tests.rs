use super::*;

use std::fs;
use std::io::Write as _;
use std::path::Path;

use rommend_core::checksum::HashKind;

fn dir_flags() -> OpenFlags {
    OpenFlags {
        writable: true,
        create: true,
        ..OpenFlags::default()
    }
}

fn open_dir(path: &Path) -> Archive {
    Archive::open(path, BackendKind::Dir, ArchiveKind::Rom, dir_flags()).unwrap()
}

fn open_zip(path: &Path) -> Archive {
    Archive::open(path, BackendKind::Zip, ArchiveKind::Rom, dir_flags()).unwrap()
}

fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = fs::File::create(path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options = ::zip::write::SimpleFileOptions::default()
        .compression_method(::zip::CompressionMethod::Stored);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

fn zip_contents(path: &Path) -> Vec<(String, Vec<u8>)> {
    use std::io::Read as _;
    let mut archive = ::zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    let mut out = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        out.push((entry.name().to_string(), data));
    }
    out.sort();
    out
}

// -- directory backend --

#[test]
fn dir_open_lists_files_recursively() {
    let tmp = tempfile::tempdir().unwrap();
    let game = tmp.path().join("game");
    fs::create_dir_all(game.join("sub")).unwrap();
    fs::write(game.join("a.bin"), b"aaaa").unwrap();
    fs::write(game.join("sub/b.bin"), b"bb").unwrap();
    fs::write(game.join(crate::cache::DEFAULT_CACHE_NAME), b"{}").unwrap();

    let flags = OpenFlags {
        skip_file: Some(crate::cache::DEFAULT_CACHE_NAME.to_string()),
        ..OpenFlags::default()
    };
    let archive = Archive::open(&game, BackendKind::Dir, ArchiveKind::Rom, flags).unwrap();
    let names: Vec<_> = archive.entries().iter().map(|e| e.desc.name.as_str()).collect();
    assert_eq!(names, vec!["a.bin", "sub/b.bin"]);
    assert_eq!(archive.entry(0).desc.size, Some(4));
}

#[test]
fn dir_hashing_and_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let game = tmp.path().join("game");
    fs::create_dir_all(&game).unwrap();
    fs::write(game.join("a.bin"), b"hello world").unwrap();

    let mut archive = open_dir(&game);
    let mut caches = crate::cache::CacheRegistry::new(None);
    archive
        .ensure_hashes(0, all_hash_kinds(), Some((&mut caches, tmp.path())))
        .unwrap();
    assert_eq!(archive.entry(0).desc.hashes.crc, Some(0x0d4a1185));

    // Second archive instance gets the hash from the cache.
    let mut again = open_dir(&game);
    again
        .ensure_hashes(0, all_hash_kinds(), Some((&mut caches, tmp.path())))
        .unwrap();
    assert_eq!(again.entry(0).desc.hashes.crc, Some(0x0d4a1185));
}

#[test]
fn dir_rename_commit() {
    let tmp = tempfile::tempdir().unwrap();
    let game = tmp.path().join("game");
    fs::create_dir_all(&game).unwrap();
    fs::write(game.join("wrong.bin"), b"content").unwrap();

    let mut archive = open_dir(&game);
    archive.file_rename(0, "right.bin").unwrap();

    // Staged, not yet visible under the final name.
    assert!(!game.join("right.bin").exists());
    assert!(!game.join("wrong.bin").exists());

    archive.commit().unwrap();
    assert_eq!(fs::read(game.join("right.bin")).unwrap(), b"content");
    assert!(!game.join("wrong.bin").exists());
    assert_eq!(archive.entry(0).desc.name, "right.bin");
    assert!(!archive.is_modified());
}

#[test]
fn dir_rename_collision_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let game = tmp.path().join("game");
    fs::create_dir_all(&game).unwrap();
    fs::write(game.join("a.bin"), b"a").unwrap();
    fs::write(game.join("b.bin"), b"b").unwrap();

    let mut archive = open_dir(&game);
    let a = archive.find_entry("a.bin").unwrap();
    assert!(archive.file_rename(a, "b.bin").is_err());
}

#[test]
fn dir_rollback_restores_everything() {
    let tmp = tempfile::tempdir().unwrap();
    let game = tmp.path().join("game");
    fs::create_dir_all(&game).unwrap();
    fs::write(game.join("keep.bin"), b"keep").unwrap();
    fs::write(game.join("gone.bin"), b"gone").unwrap();

    let mut archive = open_dir(&game);
    let keep = archive.find_entry("keep.bin").unwrap();
    let gone = archive.find_entry("gone.bin").unwrap();
    archive.file_rename(keep, "renamed.bin").unwrap();
    archive.file_delete(gone).unwrap();
    archive.file_add_empty("empty.bin").unwrap();

    archive.rollback().unwrap();

    assert_eq!(fs::read(game.join("keep.bin")).unwrap(), b"keep");
    assert_eq!(fs::read(game.join("gone.bin")).unwrap(), b"gone");
    assert!(!game.join("renamed.bin").exists());
    assert!(!game.join("empty.bin").exists());
    assert_eq!(archive.len(), 2);

    // No stray sidecars either.
    let leftovers: Vec<_> = fs::read_dir(&game)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n != "keep.bin" && n != "gone.bin")
        .collect();
    assert!(leftovers.is_empty(), "leftovers: {:?}", leftovers);
}

#[test]
fn dir_delete_all_collapses_archive_and_empty_parents() {
    let tmp = tempfile::tempdir().unwrap();
    let game = tmp.path().join("deep").join("game");
    fs::create_dir_all(&game).unwrap();
    fs::write(game.join("only.bin"), b"x").unwrap();

    let mut archive = open_dir(&game);
    archive.file_delete(0).unwrap();
    archive.commit().unwrap();

    assert!(!game.exists());
    assert!(!tmp.path().join("deep").exists());
}

#[test]
fn dir_keep_empty_preserves_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let game = tmp.path().join("game");
    fs::create_dir_all(&game).unwrap();
    fs::write(game.join("only.bin"), b"x").unwrap();

    let flags = OpenFlags {
        writable: true,
        keep_empty: true,
        ..OpenFlags::default()
    };
    let mut archive = Archive::open(&game, BackendKind::Dir, ArchiveKind::Rom, flags).unwrap();
    archive.file_delete(0).unwrap();
    archive.commit().unwrap();

    assert!(game.exists());
    assert!(!game.join("only.bin").exists());
}

#[test]
fn dir_copy_from_other_archive() {
    let tmp = tempfile::tempdir().unwrap();
    let donor_dir = tmp.path().join("donor");
    let game = tmp.path().join("game");
    fs::create_dir_all(&donor_dir).unwrap();
    fs::write(donor_dir.join("payload.bin"), b"payload-bytes").unwrap();

    let donor = Archive::open(
        &donor_dir,
        BackendKind::Dir,
        ArchiveKind::Rom,
        OpenFlags::default(),
    )
    .unwrap();

    let mut archive =
        Archive::open(&game, BackendKind::Dir, ArchiveKind::Rom, dir_flags()).unwrap();
    archive
        .file_copy_from(&donor, 0, "wanted.bin", 0, None)
        .unwrap();
    archive.commit().unwrap();

    assert_eq!(fs::read(game.join("wanted.bin")).unwrap(), b"payload-bytes");
    // The donor is untouched.
    assert_eq!(fs::read(donor_dir.join("payload.bin")).unwrap(), b"payload-bytes");
}

#[test]
fn dir_extract_range_replaces_with_prefix() {
    let tmp = tempfile::tempdir().unwrap();
    let game = tmp.path().join("game");
    fs::create_dir_all(&game).unwrap();
    fs::write(game.join("long.bin"), b"goodpartJUNKJUNK").unwrap();

    let mut archive = open_dir(&game);
    archive.file_extract_range(0, "exact.bin", 0, 8).unwrap();
    archive.commit().unwrap();

    assert_eq!(fs::read(game.join("exact.bin")).unwrap(), b"goodpart");
    assert!(!game.join("long.bin").exists());
    assert_eq!(archive.entry(0).desc.size, Some(8));
    assert_eq!(archive.entry(0).desc.name, "exact.bin");
}

#[test]
fn dir_commit_stops_at_first_failure_keeping_applied_changes() {
    let tmp = tempfile::tempdir().unwrap();
    let game = tmp.path().join("game");
    fs::create_dir_all(&game).unwrap();
    fs::write(game.join("a.bin"), b"a").unwrap();
    fs::write(game.join("b.bin"), b"b").unwrap();

    let mut archive = open_dir(&game);
    let a = archive.find_entry("a.bin").unwrap();
    let b = archive.find_entry("b.bin").unwrap();
    archive.file_rename(a, "a2.bin").unwrap();
    archive.file_delete(b).unwrap();

    // Sabotage the second change: remove its staged sidecar out-of-band.
    let staged = archive.changes[b].original().unwrap().data_path.clone();
    fs::remove_file(&staged).unwrap();

    assert!(archive.commit().is_err());

    // The first change landed; the second did not and is still pending.
    assert_eq!(fs::read(game.join("a2.bin")).unwrap(), b"a");
    assert!(!game.join("a.bin").exists());
    assert!(archive.is_modified());
}

// -- zip backend --

#[test]
fn zip_open_reads_central_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("game.zip");
    write_zip(&path, &[("a.bin", b"hello world"), ("b.bin", b"bb")]);

    let archive = Archive::open(
        &path,
        BackendKind::Zip,
        ArchiveKind::Rom,
        OpenFlags::default(),
    )
    .unwrap();
    assert_eq!(archive.len(), 2);
    assert_eq!(archive.entry(0).desc.name, "a.bin");
    assert_eq!(archive.entry(0).desc.size, Some(11));
    assert_eq!(archive.entry(0).desc.hashes.crc, Some(0x0d4a1185));
}

#[test]
fn zip_rename_delete_add_commit() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("game.zip");
    write_zip(&path, &[("wrong.bin", b"content"), ("junk.bin", b"junk")]);

    let mut archive = open_zip(&path);
    let wrong = archive.find_entry("wrong.bin").unwrap();
    let junk = archive.find_entry("junk.bin").unwrap();
    archive.file_rename(wrong, "right.bin").unwrap();
    archive.file_delete(junk).unwrap();
    archive.file_add_empty("empty.bin").unwrap();
    archive.commit().unwrap();

    assert_eq!(
        zip_contents(&path),
        vec![
            ("empty.bin".to_string(), Vec::new()),
            ("right.bin".to_string(), b"content".to_vec()),
        ]
    );
    // In-memory view matches.
    assert_eq!(archive.len(), 2);
    assert!(archive.find_entry("right.bin").is_some());
}

#[test]
fn zip_to_zip_copy_preserves_bytes() {
    let tmp = tempfile::tempdir().unwrap();
    let donor_path = tmp.path().join("donor.zip");
    let path = tmp.path().join("game.zip");
    write_zip(&donor_path, &[("payload.bin", b"payload-bytes")]);

    let donor = Archive::open(
        &donor_path,
        BackendKind::Zip,
        ArchiveKind::Rom,
        OpenFlags::default(),
    )
    .unwrap();

    let mut archive = open_zip(&path);
    archive
        .file_copy_from(&donor, 0, "wanted.bin", 0, None)
        .unwrap();
    archive.commit().unwrap();

    assert_eq!(
        zip_contents(&path),
        vec![("wanted.bin".to_string(), b"payload-bytes".to_vec())]
    );
    assert_eq!(
        zip_contents(&donor_path),
        vec![("payload.bin".to_string(), b"payload-bytes".to_vec())]
    );
}

#[test]
fn zip_extract_range_commits_prefix() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("game.zip");
    write_zip(&path, &[("long.bin", b"goodpartJUNK")]);

    let mut archive = open_zip(&path);
    archive.file_extract_range(0, "exact.bin", 0, 8).unwrap();
    archive.commit().unwrap();

    assert_eq!(
        zip_contents(&path),
        vec![("exact.bin".to_string(), b"goodpart".to_vec())]
    );
}

#[test]
fn zip_rollback_discards_pending_changes() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("game.zip");
    write_zip(&path, &[("a.bin", b"a")]);

    let mut archive = open_zip(&path);
    archive.file_delete(0).unwrap();
    archive.file_add_empty("new.bin").unwrap();
    archive.rollback().unwrap();

    assert_eq!(archive.len(), 1);
    assert_eq!(archive.entry(0).desc.name, "a.bin");
    assert_eq!(zip_contents(&path), vec![("a.bin".to_string(), b"a".to_vec())]);
}

#[test]
fn zip_delete_all_removes_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("game.zip");
    write_zip(&path, &[("a.bin", b"a")]);

    let mut archive = open_zip(&path);
    archive.file_delete(0).unwrap();
    archive.commit().unwrap();

    assert!(!path.exists());
}

#[test]
fn zip_integrity_check_marks_corrupt_entries() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("game.zip");
    write_zip(&path, &[("a.bin", b"hello world")]);

    // Flip a byte of the stored (uncompressed) entry data.
    let mut bytes = fs::read(&path).unwrap();
    let pos = bytes
        .windows(11)
        .position(|w| w == b"hello world")
        .unwrap();
    bytes[pos] = b'j';
    fs::write(&path, bytes).unwrap();

    let flags = OpenFlags {
        check_integrity: true,
        ..OpenFlags::default()
    };
    let archive = Archive::open(&path, BackendKind::Zip, ArchiveKind::Rom, flags).unwrap();
    assert!(archive.entry(0).broken);
}

#[test]
fn hash_entry_with_limit_hashes_prefix_only() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("game.zip");
    write_zip(&path, &[("a.bin", b"hello worldXXXX")]);

    let archive = Archive::open(
        &path,
        BackendKind::Zip,
        ArchiveKind::Rom,
        OpenFlags::default(),
    )
    .unwrap();
    let (n, hashes) = archive.hash_entry(0, Some(11)).unwrap();
    assert_eq!(n, 11);
    assert_eq!(hashes.crc, Some(0x0d4a1185));
    assert_eq!(hashes.hex(HashKind::Sha1).unwrap().len(), 40);
}
