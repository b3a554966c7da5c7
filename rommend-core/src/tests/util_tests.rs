use super::*;

#[test]
fn flatten_name_folds_separators() {
    assert_eq!(flatten_name("sub/dir/file.bin"), "sub_dir_file.bin");
    assert_eq!(flatten_name("plain.bin"), "plain.bin");
}

#[test]
fn format_bytes_picks_a_unit() {
    assert_eq!(format_bytes(512), "512 bytes");
    assert_eq!(format_bytes(2048), "2 KB");
    assert_eq!(format_bytes(3 * 1024 * 1024), "3 MB");
    assert_eq!(format_bytes(1025), "1025 bytes");
}

#[test]
fn name_cmp_is_case_insensitive_but_total() {
    use std::cmp::Ordering;
    assert_eq!(name_cmp("Pacman", "pacman"), Ordering::Less);
    assert_eq!(name_cmp("abc", "ABD"), Ordering::Less);
    assert_eq!(name_cmp("same", "same"), Ordering::Equal);
}
