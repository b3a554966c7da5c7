use super::*;
use rommend_core::checksum::Hashes;
use rommend_core::game::Role;

fn sample_game() -> Game {
    let mut game = Game::new("puckmanb");
    game.description = Some("Puck Man (bootleg)".to_string());
    game.dat_no = 2;

    let rom_view = game.role_mut(Role::Rom);
    rom_view.parent = Some("puckman".to_string());
    rom_view.grandparent = Some("pacman".to_string());
    rom_view.clones = vec!["puckmanx".to_string(), "Puckmana".to_string()];

    let mut f = FileDesc::new("pm1.bin");
    f.merge = Some("namcopac.6e".to_string());
    f.altnames = vec!["pm1-alt.bin".to_string()];
    f.size = Some(4096);
    f.hashes.crc = Some(0xc1e6ab10);
    f.hashes.sha1 = Some([0xab; 20]);
    f.where_ = Where::InParent;
    rom_view.files.push(f);

    let mut nodump = FileDesc::new("prom.bin");
    nodump.status = FileStatus::NoDump;
    rom_view.files.push(nodump);

    let sample_view = game.role_mut(Role::Sample);
    sample_view.parent = Some("pacman".to_string());
    sample_view.files.push(FileDesc::new("chomp.wav"));

    game.disks.push(GameDisk {
        name: "hdd".to_string(),
        hashes: Hashes {
            md5: Some([3; 16]),
            ..Hashes::default()
        },
        status: FileStatus::Ok,
    });

    game
}

#[test]
fn game_record_round_trip() {
    let game = sample_game();
    let bytes = encode_game(&game);
    let back = decode_game("puckmanb", &bytes).unwrap();

    assert_eq!(back.name, game.name);
    assert_eq!(back.description, game.description);
    assert_eq!(back.dat_no, 2);
    assert_eq!(back.role(Role::Rom).parent, game.role(Role::Rom).parent);
    assert_eq!(
        back.role(Role::Rom).grandparent,
        game.role(Role::Rom).grandparent
    );
    assert_eq!(back.roms(), game.roms());
    assert_eq!(back.samples(), game.samples());
    assert_eq!(back.disks, game.disks);
}

#[test]
fn clone_lists_come_back_sorted_case_insensitively() {
    let game = sample_game();
    let back = decode_game("puckmanb", &encode_game(&game)).unwrap();
    assert_eq!(
        back.role(Role::Rom).clones,
        vec!["Puckmana".to_string(), "puckmanx".to_string()]
    );
}

#[test]
fn unknown_size_round_trips_as_none() {
    let mut game = Game::new("g");
    let mut f = FileDesc::new("nosize.bin");
    f.size = None;
    game.role_mut(Role::Rom).files.push(f);

    let back = decode_game("g", &encode_game(&game)).unwrap();
    assert_eq!(back.roms()[0].size, None);
}

#[test]
fn truncated_records_fail_cleanly() {
    let game = sample_game();
    let bytes = encode_game(&game);
    for cut in [0, 1, 5, bytes.len() / 2, bytes.len() - 1] {
        assert!(decode_game("puckmanb", &bytes[..cut]).is_err());
    }
}

#[test]
fn trailing_bytes_are_rejected() {
    let game = sample_game();
    let mut bytes = encode_game(&game);
    bytes.push(0);
    assert!(decode_game("puckmanb", &bytes).is_err());
}

#[test]
fn string_array_round_trip() {
    let mut w = RecordWriter::new();
    w.put_string_array(&["a".to_string(), "".to_string(), "longer name".to_string()]);
    let bytes = w.into_bytes();

    let mut r = RecordReader::new(&bytes);
    assert_eq!(
        r.get_string_array().unwrap(),
        vec!["a".to_string(), "".to_string(), "longer name".to_string()]
    );
    assert!(r.at_end());
}
