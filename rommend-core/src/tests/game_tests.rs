use super::*;
use crate::file::FileDesc;

#[test]
fn role_views_are_independent() {
    let mut g = Game::new("puckman");
    g.role_mut(Role::Rom).parent = Some("pacman".to_string());
    g.role_mut(Role::Sample).files.push(FileDesc::new("chomp.wav"));

    assert_eq!(g.role(Role::Rom).parent.as_deref(), Some("pacman"));
    assert!(g.role(Role::Sample).parent.is_none());
    assert!(g.has_samples());
    assert!(g.roms().is_empty());
}

#[test]
fn lost_means_parent_set_and_nothing_resolved() {
    let mut g = Game::new("clone");
    assert!(!g.role(Role::Rom).is_lost());

    g.role_mut(Role::Rom).parent = Some("parent".to_string());
    g.role_mut(Role::Rom).files.push(FileDesc::new("a.bin"));
    assert!(g.role(Role::Rom).is_lost());

    g.role_mut(Role::Rom).files[0].where_ = Where::InParent;
    assert!(!g.role(Role::Rom).is_lost());
}

#[test]
fn clone_lists_deduplicate() {
    let mut g = Game::new("parent");
    g.role_mut(Role::Rom).add_clone("a");
    g.role_mut(Role::Rom).add_clone("b");
    g.role_mut(Role::Rom).add_clone("a");
    assert_eq!(g.role(Role::Rom).clones, vec!["a".to_string(), "b".to_string()]);
}
