//! Optional defaults from `~/.config/rommend/settings.toml`.
//!
//! The CLI flags always win; the settings file only supplies fallbacks
//! for the ROM directory and database paths so frequent invocations stay
//! short.

use std::io;
use std::path::{Path, PathBuf};

/// Canonical path of the settings file.
pub fn settings_path() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join("rommend").join("settings.toml")
}

/// Resolve the ROM directory: CLI override, then `set.rom_dir` from the
/// settings file, then `roms/` in the working directory.
pub fn resolve_rom_dir(cli_override: Option<PathBuf>) -> PathBuf {
    if let Some(p) = cli_override {
        return p;
    }
    if let Some(p) = load_string("set", "rom_dir") {
        return PathBuf::from(p);
    }
    PathBuf::from("roms")
}

/// Resolve the reference database path: CLI override, then `set.db`, then
/// `rommend.db` next to the working directory.
pub fn resolve_db_path(cli_override: Option<PathBuf>) -> PathBuf {
    if let Some(p) = cli_override {
        return p;
    }
    if let Some(p) = load_string("set", "db") {
        return PathBuf::from(p);
    }
    PathBuf::from("rommend.db")
}

/// Resolve the old-ROM database path, if any is configured.
pub fn resolve_old_db_path(cli_override: Option<PathBuf>) -> Option<PathBuf> {
    cli_override.or_else(|| load_string("set", "old_db").map(PathBuf::from))
}

fn load_string(table: &str, key: &str) -> Option<String> {
    let contents = std::fs::read_to_string(settings_path()).ok()?;
    let doc: toml::Value = contents.parse().ok()?;
    let value = doc.get(table)?.get(key)?.as_str()?;
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Save the ROM directory default, preserving unrelated keys.
pub fn save_rom_dir(path: Option<&Path>) -> io::Result<()> {
    let settings = settings_path();
    let mut doc: toml::Value = if let Ok(contents) = std::fs::read_to_string(&settings) {
        contents
            .parse()
            .unwrap_or_else(|_| toml::Value::Table(Default::default()))
    } else {
        toml::Value::Table(Default::default())
    };

    let table = doc
        .as_table_mut()
        .ok_or_else(|| io::Error::other("settings.toml root is not a table"))?;
    let set = table
        .entry("set")
        .or_insert_with(|| toml::Value::Table(Default::default()));
    let set_table = set
        .as_table_mut()
        .ok_or_else(|| io::Error::other("[set] is not a table"))?;

    match path {
        Some(p) => {
            set_table.insert(
                "rom_dir".to_string(),
                toml::Value::String(p.to_string_lossy().into_owned()),
            );
        }
        None => {
            set_table.remove("rom_dir");
        }
    }

    if let Some(parent) = settings.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let rendered =
        toml::to_string_pretty(&doc).map_err(|e| io::Error::other(e.to_string()))?;
    let tmp = settings.with_extension("toml.tmp");
    std::fs::write(&tmp, rendered)?;
    std::fs::rename(&tmp, &settings)?;
    Ok(())
}
