use super::{load_settings_with, normalize_database_url, prepare_database_url, Settings};

use std::{collections::HashMap, fs};

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
}

#[test]
fn blank_database_url_falls_back_to_default() {
    assert_eq!(normalize_database_url("  "), Settings::default().database_url);
}

#[test]
fn keeps_memory_url_untouched() {
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
}

#[test]
fn keeps_windows_absolute_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("sqlite:C:\\Users\\alice\\test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn normalizes_windows_plain_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("C:\\Users\\alice\\test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn converts_sqlite_double_slash_windows_path() {
    assert_eq!(
        normalize_database_url("sqlite://C:/Users/alice/test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn creates_parent_dir_for_sqlite_path() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("data").join("test.db");

    prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare db url");
    assert!(temp_root.path().join("data").exists());
}

#[test]
fn defaults_apply_without_file_or_env() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let settings = load_settings_with(&temp_root.path().join("missing.toml"), env_from(&[]));
    assert_eq!(settings, Settings::default());
}

#[test]
fn file_values_are_overridden_by_env() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let config_path = temp_root.path().join("server.toml");
    fs::write(
        &config_path,
        "bind_addr = \"0.0.0.0:9000\"\ndatabase_url = \"sqlite://./file.db\"\n",
    )
    .expect("write config");

    let from_file = load_settings_with(&config_path, env_from(&[]));
    assert_eq!(from_file.server_bind, "0.0.0.0:9000");
    assert_eq!(from_file.database_url, "sqlite://./file.db");

    let overridden = load_settings_with(
        &config_path,
        env_from(&[
            ("SERVER_BIND", "127.0.0.1:1"),
            ("APP__BIND_ADDR", "127.0.0.1:2"),
            ("DATABASE_URL", "sqlite://./env.db"),
        ]),
    );
    assert_eq!(overridden.server_bind, "127.0.0.1:2");
    assert_eq!(overridden.database_url, "sqlite://./env.db");
}

#[test]
fn file_keys_load_alongside_unrelated_non_string_entries() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let config_path = temp_root.path().join("server.toml");
    fs::write(
        &config_path,
        "bind_addr = \"0.0.0.0:7000\"\nworkers = 4\n\n[logging]\nlevel = \"debug\"\n",
    )
    .expect("write config");

    let settings = load_settings_with(&config_path, env_from(&[]));
    assert_eq!(settings.server_bind, "0.0.0.0:7000");
    assert_eq!(settings.database_url, Settings::default().database_url);
}

#[test]
fn malformed_file_falls_back_to_defaults() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let config_path = temp_root.path().join("server.toml");
    fs::write(&config_path, "bind_addr = [unterminated").expect("write config");

    let settings = load_settings_with(&config_path, env_from(&[]));
    assert_eq!(settings, Settings::default());
}

#[tokio::test]
async fn prepared_database_url_creates_openable_sqlite_file() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("server.db");

    let prepared = prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare");
    let storage = storage::Storage::new(&prepared).await.expect("open sqlite");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should be created: {}",
        db_path.display()
    );
}
