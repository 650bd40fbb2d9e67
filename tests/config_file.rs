use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use std::path::Path;
use study_models::Config;
use study_testsupport::write_config;

#[test]
fn server_config_round_trips_through_toml() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.server.port = 9321;
    config.uploads.max_upload_mb = 5;
    config.chunking.max_chars = 600;
    config.chunking.overlap = 60;
    let path = write_config(dir.path(), &config).unwrap();

    let loaded = Config::from_figment(figment_without_env(&path)).unwrap();
    assert_eq!(loaded.server.port, 9321);
    assert_eq!(loaded.max_upload_bytes(), 5 * 1024 * 1024);
    assert_eq!(loaded.chunking.max_chars, 600);
}

#[test]
fn shipped_defaults_file_matches_built_in_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("configs/default.toml");
    let loaded = Config::from_figment(figment_without_env(&path)).unwrap();
    assert_eq!(loaded, Config::default());
}

fn figment_without_env(path: &Path) -> Figment {
    Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(path))
}
