//! Config save/load roundtrip integration tests.
//!
//! These tests verify that configuration can be written to disk, loaded back
//! with identical field values, and used to open a store.

use lockbox_cli::session::{self, Opened};
use lockbox_core::config::{CommitMode, Config, DecodeMode, ValueEncoding};
use lockbox_integration_tests::Fixture;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lockbox.json5");

    let config = Config::default();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.store.value_encoding, config.store.value_encoding);
    assert_eq!(loaded.store.decode_mode, config.store.decode_mode);
    assert_eq!(loaded.store.commit_mode, config.store.commit_mode);
    assert_eq!(
        loaded.ownership.acquire_persister,
        config.ownership.acquire_persister
    );
    assert_eq!(loaded.logging.level, config.logging.level);
}

#[test]
fn test_config_modify_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lockbox.json5");

    let mut config = Config::default();
    config.store.path = Some(dir.path().join("vault.msgpack"));
    config.store.value_encoding = ValueEncoding::Padded;
    config.store.decode_mode = DecodeMode::Strict;
    config.store.commit_mode = CommitMode::Partial;
    config.logging.json = true;
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.store.path, Some(dir.path().join("vault.msgpack")));
    assert_eq!(loaded.store.value_encoding, ValueEncoding::Padded);
    assert_eq!(loaded.store.decode_mode, DecodeMode::Strict);
    assert_eq!(loaded.store.commit_mode, CommitMode::Partial);
    assert!(loaded.logging.json);
}

#[test]
fn test_config_load_nonexistent() {
    let result = Config::load(Path::new("/nonexistent/lockbox.json5"));
    assert!(result.is_err());
}

#[test]
fn test_config_parse_invalid() {
    let result = Config::parse("not valid json");
    assert!(result.is_err());
}

#[test]
fn test_saved_config_opens_store() {
    let fx = Fixture::new();
    let path = fx.dir.path().join("lockbox.json5");
    fx.config().save(&path).unwrap();

    let config = Config::load(&path).unwrap();
    let (mut ctx, opened) = session::open(&config, Some(fx.key.clone())).unwrap();
    assert_eq!(opened, Opened::Created);

    ctx.store("mail", "", b"hunter2").unwrap();
    session::save(&mut ctx).unwrap();
    drop(ctx);

    let (ctx, opened) = session::open(&config, Some(fx.key.clone())).unwrap();
    assert_eq!(opened, Opened::Loaded(1));
    assert_eq!(ctx.reveal("mail").unwrap().expose_secret(), "hunter2");
}
