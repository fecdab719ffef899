//! End-to-end store tests: context, file persister and codec together.

use lockbox_core::config::{CommitMode, DecodeMode, ValueEncoding};
use lockbox_integration_tests::{
    document, Fixture, LegacyRecord, MisnamedIvRecord, WireRecord, IV_LEN,
};
use lockbox_store::{CodecOptions, Error, Field, Ownership, Repository};
use serde_bytes::Bytes;

fn acquire_all() -> Ownership {
    Ownership::ACQUIRE_PERSISTER | Ownership::ACQUIRE_REPOSITORY | Ownership::ACQUIRE_CRYPTOR
}

fn names(repo: &dyn Repository) -> Vec<String> {
    repo.iter().names().map(str::to_string).collect()
}

#[test]
fn test_reopen_reveals_stored_values() {
    let fx = Fixture::new();

    let mut ctx = fx.context(CodecOptions::default(), acquire_all());
    assert!(matches!(ctx.load(), Err(Error::LoadMissing(_))));
    ctx.store("mail", "work inbox", b"hunter2").unwrap();
    ctx.store("bank", "", b"correct horse battery staple").unwrap();
    ctx.store("wifi", "home", b"").unwrap();
    ctx.persist().unwrap();
    drop(ctx);

    let mut ctx = fx.context(CodecOptions::default(), acquire_all());
    assert_eq!(ctx.load().unwrap(), 3);
    assert_eq!(ctx.reveal("mail").unwrap().expose_secret(), "hunter2");
    assert_eq!(
        ctx.reveal("bank").unwrap().expose_secret(),
        "correct horse battery staple"
    );
    assert_eq!(ctx.reveal("wifi").unwrap().expose_secret(), "");
    assert_eq!(
        ctx.repository().unwrap().get("mail").unwrap().description(),
        "work inbox"
    );
}

#[test]
fn test_remove_and_describe_survive_reopen() {
    let fx = Fixture::new();

    let mut ctx = fx.context(CodecOptions::default(), acquire_all());
    for name in ["1", "2", "3"] {
        ctx.store(name, "", name.as_bytes()).unwrap();
    }
    ctx.remove("2").unwrap();
    ctx.update_description("3", "moved").unwrap();
    ctx.persist().unwrap();
    assert_eq!(names(ctx.repository().unwrap()), vec!["1", "3"]);
    drop(ctx);

    let mut ctx = fx.context(CodecOptions::default(), acquire_all());
    ctx.load().unwrap();
    let repo = ctx.repository().unwrap();
    assert_eq!(names(repo), vec!["1", "3"]);
    assert_eq!(repo.get("3").unwrap().description(), "moved");
    assert!(matches!(repo.get("2"), Err(Error::NotFound(_))));
}

#[test]
fn test_sorted_order_after_reload() {
    let fx = Fixture::new();

    let mut ctx = fx.context(CodecOptions::default(), acquire_all());
    for name in ["passC", "passA", "passB"] {
        ctx.store(name, "", b"x").unwrap();
    }
    ctx.persist().unwrap();
    drop(ctx);

    let mut ctx = fx.context(CodecOptions::default(), acquire_all());
    ctx.load().unwrap();
    ctx.sort().unwrap();

    let mut visited = Vec::new();
    ctx.each_credential(|c| {
        visited.push(c.name().to_string());
        Ok(())
    })
    .unwrap();
    assert_eq!(visited, vec!["passA", "passB", "passC"]);
}

#[test]
fn test_many_records_round_trip() {
    let fx = Fixture::new();
    let names: Vec<String> = (0..26).map(|i| format!("entry-{i:02}")).collect();

    let mut ctx = fx.context(CodecOptions::default(), acquire_all());
    for name in &names {
        ctx.store(name, "bulk", name.as_bytes()).unwrap();
    }
    ctx.persist().unwrap();
    drop(ctx);

    let mut ctx = fx.context(CodecOptions::default(), acquire_all());
    assert_eq!(ctx.load().unwrap(), 26);
    for name in &names {
        assert_eq!(ctx.reveal(name).unwrap().expose_secret(), name);
    }
}

#[test]
fn test_wrong_key_cannot_reveal() {
    let fx = Fixture::new();

    let mut ctx = fx.context(CodecOptions::default(), acquire_all());
    ctx.store("mail", "", b"hunter2").unwrap();
    ctx.persist().unwrap();
    drop(ctx);

    let mut ctx = fx.context(CodecOptions::default(), acquire_all());
    ctx.unlock(lockbox_core::SecretKey::generate());
    ctx.load().unwrap();
    assert!(matches!(
        ctx.reveal("mail"),
        Err(Error::DecryptionFailed(_))
    ));
}

#[test]
fn test_legacy_padded_store_is_readable() {
    let fx = Fixture::new();
    let iv = [7u8; IV_LEN];
    let mut padded = vec![0u8; 64];
    padded[..3].copy_from_slice(&[1, 2, 3]);

    fx.write_store(&document(&[WireRecord::Legacy(LegacyRecord {
        name: "legacy",
        iv: Bytes::new(&iv),
        description: "from the old tool",
        value: Bytes::new(&padded),
    })]));

    let options = CodecOptions {
        value_encoding: ValueEncoding::Padded,
        decode_mode: DecodeMode::Strict,
        commit_mode: CommitMode::Partial,
    };
    let mut ctx = fx.context(options, acquire_all());
    assert_eq!(ctx.load().unwrap(), 1);

    let stored = ctx.repository().unwrap().get("legacy").unwrap();
    assert_eq!(stored.value(), &[1, 2, 3]);
    assert_eq!(stored.iv(), &iv);
    assert_eq!(stored.description(), "from the old tool");
}

fn document_with_bad_second_record() -> Vec<u8> {
    let iv = [1u8; IV_LEN];
    document(&[
        WireRecord::Legacy(LegacyRecord {
            name: "first",
            iv: Bytes::new(&iv),
            description: "",
            value: Bytes::new(b"one"),
        }),
        WireRecord::MisnamedIv(MisnamedIvRecord {
            name: "second",
            ivv: Bytes::new(&iv),
            description: "",
            value: Bytes::new(b"two"),
        }),
        WireRecord::Legacy(LegacyRecord {
            name: "third",
            iv: Bytes::new(&iv),
            description: "",
            value: Bytes::new(b"three"),
        }),
    ])
}

#[test]
fn test_bad_iv_key_aborts_atomic_load() {
    let fx = Fixture::new();
    fx.write_store(&document_with_bad_second_record());

    let mut ctx = fx.context(CodecOptions::default(), acquire_all());
    let err = ctx.load().unwrap_err();

    assert!(matches!(
        err,
        Error::FieldMismatch {
            index: 1,
            field: Field::Iv
        }
    ));
    assert_eq!(err.code(), -2);
    assert_eq!(ctx.count().unwrap(), 0);
}

#[test]
fn test_bad_iv_key_keeps_earlier_records_in_partial_load() {
    let fx = Fixture::new();
    fx.write_store(&document_with_bad_second_record());

    let options = CodecOptions {
        decode_mode: DecodeMode::Strict,
        commit_mode: CommitMode::Partial,
        ..CodecOptions::default()
    };
    let mut ctx = fx.context(options, acquire_all());
    let err = ctx.load().unwrap_err();

    assert_eq!(err.code(), -2);
    assert_eq!(names(ctx.repository().unwrap()), vec!["first"]);
}

#[test]
fn test_caller_owned_repository_is_handed_back() {
    let fx = Fixture::new();

    let mut ctx = fx.context(CodecOptions::default(), Ownership::ACQUIRE_PERSISTER);
    ctx.store("kept", "", b"v").unwrap();

    let detached = ctx.close();
    let repo = detached.repository.unwrap();
    assert!(detached.persister.is_none());
    assert_eq!(repo.count(), 1);
    assert!(repo.contains("kept"));
}
