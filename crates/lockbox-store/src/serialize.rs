//! Wire format for credential repositories.
//!
//! A store is a MessagePack array with one map per credential. Each map has
//! four string keys written in the order `name`, `iv`, `description`,
//! `value`; `name` and `description` are `str`, `iv` and `value` are `bin`.
//!
//! Reading goes through a loose intermediate form ([`RawRecord`]) so a bad
//! field can be reported as [`Error::FieldMismatch`] for that field rather
//! than as a generic codec failure.

use std::collections::HashSet;
use std::fmt;

use lockbox_core::config::{CommitMode, DecodeMode, StoreConfig, ValueEncoding};
use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_bytes::Bytes;
use tracing::debug;
use zeroize::Zeroizing;

use crate::credential::{Credential, CredentialFactory};
use crate::error::{Error, Field, Result};
use crate::repository::Repository;

/// Encoding and decoding policy for a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodecOptions {
    pub value_encoding: ValueEncoding,
    pub decode_mode: DecodeMode,
    pub commit_mode: CommitMode,
}

impl From<&StoreConfig> for CodecOptions {
    fn from(config: &StoreConfig) -> Self {
        Self {
            value_encoding: config.value_encoding,
            decode_mode: config.decode_mode,
            commit_mode: config.commit_mode,
        }
    }
}

/// Length of `buf` with its trailing run of zero bytes dropped.
///
/// Legacy stores kept values in a zero-padded fixed buffer and recovered the
/// ciphertext length this way. A ciphertext that really ends in `0x00` is
/// truncated by it, which is why [`ValueEncoding::Explicit`] is the default.
pub fn effective_len(buf: &[u8]) -> usize {
    buf.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1)
}

#[derive(Serialize)]
struct WireRecord<'a> {
    name: &'a str,
    iv: &'a Bytes,
    description: &'a str,
    value: &'a Bytes,
}

/// Encodes repositories to bytes and decodes bytes back into repositories.
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec {
    options: CodecOptions,
}

impl Codec {
    pub fn new(options: CodecOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> CodecOptions {
        self.options
    }

    /// Snapshot every record of `repository`, in storage order.
    pub fn encode(&self, repository: &dyn Repository) -> Result<Vec<u8>> {
        let records: Vec<WireRecord<'_>> = repository
            .iter()
            .map(|credential| {
                let value = match self.options.value_encoding {
                    ValueEncoding::Explicit => credential.value(),
                    ValueEncoding::Padded => {
                        let value = credential.value();
                        &value[..effective_len(value)]
                    }
                };
                WireRecord {
                    name: credential.name(),
                    iv: Bytes::new(credential.iv()),
                    description: credential.description(),
                    value: Bytes::new(value),
                }
            })
            .collect();

        let bytes = rmp_serde::to_vec_named(&records).map_err(|e| Error::Encode(e.to_string()))?;
        debug!(records = records.len(), bytes = bytes.len(), "encoded store");
        Ok(bytes)
    }

    /// Decode every record of a document without touching any repository.
    pub fn decode(&self, bytes: &[u8], factory: &CredentialFactory) -> Result<Vec<Credential>> {
        parse_document(bytes)?
            .into_iter()
            .enumerate()
            .map(|(index, raw)| self.decode_record(raw, index, factory))
            .collect()
    }

    /// Decode a document into `repository`, returning the number of records added.
    ///
    /// With [`CommitMode::Atomic`] the repository is untouched unless every
    /// record decodes and can be added. With [`CommitMode::Partial`] records
    /// are added one at a time and the first failure leaves the earlier ones
    /// in place.
    pub fn decode_into(
        &self,
        bytes: &[u8],
        repository: &mut dyn Repository,
        factory: &CredentialFactory,
    ) -> Result<usize> {
        let count = match self.options.commit_mode {
            CommitMode::Atomic => {
                let staged = self.decode(bytes, factory)?;
                check_batch(&staged, repository)?;
                repository.reserve(staged.len())?;

                let count = staged.len();
                for credential in staged {
                    repository.add(credential)?;
                }
                count
            }
            CommitMode::Partial => {
                let mut count = 0;
                for (index, raw) in parse_document(bytes)?.into_iter().enumerate() {
                    let credential = self.decode_record(raw, index, factory)?;
                    repository.add(credential)?;
                    count += 1;
                }
                count
            }
        };

        debug!(records = count, mode = ?self.options.commit_mode, "decoded store");
        Ok(count)
    }

    fn decode_record(
        &self,
        raw: RawRecord,
        index: usize,
        factory: &CredentialFactory,
    ) -> Result<Credential> {
        let [name, iv, description, value] = match self.options.decode_mode {
            DecodeMode::Strict => raw.into_positional(),
            DecodeMode::Keyed => raw.into_keyed(),
        }
        .map_err(|field| Error::FieldMismatch { index, field })?;

        let mismatch = |field| Error::FieldMismatch { index, field };
        let name = name.into_text().ok_or_else(|| mismatch(Field::Name))?;
        let iv = iv.into_bytes().ok_or_else(|| mismatch(Field::Iv))?;
        let description = description
            .into_text()
            .ok_or_else(|| mismatch(Field::Description))?;
        let value = Zeroizing::new(value.into_bytes().ok_or_else(|| mismatch(Field::Value))?);

        let value = match self.options.value_encoding {
            ValueEncoding::Explicit => &value[..],
            ValueEncoding::Padded => &value[..effective_len(&value)],
        };

        let mut credential = factory.new_credential();
        credential.fill_raw(&iv, value)?;
        credential.set_name(until_nul(name));
        credential.set_description(until_nul(description));
        Ok(credential)
    }
}

/// Reject a staged batch that the repository would refuse part-way through.
fn check_batch(staged: &[Credential], repository: &dyn Repository) -> Result<()> {
    let mut seen = HashSet::with_capacity(staged.len());
    for credential in staged {
        let name = credential.name();
        if name.is_empty() {
            return Err(Error::InvalidName);
        }
        if !seen.insert(name) || repository.contains(name) {
            return Err(Error::DuplicateName(name.to_string()));
        }
    }
    Ok(())
}

/// Names and descriptions end at the first NUL, as they did in the legacy store.
fn until_nul(mut text: String) -> String {
    if let Some(end) = text.find('\0') {
        text.truncate(end);
    }
    text
}

fn parse_document(bytes: &[u8]) -> Result<Vec<RawRecord>> {
    rmp_serde::from_slice(bytes).map_err(|e| Error::LoadCorrupt(e.to_string()))
}

/// A MessagePack value, reduced to what a wire record can hold.
#[derive(Debug)]
enum RawValue {
    Text(String),
    Binary(Vec<u8>),
    Other,
}

impl RawValue {
    fn into_text(self) -> Option<String> {
        match self {
            RawValue::Text(text) => Some(text),
            RawValue::Binary(bytes) => String::from_utf8(bytes).ok(),
            RawValue::Other => None,
        }
    }

    fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            RawValue::Binary(bytes) => Some(bytes),
            RawValue::Text(text) => Some(text.into_bytes()),
            RawValue::Other => None,
        }
    }

    fn is_key(&self, field: Field) -> bool {
        match self {
            RawValue::Text(key) => key == field.key(),
            RawValue::Binary(key) => key == field.key().as_bytes(),
            RawValue::Other => false,
        }
    }
}

impl<'de> Deserialize<'de> for RawValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(RawValueVisitor)
    }
}

struct RawValueVisitor;

impl<'de> Visitor<'de> for RawValueVisitor {
    type Value = RawValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a MessagePack value")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Text(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Binary(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Binary(v))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Other)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Other)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Other)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Other)
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Other)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Other)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<RawValue, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(RawValue::Other)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<RawValue, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(RawValue::Other)
    }
}

/// One wire record: its map entries in the order they were written.
#[derive(Debug)]
struct RawRecord(Vec<(RawValue, RawValue)>);

impl RawRecord {
    /// Fields at exactly the positions `name, iv, description, value`.
    ///
    /// A wrong key at a position is reported as the field expected there; a
    /// fifth entry is reported as `value`.
    fn into_positional(self) -> std::result::Result<[RawValue; 4], Field> {
        let mut entries = self.0.into_iter();
        let mut take = |field: Field| match entries.next() {
            Some((key, value)) if key.is_key(field) => Ok(value),
            _ => Err(field),
        };

        let fields = [
            take(Field::Name)?,
            take(Field::Iv)?,
            take(Field::Description)?,
            take(Field::Value)?,
        ];
        if entries.next().is_some() {
            return Err(Field::Value);
        }
        Ok(fields)
    }

    /// Fields looked up by key in any order. Unknown keys are skipped; a
    /// missing or repeated key is reported as that field.
    fn into_keyed(self) -> std::result::Result<[RawValue; 4], Field> {
        let mut slots: [Option<RawValue>; 4] = [None, None, None, None];
        for (key, value) in self.0 {
            let Some(field) = Field::ORDER.into_iter().find(|f| key.is_key(*f)) else {
                continue;
            };
            let slot = &mut slots[field as usize];
            if slot.is_some() {
                return Err(field);
            }
            *slot = Some(value);
        }

        let [name, iv, description, value] = slots;
        Ok([
            name.ok_or(Field::Name)?,
            iv.ok_or(Field::Iv)?,
            description.ok_or(Field::Description)?,
            value.ok_or(Field::Value)?,
        ])
    }
}

impl<'de> Deserialize<'de> for RawRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(RawRecordVisitor)
    }
}

struct RawRecordVisitor;

impl<'de> Visitor<'de> for RawRecordVisitor {
    type Value = RawRecord;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a credential map")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<RawRecord, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(4).min(16));
        while let Some(entry) = map.next_entry::<RawValue, RawValue>()? {
            entries.push(entry);
        }
        Ok(RawRecord(entries))
    }
}
