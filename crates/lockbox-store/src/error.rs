//! Error types for credential storage.

use std::fmt;
use thiserror::Error;

/// Field of a wire record, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Iv,
    Description,
    Value,
}

impl Field {
    /// Wire order of the four fields.
    pub const ORDER: [Field; 4] = [Field::Name, Field::Iv, Field::Description, Field::Value];

    /// Key under which the field is written.
    pub fn key(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Iv => "iv",
            Field::Description => "description",
            Field::Value => "value",
        }
    }

    /// Status code reported when this field fails to decode.
    pub fn code(&self) -> i32 {
        match self {
            Field::Iv => -2,
            Field::Name => -3,
            Field::Description => -4,
            Field::Value => -5,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Errors that can occur during credential storage operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Credential already exists: {0}")]
    DuplicateName(String),

    #[error("Invalid credential name: name must not be empty")]
    InvalidName,

    #[error("Credential not found: {0}")]
    NotFound(String),

    #[error("Wire record {index}: field `{field}` missing or mismatched")]
    FieldMismatch { index: usize, field: Field },

    #[error("No persisted store at {0}")]
    LoadMissing(String),

    #[error("Persisted store is corrupt: {0}")]
    LoadCorrupt(String),

    #[error("Context configuration is sealed")]
    AlreadySealed,

    #[error("Context configuration is not sealed")]
    NotSealed,

    #[error("Context is locked: no session key")]
    Locked,

    #[error("No {0} registered")]
    Unregistered(&'static str),

    #[error("Allocation failure")]
    AllocationFailure,

    #[error("Value too long: {len} > {max}")]
    ValueTooLong { len: usize, max: usize },

    #[error("IV length mismatch: expected {expected}, got {actual}")]
    IvLength { expected: usize, actual: usize },

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Small negative status code, distinct per failure kind.
    ///
    /// Field mismatches keep the per-field codes of the legacy decoder.
    pub fn code(&self) -> i32 {
        match self {
            Error::DuplicateName(_) => -1,
            Error::FieldMismatch { field, .. } => field.code(),
            Error::InvalidName => -6,
            Error::NotFound(_) => -7,
            Error::LoadMissing(_) => -8,
            Error::LoadCorrupt(_) => -9,
            Error::AlreadySealed => -10,
            Error::NotSealed => -11,
            Error::Locked => -12,
            Error::Unregistered(_) => -13,
            Error::AllocationFailure => -14,
            Error::ValueTooLong { .. } => -15,
            Error::IvLength { .. } => -16,
            Error::EncryptionFailed(_) => -17,
            Error::DecryptionFailed(_) => -18,
            Error::Encode(_) => -19,
            Error::Io(_) => -20,
        }
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::AllocationFailure
    }
}

/// Convenience result alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;
