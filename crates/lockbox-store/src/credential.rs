//! Credential records.
//!
//! A [`Credential`] carries a name, a free-form description, the IV used to
//! encrypt it, and the ciphertext. The repository treats the ciphertext as
//! opaque bytes; only [`Credential::seal`] and [`Credential::reveal`] go
//! through a [`Cryptor`].

use std::fmt;

use lockbox_core::{SecretKey, SecretString};
use zeroize::Zeroizing;

use crate::crypto::Cryptor;
use crate::error::{Error, Result};

/// Maximum ciphertext length a credential can hold.
pub const MAX_VALUE_LEN: usize = 1024;

/// A named, encrypted credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    name: String,
    description: String,
    iv: Vec<u8>,
    value: Zeroizing<Vec<u8>>,
    iv_len: Option<usize>,
}

impl Credential {
    /// Create an empty credential with the given name and description.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            iv: Vec::new(),
            value: Zeroizing::new(Vec::new()),
            iv_len: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// The stored ciphertext.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Set the name. Renaming a credential that is already stored must go
    /// through [`Repository::update`](crate::Repository::update) so the
    /// repository can keep names unique.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Replace the IV and ciphertext together.
    ///
    /// Nothing is modified when the value exceeds [`MAX_VALUE_LEN`] or when the
    /// credential came from a [`CredentialFactory`] and the IV has the wrong
    /// length.
    pub fn fill_raw(&mut self, iv: &[u8], value: &[u8]) -> Result<()> {
        if value.len() > MAX_VALUE_LEN {
            return Err(Error::ValueTooLong {
                len: value.len(),
                max: MAX_VALUE_LEN,
            });
        }
        if let Some(expected) = self.iv_len {
            if iv.len() != expected {
                return Err(Error::IvLength {
                    expected,
                    actual: iv.len(),
                });
            }
        }

        self.iv = iv.to_vec();
        self.value = Zeroizing::new(value.to_vec());
        Ok(())
    }

    /// Encrypt `plaintext` under a fresh IV and store the result.
    pub fn seal(&mut self, plaintext: &[u8], cryptor: &dyn Cryptor, key: &SecretKey) -> Result<()> {
        let len = cryptor.encrypted_length(plaintext.len());
        if len > MAX_VALUE_LEN {
            return Err(Error::ValueTooLong {
                len,
                max: MAX_VALUE_LEN,
            });
        }

        let iv = cryptor.generate_iv();
        let ciphertext = cryptor.encrypt(plaintext, key, &iv)?;
        self.fill_raw(&iv, &ciphertext)
    }

    /// Decrypt the stored value.
    pub fn reveal(&self, cryptor: &dyn Cryptor, key: &SecretKey) -> Result<SecretString> {
        let plaintext = cryptor.decrypt(&self.value, key, &self.iv)?;
        let text = std::str::from_utf8(&plaintext)
            .map_err(|e| Error::DecryptionFailed(format!("invalid UTF-8: {e}")))?;
        Ok(SecretString::new(text))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("iv_len", &self.iv.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Produces empty credentials bound to the IV length of a cryptor.
#[derive(Debug, Clone, Copy)]
pub struct CredentialFactory {
    iv_len: usize,
}

impl CredentialFactory {
    pub fn new(iv_len: usize) -> Self {
        Self { iv_len }
    }

    /// Factory for the IV length `cryptor` produces.
    pub fn for_cryptor(cryptor: &dyn Cryptor) -> Self {
        Self::new(cryptor.iv_length())
    }

    pub fn iv_len(&self) -> usize {
        self.iv_len
    }

    /// A new, empty credential whose IV must be `iv_len` bytes.
    pub fn new_credential(&self) -> Credential {
        Credential {
            iv_len: Some(self.iv_len),
            ..Credential::new(String::new(), String::new())
        }
    }
}
