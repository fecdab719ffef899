//! Credential encryption.
//!
//! [`Cryptor`] is the capability the store consumes; [`AesGcmCryptor`] is the
//! bundled implementation. Each credential gets a random 32-byte IV that is
//! used as the HKDF salt, so the session key is never used directly as a
//! cipher key and no (key, nonce) pair repeats across credentials.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use hkdf::Hkdf;
use lockbox_core::SecretKey;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Encryption capability used by the context.
pub trait Cryptor: Send + Sync {
    /// Encrypt `plaintext` under `key` and `iv`.
    fn encrypt(&self, plaintext: &[u8], key: &SecretKey, iv: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt `ciphertext` produced by [`Cryptor::encrypt`] with the same key and IV.
    fn decrypt(&self, ciphertext: &[u8], key: &SecretKey, iv: &[u8])
        -> Result<Zeroizing<Vec<u8>>>;

    /// Length of the IVs this cryptor expects.
    fn iv_length(&self) -> usize;

    /// A fresh random IV of [`Cryptor::iv_length`] bytes.
    fn generate_iv(&self) -> Vec<u8>;

    /// Ciphertext length for a plaintext of `plain_length` bytes.
    fn encrypted_length(&self, plain_length: usize) -> usize;
}

const IV_SIZE: usize = 32;
const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

/// HKDF info string used to domain-separate derived keys.
const HKDF_INFO: &[u8] = b"lockbox-credential-v1";

/// AES-256-GCM with per-credential key and nonce derived via HKDF-SHA256.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmCryptor;

impl AesGcmCryptor {
    pub fn new() -> Self {
        Self
    }

    /// Derive the cipher and nonce for one credential.
    fn cipher(
        &self,
        key: &SecretKey,
        iv: &[u8],
    ) -> std::result::Result<(Aes256Gcm, [u8; NONCE_SIZE]), String> {
        if key.is_empty() {
            return Err("empty session key".to_string());
        }
        if iv.len() != IV_SIZE {
            return Err(format!("iv must be {IV_SIZE} bytes, got {}", iv.len()));
        }

        let hk = Hkdf::<Sha256>::new(Some(iv), key.expose_secret());
        let mut okm = Zeroizing::new([0u8; KEY_SIZE + NONCE_SIZE]);
        hk.expand(HKDF_INFO, &mut okm[..])
            .map_err(|e| e.to_string())?;

        let cipher = Aes256Gcm::new_from_slice(&okm[..KEY_SIZE]).map_err(|e| e.to_string())?;
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&okm[KEY_SIZE..]);
        Ok((cipher, nonce))
    }
}

impl Cryptor for AesGcmCryptor {
    fn encrypt(&self, plaintext: &[u8], key: &SecretKey, iv: &[u8]) -> Result<Vec<u8>> {
        let (cipher, nonce) = self.cipher(key, iv).map_err(Error::EncryptionFailed)?;
        cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| Error::EncryptionFailed(e.to_string()))
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        key: &SecretKey,
        iv: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        if ciphertext.len() < TAG_SIZE {
            return Err(Error::DecryptionFailed("ciphertext too short".to_string()));
        }

        let (cipher, nonce) = self.cipher(key, iv).map_err(Error::DecryptionFailed)?;
        cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext)
            .map(Zeroizing::new)
            .map_err(|e| Error::DecryptionFailed(e.to_string()))
    }

    fn iv_length(&self) -> usize {
        IV_SIZE
    }

    fn generate_iv(&self) -> Vec<u8> {
        let mut iv = vec![0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);
        iv
    }

    fn encrypted_length(&self, plain_length: usize) -> usize {
        plain_length + TAG_SIZE
    }
}
