//! HMAC, HKDF and plain digests, all backed by `ring`.

use crate::error::CryptoError;
use crate::memory::SecretBuffer;
use ring::{digest, hkdf, hmac};
use zeroize::Zeroize;

/// HMAC-SHA256 output length.
pub const HMAC_SHA256_LEN: usize = 32;

/// `ring::hkdf` wants the output length as a `KeyType`.
struct OutputLen(usize);

impl hkdf::KeyType for OutputLen {
    fn len(&self) -> usize {
        self.0
    }
}

/// HMAC-SHA256 of `data` under `key`.
#[must_use]
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    hmac::sign(&key, data).as_ref().to_vec()
}

/// Constant-time check of an HMAC-SHA256 tag.
///
/// # Errors
///
/// Returns `CryptoError::Decryption` on mismatch.
pub fn verify_hmac_sha256(key: &[u8], data: &[u8], tag: &[u8]) -> Result<(), CryptoError> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    hmac::verify(&key, data, tag).map_err(|_| CryptoError::Decryption)
}

/// HKDF-SHA256 expand step only, treating `prk` as the pseudo-random key.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if `len` exceeds 255 * 32 bytes.
pub fn hkdf_expand_sha256(prk: &[u8], info: &[u8], len: usize) -> Result<SecretBuffer, CryptoError> {
    let prk = hkdf::Prk::new_less_safe(hkdf::HKDF_SHA256, prk);
    let info = [info];
    let okm = prk
        .expand(&info, OutputLen(len))
        .map_err(|_| CryptoError::KeyDerivation(format!("HKDF output length {len} too large")))?;
    let mut out = vec![0u8; len];
    if okm.fill(&mut out).is_err() {
        out.zeroize();
        return Err(CryptoError::KeyDerivation("HKDF expand failed".into()));
    }
    SecretBuffer::from_vec(out)
}

/// SHA-256 digest.
#[must_use]
pub fn sha256(data: &[u8]) -> Vec<u8> {
    digest::digest(&digest::SHA256, data).as_ref().to_vec()
}

/// SHA-512 digest.
#[must_use]
pub fn sha512(data: &[u8]) -> Vec<u8> {
    digest::digest(&digest::SHA512, data).as_ref().to_vec()
}
