//! Cryptographic error types for `keyport-crypto-core`.

use thiserror::Error;

/// Errors produced by cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed (bad parameters, limits exceeded, allocation).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Malformed cipher input (bad lengths, unsupported layout) or an
    /// encryption call that could not run.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Authentication tag, HMAC or padding check failed: wrong key or
    /// tampered ciphertext.
    #[error("decryption failed: authentication or padding check failed")]
    Decryption,

    /// Base64 / base32 / hex text could not be decoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Invalid key material (wrong length, corrupted bytes).
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// TOTP settings could not be parsed or rendered.
    #[error("OTP error: {0}")]
    Otp(String),

    /// Secure memory allocation failure (mlock, CSPRNG).
    #[error("secure memory error: {0}")]
    SecureMemory(String),
}
