//! `keyport-crypto-core`: primitives shared by the Keyport importers.
//!
//! Everything here is synchronous and side-effect free apart from best-effort
//! `mlock` of key material. Format knowledge (opdata01, Bitwarden cipher
//! strings) lives in `keyport-vault`; this crate only knows about bytes.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod encoding;
pub mod error;
pub mod memory;

pub mod kdf;
pub mod mac;
pub mod symmetric;

pub mod totp;

pub use encoding::{
    decode_base32, decode_base64, decode_base64url, decode_hex, encode_base64,
    encode_base64url_nopad,
};
pub use error::CryptoError;
pub use kdf::{derive_key, Argon2idParams, KdfLimits, KdfParams, Pbkdf2Params, PrfAlgorithm};
pub use mac::{hkdf_expand_sha256, hmac_sha256, sha256, sha512, verify_hmac_sha256};
pub use memory::{disable_core_dumps, LockedRegion, SecretBuffer, SecretBytes};
pub use symmetric::{
    decrypt, decrypt_gcm, encrypt_cbc, encrypt_gcm, CbcCiphertext, CbcPadding, EncMacKey,
    SealedData, SymmetricAlgorithm,
};
pub use totp::{OtpAlgorithm, OtpEncoder, TotpSettings};
