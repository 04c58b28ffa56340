//! AES-256 in the two modes foreign vaults use.
//!
//! - CBC, with or without PKCS#7 padding (Bitwarden, OPVault), via `aes` + `cbc`
//! - GCM with tag verification, via `ring::aead`
//!
//! [`decrypt`] dispatches on [`SymmetricAlgorithm`]. Authentication of CBC
//! ciphertexts (encrypt-then-MAC) is the caller's job, see [`EncMacKey`].

use crate::error::CryptoError;
use crate::mac::verify_hmac_sha256;
use crate::memory::{SecretBuffer, SecretBytes};
use aes::Aes256;
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// AES block size, which is also the CBC IV length.
pub const BLOCK_LEN: usize = 16;

/// AES-256-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Padding scheme of a CBC ciphertext.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CbcPadding {
    /// PKCS#7, removed and checked on decryption.
    Pkcs7,
    /// No padding; plaintext must be block aligned.
    None,
}

/// Cipher selector for [`decrypt`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymmetricAlgorithm {
    Aes256Cbc(CbcPadding),
    Aes256Gcm,
}

/// GCM ciphertext container: `nonce (12) || ciphertext || tag (16)` on the wire.
#[must_use = "encrypted data must be stored or transmitted"]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SealedData {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

impl SealedData {
    /// Serialize to `nonce || ciphertext || tag`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let capacity = NONCE_LEN
            .saturating_add(self.ciphertext.len())
            .saturating_add(TAG_LEN);
        let mut out = Vec::with_capacity(capacity);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    /// Split `ciphertext || tag` into a container for `nonce`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Encryption` if the nonce is not 12 bytes or the
    /// input is shorter than a tag.
    pub fn from_parts(nonce: &[u8], ciphertext_and_tag: &[u8]) -> Result<Self, CryptoError> {
        let nonce: [u8; NONCE_LEN] = nonce.try_into().map_err(|_| {
            CryptoError::Encryption(format!(
                "GCM nonce must be {NONCE_LEN} bytes, got {}",
                nonce.len()
            ))
        })?;
        let ct_len = ciphertext_and_tag.len().checked_sub(TAG_LEN).ok_or_else(|| {
            CryptoError::Encryption(format!(
                "GCM ciphertext too short: {} bytes",
                ciphertext_and_tag.len()
            ))
        })?;
        let (ciphertext, tag) = ciphertext_and_tag.split_at(ct_len);
        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(tag);
        Ok(Self {
            nonce,
            ciphertext: ciphertext.to_vec(),
            tag: tag_bytes,
        })
    }
}

/// CBC ciphertext with the random IV it was produced under.
#[derive(Clone, Debug)]
pub struct CbcCiphertext {
    pub iv: [u8; BLOCK_LEN],
    pub ciphertext: Vec<u8>,
}

/// 64 bytes of key material split into an AES key and an HMAC key.
///
/// OPVault and Bitwarden both authenticate with encrypt-then-MAC, the MAC
/// covering the IV and ciphertext.
#[derive(Debug)]
pub struct EncMacKey {
    enc: SecretBytes<KEY_LEN>,
    mac: SecretBytes<KEY_LEN>,
}

impl EncMacKey {
    /// Build from separate 32-byte halves.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyMaterial` if either half is not 32 bytes.
    pub fn new(enc: &[u8], mac: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            enc: SecretBytes::from_slice(enc)?,
            mac: SecretBytes::from_slice(mac)?,
        })
    }

    /// Split 64 bytes as `enc (32) || mac (32)`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyMaterial` unless `material` is 64 bytes.
    pub fn from_concatenated(material: &[u8]) -> Result<Self, CryptoError> {
        if material.len() != KEY_LEN.saturating_mul(2) {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "expected 64 bytes of key material, got {}",
                material.len()
            )));
        }
        let (enc, mac) = material.split_at(KEY_LEN);
        Self::new(enc, mac)
    }

    #[must_use]
    pub const fn enc_key(&self) -> &[u8; KEY_LEN] {
        self.enc.expose()
    }

    #[must_use]
    pub const fn mac_key(&self) -> &[u8; KEY_LEN] {
        self.mac.expose()
    }

    /// Verify `tag` over `authenticated`, then CBC-decrypt `ciphertext`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Decryption` if the tag does not match or the
    /// padding is invalid.
    pub fn verify_then_decrypt(
        &self,
        authenticated: &[u8],
        tag: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
        padding: CbcPadding,
    ) -> Result<SecretBuffer, CryptoError> {
        verify_hmac_sha256(self.mac_key(), authenticated, tag)?;
        decrypt_cbc(ciphertext, self.enc_key(), iv, padding)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Decrypt `ciphertext` under `key` and `iv` with the selected algorithm.
///
/// For GCM, `iv` is the 12-byte nonce and `ciphertext` carries the 16-byte
/// tag at its end; no additional data is authenticated.
///
/// # Errors
///
/// - `CryptoError::InvalidKeyMaterial` for a wrong key or IV length
/// - `CryptoError::Encryption` for a ciphertext of impossible length
/// - `CryptoError::Decryption` for a failed tag or padding check
pub fn decrypt(
    ciphertext: &[u8],
    key: &[u8],
    iv: &[u8],
    algorithm: SymmetricAlgorithm,
) -> Result<SecretBuffer, CryptoError> {
    match algorithm {
        SymmetricAlgorithm::Aes256Cbc(padding) => decrypt_cbc(ciphertext, key, iv, padding),
        SymmetricAlgorithm::Aes256Gcm => {
            let sealed = SealedData::from_parts(iv, ciphertext)?;
            decrypt_gcm(&sealed, key, &[])
        }
    }
}

/// AES-256-CBC decryption.
///
/// # Errors
///
/// See [`decrypt`].
pub fn decrypt_cbc(
    ciphertext: &[u8],
    key: &[u8],
    iv: &[u8],
    padding: CbcPadding,
) -> Result<SecretBuffer, CryptoError> {
    check_key_len(key)?;
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CryptoError::Encryption(format!(
            "CBC ciphertext length {} is not a positive multiple of {BLOCK_LEN}",
            ciphertext.len()
        )));
    }
    let decryptor = Aes256CbcDec::new_from_slices(key, iv).map_err(|_| {
        CryptoError::InvalidKeyMaterial(format!(
            "CBC IV must be {BLOCK_LEN} bytes, got {}",
            iv.len()
        ))
    })?;

    let mut buf = ciphertext.to_vec();
    let result = match padding {
        CbcPadding::Pkcs7 => decryptor.decrypt_padded_mut::<Pkcs7>(&mut buf),
        CbcPadding::None => decryptor.decrypt_padded_mut::<NoPadding>(&mut buf),
    }
    .map_or(Err(CryptoError::Decryption), SecretBuffer::new);
    buf.zeroize();
    result
}

/// AES-256-CBC encryption under a fresh random IV.
///
/// # Errors
///
/// Returns `CryptoError::InvalidKeyMaterial` for a wrong key length, and
/// `CryptoError::Encryption` when `padding` is [`CbcPadding::None`] and the
/// plaintext is not block aligned.
pub fn encrypt_cbc(
    plaintext: &[u8],
    key: &[u8],
    padding: CbcPadding,
) -> Result<CbcCiphertext, CryptoError> {
    check_key_len(key)?;
    if padding == CbcPadding::None && plaintext.len() % BLOCK_LEN != 0 {
        return Err(CryptoError::Encryption(format!(
            "unpadded CBC plaintext length {} is not a multiple of {BLOCK_LEN}",
            plaintext.len()
        )));
    }
    let mut iv = [0u8; BLOCK_LEN];
    OsRng.fill_bytes(&mut iv);
    let encryptor = Aes256CbcEnc::new_from_slices(key, &iv)
        .map_err(|_| CryptoError::InvalidKeyMaterial("bad CBC key or IV".into()))?;
    let ciphertext = match padding {
        CbcPadding::Pkcs7 => encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        CbcPadding::None => encryptor.encrypt_padded_vec_mut::<NoPadding>(plaintext),
    };
    Ok(CbcCiphertext { iv, ciphertext })
}

/// AES-256-GCM encryption under a random 96-bit nonce.
///
/// # Errors
///
/// Returns `CryptoError::InvalidKeyMaterial` for a wrong key length and
/// `CryptoError::Encryption` if sealing fails.
pub fn encrypt_gcm(plaintext: &[u8], key: &[u8], aad: &[u8]) -> Result<SealedData, CryptoError> {
    let key = gcm_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    let Ok(tag) = key.seal_in_place_separate_tag(nonce, aead::Aad::from(aad), &mut in_out) else {
        in_out.zeroize();
        return Err(CryptoError::Encryption(
            "AES-256-GCM encryption failed".into(),
        ));
    };

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_ref());

    Ok(SealedData {
        nonce: nonce_bytes,
        ciphertext: in_out,
        tag: tag_bytes,
    })
}

/// AES-256-GCM decryption with tag verification.
///
/// # Errors
///
/// Returns `CryptoError::InvalidKeyMaterial` for a wrong key length and
/// `CryptoError::Decryption` if authentication fails.
pub fn decrypt_gcm(sealed: &SealedData, key: &[u8], aad: &[u8]) -> Result<SecretBuffer, CryptoError> {
    let key = gcm_key(key)?;
    let nonce = aead::Nonce::assume_unique_for_key(sealed.nonce);

    let mut ct_tag = Vec::with_capacity(sealed.ciphertext.len().saturating_add(TAG_LEN));
    ct_tag.extend_from_slice(&sealed.ciphertext);
    ct_tag.extend_from_slice(&sealed.tag);

    let result = key
        .open_in_place(nonce, aead::Aad::from(aad), &mut ct_tag)
        .map_or(Err(CryptoError::Decryption), |pt| SecretBuffer::new(pt));
    ct_tag.zeroize();
    result
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn check_key_len(key: &[u8]) -> Result<(), CryptoError> {
    if key.len() == KEY_LEN {
        Ok(())
    } else {
        Err(CryptoError::InvalidKeyMaterial(format!(
            "invalid key length: {} bytes (expected {KEY_LEN})",
            key.len()
        )))
    }
}

fn gcm_key(key: &[u8]) -> Result<aead::LessSafeKey, CryptoError> {
    check_key_len(key)?;
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key)
        .map_err(|_| CryptoError::InvalidKeyMaterial("failed to create AES-256-GCM key".into()))?;
    Ok(aead::LessSafeKey::new(unbound))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
