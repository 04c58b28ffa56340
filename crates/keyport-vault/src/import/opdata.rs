//! 1Password opdata01 envelopes, item keys and `OPCLDAT` attachments.
//!
//! opdata01 layout:
//!
//! ```text
//! "opdata01" | plaintext length (u64 LE) | IV (16) | AES-256-CBC (16n) | HMAC-SHA256 (32)
//! ```
//!
//! The HMAC covers everything before it. The CBC payload carries random
//! padding in front of the plaintext, so the plaintext is the trailing
//! `length` bytes of the decrypted block.

use keyport_crypto_core::symmetric::BLOCK_LEN;
use keyport_crypto_core::{sha512, CbcPadding, EncMacKey, SecretBuffer};

use crate::error::ImportError;

const MAGIC: &[u8; 8] = b"opdata01";
const HEADER_LEN: usize = 16;
const MAC_LEN: usize = 32;
const ITEM_KEY_LEN: usize = 64;
const MIN_BLOB_LEN: usize = HEADER_LEN + 2 * BLOCK_LEN + MAC_LEN;
const ITEM_KEY_AUTH_LEN: usize = BLOCK_LEN + ITEM_KEY_LEN;
const ITEM_KEY_BLOB_LEN: usize = ITEM_KEY_AUTH_LEN + MAC_LEN;

const ATTACHMENT_MAGIC: &[u8; 7] = b"OPCLDAT";
const ATTACHMENT_HEADER_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Verify and decrypt one opdata01 blob.
///
/// # Errors
///
/// - `MalformedContainer` for a truncated blob or a bad header
/// - `DecryptionFailed` if the HMAC does not match
pub(crate) fn decrypt_opdata01(blob: &[u8], key: &EncMacKey) -> Result<SecretBuffer, ImportError> {
    if blob.len() < MIN_BLOB_LEN {
        return Err(ImportError::MalformedContainer(format!(
            "opdata01 blob of {} bytes is too short",
            blob.len()
        )));
    }
    if blob.get(..MAGIC.len()) != Some(MAGIC.as_slice()) {
        return Err(ImportError::MalformedContainer("missing opdata01 header".into()));
    }
    let length = read_u64_le(blob, MAGIC.len())
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| ImportError::MalformedContainer("bad opdata01 length".into()))?;

    let (authenticated, tag) = blob.split_at(blob.len().saturating_sub(MAC_LEN));
    let (iv, ciphertext) = authenticated
        .get(HEADER_LEN..)
        .map(|rest| rest.split_at(BLOCK_LEN))
        .ok_or_else(|| ImportError::MalformedContainer("truncated opdata01 blob".into()))?;

    let padded = key.verify_then_decrypt(authenticated, tag, iv, ciphertext, CbcPadding::None)?;
    let start = padded.len().checked_sub(length).ok_or_else(|| {
        ImportError::MalformedContainer("opdata01 length exceeds payload".into())
    })?;
    let plaintext = padded.expose().get(start..).unwrap_or_default();
    Ok(SecretBuffer::new(plaintext)?)
}

/// Unwrap a profile key: decrypt the opdata01 blob, then SHA-512 of the
/// plaintext is the 32 + 32 byte key pair.
///
/// # Errors
///
/// See [`decrypt_opdata01`].
pub(crate) fn unwrap_profile_key(blob: &[u8], key: &EncMacKey) -> Result<EncMacKey, ImportError> {
    let raw = decrypt_opdata01(blob, key)?;
    Ok(EncMacKey::from_concatenated(&sha512(raw.expose()))?)
}

/// Unwrap a per-item key `IV (16) | ciphertext (64) | HMAC (32)` under the
/// master key pair.
///
/// # Errors
///
/// - `MalformedContainer` for a blob of the wrong size
/// - `DecryptionFailed` if the HMAC does not match
pub(crate) fn unwrap_item_key(blob: &[u8], master: &EncMacKey) -> Result<EncMacKey, ImportError> {
    if blob.len() != ITEM_KEY_BLOB_LEN {
        return Err(ImportError::MalformedContainer(format!(
            "item key of {} bytes, expected {ITEM_KEY_BLOB_LEN}",
            blob.len()
        )));
    }
    let (authenticated, tag) = blob.split_at(ITEM_KEY_AUTH_LEN);
    let (iv, ciphertext) = authenticated.split_at(BLOCK_LEN);
    let raw = master.verify_then_decrypt(authenticated, tag, iv, ciphertext, CbcPadding::None)?;
    Ok(EncMacKey::from_concatenated(raw.expose())?)
}

/// Sections of an `OPCLDAT` attachment file.
pub(crate) struct AttachmentParts<'a> {
    /// JSON metadata; its `overview` holds the encrypted file name.
    pub metadata: &'a [u8],
    /// opdata01 blob under the item key.
    pub content: &'a [u8],
}

/// Split an `OPCLDAT` file into metadata and content.
///
/// Header: magic (7), version (1), metadata size (u16 LE), reserved (2),
/// icon size (u32 LE). Metadata, icon and content follow.
///
/// # Errors
///
/// Returns `MalformedContainer` for a bad magic or inconsistent sizes.
pub(crate) fn split_attachment(data: &[u8]) -> Result<AttachmentParts<'_>, ImportError> {
    let malformed = |what: &str| ImportError::MalformedContainer(format!("attachment {what}"));
    if data.get(..ATTACHMENT_MAGIC.len()) != Some(ATTACHMENT_MAGIC.as_slice()) {
        return Err(malformed("has no OPCLDAT header"));
    }
    let metadata_len = data
        .get(8..10)
        .and_then(|b| b.try_into().ok())
        .map(u16::from_le_bytes)
        .ok_or_else(|| malformed("header is truncated"))?;
    let icon_len = data
        .get(12..16)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| malformed("header is truncated"))?;

    let metadata_end = ATTACHMENT_HEADER_LEN
        .checked_add(usize::from(metadata_len))
        .ok_or_else(|| malformed("metadata size overflows"))?;
    let content_start = metadata_end
        .checked_add(icon_len)
        .ok_or_else(|| malformed("icon size overflows"))?;
    let metadata = data
        .get(ATTACHMENT_HEADER_LEN..metadata_end)
        .ok_or_else(|| malformed("metadata is truncated"))?;
    let content = data
        .get(content_start..)
        .ok_or_else(|| malformed("icon is truncated"))?;
    Ok(AttachmentParts { metadata, content })
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn read_u64_le(data: &[u8], offset: usize) -> Option<u64> {
    let end = offset.checked_add(8)?;
    data.get(offset..end)?.try_into().ok().map(u64::from_le_bytes)
}

// ---------------------------------------------------------------------------
// Fixture writers
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::fixture::*;
    use super::*;

    fn key(seed: u8) -> EncMacKey {
        EncMacKey::from_concatenated(&[seed; 64]).unwrap()
    }

    #[test]
    fn opdata01_roundtrip_strips_front_padding() {
        for plaintext in [&b""[..], &b"hello"[..], &[7u8; 16][..], &[9u8; 33][..]] {
            let blob = encrypt_opdata01(plaintext, &key(1));
            let out = decrypt_opdata01(&blob, &key(1)).unwrap();
            assert_eq!(out.expose(), plaintext);
        }
    }

    #[test]
    fn opdata01_wrong_key_is_decryption_failure() {
        let blob = encrypt_opdata01(b"secret", &key(1));
        assert!(matches!(
            decrypt_opdata01(&blob, &key(2)),
            Err(ImportError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn opdata01_rejects_bad_headers() {
        let mut blob = encrypt_opdata01(b"secret", &key(1));
        assert!(matches!(
            decrypt_opdata01(&blob[..40], &key(1)),
            Err(ImportError::MalformedContainer(_))
        ));
        blob[0] = b'X';
        assert!(matches!(
            decrypt_opdata01(&blob, &key(1)),
            Err(ImportError::MalformedContainer(_))
        ));
    }

    #[test]
    fn oversized_length_field_is_malformed() {
        let mut blob = encrypt_opdata01(b"secret", &key(1));
        blob[8..16].copy_from_slice(&1000u64.to_le_bytes());
        // Re-sign so that only the length is wrong.
        let body_len = blob.len() - 32;
        let tag = keyport_crypto_core::hmac_sha256(key(1).mac_key(), &blob[..body_len]);
        blob[body_len..].copy_from_slice(&tag);
        assert!(matches!(
            decrypt_opdata01(&blob, &key(1)),
            Err(ImportError::MalformedContainer(_))
        ));
    }

    #[test]
    fn profile_and_item_keys_unwrap() {
        let derived = key(3);
        let (blob, expected) = wrap_profile_key(&[0xAB; 256], &derived);
        let master = unwrap_profile_key(&blob, &derived).unwrap();
        assert_eq!(master.enc_key(), expected.enc_key());
        assert_eq!(master.mac_key(), expected.mac_key());

        let mut raw = [0u8; 64];
        raw[..32].fill(0x11);
        raw[32..].fill(0x22);
        let wrapped = wrap_item_key(&raw, &master);
        let item = unwrap_item_key(&wrapped, &master).unwrap();
        assert_eq!(item.enc_key(), &[0x11; 32]);
        assert_eq!(item.mac_key(), &[0x22; 32]);

        assert!(matches!(
            unwrap_item_key(&wrapped[1..], &master),
            Err(ImportError::MalformedContainer(_))
        ));
    }

    #[test]
    fn attachment_file_splits() {
        let file = attachment_file(br#"{"overview":"x"}"#, b"CONTENT");
        let parts = split_attachment(&file).unwrap();
        assert_eq!(parts.metadata, br#"{"overview":"x"}"#);
        assert_eq!(parts.content, b"CONTENT");

        assert!(split_attachment(b"OPCLDA").is_err());
        let mut truncated = file.clone();
        truncated.truncate(20);
        assert!(split_attachment(&truncated).is_err());
    }
}
