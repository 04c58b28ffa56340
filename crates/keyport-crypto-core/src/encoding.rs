//! Text encodings found inside exported vaults.
//!
//! Exporters are inconsistent about padding and about the base64 alphabet,
//! so the decoders accept both padded and unpadded input.

use crate::error::CryptoError;
use data_encoding::{BASE32_NOPAD, BASE64, BASE64URL_NOPAD, BASE64_NOPAD, HEXLOWER_PERMISSIVE};

/// Decode standard base64, padded or not. Surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns `CryptoError::Encoding` on invalid input.
pub fn decode_base64(input: &str) -> Result<Vec<u8>, CryptoError> {
    let trimmed = input.trim().trim_end_matches('=');
    BASE64_NOPAD
        .decode(trimmed.as_bytes())
        .map_err(|e| CryptoError::Encoding(format!("invalid base64: {e}")))
}

/// Decode URL-safe base64, padded or not.
///
/// # Errors
///
/// Returns `CryptoError::Encoding` on invalid input.
pub fn decode_base64url(input: &str) -> Result<Vec<u8>, CryptoError> {
    let trimmed = input.trim().trim_end_matches('=');
    BASE64URL_NOPAD
        .decode(trimmed.as_bytes())
        .map_err(|e| CryptoError::Encoding(format!("invalid base64url: {e}")))
}

/// Encode as padded standard base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Encode as unpadded URL-safe base64.
#[must_use]
pub fn encode_base64url_nopad(data: &[u8]) -> String {
    BASE64URL_NOPAD.encode(data)
}

/// Decode hex, case-insensitive.
///
/// # Errors
///
/// Returns `CryptoError::Encoding` on invalid input.
pub fn decode_hex(input: &str) -> Result<Vec<u8>, CryptoError> {
    HEXLOWER_PERMISSIVE
        .decode(input.trim().as_bytes())
        .map_err(|e| CryptoError::Encoding(format!("invalid hex: {e}")))
}

/// Decode an RFC 4648 base32 TOTP seed. Spaces, dashes, case and trailing
/// padding are tolerated.
///
/// # Errors
///
/// Returns `CryptoError::Encoding` on invalid input.
pub fn decode_base32(input: &str) -> Result<Vec<u8>, CryptoError> {
    let normalized = normalize_base32(input);
    BASE32_NOPAD
        .decode(normalized.as_bytes())
        .map_err(|e| CryptoError::Encoding(format!("invalid base32: {e}")))
}

/// Canonical form of a base32 seed: upper case, no separators, no padding.
#[must_use]
pub fn normalize_base32(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect::<String>()
        .trim_end_matches('=')
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_accepts_missing_padding() {
        assert_eq!(decode_base64("aGk=").unwrap(), b"hi");
        assert_eq!(decode_base64("aGk").unwrap(), b"hi");
        assert_eq!(decode_base64(" aGk=\n").unwrap(), b"hi");
    }

    #[test]
    fn base64_rejects_garbage() {
        assert!(matches!(
            decode_base64("not base64!"),
            Err(CryptoError::Encoding(_))
        ));
    }

    #[test]
    fn base64url_uses_url_alphabet() {
        let bytes = decode_base64url("o-FfiyfBQq6Qz6YVrYeFTw").unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(encode_base64url_nopad(&bytes), "o-FfiyfBQq6Qz6YVrYeFTw");
    }

    #[test]
    fn hex_is_case_insensitive() {
        assert_eq!(decode_hex("DEADbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert!(decode_hex("xyz").is_err());
    }

    #[test]
    fn base32_normalizes_seed() {
        assert_eq!(normalize_base32("jbsw y3dp-ehpk 3pxp=="), "JBSWY3DPEHPK3PXP");
        assert_eq!(decode_base32("JBSWY3DPEHPK3PXP").unwrap(), b"Hello!\xde\xad\xbe\xef");
        assert!(decode_base32("JBSWY3DPEHPK3PX1").is_err());
    }
}
