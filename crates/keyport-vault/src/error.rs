//! Import error types for `keyport-vault`.

use keyport_crypto_core::CryptoError;
use thiserror::Error;

/// Errors produced while converting a foreign vault.
///
/// `MalformedContainer`, `DecryptionFailed`, `UnsupportedSchema` and `Io`
/// abort a conversion. `PartialItemFailure` describes a single skipped item
/// and only ever travels inside the warning list.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The file or directory is not a readable instance of the format
    /// (bad JSON, truncated blob, missing profile, bad base64).
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// Wrong password or tampered ciphertext.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Valid container, but a variant this importer cannot handle.
    #[error("unsupported: {0}")]
    UnsupportedSchema(String),

    /// One item could not be imported; the rest of the vault was.
    #[error("item {index} ({title}) skipped: {reason}")]
    PartialItemFailure {
        /// Position of the item in source order.
        index: usize,
        /// Item title, empty when the title itself was unreadable.
        title: String,
        reason: String,
    },

    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CryptoError> for ImportError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Decryption => {
                Self::DecryptionFailed("wrong password or corrupted data".into())
            }
            other => Self::MalformedContainer(other.to_string()),
        }
    }
}
