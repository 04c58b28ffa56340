//! Password-based key derivation as used by foreign vault formats.
//!
//! - [`derive_key`]: dispatch on [`KdfParams`] (PBKDF2 or Argon2id)
//! - [`KdfLimits`]: upper bounds on file-supplied cost parameters, checked
//!   before any work is done
//!
//! Parameters always come from the file being imported; nothing here picks
//! its own cost settings.

use crate::error::CryptoError;
use crate::memory::SecretBuffer;
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};
use zeroize::Zeroize;

/// Largest output any importer asks for (OPVault: 64 bytes).
const MAX_OUTPUT_LEN: usize = 1024;

/// Argon2 itself refuses salts shorter than this.
const MIN_ARGON2_SALT_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Argon2id parameter set, in `argon2` crate units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2idParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Number of iterations (time cost).
    pub t_cost: u32,
    /// Degree of parallelism (number of lanes).
    pub p_cost: u32,
}

/// HMAC hash used as the PBKDF2 pseudo-random function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrfAlgorithm {
    /// PBKDF2-HMAC-SHA256 (Bitwarden).
    HmacSha256,
    /// PBKDF2-HMAC-SHA512 (OPVault).
    HmacSha512,
}

/// PBKDF2 parameter set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pbkdf2Params {
    pub prf: PrfAlgorithm,
    pub iterations: u32,
}

/// Key derivation function plus its parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KdfParams {
    Pbkdf2(Pbkdf2Params),
    Argon2id(Argon2idParams),
}

/// Upper bounds on attacker-controlled KDF parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KdfLimits {
    /// Maximum Argon2 memory, KiB.
    pub max_memory_kib: u32,
    /// Maximum iteration count for either KDF.
    pub max_iterations: u32,
}

impl Default for KdfLimits {
    fn default() -> Self {
        Self {
            max_memory_kib: 1_048_576,
            max_iterations: 10_000_000,
        }
    }
}

impl KdfParams {
    /// Reject parameters that are zero or above `limits`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::KeyDerivation` naming the offending parameter.
    pub fn check(&self, limits: &KdfLimits) -> Result<(), CryptoError> {
        let (iterations, memory) = match self {
            Self::Pbkdf2(p) => (p.iterations, None),
            Self::Argon2id(p) => (p.t_cost, Some(p.m_cost)),
        };
        if iterations == 0 {
            return Err(CryptoError::KeyDerivation(
                "iteration count must be at least 1".into(),
            ));
        }
        if iterations > limits.max_iterations {
            return Err(CryptoError::KeyDerivation(format!(
                "iteration count {iterations} exceeds limit {}",
                limits.max_iterations
            )));
        }
        if let Some(m_cost) = memory {
            if m_cost > limits.max_memory_kib {
                return Err(CryptoError::KeyDerivation(format!(
                    "argon2 memory {m_cost} KiB exceeds limit {} KiB",
                    limits.max_memory_kib
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Derive `output_len` bytes from `password` and `salt`.
///
/// The caller is expected to have run [`KdfParams::check`] against its
/// configured limits first.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if the output length is 0 or above
/// 1024, or if the underlying KDF rejects its parameters.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
    output_len: usize,
) -> Result<SecretBuffer, CryptoError> {
    if output_len == 0 || output_len > MAX_OUTPUT_LEN {
        return Err(CryptoError::KeyDerivation(format!(
            "unsupported output length {output_len}"
        )));
    }
    let mut output = vec![0u8; output_len];
    let outcome = match params {
        KdfParams::Pbkdf2(p) => pbkdf2_into(password, salt, p, &mut output),
        KdfParams::Argon2id(p) => argon2id_into(password, salt, p, &mut output),
    };
    if let Err(e) = outcome {
        output.zeroize();
        return Err(e);
    }
    let result = SecretBuffer::new(&output)
        .map_err(|e| CryptoError::KeyDerivation(format!("secure buffer allocation failed: {e}")));
    output.zeroize();
    result
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn pbkdf2_into(
    password: &[u8],
    salt: &[u8],
    params: &Pbkdf2Params,
    output: &mut [u8],
) -> Result<(), CryptoError> {
    if params.iterations == 0 {
        return Err(CryptoError::KeyDerivation(
            "PBKDF2 iteration count must be at least 1".into(),
        ));
    }
    match params.prf {
        PrfAlgorithm::HmacSha256 => {
            pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, params.iterations, output);
        }
        PrfAlgorithm::HmacSha512 => {
            pbkdf2::pbkdf2_hmac::<Sha512>(password, salt, params.iterations, output);
        }
    }
    Ok(())
}

fn argon2id_into(
    password: &[u8],
    salt: &[u8],
    params: &Argon2idParams,
    output: &mut [u8],
) -> Result<(), CryptoError> {
    if salt.len() < MIN_ARGON2_SALT_LEN {
        return Err(CryptoError::KeyDerivation(format!(
            "salt too short: {} bytes (minimum {MIN_ARGON2_SALT_LEN})",
            salt.len()
        )));
    }

    let argon2_params = argon2::Params::new(
        params.m_cost,
        params.t_cost,
        params.p_cost,
        Some(output.len()),
    )
    .map_err(|e| CryptoError::KeyDerivation(format!("invalid argon2 params: {e}")))?;

    argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2_params,
    )
    .hash_password_into(password, salt, output)
    .map_err(|e| CryptoError::KeyDerivation(format!("argon2id derivation failed: {e}")))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
