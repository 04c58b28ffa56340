#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for password-based key derivation.

use keyport_crypto_core::kdf::{derive_key, KdfLimits, KdfParams, Pbkdf2Params, PrfAlgorithm};
use proptest::prelude::*;

proptest! {
    /// Output length always matches the request.
    #[test]
    fn pbkdf2_output_has_requested_length(
        password in proptest::collection::vec(any::<u8>(), 0..64),
        salt in proptest::collection::vec(any::<u8>(), 0..32),
        len in 1usize..=64,
    ) {
        let params = KdfParams::Pbkdf2(Pbkdf2Params { prf: PrfAlgorithm::HmacSha256, iterations: 1 });
        let key = derive_key(&password, &salt, &params, len).unwrap();
        prop_assert_eq!(key.len(), len);
    }

    /// SHA-256 and SHA-512 PRFs never agree.
    #[test]
    fn prf_choice_changes_output(password in proptest::collection::vec(any::<u8>(), 1..32)) {
        let a = derive_key(&password, b"salt", &KdfParams::Pbkdf2(Pbkdf2Params {
            prf: PrfAlgorithm::HmacSha256, iterations: 2 }), 32).unwrap();
        let b = derive_key(&password, b"salt", &KdfParams::Pbkdf2(Pbkdf2Params {
            prf: PrfAlgorithm::HmacSha512, iterations: 2 }), 32).unwrap();
        prop_assert_ne!(a.expose(), b.expose());
    }

    /// Limit checks accept exactly the range 1..=max.
    #[test]
    fn limit_check_matches_bounds(iterations in 0u32..2_000) {
        let limits = KdfLimits { max_memory_kib: 64, max_iterations: 1_000 };
        let params = KdfParams::Pbkdf2(Pbkdf2Params { prf: PrfAlgorithm::HmacSha256, iterations });
        prop_assert_eq!(params.check(&limits).is_ok(), (1..=1_000).contains(&iterations));
    }
}
