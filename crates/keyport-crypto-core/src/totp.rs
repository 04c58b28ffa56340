//! TOTP settings as they appear in exported vaults.
//!
//! Exporters store one-time-password configuration in three shapes:
//! `otpauth://totp/...` URIs, `steam://SECRET`, or a bare base32 seed.
//! [`TotpSettings::parse`] accepts all three; [`TotpSettings::to_uri`]
//! renders the canonical `otpauth://` form.

use crate::encoding::{decode_base32, normalize_base32};
use crate::CryptoError;
use std::fmt;
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ── Constants ───────────────────────────────────────────────────────

/// Default TOTP period in seconds (RFC 6238 §4).
pub const DEFAULT_PERIOD: u32 = 30;

/// Default code length.
pub const DEFAULT_DIGITS: u8 = 6;

/// Steam Guard codes are always five characters.
pub const STEAM_DIGITS: u8 = 5;

const OTPAUTH_PREFIX: &str = "otpauth:";
const STEAM_PREFIX: &str = "steam://";

// ── Types ───────────────────────────────────────────────────────────

/// HMAC algorithm used for OTP generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OtpAlgorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl OtpAlgorithm {
    /// Name used in `otpauth://` URIs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }

    fn parse(value: &str) -> Result<Self, CryptoError> {
        match value.to_ascii_uppercase().replace('-', "").as_str() {
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            other => Err(CryptoError::Otp(format!("unsupported algorithm {other}"))),
        }
    }
}

/// How the HOTP value is rendered into a code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OtpEncoder {
    /// Decimal digits (RFC 6238).
    #[default]
    Rfc6238,
    /// Steam Guard alphabet.
    Steam,
}

/// Parsed TOTP configuration. The seed is kept as normalized base32.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct TotpSettings {
    secret: String,
    #[zeroize(skip)]
    digits: u8,
    #[zeroize(skip)]
    step: u32,
    #[zeroize(skip)]
    algorithm: OtpAlgorithm,
    #[zeroize(skip)]
    encoder: OtpEncoder,
}

impl fmt::Debug for TotpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TotpSettings")
            .field("secret", &"***")
            .field("digits", &self.digits)
            .field("step", &self.step)
            .field("algorithm", &self.algorithm)
            .field("encoder", &self.encoder)
            .finish()
    }
}

impl TotpSettings {
    /// Build settings from a base32 seed.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Otp` for an empty or non-base32 seed, zero
    /// digits/step, or more than 10 digits.
    pub fn new(
        seed: &str,
        digits: u8,
        step: u32,
        algorithm: OtpAlgorithm,
    ) -> Result<Self, CryptoError> {
        let secret = normalize_base32(seed);
        if secret.is_empty() {
            return Err(CryptoError::Otp("seed must not be empty".into()));
        }
        decode_base32(&secret).map_err(|e| CryptoError::Otp(format!("invalid seed: {e}")))?;
        if digits == 0 || digits > 10 {
            return Err(CryptoError::Otp(format!("unsupported digit count {digits}")));
        }
        if step == 0 {
            return Err(CryptoError::Otp("period must be > 0".into()));
        }
        Ok(Self {
            secret,
            digits,
            step,
            algorithm,
            encoder: OtpEncoder::Rfc6238,
        })
    }

    /// Parse an `otpauth://` URI, a `steam://` seed or a bare base32 seed.
    ///
    /// URIs without `digits` or `period` get 6 and 30.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Otp` if the value is none of the accepted
    /// shapes or carries invalid parameters.
    pub fn parse(value: &str) -> Result<Self, CryptoError> {
        let value = value.trim();
        if strip_prefix_ignore_case(value, OTPAUTH_PREFIX).is_some() {
            return Self::parse_otpauth(value);
        }
        if let Some(seed) = strip_prefix_ignore_case(value, STEAM_PREFIX) {
            let mut settings = Self::new(seed, STEAM_DIGITS, DEFAULT_PERIOD, OtpAlgorithm::Sha1)?;
            settings.encoder = OtpEncoder::Steam;
            return Ok(settings);
        }
        Self::new(value, DEFAULT_DIGITS, DEFAULT_PERIOD, OtpAlgorithm::Sha1)
    }

    fn parse_otpauth(value: &str) -> Result<Self, CryptoError> {
        let uri = Url::parse(value).map_err(|e| CryptoError::Otp(format!("invalid URI: {e}")))?;
        if uri.host_str().is_some_and(|h| h.eq_ignore_ascii_case("hotp")) {
            return Err(CryptoError::Otp("HOTP counters are not supported".into()));
        }

        let mut secret = None;
        let mut digits = DEFAULT_DIGITS;
        let mut step = DEFAULT_PERIOD;
        let mut algorithm = OtpAlgorithm::Sha1;
        let mut steam = false;
        for (key, val) in uri.query_pairs() {
            match key.to_ascii_lowercase().as_str() {
                "secret" => secret = Some(val.into_owned()),
                "digits" => {
                    digits = val
                        .parse()
                        .map_err(|_| CryptoError::Otp(format!("invalid digits {val}")))?;
                }
                "period" => {
                    step = val
                        .parse()
                        .map_err(|_| CryptoError::Otp(format!("invalid period {val}")))?;
                }
                "algorithm" => algorithm = OtpAlgorithm::parse(&val)?,
                "encoder" => steam = val.eq_ignore_ascii_case("steam"),
                _ => {}
            }
        }

        let secret = secret.ok_or_else(|| CryptoError::Otp("URI has no secret".into()))?;
        if steam {
            digits = STEAM_DIGITS;
        }
        let mut settings = Self::new(&secret, digits, step, algorithm)?;
        if steam {
            settings.encoder = OtpEncoder::Steam;
        }
        Ok(settings)
    }

    /// Normalized base32 seed.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    #[must_use]
    pub const fn digits(&self) -> u8 {
        self.digits
    }

    /// Time step in seconds.
    #[must_use]
    pub const fn step(&self) -> u32 {
        self.step
    }

    #[must_use]
    pub const fn algorithm(&self) -> OtpAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub const fn encoder(&self) -> OtpEncoder {
        self.encoder
    }

    /// Render as `otpauth://totp/<issuer>:<label>?secret=...`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Otp` if the URI cannot be assembled.
    pub fn to_uri(&self, label: &str, issuer: &str) -> Result<String, CryptoError> {
        let mut uri = Url::parse("otpauth://totp/")
            .map_err(|e| CryptoError::Otp(format!("invalid URI: {e}")))?;
        let path = if issuer.is_empty() {
            label.to_owned()
        } else {
            format!("{issuer}:{label}")
        };
        uri.set_path(&path);
        {
            let mut query = uri.query_pairs_mut();
            query
                .append_pair("secret", &self.secret)
                .append_pair("period", &self.step.to_string())
                .append_pair("digits", &self.digits.to_string());
            if !issuer.is_empty() {
                query.append_pair("issuer", issuer);
            }
            if self.algorithm != OtpAlgorithm::Sha1 {
                query.append_pair("algorithm", self.algorithm.as_str());
            }
            if self.encoder == OtpEncoder::Steam {
                query.append_pair("encoder", "steam");
            }
        }
        Ok(uri.into())
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        value.get(prefix.len()..)
    } else {
        None
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_seed_with_defaults() {
        let s = TotpSettings::parse("jbsw y3dp ehpk 3pxp").unwrap();
        assert_eq!(s.secret(), "JBSWY3DPEHPK3PXP");
        assert_eq!(s.digits(), 6);
        assert_eq!(s.step(), 30);
        assert_eq!(s.algorithm(), OtpAlgorithm::Sha1);
        assert_eq!(s.encoder(), OtpEncoder::Rfc6238);
    }

    #[test]
    fn parses_full_otpauth_uri() {
        let s = TotpSettings::parse(
            "otpauth://totp/ACME:john?secret=JBSWY3DPEHPK3PXP&digits=8&period=45&algorithm=sha256",
        )
        .unwrap();
        assert_eq!(s.digits(), 8);
        assert_eq!(s.step(), 45);
        assert_eq!(s.algorithm(), OtpAlgorithm::Sha256);
    }

    #[test]
    fn otpauth_without_digits_and_period_gets_defaults() {
        let s = TotpSettings::parse("otpauth://totp/Example?secret=JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(s.digits(), 6);
        assert_eq!(s.step(), 30);
    }

    #[test]
    fn parses_steam_seed() {
        let s = TotpSettings::parse("steam://JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(s.encoder(), OtpEncoder::Steam);
        assert_eq!(s.digits(), STEAM_DIGITS);

        let s = TotpSettings::parse("otpauth://totp/Steam?secret=JBSWY3DPEHPK3PXP&encoder=steam")
            .unwrap();
        assert_eq!(s.encoder(), OtpEncoder::Steam);
        assert_eq!(s.digits(), STEAM_DIGITS);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(TotpSettings::parse("").is_err());
        assert!(TotpSettings::parse("not a seed!").is_err());
        assert!(TotpSettings::parse("otpauth://totp/x?digits=6").is_err());
        assert!(TotpSettings::parse("otpauth://hotp/x?secret=JBSWY3DPEHPK3PXP&counter=1").is_err());
        assert!(TotpSettings::parse("otpauth://totp/x?secret=JBSWY3DPEHPK3PXP&period=0").is_err());
        assert!(TotpSettings::parse("otpauth://totp/x?secret=JBSWY3DPEHPK3PXP&algorithm=md5").is_err());
    }

    #[test]
    fn uri_roundtrips_through_parse() {
        let s = TotpSettings::new("JBSWY3DPEHPK3PXP", 8, 45, OtpAlgorithm::Sha512).unwrap();
        let uri = s.to_uri("john doe", "ACME").unwrap();
        assert!(uri.starts_with("otpauth://totp/ACME:john%20doe?secret=JBSWY3DPEHPK3PXP"));
        assert!(uri.contains("issuer=ACME"));
        assert!(uri.contains("algorithm=SHA512"));
        assert_eq!(TotpSettings::parse(&uri).unwrap(), s);
    }

    #[test]
    fn debug_masks_secret() {
        let s = TotpSettings::parse("JBSWY3DPEHPK3PXP").unwrap();
        let debug = format!("{s:?}");
        assert!(!debug.contains("JBSWY3DPEHPK3PXP"));
        assert!(debug.contains("digits: 6"));
    }
}
