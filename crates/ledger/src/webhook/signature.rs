//! Payment webhook signature verification.
//!
//! The provider signs each delivery with HMAC-SHA256 over
//! `"<timestamp>.<raw body>"` using the endpoint's shared secret and sends
//! the result in the `Stripe-Signature` header:
//!
//! ```text
//! Stripe-Signature: t=1700000000,v1=5257a869e7...,v0=6ffbb59b2300...
//! ```
//!
//! A delivery is authentic when any `v1` entry matches and the timestamp is
//! within the configured tolerance of the local clock (replay protection).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument};

type HmacSha256 = Hmac<Sha256>;

/// Name of the signature header.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Default allowed clock skew between provider and receiver (5 minutes).
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

/// Reasons a delivery fails verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// No signature header was sent.
    #[error("missing {SIGNATURE_HEADER} header")]
    MissingHeader,

    /// The header could not be parsed.
    #[error("malformed signature header: {0}")]
    MalformedHeader(String),

    /// The header has no `t=` entry.
    #[error("signature header has no timestamp")]
    MissingTimestamp,

    /// The header has no `v1=` entries.
    #[error("signature header has no v1 signatures")]
    NoSignatures,

    /// The timestamp is too far from the local clock.
    #[error("timestamp outside tolerance ({age_secs}s from now)")]
    TimestampOutsideTolerance {
        /// Distance between the signed timestamp and now, in seconds.
        age_secs: i64,
    },

    /// No signature matched the payload.
    #[error("no signature matches the payload")]
    Mismatch,

    /// The local clock could not be read.
    #[error("clock error: {0}")]
    Clock(String),
}

/// Parsed `Stripe-Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SignatureHeader<'a> {
    timestamp: i64,
    timestamp_raw: &'a str,
    signatures: Vec<&'a str>,
}

impl<'a> SignatureHeader<'a> {
    fn parse(header: &'a str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for item in header.split(',') {
            let (key, value) = item
                .trim()
                .split_once('=')
                .ok_or_else(|| SignatureError::MalformedHeader(format!("bad entry '{item}'")))?;

            match key {
                "t" => {
                    let parsed = value.parse::<i64>().map_err(|_| {
                        SignatureError::MalformedHeader(format!("bad timestamp '{value}'"))
                    })?;
                    timestamp = Some((parsed, value));
                }
                "v1" => signatures.push(value),
                // Other schemes (v0, future versions) are ignored.
                _ => {}
            }
        }

        let (timestamp, timestamp_raw) = timestamp.ok_or(SignatureError::MissingTimestamp)?;
        if signatures.is_empty() {
            return Err(SignatureError::NoSignatures);
        }

        Ok(Self {
            timestamp,
            timestamp_raw,
            signatures,
        })
    }
}

/// Verifies webhook deliveries against the shared signing secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
    tolerance: Duration,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"[REDACTED]")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl SignatureVerifier {
    /// Create a verifier.
    #[must_use]
    pub const fn new(secret: SecretString, tolerance: Duration) -> Self {
        Self { secret, tolerance }
    }

    /// Verify `header` against `payload` using the current time.
    ///
    /// # Errors
    ///
    /// Returns a `SignatureError` describing why the delivery is not trusted.
    #[instrument(skip_all)]
    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
        self.verify_at(payload, header, unix_now()?)
    }

    /// Verify `header` against `payload` as if the current time were `now`
    /// (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns a `SignatureError` describing why the delivery is not trusted.
    pub fn verify_at(
        &self,
        payload: &[u8],
        header: Option<&str>,
        now: i64,
    ) -> Result<(), SignatureError> {
        let header = header
            .filter(|h| !h.trim().is_empty())
            .ok_or(SignatureError::MissingHeader)?;
        let parsed = SignatureHeader::parse(header)?;

        let age_secs = now.saturating_sub(parsed.timestamp);
        let tolerance = i64::try_from(self.tolerance.as_secs()).unwrap_or(i64::MAX);
        if age_secs.saturating_abs() > tolerance {
            return Err(SignatureError::TimestampOutsideTolerance { age_secs });
        }

        let expected = self.compute(parsed.timestamp_raw, payload);

        if !parsed
            .signatures
            .iter()
            .any(|candidate| constant_time_compare(&expected, candidate))
        {
            return Err(SignatureError::Mismatch);
        }

        debug!("Webhook signature verified");
        Ok(())
    }

    /// Produce a header value signing `payload` at `timestamp`.
    ///
    /// Used by tooling and tests to build deliveries the way the provider does.
    #[must_use]
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        let timestamp = timestamp.to_string();
        format!("t={timestamp},v1={}", self.compute(&timestamp, payload))
    }

    fn compute(&self, timestamp: &str, payload: &[u8]) -> String {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.secret.expose_secret().as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }
}

fn unix_now() -> Result<i64, SignatureError> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| SignatureError::Clock(e.to_string()))?
        .as_secs();
    i64::try_from(secs).map_err(|_| SignatureError::Clock("system time overflow".to_owned()))
}

/// Constant-time string comparison to prevent timing attacks.
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
