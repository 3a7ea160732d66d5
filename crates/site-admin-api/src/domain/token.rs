//! Stateless signed session tokens.
//!
//! Wire form: `base64url(claims_json) "." base64url(hmac_sha256(claims_b64))`.
//! Claims carry the client name and the issue time in Unix seconds. There is
//! no server-side session store; validity is the signature plus the age.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::config::ConfigError;

type HmacSha256 = Hmac<Sha256>;

/// Maximum clock skew for tokens issued "in the future" (seconds)
pub const MAX_FUTURE_SKEW: u64 = 10;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    client_name: String,
    iat: u64,
}

/// Outcome of [`TokenCodec::verify`].
///
/// Every failure mode collapses to `valid == false` with no identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    pub identity: Option<String>,
}

impl Verification {
    fn rejected() -> Self {
        Self {
            valid: false,
            identity: None,
        }
    }

    fn accepted(identity: String) -> Self {
        Self {
            valid: true,
            identity: Some(identity),
        }
    }
}

/// Issues and verifies session tokens with a shared secret
#[derive(Clone)]
pub struct TokenCodec {
    mac: HmacSha256,
    max_age: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], max_age: Duration) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| ConfigError::Invalid(format!("token secret: {}", e)))?;
        Ok(Self { mac, max_age })
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Sign a token for `identity` issued now.
    pub fn issue(&self, identity: &str) -> String {
        self.issue_at(identity, current_timestamp())
    }

    pub fn issue_at(&self, identity: &str, iat: u64) -> String {
        let claims = Claims {
            client_name: identity.to_string(),
            iat,
        };
        // Serializing a struct of a string and an integer cannot fail.
        let json = serde_json::to_vec(&claims).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(payload.as_bytes()));
        format!("{}.{}", payload, signature)
    }

    pub fn verify(&self, token: &str) -> Verification {
        self.verify_at(token, current_timestamp())
    }

    /// Verify against an explicit clock. Never fails loudly.
    pub fn verify_at(&self, token: &str, now: u64) -> Verification {
        let Some((payload, signature)) = token.rsplit_once('.') else {
            return Verification::rejected();
        };
        let Ok(signature) = URL_SAFE_NO_PAD.decode(signature) else {
            return Verification::rejected();
        };

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        // Constant-time comparison
        if mac.verify_slice(&signature).is_err() {
            return Verification::rejected();
        }

        let claims: Claims = match URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|raw| serde_json::from_slice(&raw).ok())
        {
            Some(c) => c,
            None => return Verification::rejected(),
        };

        if claims.iat > now.saturating_add(MAX_FUTURE_SKEW) {
            return Verification::rejected();
        }
        if now.saturating_sub(claims.iat) > self.max_age.as_secs() {
            return Verification::rejected();
        }

        Verification::accepted(claims.client_name)
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Returns the current Unix timestamp, or 0 if the clock is before the epoch.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
