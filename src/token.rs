use std::fmt;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::types::{Identity, UserId};

/// Lifetime of every session token. Not configurable per request.
pub const SESSION_TTL: Duration = Duration::days(7);

/// The only algorithm tokens are signed with or accepted under.
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims embedded in a session token.
///
/// `sub` travels as a decimal string (RFC 7519 `StringOrURI`); `email` is a
/// copy for downstream handlers that should not need a database read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(with = "subject")]
    pub sub: UserId,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.sub
    }

    /// `true` once `now` has reached `exp`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now.unix_timestamp() >= self.exp
    }
}

mod subject {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::types::UserId;

    pub(super) fn serialize<S: Serializer>(id: &UserId, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(id)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UserId, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<i64>().map(UserId).map_err(D::Error::custom)
    }
}

/// Token issuance and verification failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// No `Authorization: Bearer <token>` credential on the request.
    #[error("Missing bearer token")]
    MissingCredential,

    /// Malformed token, bad signature, or an algorithm other than HS256.
    #[error("Invalid token")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,

    /// The signing secret is unusable.
    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// HS256 keys for minting and checking session tokens.
///
/// Built once at startup from the server secret and shared by cloning
/// (the keys live behind an `Arc`).
#[derive(Clone)]
pub struct TokenKeys {
    inner: Arc<KeysInner>,
}

struct KeysInner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    has_secret: bool,
}

impl TokenKeys {
    /// Derive signing and verification keys from a shared secret.
    ///
    /// An empty secret is accepted here so the error surfaces where it
    /// matters: [`issue`](Self::issue) fails with [`TokenError::Signing`] and
    /// every token fails verification. Configuration loading rejects it first.
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();

        let mut validation = Validation::new(ALGORITHM);
        // Expiry is checked against the caller's clock in `verify_at`.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            inner: Arc::new(KeysInner {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                validation,
                has_secret: !secret.is_empty(),
            }),
        }
    }

    /// Whether a non-empty secret was supplied.
    #[must_use]
    pub fn has_secret(&self) -> bool {
        self.inner.has_secret
    }

    /// Mint a token for `identity`, valid for [`SESSION_TTL`] from now.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if the secret is empty or encoding fails.
    pub fn issue(&self, identity: &Identity) -> Result<String, TokenError> {
        self.issue_at(identity, OffsetDateTime::now_utc())
    }

    /// Mint a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if the secret is empty or encoding fails.
    pub fn issue_at(&self, identity: &Identity, now: OffsetDateTime) -> Result<String, TokenError> {
        if !self.inner.has_secret {
            return Err(TokenError::Signing("signing secret is empty".into()));
        }

        let claims = SessionClaims {
            sub: identity.id,
            email: identity.email.clone(),
            iat: now.unix_timestamp(),
            exp: (now + SESSION_TTL).unix_timestamp(),
        };

        jsonwebtoken::encode(&Header::new(ALGORITHM), &claims, &self.inner.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify a raw token against the current time.
    ///
    /// # Errors
    ///
    /// See [`verify_at`](Self::verify_at).
    pub fn verify(&self, raw: &str) -> Result<SessionClaims, TokenError> {
        self.verify_at(raw, OffsetDateTime::now_utc())
    }

    /// Verify a raw token as if the current time were `now`.
    ///
    /// The signature is checked first; expiry is only reported for tokens
    /// whose signature is valid.
    ///
    /// # Errors
    ///
    /// - [`TokenError::MissingCredential`] for an empty token.
    /// - [`TokenError::InvalidSignature`] if the token is malformed, its
    ///   signature does not verify, its header names any algorithm but HS256,
    ///   or no secret is configured.
    /// - [`TokenError::Expired`] if `now >= exp`.
    pub fn verify_at(&self, raw: &str, now: OffsetDateTime) -> Result<SessionClaims, TokenError> {
        if raw.is_empty() {
            return Err(TokenError::MissingCredential);
        }
        if !self.inner.has_secret {
            return Err(TokenError::InvalidSignature);
        }

        let data = jsonwebtoken::decode::<SessionClaims>(
            raw,
            &self.inner.decoding,
            &self.inner.validation,
        )
        .map_err(|e| {
            tracing::debug!(error = %e, "Session token rejected");
            TokenError::InvalidSignature
        })?;

        if data.claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }
}

impl fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenKeys")
            .field("algorithm", &ALGORITHM)
            .field("has_secret", &self.inner.has_secret)
            .finish_non_exhaustive()
    }
}
