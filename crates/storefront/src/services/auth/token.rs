//! Bearer tokens (HS256 JWT).

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use rigshop_core::{UserId, UserRole};

use super::AuthError;
use crate::models::User;

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: UserId,
    pub email: String,
    /// Role at the time the token was issued.
    pub role: UserRole,
    /// Issued at, seconds since the epoch
    pub iat: i64,
    /// Expiration, seconds since the epoch
    pub exp: i64,
}

/// Issues and verifies tokens with a shared secret.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &SecretString, ttl_hours: i64) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `user`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenEncoding` if signing fails.
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.to_string(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(AuthError::TokenEncoding)
    }

    /// Check the signature and expiry of `token`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for anything but a valid, unexpired
    /// token signed with this secret.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected bearer token");
                AuthError::InvalidToken
            })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rigshop_core::Email;

    use super::*;

    fn service(secret: &str) -> TokenService {
        TokenService::new(&SecretString::from(secret.to_owned()), 168)
    }

    fn user() -> User {
        let now = Utc::now();
        User {
            id: UserId::new(7),
            email: Email::parse("kim@example.com").unwrap(),
            name: "Kim".to_owned(),
            role: UserRole::Manager,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let tokens = service("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%");
        let token = tokens.issue(&user()).unwrap();
        let claims = tokens.verify(&token).unwrap();

        assert_eq!(claims.sub, UserId::new(7));
        assert_eq!(claims.email, "kim@example.com");
        assert_eq!(claims.role, UserRole::Manager);
        assert_eq!(claims.exp - claims.iat, 168 * 3600);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = service("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%")
            .issue(&user())
            .unwrap();
        let other = service("zZ9#qQ1!wW2@eE3$rR4%tT5^yY6&uU7*");
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let tokens = service("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%");
        let past = Utc::now() - Duration::hours(3);
        let token = tokens
            .sign(&Claims {
                sub: UserId::new(1),
                email: "old@example.com".to_owned(),
                role: UserRole::User,
                iat: past.timestamp(),
                exp: (past + Duration::hours(1)).timestamp(),
            })
            .unwrap();
        assert!(matches!(tokens.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let tokens = service("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%");
        assert!(tokens.verify("not.a.token").is_err());
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer   xyz "), Some("xyz"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
