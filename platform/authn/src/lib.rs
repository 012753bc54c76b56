//! Local credential handling: argon2 password hashes plus short-lived JWT
//! access tokens and longer-lived refresh tokens.
//!
//! A refresh token carries the id of its `refresh_tokens` row in `jti`, so the
//! server can revoke and rotate it without storing the token itself.

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use platform_authz::Role;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthnError {
    #[error("token rejected: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("expected a {expected:?} token")]
    WrongKind { expected: TokenKind },
    #[error("token carries unknown role {0}")]
    UnknownRole(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
}

pub type AuthnResult<T> = Result<T, AuthnError>;

#[derive(Clone, Debug)]
pub struct TokenConfig {
    pub secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

impl TokenConfig {
    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.secret.as_bytes())
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.secret.as_bytes())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub jti: Uuid,
    pub role: String,
    pub kind: TokenKind,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Verified access token subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessSubject {
    pub user_id: Uuid,
    pub role: Role,
}

pub fn issue_access_token(
    user_id: Uuid,
    role: Role,
    config: &TokenConfig,
) -> AuthnResult<IssuedToken> {
    issue(
        user_id,
        Uuid::new_v4(),
        role,
        TokenKind::Access,
        Duration::minutes(config.access_ttl_minutes),
        config,
    )
}

/// `token_id` must be the primary key of the persisted refresh-token row.
pub fn issue_refresh_token(
    user_id: Uuid,
    token_id: Uuid,
    role: Role,
    config: &TokenConfig,
) -> AuthnResult<IssuedToken> {
    issue(
        user_id,
        token_id,
        role,
        TokenKind::Refresh,
        Duration::days(config.refresh_ttl_days),
        config,
    )
}

fn issue(
    user_id: Uuid,
    token_id: Uuid,
    role: Role,
    kind: TokenKind,
    ttl: Duration,
    config: &TokenConfig,
) -> AuthnResult<IssuedToken> {
    let now = Utc::now();
    let expires_at = now.checked_add_signed(ttl).unwrap_or(now);
    let claims = Claims {
        sub: user_id,
        jti: token_id,
        role: role.as_str().to_string(),
        kind,
        exp: expires_at.timestamp() as usize,
        iat: now.timestamp() as usize,
    };
    let token = jsonwebtoken::encode(&Header::default(), &claims, &config.encoding_key())?;
    Ok(IssuedToken {
        token,
        id: token_id,
        expires_at,
    })
}

pub fn decode_token(token: &str, kind: TokenKind, config: &TokenConfig) -> AuthnResult<Claims> {
    let claims = jsonwebtoken::decode::<Claims>(token, &config.decoding_key(), &Validation::default())
        .map(|data| data.claims)?;
    if claims.kind != kind {
        return Err(AuthnError::WrongKind { expected: kind });
    }
    Ok(claims)
}

pub fn verify_access_token(token: &str, config: &TokenConfig) -> AuthnResult<AccessSubject> {
    let claims = decode_token(token, TokenKind::Access, config)?;
    let role = Role::parse(&claims.role).map_err(|_| AuthnError::UnknownRole(claims.role))?;
    Ok(AccessSubject {
        user_id: claims.sub,
        role,
    })
}

pub fn hash_password(password: &str) -> AuthnResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthnError::Hash(err.to_string()))
}

/// Returns `false` for a wrong password and for unparsable stored hashes.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TokenConfig {
        TokenConfig {
            secret: "test-secret-that-is-long-enough-for-hs256".into(),
            access_ttl_minutes: 15,
            refresh_ttl_days: 7,
        }
    }

    #[test]
    fn access_token_round_trips_subject() {
        let user_id = Uuid::new_v4();
        let issued = issue_access_token(user_id, Role::Manager, &config()).unwrap();
        let subject = verify_access_token(&issued.token, &config()).unwrap();
        assert_eq!(subject.user_id, user_id);
        assert_eq!(subject.role, Role::Manager);
    }

    #[test]
    fn refresh_token_is_not_accepted_as_access_token() {
        let row_id = Uuid::new_v4();
        let issued = issue_refresh_token(Uuid::new_v4(), row_id, Role::Hr, &config()).unwrap();
        assert_eq!(issued.id, row_id);
        let err = verify_access_token(&issued.token, &config()).unwrap_err();
        assert!(matches!(
            err,
            AuthnError::WrongKind {
                expected: TokenKind::Access
            }
        ));
        let claims = decode_token(&issued.token, TokenKind::Refresh, &config()).unwrap();
        assert_eq!(claims.jti, row_id);
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let issued = issue_access_token(Uuid::new_v4(), Role::Employee, &config()).unwrap();
        let other = TokenConfig {
            secret: "a-completely-different-secret-value!!".into(),
            ..config()
        };
        assert!(matches!(
            verify_access_token(&issued.token, &other),
            Err(AuthnError::Token(_))
        ));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let expired = TokenConfig {
            access_ttl_minutes: -10,
            ..config()
        };
        let issued = issue_access_token(Uuid::new_v4(), Role::Employee, &expired).unwrap();
        assert!(verify_access_token(&issued.token, &config()).is_err());
    }

    #[test]
    fn passwords_verify_against_their_hash_only() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }
}
