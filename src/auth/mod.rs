use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config;
use crate::database::models::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    /// Legacy single-role hint, carried for display only.
    pub role: Option<String>,
    /// Role names held at issuance. A snapshot, not an authority: guards
    /// re-query live assignments on every check.
    pub roles: Vec<String>,
    pub client_id: Option<i64>,
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user: &User, roles: Vec<String>, kind: TokenKind) -> Self {
        let now = Utc::now();
        let security = &config::config().security;
        let lifetime = match kind {
            TokenKind::Access => Duration::minutes(security.access_token_minutes),
            TokenKind::Refresh => Duration::days(security.refresh_token_days),
        };

        Self {
            sub: user.id,
            email: user.email.clone(),
            role: user.role.clone(),
            roles,
            client_id: user.client_id,
            token_type: kind.as_str().to_string(),
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug)]
pub enum TokenError {
    Invalid(String),
    WrongKind,
    MissingSecret,
    Generation(String),
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Invalid(msg) => write!(f, "invalid token: {}", msg),
            TokenError::WrongKind => write!(f, "token kind mismatch"),
            TokenError::MissingSecret => write!(f, "JWT secret not configured"),
            TokenError::Generation(msg) => write!(f, "token generation failed: {}", msg),
        }
    }
}

impl std::error::Error for TokenError {}

pub fn generate_token(claims: &Claims) -> Result<String, TokenError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TokenError::Generation(e.to_string()))
}

/// Decode and validate a token, requiring the expected kind. Expired,
/// malformed, and wrongly-signed tokens are all `Invalid`.
pub fn verify_token(token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| TokenError::Invalid(e.to_string()))?;

    if data.claims.token_type != expected.as_str() {
        return Err(TokenError::WrongKind);
    }
    Ok(data.claims)
}

/// sha256 hex digest of a presented token. Sessions store this, never the
/// raw refresh token.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "agent@example.com".to_string(),
            password_hash: "x".to_string(),
            display_name: "Agent".to_string(),
            role: Some("agent".to_string()),
            client_id: Some(7),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn access_token_round_trips() {
        let user = sample_user();
        let claims = Claims::new(&user, vec!["agent".to_string()], TokenKind::Access);
        let token = generate_token(&claims).unwrap();
        let decoded = verify_token(&token, TokenKind::Access).unwrap();
        assert_eq!(decoded.sub, user.id);
        assert_eq!(decoded.roles, vec!["agent".to_string()]);
        assert_eq!(decoded.client_id, Some(7));
        assert_eq!(decoded.token_type, "access");
    }

    #[test]
    fn refresh_token_rejected_where_access_expected() {
        let user = sample_user();
        let claims = Claims::new(&user, vec![], TokenKind::Refresh);
        let token = generate_token(&claims).unwrap();
        let err = verify_token(&token, TokenKind::Access).unwrap_err();
        assert!(matches!(err, TokenError::WrongKind));
    }

    #[test]
    fn garbage_token_is_invalid() {
        let err = verify_token("not-a-jwt", TokenKind::Access).unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)));
    }

    #[test]
    fn digest_is_stable_hex() {
        let a = token_digest("abc");
        let b = token_digest("abc");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, token_digest("abd"));
    }
}
