use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::{verify_token, Claims, TokenKind};
use crate::error::ApiError;

/// Authenticated caller, decoded from the access token and injected as a
/// request extension by [`authenticate`].
///
/// `role` and `roles` are the snapshot taken at token issuance and are for
/// display only; guards always re-query the role tables.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Option<String>,
    pub roles: Vec<String>,
    pub client_id: Option<i64>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
            roles: claims.roles,
            client_id: claims.client_id,
        }
    }
}

/// Access-token authentication for everything under `/api`.
///
/// A missing header, a malformed token, and an expired token all produce
/// the same 401 body, so the response never reveals which part failed.
pub async fn authenticate(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&headers).ok_or_else(|| {
        tracing::debug!("Request rejected: no bearer token");
        ApiError::unauthorized("Authentication required")
    })?;

    let claims = verify_token(&token, TokenKind::Access).map_err(|e| {
        tracing::debug!(error = %e, "Request rejected: access token failed verification");
        ApiError::unauthorized("Authentication required")
    })?;

    request.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(request).await)
}

/// Pull the token out of an `Authorization: Bearer <token>` header.
fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        let headers = headers_with("Bearer abc.def.ghi");
        assert_eq!(
            extract_bearer_token(&headers),
            Some("abc.def.ghi".to_string())
        );
    }

    #[test]
    fn rejects_missing_and_malformed_headers() {
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
        assert_eq!(extract_bearer_token(&headers_with("Basic xyz")), None);
        assert_eq!(extract_bearer_token(&headers_with("Bearer ")), None);
    }
}
