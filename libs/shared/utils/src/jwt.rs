use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use shared_models::auth::{JwtClaims, User};
use shared_models::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Verifies an HS256 access token and returns its user.
///
/// Tokens expiring within `margin` are treated as already expired so a request
/// never starts with a session that lapses mid-flight.
pub fn validate_token(token: &str, jwt_secret: &str, margin: Duration) -> Result<User, AppError> {
    validate_token_at(token, jwt_secret, margin, Utc::now())
}

pub fn validate_token_at(
    token: &str,
    jwt_secret: &str,
    margin: Duration,
    now: DateTime<Utc>,
) -> Result<User, AppError> {
    if jwt_secret.is_empty() {
        return Err(AppError::Internal("JWT secret is not set".to_string()));
    }

    let parts: Vec<&str> = token.split('.').collect();
    let [header_b64, claims_b64, signature_b64] = parts.as_slice() else {
        return Err(AppError::Auth("Invalid token format".to_string()));
    };

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        debug!("Failed to decode signature: {}", e);
        AppError::Auth("Invalid signature encoding".to_string())
    })?;

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| AppError::Internal("Failed to create HMAC".to_string()))?;
    mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err(AppError::Auth("Invalid token signature".to_string()));
    }

    let claims_json = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| AppError::Auth("Invalid claims encoding".to_string()))?;

    let claims: JwtClaims = serde_json::from_str(&claims_json).map_err(|e| {
        debug!("Failed to parse claims: {}", e);
        AppError::Auth("Invalid claims format".to_string())
    })?;

    if let Some(exp) = claims.exp {
        let deadline = (now + margin).timestamp();
        if exp as i64 <= deadline {
            debug!("Token expires at {} (deadline: {})", exp, deadline);
            return Err(AppError::AuthExpired("Session expired, please sign in again".to_string()));
        }
    }

    let created_at = claims.iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = User {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        metadata: claims.user_metadata,
        created_at,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::test_utils::{JwtTestUtils, TestUser};

    const SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

    #[test]
    fn accepts_fresh_token() {
        let user = TestUser::admin("admin@clinic.test");
        let token = JwtTestUtils::create_test_token(&user, SECRET, Some(1));

        let validated = validate_token(&token, SECRET, Duration::seconds(60)).unwrap();
        assert_eq!(validated.id, user.id);
        assert_eq!(validated.email.as_deref(), Some("admin@clinic.test"));
    }

    #[test]
    fn token_inside_safety_margin_is_expired() {
        let user = TestUser::professional("dra@clinic.test");
        let token = JwtTestUtils::create_test_token(&user, SECRET, Some(1));

        let result = validate_token(&token, SECRET, Duration::hours(2));
        assert_matches!(result, Err(AppError::AuthExpired(_)));
    }

    #[test]
    fn rejects_wrong_signature_and_garbage() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_invalid_signature_token(&user);

        assert_matches!(validate_token(&token, SECRET, Duration::zero()), Err(AppError::Auth(_)));
        assert_matches!(
            validate_token(&JwtTestUtils::create_malformed_token(), SECRET, Duration::zero()),
            Err(AppError::Auth(_))
        );
        assert_matches!(
            validate_token("a.b", SECRET, Duration::zero()),
            Err(AppError::Auth(msg)) if msg == "Invalid token format"
        );
    }
}
