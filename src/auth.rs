use axum::http::{HeaderMap, header};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::Deserialize;

use gateway_error::AuthError;

/// Claims the token issuer puts into gateway tokens.
///
/// Everything is optional at the decoding layer so that a token missing
/// `sub` or `tenant_id` is reported as [`AuthError::MissingClaims`] rather
/// than as an unparseable token.
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<serde_json::Value>,
    #[serde(default)]
    tenant_id: Option<serde_json::Value>,
}

/// Verified caller identity. Only [`TokenValidator::validate`] creates one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    user_id: String,
    tenant_id: String,
}

impl Principal {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    #[cfg(test)]
    pub(crate) fn for_tests(user_id: &str, tenant_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            tenant_id: tenant_id.to_string(),
        }
    }
}

/// HS256 bearer token verifier bound to the deployment-wide secret.
pub struct TokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is enforced by `validate_exp` when present, but not required
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify the signature and extract the principal.
    pub fn validate(&self, token: &str) -> Result<Principal, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            let err = match e.kind() {
                ErrorKind::InvalidSignature => AuthError::SignatureInvalid,
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Malformed,
            };
            tracing::debug!(error = %e, token_len = token.len(), "Token rejected");
            err
        })?;

        let user_id = claim_string(data.claims.sub).ok_or(AuthError::MissingClaims)?;
        let tenant_id = claim_string(data.claims.tenant_id).ok_or(AuthError::MissingClaims)?;

        Ok(Principal { user_id, tenant_id })
    }
}

/// Issuers emit ids either as strings or as numbers.
fn claim_string(value: Option<serde_json::Value>) -> Option<String> {
    let s = match value? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if s.trim().is_empty() { None } else { Some(s) }
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingBearer)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MissingBearer)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingBearer);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingBearer);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    const SECRET: &str = "test-secret";

    fn sign(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_yields_principal() {
        let validator = TokenValidator::new(SECRET);
        let token = sign(json!({"sub": "42", "tenant_id": "acme"}), SECRET);

        let principal = validator.validate(&token).unwrap();
        assert_eq!(principal.user_id(), "42");
        assert_eq!(principal.tenant_id(), "acme");
    }

    #[test]
    fn test_numeric_ids_are_accepted() {
        let validator = TokenValidator::new(SECRET);
        let token = sign(json!({"sub": 7, "tenant_id": 3}), SECRET);

        let principal = validator.validate(&token).unwrap();
        assert_eq!(principal.user_id(), "7");
        assert_eq!(principal.tenant_id(), "3");
    }

    #[test]
    fn test_missing_tenant_claim() {
        let validator = TokenValidator::new(SECRET);
        let token = sign(json!({"sub": "42"}), SECRET);
        assert_eq!(validator.validate(&token), Err(AuthError::MissingClaims));
    }

    #[test]
    fn test_missing_or_empty_subject() {
        let validator = TokenValidator::new(SECRET);
        let token = sign(json!({"tenant_id": "acme"}), SECRET);
        assert_eq!(validator.validate(&token), Err(AuthError::MissingClaims));

        let token = sign(json!({"sub": "  ", "tenant_id": "acme"}), SECRET);
        assert_eq!(validator.validate(&token), Err(AuthError::MissingClaims));
    }

    #[test]
    fn test_wrong_secret_is_signature_invalid() {
        let validator = TokenValidator::new(SECRET);
        let token = sign(json!({"sub": "42", "tenant_id": "acme"}), "other-secret");
        assert_eq!(validator.validate(&token), Err(AuthError::SignatureInvalid));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let validator = TokenValidator::new(SECRET);
        assert_eq!(validator.validate("not-a-jwt"), Err(AuthError::Malformed));
        assert_eq!(validator.validate("a.b.c"), Err(AuthError::Malformed));
    }

    #[test]
    fn test_wrong_algorithm_is_rejected() {
        let validator = TokenValidator::new(SECRET);
        let token = encode(
            &Header::new(Algorithm::HS512),
            &json!({"sub": "42", "tenant_id": "acme"}),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(validator.validate(&token).is_err());
    }

    #[test]
    fn test_expiry_enforced_only_when_present() {
        let validator = TokenValidator::new(SECRET);

        let expired = (Utc::now() - Duration::minutes(5)).timestamp();
        let token = sign(json!({"sub": "42", "tenant_id": "acme", "exp": expired}), SECRET);
        assert_eq!(validator.validate(&token), Err(AuthError::Expired));

        let future = (Utc::now() + Duration::hours(1)).timestamp();
        let token = sign(json!({"sub": "42", "tenant_id": "acme", "exp": future}), SECRET);
        assert!(validator.validate(&token).is_ok());
    }

    #[test]
    fn test_extract_bearer() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), Err(AuthError::MissingBearer));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer(&headers), Err(AuthError::MissingBearer));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer(&headers), Err(AuthError::MissingBearer));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer(&headers), Ok("abc.def.ghi"));
    }
}
