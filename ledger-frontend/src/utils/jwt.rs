use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub app_metadata: Value,
}

impl JwtClaims {
    /// `user_metadata.role` or `app_metadata.role` equal to `admin`.
    pub fn says_admin(&self) -> bool {
        [&self.user_metadata, &self.app_metadata]
            .iter()
            .any(|meta| meta.get("role").and_then(Value::as_str) == Some("admin"))
    }
}

/// Decode JWT claims without validation
///
/// The access token comes straight from the auth service's token grant over
/// TLS and every backend call re-validates it, so the frontend only reads
/// the subject, expiry and role metadata from it.
pub fn decode_jwt_claims(token: &str) -> Result<JwtClaims> {
    let parts: Vec<&str> = token.split('.').collect();

    if parts.len() != 3 {
        return Err(anyhow::anyhow!("Invalid JWT format"));
    }

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| anyhow::anyhow!("Failed to decode JWT payload: {}", e))?;

    let claims: JwtClaims = serde_json::from_slice(&payload)
        .map_err(|e| anyhow::anyhow!("Failed to parse JWT claims: {}", e))?;

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token_with(payload: Value) -> String {
        let encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("eyJhbGciOiJIUzI1NiJ9.{}.signature", encoded)
    }

    #[test]
    fn test_decode_jwt_claims() {
        let token = token_with(json!({
            "sub": "5b1f2c8e-0000-4000-8000-000000000001",
            "email": "ana@loja.com",
            "exp": 9999999999i64,
            "role": "authenticated",
            "user_metadata": { "full_name": "Ana" }
        }));

        let claims = decode_jwt_claims(&token).unwrap();
        assert_eq!(claims.sub, "5b1f2c8e-0000-4000-8000-000000000001");
        assert_eq!(claims.email.as_deref(), Some("ana@loja.com"));
        assert!(!claims.says_admin());
    }

    #[test]
    fn admin_role_in_app_metadata() {
        let token = token_with(json!({
            "sub": "u1",
            "exp": 1,
            "app_metadata": { "role": "admin" }
        }));
        assert!(decode_jwt_claims(&token).unwrap().says_admin());
    }

    #[test]
    fn rejects_malformed_token() {
        assert!(decode_jwt_claims("not-a-jwt").is_err());
    }
}
