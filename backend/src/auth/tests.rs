use super::*;
use axum::http::Request;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;

const SECRET: &str = "supersecretjwtsecretforunittesting123";
const MERCHANT_ID: &str = "123e4567-e89b-12d3-a456-426614174000";

fn token(secret: &str, sub: &str, exp: usize) -> String {
    let claims = json!({
        "sub": sub,
        "role": "authenticated",
        "email": "merchant@example.com",
        "aud": "authenticated",
        "exp": exp,
    });

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

async fn extract(authorization: Option<String>) -> Result<AuthMerchant, (StatusCode, String)> {
    let mut builder = Request::builder().uri("/api/v1/merchant/transactions");
    if let Some(value) = authorization {
        builder = builder.header(axum::http::header::AUTHORIZATION, value);
    }
    let (mut parts, _) = builder.body(()).unwrap().into_parts();

    AuthMerchant::from_request_parts(&mut parts, &JwtSecret::new(SECRET)).await
}

#[test]
fn test_validate_supabase_jwt_success() {
    let claims = validate_supabase_jwt(&token(SECRET, MERCHANT_ID, 9999999999), SECRET)
        .expect("Valid token should pass");
    assert_eq!(claims.sub, MERCHANT_ID);
    assert_eq!(claims.email.as_deref(), Some("merchant@example.com"));
}

#[test]
fn test_validate_supabase_jwt_expired() {
    let result = validate_supabase_jwt(&token(SECRET, MERCHANT_ID, 1), SECRET);
    assert!(result.is_err());
}

#[test]
fn test_validate_supabase_jwt_invalid_signature() {
    let result = validate_supabase_jwt(&token("wrongsecret", MERCHANT_ID, 9999999999), SECRET);
    assert!(result.is_err());
}

#[tokio::test]
async fn extracts_merchant_from_bearer_token() {
    let merchant = extract(Some(format!(
        "Bearer {}",
        token(SECRET, MERCHANT_ID, 9999999999)
    )))
    .await
    .unwrap();

    assert_eq!(merchant.merchant_id, Uuid::parse_str(MERCHANT_ID).unwrap());
    assert_eq!(merchant.role, "authenticated");
}

#[tokio::test]
async fn rejects_missing_or_malformed_authorization() {
    let (status, _) = extract(None).await.unwrap_err();
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let raw = token(SECRET, MERCHANT_ID, 9999999999);
    let (status, _) = extract(Some(format!("Token {raw}"))).await.unwrap_err();
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, message) = extract(Some(format!(
        "Bearer {}",
        token(SECRET, "not-a-uuid", 9999999999)
    )))
    .await
    .unwrap_err();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message, "Invalid merchant ID in token");
}
