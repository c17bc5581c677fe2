//! Tests for bearer token validation
//! Verifies claim decoding and that an expired token is reported
//! distinctly from a malformed or mis-signed one.

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use uuid::Uuid;

use tracesafe_backend::error::AppError;
use tracesafe_backend::middleware::{decode_claims, Claims};

const SECRET: &str = "test-secret";

fn token_for(role: &str, issued_at: i64, expires_at: i64) -> String {
    let claims = Claims {
        sub: Uuid::new_v4().to_string(),
        name: "Asha Pawar".to_string(),
        role: role.to_string(),
        phone: Some("+91-9000000000".to_string()),
        exp: expires_at,
        iat: issued_at,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

#[test]
fn valid_token_yields_its_claims() {
    let now = Utc::now().timestamp();
    let token = token_for("farmer", now, now + 3600);

    let claims = decode_claims(&token, SECRET).unwrap();
    assert_eq!(claims.role, "farmer");
    assert_eq!(claims.name, "Asha Pawar");
    assert!(Uuid::parse_str(&claims.sub).is_ok());
}

#[test]
fn expired_token_is_reported_as_expired() {
    let now = Utc::now().timestamp();
    let token = token_for("driver", now - 7200, now - 3600);

    match decode_claims(&token, SECRET) {
        Err(AppError::TokenExpired) => {}
        other => panic!("expected TokenExpired, got {:?}", other),
    }
}

#[test]
fn wrong_secret_is_an_invalid_token_not_expired() {
    let now = Utc::now().timestamp();
    let token = token_for("retailer", now, now + 3600);

    match decode_claims(&token, "some-other-secret") {
        Err(AppError::InvalidToken) => {}
        other => panic!("expected InvalidToken, got {:?}", other),
    }
}

#[test]
fn garbage_is_an_invalid_token() {
    match decode_claims("not-a-jwt", SECRET) {
        Err(AppError::InvalidToken) => {}
        other => panic!("expected InvalidToken, got {:?}", other),
    }
}

#[test]
fn phone_claim_is_optional() {
    let now = Utc::now().timestamp();
    let claims = serde_json::json!({
        "sub": Uuid::new_v4().to_string(),
        "name": "Ravi Kumar",
        "role": "driver",
        "exp": now + 3600,
        "iat": now,
    });
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let claims = decode_claims(&token, SECRET).unwrap();
    assert_eq!(claims.phone, None);
}
