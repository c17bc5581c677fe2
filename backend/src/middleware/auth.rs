//! Authentication middleware
//!
//! Token issuance lives in a separate auth service; this middleware only
//! validates the bearer JWT and exposes the acting identity and role to
//! handlers. Roles are a closed enum so handler dispatch is exhaustive.

use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::{AppError, ErrorResponse};
use crate::models::ActorRole;

/// Authenticated actor extracted from the JWT
#[derive(Clone, Debug)]
pub struct CurrentActor {
    pub user_id: uuid::Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub role: ActorRole,
}

/// Authentication middleware that validates bearer JWTs
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return unauthorized_response("Missing or invalid Authorization header");
        }
    };

    // Secret from environment; middleware runs without router state
    let jwt_secret = std::env::var("TSF__JWT__SECRET")
        .or_else(|_| std::env::var("TSF_JWT_SECRET"))
        .unwrap_or_else(|_| "development-secret-key".to_string());

    let claims = match decode_claims(token, &jwt_secret) {
        Ok(claims) => claims,
        Err(e) => {
            return e.into_response();
        }
    };

    let user_id = match uuid::Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return unauthorized_response("Invalid user ID in token"),
    };

    let role = match ActorRole::from_str(&claims.role) {
        Some(role) => role,
        None => return unauthorized_response("Unknown role in token"),
    };

    let actor = CurrentActor {
        user_id,
        name: claims.name,
        phone: claims.phone,
        role,
    };

    request.extensions_mut().insert(actor);

    next.run(request).await
}

/// JWT claims structure
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Decode and validate a bearer JWT. An expired token is reported
/// distinctly so clients know to refresh rather than re-authenticate.
pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, AppError> {
    use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    AppError::Unauthorized(message.to_string()).into_response()
}

/// Role guard for use in handlers
pub fn require_role(actor: &CurrentActor, role: ActorRole) -> Result<(), AppError> {
    if actor.role == role || actor.role == ActorRole::Admin {
        Ok(())
    } else {
        Err(AppError::InsufficientPermissions)
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentActor>()
            .cloned()
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: crate::error::ErrorDetail {
                        code: "UNAUTHORIZED".to_string(),
                        message: "Authentication required".to_string(),
                        field: None,
                        current_status: None,
                    },
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}
