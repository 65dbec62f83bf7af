use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use carpool_core::{Identity, Role};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// passenger | driver | admin
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn identity(&self) -> Result<Identity, AppError> {
        let user_id = Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::Unauthorized("token subject is not a user id".into()))?;
        let role: Role = self.role.parse().map_err(AppError::Unauthorized)?;
        Ok(Identity::new(user_id, role))
    }
}

// ============================================================================
// Authentication Middleware
// ============================================================================

/// Resolves the bearer token into an `Identity` request extension
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 1. Extract token from Authorization header
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    // 2. Decode and validate JWT
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Unauthorized(format!("invalid token: {}", e)))?;

    // 3. Inject identity into request extensions
    let identity = token_data.claims.identity()?;
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
