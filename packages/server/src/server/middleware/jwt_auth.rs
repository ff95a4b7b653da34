use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;

use crate::domains::auth::JwtService;

/// Authenticated student information from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub moodle_id: i64,
    pub username: String,
    pub year: String,
    pub branch: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// JWT authentication middleware
///
/// Extracts the JWT token from the Authorization header, verifies it, and
/// adds AuthUser to request extensions. If no token or an invalid token,
/// the request continues without AuthUser (public endpoints still work);
/// protected handlers reject via the AuthUser extractor.
pub async fn jwt_auth_middleware(
    jwt_service: Arc<JwtService>,
    mut request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let auth_user = extract_auth_user(&request, &jwt_service);

    if let Some(user) = auth_user {
        debug!(
            "Authenticated student: {} (staff: {})",
            user.moodle_id, user.is_staff
        );
        request.extensions_mut().insert(user);
    } else {
        debug!("No valid authentication token");
    }

    next.run(request).await
}

/// Extract and verify JWT token from request
fn extract_auth_user(
    request: &axum::http::Request<axum::body::Body>,
    jwt_service: &JwtService,
) -> Option<AuthUser> {
    let auth_header = request.headers().get("authorization")?;
    let auth_str = auth_header.to_str().ok()?;

    // Handle both "Bearer <token>" and raw token
    let token = auth_str.strip_prefix("Bearer ").unwrap_or(auth_str);

    let claims = jwt_service.verify_token(token).ok()?;

    Some(AuthUser {
        moodle_id: claims.moodle_id,
        username: claims.username,
        year: claims.year,
        branch: claims.branch,
        is_staff: claims.is_staff,
        is_superuser: claims.is_superuser,
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().cloned().ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"detail": "Authentication required."})),
            )
                .into_response()
        })
    }
}
