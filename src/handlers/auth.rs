use super::common::success_response;
use crate::{
    auth::{AuthUser, IssuedToken},
    errors::ServiceError,
    i18n::{self, Locale},
    services::users::UserProfile,
    ApiResponse, AppState,
};
use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::Response,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: IssuedToken,
    pub user: UserProfile,
}

fn with_cookie(mut response: Response, cookie: &str) -> Result<Response, ServiceError> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| ServiceError::InternalError(format!("invalid cookie header: {e}")))?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(response)
}

#[utoipa::path(
    post,
    path = "/auth/login",
    summary = "Log in",
    description = "Verify credentials, set the session cookie and return the token",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    locale: Locale,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ServiceError> {
    payload.validate()?;

    let (user, site_ids) = state
        .services
        .users
        .verify_credentials(&payload.username, &payload.password)
        .await?;
    let token = state.auth.generate_token(&user, &site_ids)?;
    let cookie = state.auth.session_cookie(&token.access_token);

    info!(user_id = user.user_id, "user logged in");
    let body = LoginResponse {
        token,
        user: UserProfile {
            user_id: user.user_id,
            username: user.username,
            display_name: user.display_name,
            role: user.role,
            site_ids,
        },
    };

    with_cookie(
        success_response(body, Some(i18n::message("auth.login", locale))),
        &cookie,
    )
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    summary = "Log out",
    description = "Revoke the current token and clear the session cookie",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Not authenticated", body = crate::errors::ErrorResponse),
    ),
    tag = "Auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    locale: Locale,
) -> Result<Response, ServiceError> {
    state.auth.revoke(&user.token_id, user.expires_at).await;
    info!(user_id = user.user_id, "user logged out");

    with_cookie(
        success_response((), Some(i18n::message("auth.logout", locale))),
        &state.auth.expired_cookie(),
    )
}

#[utoipa::path(
    get,
    path = "/auth/me",
    summary = "Current user",
    responses(
        (status = 200, description = "Current user and assigned sites", body = ApiResponse<UserProfile>),
        (status = 401, description = "Not authenticated", body = crate::errors::ErrorResponse),
    ),
    tag = "Auth"
)]
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ServiceError> {
    let profile = state.services.users.profile(user.user_id).await?;
    Ok(success_response(profile, None))
}
