//! Account handlers: registration, sign-in and token-based recovery flows.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use metricflow_core::{
    hash_password, validation, verify_against_dummy, verify_password, AuthToken, TokenKind, User,
};

use crate::auth::issue_session_token;
use crate::error::ApiError;
use crate::handlers::team::SuccessResponse;
use crate::handlers::{required, Body};
use crate::mailer::Email;
use crate::state::AppState;

/// Registration request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    /// Display name.
    pub name: Option<String>,
    /// Email address (the login).
    pub email: Option<String>,
    /// Password.
    pub password: Option<String>,
}

/// Login request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    /// Email address.
    pub email: Option<String>,
    /// Password.
    pub password: Option<String>,
}

/// Forgot password request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    /// Account email.
    pub email: Option<String>,
}

/// Reset password request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetPasswordRequest {
    /// Token from the reset email.
    pub token: Option<String>,
    /// New password.
    pub password: Option<String>,
}

/// Email verification request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyEmailRequest {
    /// Token from the verification email.
    pub token: Option<String>,
}

/// A session token and the user it belongs to.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// Bearer token for `Authorization` headers.
    pub token: String,
    /// The signed-in user.
    pub user: User,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn session_response(state: &AppState, user: User) -> Result<AuthResponse, ApiError> {
    let token = issue_session_token(
        &user.id,
        &state.config.jwt_secret,
        state.config.session_ttl_seconds,
    )?;
    Ok(AuthResponse { token, user })
}

fn invalid_token() -> ApiError {
    ApiError::BadRequest("Invalid or expired token".into())
}

/// Create an account and send a verification email.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Body(body): Body<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let email = normalize_email(&required("email", body.email)?);
    validation::email("email", &email)?;
    let password = required("password", body.password)?;
    validation::password("password", &password)?;

    let user = User::new(&email, body.name, hash_password(&password)?);
    state.store.create_user(&user).await?;

    let token = AuthToken::issue(TokenKind::EmailVerification, &email);
    state.store.put_auth_token(&token).await?;

    tracing::info!(user_id = %user.id, "User registered");

    state
        .send_email(Email::verification(
            &email,
            &state.config.app_url,
            &token.token,
        ))
        .await;

    Ok((StatusCode::CREATED, Json(session_response(&state, user)?)))
}

/// Exchange credentials for a session token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Body(body): Body<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = normalize_email(&required("email", body.email)?);
    let password = required("password", body.password)?;

    let verified = match state.store.find_user_by_email(&email).await? {
        Some(user) => verify_password(&password, &user.password_hash).then_some(user),
        None => {
            let _ = verify_against_dummy(&password);
            None
        }
    };
    let user = verified.ok_or(ApiError::Unauthorized)?;

    tracing::debug!(user_id = %user.id, "User signed in");

    Ok(Json(session_response(&state, user)?))
}

/// Start a password reset.
///
/// Responds identically whether or not the address belongs to an account. The
/// reset email is sent in the background.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Body(body): Body<ForgotPasswordRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let email = normalize_email(&required("email", body.email)?);
    validation::email("email", &email)?;

    if state.store.find_user_by_email(&email).await?.is_some() {
        let token = AuthToken::issue(TokenKind::PasswordReset, &email);
        state.store.put_auth_token(&token).await?;
        let message = Email::password_reset(&email, &state.config.app_url, &token.token);
        let state = Arc::clone(&state);
        tokio::spawn(async move { state.send_email(message).await });
    }

    Ok(Json(SuccessResponse { success: true }))
}

/// Set a new password using a reset token.
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Body(body): Body<ResetPasswordRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let token = required("token", body.token)?;
    let password = required("password", body.password)?;
    validation::password("password", &password)?;
    let password_hash = hash_password(&password)?;

    let reset = state
        .store
        .take_auth_token(TokenKind::PasswordReset, &token)
        .await?
        .filter(|t| !t.is_expired(Utc::now()))
        .ok_or_else(invalid_token)?;

    if !state
        .store
        .update_password(&reset.email, &password_hash)
        .await?
    {
        return Err(invalid_token());
    }

    tracing::info!("Password reset completed");

    Ok(Json(SuccessResponse { success: true }))
}

/// Confirm an email address.
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Body(body): Body<VerifyEmailRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let token = required("token", body.token)?;

    let now = Utc::now();
    let verification = state
        .store
        .take_auth_token(TokenKind::EmailVerification, &token)
        .await?
        .filter(|t| !t.is_expired(now))
        .ok_or_else(invalid_token)?;

    if !state
        .store
        .mark_email_verified(&verification.email, now)
        .await?
    {
        return Err(invalid_token());
    }

    Ok(Json(SuccessResponse { success: true }))
}
