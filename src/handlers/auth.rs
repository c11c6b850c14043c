use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::user;
use crate::error::AppResult;
use crate::handlers::MessageResponse;
use crate::services::account::{self, NewAccount, UniqueField};
use crate::utils::jwt::create_token;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub phone_number: Option<String>,
    pub emergency_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserInfo,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
}

impl From<user::Model> for UserInfo {
    fn from(u: user::Model) -> Self {
        Self {
            full_name: u.full_name(),
            id: u.id,
            username: u.username,
            email: u.email,
        }
    }
}

fn issue_token(state: &AppState, user: user::Model) -> AppResult<AuthResponse> {
    let token = create_token(
        user.id,
        &user.email,
        &state.config.jwt_secret,
        state.config.jwt_expiration_hours,
    )?;

    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}

/// Register a new account
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let user = account::register(
        &state.db,
        NewAccount {
            username: payload.username,
            email: payload.email,
            password: payload.password,
            first_name: payload.first_name,
            last_name: payload.last_name,
            phone_number: payload.phone_number,
            emergency_email: payload.emergency_email,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(issue_token(&state, user)?)))
}

/// Login with email and password
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = account::login(&state.db, &payload.email, &payload.password).await?;
    Ok(Json(issue_token(&state, user)?))
}

// ============ Availability ============

#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub is_available: bool,
}

/// Let a sign-up form check a username, email or phone number before submitting
pub async fn check_availability(
    State(state): State<AppState>,
    Query(params): Query<AvailabilityParams>,
) -> AppResult<Json<AvailabilityResponse>> {
    let field: UniqueField = params.name.parse()?;
    let is_available = account::is_available(&state.db, field, &params.value).await?;
    Ok(Json(AvailabilityResponse { is_available }))
}

// ============ Password reset ============

#[derive(Debug, Deserialize)]
pub struct PasswordOtpRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordOtpRequest>,
) -> AppResult<Json<MessageResponse>> {
    account::request_password_reset(
        &state.db,
        state.reset_otps.as_ref(),
        state.mailer.as_ref(),
        &payload.email,
    )
    .await?;

    Ok(Json(MessageResponse::new(
        "If the address is registered, an OTP has been sent",
    )))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    account::reset_password(
        &state.db,
        state.reset_otps.as_ref(),
        &payload.email,
        &payload.otp,
        &payload.new_password,
    )
    .await?;

    Ok(Json(MessageResponse::new("Password reset successful")))
}
