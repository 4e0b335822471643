use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    extract::ApiJson,
    state::AppState,
    users::{
        dto::{
            AuthResponse, ChangePasswordRequest, LoginRequest, MessageResponse, ProfileResponse,
            PublicUser, RegisterRequest,
        },
        services::UserService,
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/change-password", post(change_password))
}

#[instrument(skip(users, payload), fields(username = %payload.username))]
pub async fn register(
    State(users): State<UserService>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let (user, token) = users.register(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: PublicUser::from(&user),
        }),
    ))
}

#[instrument(skip(users, payload), fields(username = %payload.username))]
pub async fn login(
    State(users): State<UserService>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let (user, token) = users.login(&payload.username, &payload.password).await?;
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(users, auth), fields(user_id = auth.0.user_id))]
pub async fn get_profile(
    State(users): State<UserService>,
    auth: AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = users.profile(auth.0.user_id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(users, auth, payload), fields(user_id = auth.0.user_id))]
pub async fn change_password(
    State(users): State<UserService>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    users
        .change_password(
            auth.0.user_id,
            &payload.current_password,
            payload.new_password,
        )
        .await?;
    Ok(Json(MessageResponse {
        message: "Password changed successfully",
    }))
}
