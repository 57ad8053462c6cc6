use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::auth::{login_user, logout_user, AuthUser};
use crate::error::AppError;
use crate::models::{User, UserView};
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    invite_code: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE invite_code = ?")
        .bind(&payload.invite_code)
        .fetch_optional(&state.db)
        .await?;

    let Some(user) = user else {
        return Err(AppError::InvalidCredentials);
    };

    tracing::info!(user_id = %user.id, "user logged in");
    login_user(&session, user.clone()).await?;
    Ok(Json(UserView::from(user)))
}

async fn logout(session: Session) -> Result<impl IntoResponse, AppError> {
    logout_user(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(AuthUser(user): AuthUser) -> impl IntoResponse {
    Json(UserView::from(user))
}
