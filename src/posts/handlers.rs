use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    extract::{ApiJson, ApiPath, ApiQuery},
    posts::{
        dto::{Pagination, PostInput, PostResponse},
        services::PostService,
    },
    state::AppState,
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/:id", get(get_post))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", axum::routing::post(create_post))
        .route("/posts/:id", axum::routing::put(update_post).delete(delete_post))
}

// --- handlers ---

#[instrument(skip(posts))]
pub async fn list_posts(
    State(posts): State<PostService>,
    ApiQuery(p): ApiQuery<Pagination>,
) -> Result<Json<Vec<PostResponse>>, AppError> {
    let items = posts
        .list(p.page)
        .await?
        .into_iter()
        .map(PostResponse::from)
        .collect();
    Ok(Json(items))
}

#[instrument(skip(posts))]
pub async fn get_post(
    State(posts): State<PostService>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<PostResponse>, AppError> {
    Ok(Json(posts.get(id).await?.into()))
}

#[instrument(skip(posts, auth, body), fields(user_id = auth.0.user_id))]
pub async fn create_post(
    State(posts): State<PostService>,
    auth: AuthUser,
    ApiJson(body): ApiJson<PostInput>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    let post = posts
        .create(auth.0.user_id, body.title, body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(post.into())))
}

#[instrument(skip(posts, auth, body), fields(user_id = auth.0.user_id))]
pub async fn update_post(
    State(posts): State<PostService>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<PostInput>,
) -> Result<Json<PostResponse>, AppError> {
    let post = posts
        .update(id, auth.0.user_id, body.title, body.content)
        .await?;
    Ok(Json(post.into()))
}

#[instrument(skip(posts, auth), fields(user_id = auth.0.user_id))]
pub async fn delete_post(
    State(posts): State<PostService>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, AppError> {
    posts.delete(id, auth.0.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
