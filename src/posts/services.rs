use std::sync::Arc;

use axum::extract::FromRef;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    posts::{
        model::{validate_content, validate_title, NewPost, Post, PostError},
        repo::PostRepository,
    },
    state::AppState,
    storage::StoreError,
    users::model::truncate_to_micros,
};

pub const PAGE_SIZE: i64 = 10;

#[derive(Clone)]
pub struct PostService {
    repo: Arc<dyn PostRepository>,
}

impl FromRef<AppState> for PostService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.posts.clone())
    }
}

fn not_found_or_store(e: StoreError) -> PostError {
    match e {
        StoreError::NotFound => PostError::NotFound,
        other => PostError::Store(other),
    }
}

impl PostService {
    pub fn new(repo: Arc<dyn PostRepository>) -> Self {
        Self { repo }
    }

    /// One page of posts, newest first. Pages start at 1.
    pub async fn list(&self, page: i64) -> Result<Vec<Post>, PostError> {
        let page = page.max(1);
        let offset = (page - 1).saturating_mul(PAGE_SIZE);
        Ok(self.repo.find_all(PAGE_SIZE, offset).await?)
    }

    pub async fn get(&self, id: i64) -> Result<Post, PostError> {
        self.repo.find_by_id(id).await?.ok_or(PostError::NotFound)
    }

    pub async fn create(
        &self,
        owner_id: i64,
        title: String,
        content: String,
    ) -> Result<Post, PostError> {
        validate_title(&title)?;
        validate_content(&content)?;
        let post = self
            .repo
            .create(NewPost {
                title,
                content,
                user_id: owner_id,
            })
            .await?;
        info!(post_id = post.id, user_id = owner_id, "post created");
        Ok(post)
    }

    /// `caller_id` must be the authenticated user; ownership is decided on
    /// the stored post only.
    pub async fn update(
        &self,
        id: i64,
        caller_id: i64,
        title: String,
        content: String,
    ) -> Result<Post, PostError> {
        let mut post = self.get(id).await?;
        if !post.is_owner(caller_id) {
            warn!(post_id = id, user_id = caller_id, owner_id = post.user_id, "update by non-owner");
            return Err(PostError::Unauthorized);
        }
        post.update_content(title, content, truncate_to_micros(OffsetDateTime::now_utc()))?;
        let post = self.repo.update(&post).await.map_err(not_found_or_store)?;
        info!(post_id = id, user_id = caller_id, "post updated");
        Ok(post)
    }

    pub async fn delete(&self, id: i64, caller_id: i64) -> Result<(), PostError> {
        let post = self.get(id).await?;
        if !post.is_owner(caller_id) {
            warn!(post_id = id, user_id = caller_id, owner_id = post.user_id, "delete by non-owner");
            return Err(PostError::Unauthorized);
        }
        self.repo.delete(id).await.map_err(not_found_or_store)?;
        info!(post_id = id, user_id = caller_id, "post deleted");
        Ok(())
    }
}
