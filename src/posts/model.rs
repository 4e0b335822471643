use thiserror::Error;
use time::OffsetDateTime;

use crate::storage::StoreError;

pub const TITLE_LEN: std::ops::RangeInclusive<usize> = 3..=255;
pub const MIN_CONTENT_LEN: usize = 10;

#[derive(Debug, Error)]
pub enum PostError {
    #[error("invalid post title")]
    InvalidTitle,
    #[error("invalid post content")]
    InvalidContent,
    #[error("post not found")]
    NotFound,
    #[error("unauthorized to modify this post")]
    Unauthorized,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub user_id: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub user_id: i64,
}

impl Post {
    pub fn is_owner(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }

    /// Validates both fields before touching either.
    pub fn update_content(
        &mut self,
        title: String,
        content: String,
        now: OffsetDateTime,
    ) -> Result<(), PostError> {
        validate_title(&title)?;
        validate_content(&content)?;
        self.title = title;
        self.content = content;
        self.updated_at = now;
        Ok(())
    }
}

pub fn validate_title(title: &str) -> Result<(), PostError> {
    if !TITLE_LEN.contains(&title.chars().count()) {
        return Err(PostError::InvalidTitle);
    }
    Ok(())
}

pub fn validate_content(content: &str) -> Result<(), PostError> {
    if content.chars().count() < MIN_CONTENT_LEN {
        return Err(PostError::InvalidContent);
    }
    Ok(())
}
