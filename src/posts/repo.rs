use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    posts::{
        model::{NewPost, Post},
        repo_types::PostRow,
    },
    storage::StoreError,
};

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Newest first.
    async fn find_all(&self, limit: i64, offset: i64) -> Result<Vec<Post>, StoreError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, StoreError>;
    async fn create(&self, post: NewPost) -> Result<Post, StoreError>;
    async fn update(&self, post: &Post) -> Result<Post, StoreError>;
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgPostRepository {
    db: PgPool,
}

impl PgPostRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn find_all(&self, limit: i64, offset: i64) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, title, content, user_id, created_at, updated_at
            FROM posts
            ORDER BY id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, StoreError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, title, content, user_id, created_at, updated_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Post::from))
    }

    async fn create(&self, post: NewPost) -> Result<Post, StoreError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (title, content, user_id)
            VALUES ($1, $2, $3)
            RETURNING id, title, content, user_id, created_at, updated_at
            "#,
        )
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(row.into())
    }

    async fn update(&self, post: &Post) -> Result<Post, StoreError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            UPDATE posts
               SET title = $2, content = $3, updated_at = $4
             WHERE id = $1
            RETURNING id, title, content, user_id, created_at, updated_at
            "#,
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.updated_at)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound)?;
        Ok(row.into())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
