use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::{
    storage::StoreError,
    users::{
        model::{NewUser, User},
        repo_types::UserRow,
    },
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    /// Sets `last_login` only. Fails with `StoreError::Stale` when the
    /// password changed after `expected_epoch` was read.
    async fn record_login(
        &self,
        id: i64,
        at: OffsetDateTime,
        expected_epoch: OffsetDateTime,
    ) -> Result<User, StoreError>;
    /// Writes the hash and epoch only, and only if the stored epoch is still
    /// `expected_epoch`. Two racing changes cannot both win.
    async fn update_password(
        &self,
        id: i64,
        password_hash: &str,
        changed_at: OffsetDateTime,
        expected_epoch: OffsetDateTime,
    ) -> Result<User, StoreError>;
}

const USER_COLUMNS: &str = "id, username, email, password_hash, password_changed_at, \
     first_name, last_name, created_at, updated_at, last_login, is_active";

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::from))
    }

    /// A guarded UPDATE that touched nothing either lost the race or hit a
    /// missing row; tell the two apart.
    async fn guarded(&self, id: i64, row: Option<UserRow>) -> Result<User, StoreError> {
        match row {
            Some(row) => Ok(row.into()),
            None => match self.find_by_id(id).await? {
                Some(_) => Err(StoreError::Stale),
                None => Err(StoreError::NotFound),
            },
        }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_one("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one("email", email).await
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (username, email, password_hash, password_changed_at, first_name, last_name)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.password_changed_at)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .fetch_one(&self.db)
            .await?;
        Ok(row.into())
    }

    async fn record_login(
        &self,
        id: i64,
        at: OffsetDateTime,
        expected_epoch: OffsetDateTime,
    ) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
               SET last_login = $2
             WHERE id = $1 AND password_changed_at = $3
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(at)
            .bind(expected_epoch)
            .fetch_optional(&self.db)
            .await?;
        self.guarded(id, row).await
    }

    async fn update_password(
        &self,
        id: i64,
        password_hash: &str,
        changed_at: OffsetDateTime,
        expected_epoch: OffsetDateTime,
    ) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
               SET password_hash = $2, password_changed_at = $3, updated_at = now()
             WHERE id = $1 AND password_changed_at = $4
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(password_hash)
            .bind(changed_at)
            .bind(expected_epoch)
            .fetch_optional(&self.db)
            .await?;
        self.guarded(id, row).await
    }
}
