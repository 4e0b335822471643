use std::sync::Arc;

use axum::extract::FromRef;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::{
    auth::{
        jwt::JwtKeys,
        password::{self, hash_password_blocking, verify_password_blocking, HashError},
    },
    state::AppState,
    storage::{StoreError, UniqueField},
    users::{
        dto::RegisterRequest,
        model::{
            is_valid_email, truncate_to_micros, validate_password, validate_username, NewUser,
            User, UserError,
        },
        repo::UserRepository,
    },
};

/// Hash verified against when the username is unknown, so a miss costs the
/// same as a wrong password. Built once at the configured cost, since
/// verification time follows the cost encoded in the hash.
pub fn timing_dummy_hash(cost: u32) -> Result<Arc<str>, HashError> {
    password::hash_password("not-a-real-account-password", cost).map(Arc::from)
}

#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    keys: JwtKeys,
    hash_cost: u32,
    dummy_hash: Arc<str>,
}

impl FromRef<AppState> for UserService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.users.clone(),
            state.keys.clone(),
            state.config.hash_cost,
            state.dummy_hash.clone(),
        )
    }
}

impl UserService {
    pub fn new(
        repo: Arc<dyn UserRepository>,
        keys: JwtKeys,
        hash_cost: u32,
        dummy_hash: Arc<str>,
    ) -> Self {
        Self {
            repo,
            keys,
            hash_cost,
            dummy_hash,
        }
    }

    /// Creates the account and returns it with a freshly issued token.
    pub async fn register(&self, input: RegisterRequest) -> Result<(User, String), UserError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_lowercase();

        validate_username(&username)?;
        if !is_valid_email(&email) {
            return Err(UserError::InvalidEmail);
        }
        validate_password(&input.password)?;

        if self.repo.find_by_username(&username).await?.is_some() {
            return Err(UserError::DuplicateUsername);
        }
        if self.repo.find_by_email(&email).await?.is_some() {
            return Err(UserError::DuplicateEmail);
        }

        let password_hash = hash_password_blocking(input.password, self.hash_cost).await?;
        let new_user = NewUser {
            username,
            email,
            password_hash,
            password_changed_at: truncate_to_micros(OffsetDateTime::now_utc()),
            first_name: input.first_name,
            last_name: input.last_name,
        };

        // A concurrent registration can still win the race between the
        // checks above and this insert.
        let user = self.repo.create(new_user).await.map_err(|e| match e {
            StoreError::Duplicate(UniqueField::Username) => UserError::DuplicateUsername,
            StoreError::Duplicate(UniqueField::Email) => UserError::DuplicateEmail,
            other => UserError::Store(other),
        })?;

        let token = self.keys.issue(user.id, user.password_epoch())?;
        info!(user_id = user.id, username = %user.username, "user registered");
        Ok((user, token))
    }

    /// Unknown usernames and wrong passwords are indistinguishable to the caller.
    pub async fn login(&self, username: &str, password: &str) -> Result<(User, String), UserError> {
        let Some(user) = self.repo.find_by_username(username.trim()).await? else {
            self.burn_dummy_verify(password.to_string()).await;
            warn!("login unknown username");
            return Err(UserError::InvalidCredentials);
        };

        let ok = verify_password_blocking(password.to_string(), user.password_hash.clone()).await?;
        if !ok {
            warn!(user_id = user.id, "login invalid password");
            return Err(UserError::InvalidCredentials);
        }

        // Checked only after the password matched, so account state is not
        // revealed to someone guessing.
        if !user.is_active {
            warn!(user_id = user.id, "login on inactive account");
            return Err(UserError::AccountInactive);
        }

        // The hash just verified belongs to the epoch read above. If the
        // password changed since, that hash is no longer the credential.
        let user = self
            .repo
            .record_login(user.id, OffsetDateTime::now_utc(), user.password_changed_at)
            .await
            .map_err(|e| match e {
                StoreError::Stale => {
                    warn!(user_id = user.id, "password changed during login");
                    UserError::InvalidCredentials
                }
                StoreError::NotFound => UserError::InvalidCredentials,
                other => UserError::Store(other),
            })?;

        let token = self.keys.issue(user.id, user.password_epoch())?;
        info!(user_id = user.id, "user logged in");
        Ok((user, token))
    }

    pub async fn profile(&self, user_id: i64) -> Result<User, UserError> {
        self.repo
            .find_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound)
    }

    /// Every token issued before this call stops passing the auth gate.
    pub async fn change_password(
        &self,
        user_id: i64,
        current: &str,
        new: String,
    ) -> Result<User, UserError> {
        let mut user = self.profile(user_id).await?;
        let previous_epoch = user.password_changed_at;

        let ok = verify_password_blocking(current.to_string(), user.password_hash.clone()).await?;
        if !ok {
            warn!(user_id, "change password with wrong current password");
            return Err(UserError::IncorrectPassword);
        }
        validate_password(&new)?;

        let hash = hash_password_blocking(new, self.hash_cost).await?;
        user.change_password(hash, OffsetDateTime::now_utc());
        let user = self
            .repo
            .update_password(
                user.id,
                &user.password_hash,
                user.password_changed_at,
                previous_epoch,
            )
            .await
            .map_err(|e| match e {
                StoreError::NotFound => UserError::NotFound,
                StoreError::Stale => {
                    warn!(user_id, "password changed concurrently");
                    UserError::PasswordChangeConflict
                }
                other => UserError::Store(other),
            })?;
        info!(user_id, "password changed");
        Ok(user)
    }

    async fn burn_dummy_verify(&self, plain: String) {
        let hash = self.dummy_hash.clone();
        let res = tokio::task::spawn_blocking(move || {
            let _ = password::verify_password(&plain, &hash);
        })
        .await;
        if let Err(e) = res {
            debug!(error = %e, "dummy verify task failed");
        }
    }
}
