//! PostgreSQL-backed user store.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::error::{AuthError, Result};
use crate::models::{ProviderKind, SubscriptionTier, User, UserRole};

use super::{NewUser, UserStore};

const USER_COLUMNS: &str = "id, name, email, username, avatar_url, description, \
     telegram_id, google_id, github_id, password_hash, \
     role, subscription_type, subscription_expires_at, created_at, updated_at";

/// Raw `users` row; role and tier are TEXT columns.
#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: Option<String>,
    username: Option<String>,
    avatar_url: Option<String>,
    description: Option<String>,
    telegram_id: Option<String>,
    google_id: Option<String>,
    github_id: Option<String>,
    password_hash: Option<String>,
    role: String,
    subscription_type: String,
    subscription_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            username: row.username,
            avatar_url: row.avatar_url,
            description: row.description,
            telegram_id: row.telegram_id,
            google_id: row.google_id,
            github_id: row.github_id,
            password_hash: row.password_hash,
            role: UserRole::parse(&row.role),
            subscription: SubscriptionTier::parse(&row.subscription_type),
            subscription_expires_at: row.subscription_expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_column(&self, column: &str, value: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row: Option<UserRow> = sqlx::query_as(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }
}

impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row: Option<UserRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_provider(
        &self,
        kind: ProviderKind,
        provider_id: &str,
    ) -> Result<Option<User>> {
        let column = match kind {
            ProviderKind::Telegram => "telegram_id",
            ProviderKind::Google => "google_id",
            ProviderKind::Github => "github_id",
            ProviderKind::Password => return Ok(None),
        };
        self.find_by_column(column, provider_id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_by_column("email", email).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.find_by_column("username", username).await
    }

    async fn create(&self, new: NewUser) -> Result<User> {
        let mut telegram_id = None;
        let mut google_id = None;
        let mut github_id = None;
        match new.provider {
            Some((ProviderKind::Telegram, id)) => telegram_id = Some(id),
            Some((ProviderKind::Google, id)) => google_id = Some(id),
            Some((ProviderKind::Github, id)) => github_id = Some(id),
            Some((ProviderKind::Password, _)) | None => {}
        }

        let query = format!(
            "INSERT INTO users \
                 (name, email, username, avatar_url, description, password_hash, \
                  telegram_id, google_id, github_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {USER_COLUMNS}"
        );
        let row: UserRow = sqlx::query_as(&query)
            .bind(&new.name)
            .bind(&new.email)
            .bind(&new.username)
            .bind(&new.avatar_url)
            .bind(&new.description)
            .bind(&new.password_hash)
            .bind(&telegram_id)
            .bind(&google_id)
            .bind(&github_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_unique_violation)?;
        Ok(row.into())
    }

    async fn update(&self, user: &User) -> Result<User> {
        let query = format!(
            "UPDATE users SET \
                 name = $2, email = $3, username = $4, avatar_url = $5, \
                 description = $6, password_hash = $7, telegram_id = $8, \
                 google_id = $9, github_id = $10, role = $11, \
                 subscription_type = $12, subscription_expires_at = $13, \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let row: Option<UserRow> = sqlx::query_as(&query)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.avatar_url)
            .bind(&user.description)
            .bind(&user.password_hash)
            .bind(&user.telegram_id)
            .bind(&user.google_id)
            .bind(&user.github_id)
            .bind(user.role.as_str())
            .bind(user.subscription.as_str())
            .bind(user.subscription_expires_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_unique_violation)?;
        row.map(User::from).ok_or(AuthError::UserNotFound)
    }
}

/// Translate a unique-index violation into the matching typed error; any
/// other database failure passes through.
fn map_unique_violation(err: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(ref db) = err {
        if db.is_unique_violation() {
            return match db.constraint() {
                Some("users_email_key") => AuthError::DuplicateEmail,
                Some("users_username_key") => AuthError::DuplicateUsername,
                _ => AuthError::ProviderConflict,
            };
        }
    }
    AuthError::Database(err)
}
