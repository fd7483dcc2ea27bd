//! # Database module — PostgreSQL pool and schema bootstrap
//!
//! [`connect`] opens the shared connection pool; [`init_schema`] creates the
//! tables and the unique indexes the resolution logic relies on. The partial
//! unique indexes on email, username, and the provider-id columns are what
//! make concurrent first-logins safe: the database, not a check-then-insert,
//! decides who wins.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL DEFAULT '',
        email TEXT,
        username TEXT,
        avatar_url TEXT,
        description TEXT,
        telegram_id TEXT,
        google_id TEXT,
        github_id TEXT,
        password_hash TEXT,
        role TEXT NOT NULL DEFAULT 'user',
        subscription_type TEXT NOT NULL DEFAULT 'free',
        subscription_expires_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS users_email_key
        ON users (email) WHERE email IS NOT NULL",
    "CREATE UNIQUE INDEX IF NOT EXISTS users_username_key
        ON users (username) WHERE username IS NOT NULL",
    "CREATE UNIQUE INDEX IF NOT EXISTS users_telegram_id_key
        ON users (telegram_id) WHERE telegram_id IS NOT NULL",
    "CREATE UNIQUE INDEX IF NOT EXISTS users_google_id_key
        ON users (google_id) WHERE google_id IS NOT NULL",
    "CREATE UNIQUE INDEX IF NOT EXISTS users_github_id_key
        ON users (github_id) WHERE github_id IS NOT NULL",
    "CREATE TABLE IF NOT EXISTS auth_sessions (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        refresh_token_hash TEXT NOT NULL UNIQUE,
        expires_at TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        revoked_at TIMESTAMPTZ
    )",
    "CREATE INDEX IF NOT EXISTS auth_sessions_user_id_idx
        ON auth_sessions (user_id)",
];

/// Open a connection pool to the database.
pub async fn connect(url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new().max_connections(5).connect(url).await
}

/// Create the tables and indexes if they don't exist.
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
