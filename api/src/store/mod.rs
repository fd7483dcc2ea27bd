//! # User storage port
//!
//! [`UserStore`] is the seam between identity resolution and persistence.
//! All reads and writes of canonical user records go through this trait, so
//! the same resolution logic works against PostgreSQL ([`PgUserStore`]) or
//! an in-memory map ([`MemoryUserStore`]) for tests and local development.
//!
//! `create` and `update` surface uniqueness collisions as typed errors:
//! `DuplicateEmail`, `DuplicateUsername`, or `ProviderConflict` for the
//! provider-id columns. Callers never see a raw constraint violation.

use crate::error::Result;
use crate::models::{ProviderKind, User};

mod memory;
mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

/// Field set for creating a user. Role and subscription start at their
/// defaults (`user`, `free`); the store assigns id and timestamps.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub description: Option<String>,
    pub password_hash: Option<String>,
    pub provider: Option<(ProviderKind, String)>,
}

/// Async interface for reading and writing canonical user records.
pub trait UserStore: Send + Sync {
    fn find_by_id(
        &self,
        id: i64,
    ) -> impl std::future::Future<Output = Result<Option<User>>> + Send;

    fn find_by_provider(
        &self,
        kind: ProviderKind,
        provider_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<User>>> + Send;

    fn find_by_email(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<Option<User>>> + Send;

    fn find_by_username(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<Option<User>>> + Send;

    fn create(
        &self,
        new: NewUser,
    ) -> impl std::future::Future<Output = Result<User>> + Send;

    fn update(
        &self,
        user: &User,
    ) -> impl std::future::Future<Output = Result<User>> + Send;
}
