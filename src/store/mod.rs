//! Identity persistence.
//!
//! The login flow only needs the identity columns of the `users` table. Both
//! implementations enforce uniqueness of provider id, email and username and
//! report violations as [`StoreError::Conflict`] so concurrent first logins
//! can be reconciled instead of failing.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

use std::future::Future;

pub use memory::MemoryIdentityStore;
#[cfg(feature = "postgres")]
pub use postgres::PgIdentityStore;

use crate::types::{Identity, NewIdentity, ProfileUpdate, UserId};

/// Column guarded by a unique constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum UniqueField {
    #[display("provider_id")]
    ProviderId,
    #[display("email")]
    Email,
    #[display("username")]
    Username,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A write collided with an existing row.
    #[error("unique constraint violated on {0}")]
    Conflict(UniqueField),

    /// A row the store just reported as conflicting could not be read back.
    #[error("inconsistent identity store: {0}")]
    Inconsistent(String),

    /// Driver or connection failure.
    #[error("identity store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Consumer-provided identity persistence.
///
/// # Example
///
/// ```rust,ignore
/// impl IdentityStore for MyStore {
///     async fn find_by_provider_id(&self, provider_id: &str)
///         -> Result<Option<Identity>, StoreError>
///     {
///         self.repo.user_by_google_id(provider_id).await.map_err(StoreError::backend)
///     }
///     // ...
/// }
/// ```
pub trait IdentityStore: Send + Sync + 'static {
    fn find_by_id(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<Identity>, StoreError>> + Send;

    fn find_by_provider_id(
        &self,
        provider_id: &str,
    ) -> impl Future<Output = Result<Option<Identity>, StoreError>> + Send;

    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<Identity>, StoreError>> + Send;

    /// Whether `username` is currently in use.
    fn username_taken(&self, username: &str)
    -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Insert a row in one atomic step.
    ///
    /// Fails with [`StoreError::Conflict`] naming the violated column.
    fn insert(
        &self,
        identity: NewIdentity,
    ) -> impl Future<Output = Result<Identity, StoreError>> + Send;

    /// Attach `provider_id` to an existing identity and return the updated row.
    fn link_provider_id(
        &self,
        id: UserId,
        provider_id: &str,
    ) -> impl Future<Output = Result<Identity, StoreError>> + Send;

    /// Overwrite the mutable profile fields of an identity.
    fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> impl Future<Output = Result<Identity, StoreError>> + Send;
}

impl StoreError {
    /// Wrap any driver error.
    pub fn backend(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(e))
    }
}
