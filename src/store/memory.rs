use parking_lot::Mutex;

use super::{IdentityStore, StoreError, UniqueField};
use crate::types::{Identity, NewIdentity, ProfileUpdate, UserId};

/// In-process identity store with the same unique constraints as the
/// `users` table.
///
/// Suitable for tests and single-instance development servers.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    last_id: i64,
    rows: Vec<Identity>,
}

impl Inner {
    fn position(&self, id: UserId) -> Result<usize, StoreError> {
        self.rows
            .iter()
            .position(|row| row.id == id)
            .ok_or_else(|| StoreError::Inconsistent(format!("no identity with id {id}")))
    }

    fn provider_id_owner(&self, provider_id: &str) -> Option<UserId> {
        self.rows
            .iter()
            .find(|row| row.provider_id.as_deref() == Some(provider_id))
            .map(|row| row.id)
    }
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find(&self, pred: impl Fn(&Identity) -> bool) -> Option<Identity> {
        self.inner.lock().rows.iter().find(|row| pred(row)).cloned()
    }
}

impl IdentityStore for MemoryIdentityStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, StoreError> {
        Ok(self.find(|row| row.id == id))
    }

    async fn find_by_provider_id(&self, provider_id: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.find(|row| row.provider_id.as_deref() == Some(provider_id)))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.find(|row| row.email == email))
    }

    async fn username_taken(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.find(|row| row.username == username).is_some())
    }

    async fn insert(&self, identity: NewIdentity) -> Result<Identity, StoreError> {
        let mut inner = self.inner.lock();

        if let Some(provider_id) = identity.provider_id.as_deref() {
            if inner.provider_id_owner(provider_id).is_some() {
                return Err(StoreError::Conflict(UniqueField::ProviderId));
            }
        }
        if inner.rows.iter().any(|row| row.email == identity.email) {
            return Err(StoreError::Conflict(UniqueField::Email));
        }
        if inner.rows.iter().any(|row| row.username == identity.username) {
            return Err(StoreError::Conflict(UniqueField::Username));
        }

        inner.last_id += 1;
        let row = identity.into_identity(UserId(inner.last_id));
        inner.rows.push(row.clone());
        Ok(row)
    }

    async fn link_provider_id(&self, id: UserId, provider_id: &str) -> Result<Identity, StoreError> {
        let mut inner = self.inner.lock();

        if inner
            .provider_id_owner(provider_id)
            .is_some_and(|owner| owner != id)
        {
            return Err(StoreError::Conflict(UniqueField::ProviderId));
        }

        let pos = inner.position(id)?;
        let row = &mut inner.rows[pos];
        row.provider_id = Some(provider_id.to_string());
        Ok(row.clone())
    }

    async fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> Result<Identity, StoreError> {
        let mut inner = self.inner.lock();
        let pos = inner.position(id)?;
        let row = inner.rows[pos].clone().with_profile(update);
        inner.rows[pos] = row.clone();
        Ok(row)
    }
}
