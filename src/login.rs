//! OAuth login exchange: authorization URL, code exchange, and
//! resolve-or-create of the local identity.

use std::sync::Arc;

use crate::error::Error;
use crate::handle;
use crate::oauth::{AuthorizationRequest, IdentityProvider, ProviderProfile};
use crate::pkce;
use crate::store::{IdentityStore, StoreError, UniqueField};
use crate::types::{Identity, NewIdentity, ProfileUpdate};

/// Values retained between the redirect and the callback of one login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedExchange {
    pub state: String,
    pub code_verifier: String,
}

impl From<&AuthorizationRequest> for RetainedExchange {
    fn from(req: &AuthorizationRequest) -> Self {
        Self {
            state: req.state.clone(),
            code_verifier: req.code_verifier.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    /// Returned state absent, not retained, or different from the retained one.
    #[error("Invalid OAuth state")]
    InvalidState,

    #[error("Authorization code exchange failed: {0}")]
    TokenExchangeFailed(#[source] Error),

    #[error("Fetching the provider profile failed: {0}")]
    ProfileFetchFailed(#[source] Error),

    #[error("Provider profile is missing {0}")]
    IncompleteProfile(&'static str),

    #[error("Identity storage failed: {0}")]
    Storage(#[from] StoreError),
}

/// Provider profile that passed validation: non-empty id and email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedProfile {
    pub provider_id: String,
    pub email: String,
    pub update: ProfileUpdate,
}

impl VerifiedProfile {
    #[must_use]
    pub fn new(provider_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            email: email.into(),
            update: ProfileUpdate::default(),
        }
    }
}

impl TryFrom<ProviderProfile> for VerifiedProfile {
    type Error = LoginError;

    fn try_from(profile: ProviderProfile) -> Result<Self, Self::Error> {
        let provider_id = profile.id.trim().to_string();
        if provider_id.is_empty() {
            return Err(LoginError::IncompleteProfile("id"));
        }
        let email = profile
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or(LoginError::IncompleteProfile("email"))?;

        if profile.verified_email == Some(false) {
            tracing::warn!(provider_id = %provider_id, "Provider reports email as unverified");
        }

        Ok(Self {
            provider_id,
            email,
            update: ProfileUpdate {
                first_name: profile.given_name,
                last_name: profile.family_name,
                avatar_url: profile.picture,
            },
        })
    }
}

/// Turns a provider round trip into a canonical local [`Identity`].
pub struct LoginExchanger<P, S> {
    provider: P,
    store: Arc<S>,
}

impl<P: IdentityProvider, S: IdentityStore> LoginExchanger<P, S> {
    #[must_use]
    pub fn new(provider: P, store: Arc<S>) -> Self {
        Self { provider, store }
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Start a login: the caller must retain the returned state and verifier
    /// until the callback.
    #[must_use]
    pub fn begin_login(&self) -> AuthorizationRequest {
        self.provider.authorization_url()
    }

    /// Finish a login from the provider callback.
    ///
    /// # Errors
    ///
    /// - [`LoginError::InvalidState`] unless `returned_state` equals the retained state.
    /// - [`LoginError::TokenExchangeFailed`] if the code is rejected or the call fails.
    /// - [`LoginError::ProfileFetchFailed`] if userinfo cannot be fetched.
    /// - [`LoginError::IncompleteProfile`] if the profile lacks an id or email.
    /// - [`LoginError::Storage`] if the identity cannot be resolved or persisted.
    pub async fn complete_login(
        &self,
        code: &str,
        returned_state: Option<&str>,
        retained: Option<&RetainedExchange>,
    ) -> Result<Identity, LoginError> {
        let (Some(returned), Some(retained)) = (returned_state, retained) else {
            return Err(LoginError::InvalidState);
        };
        if !pkce::states_match(returned, &retained.state) {
            return Err(LoginError::InvalidState);
        }

        let token = self
            .provider
            .exchange_code(code, &retained.code_verifier)
            .await
            .map_err(LoginError::TokenExchangeFailed)?;

        let profile = self
            .provider
            .get_user_info(&token.access_token)
            .await
            .map_err(LoginError::ProfileFetchFailed)?;

        let profile = VerifiedProfile::try_from(profile)?;

        Ok(self.resolve_or_create(&profile).await?)
    }

    /// Find the identity for `profile`, linking or creating it as needed.
    ///
    /// Lookup order: provider id, then email (linking the provider id), then
    /// a new row with a unique handle. Unique-constraint conflicts from
    /// concurrent logins resolve to the row the other login created.
    ///
    /// # Errors
    ///
    /// Any store failure other than a recoverable conflict.
    pub async fn resolve_or_create(&self, profile: &VerifiedProfile) -> Result<Identity, StoreError> {
        if let Some(identity) = self.store.find_by_provider_id(&profile.provider_id).await? {
            return Ok(self.refresh(identity, &profile.update).await);
        }

        if let Some(identity) = self.store.find_by_email(&profile.email).await? {
            return self.link(identity, profile).await;
        }

        self.create(profile).await
    }

    async fn create(&self, profile: &VerifiedProfile) -> Result<Identity, StoreError> {
        let base = handle::base_handle(&profile.email);

        for attempt in 0u32.. {
            let username = handle::candidate(&base, attempt);
            if self.store.username_taken(&username).await? {
                continue;
            }

            let row = NewIdentity {
                provider_id: Some(profile.provider_id.clone()),
                email: profile.email.clone(),
                username,
                first_name: profile.update.first_name.clone(),
                last_name: profile.update.last_name.clone(),
                avatar_url: profile.update.avatar_url.clone(),
            };

            match self.store.insert(row).await {
                Ok(identity) => {
                    tracing::info!(
                        user_id = %identity.id,
                        username = %identity.username,
                        "Created identity"
                    );
                    return Ok(identity);
                }
                Err(StoreError::Conflict(UniqueField::Username)) => {}
                Err(StoreError::Conflict(_)) => return self.refetch(profile).await,
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::Inconsistent("username candidates exhausted".into()))
    }

    /// Attach the provider id to an identity matched by email.
    async fn link(&self, identity: Identity, profile: &VerifiedProfile) -> Result<Identity, StoreError> {
        if identity.provider_id.is_some() {
            tracing::warn!(
                user_id = %identity.id,
                "Replacing provider id on identity matched by email"
            );
        }
        match self
            .store
            .link_provider_id(identity.id, &profile.provider_id)
            .await
        {
            Ok(linked) => {
                tracing::info!(user_id = %linked.id, "Linked provider account by email");
                Ok(self.refresh(linked, &profile.update).await)
            }
            // Another row took the provider id first.
            Err(StoreError::Conflict(_)) => self
                .store
                .find_by_provider_id(&profile.provider_id)
                .await?
                .ok_or_else(|| {
                    StoreError::Inconsistent("provider id owner not found on re-fetch".into())
                }),
            Err(e) => Err(e),
        }
    }

    /// Read back the row a concurrent login created, linking it when it was
    /// only matched by email.
    async fn refetch(&self, profile: &VerifiedProfile) -> Result<Identity, StoreError> {
        tracing::debug!("Identity created concurrently, re-fetching");

        if let Some(identity) = self.store.find_by_provider_id(&profile.provider_id).await? {
            return Ok(identity);
        }
        match self.store.find_by_email(&profile.email).await? {
            Some(identity) => self.link(identity, profile).await,
            None => Err(StoreError::Inconsistent(
                "conflicting identity not found on re-fetch".into(),
            )),
        }
    }

    /// Best-effort update of names and avatar; failures keep the old values.
    async fn refresh(&self, identity: Identity, update: &ProfileUpdate) -> Identity {
        match self.store.update_profile(identity.id, update).await {
            Ok(updated) => updated,
            Err(e) => {
                tracing::warn!(user_id = %identity.id, error = %e, "Profile refresh failed");
                identity
            }
        }
    }
}
