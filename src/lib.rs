#![doc = include_str!("../README.md")]

pub mod error;
pub mod handle;
pub mod login;
pub mod middleware;
pub mod oauth;
pub mod pkce;
pub mod store;
pub mod token;
pub mod types;

// Re-exports for convenient access
pub use error::Error;
pub use login::{LoginError, LoginExchanger, RetainedExchange, VerifiedProfile};
pub use oauth::{
    AuthClient, AuthorizationRequest, IdentityProvider, OAuthConfig, ProviderProfile, TokenResponse,
};
pub use pkce::{generate_code_challenge, generate_code_verifier, generate_state};
pub use store::{IdentityStore, MemoryIdentityStore, StoreError, UniqueField};
#[cfg(feature = "postgres")]
pub use store::PgIdentityStore;
pub use token::{SESSION_TTL, SessionClaims, TokenError, TokenKeys};
pub use types::{Identity, NewIdentity, ProfileUpdate, UserId};
