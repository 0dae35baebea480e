use serde::Serialize;

use crate::types::{Identity, UserId};

/// Public view of an identity, as returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_picture: Option<String>,
}

impl From<Identity> for UserView {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            username: identity.username,
            email: identity.email,
            first_name: identity.first_name,
            last_name: identity.last_name,
            profile_picture: identity.avatar_url,
        }
    }
}

/// Body of a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserView,
}

/// Body of `GET {auth_path}/me`.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub user: UserView,
}
