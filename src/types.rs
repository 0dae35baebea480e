use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Internal numeric user identifier (`users.id`).
///
/// Assigned by the store on creation and never reused. Embedded as the `sub`
/// claim of session tokens.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Canonical local record for one authenticated person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Identity {
    pub id: UserId,
    /// Google account id. `None` for accounts not created through OAuth.
    pub provider_id: Option<String>,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Row to insert for a first-time login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIdentity {
    pub provider_id: Option<String>,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl NewIdentity {
    /// Materialize the row under the id the store assigned.
    #[must_use]
    pub fn into_identity(self, id: UserId) -> Identity {
        Identity {
            id,
            provider_id: self.provider_id,
            email: self.email,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            avatar_url: self.avatar_url,
        }
    }
}

/// Mutable profile fields refreshed on every login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl Identity {
    /// Apply refreshed profile fields, leaving id, email and handle untouched.
    #[must_use]
    pub fn with_profile(mut self, update: &ProfileUpdate) -> Self {
        self.first_name.clone_from(&update.first_name);
        self.last_name.clone_from(&update.last_name);
        self.avatar_url.clone_from(&update.avatar_url);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_serializes_as_number() {
        let json = serde_json::to_string(&UserId(42)).unwrap();
        assert_eq!(json, "42");
        let parsed: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, UserId(42));
    }

    #[test]
    fn with_profile_keeps_identity_fields() {
        let identity = NewIdentity {
            provider_id: Some("g-1".into()),
            email: "carol@example.com".into(),
            username: "carol".into(),
            first_name: Some("Carol".into()),
            last_name: None,
            avatar_url: None,
        }
        .into_identity(UserId(7));

        let refreshed = identity.with_profile(&ProfileUpdate {
            first_name: Some("Caroline".into()),
            last_name: Some("Ng".into()),
            avatar_url: Some("https://img.example/c.png".into()),
        });

        assert_eq!(refreshed.id, UserId(7));
        assert_eq!(refreshed.email, "carol@example.com");
        assert_eq!(refreshed.username, "carol");
        assert_eq!(refreshed.first_name.as_deref(), Some("Caroline"));
        assert_eq!(refreshed.last_name.as_deref(), Some("Ng"));
    }
}
