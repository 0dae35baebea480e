use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row};

use super::{IdentityStore, StoreError, UniqueField};
use crate::types::{Identity, NewIdentity, ProfileUpdate, UserId};

/// Identity store backed by the Postgres `users` table.
#[derive(Debug, Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded migrations (identity columns and unique constraints).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(StoreError::backend)
    }

    async fn fetch_optional(
        &self,
        query: Query<'_, Postgres, PgArguments>,
    ) -> Result<Option<Identity>, StoreError> {
        query
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .map(|row| row_to_identity(&row))
            .transpose()
    }
}

fn row_to_identity(row: &PgRow) -> Result<Identity, StoreError> {
    let read = || -> Result<Identity, sqlx::Error> {
        Ok(NewIdentity {
            provider_id: row.try_get("google_id")?,
            email: row.try_get("email")?,
            username: row.try_get("username")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            avatar_url: row.try_get("profile_picture_url")?,
        }
        .into_identity(UserId(row.try_get("id")?)))
    };
    read().map_err(StoreError::backend)
}

/// Unique violations on the identity columns become [`StoreError::Conflict`].
fn map_sqlx_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let field = match db.constraint() {
                Some("users_google_id_key") => Some(UniqueField::ProviderId),
                Some("users_email_key") => Some(UniqueField::Email),
                Some("users_username_key") => Some(UniqueField::Username),
                _ => None,
            };
            if let Some(field) = field {
                return StoreError::Conflict(field);
            }
        }
    }
    StoreError::backend(e)
}

impl IdentityStore for PgIdentityStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, StoreError> {
        self.fetch_optional(
            sqlx::query(
                "SELECT id, google_id, email, username, first_name, last_name, profile_picture_url \
             FROM users WHERE id = $1",
            )
            .bind(id.0),
        )
        .await
    }

    async fn find_by_provider_id(&self, provider_id: &str) -> Result<Option<Identity>, StoreError> {
        self.fetch_optional(
            sqlx::query(
                "SELECT id, google_id, email, username, first_name, last_name, profile_picture_url \
             FROM users WHERE google_id = $1",
            )
            .bind(provider_id),
        )
        .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        self.fetch_optional(
            sqlx::query(
                "SELECT id, google_id, email, username, first_name, last_name, profile_picture_url \
             FROM users WHERE email = $1",
            )
            .bind(email),
        )
        .await
    }

    async fn username_taken(&self, username: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.try_get::<bool, _>(0).map_err(StoreError::backend)
    }

    async fn insert(&self, identity: NewIdentity) -> Result<Identity, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (google_id, email, username, first_name, last_name, profile_picture_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, google_id, email, username, first_name, last_name, profile_picture_url
            "#,
        )
        .bind(&identity.provider_id)
        .bind(&identity.email)
        .bind(&identity.username)
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .bind(&identity.avatar_url)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row_to_identity(&row)
    }

    async fn link_provider_id(&self, id: UserId, provider_id: &str) -> Result<Identity, StoreError> {
        self.fetch_optional(
            sqlx::query(
                r#"
            UPDATE users SET google_id = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING id, google_id, email, username, first_name, last_name, profile_picture_url
            "#,
            )
            .bind(provider_id)
            .bind(id.0),
        )
        .await?
        .ok_or_else(|| StoreError::Inconsistent(format!("no identity with id {id}")))
    }

    async fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> Result<Identity, StoreError> {
        self.fetch_optional(
            sqlx::query(
                r#"
            UPDATE users
            SET first_name = $1, last_name = $2, profile_picture_url = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING id, google_id, email, username, first_name, last_name, profile_picture_url
            "#,
            )
            .bind(&update.first_name)
            .bind(&update.last_name)
            .bind(&update.avatar_url)
            .bind(id.0),
        )
        .await?
        .ok_or_else(|| StoreError::Inconsistent(format!("no identity with id {id}")))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as StdError;
    use std::fmt;

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    /// Driver error naming the violated constraint.
    #[derive(Debug)]
    struct ConstraintError {
        unique: bool,
        constraint: &'static str,
    }

    impl fmt::Display for ConstraintError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "violates constraint {}", self.constraint)
        }
    }

    impl StdError for ConstraintError {}

    impl DatabaseError for ConstraintError {
        fn message(&self) -> &str {
            "constraint violation"
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn constraint(&self) -> Option<&str> {
            Some(self.constraint)
        }

        fn kind(&self) -> ErrorKind {
            if self.unique {
                ErrorKind::UniqueViolation
            } else {
                ErrorKind::ForeignKeyViolation
            }
        }
    }

    fn violation(unique: bool, constraint: &'static str) -> StoreError {
        map_sqlx_error(sqlx::Error::Database(Box::new(ConstraintError { unique, constraint })))
    }

    #[test]
    fn migration_constraints_map_to_fields() {
        let cases = [
            ("users_google_id_key", UniqueField::ProviderId),
            ("users_email_key", UniqueField::Email),
            ("users_username_key", UniqueField::Username),
        ];
        for (constraint, field) in cases {
            match violation(true, constraint) {
                StoreError::Conflict(got) => assert_eq!(got, field, "{constraint}"),
                other => panic!("{constraint}: expected conflict, got {other}"),
            }
        }
    }

    #[test]
    fn migration_declares_mapped_constraints() {
        let migration = include_str!("../../migrations/20250801000000_create_users.sql");
        for constraint in ["users_google_id_key", "users_email_key", "users_username_key"] {
            assert!(migration.contains(constraint), "{constraint}");
        }
    }

    #[test]
    fn unknown_constraint_is_backend_error() {
        assert!(matches!(
            violation(true, "users_phone_key"),
            StoreError::Backend(_)
        ));
    }

    #[test]
    fn other_violation_kinds_are_backend_errors() {
        assert!(matches!(
            violation(false, "users_email_key"),
            StoreError::Backend(_)
        ));
    }

    #[test]
    fn non_database_errors_are_backend_errors() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            StoreError::Backend(_)
        ));
    }
}
