use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};

/// Public projection of a users row. The password column is never selected,
/// so no response can leak it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub dob: Date,
    pub created_at: OffsetDateTime,
}

/// Column values for a partial update; `None` fields stay untouched.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub dob: Option<Date>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.dob.is_none()
    }
}

impl User {
    pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, dob, created_at
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(users)
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, dob, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Insert a new user with an already-hashed password, returning the id.
    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
        dob: Date,
    ) -> anyhow::Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (name, email, password, dob)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(dob)
        .fetch_one(db)
        .await?;
        Ok(id)
    }

    /// Build and run an UPDATE containing only the supplied columns.
    pub async fn update(db: &PgPool, id: i64, changes: &UserChanges) -> anyhow::Result<u64> {
        if changes.is_empty() {
            anyhow::bail!("no fields to update");
        }

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
        {
            let mut fields = query.separated(", ");
            if let Some(name) = &changes.name {
                fields.push("name = ");
                fields.push_bind_unseparated(name.as_str());
            }
            if let Some(email) = &changes.email {
                fields.push("email = ");
                fields.push_bind_unseparated(email.as_str());
            }
            if let Some(hash) = &changes.password_hash {
                fields.push("password = ");
                fields.push_bind_unseparated(hash.as_str());
            }
            if let Some(dob) = changes.dob {
                fields.push("dob = ");
                fields.push_bind_unseparated(dob);
            }
        }
        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query.build().execute(db).await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(db: &PgPool, id: i64) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use time::macros::date;

    #[test]
    fn serialized_user_has_no_password_key() {
        let user = User {
            id: 3,
            name: "Ada".into(),
            email: "ada@example.com".into(),
            dob: date!(1990 - 05 - 20),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_value(&user).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert!(!keys.contains(&"password".to_string()));
        assert_eq!(json["id"], 3);
        assert_eq!(json["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn update_with_no_fields_is_rejected() {
        // Bails before any statement is built, so the lazy pool is never used.
        let state = AppState::fake();
        let err = User::update(&state.db, 1, &UserChanges::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no fields"));
    }
}
