use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::user::{Relations, User};
use crate::infrastructure::security::PreparedUser;

const EMAIL_CONSTRAINT: &str = "users_email_key";

/// Storage for user records. Writes only accept [`PreparedUser`], so a
/// plaintext password cannot reach an implementation. Email uniqueness is
/// the store's job and must be enforced atomically with the write.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Assigns the identifier and both timestamps.
    async fn insert(&self, user: PreparedUser) -> Result<User, DomainError>;
    /// Replaces every mutable field of `id` and bumps `updated_at`.
    async fn update(&self, id: Uuid, user: PreparedUser) -> Result<User, DomainError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DomainError>;
    /// `email` must already be normalized.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError>;
    /// Results follow the order of `ids`; unknown identifiers are skipped.
    async fn find_many_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, DomainError>;
    async fn delete(&self, id: Uuid) -> Result<(), DomainError>;
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    name: String,
    role: String,
    avatar: Option<String>,
    class_id: Option<Uuid>,
    teacher_id: Option<Uuid>,
    parent_id: Option<Uuid>,
    student_ids: Vec<Uuid>,
    class_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse().map_err(|e| {
            DomainError::Internal(format!("corrupt role for user {}: {}", row.id, e))
        })?;
        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            name: row.name,
            role,
            avatar: row.avatar,
            relations: Relations {
                class_id: row.class_id,
                teacher_id: row.teacher_id,
                parent_id: row.parent_id,
                student_ids: row.student_ids,
                class_ids: row.class_ids,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn map_write_error(e: sqlx::Error, email: &str) -> DomainError {
    if e.as_database_error()
        .and_then(|db| db.constraint())
        .map(|c| c == EMAIL_CONSTRAINT)
        == Some(true)
    {
        DomainError::UserAlreadyExists(email.to_string())
    } else {
        DomainError::Internal(format!("database error: {}", e))
    }
}

/// `ANY($1)` returns rows in no particular order. Puts them back in the
/// order of `ids`, skipping unknown ids and repeating duplicated ones.
fn in_request_order(ids: &[Uuid], users: Vec<User>) -> Vec<User> {
    let by_id: HashMap<Uuid, User> = users.into_iter().map(|u| (u.id, u)).collect();
    ids.iter().filter_map(|id| by_id.get(id).cloned()).collect()
}

const USER_COLUMNS: &str = "id, email, password_hash, name, role, avatar, class_id, teacher_id, \
     parent_id, student_ids, class_ids, created_at, updated_at";

#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn insert(&self, user: PreparedUser) -> Result<User, DomainError> {
        let id = Uuid::new_v4();
        let relations = user.relations();
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, name, role, avatar,
                               class_id, teacher_id, parent_id, student_ids, class_ids)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user.email())
        .bind(user.password_hash())
        .bind(user.name())
        .bind(user.role().as_str())
        .bind(user.avatar())
        .bind(relations.class_id)
        .bind(relations.teacher_id)
        .bind(relations.parent_id)
        .bind(&relations.student_ids)
        .bind(&relations.class_ids)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to create user: {}", e);
            map_write_error(e, user.email())
        })?;

        let user = User::try_from(row)?;
        info!(user_id = %user.id, email = %user.email, role = %user.role, "user created");
        Ok(user)
    }

    async fn update(&self, id: Uuid, user: PreparedUser) -> Result<User, DomainError> {
        let relations = user.relations();
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET
                email = $1,
                password_hash = $2,
                name = $3,
                role = $4,
                avatar = $5,
                class_id = $6,
                teacher_id = $7,
                parent_id = $8,
                student_ids = $9,
                class_ids = $10,
                updated_at = now()
            WHERE id = $11
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.email())
        .bind(user.password_hash())
        .bind(user.name())
        .bind(user.role().as_str())
        .bind(user.avatar())
        .bind(relations.class_id)
        .bind(relations.teacher_id)
        .bind(relations.parent_id)
        .bind(&relations.student_ids)
        .bind(&relations.class_ids)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to update user {}: {}", id, e);
            map_write_error(e, user.email())
        })?
        .ok_or(DomainError::UserNotFound(id))?;

        info!(user_id = %id, "user updated");
        User::try_from(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DomainError> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("failed to find user by id {}: {}", id, e);
                DomainError::Internal(format!("database error: {}", e))
            })?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("failed to find user by email {}: {}", email, e);
                DomainError::Internal(format!("database error: {}", e))
            })?
            .map(User::try_from)
            .transpose()
    }

    async fn find_many_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, DomainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to find users by ids: {}", e);
            DomainError::Internal(format!("database error: {}", e))
        })?;

        let users = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(in_request_order(ids, users))
    }

    async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?;

        if deleted.rows_affected() == 0 {
            return Err(DomainError::UserNotFound(id));
        }

        info!(user_id = %id, "user deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role: &str) -> UserRow {
        let now = Utc::now();
        UserRow {
            id: Uuid::new_v4(),
            email: "nina@school.org".into(),
            password_hash: "$2b$10$abcdefghijklmnopqrstuv".into(),
            name: "Nina".into(),
            role: role.into(),
            avatar: None,
            class_id: Some(Uuid::new_v4()),
            teacher_id: None,
            parent_id: None,
            student_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
            class_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn user_with_id(id: Uuid) -> User {
        let mut user = User::try_from(row("student")).unwrap();
        user.id = id;
        user
    }

    #[test]
    fn row_with_known_role_converts() {
        let row = row("teacher");
        let id = row.id;
        let class_id = row.class_id;
        let student_ids = row.student_ids.clone();

        let user = User::try_from(row).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.role, crate::domain::user::Role::Teacher);
        assert_eq!(user.relations.class_id, class_id);
        assert_eq!(user.relations.student_ids, student_ids);
    }

    #[test]
    fn row_with_corrupt_role_is_internal_error() {
        let err = User::try_from(row("janitor")).unwrap_err();
        assert!(matches!(err, DomainError::Internal(ref msg) if msg.contains("janitor")));
    }

    #[test]
    fn non_database_write_error_is_internal() {
        let err = map_write_error(sqlx::Error::RowNotFound, "nina@school.org");
        assert!(matches!(err, DomainError::Internal(_)));
    }

    #[test]
    fn rows_follow_requested_order() {
        let (a, b, c, missing) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let rows = vec![user_with_id(c), user_with_id(a), user_with_id(b)];

        let ordered: Vec<Uuid> = in_request_order(&[b, missing, a, c, b], rows)
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ordered, vec![b, a, c, b]);
    }

    #[test]
    fn no_ids_means_no_users() {
        assert!(in_request_order(&[], vec![user_with_id(Uuid::new_v4())]).is_empty());
    }
}
