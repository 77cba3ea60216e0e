use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::data::user_repository::UserRepository;
use crate::domain::error::DomainError;
use crate::domain::user::User;
use crate::infrastructure::security::PreparedUser;

/// In-process user store.
///
/// The email check and the write happen under one write lock, which plays
/// the part of a unique index: of two racing inserts for the same address
/// exactly one wins.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

fn email_taken(users: &HashMap<Uuid, User>, email: &str, except: Option<Uuid>) -> bool {
    users
        .values()
        .any(|u| u.email == email && Some(u.id) != except)
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, user: PreparedUser) -> Result<User, DomainError> {
        let mut users = self.users.write().await;
        if email_taken(&users, user.email(), None) {
            return Err(DomainError::UserAlreadyExists(user.email().to_string()));
        }

        let now = Utc::now();
        let stored = User {
            id: Uuid::new_v4(),
            email: user.email().to_string(),
            password_hash: user.password_hash().to_string(),
            name: user.name().to_string(),
            role: user.role(),
            avatar: user.avatar().map(str::to_string),
            relations: user.relations().clone(),
            created_at: now,
            updated_at: now,
        };
        users.insert(stored.id, stored.clone());

        info!(user_id = %stored.id, email = %stored.email, role = %stored.role, "user created");
        Ok(stored)
    }

    async fn update(&self, id: Uuid, user: PreparedUser) -> Result<User, DomainError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&id) {
            return Err(DomainError::UserNotFound(id));
        }
        if email_taken(&users, user.email(), Some(id)) {
            return Err(DomainError::UserAlreadyExists(user.email().to_string()));
        }

        let stored = users.get_mut(&id).ok_or(DomainError::UserNotFound(id))?;
        stored.email = user.email().to_string();
        stored.password_hash = user.password_hash().to_string();
        stored.name = user.name().to_string();
        stored.role = user.role();
        stored.avatar = user.avatar().map(str::to_string);
        stored.relations = user.relations().clone();
        stored.updated_at = Utc::now().max(stored.updated_at);

        info!(user_id = %id, "user updated");
        Ok(stored.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DomainError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_many_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, DomainError> {
        let users = self.users.read().await;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        self.users
            .write()
            .await
            .remove(&id)
            .ok_or(DomainError::UserNotFound(id))?;
        info!(user_id = %id, "user deleted");
        Ok(())
    }
}
