use tokio::task;
use tracing::warn;
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::user::{Relations, Role, UserDraft};

/// bcrypt work factor: 2^10 rounds.
pub const DEFAULT_COST: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingConfig {
    pub cost: u32,
}

impl HashingConfig {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

/// Hashes with a freshly generated salt, so equal inputs give distinct outputs.
pub fn hash_password(password: &str, cost: u32) -> Result<String, DomainError> {
    bcrypt::hash(password, cost).map_err(|err| DomainError::Hashing(err.to_string()))
}

/// Fails closed: an empty or unparseable stored hash is a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    if hash.is_empty() {
        warn!("password comparison against an empty stored hash");
        return false;
    }
    match bcrypt::verify(password, hash) {
        Ok(valid) => valid,
        Err(err) => {
            warn!(error = %err, "malformed stored password hash");
            false
        }
    }
}

/// [`verify_password`] on the blocking pool.
pub async fn compare_password(candidate: &str, hash: &str) -> bool {
    let candidate = candidate.to_owned();
    let hash = hash.to_owned();
    match task::spawn_blocking(move || verify_password(&candidate, &hash)).await {
        Ok(valid) => valid,
        Err(err) => {
            warn!(error = %err, "password comparison task failed");
            false
        }
    }
}

/// A record whose password field is guaranteed to hold a hash. Only
/// [`prepare_for_write`] can build one, and repositories accept nothing else.
#[derive(Debug, Clone)]
pub struct PreparedUser {
    id: Option<Uuid>,
    email: String,
    password_hash: String,
    name: String,
    role: Role,
    avatar: Option<String>,
    relations: Relations,
}

impl PreparedUser {
    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }

    pub fn relations(&self) -> &Relations {
        &self.relations
    }
}

/// Runs right before every insert or update.
///
/// An unmodified password passes through byte for byte. A modified one is
/// hashed on the blocking pool with a new salt; if that fails the draft is
/// dropped and nothing reaches the store.
pub async fn prepare_for_write(
    draft: UserDraft,
    config: &HashingConfig,
) -> Result<PreparedUser, DomainError> {
    let UserDraft {
        id,
        email,
        password,
        password_modified,
        name,
        role,
        avatar,
        relations,
    } = draft;

    let password_hash = if password_modified {
        let cost = config.cost;
        task::spawn_blocking(move || hash_password(&password, cost))
            .await
            .map_err(|err| DomainError::Hashing(err.to_string()))??
    } else {
        password
    };

    Ok(PreparedUser {
        id,
        email,
        password_hash,
        name,
        role,
        avatar,
        relations,
    })
}
