use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::data::user_repository::UserRepository;
use crate::domain::error::DomainError;
use crate::domain::user::{NewUser, User, UserChanges, UserDraft};
use crate::domain::validation::normalize_email;
use crate::infrastructure::security::{HashingConfig, prepare_for_write};

pub struct UserService<R: UserRepository + 'static> {
    repo: Arc<R>,
    hashing: HashingConfig,
}

impl<R: UserRepository + 'static> Clone for UserService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            hashing: self.hashing,
        }
    }
}

impl<R> UserService<R>
where
    R: UserRepository + 'static,
{
    pub fn new(repo: Arc<R>, hashing: HashingConfig) -> Self {
        Self { repo, hashing }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, DomainError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(DomainError::UserNotFound(id))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let email = normalize_email(email)?;
        self.repo.find_by_email(&email).await
    }

    #[instrument(skip(self))]
    pub async fn create_user(&self, input: NewUser) -> Result<User, DomainError> {
        let draft = UserDraft::from_new(input)?;
        self.save(draft).await
    }

    #[instrument(skip(self))]
    pub async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User, DomainError> {
        let mut draft = self.get_user(id).await?.into_draft();
        draft.apply(changes)?;
        self.save(draft).await
    }

    /// Always re-hashes, even when `password` equals the current one.
    #[instrument(skip(self, password))]
    pub async fn set_password(&self, id: Uuid, password: &str) -> Result<User, DomainError> {
        let mut draft = self.get_user(id).await?.into_draft();
        draft.set_password(password)?;
        self.save(draft).await
    }

    /// Writes a draft: inserts when it has no identifier yet, updates
    /// otherwise. The password is hashed only if the draft marks it modified.
    #[instrument(skip(self))]
    pub async fn save(&self, draft: UserDraft) -> Result<User, DomainError> {
        let id = draft.id();
        debug!(rehash = draft.is_password_modified(), "preparing user for write");
        let prepared = prepare_for_write(draft, &self.hashing).await?;
        match id {
            Some(id) => self.repo.update(id, prepared).await,
            None => self.repo.insert(prepared).await,
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: Uuid) -> Result<(), DomainError> {
        self.repo.delete(id).await
    }

    /// Returns the user when `password` matches. A malformed email, an
    /// unknown email and a wrong password all look the same to the caller.
    #[instrument(skip(self, password))]
    pub async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, DomainError> {
        let Ok(email) = normalize_email(email) else {
            debug!("malformed login email");
            return Ok(None);
        };
        let Some(user) = self.repo.find_by_email(&email).await? else {
            debug!("no user with this email");
            return Ok(None);
        };

        if user.compare_password(password).await {
            Ok(Some(user))
        } else {
            debug!(user_id = %user.id, "password mismatch");
            Ok(None)
        }
    }
}
