use std::sync::Arc;

use crate::data::user_repository::UserRepository;
use crate::domain::error::DomainError;
use crate::domain::user::User;

/// Resolves the user-to-user references stored on a record. A reference to
/// a deleted user resolves to nothing rather than failing.
pub struct RelationLookup<R: UserRepository + 'static> {
    repo: Arc<R>,
}

impl<R: UserRepository + 'static> Clone for RelationLookup<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<R> RelationLookup<R>
where
    R: UserRepository + 'static,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn teacher_of(&self, user: &User) -> Result<Option<User>, DomainError> {
        match user.relations.teacher_id {
            Some(id) => self.repo.find_by_id(id).await,
            None => Ok(None),
        }
    }

    pub async fn parent_of(&self, user: &User) -> Result<Option<User>, DomainError> {
        match user.relations.parent_id {
            Some(id) => self.repo.find_by_id(id).await,
            None => Ok(None),
        }
    }

    /// In `student_ids` order.
    pub async fn students_of(&self, user: &User) -> Result<Vec<User>, DomainError> {
        self.repo
            .find_many_by_ids(&user.relations.student_ids)
            .await
    }
}
