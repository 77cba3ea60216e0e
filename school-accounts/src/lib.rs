//! User records and password handling for a school-management system.
//!
//! Records are validated in [`domain`], hashed right before every write by
//! [`infrastructure::security::prepare_for_write`], and persisted through a
//! [`data::user_repository::UserRepository`].

pub mod application;
pub mod data;
pub mod domain;
pub mod infrastructure;

pub use application::relations::RelationLookup;
pub use application::user_service::UserService;
pub use data::memory_repository::InMemoryUserRepository;
pub use data::user_repository::{PostgresUserRepository, UserRepository};
pub use domain::error::{DomainError, ValidationError};
pub use domain::user::{NewUser, Relations, Role, User, UserChanges, UserDraft};
pub use infrastructure::security::{HashingConfig, PreparedUser};
