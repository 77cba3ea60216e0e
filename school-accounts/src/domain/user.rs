use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::ValidationError;
use crate::domain::validation::{
    normalize_avatar, normalize_email, normalize_name, parse_role, validate_password,
};
use crate::infrastructure::security;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Parent,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Student, Role::Teacher, Role::Parent, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Parent => "parent",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidRole(s.to_string()))
    }
}

/// Weak references to other records. Identifiers only; resolving them is
/// the job of [`crate::application::relations::RelationLookup`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relations {
    /// A student's class.
    pub class_id: Option<Uuid>,
    pub teacher_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    /// A parent's children or a teacher's students, in insertion order.
    #[serde(default)]
    pub student_ids: Vec<Uuid>,
    /// A teacher's classes, in insertion order.
    #[serde(default)]
    pub class_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub avatar: Option<String>,
    #[serde(flatten)]
    pub relations: Relations,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Checks `candidate` against the stored hash. Never returns true for a
    /// missing or malformed hash.
    pub async fn compare_password(&self, candidate: &str) -> bool {
        security::compare_password(candidate, &self.password_hash).await
    }

    /// Loads the record into a draft for editing. The password is marked
    /// unmodified, so saving the draft keeps the current hash.
    pub fn into_draft(self) -> UserDraft {
        UserDraft {
            id: Some(self.id),
            email: self.email,
            password: self.password_hash,
            password_modified: false,
            name: self.name,
            role: self.role,
            avatar: self.avatar,
            relations: self.relations,
        }
    }
}

/// Creation input as supplied by callers, before any normalization.
#[derive(Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: String,
    pub avatar: Option<String>,
    pub relations: Relations,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("avatar", &self.avatar)
            .field("relations", &self.relations)
            .finish()
    }
}

/// Partial update. `None` leaves a field as it is; the nested options on
/// nullable fields allow clearing them.
#[derive(Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub avatar: Option<Option<String>>,
    pub class_id: Option<Option<Uuid>>,
    pub teacher_id: Option<Option<Uuid>>,
    pub parent_id: Option<Option<Uuid>>,
    pub student_ids: Option<Vec<Uuid>>,
    pub class_ids: Option<Vec<Uuid>>,
}

impl fmt::Debug for UserChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserChanges")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("name", &self.name)
            .field("role", &self.role)
            .field("avatar", &self.avatar)
            .field("class_id", &self.class_id)
            .field("teacher_id", &self.teacher_id)
            .field("parent_id", &self.parent_id)
            .field("student_ids", &self.student_ids)
            .field("class_ids", &self.class_ids)
            .finish()
    }
}

/// A record about to be written.
///
/// `password` holds either the stored hash (loaded via [`User::into_draft`])
/// or fresh plaintext; `password_modified` tells the two apart and is what
/// [`security::prepare_for_write`] consults before hashing.
#[derive(Clone)]
pub struct UserDraft {
    pub(crate) id: Option<Uuid>,
    pub(crate) email: String,
    pub(crate) password: String,
    pub(crate) password_modified: bool,
    pub(crate) name: String,
    pub(crate) role: Role,
    pub(crate) avatar: Option<String>,
    pub(crate) relations: Relations,
}

impl UserDraft {
    /// Validates and normalizes creation input. The password counts as
    /// modified, so the first save always hashes it.
    pub fn from_new(input: NewUser) -> Result<Self, ValidationError> {
        let email = normalize_email(&input.email)?;
        validate_password(&input.password)?;
        let name = normalize_name(&input.name)?;
        let role = parse_role(&input.role)?;

        Ok(Self {
            id: None,
            email,
            password: input.password,
            password_modified: true,
            name,
            role,
            avatar: normalize_avatar(input.avatar),
            relations: input.relations,
        })
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn email(&self) -> &str {
        &self.email
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

    pub fn is_password_modified(&self) -> bool {
        self.password_modified
    }

    /// Replaces the password and marks it modified, even when the new value
    /// equals the previous plaintext.
    pub fn set_password(&mut self, plain: impl Into<String>) -> Result<(), ValidationError> {
        let plain = plain.into();
        validate_password(&plain)?;
        self.password = plain;
        self.password_modified = true;
        Ok(())
    }

    pub fn set_email(&mut self, raw: &str) -> Result<(), ValidationError> {
        self.email = normalize_email(raw)?;
        Ok(())
    }

    pub fn set_name(&mut self, raw: &str) -> Result<(), ValidationError> {
        self.name = normalize_name(raw)?;
        Ok(())
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    pub fn set_avatar(&mut self, avatar: Option<String>) {
        self.avatar = normalize_avatar(avatar);
    }

    /// Applies a partial update. Stops at the first invalid field; the
    /// draft should be discarded in that case.
    pub fn apply(&mut self, changes: UserChanges) -> Result<(), ValidationError> {
        if let Some(email) = changes.email {
            self.set_email(&email)?;
        }
        if let Some(password) = changes.password {
            self.set_password(password)?;
        }
        if let Some(name) = changes.name {
            self.set_name(&name)?;
        }
        if let Some(role) = changes.role {
            self.set_role(parse_role(&role)?);
        }
        if let Some(avatar) = changes.avatar {
            self.set_avatar(avatar);
        }
        if let Some(class_id) = changes.class_id {
            self.relations.class_id = class_id;
        }
        if let Some(teacher_id) = changes.teacher_id {
            self.relations.teacher_id = teacher_id;
        }
        if let Some(parent_id) = changes.parent_id {
            self.relations.parent_id = parent_id;
        }
        if let Some(student_ids) = changes.student_ids {
            self.relations.student_ids = student_ids;
        }
        if let Some(class_ids) = changes.class_ids {
            self.relations.class_ids = class_ids;
        }
        Ok(())
    }
}

impl fmt::Debug for UserDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDraft")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("password_modified", &self.password_modified)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("avatar", &self.avatar)
            .field("relations", &self.relations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> NewUser {
        NewUser {
            email: " Alice@X.com ".into(),
            password: "secret1".into(),
            name: " Alice ".into(),
            role: "student".into(),
            ..Default::default()
        }
    }

    fn stored(draft: &UserDraft) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: draft.email.clone(),
            password_hash: "$2b$04$abcdefghijklmnopqrstuuJ1Dh4bC1dE7dQv2Fg0aS0yH2wqLnN6q".into(),
            name: draft.name.clone(),
            role: draft.role,
            avatar: None,
            relations: draft.relations.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn role_round_trips_through_its_name() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("Student".parse::<Role>().is_err());
        assert!("janitor".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Parent).unwrap(), "\"parent\"");
        assert!(serde_json::from_str::<Role>("\"principal\"").is_err());
    }

    #[test]
    fn new_draft_is_normalized_and_password_modified() {
        let draft = UserDraft::from_new(alice()).unwrap();
        assert_eq!(draft.email(), "alice@x.com");
        assert_eq!(draft.name(), "Alice");
        assert_eq!(draft.role(), Role::Student);
        assert!(draft.is_password_modified());
        assert_eq!(draft.id(), None);
    }

    #[test]
    fn new_draft_rejects_short_password() {
        let input = NewUser {
            password: "12345".into(),
            ..alice()
        };
        assert_eq!(
            UserDraft::from_new(input).unwrap_err(),
            ValidationError::PasswordTooShort { min: 6, actual: 5 }
        );
    }

    #[test]
    fn loaded_draft_keeps_hash_unmodified() {
        let user = stored(&UserDraft::from_new(alice()).unwrap());
        let hash = user.password_hash.clone();
        let draft = user.into_draft();
        assert!(!draft.is_password_modified());
        assert_eq!(draft.password, hash);
    }

    #[test]
    fn apply_marks_password_modified_only_when_given() {
        let mut draft = stored(&UserDraft::from_new(alice()).unwrap()).into_draft();
        draft
            .apply(UserChanges {
                name: Some("Alicia".into()),
                student_ids: Some(vec![Uuid::nil()]),
                ..Default::default()
            })
            .unwrap();
        assert!(!draft.is_password_modified());
        assert_eq!(draft.name(), "Alicia");
        assert_eq!(draft.relations().student_ids, vec![Uuid::nil()]);

        draft
            .apply(UserChanges {
                password: Some("secret1".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(draft.is_password_modified());
    }

    #[test]
    fn apply_rejects_unknown_role() {
        let mut draft = UserDraft::from_new(alice()).unwrap();
        let err = draft
            .apply(UserChanges {
                role: Some("superuser".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidRole("superuser".into()));
    }

    #[test]
    fn debug_output_redacts_password() {
        let rendered = format!("{:?} {:?}", alice(), UserDraft::from_new(alice()).unwrap());
        assert!(!rendered.contains("secret1"));
    }

    #[test]
    fn serialized_user_omits_password_hash() {
        let user = stored(&UserDraft::from_new(alice()).unwrap());
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "student");
        assert_eq!(json["email"], "alice@x.com");
    }
}
