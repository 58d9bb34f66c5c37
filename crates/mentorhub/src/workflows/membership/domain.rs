use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier issued by the user directory.
    UserId
);
entity_id!(ProjectId);
entity_id!(CourseId);
entity_id!(CategoryId);
entity_id!(LanguageId);
entity_id!(ApplicationId);
entity_id!(AssignmentId);

/// Kind of record referenced by an id, used for not-found reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Project,
    Course,
    Category,
    Language,
    Application,
    Assignment,
}

impl EntityKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Project => "project",
            Self::Course => "course",
            Self::Category => "category",
            Self::Language => "programming language",
            Self::Application => "application",
            Self::Assignment => "assignment",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Platform role. Ordered so that `User < Staff < Admin`; every capability of a lower role is
/// held by the roles above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Staff,
    Admin,
}

impl Role {
    pub const fn ordered() -> [Self; 3] {
        [Self::User, Self::Staff, Self::Admin]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Staff => "staff",
            Self::Admin => "admin",
        }
    }

    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Staff | Self::Admin)
    }

    pub const fn is_superuser(self) -> bool {
        matches!(self, Self::Admin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ordered()
            .into_iter()
            .find(|role| role.label() == raw)
            .ok_or_else(|| UnknownRole(raw.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

impl User {
    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn is_superuser(&self) -> bool {
        self.role.is_superuser()
    }
}

/// Caller of an operation as reported by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    Authenticated(User),
}

impl Actor {
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(user) => Some(user),
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user().map(|user| user.id)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn is_staff(&self) -> bool {
        self.user().is_some_and(User::is_staff)
    }

    pub fn is_superuser(&self) -> bool {
        self.user().is_some_and(User::is_superuser)
    }
}

impl From<User> for Actor {
    fn from(user: User) -> Self {
        Self::Authenticated(user)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgrammingLanguage {
    pub id: LanguageId,
    pub name: String,
}

pub const UNNAMED_PROJECT: &str = "Unnamed Project";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub categories: BTreeSet<CategoryId>,
    pub mentors: BTreeSet<UserId>,
}

impl Project {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED_PROJECT)
    }
}

/// Course difficulty on the fixed 1-5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CourseLevel {
    Beginner = 1,
    Elementary = 2,
    Intermediate = 3,
    Advanced = 4,
    Expert = 5,
}

impl CourseLevel {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Beginner,
            Self::Elementary,
            Self::Intermediate,
            Self::Advanced,
            Self::Expert,
        ]
    }

    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Beginner => "Beginner",
            Self::Elementary => "Elementary",
            Self::Intermediate => "Intermediate",
            Self::Advanced => "Advanced",
            Self::Expert => "Expert",
        }
    }

    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|level| i64::from(level.ordinal()) == ordinal)
    }
}

impl TryFrom<u8> for CourseLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_ordinal(i64::from(value))
            .ok_or_else(|| format!("course level must be between 1 and 5, found {value}"))
    }
}

impl From<CourseLevel> for u8 {
    fn from(level: CourseLevel) -> Self {
        level.ordinal()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub description: String,
    pub level: CourseLevel,
    pub languages: BTreeSet<LanguageId>,
    pub created_at: DateTime<Utc>,
}

/// Unique key shared by applications and assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MembershipKey {
    pub user_id: UserId,
    pub project_id: ProjectId,
}

impl MembershipKey {
    pub const fn new(user_id: UserId, project_id: ProjectId) -> Self {
        Self {
            user_id,
            project_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

/// A user's request to join a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
}

impl Application {
    pub fn key(&self) -> MembershipKey {
        MembershipKey::new(self.user_id, self.project_id)
    }
}

/// Active membership of a user in a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub assigned_at: DateTime<Utc>,
}

impl Assignment {
    pub fn key(&self) -> MembershipKey {
        MembershipKey::new(self.user_id, self.project_id)
    }
}

/// Where a (user, project) pair sits in the membership workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipState {
    None,
    Pending,
    Accepted,
    Rejected,
    /// Assigned directly without an application on file.
    Assigned,
}

impl MembershipState {
    pub fn derive(application: Option<&Application>, assignment: Option<&Assignment>) -> Self {
        match (application.map(|application| application.status), assignment) {
            (Some(ApplicationStatus::Pending), _) => Self::Pending,
            (Some(ApplicationStatus::Accepted), _) => Self::Accepted,
            (Some(ApplicationStatus::Rejected), _) => Self::Rejected,
            (None, Some(_)) => Self::Assigned,
            (None, None) => Self::None,
        }
    }
}
