use serde::Serialize;

use super::catalog::{CourseSpec, ProjectSpec};
use super::domain::{
    Application, ApplicationId, ApplicationStatus, Assignment, AssignmentId, Category, Course,
    CourseId, EntityKind, MembershipKey, ProgrammingLanguage, Project, ProjectId, Role, User,
    UserId,
};

/// Storage errors shared by every repository seam.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists: {0}")]
    Conflict(Conflict),
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: u64 },
    #[error("constraint violated: {0}")]
    Constraint(Constraint),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub fn not_found(entity: EntityKind, id: u64) -> Self {
        Self::NotFound { entity, id }
    }
}

/// Which uniqueness rule a write collided with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Conflict {
    #[error("application for this user and project")]
    Application,
    #[error("assignment for this user and project")]
    Assignment,
    #[error("{entity} named '{name}'")]
    Name { entity: EntityKind, name: String },
}

/// Role invariants the store enforces even when a caller's view of an actor is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Constraint {
    #[error("staff users cannot hold applications")]
    StaffApplicant,
    #[error("project mentors must be staff")]
    MentorNotStaff,
}

/// Users and roles. Stands in for the external directory service.
pub trait DirectoryRepository: Send + Sync {
    fn insert_user(&self, username: &str, role: Role) -> Result<User, RepositoryError>;
    fn fetch_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    /// All users ordered by id.
    fn users(&self) -> Result<Vec<User>, RepositoryError>;
    /// Changes a role in one transaction. Promotion to a staff-capable role withdraws every
    /// application the user holds (assignments are kept); demotion to `Role::User` releases
    /// every project the user mentors.
    fn update_role(&self, id: UserId, role: Role) -> Result<RoleChange, RepositoryError>;
    /// Deletes a user with their applications, assignments and mentorships.
    fn delete_user(&self, id: UserId) -> Result<User, RepositoryError>;
}

/// Projects, courses, tags and the mentor roster.
pub trait CatalogRepository: Send + Sync {
    fn insert_category(&self, name: &str) -> Result<Category, RepositoryError>;
    /// Categories ordered by name.
    fn categories(&self) -> Result<Vec<Category>, RepositoryError>;
    fn insert_language(&self, name: &str) -> Result<ProgrammingLanguage, RepositoryError>;
    /// Languages ordered by name.
    fn languages(&self) -> Result<Vec<ProgrammingLanguage>, RepositoryError>;

    fn insert_project(&self, spec: ProjectSpec) -> Result<Project, RepositoryError>;
    fn update_project(&self, id: ProjectId, spec: ProjectSpec) -> Result<Project, RepositoryError>;
    /// Deletes a project and, atomically, every application and assignment that references it.
    fn delete_project(&self, id: ProjectId) -> Result<ProjectRemoval, RepositoryError>;
    fn fetch_project(&self, id: ProjectId) -> Result<Option<Project>, RepositoryError>;
    /// Projects ordered by id.
    fn projects(&self) -> Result<Vec<Project>, RepositoryError>;

    fn insert_course(&self, spec: CourseSpec) -> Result<Course, RepositoryError>;
    fn update_course(&self, id: CourseId, spec: CourseSpec) -> Result<Course, RepositoryError>;
    fn delete_course(&self, id: CourseId) -> Result<Course, RepositoryError>;
    /// Courses ordered by level, then name, then id.
    fn courses(&self) -> Result<Vec<Course>, RepositoryError>;

    /// Returns `true` when the mentor set changed.
    fn add_mentor(&self, project: ProjectId, mentor: UserId) -> Result<bool, RepositoryError>;
    /// Returns `true` when the mentor set changed.
    fn remove_mentor(&self, project: ProjectId, mentor: UserId) -> Result<bool, RepositoryError>;
}

/// Applications and assignments. Every method is a single transaction.
pub trait LedgerRepository: Send + Sync {
    /// Inserts a pending application unless the pair already has an application
    /// (`Conflict::Application`) or an assignment (`Conflict::Assignment`).
    fn insert_application(&self, key: MembershipKey) -> Result<Application, RepositoryError>;
    fn fetch_application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError>;
    /// Moves a pending application to the resolution's status. Accepting also gets-or-creates the
    /// pair's assignment. Applications that are no longer pending are returned untouched.
    fn resolve_application(
        &self,
        id: ApplicationId,
        resolution: Resolution,
    ) -> Result<ResolutionOutcome, RepositoryError>;
    /// Get-or-create keyed on the pair.
    fn ensure_assignment(&self, key: MembershipKey) -> Result<AssignmentOutcome, RepositoryError>;
    /// Deletes the assignment and, if present, the pair's application.
    fn remove_assignment(&self, id: AssignmentId) -> Result<AssignmentRemoval, RepositoryError>;
    /// Ledger rows for one project, ordered by id.
    fn project_entries(&self, project: ProjectId) -> Result<LedgerEntries, RepositoryError>;
    /// Ledger rows for one user, ordered by id.
    fn user_entries(&self, user: UserId) -> Result<LedgerEntries, RepositoryError>;
}

/// Staff decision on a pending application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Accept,
    Reject,
}

impl Resolution {
    pub const fn target_status(self) -> ApplicationStatus {
        match self {
            Self::Accept => ApplicationStatus::Accepted,
            Self::Reject => ApplicationStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionOutcome {
    pub application: Application,
    /// `false` when the application was already resolved and nothing was written.
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<Assignment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentOutcome {
    pub assignment: Assignment,
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentRemoval {
    pub assignment: Assignment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<Application>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectRemoval {
    pub project: Project,
    pub applications_removed: usize,
    pub assignments_removed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleChange {
    pub user: User,
    pub previous: Role,
    pub withdrawn_applications: usize,
    pub released_mentorships: usize,
}

/// A consistent read of ledger rows for one project or one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerEntries {
    pub applications: Vec<Application>,
    pub assignments: Vec<Assignment>,
}

impl LedgerEntries {
    pub fn is_empty(&self) -> bool {
        self.applications.is_empty() && self.assignments.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Application> {
        self.applications
            .iter()
            .filter(|application| application.status == ApplicationStatus::Pending)
    }

    pub fn application_for(&self, key: MembershipKey) -> Option<&Application> {
        self.applications
            .iter()
            .find(|application| application.key() == key)
    }

    pub fn assignment_for(&self, key: MembershipKey) -> Option<&Assignment> {
        self.assignments
            .iter()
            .find(|assignment| assignment.key() == key)
    }
}
