//! Membership workflow: applications, assignments and mentors over a browsable catalog.
//!
//! Every mutating operation is gated by [`policy`] before storage is touched and runs as one
//! transaction against a [`MembershipStore`]. [`MemoryStore`] is the bundled implementation.

pub mod catalog;
pub mod domain;
pub mod listing;
pub mod policy;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use catalog::{CourseDraft, CourseSpec, ProjectDraft, ProjectSpec, ValidationError};
pub use domain::{
    Actor, Application, ApplicationId, ApplicationStatus, Assignment, AssignmentId, Category,
    CategoryId, Course, CourseId, CourseLevel, EntityKind, LanguageId, MembershipKey,
    MembershipState, ProgrammingLanguage, Project, ProjectId, Role, User, UserId,
    UNNAMED_PROJECT,
};
pub use listing::{
    CourseQuery, CourseView, Dashboard, ProjectAccess, ProjectQuery, ProjectView, UserSummary,
};
pub use policy::{AccessDenied, Capability};
pub use repository::{
    AssignmentOutcome, AssignmentRemoval, CatalogRepository, Conflict, Constraint,
    DirectoryRepository, LedgerEntries, LedgerRepository, ProjectRemoval, RepositoryError,
    Resolution, ResolutionOutcome, RoleChange,
};
pub use router::{membership_router, ACTOR_HEADER};
pub use service::{MembershipError, MembershipService, MembershipStore, RosterChange};
pub use store::MemoryStore;
