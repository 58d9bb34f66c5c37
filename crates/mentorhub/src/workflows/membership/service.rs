use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::catalog::ValidationError;
use super::domain::{
    Actor, Application, ApplicationId, AssignmentId, EntityKind, MembershipKey, ProjectId, Role,
    UnknownRole, User, UserId,
};
use super::policy::{self, AccessDenied, Capability};
use super::repository::{
    AssignmentOutcome, AssignmentRemoval, CatalogRepository, Conflict, Constraint,
    DirectoryRepository, LedgerRepository, RepositoryError, Resolution, ResolutionOutcome,
    RoleChange,
};

/// Everything the service needs from storage, behind one bound.
pub trait MembershipStore: DirectoryRepository + CatalogRepository + LedgerRepository {}

impl<T> MembershipStore for T where T: DirectoryRepository + CatalogRepository + LedgerRepository {}

/// Service composing the access policy with the ledger, roster, catalog and directory stores.
pub struct MembershipService<S> {
    store: Arc<S>,
}

impl<S> MembershipService<S>
where
    S: MembershipStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Resolves the caller reported by the directory. Ids that no longer exist are rejected.
    pub fn resolve_actor(&self, user_id: Option<UserId>) -> Result<Actor, MembershipError> {
        let Some(user_id) = user_id else {
            return Ok(Actor::Anonymous);
        };

        match self.store.fetch_user(user_id)? {
            Some(user) => Ok(Actor::Authenticated(user)),
            None => {
                warn!(%user_id, "actor id not present in directory");
                Err(MembershipError::Unauthenticated)
            }
        }
    }

    /// Records a pending application for the actor.
    pub fn apply(
        &self,
        actor: &Actor,
        project_id: ProjectId,
    ) -> Result<Application, MembershipError> {
        policy::require(actor, Capability::Apply)?;
        let user_id = acting_user(actor)?;

        let application = self
            .store
            .insert_application(MembershipKey::new(user_id, project_id))?;
        info!(
            application_id = %application.id,
            %user_id,
            %project_id,
            "application submitted"
        );
        Ok(application)
    }

    pub fn accept(
        &self,
        actor: &Actor,
        application_id: ApplicationId,
    ) -> Result<ResolutionOutcome, MembershipError> {
        self.resolve(actor, application_id, Resolution::Accept)
    }

    pub fn reject(
        &self,
        actor: &Actor,
        application_id: ApplicationId,
    ) -> Result<ResolutionOutcome, MembershipError> {
        self.resolve(actor, application_id, Resolution::Reject)
    }

    fn resolve(
        &self,
        actor: &Actor,
        application_id: ApplicationId,
        resolution: Resolution,
    ) -> Result<ResolutionOutcome, MembershipError> {
        policy::require(actor, Capability::ManageCatalog)?;
        let outcome = self.store.resolve_application(application_id, resolution)?;

        if outcome.changed {
            info!(
                %application_id,
                status = outcome.application.status.label(),
                assignment_id = ?outcome.assignment.as_ref().map(|assignment| assignment.id.0),
                "application resolved"
            );
        } else {
            debug!(
                %application_id,
                status = outcome.application.status.label(),
                requested = ?resolution,
                "application already resolved; ignoring"
            );
        }
        Ok(outcome)
    }

    /// Ends a membership and clears the pair's application so the user may apply again.
    pub fn remove_assignment(
        &self,
        actor: &Actor,
        assignment_id: AssignmentId,
    ) -> Result<AssignmentRemoval, MembershipError> {
        policy::require(actor, Capability::ManageCatalog)?;
        let removal = self.store.remove_assignment(assignment_id)?;
        info!(
            %assignment_id,
            user_id = %removal.assignment.user_id,
            project_id = %removal.assignment.project_id,
            application_cleared = removal.application.is_some(),
            "assignment removed"
        );
        Ok(removal)
    }

    /// Admin shortcut that grants membership without an application.
    pub fn direct_assign(
        &self,
        actor: &Actor,
        user_id: UserId,
        project_id: ProjectId,
    ) -> Result<AssignmentOutcome, MembershipError> {
        policy::require(actor, Capability::Administer)?;
        let outcome = self
            .store
            .ensure_assignment(MembershipKey::new(user_id, project_id))?;
        info!(
            assignment_id = %outcome.assignment.id,
            %user_id,
            %project_id,
            created = outcome.created,
            "direct assignment"
        );
        Ok(outcome)
    }

    pub fn mentor(
        &self,
        actor: &Actor,
        project_id: ProjectId,
    ) -> Result<RosterChange, MembershipError> {
        policy::require(actor, Capability::ManageCatalog)?;
        let mentor = acting_user(actor)?;
        let changed = self.store.add_mentor(project_id, mentor)?;
        info!(%project_id, %mentor, changed, "mentor joined");
        Ok(RosterChange {
            project_id,
            mentor,
            mentoring: true,
            changed,
        })
    }

    pub fn unmentor(
        &self,
        actor: &Actor,
        project_id: ProjectId,
    ) -> Result<RosterChange, MembershipError> {
        policy::require(actor, Capability::ManageCatalog)?;
        let mentor = acting_user(actor)?;
        let changed = self.store.remove_mentor(project_id, mentor)?;
        info!(%project_id, %mentor, changed, "mentor left");
        Ok(RosterChange {
            project_id,
            mentor,
            mentoring: false,
            changed,
        })
    }

    /// Sets a user's role from its wire label (`user`, `staff`, `admin`).
    pub fn change_user_role(
        &self,
        actor: &Actor,
        user_id: UserId,
        role: &str,
    ) -> Result<RoleChange, MembershipError> {
        policy::require(actor, Capability::Administer)?;
        if self.store.fetch_user(user_id)?.is_none() {
            return Err(MembershipError::not_found(EntityKind::User, user_id.0));
        }
        let role: Role = role
            .parse()
            .map_err(|err: UnknownRole| MembershipError::InvalidRole(err.0))?;

        let change = self.store.update_role(user_id, role)?;
        info!(
            %user_id,
            from = change.previous.label(),
            to = change.user.role.label(),
            withdrawn_applications = change.withdrawn_applications,
            released_mentorships = change.released_mentorships,
            "role changed"
        );
        Ok(change)
    }

    pub fn delete_user(&self, actor: &Actor, user_id: UserId) -> Result<User, MembershipError> {
        policy::require(actor, Capability::Administer)?;
        let user = self.store.delete_user(user_id)?;
        info!(%user_id, username = %user.username, "user deleted");
        Ok(user)
    }
}

fn acting_user(actor: &Actor) -> Result<UserId, MembershipError> {
    actor.user_id().ok_or(MembershipError::Unauthenticated)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterChange {
    pub project_id: ProjectId,
    pub mentor: UserId,
    pub mentoring: bool,
    pub changed: bool,
}

/// Error raised by the membership service. Every variant is recoverable by the caller.
#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("forbidden: actor is not allowed to {}", .0.label())]
    Forbidden(Capability),
    #[error("user has already applied to this project")]
    AlreadyApplied,
    #[error("user is already assigned to this project")]
    AlreadyAssigned,
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: u64 },
    #[error("invalid role '{0}'")]
    InvalidRole(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl MembershipError {
    pub fn not_found(entity: EntityKind, id: u64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Stable machine-readable code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::AlreadyApplied => "already_applied",
            Self::AlreadyAssigned => "already_assigned",
            Self::NotFound { .. } => "not_found",
            Self::InvalidRole(_) => "invalid_role",
            Self::Validation(_) => "validation_error",
            Self::Repository(RepositoryError::Conflict(_)) => "conflict",
            Self::Repository(_) => "repository_error",
        }
    }
}

impl From<AccessDenied> for MembershipError {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::Unauthenticated => Self::Unauthenticated,
            AccessDenied::Forbidden(capability) => Self::Forbidden(capability),
        }
    }
}

impl From<RepositoryError> for MembershipError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Conflict(Conflict::Application) => Self::AlreadyApplied,
            RepositoryError::Conflict(Conflict::Assignment) => Self::AlreadyAssigned,
            RepositoryError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepositoryError::Constraint(Constraint::StaffApplicant) => {
                Self::Forbidden(Capability::Apply)
            }
            RepositoryError::Constraint(Constraint::MentorNotStaff) => {
                Self::Forbidden(Capability::ManageCatalog)
            }
            other => Self::Repository(other),
        }
    }
}
