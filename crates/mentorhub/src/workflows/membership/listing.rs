//! Read-side projections: filtered catalog listings shaped for the viewing actor, the personal
//! dashboard and the staff user overview.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Actor, ApplicationId, ApplicationStatus, AssignmentId, Category, CategoryId, Course,
    CourseId, CourseLevel, LanguageId, MembershipKey, MembershipState, ProgrammingLanguage,
    Project, ProjectId, Role, User, UserId,
};
use super::policy::{self, Capability};
use super::repository::LedgerEntries;
use super::service::{MembershipError, MembershipService, MembershipStore};

/// Filters for the project listing. Categories combine with OR, the text query with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProjectQuery {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub categories: Vec<CategoryId>,
}

impl ProjectQuery {
    pub fn matches(&self, project: &Project) -> bool {
        let name = project.name.as_deref().unwrap_or_default();
        text_matches(self.query.as_deref(), &[name, project.description.as_str()])
            && (self.categories.is_empty()
                || self
                    .categories
                    .iter()
                    .any(|id| project.categories.contains(id)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CourseQuery {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub languages: Vec<LanguageId>,
    #[serde(default)]
    pub level: Option<CourseLevel>,
}

impl CourseQuery {
    pub fn matches(&self, course: &Course) -> bool {
        let text = [course.name.as_str(), course.description.as_str()];
        text_matches(self.query.as_deref(), &text)
            && (self.languages.is_empty()
                || self.languages.iter().any(|id| course.languages.contains(id)))
            && self.level.map_or(true, |level| course.level == level)
    }
}

/// Case-insensitive substring match against any field. Blank queries match everything.
fn text_matches(query: Option<&str>, fields: &[&str]) -> bool {
    let needle = match query.map(str::trim) {
        None | Some("") => return true,
        Some(needle) => needle.to_lowercase(),
    };
    fields
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRef {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantView {
    pub assignment_id: AssignmentId,
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingApplicationView {
    pub application_id: ApplicationId,
    pub user_id: UserId,
    pub username: String,
    pub applied_at: DateTime<Utc>,
}

/// Viewer-specific part of a project card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ProjectAccess {
    Staff {
        pending_applications: Vec<PendingApplicationView>,
        participants: Vec<ParticipantView>,
        is_mentoring: bool,
    },
    Member {
        user_status: Option<ApplicationStatus>,
        membership: MembershipState,
        is_assigned: bool,
        can_apply: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectView {
    pub id: ProjectId,
    pub name: Option<String>,
    pub display_name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub categories: Vec<Category>,
    pub mentors: Vec<UserRef>,
    pub is_staff: bool,
    pub is_admin: bool,
    #[serde(flatten)]
    pub access: ProjectAccess,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseView {
    pub id: CourseId,
    pub name: String,
    pub description: String,
    pub level: CourseLevel,
    pub level_display: &'static str,
    pub programming_languages: Vec<ProgrammingLanguage>,
    pub created_at: DateTime<Utc>,
    pub is_staff: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub assigned_projects: usize,
    pub pending_applications: usize,
    pub mentored_projects: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub assigned_projects: Vec<ProjectId>,
    pub pending_applications: usize,
}

/// Builds one project card for `actor` from a consistent read of the project's ledger rows.
pub fn shape_project(
    actor: &Actor,
    project: Project,
    entries: &LedgerEntries,
    categories: &BTreeMap<CategoryId, Category>,
    users: &BTreeMap<UserId, User>,
) -> ProjectView {
    let access = match actor.user() {
        Some(viewer) if viewer.is_staff() => ProjectAccess::Staff {
            pending_applications: entries
                .pending()
                .filter_map(|application| {
                    users.get(&application.user_id).map(|user| PendingApplicationView {
                        application_id: application.id,
                        user_id: user.id,
                        username: user.username.clone(),
                        applied_at: application.created_at,
                    })
                })
                .collect(),
            participants: entries
                .assignments
                .iter()
                .filter_map(|assignment| {
                    users.get(&assignment.user_id).map(|user| ParticipantView {
                        assignment_id: assignment.id,
                        user_id: user.id,
                        username: user.username.clone(),
                    })
                })
                .collect(),
            is_mentoring: project.mentors.contains(&viewer.id),
        },
        _ => {
            let key = actor
                .user_id()
                .map(|user_id| MembershipKey::new(user_id, project.id));
            let application = key.and_then(|key| entries.application_for(key));
            let assignment = key.and_then(|key| entries.assignment_for(key));
            ProjectAccess::Member {
                user_status: application.map(|application| application.status),
                membership: MembershipState::derive(application, assignment),
                is_assigned: assignment.is_some(),
                can_apply: policy::can_apply(actor)
                    && application.is_none()
                    && assignment.is_none(),
            }
        }
    };

    ProjectView {
        id: project.id,
        display_name: project.display_name().to_string(),
        categories: project
            .categories
            .iter()
            .filter_map(|id| categories.get(id).cloned())
            .collect(),
        mentors: project
            .mentors
            .iter()
            .filter_map(|id| {
                users.get(id).map(|user| UserRef {
                    id: user.id,
                    username: user.username.clone(),
                })
            })
            .collect(),
        is_staff: actor.is_staff(),
        is_admin: actor.is_superuser(),
        name: project.name,
        description: project.description,
        created_at: project.created_at,
        access,
    }
}

pub fn shape_course(
    actor: &Actor,
    course: Course,
    languages: &BTreeMap<LanguageId, ProgrammingLanguage>,
) -> CourseView {
    CourseView {
        id: course.id,
        level_display: course.level.label(),
        programming_languages: course
            .languages
            .iter()
            .filter_map(|id| languages.get(id).cloned())
            .collect(),
        is_staff: actor.is_staff(),
        name: course.name,
        description: course.description,
        level: course.level,
        created_at: course.created_at,
    }
}

impl<S> MembershipService<S>
where
    S: MembershipStore + 'static,
{
    /// Projects in id order, filtered by `query` and shaped for the viewing actor.
    pub fn list_projects(
        &self,
        actor: &Actor,
        query: &ProjectQuery,
    ) -> Result<Vec<ProjectView>, MembershipError> {
        policy::require_authenticated(actor)?;
        let categories: BTreeMap<CategoryId, Category> = self
            .store()
            .categories()?
            .into_iter()
            .map(|category| (category.id, category))
            .collect();
        let users = self.user_index()?;

        self.store()
            .projects()?
            .into_iter()
            .filter(|project| query.matches(project))
            .map(|project| -> Result<ProjectView, MembershipError> {
                let entries = self.store().project_entries(project.id)?;
                Ok(shape_project(actor, project, &entries, &categories, &users))
            })
            .collect()
    }

    /// Courses ordered by level then name, filtered by `query`.
    pub fn list_courses(
        &self,
        actor: &Actor,
        query: &CourseQuery,
    ) -> Result<Vec<CourseView>, MembershipError> {
        policy::require_authenticated(actor)?;
        let languages: BTreeMap<LanguageId, ProgrammingLanguage> = self
            .store()
            .languages()?
            .into_iter()
            .map(|language| (language.id, language))
            .collect();

        Ok(self
            .store()
            .courses()?
            .into_iter()
            .filter(|course| query.matches(course))
            .map(|course| shape_course(actor, course, &languages))
            .collect())
    }

    pub fn dashboard(&self, actor: &Actor) -> Result<Dashboard, MembershipError> {
        policy::require_authenticated(actor)?;
        let Some(user_id) = actor.user_id() else {
            return Err(MembershipError::Unauthenticated);
        };

        let entries = self.store().user_entries(user_id)?;
        let mentored_projects = if actor.is_staff() {
            self.store()
                .projects()?
                .iter()
                .filter(|project| project.mentors.contains(&user_id))
                .count()
        } else {
            0
        };

        Ok(Dashboard {
            assigned_projects: entries.assignments.len(),
            pending_applications: entries.pending().count(),
            mentored_projects,
        })
    }

    /// Staff overview of every account with its memberships.
    pub fn list_users(&self, actor: &Actor) -> Result<Vec<UserSummary>, MembershipError> {
        policy::require(actor, Capability::ManageCatalog)?;
        self.store()
            .users()?
            .into_iter()
            .map(|user| -> Result<UserSummary, MembershipError> {
                let entries = self.store().user_entries(user.id)?;
                Ok(UserSummary {
                    id: user.id,
                    username: user.username,
                    role: user.role,
                    assigned_projects: entries
                        .assignments
                        .iter()
                        .map(|assignment| assignment.project_id)
                        .collect(),
                    pending_applications: entries.pending().count(),
                })
            })
            .collect()
    }

    fn user_index(&self) -> Result<BTreeMap<UserId, User>, MembershipError> {
        Ok(self
            .store()
            .users()?
            .into_iter()
            .map(|user| (user.id, user))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn project(id: u64, name: Option<&str>, description: &str, categories: &[u64]) -> Project {
        Project {
            id: ProjectId(id),
            name: name.map(str::to_string),
            description: description.to_string(),
            created_at: Utc::now(),
            categories: categories.iter().copied().map(CategoryId).collect(),
            mentors: BTreeSet::new(),
        }
    }

    #[test]
    fn text_query_is_case_insensitive_over_name_or_description() {
        let query = ProjectQuery {
            query: Some("ai".to_string()),
            categories: Vec::new(),
        };
        assert!(query.matches(&project(1, Some("AI Project"), "desc A", &[])));
        assert!(query.matches(&project(2, Some("Vision"), "Applied AI", &[])));
        assert!(!query.matches(&project(3, Some("Other"), "desc B", &[])));
        assert!(!query.matches(&project(4, None, "desc B", &[])));
    }

    #[test]
    fn blank_text_query_matches_everything() {
        let query = ProjectQuery {
            query: Some("   ".to_string()),
            categories: Vec::new(),
        };
        assert!(query.matches(&project(1, None, "anything", &[])));
    }

    #[test]
    fn categories_are_a_union_and_combine_with_text() {
        let query = ProjectQuery {
            query: None,
            categories: vec![CategoryId(1), CategoryId(2)],
        };
        assert!(query.matches(&project(1, Some("A"), "d", &[1])));
        assert!(query.matches(&project(2, Some("B"), "d", &[2, 3])));
        assert!(!query.matches(&project(3, Some("C"), "d", &[3])));
        assert!(!query.matches(&project(4, Some("D"), "d", &[])));

        let narrowed = ProjectQuery {
            query: Some("b".to_string()),
            ..query
        };
        assert!(!narrowed.matches(&project(1, Some("A"), "d", &[1])));
        assert!(narrowed.matches(&project(2, Some("B"), "d", &[2])));
    }

    #[test]
    fn course_query_applies_exact_level() {
        let course = Course {
            id: CourseId(1),
            name: "Intro to Python".to_string(),
            description: "Basics".to_string(),
            level: CourseLevel::Beginner,
            languages: BTreeSet::from([LanguageId(1)]),
            created_at: Utc::now(),
        };

        let beginner = CourseQuery {
            level: Some(CourseLevel::Beginner),
            ..CourseQuery::default()
        };
        let expert = CourseQuery {
            level: Some(CourseLevel::Expert),
            ..CourseQuery::default()
        };
        let other_language = CourseQuery {
            languages: vec![LanguageId(2)],
            ..CourseQuery::default()
        };
        assert!(beginner.matches(&course));
        assert!(!expert.matches(&course));
        assert!(!other_language.matches(&course));
    }
}
