//! In-memory store backing every repository seam behind one mutex. Each trait method takes the
//! lock once, checks every precondition before mutating, and so behaves as a serializable
//! transaction: uniqueness and cascade rules hold under concurrent callers.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use super::catalog::{CourseSpec, ProjectSpec};
use super::domain::{
    Application, ApplicationId, ApplicationStatus, Assignment, AssignmentId, Category,
    CategoryId, Course, CourseId, EntityKind, LanguageId, MembershipKey, ProgrammingLanguage,
    Project, ProjectId, Role, User, UserId,
};
use super::repository::{
    AssignmentOutcome, AssignmentRemoval, CatalogRepository, Conflict, Constraint,
    DirectoryRepository, LedgerEntries, LedgerRepository, ProjectRemoval, RepositoryError,
    Resolution, ResolutionOutcome, RoleChange,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

#[derive(Debug, Default)]
struct Sequences {
    users: u64,
    categories: u64,
    languages: u64,
    projects: u64,
    courses: u64,
    applications: u64,
    assignments: u64,
}

fn bump(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Default)]
struct StoreState {
    sequences: Sequences,
    users: BTreeMap<UserId, User>,
    categories: BTreeMap<CategoryId, Category>,
    languages: BTreeMap<LanguageId, ProgrammingLanguage>,
    projects: BTreeMap<ProjectId, Project>,
    courses: BTreeMap<CourseId, Course>,
    applications: BTreeMap<ApplicationId, Application>,
    assignments: BTreeMap<AssignmentId, Assignment>,
    application_index: HashMap<MembershipKey, ApplicationId>,
    assignment_index: HashMap<MembershipKey, AssignmentId>,
}

impl StoreState {
    fn user(&self, id: UserId) -> Result<&User, RepositoryError> {
        self.users
            .get(&id)
            .ok_or_else(|| RepositoryError::not_found(EntityKind::User, id.0))
    }

    fn project(&self, id: ProjectId) -> Result<&Project, RepositoryError> {
        self.projects
            .get(&id)
            .ok_or_else(|| RepositoryError::not_found(EntityKind::Project, id.0))
    }

    fn check_categories(&self, spec: &ProjectSpec) -> Result<(), RepositoryError> {
        match spec
            .categories
            .iter()
            .find(|id| !self.categories.contains_key(id))
        {
            Some(missing) => Err(RepositoryError::not_found(EntityKind::Category, missing.0)),
            None => Ok(()),
        }
    }

    fn check_languages(&self, spec: &CourseSpec) -> Result<(), RepositoryError> {
        match spec
            .languages
            .iter()
            .find(|id| !self.languages.contains_key(id))
        {
            Some(missing) => Err(RepositoryError::not_found(EntityKind::Language, missing.0)),
            None => Ok(()),
        }
    }

    fn assignment_for(&self, key: MembershipKey) -> Option<&Assignment> {
        self.assignment_index
            .get(&key)
            .and_then(|id| self.assignments.get(id))
    }

    fn get_or_create_assignment(&mut self, key: MembershipKey) -> (Assignment, bool) {
        if let Some(existing) = self.assignment_for(key) {
            return (existing.clone(), false);
        }

        let assignment = Assignment {
            id: AssignmentId(bump(&mut self.sequences.assignments)),
            user_id: key.user_id,
            project_id: key.project_id,
            assigned_at: Utc::now(),
        };
        self.assignment_index.insert(key, assignment.id);
        self.assignments.insert(assignment.id, assignment.clone());
        (assignment, true)
    }

    fn drop_application(&mut self, key: MembershipKey) -> Option<Application> {
        let id = self.application_index.remove(&key)?;
        self.applications.remove(&id)
    }

    fn drop_applications_where(&mut self, predicate: impl Fn(&Application) -> bool) -> usize {
        let doomed: Vec<MembershipKey> = self
            .applications
            .values()
            .filter(|application| predicate(application))
            .map(Application::key)
            .collect();
        for key in &doomed {
            self.drop_application(*key);
        }
        doomed.len()
    }

    fn drop_assignments_where(&mut self, predicate: impl Fn(&Assignment) -> bool) -> usize {
        let doomed: Vec<(MembershipKey, AssignmentId)> = self
            .assignments
            .values()
            .filter(|assignment| predicate(assignment))
            .map(|assignment| (assignment.key(), assignment.id))
            .collect();
        for (key, id) in &doomed {
            self.assignment_index.remove(key);
            self.assignments.remove(id);
        }
        doomed.len()
    }

    fn release_mentorships(&mut self, mentor: UserId) -> usize {
        self.projects
            .values_mut()
            .map(|project| project.mentors.remove(&mentor))
            .filter(|released| *released)
            .count()
    }

    fn entries_where(
        &self,
        application_filter: impl Fn(&Application) -> bool,
        assignment_filter: impl Fn(&Assignment) -> bool,
    ) -> LedgerEntries {
        LedgerEntries {
            applications: self
                .applications
                .values()
                .filter(|application| application_filter(application))
                .cloned()
                .collect(),
            assignments: self
                .assignments
                .values()
                .filter(|assignment| assignment_filter(assignment))
                .cloned()
                .collect(),
        }
    }
}

impl DirectoryRepository for MemoryStore {
    fn insert_user(&self, username: &str, role: Role) -> Result<User, RepositoryError> {
        let mut state = self.lock()?;
        if state.users.values().any(|user| user.username == username) {
            return Err(RepositoryError::Conflict(Conflict::Name {
                entity: EntityKind::User,
                name: username.to_string(),
            }));
        }

        let user = User {
            id: UserId(bump(&mut state.sequences.users)),
            username: username.to_string(),
            role,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn fetch_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    fn users(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self.lock()?.users.values().cloned().collect())
    }

    fn update_role(&self, id: UserId, role: Role) -> Result<RoleChange, RepositoryError> {
        let mut state = self.lock()?;
        let previous = state.user(id)?.role;

        let withdrawn_applications = if role.is_staff() {
            state.drop_applications_where(|application| application.user_id == id)
        } else {
            0
        };
        let released_mentorships = if role.is_staff() {
            0
        } else {
            state.release_mentorships(id)
        };

        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found(EntityKind::User, id.0))?;
        user.role = role;

        Ok(RoleChange {
            user: user.clone(),
            previous,
            withdrawn_applications,
            released_mentorships,
        })
    }

    fn delete_user(&self, id: UserId) -> Result<User, RepositoryError> {
        let mut state = self.lock()?;
        let user = state
            .users
            .remove(&id)
            .ok_or_else(|| RepositoryError::not_found(EntityKind::User, id.0))?;

        state.drop_applications_where(|application| application.user_id == id);
        state.drop_assignments_where(|assignment| assignment.user_id == id);
        state.release_mentorships(id);
        Ok(user)
    }
}

impl CatalogRepository for MemoryStore {
    fn insert_category(&self, name: &str) -> Result<Category, RepositoryError> {
        let mut state = self.lock()?;
        if state.categories.values().any(|category| category.name == name) {
            return Err(RepositoryError::Conflict(Conflict::Name {
                entity: EntityKind::Category,
                name: name.to_string(),
            }));
        }

        let category = Category {
            id: CategoryId(bump(&mut state.sequences.categories)),
            name: name.to_string(),
        };
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    fn categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let mut categories: Vec<Category> = self.lock()?.categories.values().cloned().collect();
        categories.sort_by(|left, right| left.name.cmp(&right.name).then(left.id.cmp(&right.id)));
        Ok(categories)
    }

    fn insert_language(&self, name: &str) -> Result<ProgrammingLanguage, RepositoryError> {
        let mut state = self.lock()?;
        if state.languages.values().any(|language| language.name == name) {
            return Err(RepositoryError::Conflict(Conflict::Name {
                entity: EntityKind::Language,
                name: name.to_string(),
            }));
        }

        let language = ProgrammingLanguage {
            id: LanguageId(bump(&mut state.sequences.languages)),
            name: name.to_string(),
        };
        state.languages.insert(language.id, language.clone());
        Ok(language)
    }

    fn languages(&self) -> Result<Vec<ProgrammingLanguage>, RepositoryError> {
        let mut languages: Vec<ProgrammingLanguage> =
            self.lock()?.languages.values().cloned().collect();
        languages.sort_by(|left, right| left.name.cmp(&right.name).then(left.id.cmp(&right.id)));
        Ok(languages)
    }

    fn insert_project(&self, spec: ProjectSpec) -> Result<Project, RepositoryError> {
        let mut state = self.lock()?;
        state.check_categories(&spec)?;

        let project = Project {
            id: ProjectId(bump(&mut state.sequences.projects)),
            name: spec.name,
            description: spec.description,
            created_at: Utc::now(),
            categories: spec.categories,
            mentors: Default::default(),
        };
        state.projects.insert(project.id, project.clone());
        Ok(project)
    }

    fn update_project(&self, id: ProjectId, spec: ProjectSpec) -> Result<Project, RepositoryError> {
        let mut state = self.lock()?;
        state.project(id)?;
        state.check_categories(&spec)?;

        let project = state
            .projects
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found(EntityKind::Project, id.0))?;
        project.name = spec.name;
        project.description = spec.description;
        project.categories = spec.categories;
        Ok(project.clone())
    }

    fn delete_project(&self, id: ProjectId) -> Result<ProjectRemoval, RepositoryError> {
        let mut state = self.lock()?;
        let project = state
            .projects
            .remove(&id)
            .ok_or_else(|| RepositoryError::not_found(EntityKind::Project, id.0))?;

        let applications_removed =
            state.drop_applications_where(|application| application.project_id == id);
        let assignments_removed =
            state.drop_assignments_where(|assignment| assignment.project_id == id);

        Ok(ProjectRemoval {
            project,
            applications_removed,
            assignments_removed,
        })
    }

    fn fetch_project(&self, id: ProjectId) -> Result<Option<Project>, RepositoryError> {
        Ok(self.lock()?.projects.get(&id).cloned())
    }

    fn projects(&self) -> Result<Vec<Project>, RepositoryError> {
        Ok(self.lock()?.projects.values().cloned().collect())
    }

    fn insert_course(&self, spec: CourseSpec) -> Result<Course, RepositoryError> {
        let mut state = self.lock()?;
        state.check_languages(&spec)?;

        let course = Course {
            id: CourseId(bump(&mut state.sequences.courses)),
            name: spec.name,
            description: spec.description,
            level: spec.level,
            languages: spec.languages,
            created_at: Utc::now(),
        };
        state.courses.insert(course.id, course.clone());
        Ok(course)
    }

    fn update_course(&self, id: CourseId, spec: CourseSpec) -> Result<Course, RepositoryError> {
        let mut state = self.lock()?;
        state.check_languages(&spec)?;

        let course = state
            .courses
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found(EntityKind::Course, id.0))?;
        course.name = spec.name;
        course.description = spec.description;
        course.level = spec.level;
        course.languages = spec.languages;
        Ok(course.clone())
    }

    fn delete_course(&self, id: CourseId) -> Result<Course, RepositoryError> {
        self.lock()?
            .courses
            .remove(&id)
            .ok_or_else(|| RepositoryError::not_found(EntityKind::Course, id.0))
    }

    fn courses(&self) -> Result<Vec<Course>, RepositoryError> {
        let mut courses: Vec<Course> = self.lock()?.courses.values().cloned().collect();
        courses.sort_by(|left, right| {
            left.level
                .cmp(&right.level)
                .then_with(|| left.name.cmp(&right.name))
                .then(left.id.cmp(&right.id))
        });
        Ok(courses)
    }

    fn add_mentor(&self, project: ProjectId, mentor: UserId) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        if !state.user(mentor)?.is_staff() {
            return Err(RepositoryError::Constraint(Constraint::MentorNotStaff));
        }

        let project = state
            .projects
            .get_mut(&project)
            .ok_or_else(|| RepositoryError::not_found(EntityKind::Project, project.0))?;
        Ok(project.mentors.insert(mentor))
    }

    fn remove_mentor(&self, project: ProjectId, mentor: UserId) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        let project = state
            .projects
            .get_mut(&project)
            .ok_or_else(|| RepositoryError::not_found(EntityKind::Project, project.0))?;
        Ok(project.mentors.remove(&mentor))
    }
}

impl LedgerRepository for MemoryStore {
    fn insert_application(&self, key: MembershipKey) -> Result<Application, RepositoryError> {
        let mut state = self.lock()?;
        state.project(key.project_id)?;
        if state.user(key.user_id)?.is_staff() {
            return Err(RepositoryError::Constraint(Constraint::StaffApplicant));
        }
        if state.application_index.contains_key(&key) {
            return Err(RepositoryError::Conflict(Conflict::Application));
        }
        if state.assignment_index.contains_key(&key) {
            return Err(RepositoryError::Conflict(Conflict::Assignment));
        }

        let application = Application {
            id: ApplicationId(bump(&mut state.sequences.applications)),
            user_id: key.user_id,
            project_id: key.project_id,
            status: ApplicationStatus::Pending,
            created_at: Utc::now(),
        };
        state.application_index.insert(key, application.id);
        state.applications.insert(application.id, application.clone());
        Ok(application)
    }

    fn fetch_application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self.lock()?.applications.get(&id).cloned())
    }

    fn resolve_application(
        &self,
        id: ApplicationId,
        resolution: Resolution,
    ) -> Result<ResolutionOutcome, RepositoryError> {
        let mut state = self.lock()?;
        let application = state
            .applications
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found(EntityKind::Application, id.0))?;

        if application.status != ApplicationStatus::Pending {
            let application = application.clone();
            let assignment = state.assignment_for(application.key()).cloned();
            return Ok(ResolutionOutcome {
                application,
                changed: false,
                assignment,
            });
        }

        application.status = resolution.target_status();
        let application = application.clone();
        let assignment = match resolution {
            Resolution::Accept => Some(state.get_or_create_assignment(application.key()).0),
            Resolution::Reject => state.assignment_for(application.key()).cloned(),
        };

        Ok(ResolutionOutcome {
            application,
            changed: true,
            assignment,
        })
    }

    fn ensure_assignment(&self, key: MembershipKey) -> Result<AssignmentOutcome, RepositoryError> {
        let mut state = self.lock()?;
        state.user(key.user_id)?;
        state.project(key.project_id)?;

        let (assignment, created) = state.get_or_create_assignment(key);
        Ok(AssignmentOutcome {
            assignment,
            created,
        })
    }

    fn remove_assignment(&self, id: AssignmentId) -> Result<AssignmentRemoval, RepositoryError> {
        let mut state = self.lock()?;
        let assignment = state
            .assignments
            .remove(&id)
            .ok_or_else(|| RepositoryError::not_found(EntityKind::Assignment, id.0))?;
        state.assignment_index.remove(&assignment.key());
        let application = state.drop_application(assignment.key());

        Ok(AssignmentRemoval {
            assignment,
            application,
        })
    }

    fn project_entries(&self, project: ProjectId) -> Result<LedgerEntries, RepositoryError> {
        Ok(self.lock()?.entries_where(
            |application| application.project_id == project,
            |assignment| assignment.project_id == project,
        ))
    }

    fn user_entries(&self, user: UserId) -> Result<LedgerEntries, RepositoryError> {
        Ok(self.lock()?.entries_where(
            |application| application.user_id == user,
            |assignment| assignment.user_id == user,
        ))
    }
}
