//! Catalog drafts, their validation, and the staff-only create/update/delete operations.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    Actor, Category, CategoryId, Course, CourseId, CourseLevel, LanguageId, ProgrammingLanguage,
    Project, ProjectId,
};
use super::policy::{self, Capability};
use super::repository::ProjectRemoval;
use super::service::{MembershipError, MembershipService, MembershipStore};

pub const MAX_NAME_CHARS: usize = 255;
/// Reserved as a list separator in project names.
pub const PROJECT_NAME_SEPARATOR: char = ',';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("project name cannot contain commas")]
    CommaInProjectName,
    #[error("{field} must not be blank")]
    Blank { field: &'static str },
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("course level must be between 1 and 5, found {0}")]
    LevelOutOfRange(i64),
    #[error("course level must be a number, found '{0}'")]
    LevelNotNumeric(String),
    #[error("unknown category {0}")]
    UnknownCategory(CategoryId),
    #[error("unknown programming language {0}")]
    UnknownLanguage(LanguageId),
}

/// Raw project input as submitted by staff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDraft {
    #[serde(default)]
    pub name: Option<String>,
    pub description: String,
    #[serde(default)]
    pub categories: Vec<CategoryId>,
}

/// Validated project fields ready for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSpec {
    pub name: Option<String>,
    pub description: String,
    pub categories: BTreeSet<CategoryId>,
}

impl ProjectDraft {
    pub fn validate(self, known: &[Category]) -> Result<ProjectSpec, ValidationError> {
        let name = match self.name.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(name) if name.contains(PROJECT_NAME_SEPARATOR) => {
                return Err(ValidationError::CommaInProjectName)
            }
            Some(name) => Some(bounded("name", name)?),
        };
        let description = required("description", &self.description)?;

        let categories: BTreeSet<CategoryId> = self.categories.into_iter().collect();
        if let Some(unknown) = categories
            .iter()
            .find(|id| !known.iter().any(|category| category.id == **id))
        {
            return Err(ValidationError::UnknownCategory(*unknown));
        }

        Ok(ProjectSpec {
            name,
            description,
            categories,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseDraft {
    pub name: String,
    pub description: String,
    pub level: i64,
    #[serde(default)]
    pub languages: Vec<LanguageId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseSpec {
    pub name: String,
    pub description: String,
    pub level: CourseLevel,
    pub languages: BTreeSet<LanguageId>,
}

impl CourseDraft {
    pub fn validate(self, known: &[ProgrammingLanguage]) -> Result<CourseSpec, ValidationError> {
        let name = bounded("name", required("name", &self.name)?.as_str())?;
        let description = required("description", &self.description)?;
        let level = CourseLevel::from_ordinal(self.level)
            .ok_or(ValidationError::LevelOutOfRange(self.level))?;

        let languages: BTreeSet<LanguageId> = self.languages.into_iter().collect();
        if let Some(unknown) = languages
            .iter()
            .find(|id| !known.iter().any(|language| language.id == **id))
        {
            return Err(ValidationError::UnknownLanguage(*unknown));
        }

        Ok(CourseSpec {
            name,
            description,
            level,
            languages,
        })
    }
}

/// Trimmed, non-blank, length-bounded tag name.
pub fn tag_name(raw: &str) -> Result<String, ValidationError> {
    bounded("name", required("name", raw)?.as_str())
}

fn required(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(ValidationError::Blank { field })
    } else {
        Ok(trimmed.to_string())
    }
}

fn bounded(field: &'static str, value: &str) -> Result<String, ValidationError> {
    if value.chars().count() > MAX_NAME_CHARS {
        Err(ValidationError::TooLong {
            field,
            max: MAX_NAME_CHARS,
        })
    } else {
        Ok(value.to_string())
    }
}

impl<S> MembershipService<S>
where
    S: MembershipStore + 'static,
{
    pub fn create_project(
        &self,
        actor: &Actor,
        draft: ProjectDraft,
    ) -> Result<Project, MembershipError> {
        policy::require(actor, Capability::ManageCatalog)?;
        let spec = draft.validate(&self.store().categories()?)?;
        let project = self.store().insert_project(spec)?;
        info!(project_id = %project.id, name = project.display_name(), "project created");
        Ok(project)
    }

    pub fn update_project(
        &self,
        actor: &Actor,
        project_id: ProjectId,
        draft: ProjectDraft,
    ) -> Result<Project, MembershipError> {
        policy::require(actor, Capability::ManageCatalog)?;
        let spec = draft.validate(&self.store().categories()?)?;
        let project = self.store().update_project(project_id, spec)?;
        info!(project_id = %project.id, "project updated");
        Ok(project)
    }

    /// Removes the project together with every application and assignment that references it.
    pub fn delete_project(
        &self,
        actor: &Actor,
        project_id: ProjectId,
    ) -> Result<ProjectRemoval, MembershipError> {
        policy::require(actor, Capability::ManageCatalog)?;
        let removal = self.store().delete_project(project_id)?;
        info!(
            project_id = %project_id,
            applications = removal.applications_removed,
            assignments = removal.assignments_removed,
            "project deleted"
        );
        Ok(removal)
    }

    pub fn create_course(
        &self,
        actor: &Actor,
        draft: CourseDraft,
    ) -> Result<Course, MembershipError> {
        policy::require(actor, Capability::ManageCatalog)?;
        let spec = draft.validate(&self.store().languages()?)?;
        let course = self.store().insert_course(spec)?;
        info!(course_id = %course.id, level = course.level.ordinal(), "course created");
        Ok(course)
    }

    pub fn update_course(
        &self,
        actor: &Actor,
        course_id: CourseId,
        draft: CourseDraft,
    ) -> Result<Course, MembershipError> {
        policy::require(actor, Capability::ManageCatalog)?;
        let spec = draft.validate(&self.store().languages()?)?;
        let course = self.store().update_course(course_id, spec)?;
        info!(course_id = %course.id, "course updated");
        Ok(course)
    }

    pub fn delete_course(
        &self,
        actor: &Actor,
        course_id: CourseId,
    ) -> Result<Course, MembershipError> {
        policy::require(actor, Capability::ManageCatalog)?;
        let course = self.store().delete_course(course_id)?;
        info!(course_id = %course_id, "course deleted");
        Ok(course)
    }

    pub fn categories(&self, actor: &Actor) -> Result<Vec<Category>, MembershipError> {
        policy::require_authenticated(actor)?;
        Ok(self.store().categories()?)
    }

    pub fn languages(&self, actor: &Actor) -> Result<Vec<ProgrammingLanguage>, MembershipError> {
        policy::require_authenticated(actor)?;
        Ok(self.store().languages()?)
    }
}
