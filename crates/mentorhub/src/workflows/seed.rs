//! Out-of-band catalog seeding from a JSON document.
//!
//! Tags and users are get-or-create by name so a seed file can be applied to a store that
//! already holds part of it. Projects and courses are always inserted.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::workflows::membership::{
    CategoryId, CourseDraft, LanguageId, MembershipStore, ProjectDraft, RepositoryError, Role,
    UserId, ValidationError,
};

pub const DEFAULT_CATEGORIES: [&str; 9] = [
    "Machine Learning",
    "Data Visualization",
    "Deep Learning",
    "Natural Language Processing",
    "Computer Vision",
    "Data Analysis",
    "Big Data",
    "Learning",
    "Research",
];

pub const DEFAULT_LANGUAGES: [&str; 15] = [
    "Python",
    "JavaScript",
    "Java",
    "C++",
    "C#",
    "Ruby",
    "Go",
    "Rust",
    "PHP",
    "TypeScript",
    "Swift",
    "Kotlin",
    "R",
    "SQL",
    "Scala",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub projects: Vec<SeedProject>,
    #[serde(default)]
    pub courses: Vec<SeedCourse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedUser {
    pub username: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::User
}

/// Project entry referencing categories and mentors by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedProject {
    #[serde(default)]
    pub name: Option<String>,
    pub description: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub mentors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedCourse {
    pub name: String,
    pub description: String,
    pub level: i64,
    #[serde(default)]
    pub languages: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read seed file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse seed document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown {kind} '{name}'")]
    UnknownReference { kind: &'static str, name: String },
    #[error("invalid entry '{entry}': {source}")]
    Invalid {
        entry: String,
        #[source]
        source: ValidationError,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Rows created by one seeding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub users: usize,
    pub categories: usize,
    pub languages: usize,
    pub projects: usize,
    pub courses: usize,
    pub mentorships: usize,
}

impl SeedFile {
    /// Tag lists applied when no seed file is configured.
    pub fn defaults() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES.iter().map(|name| name.to_string()).collect(),
            languages: DEFAULT_LANGUAGES.iter().map(|name| name.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, SeedError> {
        let file = File::open(path).map_err(|source| SeedError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SeedError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SeedError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::defaults()),
        }
    }

    /// Writes the document into `store`, resolving names against rows already present.
    pub fn apply<S>(&self, store: &S) -> Result<SeedSummary, SeedError>
    where
        S: MembershipStore,
    {
        let mut summary = SeedSummary::default();

        let mut users: HashMap<String, UserId> = store
            .users()?
            .into_iter()
            .map(|user| (user.username, user.id))
            .collect();
        for entry in &self.users {
            if !users.contains_key(&entry.username) {
                let user = store.insert_user(&entry.username, entry.role)?;
                users.insert(user.username, user.id);
                summary.users += 1;
            }
        }

        let mut categories: HashMap<String, CategoryId> = store
            .categories()?
            .into_iter()
            .map(|category| (category.name, category.id))
            .collect();
        for name in &self.categories {
            let name = tag(name)?;
            if !categories.contains_key(&name) {
                let category = store.insert_category(&name)?;
                categories.insert(category.name, category.id);
                summary.categories += 1;
            }
        }

        let mut languages: HashMap<String, LanguageId> = store
            .languages()?
            .into_iter()
            .map(|language| (language.name, language.id))
            .collect();
        for name in &self.languages {
            let name = tag(name)?;
            if !languages.contains_key(&name) {
                let language = store.insert_language(&name)?;
                languages.insert(language.name, language.id);
                summary.languages += 1;
            }
        }

        let known_categories = store.categories()?;
        for entry in &self.projects {
            let draft = ProjectDraft {
                name: entry.name.clone(),
                description: entry.description.clone(),
                categories: resolve(&categories, &entry.categories, "category")?,
            };
            let label = entry.name.clone().unwrap_or_default();
            let spec = draft
                .validate(&known_categories)
                .map_err(|source| SeedError::Invalid {
                    entry: label,
                    source,
                })?;
            let project = store.insert_project(spec)?;
            summary.projects += 1;

            for mentor in resolve(&users, &entry.mentors, "user")? {
                if store.add_mentor(project.id, mentor)? {
                    summary.mentorships += 1;
                }
            }
            debug!(project_id = %project.id, name = project.display_name(), "seeded project");
        }

        let known_languages = store.languages()?;
        for entry in &self.courses {
            let draft = CourseDraft {
                name: entry.name.clone(),
                description: entry.description.clone(),
                level: entry.level,
                languages: resolve(&languages, &entry.languages, "programming language")?,
            };
            let spec = draft
                .validate(&known_languages)
                .map_err(|source| SeedError::Invalid {
                    entry: entry.name.clone(),
                    source,
                })?;
            store.insert_course(spec)?;
            summary.courses += 1;
        }

        info!(
            users = summary.users,
            categories = summary.categories,
            languages = summary.languages,
            projects = summary.projects,
            courses = summary.courses,
            "seed applied"
        );
        Ok(summary)
    }
}

fn tag(raw: &str) -> Result<String, SeedError> {
    crate::workflows::membership::catalog::tag_name(raw).map_err(|source| SeedError::Invalid {
        entry: raw.to_string(),
        source,
    })
}

fn resolve<T: Copy>(
    index: &HashMap<String, T>,
    names: &[String],
    kind: &'static str,
) -> Result<Vec<T>, SeedError> {
    names
        .iter()
        .map(|name| {
            index
                .get(name.trim())
                .copied()
                .ok_or_else(|| SeedError::UnknownReference {
                    kind,
                    name: name.clone(),
                })
        })
        .collect()
}
