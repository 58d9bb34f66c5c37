use metrics_exporter_prometheus::PrometheusHandle;
use mentorhub::error::AppError;
use mentorhub::workflows::membership::{MembershipService, MemoryStore};
use mentorhub::workflows::seed::{SeedFile, SeedSummary};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Builds the shared store and applies the configured seed (or the built-in tag lists).
pub(crate) fn bootstrap_service(
    seed_path: Option<&Path>,
) -> Result<(Arc<MembershipService<MemoryStore>>, SeedSummary), AppError> {
    let store = Arc::new(MemoryStore::new());
    let seed = SeedFile::load_or_default(seed_path)?;
    let summary = seed.apply(store.as_ref())?;
    let source = seed_path
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    info!(
        seed = %source,
        projects = summary.projects,
        courses = summary.courses,
        "catalog seeded"
    );
    Ok((Arc::new(MembershipService::new(store)), summary))
}

pub(crate) fn run_seed_check(path: &Path, as_json: bool) -> Result<(), AppError> {
    let seed = SeedFile::from_path(path)?;
    let summary = seed.apply(&MemoryStore::new())?;

    if as_json {
        let rendered = serde_json::to_string_pretty(&summary)
            .map_err(|err| AppError::Io(std::io::Error::other(err)))?;
        println!("{rendered}");
    } else {
        println!("{}", render_summary(path, &summary));
    }
    Ok(())
}

pub(crate) fn render_summary(path: &Path, summary: &SeedSummary) -> String {
    format!(
        "Seed file {} is valid\n  users:       {}\n  categories:  {}\n  languages:   {}\n  projects:    {}\n  courses:     {}\n  mentorships: {}",
        path.display(),
        summary.users,
        summary.categories,
        summary.languages,
        summary.projects,
        summary.courses,
        summary.mentorships,
    )
}
