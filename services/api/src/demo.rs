use chrono::{DateTime, Utc};
use clap::Args;
use mentorhub::error::AppError;
use mentorhub::workflows::membership::{
    Actor, Assignment, DirectoryRepository, LedgerRepository, MembershipError, MembershipService,
    MemoryStore, ProjectDraft, ResolutionOutcome, Role,
};
use mentorhub::workflows::seed::SeedFile;
use serde::Serialize;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Emit each step as a JSON line instead of prose.
    #[arg(long)]
    pub(crate) json: bool,
    /// Project name used for the walkthrough.
    #[arg(long, default_value = "AI Project")]
    pub(crate) project: String,
}

/// One observable transition in the walkthrough.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct DemoStep {
    pub(crate) action: &'static str,
    pub(crate) actor: String,
    pub(crate) outcome: String,
    pub(crate) applications: usize,
    pub(crate) assignments: usize,
    pub(crate) at: DateTime<Utc>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let steps = demo_steps(&args.project)?;
    for step in &steps {
        if args.json {
            let line = serde_json::to_string(step)
                .map_err(|err| AppError::Io(std::io::Error::other(err)))?;
            println!("{line}");
        } else {
            println!(
                "[{}] {:<18} {:<6} -> {} (applications: {}, assignments: {})",
                step.at.format("%H:%M:%S"),
                step.action,
                step.actor,
                step.outcome,
                step.applications,
                step.assignments,
            );
        }
    }
    Ok(())
}

/// Runs apply, accept (twice), remove and re-apply against a fresh in-memory store.
pub(crate) fn demo_steps(project_name: &str) -> Result<Vec<DemoStep>, AppError> {
    let store = Arc::new(MemoryStore::new());
    SeedFile::defaults().apply(store.as_ref())?;
    let service = MembershipService::new(store.clone());

    let applicant = Actor::from(
        store
            .insert_user("ada", Role::User)
            .map_err(MembershipError::from)?,
    );
    let staff = Actor::from(
        store
            .insert_user("grace", Role::Staff)
            .map_err(MembershipError::from)?,
    );

    let project = service.create_project(
        &staff,
        ProjectDraft {
            name: Some(project_name.to_string()),
            description: "Walkthrough project for the membership workflow".to_string(),
            categories: Vec::new(),
        },
    )?;

    let mut steps = Vec::new();
    let mut record = |action: &'static str,
                      actor: &Actor,
                      outcome: String|
     -> Result<(), AppError> {
        let entries = store
            .project_entries(project.id)
            .map_err(MembershipError::from)?;
        steps.push(DemoStep {
            action,
            actor: actor
                .user()
                .map(|user| user.username.clone())
                .unwrap_or_default(),
            outcome,
            applications: entries.applications.len(),
            assignments: entries.assignments.len(),
            at: Utc::now(),
        });
        Ok(())
    };

    let application = service.apply(&applicant, project.id)?;
    record(
        "apply",
        &applicant,
        format!("application {} {}", application.id, application.status.label()),
    )?;

    let accepted = service.accept(&staff, application.id)?;
    let assignment = accepted_assignment(accepted)?;
    record(
        "accept",
        &staff,
        format!("assignment {} created", assignment.id),
    )?;

    let repeated = service.accept(&staff, application.id)?;
    record(
        "accept (repeat)",
        &staff,
        format!("changed: {}", repeated.changed),
    )?;

    let duplicate = match service.apply(&applicant, project.id) {
        Ok(_) => "unexpectedly accepted".to_string(),
        Err(err) => format!("rejected ({})", err.code()),
    };
    record("apply (duplicate)", &applicant, duplicate)?;

    let removal = service.remove_assignment(&staff, assignment.id)?;
    record(
        "remove",
        &staff,
        format!(
            "assignment {} removed, application cleared: {}",
            removal.assignment.id,
            removal.application.is_some()
        ),
    )?;

    let reapplied = service.apply(&applicant, project.id)?;
    record(
        "re-apply",
        &applicant,
        format!("application {} {}", reapplied.id, reapplied.status.label()),
    )?;

    Ok(steps)
}

/// The assignment an accept produced. An accept that left none behind aborts the walkthrough.
fn accepted_assignment(outcome: ResolutionOutcome) -> Result<Assignment, AppError> {
    let application_id = outcome.application.id;
    outcome.assignment.ok_or_else(|| {
        AppError::Io(std::io::Error::other(format!(
            "accepting application {application_id} ({}) produced no assignment",
            outcome.application.status.label()
        )))
    })
}
