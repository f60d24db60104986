//! `bolty generate`: run one prompt through the pipeline.

use bolty_providers::build_from_config;
use bolty_worker::{GenerateRequest, Orchestrator, ProjectType};
use bolty_workspace::{AuditOutcome, LocalWorkspace};
use std::path::Path;
use std::sync::Arc;

pub struct GenerateArgs {
    pub prompt: String,
    pub project: String,
    pub models: Vec<String>,
    pub project_type: Option<String>,
    pub print: bool,
}

pub async fn run(
    explicit: Option<&Path>,
    args: GenerateArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(explicit)?;
    let backend = build_from_config(&config)?;
    let store = super::open_store(&config)?;
    let workspace = Arc::new(
        LocalWorkspace::new(&config.workspace.base_dir)
            .with_allowed_commands(config.workspace.allowed_commands.clone()),
    );
    let audit = workspace.audit();

    let orchestrator = Orchestrator::from_config(&config, backend, store, workspace.clone())?;

    let mut request = GenerateRequest::new(args.project.as_str(), args.prompt)
        .with_model_hints(args.models);
    if let Some(project_type) = args.project_type {
        request = request.with_project_type(project_type.parse::<ProjectType>()?);
    }

    let project_dir = workspace.project_dir(&request.project_id)?;
    let outcome = orchestrator.generate(request).await?;

    if args.print {
        println!("{}", outcome.text);
        println!();
    }

    println!("⚡ Generation complete");
    println!("   Model:     {} ({})", outcome.model_id, outcome.mode);
    println!("   Actions:   {} dispatched, {} failed", outcome.actions_dispatched, outcome.actions_failed);
    if outcome.failed_attempts > 0 {
        println!("   Retries:   {} failed attempt(s) before success", outcome.failed_attempts);
    }
    println!("   Response:  {} chars", outcome.text.len());
    println!("   Workspace: {}", project_dir.display());

    let problems: Vec<_> = audit
        .entries()
        .into_iter()
        .filter(|e| e.outcome != AuditOutcome::Success)
        .collect();
    if !problems.is_empty() {
        println!();
        for entry in &problems {
            println!(
                "   ⚠️  {:?} {:?}: {}",
                entry.outcome,
                entry.event,
                entry.details.as_deref().unwrap_or("")
            );
        }
    }

    Ok(())
}
