//! Taskdesk CLI: create a task and upload its attachments.
//!
//! Set TASKDESK_API_KEY and TASKDESK_API_URL, plus the storage settings
//! (STORAGE_BACKEND, S3_* or LOCAL_STORAGE_*). Ctrl-C cancels the upload in flight.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use taskdesk_api_client::ApiClient;
use taskdesk_cli::{init_tracing, log_error, not_uploaded, render_event, AttachmentSummary};
use taskdesk_core::{CreateTaskRequest, ParentId, UploadConfig};
use taskdesk_storage::create_storage;
use taskdesk_upload::{
    AttachmentValidator, FlowOutcome, NewAttachment, OrchestratorOptions, RunStop,
    TaskCreationFlow, UploadOrchestrator,
};
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(name = "taskdesk", about = "Create tasks and upload their attachments")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a task, then upload the given files as its attachments
    CreateTask {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        sprint: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<NaiveDate>,
        /// How many times to resume failed uploads
        #[arg(long, default_value = "0")]
        retries: u32,
        /// Files to attach, uploaded in order
        files: Vec<PathBuf>,
    },
    /// Upload files to an existing task
    Attach {
        /// Task ID
        #[arg(long)]
        task_id: String,
        #[arg(long, default_value = "0")]
        retries: u32,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize summary")?;
    println!("{}", out);
    Ok(())
}

async fn build_flow(config: &UploadConfig, task_id: Option<String>) -> anyhow::Result<TaskCreationFlow> {
    let client = Arc::new(ApiClient::from_config(config).context(
        "Failed to create API client. Set TASKDESK_API_KEY and TASKDESK_API_URL",
    )?);
    let store = create_storage(config)
        .await
        .context("Failed to initialize attachment storage")?;

    let orchestrator = UploadOrchestrator::new(
        store,
        client.clone(),
        OrchestratorOptions::from_config(config),
    );
    let validator = AttachmentValidator::from_config(config);

    Ok(match task_id {
        Some(id) => TaskCreationFlow::for_existing(ParentId::new(id), client, orchestrator, validator),
        None => TaskCreationFlow::new(client, orchestrator, validator),
    })
}

async fn stage_files(flow: &mut TaskCreationFlow, files: &[PathBuf]) -> anyhow::Result<()> {
    for path in files {
        let file = NewAttachment::from_path(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        flow.select_file(file)
            .inspect_err(log_error)
            .with_context(|| format!("Cannot attach {}", path.display()))?;
    }
    Ok(())
}

/// Resume while failures remain, up to `retries` times. A user cancel is final.
async fn retry(
    flow: &mut TaskCreationFlow,
    mut outcome: FlowOutcome,
    retries: u32,
) -> anyhow::Result<FlowOutcome> {
    for attempt in 1..=retries {
        let retryable = matches!(
            &outcome,
            FlowOutcome::NeedsAttention { result, can_resume: true } if result.stop != Some(RunStop::Cancelled)
        );
        if !retryable {
            break;
        }
        tracing::info!(attempt, retries, "Resuming failed uploads");
        outcome = flow.resume().await.inspect_err(log_error)?;
    }
    Ok(outcome)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = UploadConfig::from_env().context("Invalid configuration")?;

    let (task_id, files, retries, request) = match cli.command {
        Commands::CreateTask {
            title,
            description,
            project,
            sprint,
            assignee,
            priority,
            due,
            retries,
            files,
        } => {
            let request = CreateTaskRequest {
                description,
                project_id: project,
                sprint_id: sprint,
                assignee,
                priority,
                due_date: due,
                ..CreateTaskRequest::new(title)
            };
            (None, files, retries, Some(request))
        }
        Commands::Attach {
            task_id,
            retries,
            files,
        } => (Some(task_id), files, retries, None),
    };

    let mut flow = build_flow(&config, task_id).await?;
    stage_files(&mut flow, &files).await?;

    let mut events = flow.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = render_event(&event) {
                        println!("{}", line);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Progress output fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let handle = flow.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling upload...");
            handle.cancel();
        }
    });

    let outcome = match &request {
        Some(request) => flow.submit(request).await,
        None => flow.upload().await,
    }
    .inspect_err(log_error)?;
    let outcome = retry(&mut flow, outcome, retries).await?;

    let parent = flow.parent_id().cloned();
    let records = flow.close();
    // The flow owned the only sender; the printer drains and exits.
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "Progress printer stopped unexpectedly");
    }

    let summary: Vec<AttachmentSummary> = records.iter().map(AttachmentSummary::from).collect();
    print_json(&serde_json::json!({
        "task_id": parent,
        "outcome": outcome.result().outcome(),
        "attachments": summary,
    }))?;

    if !outcome.is_finalized() {
        anyhow::bail!("{} attachment(s) were not uploaded", not_uploaded(&records));
    }

    Ok(())
}
