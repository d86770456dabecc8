use anyhow::{Context, Result};
use conductor::cli::commands::{HistoryCommand, ListCommand, RunCommand, ValidateCommand};
use conductor::cli::output::{self, style, CHECK, CROSS, INFO, WARN};
use conductor::cli::{Cli, Command};
use conductor::core::config::PipelineConfig;
use conductor::core::{EventKind, PipelineEvent, RunReport, RunStatus};
use conductor::execution::{PipelineRunner, ProcessExecutor, RunnerEvent};
use conductor::secrets::{ChainedSecrets, EnvSecretProvider, MemorySecretStore, SecretProvider};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[cfg(feature = "sqlite")]
use conductor::persistence::{create_summary, PersistenceBackend, RunSummary, SqliteRunStore};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::List(cmd) => list_pipelines(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    // Load pipeline config
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    let pipeline = config
        .to_pipeline()
        .context("Failed to build pipeline from config")?;

    println!("{} Loaded pipeline: {}", INFO, style(&pipeline.name).bold());

    // Build the event context from CLI flags
    let mut event = PipelineEvent::new(EventKind::from(cmd.event), &cmd.repo, &cmd.branch);
    if let Some(tag) = &cmd.tag {
        event = event.with_tag(tag);
    }
    if event.kind == EventKind::Tag && event.tag.is_none() {
        anyhow::bail!("--event tag requires --tag");
    }

    // Layer --secret overrides over the environment-backed provider
    let overrides: MemorySecretStore = cmd.secret.iter().cloned().collect();
    let secrets: Arc<dyn SecretProvider> = Arc::new(ChainedSecrets::new(vec![
        Arc::new(overrides),
        Arc::new(EnvSecretProvider),
    ]));

    let mut runner = PipelineRunner::new(ProcessExecutor::new(), secrets);

    // Set up event handler for console output
    if !cmd.json {
        let progress = output::create_progress_bar(pipeline.steps().len());
        runner.add_event_handler(move |event| match &event {
            RunnerEvent::StepSkipped { .. }
            | RunnerEvent::StepSucceeded { .. }
            | RunnerEvent::StepFailed { .. } => {
                progress.println(output::format_runner_event(&event));
                progress.inc(1);
            }
            RunnerEvent::RunSkipped { .. } | RunnerEvent::RunCompleted { .. } => {
                progress.println(output::format_runner_event(&event));
                progress.finish_and_clear();
            }
            _ => progress.println(output::format_runner_event(&event)),
        });
    }

    // Execute pipeline
    let report = runner.run(&pipeline, &event).await;

    // Save to history
    if !cmd.no_history {
        save_history(&report).await?;
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n{}", output::format_report(&report));
    }

    // Print final status
    match report.status {
        RunStatus::Succeeded => {
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(&pipeline.name).bold(),
                style("successfully").green()
            );
        }
        RunStatus::Skipped => {
            println!(
                "\n{} {} {}",
                WARN,
                style(&pipeline.name).bold(),
                style("skipped (trigger rejected event)").dim()
            );
        }
        RunStatus::Failed => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&pipeline.name).bold(),
                style("failed").red()
            );
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
async fn save_history(report: &RunReport) -> Result<()> {
    let store = SqliteRunStore::with_default_path().await?;
    store.save_run(&create_summary(report)).await?;
    println!(
        "{} Run saved to history (ID: {})",
        INFO,
        style(&report.run_id.to_string()[..8]).dim()
    );
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
async fn save_history(_report: &RunReport) -> Result<()> {
    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let result = PipelineConfig::from_file(&cmd.file);

    match result {
        Ok(config) => {
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Steps: {}", style(config.steps.len()).cyan());
            println!(
                "  Trigger: {}",
                style(if config.trigger.is_some() {
                    "ref-gated"
                } else {
                    "always"
                })
                .cyan()
            );

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "sqlite")]
async fn list_pipelines(cmd: &ListCommand) -> Result<()> {
    let store = SqliteRunStore::with_default_path().await?;
    let pipelines = store.list_pipelines().await?;

    if pipelines.is_empty() {
        println!("{} No pipelines found in history", INFO);
        return Ok(());
    }

    println!("{} Pipelines in history:", INFO);

    for pipeline_name in &pipelines {
        let runs = store.list_runs(pipeline_name).await?;

        if cmd.with_counts {
            let succeeded = runs
                .iter()
                .filter(|r| r.status == RunStatus::Succeeded)
                .count();
            let failed = runs.iter().filter(|r| r.status == RunStatus::Failed).count();
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(pipeline_name).bold(),
                style(runs.len()).cyan(),
                style(succeeded).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(pipeline_name).bold());
        }
    }

    if cmd.json {
        let mut json_data = Vec::new();
        for pipeline in &pipelines {
            let runs = store.list_runs(pipeline).await.ok();
            json_data.push(serde_json::json!({
                "name": pipeline,
                "run_count": runs.as_ref().map(|r| r.len()).unwrap_or(0)
            }));
        }
        let data = serde_json::json!({ "pipelines": json_data });
        println!("\n{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(())
}

#[cfg(not(feature = "sqlite"))]
async fn list_pipelines(_cmd: &ListCommand) -> Result<()> {
    println!("{} Run history requires the `sqlite` feature", WARN);
    Ok(())
}

#[cfg(feature = "sqlite")]
async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = SqliteRunStore::with_default_path().await?;

    // If a specific run ID is requested
    if let Some(run_id_str) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id_str).context("Invalid run ID format")?;
        let summary = store.load_run(run_id).await?;

        match summary {
            Some(summary) => {
                print_run_details(&summary, cmd.verbose)?;
            }
            None => {
                println!("{} Run not found", WARN);
            }
        }
        return Ok(());
    }

    // List runs for pipeline or all
    let runs = if let Some(pipeline_name) = &cmd.pipeline {
        let mut runs = store.list_runs(pipeline_name).await?;
        runs.truncate(cmd.limit);
        runs
    } else {
        let pipelines = store.list_pipelines().await?;
        let mut all_runs = Vec::new();
        for pipeline in &pipelines {
            all_runs.extend(store.list_runs(pipeline).await?);
        }
        // Sort by started_at descending
        all_runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all_runs.into_iter().take(cmd.limit).collect()
    };

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        for summary in &runs {
            println!("  {}", output::format_run_summary(summary));
        }
    }

    Ok(())
}

#[cfg(not(feature = "sqlite"))]
async fn show_history(_cmd: &HistoryCommand) -> Result<()> {
    println!("{} Run history requires the `sqlite` feature", WARN);
    Ok(())
}

#[cfg(feature = "sqlite")]
fn print_run_details(summary: &RunSummary, verbose: bool) -> Result<()> {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Status: {}", output::format_run_status(summary.status));
    println!(
        "  Started: {}",
        style(summary.started_at.to_rfc3339()).dim()
    );
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!(
                "  Duration: {}",
                style(output::format_duration(duration)).dim()
            );
        }
    }
    println!(
        "  Steps: {} succeeded, {} failed, {} skipped ({} total)",
        style(summary.succeeded_steps).green(),
        style(summary.failed_steps).red(),
        style(summary.skipped_steps).dim(),
        summary.total_steps
    );

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}
