//! StoryDelta - story-to-wiki delta planner
//!
//! CLI entry point: plan page updates, inspect chunking, preview diffs.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use storydelta::cli::{Cli, Command, OutputFormat};
use storydelta::config::Config;
use storydelta::delta::{
    PageAction, PlanRequest, StoryDeltaPlan, StoryDeltaPlanner, UpdatePolicy, build_diff_preview, chunk_story,
};
use storydelta::llm::create_client;
use storydelta::prompts::PromptLoader;
use storydelta::vault;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("storydelta")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("storydelta.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(provider = %config.llm.provider, model = %config.llm.model, "StoryDelta loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Plan {
            story,
            vault,
            folder,
            policy,
            format,
            diff,
            apply,
        } => cmd_plan(&config, &story, &vault, folder, policy, format, diff, apply).await,
        Command::Chunks {
            story,
            max_chars,
            format,
        } => cmd_chunks(&config, &story, max_chars, format),
        Command::Diff { old, new } => cmd_diff(&old, &new),
    }
}

fn read_story(path: &Path) -> Result<String> {
    fs::read_to_string(path).context(format!("Failed to read story file {}", path.display()))
}

/// Plan (and optionally apply) the delta for one story file
#[allow(clippy::too_many_arguments)]
async fn cmd_plan(
    config: &Config,
    story_path: &Path,
    vault_root: &Path,
    folder: Option<String>,
    policy: Option<UpdatePolicy>,
    format: OutputFormat,
    show_diff: bool,
    apply: bool,
) -> Result<()> {
    debug!(?story_path, ?vault_root, ?folder, ?policy, %format, show_diff, apply, "cmd_plan: called");
    let story = read_story(story_path)?;
    let existing = vault::load_existing_pages(vault_root)?;

    let request = PlanRequest::new(story, folder.unwrap_or_else(|| config.plan.target_folder.clone()))
        .with_existing_pages(existing)
        .with_policy(policy.unwrap_or(config.plan.update_policy))
        .with_options(config.plan.options())
        .with_tags(config.plan.tag_options());

    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let planner = StoryDeltaPlanner::new(llm)
        .with_prompts(PromptLoader::new(vault_root))
        .with_max_tokens(config.llm.max_tokens);

    // Ctrl+C aborts the run between model calls
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling plan");
            signal_token.cancel();
        }
    });

    let plan = planner
        .plan_with_cancel(&request, &cancel)
        .await
        .context("Planning failed")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Text => print_plan(&plan, show_diff),
    }

    if apply {
        if plan.is_empty() {
            println!("Nothing to apply");
            return Ok(());
        }
        let summary = vault::apply_plan(vault_root, &plan)?;
        println!(
            "{} Applied plan: {} created, {} updated",
            "✓".green(),
            summary.created,
            summary.updated
        );
    }
    Ok(())
}

fn print_plan(plan: &StoryDeltaPlan, show_diff: bool) {
    println!(
        "{} chunk(s), {} operation(s), {} skipped (low confidence)",
        plan.chunk_count, plan.operation_count, plan.skipped_low_confidence
    );

    if plan.is_empty() {
        println!("{}", "No page changes".dimmed());
    }

    for (change, page) in plan.changes.iter().zip(&plan.pages) {
        let action = match change.action {
            PageAction::Create => "create".green(),
            PageAction::Update => "update".yellow(),
        };
        println!(
            "{} {} {} (+{} -{}, confidence {:.2})",
            action,
            change.path.cyan(),
            change.title.dimmed(),
            change.added_lines,
            change.removed_lines,
            change.max_confidence
        );
        if show_diff {
            print_diff(&page.diff.preview);
            println!();
        }
    }

    for warning in &plan.warnings {
        println!("{} {}", "warning:".yellow(), warning);
    }
}

fn print_diff(preview: &str) {
    for line in preview.lines() {
        if line.starts_with("@@") {
            println!("{}", line.cyan());
        } else if line.starts_with('+') {
            println!("{}", line.green());
        } else if line.starts_with('-') {
            println!("{}", line.red());
        } else {
            println!("{}", line);
        }
    }
}

/// Show the chunks a story would be split into
fn cmd_chunks(config: &Config, story_path: &Path, max_chars: Option<usize>, format: OutputFormat) -> Result<()> {
    debug!(?story_path, ?max_chars, %format, "cmd_chunks: called");
    let story = read_story(story_path)?;
    let chunks = chunk_story(&story, max_chars.unwrap_or(config.plan.max_chunk_chars));

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&chunks)?),
        OutputFormat::Text => {
            for chunk in &chunks {
                println!(
                    "{} ({} chars)",
                    format!("Chunk {}", chunk.index).bold(),
                    chunk.text.chars().count()
                );
                println!("{}", chunk.text);
                println!();
            }
            println!("{} chunk(s)", chunks.len());
        }
    }
    Ok(())
}

/// Preview the diff between two files
fn cmd_diff(old: &Path, new: &Path) -> Result<()> {
    debug!(?old, ?new, "cmd_diff: called");
    let previous = fs::read_to_string(old).context(format!("Failed to read {}", old.display()))?;
    let next = fs::read_to_string(new).context(format!("Failed to read {}", new.display()))?;

    let diff = build_diff_preview(PageAction::Update, Some(&previous), &next);
    print_diff(&diff.preview);
    println!("+{} -{}", diff.added_lines, diff.removed_lines);
    Ok(())
}
