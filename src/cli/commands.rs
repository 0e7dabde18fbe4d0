//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use crate::cli::output::{
    OutputFormat, format_aggregation, format_files, format_history, format_prompt_logs,
    format_report, format_stats,
};
use crate::cli::parser::{BudgetArgs, Cli, Commands, EndpointArgs, FilterArgs};
use crate::client::HttpEndpoint;
use crate::config::Config;
use crate::context::FolderContextProvider;
use crate::core::HistoryEntry;
use crate::dispatch::DispatchEvent;
use crate::error::{CommandError, Result};
use crate::io::{FileClassifier, LocalWorkspace, primary_root, walk_folder};
use crate::prompt::{MessageSettings, PromptSet, construct_messages};
use crate::storage::{MemorySessionStore, SessionStore, SqliteSessionStore};
use crate::telemetry::create_sink;
use crate::warm::{WarmEvent, WarmRequest, Warmer};
use std::fmt::Write as FmtWrite;
use std::io::{self, Write as IoWrite};
use std::path::Path;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub async fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let config = match (&cli.command, cli.config.as_deref()) {
        // `init` is what creates the file.
        (Commands::Init { .. }, Some(path)) if !path.exists() => Config::default(),
        (_, path) => Config::load(path)?,
    };
    let db_path = cli.get_db_path(&config);

    match &cli.command {
        Commands::Init { force } => cmd_init(cli, &db_path, *force, format),
        Commands::Files { path, filter } => {
            cmd_files(&config, path.as_deref(), filter, format)
        }
        Commands::Context {
            path,
            filter,
            budget,
            render,
        } => cmd_context(
            cli,
            &config,
            path.as_deref(),
            filter,
            budget,
            *render,
            format,
        ),
        Commands::Warm {
            path,
            endpoint,
            filter,
            budget,
            prompt,
            rules,
            no_history,
            quiet,
        } => {
            let options = WarmOptions {
                path: path.as_deref(),
                endpoint,
                filter,
                budget,
                prompt: prompt.as_deref(),
                rules,
                no_history: *no_history,
                quiet: *quiet,
            };
            cmd_warm(cli, config, &db_path, options, format).await
        }
        Commands::History { log } => cmd_history(&db_path, *log, format),
        Commands::Reset { yes } => cmd_reset(&db_path, *yes, format),
    }
}

/// Arguments of the `warm` command.
struct WarmOptions<'a> {
    path: Option<&'a Path>,
    endpoint: &'a EndpointArgs,
    filter: &'a FilterArgs,
    budget: &'a BudgetArgs,
    prompt: Option<&'a str>,
    rules: &'a [String],
    no_history: bool,
    quiet: bool,
}

fn cmd_init(cli: &Cli, db_path: &Path, force: bool, format: OutputFormat) -> Result<String> {
    let config_path = cli
        .config
        .clone()
        .or_else(Config::default_path)
        .ok_or_else(|| CommandError::ExecutionFailed("Cannot determine config path".to_string()))?;
    let prompt_dir = PromptSet::resolve_dir(cli.prompt_dir.as_deref()).ok_or_else(|| {
        CommandError::ExecutionFailed("Cannot determine prompt directory".to_string())
    })?;

    let mut written = Vec::new();
    if Config::write_default(&config_path)? {
        written.push(config_path.clone());
    }
    written.extend(PromptSet::write_defaults(&prompt_dir)?);

    if force && db_path.exists() {
        std::fs::remove_file(db_path).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to remove existing database: {e}"))
        })?;
    }
    let mut store = SqliteSessionStore::open(db_path)?;
    store.init()?;

    match format {
        OutputFormat::Json => Ok(format!(
            "{}\n",
            serde_json::to_string_pretty(&serde_json::json!({
                "config": config_path,
                "prompt_dir": prompt_dir,
                "database": db_path,
                "written": written,
            }))
            .unwrap_or_default()
        )),
        OutputFormat::Text => {
            let mut output = String::new();
            for path in &written {
                let _ = writeln!(output, "Wrote {}", path.display());
            }
            if written.is_empty() {
                output.push_str("Config and prompt templates already exist.\n");
            }
            let _ = writeln!(output, "Session database: {}", db_path.display());
            Ok(output)
        }
    }
}

fn classifier_for(config: &Config, filter: &FilterArgs) -> FileClassifier {
    FileClassifier::default()
        .with_extra_dirs(config.exclude_dirs.iter().chain(&filter.exclude_dirs).cloned())
        .with_extra_extensions(
            config
                .exclude_extensions
                .iter()
                .chain(&filter.exclude_extensions)
                .cloned(),
        )
}

fn cmd_files(
    config: &Config,
    path: Option<&Path>,
    filter: &FilterArgs,
    format: OutputFormat,
) -> Result<String> {
    let workspace = LocalWorkspace::open(path)?;
    let root = primary_root(&workspace)?;
    let files = walk_folder(&workspace, &classifier_for(config, filter), &root)?;
    Ok(format_files(&root, &files, format))
}

fn cmd_context(
    cli: &Cli,
    config: &Config,
    path: Option<&Path>,
    filter: &FilterArgs,
    budget: &BudgetArgs,
    render: bool,
    format: OutputFormat,
) -> Result<String> {
    let budget = budget.apply(config.budget);
    Config::validate_budget(&budget)?;

    let workspace = LocalWorkspace::open(path)?;
    let root = primary_root(&workspace)?;
    let provider = FolderContextProvider::new(&workspace, classifier_for(config, filter), budget);
    let aggregation = provider.collect(&root)?;

    if !render {
        return Ok(format_aggregation(&aggregation, format));
    }

    let prompts = PromptSet::load(cli.prompt_dir.as_deref());
    let settings = MessageSettings {
        rules: config.rules.clone(),
    };
    let entry = HistoryEntry::user(prompts.warmup, aggregation.items);
    let messages = construct_messages(&entry, &prompts.system, &settings);

    match format {
        OutputFormat::Json => Ok(format!(
            "{}\n",
            serde_json::to_string_pretty(&messages).unwrap_or_default()
        )),
        OutputFormat::Text => {
            let mut output = String::new();
            for message in &messages {
                let _ = writeln!(output, "=== {} ===", message.role.as_str());
                let _ = writeln!(output, "{}\n", message.content);
            }
            Ok(output)
        }
    }
}

async fn cmd_warm(
    cli: &Cli,
    mut config: Config,
    db_path: &Path,
    options: WarmOptions<'_>,
    format: OutputFormat,
) -> Result<String> {
    options.endpoint.apply(&mut config);
    config.budget = options.budget.apply(config.budget);
    config.validate()?;

    let endpoint = HttpEndpoint::new(
        &config.endpoint,
        &config.model_title,
        config.api_key.clone(),
        config.timeout(),
    )?;
    let telemetry = create_sink(config.telemetry_url.as_deref(), config.timeout())?;

    let mut store: Box<dyn SessionStore> = if options.no_history {
        Box::new(MemorySessionStore::new())
    } else {
        Box::new(SqliteSessionStore::open(db_path)?)
    };
    store.init()?;

    let mut prompts = PromptSet::load(cli.prompt_dir.as_deref());
    if let Some(prompt) = options.prompt {
        prompts.warmup = prompt.to_string();
    }
    let mut rules = config.rules.clone();
    rules.extend(options.rules.iter().cloned());

    let workspace = LocalWorkspace::open(options.path)?;
    let request = WarmRequest {
        root: primary_root(&workspace)?,
        workspace: &workspace,
        classifier: classifier_for(&config, options.filter),
        budget: config.budget,
        prompts,
        settings: MessageSettings { rules },
        options: config.options.clone(),
    };

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling warm-up");
                cancel.cancel();
            }
        })
    };

    let echo = format == OutputFormat::Text && !options.quiet;
    let warmer = Warmer::new(&endpoint, telemetry.as_ref());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let run = async {
        let tx = tx;
        warmer.warm(request, &mut *store, &tx, &cancel).await
    };
    let present = async {
        let mut echoed = false;
        while let Some(event) = rx.recv().await {
            echoed |= present_event(&event, echo);
        }
        echoed
    };
    let (result, echoed) = tokio::join!(run, present);
    interrupt.abort();

    let report = result?;
    let mut output = format_report(&report, format);
    if echoed {
        output.insert_str(0, "\n\n");
    }
    Ok(output)
}

/// Shows one warm-up event. Returns true if response text was echoed.
fn present_event(event: &WarmEvent, echo: bool) -> bool {
    match event {
        WarmEvent::Progress { phase, percent } => {
            tracing::info!(phase = phase.as_str(), percent, "progress");
            false
        }
        WarmEvent::Dispatch {
            event: DispatchEvent::Delta { content },
        } if echo => {
            let mut stdout = io::stdout().lock();
            let _ = stdout.write_all(content.as_bytes());
            let _ = stdout.flush();
            true
        }
        WarmEvent::Dispatch { event } => {
            tracing::debug!(?event, "dispatch");
            false
        }
    }
}

/// Opens an existing session database.
fn open_store(db_path: &Path) -> Result<SqliteSessionStore> {
    if !db_path.exists() {
        return Err(CommandError::ExecutionFailed(format!(
            "Session database not found at {}. Run 'kvwarm init' first.",
            db_path.display()
        ))
        .into());
    }
    let mut store = SqliteSessionStore::open(db_path)?;
    store.init()?;
    Ok(store)
}

fn cmd_history(db_path: &Path, log: bool, format: OutputFormat) -> Result<String> {
    let store = open_store(db_path)?;
    if log {
        return Ok(format_prompt_logs(&store.prompt_logs()?, format));
    }

    let entries = store.entries()?;
    let mut output = format_history(&entries, format);
    if format == OutputFormat::Text && !entries.is_empty() {
        output.push('\n');
        output.push_str(&format_stats(&store.stats()?, format));
    }
    Ok(output)
}

fn cmd_reset(db_path: &Path, yes: bool, _format: OutputFormat) -> Result<String> {
    if !yes {
        return Err(CommandError::ExecutionFailed(
            "Use --yes to confirm reset. This will delete all history.".to_string(),
        )
        .into());
    }

    let mut store = open_store(db_path)?;
    store.reset()?;
    Ok("Session history reset.\n".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::warm::Phase;
    use clap::Parser;
    use tempfile::TempDir;
    use test_case::test_case;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("kvwarm").chain(args.iter().copied()))
    }

    #[tokio::test]
    async fn test_files_lists_eligible_only() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.rs"), "fn a() {}").unwrap();
        std::fs::write(temp.path().join("a.png"), "x").unwrap();
        let config = temp.path().join("config.json");
        std::fs::write(&config, "{}").unwrap();
        let root = temp.path().to_string_lossy().to_string();

        let out = execute(&cli(&["-c", config.to_str().unwrap(), "files", root.as_str()]))
            .await
            .unwrap();
        assert!(out.contains("a.rs"));
        assert!(!out.contains("a.png"));
    }

    #[tokio::test]
    async fn test_history_requires_database() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.json");
        std::fs::write(&config, "{}").unwrap();
        let db = temp.path().join("missing.db");

        let err = execute(&cli(&[
            "-c",
            config.to_str().unwrap(),
            "-d",
            db.to_str().unwrap(),
            "history",
        ]))
        .await
        .unwrap_err();
        assert!(err.to_string().contains("kvwarm init"));
    }

    #[tokio::test]
    async fn test_reset_requires_confirmation() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.json");
        std::fs::write(&config, "{}").unwrap();

        let result = execute(&cli(&["-c", config.to_str().unwrap(), "reset"])).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_files_defaults_to_current_dir() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.json");
        std::fs::write(&config, "{}").unwrap();

        let out = execute(&cli(&[
            "-c",
            config.to_str().unwrap(),
            "--format",
            "json",
            "files",
        ]))
        .await
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(value["root"], cwd.to_string_lossy().to_string());
        let files = value["files"].as_array().unwrap();
        assert!(files.iter().any(|f| f == "src/lib.rs"));
    }

    #[test_case("--max-files" ; "file count")]
    #[test_case("--max-file-bytes" ; "per-file bytes")]
    #[test_case("--max-total-bytes" ; "total bytes")]
    #[tokio::test]
    async fn test_context_rejects_zero_budget_override(flag: &str) {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.rs"), "fn a() {}").unwrap();
        let config = temp.path().join("config.json");
        std::fs::write(&config, "{}").unwrap();
        let root = temp.path().to_string_lossy().to_string();

        let err = execute(&cli(&[
            "-c",
            config.to_str().unwrap(),
            "context",
            root.as_str(),
            flag,
            "0",
        ]))
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test_case("--max-files" ; "file count")]
    #[test_case("--max-file-bytes" ; "per-file bytes")]
    #[test_case("--max-total-bytes" ; "total bytes")]
    #[tokio::test]
    async fn test_warm_rejects_zero_budget_override(flag: &str) {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.rs"), "fn a() {}").unwrap();
        let config = temp.path().join("config.json");
        std::fs::write(&config, "{}").unwrap();
        let db = temp.path().join("history.db");
        let root = temp.path().to_string_lossy().to_string();

        let err = execute(&cli(&[
            "-c",
            config.to_str().unwrap(),
            "-d",
            db.to_str().unwrap(),
            "warm",
            root.as_str(),
            "--endpoint",
            "http://127.0.0.1:9",
            flag,
            "0",
        ]))
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(!db.exists());
    }

    #[test]
    fn test_present_progress_is_not_echoed() {
        let event = WarmEvent::Progress {
            phase: Phase::Compiling,
            percent: 50,
        };
        assert!(!present_event(&event, true));
    }
}
