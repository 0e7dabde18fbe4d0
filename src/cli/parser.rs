//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::core::FileBudget;

/// kvwarm: prime an inference server's KV cache with a codebase.
///
/// Walks a folder, budgets the files it finds, and sends them to the
/// server as one isolated chat request so later questions hit a warm cache.
#[derive(Parser, Debug)]
#[command(name = "kvwarm")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the session database.
    ///
    /// Defaults to `.kvwarm/history.db` in the current directory.
    #[arg(short, long, env = "KVWARM_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Path to the config file.
    ///
    /// Defaults to `$KVWARM_CONFIG`, then `~/.config/kvwarm/config.json`.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding `system.md` and `warmup.md` prompt templates.
    #[arg(long, global = true)]
    pub prompt_dir: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the default config file and prompt templates, and create the
    /// session database.
    ///
    /// Existing files are left untouched.
    Init {
        /// Delete the existing session database first.
        #[arg(short, long)]
        force: bool,
    },

    /// List the files that would be loaded from a folder.
    Files {
        /// Folder to walk. Defaults to the current directory.
        path: Option<PathBuf>,

        /// File filtering options.
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Build the context items for a folder without contacting the server.
    Context {
        /// Folder to walk. Defaults to the current directory.
        path: Option<PathBuf>,

        /// File filtering options.
        #[command(flatten)]
        filter: FilterArgs,

        /// Budget overrides.
        #[command(flatten)]
        budget: BudgetArgs,

        /// Print the full rendered request instead of an item summary.
        #[arg(long)]
        render: bool,
    },

    /// Load a folder into the server's KV cache.
    Warm {
        /// Folder to load. Defaults to the current directory.
        path: Option<PathBuf>,

        /// Endpoint overrides.
        #[command(flatten)]
        endpoint: EndpointArgs,

        /// File filtering options.
        #[command(flatten)]
        filter: FilterArgs,

        /// Budget overrides.
        #[command(flatten)]
        budget: BudgetArgs,

        /// Prompt sent with the files, replacing the warm-up template.
        #[arg(short, long)]
        prompt: Option<String>,

        /// Extra rule appended to the system message (repeatable).
        #[arg(long = "rule")]
        rules: Vec<String>,

        /// Keep history in memory only.
        #[arg(long)]
        no_history: bool,

        /// Do not echo the streamed response.
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show stored session history.
    History {
        /// Show the prompt/completion log instead of history entries.
        #[arg(long)]
        log: bool,
    },

    /// Delete all stored history.
    Reset {
        /// Skip confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

/// Extra exclusions on top of the built-in denylists.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Directory name to skip (repeatable).
    #[arg(long = "exclude-dir")]
    pub exclude_dirs: Vec<String>,

    /// File extension to skip (repeatable).
    #[arg(long = "exclude-ext")]
    pub exclude_extensions: Vec<String>,
}

/// Overrides for the file budget.
#[derive(Args, Debug, Clone, Default)]
pub struct BudgetArgs {
    /// Maximum number of files to load.
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Files larger than this many bytes are truncated.
    #[arg(long)]
    pub max_file_bytes: Option<u64>,

    /// Cap on the total bytes of fully loaded files.
    #[arg(long)]
    pub max_total_bytes: Option<u64>,
}

impl BudgetArgs {
    /// Applies the overrides to `budget`.
    #[must_use]
    pub fn apply(&self, mut budget: FileBudget) -> FileBudget {
        if let Some(n) = self.max_files {
            budget.max_files = n;
        }
        if let Some(n) = self.max_file_bytes {
            budget.max_file_bytes = n;
        }
        if let Some(n) = self.max_total_bytes {
            budget.max_total_bytes = n;
        }
        budget
    }
}

/// Overrides for the inference endpoint.
#[derive(Args, Debug, Clone, Default)]
pub struct EndpointArgs {
    /// Base URL of the inference server.
    #[arg(short, long, env = "KVWARM_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Model title sent with the request.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Bearer token for the server.
    #[arg(long, env = "KVWARM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Transport timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Telemetry collector URL.
    #[arg(long, env = "KVWARM_TELEMETRY_URL")]
    pub telemetry_url: Option<String>,
}

impl EndpointArgs {
    /// Applies the overrides to `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint.clone_from(endpoint);
        }
        if let Some(model) = &self.model {
            config.model_title.clone_from(model);
        }
        if self.api_key.is_some() {
            config.api_key.clone_from(&self.api_key);
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if self.telemetry_url.is_some() {
            config.telemetry_url.clone_from(&self.telemetry_url);
        }
    }
}

impl Cli {
    /// Returns the database path: the flag, then the config file, then the
    /// default.
    #[must_use]
    pub fn get_db_path(&self, config: &Config) -> PathBuf {
        self.db_path
            .clone()
            .or_else(|| config.db_path.clone())
            .unwrap_or_else(|| PathBuf::from(crate::storage::DEFAULT_DB_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_db_path() {
        let cli = Cli::parse_from(["kvwarm", "history"]);
        assert_eq!(
            cli.get_db_path(&Config::default()),
            PathBuf::from(".kvwarm/history.db")
        );
    }

    #[test]
    fn test_db_path_from_config() {
        let cli = Cli::parse_from(["kvwarm", "history"]);
        let config = Config {
            db_path: Some(PathBuf::from("/tmp/h.db")),
            ..Config::default()
        };
        assert_eq!(cli.get_db_path(&config), PathBuf::from("/tmp/h.db"));
    }

    #[test]
    fn test_warm_args() {
        let cli = Cli::parse_from([
            "kvwarm",
            "warm",
            "src",
            "--max-files",
            "3",
            "--rule",
            "be brief",
            "--exclude-dir",
            "fixtures",
        ]);
        let Commands::Warm {
            path,
            budget,
            rules,
            filter,
            ..
        } = cli.command
        else {
            panic!("expected warm");
        };
        assert_eq!(path, Some(PathBuf::from("src")));
        assert_eq!(budget.apply(FileBudget::default()).max_files, 3);
        assert_eq!(rules, vec!["be brief"]);
        assert_eq!(filter.exclude_dirs, vec!["fixtures"]);
    }

    #[test]
    fn test_endpoint_overrides() {
        let args = EndpointArgs {
            endpoint: Some("http://x:1".to_string()),
            timeout: Some(5),
            ..EndpointArgs::default()
        };
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.endpoint, "http://x:1");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.model_title, crate::config::DEFAULT_MODEL_TITLE);
    }
}
