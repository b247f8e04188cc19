//! # diataxis-scan CLI
//!
//! Argument parsing and orchestration glue. All pipeline logic lives in
//! `diataxis-scan-core`; this module wires config, nav, provider and repo
//! resolver together and prints the report.
//!
//! Fatal problems (unreadable descriptor, malformed nav, missing credential)
//! are returned as errors before any file is processed. Per-file failures never
//! reach this layer: they are already recorded in the report.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

use diataxis_scan_core::classify::{classify_site, RunSettings};
use diataxis_scan_core::config::{load_site_config, SiteConfig};
use diataxis_scan_core::content::DEFAULT_MAX_CHARS;
use diataxis_scan_core::contract::ClassifyOptions;
use diataxis_scan_core::nav::{flatten_nav, NavEntry};
use diataxis_scan_core::provider::{build_classifier, ProviderKind, DEFAULT_OLLAMA_HOST};
use diataxis_scan_core::repo::{parse_repo_arg, GitCli, RepoRegistry, RepoResolver};
use diataxis_scan_core::report::ErrorPolicy;

/// CLI for diataxis-scan: classify MkDocs pages into Diátaxis quadrants.
#[derive(Parser)]
#[clap(
    name = "diataxis-scan",
    version,
    about = "Scan MkDocs docs and classify each page against the Diátaxis framework using an LLM"
)]
pub struct Cli {
    /// Emit logs as newline-delimited JSON on stderr
    #[clap(long, global = true)]
    pub log_json: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify every page referenced by the site's nav and print a JSON report
    Classify(ClassifyArgs),
    /// Print the flattened nav as a JSON array without contacting any provider
    Nav(NavArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    /// OpenAI chat completions (needs OPENAI_API_KEY)
    #[value(alias = "openai")]
    Hosted,
    /// Ollama server
    #[value(alias = "ollama")]
    Local,
}

impl From<Provider> for ProviderKind {
    fn from(p: Provider) -> Self {
        match p {
            Provider::Hosted => ProviderKind::Hosted,
            Provider::Local => ProviderKind::Local,
        }
    }
}

#[derive(Args)]
pub struct ClassifyArgs {
    /// Path to the MkDocs configuration file
    #[clap(long, short = 'c')]
    pub config: PathBuf,

    /// API provider to use
    #[clap(long, short = 'p', value_enum, default_value_t = Provider::Hosted)]
    pub provider: Provider,

    /// Model to use (defaults to the provider's default)
    #[clap(long, short = 'M')]
    pub model: Option<String>,

    /// Host of the Ollama server (local provider only)
    #[clap(long, default_value = DEFAULT_OLLAMA_HOST)]
    pub ollama_host: String,

    /// Max number of characters to include from each file's content
    #[clap(long, short = 'l', default_value_t = DEFAULT_MAX_CHARS)]
    pub max_chars: usize,

    /// Pause between provider requests, in milliseconds
    #[clap(long, default_value_t = 1000)]
    pub delay_ms: u64,

    /// Sampling temperature forwarded to the provider
    #[clap(long)]
    pub temperature: Option<f32>,

    /// Keep failed files in the report as {"error": "..."} entries
    #[clap(long)]
    pub include_errors: bool,

    /// Where external repositories are cloned (default: `tmp` next to the executable)
    #[clap(long)]
    pub clone_dir: Option<PathBuf>,

    /// Extra repository for prefixed nav entries; overrides the multirepo plugin
    #[clap(long = "repo", value_name = "NAME=URL")]
    pub repos: Vec<String>,
}

#[derive(Args)]
pub struct NavArgs {
    /// Path to the MkDocs configuration file
    #[clap(long, short = 'c')]
    pub config: PathBuf,

    /// Extra repository for prefixed nav entries
    #[clap(long = "repo", value_name = "NAME=URL")]
    pub repos: Vec<String>,
}

/// Entrypoint shared by `main` and integration tests. Writes the result to stdout.
pub async fn run(cli: Cli) -> Result<()> {
    let output = match cli.command {
        Commands::Classify(args) => {
            tracing::info!(command = "classify", "Starting run");
            classify(args).await?
        }
        Commands::Nav(args) => {
            tracing::info!(command = "nav", "Starting run");
            let (_, entries) = load_nav(&args.config, &args.repos)?;
            let refs: Vec<&str> = entries.iter().map(|e| e.file_ref.raw.as_str()).collect();
            serde_json::to_string_pretty(&refs)?
        }
    };
    println!("{output}");
    Ok(())
}

async fn classify(args: ClassifyArgs) -> Result<String> {
    let (site, entries) = load_nav(&args.config, &args.repos)?;

    let classifier = build_classifier(args.provider.into(), &args.ollama_host)
        .context("Provider setup failed")?;

    if entries.is_empty() {
        tracing::warn!("No files found in the navigation section");
    }

    let clone_dir = match args.clone_dir {
        Some(dir) => dir,
        None => default_clone_dir(),
    };
    tracing::info!(clone_dir = %clone_dir.display(), "Using clone directory");
    let mut resolver = RepoResolver::new(clone_dir, site.repos.clone(), GitCli);

    let settings = RunSettings {
        model: args.model,
        options: ClassifyOptions {
            temperature: args.temperature,
        },
        max_chars: args.max_chars,
        delay: Duration::from_millis(args.delay_ms),
        error_policy: if args.include_errors {
            ErrorPolicy::Mark
        } else {
            ErrorPolicy::Omit
        },
    };

    let report = classify_site(&site, &entries, &mut resolver, classifier.as_ref(), &settings).await;
    Ok(report.to_json_pretty()?)
}

/// Load the descriptor, merge CLI repositories into its registry and flatten the nav.
fn load_nav(config: &Path, repo_args: &[String]) -> Result<(SiteConfig, Vec<NavEntry>)> {
    let mut site = load_site_config(config).context("Could not load site config")?;

    let mut cli_repos = RepoRegistry::default();
    for arg in repo_args {
        let (name, url) = parse_repo_arg(arg)?;
        cli_repos.insert(name, url);
    }
    site.repos.merge(cli_repos);

    let entries = flatten_nav(&site.nav, &site.repos).context("Invalid navigation")?;
    tracing::info!(files = entries.len(), "Found files in the navigation");
    Ok((site, entries))
}

fn default_clone_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("tmp")))
        .unwrap_or_else(|| PathBuf::from("tmp"))
}
