use std::io::IsTerminal;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};
use tracing::Level;

use titvo_bitbucket::ReportResult;
use titvo_core::{AmbiguityPolicy, CommitRef, Credentials, OutputFormat, RunTarget, TitvoConfig};

mod fetch;
mod logging;

#[derive(Parser)]
#[command(
    name = "titvo",
    version,
    about = "Mirror the files changed by a Bitbucket commit",
    long_about = "Titvo downloads every file touched by a Bitbucket commit into a local\n\
                   directory and publishes a Code Insights report on the commit.\n\n\
                   Examples:\n  \
                     titvo fetch                      Run inside a Bitbucket pipeline\n  \
                     titvo fetch --no-report          Mirror files only\n  \
                     git show | titvo files           List changed files of a diff\n  \
                     titvo init                       Create a .titvo.toml config file"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .titvo.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text  Human-readable summaries (default)\n  \
                         json  Machine-readable JSON with camelCase keys"
    )]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Mirror a commit's changed files and publish a report
    #[command(long_about = "Mirror a commit's changed files and publish a report.\n\n\
        Obtains an OAuth token with the client-credentials grant, confirms the commit,\n\
        reads its diff, downloads every changed file into the output directory and\n\
        publishes a Code Insights report with the run's measurements.\n\n\
        Every target and credential flag falls back to the variable Bitbucket\n\
        Pipelines already exports; a .env file in the working directory is read\n\
        first.\n\n\
        Examples:\n  titvo fetch\n  titvo fetch --commit 1a2b3c --output-dir snapshot\n  titvo fetch --report-result passed --report-data findings.json")]
    Fetch(FetchArgs),
    /// List the files changed by a unified diff
    #[command(long_about = "List the files changed by a unified diff.\n\n\
        Reads a diff from stdin or a file and prints the post-change path of every\n\
        file section, sorted and de-duplicated. Nothing is downloaded.\n\n\
        Examples:\n  git show HEAD | titvo files\n  titvo files --file commit.diff --format json")]
    Files {
        /// Read diff from file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,

        /// Handling of headers whose path cannot be recovered (skip or fail)
        #[arg(long)]
        on_ambiguous: Option<AmbiguityPolicy>,
    },
    /// Create a default .titvo.toml configuration file
    #[command(long_about = "Create a default .titvo.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .titvo.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args)]
struct FetchArgs {
    /// Workspace slug
    #[arg(long, env = "BITBUCKET_WORKSPACE")]
    workspace: String,

    /// Repository slug
    #[arg(long = "repo", env = "BITBUCKET_REPO_SLUG")]
    repo_slug: String,

    /// Commit hash
    #[arg(long, env = "BITBUCKET_COMMIT")]
    commit: String,

    /// OAuth consumer key
    #[arg(long, env = "OAUTH_CLIENT_ID")]
    client_id: String,

    /// OAuth consumer secret
    #[arg(long, env = "OAUTH_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// Directory receiving the files (default: repo_files)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Maximum downloads in flight (default: 4)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Handling of headers whose path cannot be recovered (skip or fail)
    #[arg(long)]
    on_ambiguous: Option<AmbiguityPolicy>,

    /// Do not publish a Code Insights report
    #[arg(long)]
    no_report: bool,

    /// Report verdict: passed, failed or pending
    #[arg(long, default_value = "pending")]
    report_result: ReportResult,

    /// JSON file with extra report entries
    #[arg(
        long,
        long_help = "JSON file with extra report entries.\n\n\
            The file holds an array of {\"title\", \"type\", \"value\"} objects, where type\n\
            is one of BOOLEAN, DATE, DURATION, LINK, NUMBER, PERCENTAGE, TEXT.\n\
            Entries are appended after the measured ones."
    )]
    report_data: Option<PathBuf>,

    /// Exit with non-zero code unless every changed file was downloaded
    #[arg(long)]
    require_all: bool,
}

impl FetchArgs {
    fn apply(&self, config: &mut TitvoConfig) {
        if let Some(dir) = &self.output_dir {
            config.mirror.output_dir = dir.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.mirror.concurrency = concurrency;
        }
        if let Some(policy) = self.on_ambiguous {
            config.diff.on_ambiguous = policy;
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<TitvoConfig> {
    let config = match path {
        Some(path) => TitvoConfig::from_file(path)
            .wrap_err_with(|| format!("loading {}", path.display()))?,
        None => {
            let default_path = Path::new(".titvo.toml");
            if default_path.exists() {
                TitvoConfig::from_file(default_path).wrap_err("loading .titvo.toml")?
            } else {
                TitvoConfig::default()
            }
        }
    };
    Ok(config)
}

fn read_diff_input(file: &Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .into_diagnostic()
                .wrap_err("reading stdin")?;
            Ok(input)
        }
    }
}

const DEFAULT_CONFIG: &str = r#"# Titvo Configuration
# Target and credentials come from BITBUCKET_WORKSPACE, BITBUCKET_REPO_SLUG,
# BITBUCKET_COMMIT, OAUTH_CLIENT_ID and OAUTH_CLIENT_SECRET.

[bitbucket]
# api_url = "https://api.bitbucket.org/2.0"
# oauth_url = "https://bitbucket.org/site/oauth2"
# timeout_secs = 30

[mirror]
# output_dir = "repo_files"
# concurrency = 4

[diff]
# on_ambiguous = "skip"   # or "fail"

[report]
# title = "Titvo Security Scan"
# details = "Security scan report"
# reporter = "titvo-security-scan"
# report_type = "SECURITY"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    // Variables already set in the environment win over `.env`.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    logging::init_tracing(cli.log_json, level);

    let mut config = load_config(cli.config.as_deref())?;
    tracing::debug!(format = %cli.format, ?config, "configuration loaded");

    match cli.command {
        Command::Fetch(args) => {
            args.apply(&mut config);
            config.validate()?;

            let commit = CommitRef::new(args.commit.as_str())?;
            let target = RunTarget::new(args.workspace.as_str(), args.repo_slug.as_str(), commit)?;
            let credentials = Credentials::new(args.client_id.as_str(), args.client_secret.as_str())?;
            let report_data = match &args.report_data {
                Some(path) => fetch::load_report_data(path)
                    .wrap_err_with(|| format!("reading {}", path.display()))?,
                None => Vec::new(),
            };

            let options = fetch::FetchOptions {
                publish_report: !args.no_report,
                report_result: args.report_result,
                report_data,
                progress: cli.format == OutputFormat::Text && std::io::stderr().is_terminal(),
            };
            tracing::info!(%target, "starting fetch");
            let mut outcome = fetch::run(&config, &target, &credentials, options).await?;

            match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&outcome).into_diagnostic()?
                    );
                }
                OutputFormat::Text => print!("{}", fetch::render_text(&outcome)),
            }

            if !outcome.errors.is_empty() {
                let first = outcome.errors.remove(0);
                for other in &outcome.errors {
                    tracing::error!(error = %other, "additional failure");
                }
                return Err(first.into());
            }
            let summary = outcome.download.summary;
            if args.require_all && !summary.is_complete() {
                miette::bail!(miette::miette!(
                    help = "drop --require-all to accept partial downloads",
                    "{} of {} changed files could not be downloaded",
                    summary.failed(),
                    summary.total
                ));
            }
        }
        Command::Files { file, on_ambiguous } => {
            let policy = on_ambiguous.unwrap_or(config.diff.on_ambiguous);
            let input = read_diff_input(&file)?;
            let extraction = titvo_difflens::extract(&input, policy)?;

            match cli.format {
                OutputFormat::Json => {
                    let value = serde_json::json!({
                        "files": extraction.files.paths(),
                        "headers": extraction.headers,
                        "skipped": extraction.ambiguous,
                    });
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&value).into_diagnostic()?
                    );
                }
                OutputFormat::Text => {
                    for path in extraction.files.paths() {
                        println!("{path}");
                    }
                }
            }
        }
        Command::Init => {
            let path = Path::new(".titvo.toml");
            if path.exists() {
                miette::bail!(".titvo.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .titvo.toml with default configuration");
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "titvo", &mut std::io::stdout());
        }
    }

    Ok(())
}
