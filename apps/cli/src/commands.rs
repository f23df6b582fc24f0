//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use roamweb_core::pipeline::{BuildConfig, BuildResult, ProgressReporter, build_site};
use roamweb_core::watch::watch_and_rebuild;
use roamweb_shared::{AppConfig, CONFIG_FILE_NAME, expand_path, init_config, load_config_from};
use tracing::{info, warn};

use crate::serve;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// roamweb — publish an org-roam knowledge base as a static website.
#[derive(Parser)]
#[command(
    name = "roamweb",
    version,
    about = "Publish org-roam notes as a static website with backlinks, tags and graphs.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Path to the config file.
    #[arg(long, global = true, env = "ROAMWEB_CONFIG", default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Path overrides shared by `build` and `serve`.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct PathArgs {
    /// Directory containing the org-roam notes.
    #[arg(long)]
    pub roam_dir: Option<PathBuf>,

    /// Path to the org-roam database.
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Output directory for the generated site.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the static site once.
    Build {
        #[command(flatten)]
        paths: PathArgs,
    },

    /// Build, serve the site locally, and rebuild when notes change.
    Serve {
        #[command(flatten)]
        paths: PathArgs,

        /// Port to listen on.
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Serve without watching for changes.
        #[arg(long)]
        no_watch: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "roamweb=info",
        1 => "roamweb=debug",
        _ => "roamweb=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build { paths } => cmd_build(&cli.config, &paths).await,
        Command::Serve {
            paths,
            port,
            no_watch,
        } => cmd_serve(&cli.config, &paths, port, !no_watch).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(&cli.config),
            ConfigAction::Show => cmd_config_show(&cli.config, &PathArgs::default()),
        },
    }
}

/// Load the config file, apply command-line overrides, and resolve paths.
fn load_app_config(config_path: &Path, paths: &PathArgs) -> Result<AppConfig> {
    let mut config = load_config_from(config_path)?;

    if let Some(dir) = &paths.roam_dir {
        config.paths.roam_dir = expand_path(dir);
    }
    if let Some(db) = &paths.db_path {
        config.paths.db_path = expand_path(db);
    }
    if let Some(out) = &paths.output {
        config.paths.output_dir = expand_path(out);
    }

    let cwd = std::env::current_dir().wrap_err("cannot determine working directory")?;
    config.resolve_paths(&cwd);
    Ok(config)
}

fn build_config(config_path: &Path, paths: &PathArgs) -> Result<BuildConfig> {
    let config = load_app_config(config_path, paths)?;
    Ok(BuildConfig::from_app_config(&config, env!("CARGO_PKG_VERSION")))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(config_path: &Path, paths: &PathArgs) -> Result<()> {
    let config = build_config(config_path, paths)?;

    info!(
        roam_dir = %config.roam_dir.display(),
        db = %config.db_path.display(),
        output = %config.output_dir.display(),
        "building site"
    );

    let reporter = CliProgress::new();
    let result = build_site(&config, &reporter).await?;
    print_summary(&result);
    Ok(())
}

async fn cmd_serve(config_path: &Path, paths: &PathArgs, port: u16, watch: bool) -> Result<()> {
    let config = build_config(config_path, paths)?;

    let reporter = CliProgress::new();
    let result = build_site(&config, &reporter).await?;
    print_summary(&result);

    let server = Arc::new(serve::bind(port)?);
    let server_task = {
        let server = Arc::clone(&server);
        let root = config.output_dir.clone();
        tokio::task::spawn_blocking(move || serve::serve_dir(&server, &root))
    };
    println!("  Serving at http://127.0.0.1:{port}/  (Ctrl-C to stop)");
    println!();

    // Never completes: if watching stops, the site is still served.
    let watcher = async {
        if watch {
            match watch_and_rebuild(config, Arc::new(LogProgress)).await {
                Ok(()) => warn!("watcher stopped, serving without rebuilds"),
                Err(e) => warn!(error = %e, "cannot watch notes, serving without rebuilds"),
            }
        }
        std::future::pending::<()>().await
    };

    let outcome = tokio::select! {
        served = server_task => served.map_err(|e| eyre!("server thread failed: {e}")),
        () = watcher => Ok(()),
        signal = tokio::signal::ctrl_c() => {
            info!("shutting down");
            signal.wrap_err("failed to listen for Ctrl-C")
        }
    };

    // The blocking server thread must return before the runtime can drop.
    server.unblock();
    outcome
}

fn cmd_config_init(config_path: &Path) -> Result<()> {
    init_config(config_path)?;
    println!("Config initialized at: {}", config_path.display());
    Ok(())
}

fn cmd_config_show(config_path: &Path, paths: &PathArgs) -> Result<()> {
    let config = load_app_config(config_path, paths)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_summary(result: &BuildResult) {
    println!();
    println!("  Site built successfully!");
    println!("  Notes:     {}", result.note_count);
    println!("  Pages:     {}", result.notes_written);
    if result.notes_skipped > 0 {
        println!("  Skipped:   {} (see log)", result.notes_skipped);
    }
    println!("  Tag pages: {}", result.tag_pages);
    println!("  Path:      {}", result.output_dir.display());
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// Progress reporters
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn note_rendered(&self, id: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Rendering [{current}/{total}] {id}"));
    }

    fn done(&self, _result: &BuildResult) {
        self.spinner.finish_and_clear();
    }
}

/// Reports watch-mode rebuilds through the log instead of a spinner.
struct LogProgress;

impl ProgressReporter for LogProgress {
    fn phase(&self, name: &str) {
        tracing::debug!(phase = name, "rebuild phase");
    }

    fn note_rendered(&self, _id: &str, _current: usize, _total: usize) {}

    fn done(&self, result: &BuildResult) {
        info!(
            notes = result.note_count,
            skipped = result.notes_skipped,
            "site rebuilt"
        );
    }
}
