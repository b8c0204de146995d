//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use harvest_core::{
    DispatchPhase, Dispatcher, HarvestSummary, ItemStatus, ProgressReporter,
};
use harvest_shared::{
    AppConfig, END_YEAR, HarvestConfig, START_YEAR, WorkItem, YearSelection, init_config,
    init_config_at, load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// neurips-harvest: download NeurIPS papers and their metadata.
#[derive(Parser)]
#[command(
    name = "neurips-harvest",
    version,
    about = "Harvest paper metadata and PDFs from the NeurIPS proceedings.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.neurips-harvest/harvest.toml.
    #[arg(long, global = true, env = "NEURIPS_HARVEST_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Harvest the selected proceedings years.
    Run(RunArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `run`. Unset flags fall back to the config file.
#[derive(clap::Args, Debug)]
pub(crate) struct RunArgs {
    /// Up to 5 comma-separated years, e.g. 2020,2022.
    #[arg(long, required = true, value_delimiter = ',')]
    pub years: Vec<u16>,

    /// Output directory.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Number of concurrent workers.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Attempts per paper before giving up.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
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

/// Crates whose events are shown by default.
const LOG_TARGETS: &[&str] = &[
    "harvest_cli",
    "harvest_core",
    "harvest_crawler",
    "harvest_discovery",
    "harvest_artifacts",
    "harvest_storage",
    "harvest_shared",
];

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run(args) => cmd_run(config_path, &args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

/// Merge the config file with `run` flags into the runtime config.
fn resolve_config(app: &AppConfig, args: &RunArgs) -> Result<HarvestConfig> {
    let mut config = HarvestConfig::try_from(app)?;

    if let Some(out) = &args.out {
        config.output_dir = out.clone();
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts;
    }
    if let Some(secs) = args.timeout_secs {
        config.timeout = std::time::Duration::from_secs(secs);
    }

    config.validate()?;
    Ok(config)
}

async fn cmd_run(config_path: Option<&Path>, args: &RunArgs) -> Result<()> {
    let years = YearSelection::new(args.years.iter().copied())
        .map_err(|e| eyre!("{e} (valid years: {START_YEAR}-{END_YEAR})"))?;

    let app = load_app_config(config_path)?;
    let config = resolve_config(&app, args)?;
    let output_dir = config.output_dir.clone();

    info!(
        years = ?years.iter().collect::<Vec<_>>(),
        out = %output_dir.display(),
        concurrency = config.concurrency,
        "scraping years"
    );

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling run");
                cancel.cancel();
            }
        })
    };

    let dispatcher = Dispatcher::new(config, cancel.clone())?;
    let progress = Arc::new(CliProgress::new());
    let result = dispatcher.run(&years, progress).await;
    ctrl_c.abort();
    let summary = result?;

    println!();
    if cancel.is_cancelled() {
        println!("  Harvest interrupted.");
    } else {
        println!("  Harvest complete!");
    }
    println!("  Years:     {}", summary.years_scheduled);
    if summary.years_skipped > 0 {
        println!("  Failed:    {} year index(es)", summary.years_skipped);
    }
    println!("  Queued:    {}", summary.items_submitted);
    println!("  Saved:     {}", summary.persisted);
    println!("  Skipped:   {}", summary.skipped);
    println!("  Gave up:   {}", summary.abandoned);
    println!("  Output:    {}", output_dir.display());
    println!("  Time:      {:.1}s", summary.duration.as_secs_f64());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} [{pos}/{len}] {wide_bar:.cyan/blue}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, phase: DispatchPhase) {
        self.bar.set_message(phase.label());
    }

    fn item_queued(&self, _item: &WorkItem) {
        self.bar.inc_length(1);
    }

    fn item_finished(&self, item: &WorkItem, status: ItemStatus) {
        if status == ItemStatus::Abandoned {
            self.bar.println(format!("  gave up: {}", item.item_url));
        }
        self.bar.inc(1);
    }

    fn done(&self, _summary: &HarvestSummary) {
        self.bar.finish_and_clear();
    }
}

fn cmd_config_init(path: Option<&Path>) -> Result<()> {
    let path = match path {
        Some(path) => {
            init_config_at(path)?;
            path.to_path_buf()
        }
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = load_app_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn run_args(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Run(args) => args,
            Command::Config { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn years_are_comma_separated() {
        let args = run_args(&["neurips-harvest", "run", "--years", "2020,2022"]);
        assert_eq!(args.years, vec![2020, 2022]);
    }

    #[test]
    fn run_requires_years() {
        assert!(Cli::try_parse_from(["neurips-harvest", "run"]).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let args = run_args(&[
            "neurips-harvest",
            "run",
            "--years",
            "2019",
            "--out",
            "/tmp/papers",
            "--concurrency",
            "8",
            "--timeout-secs",
            "5",
        ]);
        let config = resolve_config(&AppConfig::default(), &args).unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/tmp/papers"));
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn zero_attempts_flag_is_rejected() {
        let args = run_args(&["neurips-harvest", "run", "--years", "2019", "--max-attempts", "0"]);
        assert!(resolve_config(&AppConfig::default(), &args).is_err());
    }
}
