//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use uuid::Uuid;

use assetpilot_engine::{
    EnrichmentKind, NullSink, ProgressSink, RunOptions, SessionContext, SessionRegistry,
    preflight, run_step,
};
use assetpilot_llm::{ChatClient, ProviderPolicy};
use assetpilot_shared::{
    AppConfig, ProcessRequest, ProgressEvent, RunStatus, expand_home, init_config,
    load_api_keys, load_config,
};
use assetpilot_sheets::LocalSheet;
use assetpilot_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// AssetPilot — fill asset-sheet columns with AI-sourced data.
#[derive(Parser)]
#[command(
    name = "assetpilot",
    version,
    about = "Enrich industrial-equipment sheets with descriptions, comparables, and valuations.",
    long_about = None,
)]
pub(crate) struct Cli {
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

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one enrichment step against a local sheet file.
    Run {
        /// Path to the sheet grid (JSON).
        sheet: PathBuf,

        /// Step to run: display name or slug (see `assetpilot steps`).
        #[arg(short, long)]
        step: String,

        /// Session identifier for progress correlation (generated if absent).
        #[arg(long)]
        session: Option<String>,

        /// Custom prompt template with {asset}/{tech_specs}/{ai_data}/{comparable}
        /// placeholders.
        #[arg(long)]
        prompt: Option<String>,

        /// Jobs dispatched concurrently per wave.
        #[arg(long)]
        wave_size: Option<usize>,

        /// Print the structured response as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// List the available enrichment steps.
    Steps,

    /// Show run history.
    History {
        /// Maximum records to show.
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Filter by sheet name.
        #[arg(long)]
        sheet: Option<String>,

        /// Delete all history records.
        #[arg(long)]
        clear: bool,
    },

    /// Show recorded process runs (the shared monitor view).
    Monitor,

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
        0 => "assetpilot=info",
        1 => "assetpilot=debug",
        _ => "assetpilot=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            sheet,
            step,
            session,
            prompt,
            wave_size,
            json,
        } => cmd_run(&sheet, &step, session, prompt, wave_size, json).await,
        Command::Steps => cmd_steps(),
        Command::History {
            limit,
            sheet,
            clear,
        } => cmd_history(limit, sheet.as_deref(), clear).await,
        Command::Monitor => cmd_monitor().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn cmd_run(
    sheet_path: &PathBuf,
    step: &str,
    session: Option<String>,
    prompt: Option<String>,
    wave_size: Option<usize>,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    let keys = load_api_keys(&config);

    let kind = EnrichmentKind::from_name(step).ok_or_else(|| {
        let known: Vec<&str> = EnrichmentKind::ALL.iter().map(|k| k.spec().slug).collect();
        eyre!("unknown step '{step}'. Known steps: {}", known.join(", "))
    })?;

    // Provider selection is a pre-flight check: search-dependent steps
    // fail here rather than twenty rows into a run.
    let auth = preflight(kind, &keys)?;
    let timeout = Duration::from_secs(config.providers.request_timeout_secs);
    let client = ChatClient::new(&auth, timeout)?;

    let sheet = LocalSheet::open(sheet_path)?;
    let db_path = expand_home(&config.defaults.database_path);
    let storage = Storage::open(&db_path).await?;

    let session_id = session.unwrap_or_else(|| Uuid::now_v7().to_string());
    let registry = SessionRegistry::new();
    let sink: Arc<dyn ProgressSink> = if json {
        Arc::new(NullSink)
    } else {
        Arc::new(CliProgress::new())
    };
    let ctx = SessionContext::new(&session_id, &registry, sink);

    // Ctrl-C flips the session's cancellation flag; the scheduler stops
    // dispatching waves and already-written rows stay written.
    {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctx.cancel();
            }
        });
    }

    let request = ProcessRequest {
        sheet_id: sheet_path.display().to_string(),
        step: step.to_string(),
        sheet_name: None,
        session_id: Some(session_id.clone()),
        custom_prompt: prompt,
    };

    let options = RunOptions {
        wave_size: wave_size.unwrap_or(config.defaults.wave_size),
    };

    info!(
        step = kind.spec().name,
        provider = %auth.provider,
        model = auth.provider.model(),
        wave_size = options.wave_size,
        "starting run"
    );

    let response = run_step(&sheet, Arc::new(client), &ctx, Some(&storage), &request, &options)
        .await?;
    registry.remove(&session_id);

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let status = match response.status {
        RunStatus::Ok => "completed",
        RunStatus::Cancelled => "cancelled",
        RunStatus::Error => "halted on critical error",
    };

    println!();
    println!("  Step:    {}", response.step);
    println!("  Status:  {status}");
    println!("  Rows:    {}", response.stats.total);
    println!("  Filled:  {}", response.stats.success);
    println!("  Errors:  {}", response.stats.errors);
    println!("  Skipped: {}", response.stats.skipped);
    println!();

    if !response.errors.is_empty() {
        println!("  Errors:");
        for error in &response.errors {
            println!("    - {error}");
        }
        println!();
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress sink
// ---------------------------------------------------------------------------

/// Progress sink rendering an indicatif spinner with running totals.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressSink for CliProgress {
    fn emit(&self, _session_id: &str, event: &ProgressEvent) -> assetpilot_shared::Result<()> {
        let stats = event.stats();
        match event {
            ProgressEvent::Progress { step, .. } => {
                self.spinner.set_message(format!(
                    "{step}: {}/{} rows (ok {}, err {}, skip {})",
                    stats.processed,
                    stats.total.saturating_sub(stats.skipped),
                    stats.success,
                    stats.errors,
                    stats.skipped
                ));
            }
            ProgressEvent::Complete { .. } => self.spinner.finish_and_clear(),
            ProgressEvent::Cancelled { .. } => {
                self.spinner.finish_with_message("cancelled");
            }
            ProgressEvent::Error { message, .. } => {
                self.spinner.finish_with_message(message.clone());
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// steps / history / monitor / config
// ---------------------------------------------------------------------------

fn cmd_steps() -> Result<()> {
    println!();
    for kind in EnrichmentKind::ALL {
        let spec = kind.spec();
        let provider = match spec.policy {
            ProviderPolicy::RequireSearch => "web search required",
            ProviderPolicy::PreferSearch => "web search preferred",
        };
        println!("  {:<14} {}", spec.slug, spec.name);
        println!("  {:<14} fills '{}' ({provider})", "", spec.target_column);
        println!();
    }
    Ok(())
}

async fn cmd_history(limit: usize, sheet: Option<&str>, clear: bool) -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open(&expand_home(&config.defaults.database_path)).await?;

    if clear {
        storage.clear_history().await?;
        println!("History cleared.");
        return Ok(());
    }

    let entries = storage.list_history(limit, sheet).await?;
    if entries.is_empty() {
        println!("No history records.");
        return Ok(());
    }

    for entry in entries {
        println!(
            "{}  {:<32} {:<28} {}  ({})",
            entry.timestamp,
            entry.sheet_name,
            entry.step.as_deref().unwrap_or("-"),
            entry.message,
            entry.time
        );
    }
    Ok(())
}

async fn cmd_monitor() -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open(&expand_home(&config.defaults.database_path)).await?;

    let processes = storage.list_processes().await?;
    if processes.is_empty() {
        println!("No recorded runs.");
        return Ok(());
    }

    for p in processes {
        let state = if p.is_active {
            "active"
        } else if p.is_completed {
            "completed"
        } else {
            "stopped"
        };
        println!(
            "{}  {:<28} {:<24} {state:<10} {:>5.1}%  ok {} err {} skip {}",
            p.process_id,
            p.step_name,
            p.sheet_name,
            p.progress * 100.0,
            p.stats.success,
            p.stats.errors,
            p.stats.skipped
        );
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
