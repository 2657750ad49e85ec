//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing::info;

use migrator_core::{
    MigrationFailure, MigrationProgress, MigrationReport, Migrator, select_content_blocks,
};
use migrator_remote::{CampaignFilter, CampaignSummary, SourceClient};
use migrator_shared::{
    AppConfig, Channel, DEFAULT_CONTENT_BLOCK_URL, DEFAULT_DRAFT_URL, DEFAULT_TARGET_ORIGIN,
    MigrationConfig, SourceCredentials, SourceReadConfig, TargetCredentials, config_file_path,
    init_config, load_config, load_config_from, parse_timezone,
};
use migrator_transform::{DollarVariableRewriter, PassthroughRewriter};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// campaign-migrator: move campaigns and content blocks to a new platform.
#[derive(Parser)]
#[command(
    name = "campaign-migrator",
    version,
    about = "Migrate campaigns and content blocks, re-hosting their assets on the target CDN.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.campaign-migrator/migrator.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Template rewriter applied to migrated text.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum RewriterKind {
    /// Leave template syntax untouched.
    None,
    /// Rewrite `{{${name}}}` variables to `{{ name }}`.
    Dollar,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Migrate a source document read from a local JSON file.
    Migrate {
        /// Channel: email, push, sms, or content-block.
        channel: Channel,

        /// Path to the source campaign or content-block JSON.
        file: PathBuf,

        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Source campaign operations.
    Campaigns {
        #[command(subcommand)]
        action: CampaignAction,
    },

    /// Source content-block operations.
    ContentBlocks {
        #[command(subcommand)]
        action: ContentBlockAction,
    },

    /// Check that the source session is valid.
    Verify {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Campaign subcommands.
#[derive(Subcommand)]
pub(crate) enum CampaignAction {
    /// List campaigns, newest edit first.
    List {
        #[command(flatten)]
        source: SourceArgs,

        /// Only campaigns of this type.
        #[arg(long = "type")]
        campaign_type: Option<String>,

        /// Only campaigns with this status.
        #[arg(long)]
        status: Option<String>,

        /// Only campaigns whose name contains this text (case-insensitive).
        #[arg(long)]
        name: Option<String>,

        /// Print summaries as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Fetch one campaign's full document.
    Export {
        /// Campaign id.
        id: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Fetch one campaign and migrate it.
    Migrate {
        /// Campaign id.
        id: String,

        /// Channel: email, push, or sms.
        #[arg(long)]
        channel: Channel,

        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        target: TargetArgs,
    },
}

/// Content-block subcommands.
#[derive(Subcommand)]
pub(crate) enum ContentBlockAction {
    /// List content blocks.
    List {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Migrate content blocks by id, one after another.
    Migrate {
        /// Block ids to migrate (repeatable). Omit with --all.
        #[arg(long = "id", required_unless_present = "all")]
        ids: Vec<String>,

        /// Migrate every content block.
        #[arg(long, conflicts_with = "ids")]
        all: bool,

        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        target: TargetArgs,
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

/// Per-run migration options. Override the config file.
#[derive(Args)]
pub(crate) struct RunArgs {
    /// Assemble and print the document without writing to the target.
    #[arg(long)]
    dry_run: bool,

    /// IANA timezone schedules are interpreted in.
    #[arg(long)]
    timezone: Option<String>,

    /// Offset label paired with the timezone, e.g. GMT+05:30.
    #[arg(long)]
    timezone_offset: Option<String>,

    /// Pause before each target write, in milliseconds.
    #[arg(long)]
    api_delay_ms: Option<u64>,

    /// Template rewriter applied to migrated text.
    #[arg(long, value_enum, default_value = "dollar")]
    rewriter: RewriterKind,

    /// Write the result JSON to this file instead of stdout.
    #[arg(short, long)]
    out: Option<PathBuf>,
}

/// Target platform credentials.
#[derive(Args)]
pub(crate) struct TargetArgs {
    #[arg(long, env = "MIGRATOR_BEARER_TOKEN", hide_env_values = true)]
    bearer_token: Option<String>,

    #[arg(long, env = "MIGRATOR_REFRESH_TOKEN", hide_env_values = true)]
    refresh_token: Option<String>,

    /// Target dashboard origin; the asset upload endpoint is derived from it.
    #[arg(long, env = "MIGRATOR_TARGET_ORIGIN", default_value = DEFAULT_TARGET_ORIGIN)]
    target_origin: String,

    /// Draft creation endpoint.
    #[arg(long, env = "MIGRATOR_DRAFT_URL", default_value = DEFAULT_DRAFT_URL)]
    draft_url: String,

    /// Content-block creation endpoint.
    #[arg(long, env = "MIGRATOR_CONTENT_BLOCK_URL", default_value = DEFAULT_CONTENT_BLOCK_URL)]
    content_block_url: String,

    #[arg(long, env = "MIGRATOR_APP_KEY")]
    app_key: Option<String>,

    #[arg(long, env = "MIGRATOR_APP_SECRET", hide_env_values = true)]
    app_secret: Option<String>,

    /// Author recorded on created content blocks.
    #[arg(long, env = "MIGRATOR_CREATED_BY")]
    created_by: Option<String>,
}

/// Source dashboard session.
#[derive(Args)]
pub(crate) struct SourceArgs {
    /// Any dashboard URL; only scheme and host are used.
    #[arg(long, env = "MIGRATOR_SOURCE_URL")]
    source_url: String,

    #[arg(long, env = "MIGRATOR_SOURCE_SESSION", hide_env_values = true)]
    session_id: String,

    #[arg(long, env = "MIGRATOR_APP_GROUP_ID")]
    app_group_id: String,
}

impl SourceArgs {
    fn credentials(&self) -> SourceCredentials {
        SourceCredentials {
            dashboard_url: self.source_url.clone(),
            session_id: self.session_id.clone(),
            app_group_id: self.app_group_id.clone(),
        }
    }
}

impl TargetArgs {
    /// Tokens are only required when the run writes to the target.
    fn credentials(&self, dry_run: bool) -> Result<TargetCredentials> {
        let (bearer, refresh) = match (&self.bearer_token, &self.refresh_token) {
            (Some(b), Some(r)) => (b.clone(), r.clone()),
            _ if dry_run => (String::new(), String::new()),
            _ => {
                return Err(eyre!(
                    "--bearer-token and --refresh-token (or MIGRATOR_BEARER_TOKEN / MIGRATOR_REFRESH_TOKEN) are required"
                ));
            }
        };

        Ok(TargetCredentials {
            bearer_token: bearer,
            refresh_token: refresh,
            origin: self.target_origin.clone(),
            api_url: self.draft_url.clone(),
            app_key: self.app_key.clone(),
            app_secret: self.app_secret.clone(),
            created_by_email: self.created_by.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "campaign_migrator=info,migrator=info",
        1 => "campaign_migrator=debug,migrator=debug",
        _ => "campaign_migrator=trace,migrator=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

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
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Migrate {
            channel,
            file,
            run,
            target,
        } => cmd_migrate_file(&config, channel, &file, &run, &target).await,
        Command::Campaigns { action } => match action {
            CampaignAction::List {
                source,
                campaign_type,
                status,
                name,
                json,
            } => {
                let filter = CampaignFilter {
                    campaign_type,
                    status,
                    name_contains: name,
                };
                cmd_campaigns_list(&config, &source, &filter, json).await
            }
            CampaignAction::Export { id, source, out } => {
                cmd_campaign_export(&config, &source, &id, out.as_deref()).await
            }
            CampaignAction::Migrate {
                id,
                channel,
                source,
                run,
                target,
            } => cmd_campaign_migrate(&config, &id, channel, &source, &run, &target).await,
        },
        Command::ContentBlocks { action } => match action {
            ContentBlockAction::List { source } => cmd_blocks_list(&config, &source).await,
            ContentBlockAction::Migrate {
                ids,
                all,
                source,
                run,
                target,
            } => cmd_blocks_migrate(&config, &ids, all, &source, &run, &target).await,
        },
        Command::Verify { source } => cmd_verify(&config, &source).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&config).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn migration_config(config: &AppConfig, run: &RunArgs) -> Result<MigrationConfig> {
    let mut resolved = MigrationConfig::try_from(config)?;
    if let Some(name) = &run.timezone {
        resolved.timezone = parse_timezone(name)?;
    }
    if let Some(offset) = &run.timezone_offset {
        resolved.timezone_offset = offset.clone();
    }
    if let Some(ms) = run.api_delay_ms {
        resolved.api_delay = Duration::from_millis(ms);
    }
    Ok(resolved)
}

fn build_migrator(config: &AppConfig, run: &RunArgs, target: &TargetArgs) -> Result<Migrator> {
    let migrator = Migrator::new(migration_config(config, run)?)?
        .with_content_block_url(target.content_block_url.clone())
        .dry_run(run.dry_run);

    Ok(match run.rewriter {
        RewriterKind::None => migrator.with_rewriter(PassthroughRewriter),
        RewriterKind::Dollar => migrator.with_rewriter(DollarVariableRewriter),
    })
}

fn source_client(config: &AppConfig, source: &SourceArgs) -> Result<SourceClient> {
    Ok(SourceClient::new(
        &source.credentials(),
        &SourceReadConfig::try_from(config)?,
    )?)
}

fn emit_json(value: &Value, out: Option<&Path>) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            std::fs::write(path, rendered)
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

/// Print the outcome; a failure prints its error document and exits non-zero.
fn finish(
    outcome: std::result::Result<MigrationReport, MigrationFailure>,
    out: Option<&Path>,
) -> Result<()> {
    match outcome {
        Ok(report) => {
            info!(
                migration_id = %report.migration_id,
                name = report.payload.name(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "migration finished"
            );
            emit_json(&report.to_json(), out)
        }
        Err(failure) => {
            emit_json(&failure.to_json(), out)?;
            Err(failure.into())
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_migrate_file(
    config: &AppConfig,
    channel: Channel,
    file: &Path,
    run: &RunArgs,
    target: &TargetArgs,
) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .wrap_err_with(|| format!("failed to read {}", file.display()))?;
    let document: Value = serde_json::from_str(&raw)
        .wrap_err_with(|| format!("{} is not valid JSON", file.display()))?;

    let credentials = target.credentials(run.dry_run)?;
    let migrator = build_migrator(config, run, target)?;

    info!(%channel, file = %file.display(), dry_run = run.dry_run, "migrating document");

    let reporter = CliProgress::new();
    let outcome = migrator
        .migrate_campaign(channel, &document, &credentials, &reporter)
        .await;
    reporter.clear();
    finish(outcome, run.out.as_deref())
}

async fn cmd_campaigns_list(
    config: &AppConfig,
    source: &SourceArgs,
    filter: &CampaignFilter,
    json: bool,
) -> Result<()> {
    let client = source_client(config, source)?;
    let campaigns = filter.apply(client.list_campaigns().await?);
    let summaries: Vec<CampaignSummary> =
        campaigns.iter().map(CampaignSummary::from_campaign).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    println!();
    for summary in &summaries {
        println!(
            "  {:<26} {:<10} {:<10} {}",
            summary.id, summary.campaign_type, summary.status, summary.name
        );
    }
    println!();
    println!("  {} campaign(s)", summaries.len());
    println!();
    Ok(())
}

async fn cmd_campaign_export(
    config: &AppConfig,
    source: &SourceArgs,
    id: &str,
    out: Option<&Path>,
) -> Result<()> {
    let client = source_client(config, source)?;
    let document = client.campaign_details(id).await?;
    let summary = CampaignSummary::from_campaign(&document);
    info!(
        id,
        name = %summary.name,
        variations = summary.variation_count,
        "campaign fetched"
    );
    emit_json(&document, out)
}

async fn cmd_campaign_migrate(
    config: &AppConfig,
    id: &str,
    channel: Channel,
    source: &SourceArgs,
    run: &RunArgs,
    target: &TargetArgs,
) -> Result<()> {
    if channel == Channel::ContentBlock {
        return Err(eyre!("use `content-blocks migrate` for content blocks"));
    }

    let credentials = target.credentials(run.dry_run)?;
    let migrator = build_migrator(config, run, target)?;
    let document = source_client(config, source)?.campaign_details(id).await?;

    let reporter = CliProgress::new();
    let outcome = migrator
        .migrate_campaign(channel, &document, &credentials, &reporter)
        .await;
    reporter.clear();
    finish(outcome, run.out.as_deref())
}

async fn cmd_blocks_list(config: &AppConfig, source: &SourceArgs) -> Result<()> {
    let client = source_client(config, source)?;
    let blocks = client.list_content_blocks().await?;

    println!();
    for block in &blocks {
        let field = |key: &str| block.get(key).and_then(Value::as_str).unwrap_or("-");
        println!("  {:<26} {}", field("id"), field("name"));
    }
    println!();
    println!("  {} content block(s)", blocks.len());
    println!();
    Ok(())
}

async fn cmd_blocks_migrate(
    config: &AppConfig,
    ids: &[String],
    all: bool,
    source: &SourceArgs,
    run: &RunArgs,
    target: &TargetArgs,
) -> Result<()> {
    let credentials = target.credentials(run.dry_run)?;
    let migrator = build_migrator(config, run, target)?;

    let fetched = source_client(config, source)?.fetch_content_blocks().await?;
    let blocks = if all {
        fetched
    } else {
        select_content_blocks(fetched, ids)?
    };

    info!(count = blocks.len(), dry_run = run.dry_run, "migrating content blocks");

    let reporter = CliProgress::new();
    let batch = migrator
        .migrate_content_blocks(&blocks, &credentials, &reporter)
        .await;
    reporter.clear();

    emit_json(&batch.to_json(), run.out.as_deref())?;
    if batch.failed() > 0 {
        return Err(eyre!(
            "{} of {} content block(s) failed",
            batch.failed(),
            batch.outcomes.len()
        ));
    }
    Ok(())
}

async fn cmd_verify(config: &AppConfig, source: &SourceArgs) -> Result<()> {
    let client = source_client(config, source)?;
    client.verify().await?;
    println!("Source session OK ({})", client.base_url());
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    if let Ok(path) = config_file_path() {
        println!("# {}", path.display());
    }
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn clear(&self) {
        self.spinner.finish_and_clear();
    }
}

impl MigrationProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn block_finished(&self, name: &str, success: bool, current: usize, total: usize) {
        let mark = if success { "ok" } else { "failed" };
        self.spinner
            .println(format!("  [{current}/{total}] {name}: {mark}"));
    }

    fn done(&self, _report: &MigrationReport) {
        self.spinner.finish_and_clear();
    }
}
