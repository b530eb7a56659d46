//! Command-line front end: drives the loaders against a live backend and prints what they produced.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use std::time::Instant;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use comfy_table::presets::ASCII_FULL_CONDENSED;
use comfy_table::CellAlignment;
use comfy_table::Table;
use console::style;
use fieldx::fxstruct;
use garde::Validate;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;
use strum::IntoEnumIterator;
use tracing::info;
use tracing::warn;

use crate::cache::CacheStatus;
use crate::client::HttpStatSource;
use crate::config::DashboardConfig;
use crate::loading::LoadingStatus;
use crate::model::DashboardStats;
use crate::model::StageUpdate;
use crate::service::DashboardService;
use crate::types::LoadState;
use crate::types::StatKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    /// Three stages, each reported as it completes.
    Progressive,
    /// Essentials first, the rest in the background.
    Optimized,
    /// Everything at once.
    All,
}

#[derive(Debug, Clone, clap::Parser, Validate)]
#[fxstruct(no_new, get(copy))]
#[clap(about, version, name = "dash-loader")]
pub struct Cli {
    /// Root URL of the REST backend.
    #[clap(long, env = "DASHBOARD_BASE_URL")]
    #[fieldx(get(clone))]
    #[garde(url)]
    base_url: Option<String>,

    /// Bearer token for the admin endpoints.
    #[clap(long, env = "DASHBOARD_TOKEN", hide_env_values = true)]
    #[fieldx(get(clone))]
    #[garde(skip)]
    token: Option<String>,

    /// TOML configuration file. Command line options take precedence over it.
    #[clap(long, short, env = "DASHBOARD_CONFIG")]
    #[fieldx(get(clone))]
    #[garde(skip)]
    config: Option<PathBuf>,

    /// Loading strategy.
    #[clap(long, short, value_enum, default_value_t = Mode::Progressive)]
    #[garde(skip)]
    mode: Mode,

    /// Repeat the load this many times to see the cache at work.
    #[clap(long, short, default_value_t = 1)]
    #[garde(range(min = 1, max = 1000))]
    rounds: u32,

    /// Pause between rounds, in seconds.
    #[clap(long, default_value_t = 0)]
    #[garde(skip)]
    pause: u64,

    /// Cache TTL in seconds.
    #[clap(long)]
    #[garde(range(min = 1))]
    ttl: Option<u64>,

    /// Print results as JSON instead of tables.
    #[clap(long)]
    #[garde(skip)]
    json: bool,

    /// Don't show progress bars.
    #[clap(long, short)]
    #[garde(skip)]
    quiet: bool,
}

impl Cli {
    /// The configuration file, if any, with command line overrides applied.
    fn dashboard_config(&self) -> Result<DashboardConfig> {
        let mut config = match self.config() {
            Some(path) => DashboardConfig::load(path)?,
            None => DashboardConfig::default(),
        };

        if let Some(base_url) = self.base_url() {
            config.base_url = base_url;
        }
        if let Some(token) = self.token() {
            config.token = Some(token);
        }
        if let Some(ttl) = self.ttl() {
            config.cache_ttl_secs = ttl;
        }

        Ok(config.validated()?)
    }
}

fn setup_tracing() -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::from_default_env();

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    info!("Tracing initialized");

    Ok(())
}

fn progress_bar(quiet: bool, len: u64) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }

    let pb = ProgressBar::new(len);
    pb.set_style(ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")?.progress_chars("=> "));
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

async fn run_progressive(service: &DashboardService<HttpStatSource>, quiet: bool) -> Result<DashboardStats> {
    let pb = progress_bar(quiet, 3)?;
    pb.set_message("core");

    let stats = service
        .load_progressive(|update: &StageUpdate| {
            pb.set_message(format!("stage '{}' ready", update.stage()));
            pb.inc(1);
        })
        .await;

    pb.finish_and_clear();
    Ok(stats)
}

async fn run_optimized(
    service: &DashboardService<HttpStatSource>,
    quiet: bool,
) -> Result<(DashboardStats, LoadingStatus)> {
    let mut handle = service.load_optimized().await;
    let pb = progress_bar(quiet, StatKey::iter().count() as u64)?;

    loop {
        let status = handle.status();
        pb.set_position((StatKey::iter().count() - status.count(LoadState::Loading)) as u64);
        pb.set_message(format!("{} loaded, {} failed", status.count(LoadState::Loaded), status.count(LoadState::Error)));

        if status.is_settled() || !handle.changed().await {
            break;
        }
    }

    pb.finish_and_clear();
    Ok(handle.finish().await)
}

fn summary_table(stats: &DashboardStats, cache: &BTreeMap<String, CacheStatus>, states: Option<&LoadingStatus>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL_CONDENSED)
        .set_header(["Statistic", "Stage", "Records", "State", "Cache age (s)", "Fresh"]);

    for key in StatKey::iter() {
        let records = stats.payload(key).len();
        let state = states.map_or_else(
            || if records > 0 { "loaded".to_string() } else { "-".to_string() },
            |s| s.get(key).to_string(),
        );
        let (age, fresh) = cache
            .get(key.as_ref())
            .map_or(("-".to_string(), "-".to_string()), |c| {
                (c.age_secs.to_string(), if c.valid { "yes" } else { "no" }.to_string())
            });

        table.add_row([key.to_string(), key.stage().to_string(), records.to_string(), state, age, fresh]);
    }

    for col in [2, 4] {
        if let Some(column) = table.column_mut(col) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }

    table
}

async fn execute(cli: &Cli) -> Result<()> {
    let config = cli.dashboard_config()?;
    let source = HttpStatSource::from_config(&config)?;
    let service = DashboardService::from_config(source, &config)?;

    info!("Loading dashboard from {} in {} mode", config.base_url, cli.mode());

    for round in 1..=cli.rounds() {
        if round > 1 && cli.pause() > 0 {
            tokio::time::sleep(Duration::from_secs(cli.pause())).await;
        }

        let started = Instant::now();
        let (stats, states) = match cli.mode() {
            Mode::Progressive => (run_progressive(&service, cli.quiet()).await?, None),
            Mode::Optimized => {
                let (stats, states) = run_optimized(&service, cli.quiet()).await?;
                (stats, Some(states))
            }
            Mode::All => (service.load_all().await, None),
        };
        let elapsed = started.elapsed();
        let cache = service.cache_status();

        if cli.json() {
            let report = serde_json::json!({
                "round": round,
                "elapsedMs": elapsed.as_millis() as u64,
                "stats": stats,
                "loadingStatus": states,
                "cache": cache,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        else {
            println!(
                "{} {}",
                style(format!("Round {round}")).bold(),
                style(format!("({:.2}s)", elapsed.as_secs_f64())).dim()
            );
            println!("{}", summary_table(&stats, &cache, states.as_ref()));
        }
    }

    Ok(())
}

/// Parse the command line and run the requested loads. Ctrl-C drops whatever load is in progress.
pub async fn run() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                return Ok(());
            }
            _ => return Err(err.into()),
        },
    };

    cli.validate()?;
    setup_tracing()?;

    tokio::select! {
        res = execute(&cli) => res,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted");
            Ok(())
        }
    }
}
