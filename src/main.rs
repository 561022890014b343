//! BTC conviction signal engine
//!
//! Runs one evaluation cycle (or rescores a published snapshot) and sends a
//! Telegram alert when conviction reaches the threshold.

use anyhow::Context;
use btc_signal::{
    config::Config,
    fetcher::{Fetcher, HttpFetcher},
    notify::Notifier,
    pipeline::{assess, CycleOutcome, Pipeline},
    scoring::{AlertGate, ScoringEngine, Verdict},
    snapshot::DashboardSnapshot,
};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "btc-signal")]
#[command(about = "BTC market stress and conviction signal engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one evaluation cycle
    Run {
        /// Log the alert instead of sending it
        #[arg(long)]
        dry_run: bool,
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Score an existing snapshot
    Score(ScoreSource),
    /// Test Telegram notification
    TestNotify,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct ScoreSource {
    /// Snapshot JSON file
    #[arg(long)]
    file: Option<String>,
    /// Published snapshot URL
    #[arg(long)]
    url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run { dry_run, json } => run_cycle(config, dry_run, json).await,
        Commands::Score(source) => score_snapshot(config, source).await,
        Commands::TestNotify => test_notify(config).await,
    }
}

fn build_fetcher(config: &Config) -> anyhow::Result<Arc<dyn Fetcher>> {
    let fetcher = HttpFetcher::new(&config.fetcher, &config.market)?;
    Ok(Arc::new(fetcher))
}

async fn run_cycle(config: Config, dry_run: bool, json: bool) -> anyhow::Result<()> {
    if dry_run {
        tracing::warn!("Running in DRY RUN mode - alerts will be logged, not sent");
    }

    let pipeline = Pipeline::new(build_fetcher(&config)?, &config);
    let engine = ScoringEngine::new(&config.scoring);
    let gate = AlertGate::from(&config.scoring);

    let snapshot = pipeline.run_cycle().await;
    for error in &snapshot.errors {
        tracing::warn!("⚠️ {}", error);
    }

    let outcome = assess(snapshot, &engine, &gate);
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.snapshot)?);
    }
    print_outcome(&outcome);

    if let Some(alert) = outcome.alert {
        if dry_run {
            tracing::info!("[DRY RUN] Would send: {}", alert.message());
        } else {
            let notifier = Notifier::from_config(config.telegram.as_ref());
            if let Err(e) = notifier.conviction_alert(&alert).await {
                tracing::error!("Failed to send alert: {}", e);
            }
        }
    }

    Ok(())
}

async fn score_snapshot(config: Config, source: ScoreSource) -> anyhow::Result<()> {
    let snapshot: DashboardSnapshot = match (source.file, source.url) {
        (Some(path), _) => {
            let path = shellexpand::tilde(&path).to_string();
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading snapshot {}", path))?;
            serde_json::from_str(&text).with_context(|| format!("parsing snapshot {}", path))?
        }
        (None, Some(url)) => {
            let pipeline = Pipeline::new(build_fetcher(&config)?, &config);
            pipeline.load_snapshot(&url).await?
        }
        (None, None) => anyhow::bail!("either --file or --url is required"),
    };

    let outcome = assess(
        snapshot,
        &ScoringEngine::new(&config.scoring),
        &AlertGate::from(&config.scoring),
    );
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &CycleOutcome) {
    let view = outcome.snapshot.view();
    println!("\n📊 Snapshot");
    println!("{:-<50}", "");
    println!("RSI(1h):       {:.1}", view.rsi_1h);
    println!("MACD hist(1h): {:.2}", view.macd_hist_1h);
    println!("Funding z:     {:.2}", view.funding_z);
    println!("OI Δ24h:       {:.1}%", view.oi_delta24h);
    println!("CVD(1h):       {:.2}", view.cvd_1h);
    println!("Rel vol(15m):  {}", view.relative_15m);
    println!("Stress:        {:.2}", view.stress_index);
    println!("Errors:        {}", outcome.snapshot.errors.len());
    println!("{:-<50}", "");

    match outcome.verdict {
        Verdict::Gated { stress_index } => {
            println!("⛔ Stress {:.2} above gate, no signal", stress_index)
        }
        Verdict::Scored(score) => println!("Score: long {} / short {}", score.long, score.short),
    }
    match &outcome.alert {
        Some(alert) => println!("{}", alert.message()),
        None => println!("No high-conviction signal"),
    }
}

async fn test_notify(config: Config) -> anyhow::Result<()> {
    let Some(tg) = config.telegram.as_ref() else {
        anyhow::bail!("Telegram not configured (set [telegram] or BOT_TOKEN/CHAT_ID)");
    };

    let notifier = Notifier::new(tg);
    notifier
        .send("✅ *btc-signal* test notification")
        .await
        .context("sending test notification")?;
    println!("✅ Test notification sent to chat {}", tg.chat_id);
    Ok(())
}
