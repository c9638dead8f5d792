//! spin-sim — headless spin session runner
//!
//! Usage:
//!   spin-sim rounds 20                 - play 20 rounds (free spins included)
//!   spin-sim autoplay 100 --stop-on-win
//!   spin-sim rounds 5 --mode turbo --json

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use rf_spin::rf_stage::{SpinMode, StageEvent};
use rf_spin::{GameSession, SpinConfig, SyntheticProfile, SyntheticSource};

#[derive(Parser)]
#[command(name = "spin-sim", about = "Run spin sessions against a synthetic result server")]
struct Cli {
    /// YAML or JSON spin config (defaults to the built-in studio config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Speed mode
    #[arg(short, long, value_enum, default_value = "normal")]
    mode: ModeArg,

    /// Seed for reels and results
    #[arg(long)]
    seed: Option<u64>,

    /// Chance an upstream request fails
    #[arg(long, default_value_t = 0.0)]
    failure_rate: f64,

    /// Print every stage as a JSON line
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play single rounds back to back
    Rounds {
        #[arg(default_value_t = 10)]
        count: u32,
    },
    /// Run one autoplay session
    Autoplay {
        #[arg(default_value_t = 50)]
        count: u32,
        /// Stop after any win
        #[arg(long)]
        stop_on_win: bool,
        /// Stop when a bonus triggers
        #[arg(long)]
        stop_on_feature: bool,
        /// Stop once this much balance was lost
        #[arg(long)]
        loss_limit: Option<f64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Normal,
    Fast,
    Turbo,
}

impl From<ModeArg> for SpinMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Normal => SpinMode::Normal,
            ModeArg::Fast => SpinMode::Fast,
            ModeArg::Turbo => SpinMode::Turbo,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SpinConfig::load(path)
            .with_context(|| format!("loading spin config {}", path.display()))?,
        None => SpinConfig::studio(),
    };
    config.default_mode = cli.mode.into();
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if let Commands::Autoplay {
        stop_on_win,
        stop_on_feature,
        loss_limit,
        ..
    } = &cli.command
    {
        config.autoplay.stop_on_win |= *stop_on_win;
        config.autoplay.stop_on_feature |= *stop_on_feature;
        config.autoplay.loss_limit = loss_limit.or(config.autoplay.loss_limit);
    }

    let profile = SyntheticProfile {
        failure_rate: cli.failure_rate,
        ..Default::default()
    };
    let source = Arc::new(SyntheticSource::new(
        config.grid,
        config.symbols.clone(),
        profile,
        config.seed,
    ));

    let game = GameSession::new(config, source.clone()).context("invalid spin config")?;
    game.start();

    let printer = {
        let sub = game.subscribe_all();
        let json = cli.json;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(20));
            loop {
                interval.tick().await;
                for event in sub.try_iter() {
                    print_stage(&event, json);
                }
            }
        })
    };

    match cli.command {
        Commands::Rounds { count } => {
            let mut total_win = 0.0;
            for round in 1..=count {
                match game.play_round().await {
                    Ok(report) => total_win += report.total_win(),
                    Err(e) => {
                        log::warn!("Round {} failed: {}", round, e);
                    }
                }
            }
            println!("rounds: {}  total win: {:.2}  balance: {:.2}", count, total_win, source.balance());
        }
        Commands::Autoplay { count, .. } => {
            let (report, free_spins) = game.run_autoplay(count).await?;
            println!(
                "autoplay: {} of {} played, ended by {:?}, win {:.2}, net {:.2}",
                report.played, report.requested, report.reason, report.total_win, report.net_result
            );
            if let Some(summary) = free_spins {
                println!(
                    "free spins: {} rounds, win {:.2} ({:?})",
                    summary.free_spin_count, summary.total_win, summary.reason
                );
            }
            println!("balance: {:.2}", source.balance());
        }
    }

    // Let the printer flush the tail of the stream
    tokio::time::sleep(Duration::from_millis(50)).await;
    printer.abort();
    game.shutdown().await;
    Ok(())
}

fn print_stage(event: &StageEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => log::warn!("Unprintable stage {}: {}", event.type_name(), e),
        }
    } else {
        println!("{:>9.1}ms  #{:<5} {:?}", event.elapsed_ms, event.seq, event.stage);
    }
}
