#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays Enemy Down against the headless host.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use enemy_down_core::{Difficulty, OpponentDeath, Participant, PlayerId, Position};
use enemy_down_headless::{HeadlessHost, ManualScheduler};
use enemy_down_plugin::{CommandOutcome, CommandSender, EnemyDown, PluginConfig};
use enemy_down_score_store::{format_listing, JsonLinesScoreStore, ListingOrder, ScoreStore};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Mixed into the configured seed so kills do not mirror spawn draws.
const KILL_STREAM: u64 = 0x6b69_6c6c;

/// Timed survival minigame played against simulated opponents.
#[derive(Debug, Parser)]
#[command(name = "enemy-down", author, version, about)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Score file overriding `[store] path`.
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Play one session and record its score.
    Play(PlayArgs),
    /// Print every recorded score.
    List(ListArgs),
}

#[derive(Debug, Args)]
struct PlayArgs {
    /// Difficulty tag: easy, normal or hard.
    difficulty: Difficulty,
    /// Display name recorded with the score.
    #[arg(long, default_value = "player")]
    name: String,
    /// Seed overriding `[game] seed` for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,
    /// Probability that the player defeats each live opponent between ticks.
    #[arg(long, default_value_t = 0.5, value_parser = parse_probability)]
    kill_chance: f64,
}

#[derive(Debug, Args)]
struct ListArgs {
    /// Row ordering.
    #[arg(long, value_enum, default_value_t = Order::Id)]
    order: Order,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Order {
    /// Insertion order.
    Id,
    /// Highest score first.
    Score,
    /// Oldest first.
    Time,
}

impl From<Order> for ListingOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Id => Self::Id,
            Order::Score => Self::ScoreDescending,
            Order::Time => Self::RegisteredAt,
        }
    }
}

fn parse_probability(value: &str) -> Result<f64, String> {
    let probability: f64 = value
        .parse()
        .map_err(|error| format!("`{value}` is not a number: {error}"))?;
    if (0.0..=1.0).contains(&probability) {
        Ok(probability)
    } else {
        Err(format!("`{value}` is not between 0 and 1"))
    }
}

/// Entry point for the Enemy Down command-line interface.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PluginConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => PluginConfig::default(),
    };
    if let Some(store) = cli.store {
        config.store.path = store;
    }

    match cli.command {
        Commands::Play(args) => play(config, &args),
        Commands::List(args) => list(&config, &args),
    }
}

fn open_store(config: &PluginConfig) -> Result<JsonLinesScoreStore> {
    JsonLinesScoreStore::open(&config.store.path).with_context(|| {
        format!(
            "failed to open score store at {}",
            config.store.path.display()
        )
    })
}

fn play(mut config: PluginConfig, args: &PlayArgs) -> Result<()> {
    if args.seed.is_some() {
        config.game.seed = args.seed;
    }
    let store = Arc::new(open_store(&config)?);
    let host = Arc::new(HeadlessHost::new());
    let scheduler = Arc::new(ManualScheduler::new());
    let plugin = EnemyDown::enable(
        Arc::clone(&host),
        Arc::clone(&scheduler),
        Arc::<JsonLinesScoreStore>::clone(&store),
        &config,
    )
    .context("failed to enable enemy down")?;

    let player = PlayerId::new(1);
    host.join(player, Position::new(0.0, 64.0, 0.0));
    let sender = CommandSender::Player(Participant::new(player, args.name.as_str()));
    if let CommandOutcome::Rejected(error) =
        plugin.on_command(&sender, &[args.difficulty.as_str()])
    {
        bail!("session did not start: {error}");
    }

    let mut rng = match config.game.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed ^ KILL_STREAM),
        None => ChaCha8Rng::from_entropy(),
    };
    let mut step = Duration::ZERO;
    while plugin.active_session(player).is_some() {
        let _ = scheduler.advance(step);
        step = config.game.tick_period();

        for entity in host.entities() {
            if rng.gen_bool(args.kill_chance) {
                log::debug!("{} defeats {:?} {:?}", args.name, entity.kind, entity.id);
                let _ = host.kill(entity.id);
                let _ = plugin.on_opponent_died(OpponentDeath {
                    opponent: entity.id,
                    kind: entity.kind,
                    killer: Some(player),
                });
            }
        }

        if let Some(session) = plugin.active_session(player) {
            println!(
                "t={:>3}s  remaining {:>3}s  score {:>3}  opponents {}",
                scheduler.now().as_secs(),
                session.remaining_time,
                session.score,
                session.live_spawns.len()
            );
        }
    }

    for message in host.messages(player) {
        println!("{message}");
    }
    for (title, subtitle) in host.titles(player) {
        println!("{title} {subtitle}");
    }

    plugin.disable();
    println!("score saved to {}", store.path().display());
    Ok(())
}

fn list(config: &PluginConfig, args: &ListArgs) -> Result<()> {
    let store = open_store(config)?;
    let records = store
        .select_ordered(args.order.into())
        .context("failed to read recorded scores")?;

    if records.is_empty() {
        println!("no scores recorded in {}", store.path().display());
    }
    for record in &records {
        println!("{}", format_listing(record));
    }
    Ok(())
}
