//! gunsmith - weapon build generation from the command line
//!
//! # Overview
//!
//! This binary crate wraps the [`BuildEngine`] in a small CLI. It initializes:
//! - Configuration loading ([`ConfigManager`], `gunsmith.yaml` plus `GUNSMITH__` overrides)
//! - Logging infrastructure (file rotation + optional stderr console output)
//! - Tokio async runtime for catalog access
//! - A Ctrl+C handler wired to the engine's [`Cancellation`] signal
//!
//! Results are printed to stdout as pretty JSON.
//!
//! # Commands
//!
//! - `random`: random build for a budget and trader levels
//! - `weapon <id>`: random build on a fixed weapon
//! - `quest --weapon <id> --require "ergonomics>=55"`: optimize for stat thresholds
//! - `quest-id <questId>`: optimize every build objective of a catalog quest
//! - `validate <weaponId> SLOT=MODULE...`: check a manual slot assignment

use anyhow::{Context, Result, bail};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use gunsmith::models::{BuildPriority, ModuleId, QuestRequirement, SlotId, WeaponId};
use gunsmith::services::QuestDataProvider;
use gunsmith::{
    APP_NAME, BuildConfig, BuildEngine, BuildError, Cancellation, ConfigManager, GeneratedBuild,
    QuestBuildRequirements, StaticCatalog, VERSION,
};
use indexmap::IndexMap;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "gunsmith")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(arg_required_else_help = true)]
#[command(about = "Generate and evaluate weapon builds from a catalog snapshot")]
struct Cli {
    /// Catalog snapshot (JSON)
    #[arg(long, global = true, default_value = "catalog.json")]
    catalog: Utf8PathBuf,

    /// Directory holding gunsmith.yaml
    #[arg(long, global = true, default_value = "gunsmith-data")]
    config_dir: Utf8PathBuf,

    /// Seed for reproducible builds
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Random build for a budget
    Random {
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Random build on a fixed weapon
    Weapon {
        /// Weapon id
        id: String,
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Optimize a weapon for stat requirements
    Quest {
        /// Weapon id
        #[arg(long)]
        weapon: String,
        /// Requirement such as "ergonomics>=55" (repeatable)
        #[arg(long = "require", required = true)]
        requirements: Vec<QuestRequirement>,
    },
    /// Optimize every build objective of a quest in the catalog
    QuestId {
        quest_id: String,
    },
    /// Validate a manual SLOT=MODULE assignment
    Validate {
        weapon_id: String,
        #[arg(value_parser = parse_assignment)]
        assignments: Vec<(SlotId, ModuleId)>,
    },
}

#[derive(Debug, Clone, Args)]
struct BuildArgs {
    /// Total budget; unlimited if omitted
    #[arg(long)]
    budget: Option<u64>,

    /// Trader loyalty level as NAME=LEVEL (repeatable)
    #[arg(long = "trader", value_parser = parse_trader_level)]
    traders: Vec<(String, u8)>,

    /// Buy everything on the flea market
    #[arg(long)]
    flea_only: bool,

    /// Weapon category filter
    #[arg(long)]
    category: Option<String>,

    /// balanced, ergonomics or low-recoil
    #[arg(long, default_value = "balanced")]
    priority: BuildPriority,
}

impl BuildArgs {
    fn to_config(&self) -> BuildConfig {
        let mut config = BuildConfig {
            budget: self.budget,
            use_flea_only: self.flea_only,
            weapon_type: self.category.clone(),
            priority: self.priority,
            ..BuildConfig::default()
        };
        for (trader, level) in &self.traders {
            config = config.trader_level(trader.clone(), *level);
        }
        config
    }
}

fn parse_trader_level(raw: &str) -> Result<(String, u8), String> {
    let (name, level) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=LEVEL, got {}", raw))?;
    let level = level
        .trim()
        .parse::<u8>()
        .map_err(|_| format!("invalid loyalty level in {}", raw))?;
    Ok((name.trim().to_string(), level))
}

fn parse_assignment(raw: &str) -> Result<(SlotId, ModuleId), String> {
    let (slot, module) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SLOT=MODULE, got {}", raw))?;
    Ok((SlotId::new(slot.trim()), ModuleId::new(module.trim())))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let mut engine_config = config_manager.load_engine_config()?;
    if cli.debug {
        engine_config.logging.debug = true;
    }
    let _guard = gunsmith::logging::setup_from_settings(&engine_config.logging)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("gunsmith-worker")
        .build()?;

    let catalog = Arc::new(
        StaticCatalog::load(&cli.catalog)
            .with_context(|| format!("Failed to load catalog: {}", cli.catalog))?,
    );
    tracing::info!("Loaded {} weapons from {}", catalog.weapon_count(), cli.catalog);

    let engine = BuildEngine::new(catalog.clone(), &engine_config);
    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let (cancel_tx, cancel) = Cancellation::channel();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted - cancelling build request");
            let _ = cancel_tx.send(true);
        }
    });

    let result = runtime.block_on(run_command(
        cli.command,
        &engine,
        catalog.as_ref(),
        &mut rng,
        &cancel,
    ));

    engine.metrics().log_summary();
    runtime.shutdown_timeout(Duration::from_secs(5));

    result.inspect_err(|e| tracing::error!("Command failed: {:#}", e))
}

async fn run_command(
    command: Command,
    engine: &BuildEngine,
    quests: &dyn QuestDataProvider,
    rng: &mut StdRng,
    cancel: &Cancellation,
) -> Result<()> {
    match command {
        Command::Random { build } => {
            let config = build.to_config();
            let generated = engine.random_build(&config, rng, cancel).await;
            print_build(budget_hint(generated)?)
        }
        Command::Weapon { id, build } => {
            let config = build.to_config();
            let generated = engine
                .build_for_weapon(&WeaponId::new(id), &config, rng, cancel)
                .await;
            print_build(budget_hint(generated)?)
        }
        Command::Quest {
            weapon,
            requirements,
        } => {
            let requirements = QuestBuildRequirements::new(weapon, requirements);
            let result = engine.quest_build(&requirements, rng, cancel).await?;
            print_json(&result)
        }
        Command::QuestId { quest_id } => {
            let results = engine.quest_builds(quests, &quest_id, rng, cancel).await?;
            print_json(&results)
        }
        Command::Validate {
            weapon_id,
            assignments,
        } => {
            let assignment: IndexMap<SlotId, ModuleId> = assignments.into_iter().collect();
            let validation = engine
                .validate_build(&WeaponId::new(weapon_id), &assignment)
                .await?;
            print_json(&json!({
                "valid": validation.is_valid(),
                "errors": validation.errors(),
            }))
        }
    }
}

fn budget_hint(result: Result<GeneratedBuild, BuildError>) -> Result<GeneratedBuild> {
    match result {
        Ok(build) => Ok(build),
        Err(e) if e.is_budget_infeasible() => bail!("{}; try a larger budget", e),
        Err(e) => Err(e.into()),
    }
}

fn print_build(build: GeneratedBuild) -> Result<()> {
    let description = build.tier.describe();
    print_json(&json!({
        "build": build,
        "tierSummary": description.summary,
        "suggestion": description.suggestion,
    }))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", output);
    Ok(())
}
