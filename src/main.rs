use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use arborist::{
    engine::EngineBuilder,
    scenario::{Scenario, ScenarioLoader},
    settings::Settings,
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Seasonal vegetation simulation runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a scenario headless and print the final population summary
    Run(CommonArgs),
    /// Run a scenario behind the HTTP/SSE UI bridge
    Serve {
        #[command(flatten)]
        common: CommonArgs,

        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 8080)]
        port: u16,

        /// Publish a UI frame every N simulation frames
        #[arg(long, default_value_t = 512)]
        publish_interval: u32,
    },
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/small_grove.yaml")]
    scenario: PathBuf,

    /// Settings file; overrides the scenario's inline settings when present
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Override frame count (uses scenario default when omitted)
    #[arg(long)]
    frames: Option<u64>,

    /// Override snapshot interval in frames
    #[arg(long)]
    snapshot_interval: Option<u32>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
}

struct Prepared {
    scenario: Scenario,
    settings: Settings,
    frames: u64,
    snapshot_dir: PathBuf,
}

fn prepare(args: &CommonArgs) -> Result<Prepared> {
    let mut scenario = ScenarioLoader::new(".").load(&args.scenario)?;
    let settings = match &args.settings {
        Some(path) => Settings::load_or_default(path)?,
        None => scenario.settings(),
    };
    if let Some(interval) = args.snapshot_interval {
        scenario.snapshot_interval_frames = interval;
    }
    Ok(Prepared {
        frames: scenario.frames(args.frames),
        snapshot_dir: args
            .snapshot_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("snapshots")),
        settings,
        scenario,
    })
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run_headless(prepared: Prepared) -> Result<()> {
    let Prepared {
        scenario,
        settings,
        frames,
        snapshot_dir,
    } = prepared;
    let mut world = scenario.build_world()?;
    let mut engine = EngineBuilder::new(scenario.engine_settings(snapshot_dir))
        .with_settings(settings)
        .with_default_systems()
        .build();

    engine.run(&mut world, frames)?;
    let summary = world.snapshot(&scenario.name);
    info!(
        scenario = %scenario.name,
        frames,
        date = %summary.date,
        season = ?summary.season,
        trees = summary.total_trees,
        tracked = summary.tracked,
        illusions = summary.illusions,
        lumber = summary.lumber,
        "run completed"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => {
            let prepared = prepare(&args)?;
            init_tracing(&prepared.settings);
            run_headless(prepared)
        }
        Command::Serve {
            common,
            host,
            port,
            publish_interval,
        } => {
            let prepared = prepare(&common)?;
            init_tracing(&prepared.settings);
            web::run(WebServerConfig {
                scenario: prepared.scenario,
                settings: prepared.settings,
                settings_path: common.settings.clone(),
                frames: prepared.frames,
                publish_interval,
                snapshot_dir: prepared.snapshot_dir,
                host,
                port,
            })
            .await
        }
    }
}
