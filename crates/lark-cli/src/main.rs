use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use lark_fc::{mav::FcLink, FcConfig};
use lark_mission::{
    abort_pair, build_waypoint, doctor, position_channel, MissionPlan, MissionRunner, NavPolicy,
};

#[derive(Debug, Parser)]
#[command(name = "lark", version, about = "Skylark - scripted waypoint missions over MAVLink")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate config, mission file and navigation policy.
    Doctor,
    /// Resolve legs and print the built waypoints without flying.
    Plan {
        #[arg(long, value_delimiter = ',')]
        legs: Option<Vec<String>>,
    },
    /// Fly the mission: arm, launch, waypoints, land.
    Fly {
        #[arg(long, value_delimiter = ',')]
        legs: Option<Vec<String>>,
    },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    mission: MissionCfg,
    #[serde(default)]
    nav: NavPolicy,
    fc: FcConfig,
}

#[derive(Debug, serde::Deserialize)]
struct MissionCfg {
    /// JSON file mapping leg names to waypoint records.
    file: String,
    /// Legs to fly, in order. Overridable with --legs.
    legs: Vec<String>,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => run_doctor(&cfg),
        Command::Plan { legs } => plan(&cfg, legs),
        Command::Fly { legs } => fly(&cfg, legs).await,
    }
}

fn run_doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    doctor::check_policy(&cfg.nav)?;
    let plan = MissionPlan::load(&cfg.mission.file)?;
    doctor::check_plan(&plan)?;
    for leg in &cfg.mission.legs {
        anyhow::ensure!(
            plan.leg_names().any(|n| n == leg),
            "mission.legs names unknown leg {:?}",
            leg
        );
    }

    anyhow::ensure!(!cfg.fc.serial_dev.is_empty(), "fc.serial_dev missing");
    anyhow::ensure!(cfg.fc.baud > 0, "fc.baud invalid");

    info!("doctor: OK");
    Ok(())
}

fn selected_legs(cfg: &Config, override_legs: Option<Vec<String>>, plan: &MissionPlan) -> Vec<String> {
    match override_legs {
        Some(legs) if !legs.is_empty() => legs,
        _ if !cfg.mission.legs.is_empty() => cfg.mission.legs.clone(),
        _ => plan.leg_names().map(String::from).collect(),
    }
}

fn plan(cfg: &Config, legs: Option<Vec<String>>) -> Result<()> {
    let plan = MissionPlan::load(&cfg.mission.file)?;
    let legs = selected_legs(cfg, legs, &plan);
    let records = plan.resolve(&legs)?;

    println!("legs: {}", legs.join(","));
    for (idx, rec) in records.iter().enumerate() {
        let wp = build_waypoint(rec)?;
        let t = wp.target();
        println!(
            "wp {:>2}: lat={:.7} lon={:.7} alt={} mm hold={} ms",
            idx, t.lat, t.lon, wp.alt_mm, wp.hold_ms
        );
    }
    Ok(())
}

async fn fly(cfg: &Config, legs: Option<Vec<String>>) -> Result<()> {
    let plan = MissionPlan::load(&cfg.mission.file)?;
    let legs = selected_legs(cfg, legs, &plan);
    let records = plan.resolve(&legs)?;
    info!("fly: {} waypoints across legs {}", records.len(), legs.join(","));

    let mut link = FcLink::open(&cfg.fc).context("FC open")?;
    let (position_tx, tracker) = position_channel();
    let _io = link.start_io(position_tx);

    let (abort_handle, mut abort) = abort_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("ctrl-c: aborting mission, landing");
            abort_handle.abort();
        }
    });

    let mut runner = MissionRunner::new(link, tracker, cfg.nav.clone());
    let report = runner.fly(&records, &mut abort).await?;

    println!(
        "mission complete: {}/{} waypoints reached, landed={}",
        report.reached(),
        report.waypoints.len(),
        report.landed
    );
    for (idx, status) in report.waypoints.iter().enumerate() {
        println!("wp {:>2}: {:?}", idx, status);
    }
    Ok(())
}
