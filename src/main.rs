use adsim::{Preset, Scenario, ScenarioConfig};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Point-mass simulation with adaptive step subdivision")]
struct Args {
    /// Scenario YAML, relative to the crate's `scenarios/` directory unless absolute
    #[arg(short, long, conflicts_with = "preset")]
    file: Option<PathBuf>,

    /// Built-in scenario to run when no file is given
    #[arg(short, long, value_enum, default_value = "two-bodies-from-rest")]
    preset: Preset,

    /// Override the number of coarse steps
    #[arg(short, long)]
    steps: Option<usize>,

    /// Disable adaptive subdivision
    #[arg(long)]
    fixed: bool,
}

// load here to keep main clean
fn load_scenario(args: &Args) -> Result<ScenarioConfig> {
    let Some(file) = &args.file else {
        return Ok(args.preset.config());
    };
    let path = if file.is_absolute() {
        file.clone()
    } else {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file)
    };
    ScenarioConfig::from_path(&path).with_context(|| format!("loading {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = load_scenario(&args)?;
    if args.fixed {
        cfg.simulation.adaptability.is_adaptive = false;
    }

    let mut scenario = Scenario::build(cfg)?;
    if let Some(steps) = args.steps {
        scenario.parameters.number_of_steps = steps;
    }
    if scenario.system.is_empty() {
        warn!("scenario has no bodies");
    }
    if scenario.system.forces().is_empty() {
        info!("no forces configured, bodies only follow their fields");
    }
    scenario.run()?;

    let system = &scenario.system;
    info!("life time: {:.6e}", system.life_time());
    for (i, body) in system.bodies().iter().enumerate() {
        let p = body.position;
        info!(
            "body {i}: m = {:.3e}, x = ({:.4e}, {:.4e}, {:.4e}), {} history entries, {} metric samples",
            body.mass(),
            p.x,
            p.y,
            p.z,
            body.position_history().len(),
            body.adaptability().history_len(),
        );
    }
    if let Some(max_force) = system.forces().max_force() {
        info!("forces capped at {max_force:e}");
    }
    let momentum = system.total_momentum();
    info!("total momentum: ({:.4e}, {:.4e}, {:.4e})", momentum.x, momentum.y, momentum.z);

    let frames = system.frames(scenario.plotting_stride());
    let masses: Vec<f64> = system.bodies().iter().map(|b| b.mass()).collect();
    info!(
        "{} playback frames, dot sizes {:?}",
        frames.len(),
        scenario.plotting.dot_sizes(&masses)
    );

    Ok(())
}
