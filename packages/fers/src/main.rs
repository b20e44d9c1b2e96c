//! fers — event-driven bistatic/monostatic radar scene simulator CLI.
//!
//! `fers run --config scene.toml` parses a flat TOML scene, builds the
//! `World`, drives the engine to completion, and renders every receiver's
//! I/Q buffer to a binary output file.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use fers::config::{build_world, SceneFile};
use fers::engine::Engine;
use fers::output::binary_sink;
use fers::radar::Receiver;
use fers::{render, FersError};

#[derive(Parser, Debug)]
#[command(name = "fers", about = "Event-driven bistatic/monostatic radar scene simulator")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scene to completion and write each receiver's output.
    Run {
        /// Path to the scene's flat TOML configuration.
        #[arg(short, long)]
        config: PathBuf,
        /// Directory output binary files are written into, one per receiver.
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
        /// Renderer worker threads per receiver. Defaults to the host's
        /// hardware concurrency (spec §5).
        #[arg(long)]
        workers: Option<usize>,
        /// Output sample component width in bytes: 4 (f32) or 8 (f64).
        #[arg(long, default_value_t = 4)]
        float_size: u16,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "fers=info".into()))
        .init();

    let args = Args::parse();

    let code = match args.command {
        Command::Run { config, out_dir, workers, float_size } => run(&config, &out_dir, workers, float_size),
    };
    std::process::exit(code);
}

/// Exit codes per spec §6: `0` success, `2` argument error, `1` simulation error.
fn run(config_path: &PathBuf, out_dir: &PathBuf, workers: Option<usize>, float_size: u16) -> i32 {
    let config_str = match std::fs::read_to_string(config_path) {
        Ok(s) => s,
        Err(err) => {
            error!(path = %config_path.display(), %err, "cannot read scene config");
            return 2;
        }
    };
    let scene: SceneFile = match toml::from_str(&config_str) {
        Ok(s) => s,
        Err(err) => {
            error!(%err, "invalid scene config");
            return 2;
        }
    };
    if let Err(err) = std::fs::create_dir_all(out_dir) {
        error!(path = %out_dir.display(), %err, "cannot create output directory");
        return 2;
    }

    match run_scene(scene, out_dir, workers, float_size) {
        Ok(()) => 0,
        Err(err) => {
            error!(%err, "simulation failed");
            1
        }
    }
}

fn run_scene(scene: SceneFile, out_dir: &PathBuf, workers: Option<usize>, float_size: u16) -> Result<(), FersError> {
    let config = scene.world.clone();
    let world = build_world(scene)?;

    let receivers: Vec<(String, Arc<Receiver>)> =
        world.receivers().map(|(_, rx)| (rx.name.clone(), Arc::clone(rx))).collect();

    info!(receivers = receivers.len(), end_time = config.end_time, "starting engine");

    let worker_count = workers.unwrap_or_else(render::default_worker_count);
    let handles: Vec<_> = receivers
        .iter()
        .map(|(name, rx)| {
            let path = out_dir.join(format!("{name}.bin"));
            let sink = binary_sink(&path, float_size)?;
            Ok::<_, FersError>(render::spawn(Arc::clone(rx), &config, worker_count, sink))
        })
        .collect::<Result<_, _>>()?;

    let engine = Engine::new(world);
    engine.run()?;

    for (handle, (name, rx)) in handles.into_iter().zip(&receivers) {
        info!(receiver = %name, "finalizing receiver output");
        handle.join();
        let interference = rx.interference_log();
        if !interference.is_empty() {
            info!(receiver = %name, count = interference.len(), "responses logged below SNR threshold");
        }
    }

    Ok(())
}
