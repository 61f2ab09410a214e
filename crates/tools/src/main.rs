use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tools::{load_config, load_scene, replay};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "atlas-sync", about = "Replays vector scenes through the sync engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Loads a scene file, runs its passes and prints a JSON report.
    Replay {
        scene: PathBuf,
        /// Engine configuration (JSON); defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Split each pass into chunks of this many features.
        #[arg(long)]
        chunk: Option<u32>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = real_main(Cli::parse()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Replay {
            scene,
            config,
            chunk,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(chunk) = chunk {
                config.chunk_size = chunk;
                config.validate()?;
            }
            let scene = load_scene(&scene)?;
            let report = replay(scene, config, chunk.is_some())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
