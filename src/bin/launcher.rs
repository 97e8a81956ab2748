//! Reference launcher: spins up `nb_process` simulated processes sharing one
//! middleware group, lets them run for `running_time` seconds, then stops and
//! joins all of them. This is a demonstration harness, not part of the core
//! middleware's public API — application code is free to drive the group
//! differently.

use std::thread;
use std::time::Duration;

use clap::Parser;
use procsim_middleware::{Config, Group};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Runs a simulated group of processes over the in-process bus")]
struct Args {
    /// Number of processes to spawn.
    #[arg(long, default_value_t = 3)]
    nb_process: usize,

    /// How long to let the group run, in seconds.
    #[arg(long, default_value_t = 5)]
    running_time: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    tracing::info!(nb_process = args.nb_process, running_time = args.running_time, "launching group");

    let group = Group::new(args.nb_process, Config::default());
    let processes: Vec<_> = (0..args.nb_process).map(|_| group.spawn_process()).collect();

    for p in &processes {
        tracing::info!(id = p.id(), "process started");
    }

    thread::sleep(Duration::from_secs(args.running_time));

    for p in &processes {
        p.shutdown();
    }
    group.shutdown();

    tracing::info!("group stopped");
    Ok(())
}
