use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    author = "Alexander Heilmeier <alexander.heilmeier@tum.de>",
    name = "RS-TB",
    about = "A time-bounded race simulator with randomized effects written in Rust"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug logging (can be overridden by RUST_LOG)
    #[clap(short, long)]
    pub debug: bool,

    /// Simulate the race in real-time with the inserted real-time factor and print the
    /// notifications while it runs
    #[clap(short, long)]
    pub live: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set number of simulation runs (must be one in case of a real-time simulation)
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set path to the simulation parameter file
    #[clap(short, long, value_parser)]
    pub parfile_path: PathBuf,

    /// Set real-time factor (only relevant in case of a real-time simulation)
    #[clap(short, long, default_value = "1.0")]
    pub realtime_factor: f64,

    /// Set simulation timestep size in milliseconds, should be in the range [1.0, 1000.0]
    #[clap(short, long, default_value = "100.0")]
    pub timestep_size: f64,

    /// Set the random seed (runs i > 0 of a batch use seed + i), drawn randomly if not set
    #[clap(short, long)]
    pub seed: Option<u64>,

    /// Write the replay bundle of the (first) race as JSON to this path
    #[clap(long, value_parser)]
    pub replay_path: Option<PathBuf>,
}
