use anyhow::Context;
use clap::Parser;
use flume::Receiver;
use racesim::core::race::RaceStatus;
use racesim::interfaces::observer::Notification;
use racesim::post::batch_summary::BatchSummary;
use racesim::post::race_result::RaceResult;
use racesim::pre::check_sim_opts_pars::check_sim_opts_pars;
use racesim::pre::read_sim_pars::read_sim_pars;
use racesim::pre::sim_opts::SimOpts;
use rayon::prelude::*;
use std::cmp::min;
use std::thread;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

// set maximum number of concurrently running jobs in case of running more than a single simulation
const MAX_NO_CONCURRENT_JOBS: u32 = 200;

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments and set up logging
    let sim_opts: SimOpts = SimOpts::parse();
    init_logging(sim_opts.debug);

    // read and check simulation parameters
    let sim_pars = read_sim_pars(sim_opts.parfile_path.as_path())?;
    check_sim_opts_pars(&sim_opts, &sim_pars)?;

    // the seed is printed such that any run can be reproduced
    let base_seed = sim_opts.seed.unwrap_or_else(rand::random);

    // create vector for the race results and simulate race(s)
    let mut race_results: Vec<RaceResult> = Vec::with_capacity(sim_opts.no_sim_runs as usize);

    info!(
        "Simulating {} ({} racers, {:.1} min) with a time step size of {:.1}ms, seed {}",
        sim_pars.race_pars.name,
        sim_pars.race_pars.racers.len(),
        sim_pars.race_pars.duration_minutes,
        sim_opts.timestep_size,
        base_seed
    );

    // EXECUTION -----------------------------------------------------------------------------------
    if !sim_opts.live {
        // NON-LIVE CASE ---------------------------------------------------------------------------
        let t_start = Instant::now();

        if sim_opts.no_sim_runs == 1 {
            // SINGLE THREAD -----------------------------------------------------------------------
            race_results.push(racesim::core::handle_race::handle_race(
                &sim_pars,
                base_seed,
                sim_opts.timestep_size,
                sim_opts.debug,
                None,
                1.0,
            )?);
        } else {
            // MULTIPLE THREADS --------------------------------------------------------------------
            let mut no_races_left = sim_opts.no_sim_runs;

            while no_races_left > 0 {
                // calculate number of simulation runs to execute in current loop
                let tmp_no_sim_runs = min(no_races_left, MAX_NO_CONCURRENT_JOBS);
                let run_offset = sim_opts.no_sim_runs - no_races_left;

                // simulate the races and save the results (every run uses its own seed)
                let tmp_results: anyhow::Result<Vec<RaceResult>> = (0..tmp_no_sim_runs)
                    .into_par_iter()
                    .map(|i| {
                        racesim::core::handle_race::handle_race(
                            &sim_pars,
                            base_seed.wrapping_add((run_offset + i) as u64),
                            sim_opts.timestep_size,
                            false,
                            None,
                            1.0,
                        )
                    })
                    .collect();
                race_results.extend(tmp_results?);

                // reduce remaining simulation runs
                no_races_left -= tmp_no_sim_runs;
            }
        }

        info!("Execution time (total): {}ms", t_start.elapsed().as_millis());
    } else {
        // LIVE CASE -------------------------------------------------------------------------------
        // create channel for communication between the race thread and the printer
        let (tx, rx) = flume::unbounded();

        // the race thread owns its copy of the parameters, the sender is dropped with the thread
        // which ends the printer loop
        let sim_opts_thread = sim_opts.clone();
        let sim_pars_thread = sim_pars.clone();

        let race_thread = thread::spawn(move || {
            racesim::core::handle_race::handle_race(
                &sim_pars_thread,
                base_seed,
                sim_opts_thread.timestep_size,
                sim_opts_thread.debug,
                Some(&tx),
                sim_opts_thread.realtime_factor,
            )
        });

        print_notifications(&rx);

        let race_result = race_thread
            .join()
            .map_err(|_| anyhow::anyhow!("Race thread panicked!"))??;
        race_results.push(race_result);
    }

    // POST-PROCESSING -----------------------------------------------------------------------------
    // print results
    if race_results.len() == 1 {
        race_results[0].print_rankings();
    } else if let Some(batch_summary) = BatchSummary::from_results(&race_results) {
        batch_summary.print_summary();
    }

    // write replay of the first race if indicated
    if let (Some(replay_path), Some(race_result)) = (&sim_opts.replay_path, race_results.first()) {
        race_result
            .replay
            .write_json(replay_path)
            .context("Could not export replay!")?;
        info!("Replay written to {}", replay_path.display());
    }

    Ok(())
}

/// init_logging installs the log subscriber. RUST_LOG takes precedence over the debug flag.
fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// print_notifications prints the race notifications until the race is finished or the race
/// thread hung up. State notifications are printed with a maximum of 1 Hz race time.
fn print_notifications(rx: &Receiver<Notification>) {
    let mut t_state_print = f64::NEG_INFINITY;

    for notification in rx.iter() {
        match notification {
            Notification::StateChanged(race_state) => {
                if race_state.elapsed < t_state_print + 0.9999
                    && !matches!(race_state.status, RaceStatus::Finished)
                {
                    continue;
                }
                t_state_print = race_state.elapsed;

                let leaders: Vec<String> = race_state
                    .standings
                    .iter()
                    .take(3)
                    .map(|x| format!("{} {:.1}%", x.racer.display_name, x.progress))
                    .collect();

                println!(
                    "STATE: {:6.1}s | {} | field {:5.1}% vs schedule {:5.1}% | {}",
                    race_state.elapsed,
                    race_state.phase_title,
                    race_state.race_progress,
                    race_state.time_progress,
                    leaders.join(", ")
                );
            }
            Notification::EffectBegin {
                racer_key,
                is_positive,
                duration,
                stun_duration,
            } => match (is_positive, stun_duration) {
                (true, _) => println!("EFFECT: {} boosted for {:.1}s", racer_key, duration),
                (false, Some(t_stun)) => println!(
                    "EFFECT: {} stumbled ({:.1}s stun, {:.1}s total)",
                    racer_key, t_stun, duration
                ),
                (false, None) => println!("EFFECT: {} slowed for {:.1}s", racer_key, duration),
            },
            Notification::EffectEnd { racer_key } => println!("EFFECT: {} recovered", racer_key),
            Notification::PhaseAdvance { .. } => {}
            Notification::RacerFinished {
                racer_key,
                position,
                finish_time,
            } => println!(
                "FINISH: {} crossed the line in position {} after {:.2}s",
                racer_key, position, finish_time
            ),
            Notification::RaceFinished { winner, .. } => {
                println!("FINISH: Race over, {} wins!", winner.display_name);
                break;
            }
        }
    }
}
