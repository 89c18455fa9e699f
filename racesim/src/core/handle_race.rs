use crate::core::race::Race;
use crate::interfaces::observer::Notification;
use crate::post::race_result::RaceResult;
use crate::pre::read_sim_pars::SimPars;
use anyhow::Context;
use flume::Sender;
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// handle_race creates and simulates a race on the basis of the inserted parameters, and returns
/// the results for post-processing. timestep_size is given in milliseconds. If a sender is
/// inserted, the race is simulated in real-time (scaled by realtime_factor) and all notifications
/// are forwarded to it.
pub fn handle_race(
    sim_pars: &SimPars,
    seed: u64,
    timestep_size: f64,
    print_debug: bool,
    tx: Option<&Sender<Notification>>,
    realtime_factor: f64,
) -> anyhow::Result<RaceResult> {
    // create and initialize the race
    let mut race = Race::with_seed(sim_pars.sim_consts.to_owned(), seed)
        .context("Invalid simulation constants!")?;

    race.initialize(
        sim_pars.race_pars.racers.to_owned(),
        sim_pars.race_pars.duration_minutes,
    )
    .context("Failed to initialize race!")?;

    // check if sender was inserted -> in that case use real-time simulation
    let sim_realtime = tx.is_some();

    if let Some(tx) = tx {
        race.add_observer(tx.to_owned());
    }

    race.start();

    // simulate the race -> execute time steps until the race is finished (termination is
    // guaranteed by the race time out)
    if !sim_realtime {
        // NORMAL SIMULATION -----------------------------------------------------------------------
        while !race.is_finished() {
            race.tick(timestep_size);
        }
    } else {
        // REAL-TIME SIMULATION --------------------------------------------------------------------
        let mut t_race_update_print = 0.0;

        while !race.is_finished() {
            let t_start = Instant::now();

            race.tick(timestep_size);

            // print status (with a maximum of 1 Hz)
            if race.cur_racetime > t_race_update_print + 0.9999 {
                info!(
                    "Simulating... Current race time is {:.3}s, current phase is {}",
                    race.cur_racetime,
                    race.get_cur_phase() + 1
                );
                t_race_update_print = race.cur_racetime;
            }

            // sleep until time step is finished in real-time as well (calculation in ms)
            let t_sleep =
                (timestep_size / realtime_factor) as i64 - t_start.elapsed().as_millis() as i64;

            if t_sleep > 0 {
                sleep(Duration::from_millis(t_sleep as u64));
            } else {
                warn!("Could not keep up with real-time!")
            }
        }
    }

    // print debug information if indicated
    if print_debug {
        let event_log = race.get_event_log();
        debug!(
            "Recorded {} events ({} dropped from the raw log), finish threshold was {}",
            event_log.get_no_recorded(),
            event_log.get_no_dropped(),
            race.get_finish_threshold()
        );
    }

    // return race result
    let mut race_result = race.get_race_result();
    race_result.name = sim_pars.race_pars.name.to_owned();

    Ok(race_result)
}
