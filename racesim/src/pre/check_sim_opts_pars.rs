use crate::pre::read_sim_pars::SimPars;
use crate::pre::sim_opts::SimOpts;
use anyhow::Context;
use helpers::general::InputValueError;
use std::collections::HashSet;

/// check_sim_opts_pars assures that the inserted options and parameters are within reasonable
/// limits and raises an error if not.
pub fn check_sim_opts_pars(sim_opts: &SimOpts, sim_pars: &SimPars) -> anyhow::Result<()> {
    // PART 1: SIMULATION OPTIONS
    if !(1.0 <= sim_opts.timestep_size && sim_opts.timestep_size <= 1000.0) {
        return Err(InputValueError).context(format!(
            "timestep_size is {:.3}ms, which is not within the reasonable range of [1.0, 1000.0]ms!",
            sim_opts.timestep_size
        ));
    }

    if sim_opts.no_sim_runs < 1 {
        return Err(InputValueError).context(format!(
            "no_sim_runs must be at least equal to one, but is {}!",
            sim_opts.no_sim_runs
        ));
    }

    if sim_opts.live && sim_opts.no_sim_runs != 1 {
        return Err(InputValueError)
            .context("If the live mode is activated, no_sim_runs must be equal to one!");
    }

    if sim_opts.live && !(0.1 <= sim_opts.realtime_factor && sim_opts.realtime_factor <= 100.0) {
        return Err(InputValueError).context(format!(
            "realtime_factor is {:.3}, which is not within the reasonable range of [0.1, 100.0]!",
            sim_opts.realtime_factor
        ));
    }

    // PART 2: SIMULATION PARAMETERS
    check_sim_pars(sim_pars)
}

/// check_sim_pars checks the race parameters and simulation constants of a parameter file.
pub fn check_sim_pars(sim_pars: &SimPars) -> anyhow::Result<()> {
    // RACE ----------------------------------------------------------------------------------------
    let race_pars = &sim_pars.race_pars;

    if !(race_pars.duration_minutes.is_finite() && race_pars.duration_minutes > 0.0) {
        return Err(InputValueError).context(format!(
            "duration_minutes is {}, but must be positive!",
            race_pars.duration_minutes
        ));
    }

    if race_pars.racers.is_empty() {
        return Err(InputValueError).context("There must be at least one racer!");
    }

    // RACERS --------------------------------------------------------------------------------------
    let mut keys = HashSet::with_capacity(race_pars.racers.len());

    for racer in race_pars.racers.iter() {
        if racer.key.is_empty() {
            return Err(InputValueError).context(format!(
                "Racer {} has an empty key!",
                racer.display_name
            ));
        }

        if !keys.insert(racer.key.as_str()) {
            return Err(InputValueError)
                .context(format!("Racer key {} is used more than once!", racer.key));
        }
    }

    if race_pars.racers.iter().filter(|r| r.is_human).count() > 1 {
        return Err(InputValueError).context("At most one racer can be human-controlled!");
    }

    // CONSTANTS -----------------------------------------------------------------------------------
    sim_pars
        .sim_consts
        .validate()
        .context("Simulation constants do not fulfill the requirements!")?;

    Ok(())
}
