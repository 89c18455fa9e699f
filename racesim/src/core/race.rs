use crate::core::effects::{Effect, EffectKind, EffectSource, EffectSystem};
use crate::core::error::ConfigError;
use crate::core::event_log::{EventKind, EventLog};
use crate::core::progress::{ProgressState, MAX_PROGRESS};
use crate::core::racer::Racer;
use crate::core::regulation::{Correction, RegulationController};
use crate::interfaces::observer::{Notification, Observers, RaceState, RacerStanding};
use crate::post::race_result::{RaceResult, RankingEntry};
use crate::post::replay::{PhaseAssignment, ReplayBundle, ReplaySettings};
use flume::{Receiver, Sender};
use helpers::general::{argsort, lin_interp, SortOrder};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

// tolerance used for comparisons against accumulated race times
const T_EPS: f64 = 1e-9;

/// * `name` - Name of the race, only used for printing
/// * `duration_minutes` - (min) Race duration, the race times out afterwards
/// * `racers` - List of participants, their order is the tie-break order
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RacePars {
    #[serde(default)]
    pub name: String,
    pub duration_minutes: f64,
    pub racers: Vec<Racer>,
}

/// SimConstants contains all tunable constants of the simulation. Ranges are given as
/// [min, max] and sampled uniformly.
///
/// * `finish_fraction` - Fraction of racers that must finish before the race ends early
/// * `phase_titles` - Names of the phases, their number determines the number of phases
/// * `speed_factor_range` - Individual speed factor, drawn per racer and time step
/// * `human_bonus` - Speed factor applied to the human-controlled racer
/// * `global_speed_multiplier` - Speed factor applied to all racers
/// * `effects_enabled` - Assign boosts and stumbles at phase transitions
/// * `effect_fraction_range` - Fraction of unfinished racers affected per phase transition
/// * `boost_probability` - Probability that an affected racer receives a boost
/// * `boost_multiplier_range` - Speed multiplier of phase boosts
/// * `boost_duration_range` - (s) Duration of phase boosts
/// * `stumble_duration_range` - (s) Total duration of phase stumbles
/// * `stun_duration_range` - (s) Full stop part at the beginning of a stumble
/// * `regulation_enabled` - Activate the pacing regulation
/// * `regulation_tolerance` - Allowed deviation between actual and expected progress ratio
/// * `regulation_boost_multiplier` - Speed multiplier of corrective boosts
/// * `regulation_stumble_multiplier` - Speed multiplier of corrective slowdowns
/// * `regulation_effect_duration` - (s) Duration of corrective effects
/// * `live_log_capacity` - Number of events kept in the live log
/// * `raw_log_capacity` - Number of events kept in the raw log
/// * `max_state_update_frequency` - (Hz) Maximum rate of state notifications (race time)
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimConstants {
    pub finish_fraction: f64,
    pub phase_titles: Vec<String>,
    pub speed_factor_range: [f64; 2],
    pub human_bonus: f64,
    pub global_speed_multiplier: f64,
    pub effects_enabled: bool,
    pub effect_fraction_range: [f64; 2],
    pub boost_probability: f64,
    pub boost_multiplier_range: [f64; 2],
    pub boost_duration_range: [f64; 2],
    pub stumble_duration_range: [f64; 2],
    pub stun_duration_range: [f64; 2],
    pub regulation_enabled: bool,
    pub regulation_tolerance: f64,
    pub regulation_boost_multiplier: f64,
    pub regulation_stumble_multiplier: f64,
    pub regulation_effect_duration: f64,
    pub live_log_capacity: usize,
    pub raw_log_capacity: usize,
    pub max_state_update_frequency: f64,
}

impl Default for SimConstants {
    fn default() -> Self {
        SimConstants {
            finish_fraction: 0.4,
            phase_titles: [
                "Starting Gate",
                "Opening Sprint",
                "First Bend",
                "Back Straight",
                "Hill Climb",
                "Halfway Mark",
                "River Crossing",
                "Final Bend",
                "Home Straight",
                "Photo Finish",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            speed_factor_range: [0.67, 1.6],
            human_bonus: 1.05,
            global_speed_multiplier: 1.0,
            effects_enabled: true,
            effect_fraction_range: [0.35, 0.5],
            boost_probability: 0.58,
            boost_multiplier_range: [1.35, 2.5],
            boost_duration_range: [2.0, 5.0],
            stumble_duration_range: [2.0, 4.0],
            stun_duration_range: [0.8, 1.6],
            regulation_enabled: true,
            regulation_tolerance: 0.2,
            regulation_boost_multiplier: 1.25,
            regulation_stumble_multiplier: 0.75,
            regulation_effect_duration: 1.5,
            live_log_capacity: 50,
            raw_log_capacity: 800,
            max_state_update_frequency: 10.0,
        }
    }
}

impl SimConstants {
    /// validate assures that all constants are within their valid ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(name: &'static str, reason: String) -> Result<(), ConfigError> {
            Err(ConfigError::InvalidConstant { name, reason })
        }

        fn check_range(name: &'static str, range: [f64; 2], lower: f64) -> Result<(), ConfigError> {
            if !(range[0].is_finite() && range[1].is_finite()) || range[0] < lower || range[0] > range[1]
            {
                return invalid(
                    name,
                    format!(
                        "[{}, {}] must be finite, ordered and not below {}",
                        range[0], range[1], lower
                    ),
                );
            }
            Ok(())
        }

        if !(self.finish_fraction > 0.0 && self.finish_fraction <= 1.0) {
            return invalid(
                "finish_fraction",
                format!("{} is not within (0.0, 1.0]", self.finish_fraction),
            );
        }
        if self.phase_titles.is_empty() {
            return invalid("phase_titles", "at least one phase is required".to_owned());
        }
        check_range("speed_factor_range", self.speed_factor_range, 0.0)?;
        if !(self.human_bonus.is_finite() && self.human_bonus > 0.0) {
            return invalid("human_bonus", format!("{} must be positive", self.human_bonus));
        }
        if !(self.global_speed_multiplier.is_finite() && self.global_speed_multiplier > 0.0) {
            return invalid(
                "global_speed_multiplier",
                format!("{} must be positive", self.global_speed_multiplier),
            );
        }
        check_range("effect_fraction_range", self.effect_fraction_range, 0.0)?;
        if self.effect_fraction_range[1] > 1.0 {
            return invalid(
                "effect_fraction_range",
                "fractions must not exceed 1.0".to_owned(),
            );
        }
        if !(0.0..=1.0).contains(&self.boost_probability) {
            return invalid(
                "boost_probability",
                format!("{} is not within [0.0, 1.0]", self.boost_probability),
            );
        }
        check_range("boost_multiplier_range", self.boost_multiplier_range, 1.0)?;
        check_range("boost_duration_range", self.boost_duration_range, 0.0)?;
        check_range("stumble_duration_range", self.stumble_duration_range, 0.0)?;
        check_range("stun_duration_range", self.stun_duration_range, 0.0)?;
        if !(self.regulation_tolerance.is_finite() && self.regulation_tolerance >= 0.0) {
            return invalid(
                "regulation_tolerance",
                format!("{} must not be negative", self.regulation_tolerance),
            );
        }
        if !(self.regulation_boost_multiplier.is_finite() && self.regulation_boost_multiplier >= 1.0)
        {
            return invalid(
                "regulation_boost_multiplier",
                format!("{} must be at least 1.0", self.regulation_boost_multiplier),
            );
        }
        if !(self.regulation_stumble_multiplier > 0.0 && self.regulation_stumble_multiplier <= 1.0)
        {
            return invalid(
                "regulation_stumble_multiplier",
                format!("{} is not within (0.0, 1.0]", self.regulation_stumble_multiplier),
            );
        }
        if !(self.regulation_effect_duration.is_finite() && self.regulation_effect_duration > 0.0) {
            return invalid(
                "regulation_effect_duration",
                format!("{} must be positive", self.regulation_effect_duration),
            );
        }
        if !(self.max_state_update_frequency.is_finite() && self.max_state_update_frequency > 0.0)
        {
            return invalid(
                "max_state_update_frequency",
                format!("{} must be positive", self.max_state_update_frequency),
            );
        }

        Ok(())
    }

    pub fn get_no_phases(&self) -> usize {
        self.phase_titles.len()
    }

    /// calc_finish_threshold returns the number of finished racers that ends the race.
    pub fn calc_finish_threshold(&self, no_racers: usize) -> usize {
        ((no_racers as f64 * self.finish_fraction).ceil() as usize).clamp(1, no_racers.max(1))
    }
}

/// Race status. Transitions are one-directional: Waiting -> Countdown -> Racing -> Finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceStatus {
    Waiting,
    Countdown,
    Racing,
    Finished,
}

impl Default for RaceStatus {
    fn default() -> Self {
        RaceStatus::Waiting
    }
}

/// Race simulates a time-bounded race of several racers. The race is driven from outside by
/// calling `tick` with the elapsed wall-clock time. The random source is injected so that races
/// can be reproduced.
#[derive(Debug)]
pub struct Race<R: Rng = ChaCha8Rng> {
    sim_consts: SimConstants,
    seed: Option<u64>,
    rng: R,
    status: RaceStatus,
    pub cur_racetime: f64,
    duration: f64,
    cur_phase: usize,
    finish_threshold: usize,
    no_finished: usize,
    started_at: Option<SystemTime>,
    racers_list: Vec<Racer>,
    progress_states: Vec<ProgressState>,
    positions: Vec<usize>,
    rankings: Vec<usize>,
    effects: EffectSystem,
    regulator: RegulationController,
    cur_correction: Correction,
    event_log: EventLog,
    phase_assignments: Vec<PhaseAssignment>,
    observers: Observers,
}

impl Race<ChaCha8Rng> {
    /// with_seed creates a race that draws its random numbers from a ChaCha8 generator seeded
    /// with the inserted seed.
    pub fn with_seed(sim_consts: SimConstants, seed: u64) -> Result<Race<ChaCha8Rng>, ConfigError> {
        let mut race = Race::new(sim_consts, ChaCha8Rng::seed_from_u64(seed))?;
        race.seed = Some(seed);
        Ok(race)
    }
}

impl<R: Rng> Race<R> {
    pub fn new(sim_consts: SimConstants, rng: R) -> Result<Race<R>, ConfigError> {
        sim_consts.validate()?;

        Ok(Race {
            regulator: RegulationController::new(&sim_consts),
            event_log: EventLog::new(sim_consts.raw_log_capacity, sim_consts.live_log_capacity),
            observers: Observers::new(sim_consts.max_state_update_frequency),
            sim_consts,
            seed: None,
            rng,
            status: RaceStatus::Waiting,
            cur_racetime: 0.0,
            duration: 0.0,
            cur_phase: 0,
            finish_threshold: 0,
            no_finished: 0,
            started_at: None,
            racers_list: Vec::new(),
            progress_states: Vec::new(),
            positions: Vec::new(),
            rankings: Vec::new(),
            effects: EffectSystem::default(),
            cur_correction: Correction::None,
            phase_assignments: Vec::new(),
        })
    }

    // ---------------------------------------------------------------------------------------------
    // LIFECYCLE -----------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// initialize validates the inserted racers and duration, resets all race state and sets the
    /// race into the countdown status. On error, the race is left untouched.
    pub fn initialize(&mut self, racers: Vec<Racer>, duration_minutes: f64) -> Result<(), ConfigError> {
        if racers.is_empty() {
            return Err(ConfigError::NoRacers);
        }

        if !(duration_minutes.is_finite() && duration_minutes > 0.0) {
            return Err(ConfigError::InvalidDuration { duration_minutes });
        }

        let mut keys = HashSet::with_capacity(racers.len());

        for racer in racers.iter() {
            if !keys.insert(racer.key.as_str()) {
                return Err(ConfigError::DuplicateRacerKey {
                    key: racer.key.to_owned(),
                });
            }
        }

        let no_racers = racers.len();

        self.status = RaceStatus::Countdown;
        self.cur_racetime = 0.0;
        self.duration = duration_minutes * 60.0;
        self.cur_phase = 0;
        self.finish_threshold = self.sim_consts.calc_finish_threshold(no_racers);
        self.no_finished = 0;
        self.started_at = None;
        self.progress_states = vec![ProgressState::new(); no_racers];
        self.positions = (0..no_racers).collect();
        self.rankings = (0..no_racers).collect();
        self.racers_list = racers;
        self.effects.reset(no_racers);
        self.cur_correction = Correction::None;
        self.event_log.clear();
        self.phase_assignments.clear();
        self.observers.reset_throttle();

        self.event_log.record(
            0.0,
            EventKind::SystemInit,
            None,
            0,
            format!(
                "{} racers, {:.1} min, race ends after {} finishers",
                no_racers, duration_minutes, self.finish_threshold
            ),
            None,
        );

        info!(
            no_racers,
            duration_minutes,
            finish_threshold = self.finish_threshold,
            "race initialized"
        );

        Ok(())
    }

    /// start switches the race from Waiting/Countdown to Racing. It is a no-op otherwise.
    pub fn start(&mut self) {
        if !matches!(self.status, RaceStatus::Waiting | RaceStatus::Countdown)
            || self.racers_list.is_empty()
        {
            return;
        }

        self.status = RaceStatus::Racing;
        self.started_at = Some(SystemTime::now());
        self.phase_assignments.push(PhaseAssignment::new(
            0,
            &self.sim_consts.phase_titles[0],
            0.0,
        ));

        self.event_log.record(
            0.0,
            EventKind::RaceStart,
            None,
            0,
            format!("Race started: {}", self.sim_consts.phase_titles[0]),
            None,
        );

        info!("race started");
        self.push_state(0.0);
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHOD ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// The method simulates one time step of delta_ms milliseconds and returns the race status
    /// afterwards. It is a no-op unless the race is running. Execution order:
    /// 1. Increment the race time and remove expired effects.
    /// 2. Handle a phase transition (phase change event and phase effects).
    /// 3. Update the progress of every racer that has not finished yet.
    /// 4. Update the live positions and rankings.
    /// 5. Apply the pacing regulation.
    /// 6. Check if the race is over (finish threshold reached or time out).
    pub fn tick(&mut self, delta_ms: f64) -> RaceStatus {
        if !matches!(self.status, RaceStatus::Racing) {
            return self.status;
        }

        if !(delta_ms.is_finite() && delta_ms > 0.0) {
            warn!(delta_ms, "ignoring time step with invalid size");
            return self.status;
        }

        // increment discretization variable
        let timestep_size = delta_ms / 1000.0;
        self.cur_racetime += timestep_size;
        let now = self.cur_racetime;

        self.handle_effect_expiry(now);

        let phase = self.calc_phase(now);
        if phase != self.cur_phase {
            self.handle_phase_transition(phase, now);
        }

        self.update_race_progress(timestep_size, now);
        self.update_positions();

        if self.sim_consts.regulation_enabled {
            self.handle_regulation(now);
        }

        self.handle_race_end(now);

        if matches!(self.status, RaceStatus::Racing) && self.observers.state_update_due(now) {
            self.push_state(now);
        }

        self.status
    }

    // ---------------------------------------------------------------------------------------------
    // RACE SIMULATOR PARTS ------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// The method returns the phase index for the inserted race time. Phases slice the race
    /// duration into equal parts, the last phase lasts until the race is over.
    fn calc_phase(&self, racetime: f64) -> usize {
        let no_phases = self.sim_consts.get_no_phases();
        let phase_length = self.duration / no_phases as f64;
        let phase = ((racetime + T_EPS) / phase_length).floor();

        (phase.max(0.0) as usize).min(no_phases - 1)
    }

    /// The method removes expired effects and informs the observers about them.
    fn handle_effect_expiry(&mut self, now: f64) {
        for idx in self.effects.expire(now) {
            let key = self.racers_list[idx].key.to_owned();

            self.event_log.record(
                now,
                EventKind::EffectEnded,
                Some(&key),
                self.cur_phase,
                format!("{} is back to normal pace", self.racers_list[idx].display_name),
                None,
            );
            self.observers.notify(Notification::EffectEnd { racer_key: key });
        }
    }

    /// The method handles the transition into a new phase. All racers are informed about the new
    /// phase and a random subset of the unfinished racers receives a boost or a stumble.
    fn handle_phase_transition(&mut self, phase: usize, now: f64) {
        self.cur_phase = phase;
        let title = self.sim_consts.phase_titles[phase].to_owned();

        self.event_log.record(
            now,
            EventKind::PhaseChange,
            None,
            phase,
            format!("Phase {}/{}: {}", phase + 1, self.sim_consts.get_no_phases(), title),
            None,
        );
        debug!(phase, title = %title, racetime = now, "phase transition");

        for (racer, progress_state) in self.racers_list.iter().zip(self.progress_states.iter_mut()) {
            progress_state.last_phase_seen = phase;
            self.observers.notify(Notification::PhaseAdvance {
                racer_key: racer.key.to_owned(),
                phase_index: phase,
            });
        }

        let mut phase_assignment = PhaseAssignment::new(phase, &title, now);

        if self.sim_consts.effects_enabled {
            let candidates = self.get_unfinished_idxs();
            let assigned = self.effects.assign_phase_effects(
                &candidates,
                now,
                &self.sim_consts,
                &mut self.rng,
            );

            for (idx, effect) in assigned {
                let key = self.racers_list[idx].key.to_owned();

                match effect.kind {
                    EffectKind::Boost => phase_assignment.boosted.push(key.to_owned()),
                    EffectKind::Stumble => phase_assignment.stumbled.push(key.to_owned()),
                }

                self.announce_effect(idx, &effect, now);
            }
        }

        self.phase_assignments.push(phase_assignment);
    }

    /// The method updates the race progress of all unfinished racers for the current time step
    /// and handles racers crossing the finish line.
    fn update_race_progress(&mut self, timestep_size: f64, now: f64) {
        let avg_required_speed = MAX_PROGRESS / self.duration;
        let [speed_factor_min, speed_factor_max] = self.sim_consts.speed_factor_range;
        let mut crossed: Vec<(usize, f64)> = Vec::new();

        for idx in 0..self.racers_list.len() {
            if self.progress_states[idx].is_finished() {
                continue;
            }

            let effect = self.effects.resolve(idx, now);

            let progress_delta = if effect.stunned {
                0.0
            } else {
                let speed_factor = self.rng.gen_range(speed_factor_min..=speed_factor_max);
                let human_bonus = if self.racers_list[idx].is_human {
                    self.sim_consts.human_bonus
                } else {
                    1.0
                };

                avg_required_speed
                    * speed_factor
                    * human_bonus
                    * self.sim_consts.global_speed_multiplier
                    * effect.multiplier
                    * timestep_size
            };

            if self.progress_states[idx].update_progress(progress_delta) {
                // determine the time at which the finish line was crossed within this time step
                let (progress_prev, _) = self.progress_states[idx].get_progresses();
                let finish_time = lin_interp(
                    MAX_PROGRESS,
                    &[progress_prev, progress_prev + progress_delta],
                    &[now - timestep_size, now],
                );
                crossed.push((idx, finish_time));
            }
        }

        // racers crossing within the same time step are handled in the order of their finish times
        crossed.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        for (idx, finish_time) in crossed {
            self.progress_states[idx].set_finished(finish_time);
            self.end_effect(idx, now);
            self.no_finished += 1;

            let racer = &self.racers_list[idx];
            self.event_log.record(
                now,
                EventKind::PlayerFinished,
                Some(&racer.key),
                self.cur_phase,
                format!(
                    "{} finished in position {} after {:.2}s",
                    racer.display_name, self.no_finished, finish_time
                ),
                None,
            );
            info!(racer = %racer.key, position = self.no_finished, finish_time, "racer finished");

            self.observers.notify(Notification::RacerFinished {
                racer_key: racer.key.to_owned(),
                position: self.no_finished,
                finish_time,
            });
        }
    }

    /// The method sorts the racers by their progress (live positions) and updates the rankings.
    fn update_positions(&mut self) {
        let progresses: Vec<f64> = self
            .progress_states
            .iter()
            .map(|x| x.get_progress())
            .collect();

        self.positions = argsort(&progresses, SortOrder::Descending);
        self.rankings = self.calc_rankings();
    }

    /// The method returns the racer indices in ranking order: racers that crossed the finish line
    /// sorted by ascending finish time, followed by all other racers sorted by descending
    /// progress. Ties keep the original racer order.
    fn calc_rankings(&self) -> Vec<usize> {
        let (finished, unfinished): (Vec<usize>, Vec<usize>) = (0..self.racers_list.len())
            .partition(|&idx| self.progress_states[idx].crossed_line());

        let finish_times: Vec<f64> = finished
            .iter()
            .map(|&idx| self.progress_states[idx].get_finish_time().unwrap_or(f64::INFINITY))
            .collect();
        let progresses: Vec<f64> = unfinished
            .iter()
            .map(|&idx| self.progress_states[idx].get_ranking_progress())
            .collect();

        argsort(&finish_times, SortOrder::Ascending)
            .into_iter()
            .map(|i| finished[i])
            .chain(
                argsort(&progresses, SortOrder::Descending)
                    .into_iter()
                    .map(|i| unfinished[i]),
            )
            .collect()
    }

    /// The method applies the pacing regulation. The actual progress ratio is the mean progress
    /// of all racers, the expected progress ratio is the elapsed share of the race duration.
    fn handle_regulation(&mut self, now: f64) {
        let actual_ratio = self.calc_race_progress() / MAX_PROGRESS;
        let expected_ratio = (now / self.duration).min(1.0);
        let candidates = self.get_unfinished_idxs();

        let (correction, assigned) = self.regulator.regulate(
            &mut self.effects,
            &candidates,
            actual_ratio,
            expected_ratio,
            now,
        );

        // one regulation event per application and per change of the correction
        if correction != self.cur_correction || !assigned.is_empty() {
            let description = match correction {
                Correction::None => "Pace back on schedule".to_owned(),
                Correction::Accelerate => format!(
                    "Field trails schedule ({:.0}% vs {:.0}%), speeding up",
                    actual_ratio * 100.0,
                    expected_ratio * 100.0
                ),
                Correction::Decelerate => format!(
                    "Field leads schedule ({:.0}% vs {:.0}%), slowing down",
                    actual_ratio * 100.0,
                    expected_ratio * 100.0
                ),
            };

            self.event_log.record(
                now,
                EventKind::SystemRegulation,
                None,
                self.cur_phase,
                description,
                None,
            );
            debug!(
                ?correction,
                actual_ratio,
                expected_ratio,
                no_affected = assigned.len(),
                "regulation applied"
            );
            self.cur_correction = correction;
        }

        for (idx, effect) in assigned {
            self.announce_effect(idx, &effect, now);
        }
    }

    /// The method ends the race if enough racers finished or if the race duration is over. In
    /// case of a time out, the remaining racers are forced onto the finish line after the final
    /// ranking was determined.
    fn handle_race_end(&mut self, now: f64) {
        let timed_out = now >= self.duration - T_EPS;

        if self.no_finished < self.finish_threshold && !timed_out {
            return;
        }

        self.rankings = self.calc_rankings();

        if timed_out {
            let unfinished = self.get_unfinished_idxs();

            if !unfinished.is_empty() {
                for &idx in unfinished.iter() {
                    self.progress_states[idx].force_finish();
                    self.end_effect(idx, now);
                    self.no_finished += 1;
                }

                self.event_log.record(
                    now,
                    EventKind::SystemTimeout,
                    None,
                    self.cur_phase,
                    format!("Time is up, {} racers moved to the finish line", unfinished.len()),
                    None,
                );
                warn!(no_unfinished = unfinished.len(), "race timed out");
            }
        }

        self.status = RaceStatus::Finished;
        self.cur_correction = Correction::None;

        let winner = self.racers_list[self.rankings[0]].to_owned();
        self.event_log.record(
            now,
            EventKind::RaceEnd,
            Some(&winner.key),
            self.cur_phase,
            format!("{} wins after {:.2}s", winner.display_name, now),
            None,
        );
        info!(winner = %winner.key, racetime = now, timed_out, "race finished");

        self.push_state(now);
        self.observers.notify(Notification::RaceFinished {
            winner,
            rankings: self.get_ranked_racers(),
        });
    }

    // ---------------------------------------------------------------------------------------------
    // METHODS (HELPERS) ---------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// announce_effect logs a newly assigned effect and informs the observers.
    fn announce_effect(&mut self, idx: usize, effect: &Effect, now: f64) {
        let racer = &self.racers_list[idx];

        let (kind, description) = match (effect.kind, effect.stun_until) {
            (EffectKind::Boost, _) => (
                EventKind::BoostSpeed,
                format!("{} speeds up", racer.display_name),
            ),
            (EffectKind::Stumble, Some(_)) => (
                EventKind::Stumble,
                format!("{} stumbles", racer.display_name),
            ),
            (EffectKind::Stumble, None) => (
                EventKind::SlowSpeed,
                format!("{} slows down", racer.display_name),
            ),
        };

        let summary = match effect.source {
            EffectSource::Phase => effect.summary(),
            EffectSource::Regulation => format!("regulation: {}", effect.summary()),
            EffectSource::External => format!("external: {}", effect.summary()),
        };

        self.event_log.record(
            now,
            kind,
            Some(&racer.key),
            self.cur_phase,
            description,
            Some(summary),
        );

        self.observers.notify(Notification::EffectBegin {
            racer_key: racer.key.to_owned(),
            is_positive: effect.is_positive(),
            duration: effect.duration,
            stun_duration: effect.stun_duration(),
        });
    }

    /// end_effect removes the effect of a racer that finished and informs the observers if an
    /// effect was still attached.
    fn end_effect(&mut self, idx: usize, now: f64) {
        if self.effects.clear(idx).is_none() {
            return;
        }

        let key = self.racers_list[idx].key.to_owned();

        self.event_log.record(
            now,
            EventKind::EffectEnded,
            Some(&key),
            self.cur_phase,
            format!("{} finished, effect removed", self.racers_list[idx].display_name),
            None,
        );
        self.observers.notify(Notification::EffectEnd { racer_key: key });
    }

    fn push_state(&mut self, now: f64) {
        if self.observers.is_empty() {
            return;
        }

        let race_state = self.get_state();
        self.observers.notify(Notification::StateChanged(race_state));
        self.observers.mark_state_update(now);
    }

    fn get_unfinished_idxs(&self) -> Vec<usize> {
        (0..self.progress_states.len())
            .filter(|&idx| !self.progress_states[idx].is_finished())
            .collect()
    }

    /// calc_race_progress returns the mean progress of all racers in percent.
    fn calc_race_progress(&self) -> f64 {
        if self.progress_states.is_empty() {
            return 0.0;
        }

        self.progress_states
            .iter()
            .map(|x| x.get_progress())
            .sum::<f64>()
            / self.progress_states.len() as f64
    }

    fn get_ranked_racers(&self) -> Vec<Racer> {
        self.rankings
            .iter()
            .map(|&idx| self.racers_list[idx].to_owned())
            .collect()
    }

    fn get_racer_idx(&self, racer_key: &str) -> Option<usize> {
        self.racers_list.iter().position(|r| r.key == racer_key)
    }

    // ---------------------------------------------------------------------------------------------
    // PUBLIC INTERFACE ----------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// subscribe creates a new notification channel. Notifications are dropped silently once the
    /// receiver is dropped.
    pub fn subscribe(&mut self) -> Receiver<Notification> {
        self.observers.subscribe()
    }

    /// add_observer registers a caller-owned channel for notifications.
    pub fn add_observer(&mut self, tx: Sender<Notification>) {
        self.observers.add(tx)
    }

    /// apply_effect assigns an effect to a racer from outside (e.g. by a host-side power-up).
    /// The effect replaces any active effect of the racer. Returns false if the race is not
    /// running, the racer is unknown or already finished.
    pub fn apply_effect(&mut self, racer_key: &str, effect: Effect) -> bool {
        if !matches!(self.status, RaceStatus::Racing) {
            return false;
        }

        let idx = match self.get_racer_idx(racer_key) {
            Some(idx) if !self.progress_states[idx].is_finished() => idx,
            _ => return false,
        };

        let now = self.cur_racetime;
        self.effects.assign(idx, effect.clone());
        self.announce_effect(idx, &effect, now);
        true
    }

    /// get_state returns a snapshot of the current race state.
    pub fn get_state(&self) -> RaceState {
        let now = self.cur_racetime;

        let standings = self
            .positions
            .iter()
            .enumerate()
            .map(|(i, &idx)| {
                let progress_state = &self.progress_states[idx];
                let effect = self.effects.get_active_effect(idx, now);

                RacerStanding {
                    racer: self.racers_list[idx].to_owned(),
                    position: i + 1,
                    progress: progress_state.get_progress(),
                    finished: progress_state.is_finished(),
                    finish_time: progress_state.get_finish_time(),
                    effect: effect.map(|e| e.kind),
                    stunned: effect.map_or(false, |e| e.is_stunned(now)),
                }
            })
            .collect();

        let winner = if matches!(self.status, RaceStatus::Finished) {
            self.rankings
                .first()
                .map(|&idx| self.racers_list[idx].to_owned())
        } else {
            None
        };

        RaceState {
            status: self.status,
            elapsed: now,
            duration: self.duration,
            remaining: (self.duration - now).max(0.0),
            current_phase: self.cur_phase,
            phase_title: self
                .sim_consts
                .phase_titles
                .get(self.cur_phase)
                .cloned()
                .unwrap_or_default(),
            time_progress: if self.duration > 0.0 {
                (now / self.duration * MAX_PROGRESS).min(MAX_PROGRESS)
            } else {
                0.0
            },
            race_progress: self.calc_race_progress(),
            standings,
            winner,
            rankings: self.get_ranked_racers(),
            finished_count: self.no_finished,
            finish_threshold: self.finish_threshold,
            events: self.event_log.get_live_events(),
        }
    }

    /// export_replay returns a bundle with everything required to analyze the race afterwards.
    pub fn export_replay(&self) -> ReplayBundle {
        ReplayBundle {
            settings: ReplaySettings {
                seed: self.seed,
                duration_minutes: self.duration / 60.0,
                finish_threshold: self.finish_threshold,
                started_at_unix_ms: self
                    .started_at
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_millis() as u64),
                sim_consts: self.sim_consts.to_owned(),
            },
            racers: self.racers_list.to_owned(),
            events: self.event_log.get_raw_events(),
            phase_assignments: self.phase_assignments.to_owned(),
            rankings: self
                .rankings
                .iter()
                .map(|&idx| self.racers_list[idx].key.to_owned())
                .collect(),
            winner: if matches!(self.status, RaceStatus::Finished) {
                self.rankings
                    .first()
                    .map(|&idx| self.racers_list[idx].key.to_owned())
            } else {
                None
            },
        }
    }

    /// get_race_result returns a race result struct of the race.
    pub fn get_race_result(&self) -> RaceResult {
        RaceResult {
            name: String::new(),
            seed: self.seed,
            race_time: self.cur_racetime.min(self.duration),
            duration: self.duration,
            timed_out: self.progress_states.iter().any(|x| x.is_timed_out()),
            rankings: self
                .rankings
                .iter()
                .enumerate()
                .map(|(i, &idx)| {
                    let progress_state = &self.progress_states[idx];
                    RankingEntry {
                        position: i + 1,
                        racer: self.racers_list[idx].to_owned(),
                        finish_time: progress_state.get_finish_time(),
                        progress: progress_state.get_ranking_progress(),
                        timed_out: progress_state.is_timed_out(),
                    }
                })
                .collect(),
            replay: self.export_replay(),
        }
    }

    pub fn get_status(&self) -> RaceStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, RaceStatus::Finished)
    }

    pub fn get_duration(&self) -> f64 {
        self.duration
    }

    pub fn get_finish_threshold(&self) -> usize {
        self.finish_threshold
    }

    pub fn get_no_finished(&self) -> usize {
        self.no_finished
    }

    pub fn get_cur_phase(&self) -> usize {
        self.cur_phase
    }

    pub fn get_sim_consts(&self) -> &SimConstants {
        &self.sim_consts
    }

    pub fn get_racers(&self) -> &[Racer] {
        &self.racers_list
    }

    /// get_progress_state returns the progress state of a racer (by key).
    pub fn get_progress_state(&self, racer_key: &str) -> Option<&ProgressState> {
        self.get_racer_idx(racer_key)
            .map(|idx| &self.progress_states[idx])
    }

    /// get_active_effect returns the currently active effect of a racer (by key).
    pub fn get_active_effect(&self, racer_key: &str) -> Option<&Effect> {
        self.get_racer_idx(racer_key)
            .and_then(|idx| self.effects.get_active_effect(idx, self.cur_racetime))
    }

    pub fn get_event_log(&self) -> &EventLog {
        &self.event_log
    }
}
