pub mod core {
    pub mod effects;
    pub mod error;
    pub mod event_log;
    pub mod handle_race;
    pub mod progress;
    pub mod race;
    pub mod racer;
    pub mod regulation;
}

pub mod interfaces {
    pub mod observer;
}

pub mod post {
    pub mod batch_summary;
    pub mod race_result;
    pub mod replay;
}

pub mod pre {
    pub mod check_sim_opts_pars;
    pub mod read_sim_pars;
    pub mod sim_opts;
}




#[cfg(test)]
mod regulation_tests {
    use crate::core::effects::{Effect, EffectKind, EffectSource, EffectSystem};
    use crate::core::race::SimConstants;
    use crate::core::regulation::{Correction, RegulationController};

    #[test]
    fn test_evaluate_tolerance_band() {
        let sim_consts = SimConstants {
            regulation_tolerance: 0.15,
            ..Default::default()
        };
        let regulator = RegulationController::new(&sim_consts);
        assert_eq!(regulator.get_tolerance(), 0.15);
        assert_eq!(regulator.evaluate(0.5, 0.6), Correction::None);
        assert_eq!(regulator.evaluate(0.3, 0.6), Correction::Accelerate);
        assert_eq!(regulator.evaluate(0.9, 0.6), Correction::Decelerate);
    }

    #[test]
    fn test_regulation_does_not_replace_phase_effects() {
        let regulator = RegulationController::new(&SimConstants::default());
        let mut effects = EffectSystem::new(3);
        effects.assign(0, Effect::stumble(EffectSource::Phase, 0.0, 3.0, 2.0));
        effects.assign(1, Effect::boost(EffectSource::Phase, 2.0, 0.0, 3.0));

        let (correction, assigned) = regulator.regulate(&mut effects, &[0, 1, 2], 0.1, 0.5, 1.0);

        assert_eq!(correction, Correction::Accelerate);
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].0, 2);
        assert_eq!(effects.get_effect(0).map(|e| e.source), Some(EffectSource::Phase));
        assert!(effects.resolve(0, 1.0).stunned);

        // a phase boost is kept while the field is slowed down
        let (correction, assigned) = regulator.regulate(&mut effects, &[0, 1, 2], 0.9, 0.5, 1.2);

        assert_eq!(correction, Correction::Decelerate);
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].0, 2);
        assert_eq!(effects.get_effect(1).map(|e| e.source), Some(EffectSource::Phase));
        assert!(effects.get_effect(1).unwrap().is_positive());
    }

    #[test]
    fn test_regulation_same_direction_is_not_stacked() {
        let regulator = RegulationController::new(&SimConstants::default());
        let mut effects = EffectSystem::new(2);

        let (_, first) = regulator.regulate(&mut effects, &[0, 1], 0.9, 0.5, 1.0);
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|(_, e)| e.kind == EffectKind::Stumble && e.stun_until.is_none()));

        let (_, second) = regulator.regulate(&mut effects, &[0, 1], 0.9, 0.5, 1.5);
        assert!(second.is_empty());

        // opposite direction replaces the corrective slowdown
        let (_, third) = regulator.regulate(&mut effects, &[0, 1], 0.1, 0.5, 2.0);
        assert_eq!(third.len(), 2);
        assert!(effects.get_effect(0).unwrap().is_positive());
    }
}


#[cfg(test)]
mod race_tests {
    use crate::core::effects::{Effect, EffectSource};
    use crate::core::error::ConfigError;
    use crate::core::event_log::EventKind;
    use crate::core::race::{Race, RaceStatus, SimConstants};
    use crate::core::racer::Racer;
    use crate::interfaces::observer::Notification;
    use crate::test_utils::{quiet_consts, racers, started_race};
    use approx::assert_ulps_eq;

    #[test]
    fn test_initialize_rejects_empty_racer_list() {
        let mut race = Race::with_seed(SimConstants::default(), 1).unwrap();
        assert_eq!(race.initialize(vec![], 2.0), Err(ConfigError::NoRacers));
        assert_eq!(race.get_status(), RaceStatus::Waiting);

        race.initialize(racers(3), 2.0).unwrap();
        assert_eq!(race.get_status(), RaceStatus::Countdown);
        assert_eq!(race.initialize(vec![], 2.0), Err(ConfigError::NoRacers));
        assert_eq!(race.get_status(), RaceStatus::Countdown);
        assert_eq!(race.get_racers().len(), 3);
    }

    #[test]
    fn test_initialize_rejects_invalid_input() {
        let mut race = Race::with_seed(SimConstants::default(), 1).unwrap();
        assert!(matches!(
            race.initialize(racers(2), 0.0),
            Err(ConfigError::InvalidDuration { .. })
        ));
        assert!(matches!(
            race.initialize(racers(2), f64::NAN),
            Err(ConfigError::InvalidDuration { .. })
        ));

        let duplicates = vec![Racer::new("a", "A", false), Racer::new("a", "B", false)];
        assert_eq!(
            race.initialize(duplicates, 1.0),
            Err(ConfigError::DuplicateRacerKey {
                key: "a".to_owned()
            })
        );
        assert_eq!(race.get_status(), RaceStatus::Waiting);
    }

    #[test]
    fn test_invalid_constants_are_rejected() {
        let sim_consts = SimConstants {
            phase_titles: vec![],
            ..Default::default()
        };
        assert!(matches!(
            Race::with_seed(sim_consts, 1),
            Err(ConfigError::InvalidConstant { name: "phase_titles", .. })
        ));
    }

    #[test]
    fn test_finish_threshold() {
        let sim_consts = SimConstants::default();
        assert_eq!(sim_consts.calc_finish_threshold(1), 1);
        assert_eq!(sim_consts.calc_finish_threshold(2), 1);
        assert_eq!(sim_consts.calc_finish_threshold(5), 2);
        assert_eq!(sim_consts.calc_finish_threshold(8), 4);
        assert_eq!(sim_consts.calc_finish_threshold(10), 4);
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut race = Race::with_seed(quiet_consts(), 5).unwrap();

        // neither start nor tick have an effect before initialization
        race.start();
        assert_eq!(race.tick(100.0), RaceStatus::Waiting);

        race.initialize(racers(2), 1.0).unwrap();
        assert_eq!(race.tick(100.0), RaceStatus::Countdown);
        assert_ulps_eq!(race.cur_racetime, 0.0);

        race.start();
        assert_eq!(race.get_status(), RaceStatus::Racing);
        assert_eq!(race.get_sim_consts(), &quiet_consts());
        assert_eq!(race.tick(100.0), RaceStatus::Racing);

        while race.tick(1000.0) != RaceStatus::Finished {}

        // no resumption after the race is finished
        race.start();
        assert_eq!(race.get_status(), RaceStatus::Finished);
        let racetime = race.cur_racetime;
        race.tick(1000.0);
        assert_ulps_eq!(race.cur_racetime, racetime);
    }

    #[test]
    fn test_single_racer_one_minute() {
        let mut race = started_race(quiet_consts(), 42, 1, 1.0);

        for _ in 0..60 {
            race.tick(1000.0);
        }

        let race_state = race.get_state();
        assert_eq!(race_state.status, RaceStatus::Finished);
        assert_eq!(race_state.finished_count, 1);
        assert_eq!(race_state.rankings, racers(1));
        assert_eq!(race_state.winner, Some(racers(1)[0].to_owned()));
        assert_ulps_eq!(race_state.standings[0].progress, 100.0);
    }

    #[test]
    fn test_perpetually_stunned_racer_only_finishes_by_time_out() {
        let mut race = started_race(quiet_consts(), 42, 1, 1.0);
        let mut no_ticks = 0;

        while !race.is_finished() {
            let now = race.cur_racetime;
            assert!(race.apply_effect("r0", Effect::stumble(EffectSource::External, now, 10.0, 10.0)));
            race.tick(500.0);
            no_ticks += 1;

            if !race.is_finished() {
                assert_ulps_eq!(race.get_progress_state("r0").unwrap().get_progress(), 0.0);
            }
        }

        assert_eq!(no_ticks, 120);
        let progress_state = race.get_progress_state("r0").unwrap();
        assert!(progress_state.is_timed_out());
        assert!(progress_state.get_finish_time().is_none());
        assert_ulps_eq!(progress_state.get_progress(), 100.0);

        let race_result = race.get_race_result();
        assert!(race_result.timed_out);
        assert!(race_result.rankings[0].timed_out);
        assert_eq!(
            race.get_event_log()
                .get_raw_events()
                .iter()
                .filter(|e| e.kind == EventKind::SystemTimeout)
                .count(),
            1
        );
    }

    #[test]
    fn test_race_ends_at_finish_threshold() {
        let mut race = started_race(SimConstants::default(), 9, 10, 1.0);

        while !race.is_finished() {
            let no_finished_before = race.get_no_finished();
            assert!(no_finished_before < race.get_finish_threshold());
            race.tick(50.0);
        }

        let race_state = race.get_state();
        assert_eq!(race_state.finish_threshold, 4);
        assert!(race_state.finished_count >= 4 || race_state.elapsed >= 60.0 - 1e-6);
    }

    #[test]
    fn test_final_ranking_consistency() {
        for seed in 0..10 {
            let mut race = started_race(SimConstants::default(), seed, 8, 0.5);
            while race.tick(100.0) != RaceStatus::Finished {}

            let race_result = race.get_race_result();
            let finish_times: Vec<Option<f64>> =
                race_result.rankings.iter().map(|x| x.finish_time).collect();

            // racers that crossed the line come first, sorted by finish time
            let no_crossed = finish_times.iter().take_while(|x| x.is_some()).count();
            assert!(finish_times[no_crossed..].iter().all(|x| x.is_none()));
            assert!(finish_times[..no_crossed]
                .windows(2)
                .all(|w| w[0].unwrap() <= w[1].unwrap()));

            // all other racers follow by descending progress
            assert!(race_result.rankings[no_crossed..]
                .windows(2)
                .all(|w| w[0].progress >= w[1].progress));

            assert_eq!(race.get_state().winner, Some(race_result.rankings[0].racer.to_owned()));
        }
    }

    #[test]
    fn test_tie_break_by_racer_order() {
        // equal speed factors -> all racers finish in the same time step at the same time
        let sim_consts = SimConstants {
            speed_factor_range: [1.0, 1.0],
            human_bonus: 1.0,
            ..quiet_consts()
        };
        let mut race = started_race(sim_consts, 1, 4, 1.0);

        while race.tick(1000.0) != RaceStatus::Finished {}

        let keys: Vec<String> = race.get_state().rankings.iter().map(|r| r.key.to_owned()).collect();
        assert_eq!(keys, vec!["r0", "r1", "r2", "r3"]);
    }

    #[test]
    fn test_phase_changes_and_effects_are_logged() {
        let mut race = started_race(SimConstants::default(), 17, 6, 1.0);
        let rx = race.subscribe();

        while race.tick(100.0) != RaceStatus::Finished {}

        let events = race.get_event_log().get_raw_events();
        let no_phase_changes = events.iter().filter(|e| e.kind == EventKind::PhaseChange).count();
        assert_eq!(no_phase_changes, race.get_cur_phase());
        assert!(no_phase_changes >= 1);

        let notifications: Vec<Notification> = rx.drain().collect();
        let no_phase_advances = notifications
            .iter()
            .filter(|n| matches!(n, Notification::PhaseAdvance { .. }))
            .count();
        assert_eq!(no_phase_advances, no_phase_changes * 6);

        let no_finished = notifications
            .iter()
            .filter(|n| matches!(n, Notification::RaceFinished { .. }))
            .count();
        assert_eq!(no_finished, 1);

        // every phase transition assigned at least one effect
        let replay = race.export_replay();
        assert_eq!(replay.phase_assignments.len(), no_phase_changes + 1);
        assert!(replay.phase_assignments[1..]
            .iter()
            .all(|x| !x.boosted.is_empty() || !x.stumbled.is_empty()));
    }

    #[test]
    fn test_effect_begin_and_end_notifications() {
        let mut race = started_race(quiet_consts(), 3, 2, 1.0);
        let rx = race.subscribe();

        assert!(race.apply_effect("r1", Effect::boost(EffectSource::External, 2.0, 0.0, 1.0)));
        assert!(!race.apply_effect("unknown", Effect::boost(EffectSource::External, 2.0, 0.0, 1.0)));

        for _ in 0..15 {
            race.tick(100.0);
        }

        let notifications: Vec<Notification> = rx.drain().collect();
        let begins: Vec<&Notification> = notifications
            .iter()
            .filter(|n| matches!(n, Notification::EffectBegin { .. }))
            .collect();
        let ends: Vec<&Notification> = notifications
            .iter()
            .filter(|n| matches!(n, Notification::EffectEnd { .. }))
            .collect();

        assert_eq!(begins.len(), 1);
        assert_eq!(ends.len(), 1);
        assert!(matches!(
            begins[0],
            Notification::EffectBegin { racer_key, is_positive: true, stun_duration: None, .. } if racer_key == "r1"
        ));
        assert!(race.get_active_effect("r1").is_none());
    }

    #[test]
    fn test_state_notifications_are_throttled() {
        let mut race = started_race(quiet_consts(), 3, 3, 1.0);
        let rx = race.subscribe();

        // 10 s of race time with 10 ms time steps
        for _ in 0..1000 {
            race.tick(10.0);
        }

        let no_states = rx
            .drain()
            .filter(|n| matches!(n, Notification::StateChanged(_)))
            .count();
        assert!(no_states <= 101, "{} state notifications", no_states);
        assert!(no_states >= 90, "{} state notifications", no_states);
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let mut race = started_race(SimConstants::default(), 3, 3, 0.5);
        drop(race.subscribe());

        while race.tick(100.0) != RaceStatus::Finished {}
        assert!(race.get_state().winner.is_some());
    }

    #[test]
    fn test_same_seed_same_race() {
        let run = |seed: u64| {
            let mut race = started_race(SimConstants::default(), seed, 6, 1.0);
            while race.tick(100.0) != RaceStatus::Finished {}
            race.export_replay()
        };

        let a = run(123);
        let b = run(123);
        assert_eq!(a.rankings, b.rankings);
        assert_eq!(a.phase_assignments, b.phase_assignments);
        assert_eq!(a.events.len(), b.events.len());
    }

    #[test]
    fn test_regulation_speeds_up_slow_field() {
        let sim_consts = SimConstants {
            global_speed_multiplier: 0.3,
            effects_enabled: false,
            ..Default::default()
        };
        let mut race = started_race(sim_consts, 8, 4, 1.0);
        let rx = race.subscribe();

        while race.tick(100.0) != RaceStatus::Finished {}

        let notifications: Vec<Notification> = rx.drain().collect();
        assert!(notifications
            .iter()
            .any(|n| matches!(n, Notification::EffectBegin { is_positive: true, .. })));
        assert!(race
            .get_event_log()
            .get_raw_events()
            .iter()
            .any(|e| e.kind == EventKind::SystemRegulation));
    }

    #[test]
    fn test_finishing_racer_gets_effect_end() {
        let mut race = started_race(quiet_consts(), 4, 2, 1.0);
        let rx = race.subscribe();

        assert!(race.apply_effect("r0", Effect::boost(EffectSource::External, 2.5, 0.0, 1000.0)));
        assert!(race.apply_effect("r1", Effect::stumble(EffectSource::External, 0.0, 1000.0, 1000.0)));

        while race.tick(100.0) != RaceStatus::Finished {}

        // the boosted racer crosses the line while its effect is still active
        assert!(race.get_progress_state("r0").unwrap().crossed_line());
        assert!(race.get_active_effect("r0").is_none());

        let notifications: Vec<Notification> = rx.drain().collect();

        for key in ["r0", "r1"] {
            let no_begins = notifications
                .iter()
                .filter(|n| matches!(n, Notification::EffectBegin { racer_key, .. } if racer_key == key))
                .count();
            let no_ends = notifications
                .iter()
                .filter(|n| matches!(n, Notification::EffectEnd { racer_key } if racer_key == key))
                .count();

            if race.get_progress_state(key).unwrap().is_finished() {
                assert_eq!(no_begins, no_ends, "unmatched effect of {}", key);
            }
        }

        assert_eq!(
            race.get_event_log()
                .get_raw_events()
                .iter()
                .filter(|e| e.kind == EventKind::EffectEnded && e.racer_key.as_deref() == Some("r0"))
                .count(),
            1
        );
    }

    #[test]
    fn test_timed_out_racer_gets_effect_end() {
        let mut race = started_race(quiet_consts(), 4, 1, 1.0);
        let rx = race.subscribe();

        assert!(race.apply_effect("r0", Effect::stumble(EffectSource::External, 0.0, 1000.0, 1000.0)));

        while race.tick(1000.0) != RaceStatus::Finished {}

        assert!(race.get_progress_state("r0").unwrap().is_timed_out());
        assert!(race.get_active_effect("r0").is_none());

        let no_ends = rx
            .drain()
            .filter(|n| matches!(n, Notification::EffectEnd { racer_key } if racer_key == "r0"))
            .count();
        assert_eq!(no_ends, 1);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut race = started_race(quiet_consts(), 3, 3, 1.0);
        race.tick(1000.0);

        let race_state = race.get_state();
        let progress = race_state.standings[0].progress;

        race.tick(1000.0);
        assert_ulps_eq!(race_state.standings[0].progress, progress);
        assert!(race.get_state().elapsed > race_state.elapsed);
        assert_eq!(race_state.standings.len(), 3);
        assert!(race_state
            .standings
            .windows(2)
            .all(|w| w[0].progress >= w[1].progress));
    }
}
