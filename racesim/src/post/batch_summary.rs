use crate::core::racer::Racer;
use crate::post::race_result::RaceResult;
use helpers::general::argmax;
use std::collections::HashMap;
use std::fmt::Write;

#[derive(Debug, Clone)]
pub struct RacerStats {
    pub racer: Racer,
    pub no_wins: u32,
    pub no_podiums: u32,
    pub no_finishes: u32,
    pub mean_position: f64,
}

/// BatchSummary aggregates the results of several simulation runs of the same race setup.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub no_races: usize,
    pub no_timeouts: usize,
    pub mean_race_time: f64,
    pub racer_stats: Vec<RacerStats>,
}

impl BatchSummary {
    /// from_results returns None if no results were inserted. Racers are identified by key, the
    /// order of the racer statistics follows the racer list of the first race.
    pub fn from_results(race_results: &[RaceResult]) -> Option<BatchSummary> {
        let first = race_results.first()?;

        let mut racer_stats: Vec<RacerStats> = first
            .replay
            .racers
            .iter()
            .map(|racer| RacerStats {
                racer: racer.to_owned(),
                no_wins: 0,
                no_podiums: 0,
                no_finishes: 0,
                mean_position: 0.0,
            })
            .collect();

        let idx_by_key: HashMap<String, usize> = racer_stats
            .iter()
            .enumerate()
            .map(|(i, x)| (x.racer.key.to_owned(), i))
            .collect();

        let mut position_sums = vec![0usize; racer_stats.len()];
        let mut position_counts = vec![0usize; racer_stats.len()];

        for race_result in race_results.iter() {
            for entry in race_result.rankings.iter() {
                let i = match idx_by_key.get(&entry.racer.key) {
                    Some(&i) => i,
                    None => continue,
                };

                position_sums[i] += entry.position;
                position_counts[i] += 1;

                if entry.position == 1 {
                    racer_stats[i].no_wins += 1;
                }
                if entry.position <= 3 {
                    racer_stats[i].no_podiums += 1;
                }
                if entry.finish_time.is_some() {
                    racer_stats[i].no_finishes += 1;
                }
            }
        }

        for (i, stats) in racer_stats.iter_mut().enumerate() {
            if position_counts[i] > 0 {
                stats.mean_position = position_sums[i] as f64 / position_counts[i] as f64;
            }
        }

        Some(BatchSummary {
            no_races: race_results.len(),
            no_timeouts: race_results.iter().filter(|x| x.timed_out).count(),
            mean_race_time: race_results.iter().map(|x| x.race_time).sum::<f64>()
                / race_results.len() as f64,
            racer_stats,
        })
    }

    /// get_most_wins returns the racer that won the most races (first in racer order on ties).
    pub fn get_most_wins(&self) -> Option<&RacerStats> {
        if self.racer_stats.is_empty() {
            return None;
        }

        let no_wins: Vec<u32> = self.racer_stats.iter().map(|x| x.no_wins).collect();
        self.racer_stats.get(argmax(&no_wins))
    }

    /// print_summary prints the aggregated statistics to the console output.
    pub fn print_summary(&self) {
        let mut tmp_string = String::new();

        writeln!(&mut tmp_string, "racer                , wins, podiums, finishes, mean pos").unwrap();

        for stats in self.racer_stats.iter() {
            writeln!(
                &mut tmp_string,
                "{:20}{}, {:4}, {:7}, {:8}, {:8.2}",
                stats.racer.display_name,
                if stats.racer.is_human { "*" } else { " " },
                stats.no_wins,
                stats.no_podiums,
                stats.no_finishes,
                stats.mean_position
            )
            .unwrap();
        }

        println!(
            "RESULT: {} races, {} timed out, mean race time {:.3}s",
            self.no_races, self.no_timeouts, self.mean_race_time
        );
        println!("{}", tmp_string);

        if let Some(stats) = self.get_most_wins() {
            println!(
                "RESULT: Most wins: {} ({} of {})",
                stats.racer.display_name, stats.no_wins, self.no_races
            );
        }
    }
}
