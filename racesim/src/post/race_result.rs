use crate::core::racer::Racer;
use crate::post::replay::ReplayBundle;
use std::fmt::Write;

/// RankingEntry is used to store the final result of a single racer for post-processing.
#[derive(Debug, Clone)]
pub struct RankingEntry {
    pub position: usize,
    pub racer: Racer,
    pub finish_time: Option<f64>,
    pub progress: f64,
    pub timed_out: bool,
}

/// RaceResult contains all race information that is required for post-processing the results.
#[derive(Debug, Clone)]
pub struct RaceResult {
    pub name: String,
    pub seed: Option<u64>,
    pub race_time: f64,
    pub duration: f64,
    pub timed_out: bool,
    pub rankings: Vec<RankingEntry>,
    pub replay: ReplayBundle,
}

impl RaceResult {
    pub fn get_winner(&self) -> Option<&Racer> {
        self.rankings.first().map(|x| &x.racer)
    }

    /// get_position returns the final position of the inserted racer.
    pub fn get_position(&self, racer_key: &str) -> Option<usize> {
        self.rankings
            .iter()
            .find(|x| x.racer.key == racer_key)
            .map(|x| x.position)
    }

    /// format_rankings creates the result table.
    pub fn format_rankings(&self) -> String {
        let mut tmp_string = String::new();

        writeln!(&mut tmp_string, "pos, racer                , finish time, progress").unwrap();

        for entry in self.rankings.iter() {
            let finish_time = match (entry.finish_time, entry.timed_out) {
                (Some(t), _) => format!("{:10.3}s", t),
                (None, true) => format!("{:>11}", "time out"),
                (None, false) => format!("{:>11}", "-"),
            };

            writeln!(
                &mut tmp_string,
                "{:3}, {:20}{}, {}, {:7.2}%",
                entry.position,
                entry.racer.display_name,
                if entry.racer.is_human { "*" } else { " " },
                finish_time,
                entry.progress
            )
            .unwrap();
        }

        tmp_string
    }

    /// print_rankings prints the resulting rankings to the console output.
    pub fn print_rankings(&self) {
        match self.seed {
            Some(seed) => println!("RESULT: {} (seed {})", self.name, seed),
            None => println!("RESULT: {}", self.name),
        }
        println!(
            "RESULT: Race time {:.3}s of {:.3}s{}",
            self.race_time,
            self.duration,
            if self.timed_out { " (timed out)" } else { "" }
        );
        println!("{}", self.format_rankings());
    }
}
