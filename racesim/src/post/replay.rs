use crate::core::event_log::RaceEvent;
use crate::core::race::SimConstants;
use crate::core::racer::Racer;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// PhaseAssignment records which racers received a boost or a stumble when the race entered a
/// phase. The exact effect timing is not part of the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseAssignment {
    pub phase: usize,
    pub title: String,
    pub started_at: f64,
    pub boosted: Vec<String>,
    pub stumbled: Vec<String>,
}

impl PhaseAssignment {
    pub fn new(phase: usize, title: &str, started_at: f64) -> PhaseAssignment {
        PhaseAssignment {
            phase,
            title: title.to_owned(),
            started_at,
            boosted: Vec::new(),
            stumbled: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaySettings {
    pub seed: Option<u64>,
    pub duration_minutes: f64,
    pub finish_threshold: usize,
    pub started_at_unix_ms: Option<u64>,
    pub sim_consts: SimConstants,
}

/// ReplayBundle summarizes a race for diagnostics and post-race analysis. It cannot be used to
/// resume a race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayBundle {
    pub settings: ReplaySettings,
    pub racers: Vec<Racer>,
    pub events: Vec<RaceEvent>,
    pub phase_assignments: Vec<PhaseAssignment>,
    pub rankings: Vec<String>,
    pub winner: Option<String>,
}

impl ReplayBundle {
    /// get_phase_assignment returns the effect assignment record of the inserted phase.
    pub fn get_phase_assignment(&self, phase: usize) -> Option<&PhaseAssignment> {
        self.phase_assignments.iter().find(|x| x.phase == phase)
    }

    /// get_affected_phases returns the phases in which the inserted racer received an effect.
    pub fn get_affected_phases(&self, racer_key: &str) -> Vec<usize> {
        self.phase_assignments
            .iter()
            .filter(|x| {
                x.boosted.iter().any(|k| k == racer_key) || x.stumbled.iter().any(|k| k == racer_key)
            })
            .map(|x| x.phase)
            .collect()
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize replay bundle!")
    }

    /// write_json writes the bundle as pretty-printed JSON to the inserted file path.
    pub fn write_json(&self, filepath: &Path) -> anyhow::Result<()> {
        let fh = File::create(filepath).context(format!(
            "Failed to create replay file {}!",
            filepath.display()
        ))?;
        let mut writer = BufWriter::new(fh);

        serde_json::to_writer_pretty(&mut writer, self).context(format!(
            "Failed to write replay file {}!",
            filepath.display()
        ))?;
        writer.flush().context("Failed to flush replay file!")?;

        Ok(())
    }
}
