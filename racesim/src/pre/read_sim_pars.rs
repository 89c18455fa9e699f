use crate::core::race::{RacePars, SimConstants};
use anyhow::Context;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::Path;

/// SimPars is used to store all other parameter structs. The simulation constants are optional
/// in the parameter file, missing values fall back to their defaults.
#[derive(Debug, Deserialize, Clone)]
pub struct SimPars {
    pub race_pars: RacePars,
    #[serde(default)]
    pub sim_consts: SimConstants,
}

/// read_sim_pars reads the JSON file and decodes the JSON string into the simulation parameters
/// struct.
pub fn read_sim_pars(filepath: &Path) -> anyhow::Result<SimPars> {
    // open file
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open parameter file {}!",
            filepath.display()
        ))?;

    // read and parse parameter file content
    let pars = serde_json::from_reader(&fh).context(format!(
        "Failed to parse parameter file {}!",
        filepath.display()
    ))?;
    Ok(pars)
}

/// parse_sim_pars decodes a JSON string into the simulation parameters struct.
pub fn parse_sim_pars(json: &str) -> anyhow::Result<SimPars> {
    serde_json::from_str(json).context("Failed to parse simulation parameters!")
}
