use crate::core::effects::EffectKind;
use crate::core::event_log::RaceEvent;
use crate::core::race::RaceStatus;
use crate::core::racer::Racer;
use flume::{Receiver, Sender};
use serde::Serialize;

pub const DEFAULT_STATE_UPDATE_FREQUENCY: f64 = 10.0;

#[derive(Debug, Clone, Serialize)]
pub struct RacerStanding {
    pub racer: Racer,
    pub position: usize,
    pub progress: f64,
    pub finished: bool,
    pub finish_time: Option<f64>,
    pub effect: Option<EffectKind>,
    pub stunned: bool,
}

/// RaceState is an owned snapshot of the race that can be handed to other threads. Times are
/// given in seconds, progress values in percent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RaceState {
    pub status: RaceStatus,
    pub elapsed: f64,
    pub duration: f64,
    pub remaining: f64,
    pub current_phase: usize,
    pub phase_title: String,
    pub time_progress: f64,
    pub race_progress: f64,
    pub standings: Vec<RacerStanding>,
    pub winner: Option<Racer>,
    pub rankings: Vec<Racer>,
    pub finished_count: usize,
    pub finish_threshold: usize,
    pub events: Vec<RaceEvent>,
}

/// Notification is sent to all observers of a race.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Throttled snapshot of the race
    StateChanged(RaceState),
    /// Effect assigned to a racer (durations in seconds)
    EffectBegin {
        racer_key: String,
        is_positive: bool,
        duration: f64,
        stun_duration: Option<f64>,
    },
    /// Effect of a racer expired
    EffectEnd { racer_key: String },
    /// Racer entered a new phase
    PhaseAdvance { racer_key: String, phase_index: usize },
    /// Racer crossed the finish line
    RacerFinished {
        racer_key: String,
        position: usize,
        finish_time: f64,
    },
    /// Race is over, sent exactly once per race
    RaceFinished { winner: Racer, rankings: Vec<Racer> },
}

/// Observers keeps the sending halves of all notification channels and throttles the state
/// notifications (measured in race time).
#[derive(Debug)]
pub struct Observers {
    senders: Vec<Sender<Notification>>,
    min_state_interval: f64,
    t_last_state_update: Option<f64>,
}

impl Default for Observers {
    fn default() -> Self {
        Observers::new(DEFAULT_STATE_UPDATE_FREQUENCY)
    }
}

impl Observers {
    pub fn new(max_state_update_frequency: f64) -> Observers {
        Observers {
            senders: Vec::new(),
            min_state_interval: 1.0 / max_state_update_frequency,
            t_last_state_update: None,
        }
    }

    pub fn subscribe(&mut self) -> Receiver<Notification> {
        let (tx, rx) = flume::unbounded();
        self.senders.push(tx);
        rx
    }

    pub fn add(&mut self, tx: Sender<Notification>) {
        self.senders.push(tx);
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// notify sends the notification to all observers and removes those whose receiver is gone.
    pub fn notify(&mut self, notification: Notification) {
        self.senders
            .retain(|tx| tx.send(notification.clone()).is_ok());
    }

    /// state_update_due checks if enough race time passed since the last state notification.
    pub fn state_update_due(&self, racetime: f64) -> bool {
        !self.senders.is_empty()
            && self
                .t_last_state_update
                .map_or(true, |t| racetime - t >= self.min_state_interval - 1e-9)
    }

    pub fn mark_state_update(&mut self, racetime: f64) {
        self.t_last_state_update = Some(racetime);
    }

    pub fn reset_throttle(&mut self) {
        self.t_last_state_update = None;
    }
}
