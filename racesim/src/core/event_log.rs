use helpers::buffer::RingBuffer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RaceStart,
    PhaseChange,
    BoostSpeed,
    SlowSpeed,
    Stumble,
    EffectEnded,
    PlayerFinished,
    RaceEnd,
    SystemInit,
    SystemRegulation,
    SystemTimeout,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RaceStart => "race_start",
            EventKind::PhaseChange => "phase_change",
            EventKind::BoostSpeed => "boost_speed",
            EventKind::SlowSpeed => "slow_speed",
            EventKind::Stumble => "stumble",
            EventKind::EffectEnded => "effect_ended",
            EventKind::PlayerFinished => "player_finished",
            EventKind::RaceEnd => "race_end",
            EventKind::SystemInit => "system_init",
            EventKind::SystemRegulation => "system_regulation",
            EventKind::SystemTimeout => "system_timeout",
        }
    }

    /// is_live returns true for the kinds that are shown in the live event log.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            EventKind::BoostSpeed
                | EventKind::SlowSpeed
                | EventKind::Stumble
                | EventKind::PhaseChange
                | EventKind::PlayerFinished
        ) || self.as_str().starts_with("system_")
    }
}

/// * `id` - Monotonic event id, unique within a race
/// * `timestamp` - (s) Race time at which the event occurred
/// * `racer_key` - Affected racer (None for race-wide events)
/// * `phase` - Phase index in which the event occurred
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceEvent {
    pub id: u64,
    pub timestamp: f64,
    pub racer_key: Option<String>,
    pub kind: EventKind,
    pub phase: usize,
    pub description: String,
    pub effect_summary: Option<String>,
}

/// EventLog is an append-only event history. The raw log keeps the latest `raw_capacity` events
/// of any kind, the live log keeps the latest `live_capacity` events of the live kinds.
#[derive(Debug, Clone)]
pub struct EventLog {
    next_id: u64,
    no_dropped: u64,
    raw: RingBuffer<RaceEvent>,
    live: RingBuffer<RaceEvent>,
}

impl EventLog {
    pub fn new(raw_capacity: usize, live_capacity: usize) -> EventLog {
        EventLog {
            next_id: 0,
            no_dropped: 0,
            raw: RingBuffer::new(raw_capacity),
            live: RingBuffer::new(live_capacity),
        }
    }

    pub fn clear(&mut self) {
        self.next_id = 0;
        self.no_dropped = 0;
        self.raw.clear();
        self.live.clear();
    }

    /// record appends an event and returns its id.
    pub fn record(
        &mut self,
        timestamp: f64,
        kind: EventKind,
        racer_key: Option<&str>,
        phase: usize,
        description: String,
        effect_summary: Option<String>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let event = RaceEvent {
            id,
            timestamp,
            racer_key: racer_key.map(|k| k.to_owned()),
            kind,
            phase,
            description,
            effect_summary,
        };

        if kind.is_live() {
            self.live.push(event.clone());
        }

        if self.raw.push(event).is_some() {
            self.no_dropped += 1;
        }

        id
    }

    /// get_live_events returns a copy of the live log (oldest first).
    pub fn get_live_events(&self) -> Vec<RaceEvent> {
        self.live.to_vec()
    }

    /// get_raw_events returns a copy of the raw log (oldest first).
    pub fn get_raw_events(&self) -> Vec<RaceEvent> {
        self.raw.to_vec()
    }

    pub fn get_last_event(&self) -> Option<&RaceEvent> {
        self.raw.last()
    }

    /// get_no_recorded returns the number of events recorded since the last reset, including
    /// those dropped from the raw log.
    pub fn get_no_recorded(&self) -> u64 {
        self.next_id
    }

    pub fn get_no_dropped(&self) -> u64 {
        self.no_dropped
    }
}
