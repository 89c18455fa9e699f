use crate::core::race::SimConstants;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Boost,
    Stumble,
}

/// EffectSource distinguishes effects drawn at a phase transition from the small corrective
/// effects injected by the regulation controller. Regulation never replaces a phase effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectSource {
    Phase,
    Regulation,
    External,
}

/// * `kind` - Boost (speed multiplier > 1) or Stumble (stun window and/or multiplier < 1)
/// * `source` - Who assigned the effect
/// * `multiplier` - Speed multiplier applied while the effect is active and the racer not stunned
/// * `started_at` - (s) Race time at which the effect was assigned
/// * `duration` - (s) Total effect duration
/// * `stun_until` - (s) Race time until which the racer is at a full stop (stumbles only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub kind: EffectKind,
    pub source: EffectSource,
    pub multiplier: f64,
    pub started_at: f64,
    pub duration: f64,
    pub stun_until: Option<f64>,
}

impl Effect {
    pub fn boost(source: EffectSource, multiplier: f64, started_at: f64, duration: f64) -> Effect {
        Effect {
            kind: EffectKind::Boost,
            source,
            multiplier,
            started_at,
            duration,
            stun_until: None,
        }
    }

    /// stumble creates a full stop for stun_duration followed by normal speed until the effect
    /// ends.
    pub fn stumble(
        source: EffectSource,
        started_at: f64,
        duration: f64,
        stun_duration: f64,
    ) -> Effect {
        Effect {
            kind: EffectKind::Stumble,
            source,
            multiplier: 1.0,
            started_at,
            duration,
            stun_until: Some(started_at + stun_duration.min(duration)),
        }
    }

    /// slowdown creates a stumble without stun window that only reduces the speed.
    pub fn slowdown(source: EffectSource, multiplier: f64, started_at: f64, duration: f64) -> Effect {
        Effect {
            kind: EffectKind::Stumble,
            source,
            multiplier,
            started_at,
            duration,
            stun_until: None,
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self.kind, EffectKind::Boost)
    }

    pub fn is_active(&self, now: f64) -> bool {
        now - self.started_at <= self.duration
    }

    pub fn is_stunned(&self, now: f64) -> bool {
        self.is_active(now) && self.stun_until.map_or(false, |t| now < t)
    }

    pub fn stun_duration(&self) -> Option<f64> {
        self.stun_until.map(|t| t - self.started_at)
    }

    /// summary returns a short human-readable description used in the event log.
    pub fn summary(&self) -> String {
        match (self.kind, self.stun_duration()) {
            (EffectKind::Boost, _) => {
                format!("boost x{:.2} for {:.1}s", self.multiplier, self.duration)
            }
            (EffectKind::Stumble, Some(t_stun)) => {
                format!("stunned {:.1}s ({:.1}s total)", t_stun, self.duration)
            }
            (EffectKind::Stumble, None) => {
                format!("slowed x{:.2} for {:.1}s", self.multiplier, self.duration)
            }
        }
    }
}

/// EffectResolution is the result of resolving the active effect of a racer at a given time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectResolution {
    pub multiplier: f64,
    pub stunned: bool,
}

impl Default for EffectResolution {
    fn default() -> Self {
        EffectResolution {
            multiplier: 1.0,
            stunned: false,
        }
    }
}

/// EffectSystem owns at most one effect per racer. Effects are indexed by the racer's index in
/// the race's racer list.
#[derive(Debug, Clone, Default)]
pub struct EffectSystem {
    effects: Vec<Option<Effect>>,
}

impl EffectSystem {
    pub fn new(no_racers: usize) -> EffectSystem {
        EffectSystem {
            effects: vec![None; no_racers],
        }
    }

    pub fn reset(&mut self, no_racers: usize) {
        self.effects.clear();
        self.effects.resize(no_racers, None);
    }

    /// get_effect returns the stored effect of a racer, regardless of whether it already expired.
    pub fn get_effect(&self, idx: usize) -> Option<&Effect> {
        self.effects.get(idx).and_then(|x| x.as_ref())
    }

    /// get_active_effect returns the effect of a racer if it is still active at time now.
    pub fn get_active_effect(&self, idx: usize, now: f64) -> Option<&Effect> {
        self.get_effect(idx).filter(|e| e.is_active(now))
    }

    pub fn no_active_effects(&self, now: f64) -> usize {
        self.effects
            .iter()
            .flatten()
            .filter(|e| e.is_active(now))
            .count()
    }

    /// assign stores the effect for the racer and returns the replaced effect (if any).
    pub fn assign(&mut self, idx: usize, effect: Effect) -> Option<Effect> {
        debug_assert!(
            idx < self.effects.len(),
            "effect assigned to unknown racer index {}",
            idx
        );

        match self.effects.get_mut(idx) {
            Some(slot) => slot.replace(effect),
            None => {
                warn!(idx, "ignoring effect for unknown racer index");
                None
            }
        }
    }

    /// assign_phase_effects selects a random subset of the candidate racers and assigns each
    /// either a boost or a stumble. Existing effects of the selected racers are replaced. The
    /// assigned effects are returned in ascending racer index order.
    pub fn assign_phase_effects<R: Rng>(
        &mut self,
        candidates: &[usize],
        now: f64,
        sim_consts: &SimConstants,
        rng: &mut R,
    ) -> Vec<(usize, Effect)> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let [frac_min, frac_max] = sim_consts.effect_fraction_range;
        let fraction = rng.gen_range(frac_min..=frac_max);
        let no_affected =
            ((candidates.len() as f64 * fraction).round() as usize).clamp(1, candidates.len());

        let mut chosen: Vec<usize> = candidates
            .choose_multiple(rng, no_affected)
            .copied()
            .collect();
        chosen.sort_unstable();

        let mut assigned = Vec::with_capacity(chosen.len());

        for idx in chosen {
            let effect = if rng.gen_bool(sim_consts.boost_probability) {
                let [mult_min, mult_max] = sim_consts.boost_multiplier_range;
                let [dur_min, dur_max] = sim_consts.boost_duration_range;
                Effect::boost(
                    EffectSource::Phase,
                    rng.gen_range(mult_min..=mult_max),
                    now,
                    rng.gen_range(dur_min..=dur_max),
                )
            } else {
                let [dur_min, dur_max] = sim_consts.stumble_duration_range;
                let [stun_min, stun_max] = sim_consts.stun_duration_range;
                Effect::stumble(
                    EffectSource::Phase,
                    now,
                    rng.gen_range(dur_min..=dur_max),
                    rng.gen_range(stun_min..=stun_max),
                )
            };

            debug!(idx, effect = %effect.summary(), "phase effect assigned");
            self.assign(idx, effect.clone());
            assigned.push((idx, effect));
        }

        assigned
    }

    /// resolve returns the current speed multiplier of a racer (1.0 without an active effect) and
    /// whether the racer is inside its stun window.
    pub fn resolve(&self, idx: usize, now: f64) -> EffectResolution {
        match self.get_active_effect(idx, now) {
            Some(effect) => EffectResolution {
                multiplier: effect.multiplier,
                stunned: effect.is_stunned(now),
            },
            None => EffectResolution::default(),
        }
    }

    /// expire removes all effects that ended before time now and returns the indices of the
    /// affected racers in ascending order.
    pub fn expire(&mut self, now: f64) -> Vec<usize> {
        let mut expired = Vec::new();

        for (idx, slot) in self.effects.iter_mut().enumerate() {
            if slot.as_ref().map_or(false, |e| !e.is_active(now)) {
                *slot = None;
                expired.push(idx);
            }
        }

        expired
    }

    /// clear removes the effect of a single racer, e.g. once it finished the race.
    pub fn clear(&mut self, idx: usize) -> Option<Effect> {
        self.effects.get_mut(idx).and_then(|slot| slot.take())
    }
}
