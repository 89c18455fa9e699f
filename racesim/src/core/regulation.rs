use crate::core::effects::{Effect, EffectKind, EffectSource, EffectSystem};
use crate::core::race::SimConstants;
use serde::Serialize;

/// Correction is the decision of the regulation controller for the current time step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Correction {
    None,
    Accelerate,
    Decelerate,
}

/// RegulationController compares the aggregate race progress with the schedule that results from
/// the elapsed race time. If the field trails the schedule by more than the tolerance, every
/// eligible racer receives a small boost; if it leads by more than the tolerance, every eligible
/// racer is slowed down slightly.
///
/// Eligibility rules:
/// * phase effects are never replaced (this also protects stun windows), including a phase boost
///   while the field is slowed down; only unaffected racers absorb the correction
/// * a racer that already carries a regulation effect in the same direction is skipped
/// * a regulation effect in the opposite direction is replaced
#[derive(Debug, Clone)]
pub struct RegulationController {
    tolerance: f64,
    boost_multiplier: f64,
    stumble_multiplier: f64,
    effect_duration: f64,
}

impl RegulationController {
    pub fn new(sim_consts: &SimConstants) -> RegulationController {
        RegulationController {
            tolerance: sim_consts.regulation_tolerance,
            boost_multiplier: sim_consts.regulation_boost_multiplier,
            stumble_multiplier: sim_consts.regulation_stumble_multiplier,
            effect_duration: sim_consts.regulation_effect_duration,
        }
    }

    pub fn get_tolerance(&self) -> f64 {
        self.tolerance
    }

    /// evaluate determines the required correction from the actual and the expected progress
    /// ratio (both in [0, 1]).
    pub fn evaluate(&self, actual_ratio: f64, expected_ratio: f64) -> Correction {
        let deviation = actual_ratio - expected_ratio;

        if deviation < -self.tolerance {
            Correction::Accelerate
        } else if deviation > self.tolerance {
            Correction::Decelerate
        } else {
            Correction::None
        }
    }

    /// regulate evaluates the pacing and assigns corrective effects to the eligible candidates.
    /// It returns the correction and the newly assigned effects.
    pub fn regulate(
        &self,
        effects: &mut EffectSystem,
        candidates: &[usize],
        actual_ratio: f64,
        expected_ratio: f64,
        now: f64,
    ) -> (Correction, Vec<(usize, Effect)>) {
        let correction = self.evaluate(actual_ratio, expected_ratio);

        let target_kind = match correction {
            Correction::None => return (correction, Vec::new()),
            Correction::Accelerate => EffectKind::Boost,
            Correction::Decelerate => EffectKind::Stumble,
        };

        let mut assigned = Vec::new();

        for &idx in candidates {
            let eligible = match effects.get_active_effect(idx, now) {
                None => true,
                Some(e) => e.source == EffectSource::Regulation && e.kind != target_kind,
            };

            if !eligible {
                continue;
            }

            let effect = match target_kind {
                EffectKind::Boost => Effect::boost(
                    EffectSource::Regulation,
                    self.boost_multiplier,
                    now,
                    self.effect_duration,
                ),
                EffectKind::Stumble => Effect::slowdown(
                    EffectSource::Regulation,
                    self.stumble_multiplier,
                    now,
                    self.effect_duration,
                ),
            };

            effects.assign(idx, effect.clone());
            assigned.push((idx, effect));
        }

        (correction, assigned)
    }
}
