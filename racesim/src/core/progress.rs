use tracing::warn;

pub const MAX_PROGRESS: f64 = 100.0;

/// ProgressState keeps track of a single racer's race progress (0.0 to 100.0) and finish state.
///
/// Invariants:
/// * progress is clamped to [0.0, 100.0] and never decreases within a race
/// * `finished` becomes true exactly once, either when progress reaches 100.0 or when the race
/// times out and the racer is forced onto the finish line
#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    progress_prev: f64,
    progress_cur: f64,
    finished: bool,
    finish_time: Option<f64>,
    progress_at_timeout: Option<f64>,
    pub last_phase_seen: usize,
}

impl ProgressState {
    pub fn new() -> ProgressState {
        Default::default()
    }

    /// update_progress adds the progress of the current time step and returns true if the racer
    /// reached the finish line within this step. Finished racers are not moved anymore.
    pub fn update_progress(&mut self, progress_delta: f64) -> bool {
        if self.finished {
            return false;
        }

        debug_assert!(
            progress_delta.is_finite() && progress_delta >= 0.0,
            "invalid progress delta {}",
            progress_delta
        );

        let progress_delta = if progress_delta.is_finite() && progress_delta >= 0.0 {
            progress_delta
        } else {
            warn!(progress_delta, "clamping invalid progress delta to zero");
            0.0
        };

        self.progress_prev = self.progress_cur;
        self.progress_cur = (self.progress_cur + progress_delta).clamp(0.0, MAX_PROGRESS);

        self.progress_cur >= MAX_PROGRESS
    }

    /// set_finished marks the racer as finished at the inserted race time.
    pub fn set_finished(&mut self, finish_time: f64) {
        debug_assert!(!self.finished, "racer finished twice");

        if !self.finished {
            self.finished = true;
            self.finish_time = Some(finish_time);
            self.progress_cur = MAX_PROGRESS;
        }
    }

    /// force_finish places an unfinished racer on the finish line when the race times out. The
    /// progress reached until then is kept for the ranking.
    pub fn force_finish(&mut self) {
        if !self.finished {
            self.progress_at_timeout = Some(self.progress_cur);
            self.finished = true;
            self.progress_prev = self.progress_cur;
            self.progress_cur = MAX_PROGRESS;
        }
    }

    pub fn get_progress(&self) -> f64 {
        self.progress_cur
    }

    /// get_progresses returns the progress before and after the latest update.
    pub fn get_progresses(&self) -> (f64, f64) {
        (self.progress_prev, self.progress_cur)
    }

    /// get_ranking_progress returns the progress that counts for the ranking, i.e. the progress
    /// at the time-out for racers that were forced onto the finish line.
    pub fn get_ranking_progress(&self) -> f64 {
        self.progress_at_timeout.unwrap_or(self.progress_cur)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// crossed_line is true for racers that reached the finish line on their own.
    pub fn crossed_line(&self) -> bool {
        self.finish_time.is_some()
    }

    pub fn is_timed_out(&self) -> bool {
        self.progress_at_timeout.is_some()
    }

    pub fn get_finish_time(&self) -> Option<f64> {
        self.finish_time
    }
}
