//! Online drawdown and underwater-period tracking for one value path.

/// Drawdown statistics of a finished path.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DrawdownSummary {
    /// Largest `(peak − value) / peak` seen.
    pub max_drawdown: f64,
    /// Steps from episode start to the new peak, one per closed episode.
    pub recovery_times: Vec<usize>,
    /// Steps spent inside each episode, closed or still open at the end.
    pub underwater_periods: Vec<usize>,
}

impl DrawdownSummary {
    pub fn had_episode(&self) -> bool {
        !self.underwater_periods.is_empty()
    }
}

/// Streaming tracker fed one value per step.
///
/// An episode opens on the first step whose drawdown exceeds `threshold`
/// and closes when the value makes a new peak.
#[derive(Clone, Debug)]
pub struct DrawdownTracker {
    threshold: f64,
    peak: f64,
    episode_start: Option<usize>,
    underwater: usize,
    summary: DrawdownSummary,
}

impl DrawdownTracker {
    /// Start at `initial`, which becomes the first peak.
    pub fn new(initial: f64, threshold: f64) -> Self {
        Self {
            threshold,
            peak: initial,
            episode_start: None,
            underwater: 0,
            summary: DrawdownSummary::default(),
        }
    }

    /// Feed the value at step `t`.
    pub fn update(&mut self, t: usize, value: f64) {
        if value > self.peak {
            self.peak = value;
            if let Some(start) = self.episode_start.take() {
                self.summary.recovery_times.push(t - start);
                self.summary.underwater_periods.push(self.underwater);
                self.underwater = 0;
            }
            return;
        }

        let drawdown = (self.peak - value) / self.peak;
        if drawdown > self.summary.max_drawdown {
            self.summary.max_drawdown = drawdown;
        }
        if self.episode_start.is_none() && drawdown > self.threshold {
            self.episode_start = Some(t);
        }
        if self.episode_start.is_some() {
            self.underwater += 1;
        }
    }

    /// Close the path. An open episode contributes its underwater period only.
    pub fn finish(mut self) -> DrawdownSummary {
        if self.episode_start.is_some() && self.underwater > 0 {
            self.summary.underwater_periods.push(self.underwater);
        }
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(values: &[f64]) -> DrawdownSummary {
        let mut t = DrawdownTracker::new(values[0], 0.05);
        for (i, v) in values.iter().enumerate().skip(1) {
            t.update(i, *v);
        }
        t.finish()
    }

    #[test]
    fn monotone_path_has_no_drawdown() {
        let s = track(&[100.0, 101.0, 102.0, 103.0]);
        assert_eq!(s.max_drawdown, 0.0);
        assert!(!s.had_episode());
    }

    #[test]
    fn small_dip_is_not_an_episode() {
        let s = track(&[100.0, 97.0, 101.0]);
        assert!((s.max_drawdown - 0.03).abs() < 1e-12);
        assert!(s.recovery_times.is_empty());
        assert!(s.underwater_periods.is_empty());
    }

    #[test]
    fn closed_episode_records_recovery_and_underwater() {
        // Drawdown crosses 5% at t=2, new peak at t=5.
        let s = track(&[100.0, 98.0, 90.0, 92.0, 99.0, 105.0]);
        assert!((s.max_drawdown - 0.10).abs() < 1e-12);
        assert_eq!(s.recovery_times, vec![3]);
        assert_eq!(s.underwater_periods, vec![3]);
    }

    #[test]
    fn open_episode_contributes_underwater_only() {
        let s = track(&[100.0, 110.0, 100.0, 95.0, 96.0]);
        assert!(s.recovery_times.is_empty());
        assert_eq!(s.underwater_periods, vec![3]);
        assert!(s.had_episode());
    }

    #[test]
    fn multiple_episodes() {
        let s = track(&[100.0, 90.0, 101.0, 90.0, 85.0, 102.0]);
        assert_eq!(s.recovery_times, vec![1, 2]);
        assert_eq!(s.underwater_periods, vec![1, 2]);
    }
}
