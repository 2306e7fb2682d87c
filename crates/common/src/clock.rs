//! Render-rate clock.
//!
//! Frame rate is derived from wall time elapsed since the first progress
//! sample after a start or resume. Resetting the baseline on resume keeps
//! time spent paused from dragging the reported rate down.

use std::time::Instant;

/// Measures frames-per-second for a running render.
#[derive(Debug, Clone)]
pub struct FpsClock {
    /// Baseline instant and the frame counter value observed at it.
    baseline: Option<(Instant, u32)>,

    /// Wall-clock time of the original start (for logs).
    started_wall: String,
}

impl FpsClock {
    /// Create a clock with no baseline yet. The first sample establishes it.
    pub fn start() -> Self {
        Self {
            baseline: None,
            started_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Record a progress sample and return the measured rate, if any.
    ///
    /// The first sample after `start()` or `reset()` only establishes the
    /// baseline and yields no rate.
    pub fn sample(&mut self, current_frame: u32) -> Option<f64> {
        match self.baseline {
            None => {
                self.baseline = Some((Instant::now(), current_frame));
                None
            }
            Some((instant, base_frame)) => {
                let elapsed = instant.elapsed().as_secs_f64();
                if elapsed <= 0.0 || current_frame <= base_frame {
                    return None;
                }
                Some((current_frame - base_frame) as f64 / elapsed)
            }
        }
    }

    /// Drop the baseline. Called on resume so paused wall time is excluded.
    pub fn reset(&mut self) {
        self.baseline = None;
    }

    /// Wall-clock time at original start.
    pub fn started_wall(&self) -> &str {
        &self.started_wall
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_sample_sets_baseline_only() {
        let mut clock = FpsClock::start();
        assert!(clock.sample(0).is_none());
    }

    #[test]
    fn rate_is_positive_once_frames_advance() {
        let mut clock = FpsClock::start();
        clock.sample(10);
        std::thread::sleep(Duration::from_millis(20));
        let fps = clock.sample(30).expect("second sample should yield a rate");
        assert!(fps > 0.0);
    }

    #[test]
    fn reset_requires_a_new_baseline() {
        let mut clock = FpsClock::start();
        clock.sample(10);
        std::thread::sleep(Duration::from_millis(5));
        assert!(clock.sample(20).is_some());
        clock.reset();
        assert!(clock.sample(25).is_none());
    }
}
