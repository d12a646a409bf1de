// crates/jobs/src/ramp.rs
//! Fixed-step progress ramp for the time-driven optimization stages.

use std::time::Duration;

/// `steps` equally spaced ticks, each adding `increment` percent, one every
/// `tick`. The ramp always ends on exactly 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressRamp {
    pub steps: u32,
    pub increment: f64,
    pub tick: Duration,
}

impl ProgressRamp {
    pub const fn new(steps: u32, increment: f64, tick: Duration) -> Self {
        Self {
            steps,
            increment,
            tick,
        }
    }

    /// Sparse reconstruction: 40 ticks of 2.5%, one per second.
    pub const fn colmap() -> Self {
        Self::new(40, 2.5, Duration::from_secs(1))
    }

    /// Splat training: 50 ticks of 2%, one per second.
    pub const fn gaussian_splatting() -> Self {
        Self::new(50, 2.0, Duration::from_secs(1))
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Progress reported after each tick.
    ///
    /// Stops at `steps` ticks or as soon as the running total reaches 100,
    /// whichever comes first; the final value is always 100 and no value
    /// exceeds it.
    pub fn values(&self) -> Vec<u8> {
        let steps = self.steps.max(1);
        let mut values = Vec::with_capacity(steps as usize);
        let mut progress = 0.0_f64;

        for count in 1..=steps {
            progress += self.increment;
            if count >= steps || progress >= 100.0 {
                values.push(100);
                break;
            }
            values.push(progress.clamp(0.0, 100.0).round() as u8);
        }
        values
    }

    /// Wall-clock duration of the whole ramp.
    pub fn duration(&self) -> Duration {
        self.tick * self.values().len() as u32
    }

    /// Sleep one tick before each value and hand it to `on_progress`.
    pub async fn run(&self, mut on_progress: impl FnMut(u8)) {
        for value in self.values() {
            tokio::time::sleep(self.tick).await;
            on_progress(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assert_well_formed(values: &[u8]) {
        assert_eq!(values.last(), Some(&100));
        assert!(values.iter().all(|v| *v <= 100));
        assert!(values.windows(2).all(|w| w[0] <= w[1]), "{values:?}");
    }

    #[test]
    fn test_colmap_ramp_hits_100_on_tick_40() {
        let values = ProgressRamp::colmap().values();
        assert_eq!(values.len(), 40);
        assert_eq!(values[0], 3); // 2.5 rounds up
        assert_eq!(values[38], 98); // 97.5
        assert_well_formed(&values);
        assert!(values[..39].iter().all(|v| *v < 100));
    }

    #[test]
    fn test_gaussian_ramp_hits_100_on_tick_50() {
        let values = ProgressRamp::gaussian_splatting().values();
        assert_eq!(values.len(), 50);
        assert_eq!(values[0], 2);
        assert_eq!(values[48], 98);
        assert_well_formed(&values);
    }

    #[test]
    fn test_large_increment_stops_early() {
        let ramp = ProgressRamp::new(10, 30.0, Duration::ZERO);
        assert_eq!(ramp.values(), vec![30, 60, 90, 100]);
    }

    #[test]
    fn test_small_increment_jumps_to_100_on_last_step() {
        let ramp = ProgressRamp::new(4, 10.0, Duration::ZERO);
        assert_eq!(ramp.values(), vec![10, 20, 30, 100]);
    }

    #[test]
    fn test_zero_steps_still_completes() {
        let ramp = ProgressRamp::new(0, 2.5, Duration::ZERO);
        assert_eq!(ramp.values(), vec![100]);
    }

    #[test]
    fn test_duration() {
        assert_eq!(ProgressRamp::colmap().duration(), Duration::from_secs(40));
        assert_eq!(
            ProgressRamp::gaussian_splatting().duration(),
            Duration::from_secs(50)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_spaces_ticks_evenly() {
        let ramp = ProgressRamp::colmap();
        let start = tokio::time::Instant::now();
        let mut seen = Vec::new();

        ramp.run(|p| seen.push((p, start.elapsed()))).await;

        assert_eq!(seen.len(), 40);
        assert_eq!(seen[0], (3, Duration::from_secs(1)));
        assert_eq!(seen[39], (100, Duration::from_secs(40)));
    }
}
