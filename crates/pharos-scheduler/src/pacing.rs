use std::sync::Mutex;
use std::time::Duration;

use pharos_core::config::{DelayRange, PharosConfig};
use pharos_core::ConfigError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Which configured range a delay is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayKind {
    /// Jitter before an account starts a cycle.
    Startup,
    /// Pause between two jobs, and between retry attempts.
    InterTask,
    /// Pause between two cycles of the same account.
    CycleGap,
}

/// Randomized delays drawn uniformly, in whole seconds, from inclusive ranges.
///
/// Owns its random source so a seeded policy gives reproducible draws.
#[derive(Debug)]
pub struct PacingPolicy {
    startup: DelayRange,
    inter_task: DelayRange,
    cycle_gap: DelayRange,
    rng: Mutex<StdRng>,
}

impl PacingPolicy {
    pub fn new(
        startup: DelayRange,
        inter_task: DelayRange,
        cycle_gap: DelayRange,
    ) -> Result<Self, ConfigError> {
        startup.validate("delay_before_start")?;
        inter_task.validate("delay_between_tasks")?;
        cycle_gap.validate("delay_between_cycles")?;
        Ok(Self {
            startup,
            inter_task,
            cycle_gap,
            rng: Mutex::new(StdRng::from_os_rng()),
        })
    }

    pub fn from_config(config: &PharosConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.delay_before_start,
            config.delay_between_tasks,
            config.delay_between_cycles,
        )
    }

    /// No delays at all.
    pub fn immediate() -> Self {
        Self {
            startup: DelayRange::default(),
            inter_task: DelayRange::default(),
            cycle_gap: DelayRange::default(),
            rng: Mutex::new(StdRng::seed_from_u64(0)),
        }
    }

    /// Replace the random source with a deterministic one.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    pub fn range(&self, kind: DelayKind) -> DelayRange {
        match kind {
            DelayKind::Startup => self.startup,
            DelayKind::InterTask => self.inter_task,
            DelayKind::CycleGap => self.cycle_gap,
        }
    }

    /// Draw the next delay of `kind`. Every call is an independent draw.
    pub fn next_delay(&self, kind: DelayKind) -> Duration {
        let DelayRange { min, max } = self.range(kind);
        if min == max {
            return Duration::from_secs(min);
        }
        let secs = self
            .rng
            .lock()
            .expect("pacing rng poisoned")
            .random_range(min..=max);
        Duration::from_secs(secs)
    }

    /// Shuffle `items` with the same random source.
    pub fn shuffle<T>(&self, items: &mut [T]) {
        items.shuffle(&mut *self.rng.lock().expect("pacing rng poisoned"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(min: u64, max: u64) -> PacingPolicy {
        PacingPolicy::new(
            DelayRange::new(min, max),
            DelayRange::new(min, max),
            DelayRange::new(min, max),
        )
        .unwrap()
    }

    #[test]
    fn draws_stay_in_range() {
        let p = policy(2, 7).with_seed(42);
        for kind in [DelayKind::Startup, DelayKind::InterTask, DelayKind::CycleGap] {
            for _ in 0..500 {
                let d = p.next_delay(kind).as_secs();
                assert!((2..=7).contains(&d), "{d} out of range");
            }
        }
    }

    #[test]
    fn both_bounds_are_reachable() {
        let p = policy(0, 1).with_seed(7);
        let draws: Vec<u64> = (0..200).map(|_| p.next_delay(DelayKind::InterTask).as_secs()).collect();
        assert!(draws.contains(&0));
        assert!(draws.contains(&1));
    }

    #[test]
    fn equal_bounds_are_fixed() {
        let p = policy(5, 5);
        for _ in 0..20 {
            assert_eq!(p.next_delay(DelayKind::Startup), Duration::from_secs(5));
        }
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = PacingPolicy::new(
            DelayRange::default(),
            DelayRange::new(9, 3),
            DelayRange::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DelayRange { ref name, .. } if name == "delay_between_tasks"));
    }

    #[test]
    fn seeded_policies_agree() {
        let a = policy(0, 1000).with_seed(99);
        let b = policy(0, 1000).with_seed(99);
        for _ in 0..50 {
            assert_eq!(a.next_delay(DelayKind::CycleGap), b.next_delay(DelayKind::CycleGap));
        }
    }

    #[test]
    fn seeded_shuffle_is_reproducible() {
        let mut x: Vec<u32> = (0..20).collect();
        let mut y = x.clone();
        policy(0, 0).with_seed(3).shuffle(&mut x);
        policy(0, 0).with_seed(3).shuffle(&mut y);
        assert_eq!(x, y);
        let mut sorted = x.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }
}
