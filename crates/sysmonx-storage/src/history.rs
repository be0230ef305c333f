use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use sysmonx_common::Sample;

/// Bounded in-memory series of the most recent samples, for live charts.
///
/// Holds at most `capacity` samples in insertion order; pushing onto a full
/// history evicts the oldest sample first.
pub struct RingHistory {
    capacity: usize,
    samples: Mutex<VecDeque<Sample>>,
}

impl RingHistory {
    /// A `capacity` of 0 is raised to 1; configuration validation rejects
    /// it before a collector is ever built. Storage grows with use, so a
    /// large capacity costs nothing until it is filled.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: Mutex::new(VecDeque::new()),
        }
    }

    /// Lock the series, recovering from a poisoned Mutex if necessary.
    fn lock_samples(&self) -> MutexGuard<'_, VecDeque<Sample>> {
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, sample: Sample) {
        let mut samples = self.lock_samples();
        if samples.len() >= self.capacity {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    /// Samples taken within `window` of now, oldest first.
    pub fn recent(&self, window: Duration) -> Vec<Sample> {
        match chrono::Duration::from_std(window) {
            Ok(window) => self.since(Local::now() - window),
            // A window too large to represent covers everything.
            Err(_) => self.snapshot(),
        }
    }

    /// Samples with `timestamp >= cutoff`, oldest first.
    pub fn since(&self, cutoff: DateTime<Local>) -> Vec<Sample> {
        self.lock_samples()
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    /// Every retained sample, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.lock_samples().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.lock_samples().clear();
    }

    pub fn len(&self) -> usize {
        self.lock_samples().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_samples().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sample_at(secs_ago: i64, cpu: f64) -> Sample {
        let mut sample = Sample::unavailable(Local::now() - chrono::Duration::seconds(secs_ago));
        sample.cpu_percent = Some(cpu);
        sample
    }

    fn cpu_values(samples: &[Sample]) -> Vec<f64> {
        samples.iter().filter_map(|s| s.cpu_percent).collect()
    }

    #[test]
    fn push_evicts_oldest_at_capacity() {
        let history = RingHistory::new(5);
        for (i, cpu) in [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0].iter().enumerate() {
            history.push(sample_at(7 - i as i64, *cpu));
            assert!(history.len() <= 5);
        }
        assert_eq!(history.len(), 5);
        assert_eq!(
            cpu_values(&history.recent(Duration::from_secs(300))),
            vec![30.0, 40.0, 50.0, 60.0, 70.0]
        );
    }

    #[test]
    fn recent_filters_by_window() {
        let history = RingHistory::new(10);
        history.push(sample_at(600, 1.0));
        history.push(sample_at(120, 2.0));
        history.push(sample_at(5, 3.0));

        assert_eq!(cpu_values(&history.recent(Duration::from_secs(60))), vec![3.0]);
        assert_eq!(cpu_values(&history.recent(Duration::from_secs(300))), vec![2.0, 3.0]);
        assert_eq!(history.len(), 3, "recent must not mutate");
    }

    #[test]
    fn huge_window_returns_everything() {
        let history = RingHistory::new(3);
        history.push(sample_at(100_000, 1.0));
        assert_eq!(history.recent(Duration::MAX).len(), 1);
    }

    #[test]
    fn clear_empties_history() {
        let history = RingHistory::new(3);
        history.push(sample_at(1, 1.0));
        assert_eq!(history.len(), 1);
        history.clear();
        assert!(history.is_empty());
        assert!(history.snapshot().is_empty());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let history = RingHistory::new(0);
        history.push(sample_at(2, 1.0));
        history.push(sample_at(1, 2.0));
        assert_eq!(history.capacity(), 1);
        assert_eq!(cpu_values(&history.snapshot()), vec![2.0]);
    }

    #[test]
    fn huge_capacity_allocates_lazily() {
        let history = RingHistory::new(1 << 62);
        history.push(sample_at(1, 1.0));
        assert_eq!(history.capacity(), 1 << 62);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn concurrent_push_and_read_stay_bounded() {
        let history = Arc::new(RingHistory::new(50));
        let writer = {
            let history = history.clone();
            std::thread::spawn(move || {
                for i in 0..1000 {
                    history.push(sample_at(0, (i % 100) as f64));
                }
            })
        };
        for _ in 0..200 {
            assert!(history.recent(Duration::from_secs(60)).len() <= 50);
        }
        writer.join().unwrap();
        assert_eq!(history.len(), 50);
    }
}
