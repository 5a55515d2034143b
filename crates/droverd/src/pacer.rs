//! Process-wide spacing of agent request start times.

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use crate::sync;

/// Enforces a minimum delay between successive agent invocation start times.
///
/// The mutex is held across the sleep so start times are serialized for the
/// whole process; requests still overlap once started. A zero delay disables
/// pacing entirely.
pub struct RequestPacer {
    min_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request: Mutex::new(None),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        !self.min_delay.is_zero()
    }

    /// Block until this caller is allowed to start a request, then stamp the
    /// start time.
    pub fn pace(&self) {
        if self.min_delay.is_zero() {
            return;
        }

        let mut last = sync::lock(&self.last_request);
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_delay {
                thread::sleep(self.min_delay - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_request_is_not_delayed() {
        let pacer = RequestPacer::new(Duration::from_millis(200));
        let start = Instant::now();
        pacer.pace();
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn successive_starts_are_spaced_by_the_minimum_delay() {
        let pacer = RequestPacer::new(Duration::from_millis(60));

        pacer.pace();
        let between = Instant::now();
        pacer.pace();

        assert!(between.elapsed() >= Duration::from_millis(55));
    }

    #[test]
    fn zero_delay_disables_pacing() {
        let pacer = RequestPacer::disabled();
        assert!(!pacer.is_enabled());

        let start = Instant::now();
        for _ in 0..100 {
            pacer.pace();
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn concurrent_callers_serialize_their_start_times() {
        let pacer = Arc::new(RequestPacer::new(Duration::from_millis(40)));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let pacer = Arc::clone(&pacer);
                std::thread::spawn(move || pacer.pace())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Three starts with 40ms spacing need at least ~80ms in total.
        assert!(start.elapsed() >= Duration::from_millis(75));
    }
}
