// Idle timer - Cancel-and-reschedule deadline while the transport is stopped

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct IdleTimer {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl IdleTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// (Re)arm the timer from `now`
    pub fn touch(&mut self, now: Instant) {
        self.deadline = Some(now + self.timeout);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_reschedules() {
        let mut timer = IdleTimer::new(Duration::from_secs(2));
        let t0 = Instant::now();
        assert!(!timer.expired(t0 + Duration::from_secs(10)));

        timer.touch(t0);
        assert!(!timer.expired(t0 + Duration::from_secs(1)));
        timer.touch(t0 + Duration::from_secs(1));
        assert!(!timer.expired(t0 + Duration::from_secs(2)));
        assert!(timer.expired(t0 + Duration::from_secs(3)));

        timer.cancel();
        assert!(!timer.is_armed());
        assert!(!timer.expired(t0 + Duration::from_secs(3)));
    }
}
