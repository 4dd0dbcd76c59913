// Reconnexion du bridge avec backoff exponentiel
// Piloté par l'appelant : le cœur ne réessaie jamais tout seul

use std::time::{Duration, Instant};

pub struct ReconnectionStrategy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    current_attempt: u32,
    next_attempt_at: Option<Instant>,
}

impl ReconnectionStrategy {
    pub fn new() -> Self {
        Self::with_limits(10, Duration::from_secs(1), Duration::from_secs(30))
    }

    pub fn with_limits(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            current_attempt: 0,
            next_attempt_at: None,
        }
    }

    /// Délai avant la prochaine tentative : base * 2^attempt, plafonné
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.current_attempt >= self.max_attempts {
            return None;
        }

        let factor = 2u32.saturating_pow(self.current_attempt);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        self.current_attempt += 1;
        Some(delay)
    }

    /// Planifie la prochaine tentative à partir de `now`
    ///
    /// Retourne false quand les tentatives sont épuisées.
    pub fn schedule(&mut self, now: Instant) -> bool {
        match self.next_delay() {
            Some(delay) => {
                self.next_attempt_at = Some(now + delay);
                true
            }
            None => {
                self.next_attempt_at = None;
                false
            }
        }
    }

    /// Vrai si une tentative planifiée est arrivée à échéance
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_attempt_at.is_some_and(|at| now >= at)
    }

    pub fn is_scheduled(&self) -> bool {
        self.next_attempt_at.is_some()
    }

    /// Réinitialise après une connexion réussie
    pub fn reset(&mut self) {
        self.current_attempt = 0;
        self.next_attempt_at = None;
    }

    pub fn should_retry(&self) -> bool {
        self.current_attempt < self.max_attempts
    }

    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }
}

impl Default for ReconnectionStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let mut strategy = ReconnectionStrategy::new();

        assert_eq!(strategy.next_delay(), Some(Duration::from_secs(1)));
        assert_eq!(strategy.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(strategy.next_delay(), Some(Duration::from_secs(4)));
        assert_eq!(strategy.next_delay(), Some(Duration::from_secs(8)));
        assert_eq!(strategy.next_delay(), Some(Duration::from_secs(16)));
        // plafond à 30s
        assert_eq!(strategy.next_delay(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_schedule_and_due() {
        let mut strategy = ReconnectionStrategy::new();
        let t0 = Instant::now();

        assert!(!strategy.is_due(t0));
        assert!(strategy.schedule(t0));
        assert!(!strategy.is_due(t0));
        assert!(strategy.is_due(t0 + Duration::from_secs(1)));

        strategy.reset();
        assert!(!strategy.is_scheduled());
        assert_eq!(strategy.current_attempt(), 0);
    }

    #[test]
    fn test_max_attempts() {
        let mut strategy =
            ReconnectionStrategy::with_limits(3, Duration::from_millis(10), Duration::from_secs(1));
        let now = Instant::now();

        assert!(strategy.schedule(now));
        assert!(strategy.schedule(now));
        assert!(strategy.schedule(now));
        assert!(!strategy.schedule(now));
        assert!(!strategy.should_retry());
        assert!(!strategy.is_scheduled());
    }
}
