//! Linearly increasing retry delays

use std::time::Duration;

/// Yields `step × n` before the `n`-th retry, until the attempt budget is
/// spent.
///
/// With a budget of three attempts and a one second step the sequence is
/// 1s, 2s, then `None`: the first attempt runs immediately.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    step: Duration,
    max_attempts: u32,
    retries: u32,
}

impl LinearBackoff {
    pub fn new(step: Duration, max_attempts: u32) -> Self {
        Self {
            step,
            max_attempts,
            retries: 0,
        }
    }

    /// Number of retries handed out so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

impl backoff::backoff::Backoff for LinearBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.retries + 1 >= self.max_attempts {
            return None;
        }
        self.retries += 1;
        Some(self.step * self.retries)
    }

    fn reset(&mut self) {
        self.retries = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::backoff::backoff::Backoff;

    #[test]
    fn delays_grow_linearly_until_budget_is_spent() {
        let mut backoff = LinearBackoff::new(Duration::from_millis(1000), 3);
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(1000)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(2000)));
        assert_eq!(backoff.next_backoff(), None);
        assert_eq!(backoff.retries(), 2);
    }

    #[test]
    fn single_attempt_never_retries() {
        let mut backoff = LinearBackoff::new(Duration::from_millis(1000), 1);
        assert_eq!(backoff.next_backoff(), None);
    }

    #[test]
    fn reset_restarts_the_sequence() {
        let mut backoff = LinearBackoff::new(Duration::from_millis(10), 3);
        backoff.next_backoff();
        backoff.reset();
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(10)));
    }
}
