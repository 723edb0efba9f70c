use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Bounds how many times a crashed project gets restarted automatically.
///
/// Unlike a cooldown breaker that blocks everything for a fixed period after
/// tripping, this tracks a rolling window: `max_failures` crashes inside
/// `window` is what trips it, and the window resets once a child has run
/// continuously for `window` without crashing again. A project that crashes
/// once a week forever keeps restarting; one that crashes three times in
/// five minutes stops and surfaces as `project_error`.
#[derive(Debug, Clone)]
pub struct RestartBudget {
    max_failures: u32,
    window: ChronoDuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Still under budget, go ahead and restart.
    Allow,
    /// Budget exhausted for this window, mark the project `Error` instead.
    Deny,
}

impl RestartBudget {
    pub fn new(max_failures: u32, window_secs: u64) -> Self {
        Self {
            max_failures,
            window: ChronoDuration::seconds(window_secs as i64),
        }
    }

    /// Call when a child has been observed crashing. `restart_count` and
    /// `restart_window_start` are read from and written back into the
    /// record being evaluated, so the caller owns persistence.
    pub fn record_crash(
        &self,
        restart_count: u32,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> (RestartDecision, u32, DateTime<Utc>) {
        let (count, window_start) = if now - window_start > self.window {
            (1, now)
        } else {
            (restart_count + 1, window_start)
        };

        if count > self.max_failures {
            (RestartDecision::Deny, count, window_start)
        } else {
            (RestartDecision::Allow, count, window_start)
        }
    }

    /// Call when a child has been continuously `Running` for at least
    /// `window` since its last restart, so an old streak of crashes doesn't
    /// linger forever and eventually deny a restart that's unrelated to it.
    pub fn maybe_reset(
        &self,
        restart_count: u32,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> (u32, DateTime<Utc>) {
        if restart_count > 0 && now - window_start > self.window {
            (0, now)
        } else {
            (restart_count, window_start)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_restarts_under_the_threshold() {
        let budget = RestartBudget::new(3, 300);
        let now = Utc::now();
        let (decision, count, _) = budget.record_crash(0, now, now);
        assert_eq!(decision, RestartDecision::Allow);
        assert_eq!(count, 1);
    }

    #[test]
    fn denies_once_the_fourth_crash_lands_inside_the_window() {
        let budget = RestartBudget::new(3, 300);
        let start = Utc::now();
        let mut count = 0;
        let mut window_start = start;
        let mut decision = RestartDecision::Allow;
        for i in 0..4 {
            let now = start + ChronoDuration::seconds(i * 10);
            let (d, c, w) = budget.record_crash(count, window_start, now);
            decision = d;
            count = c;
            window_start = w;
        }
        assert_eq!(decision, RestartDecision::Deny);
        assert_eq!(count, 4);
    }

    #[test]
    fn window_rolls_over_once_it_elapses() {
        let budget = RestartBudget::new(3, 300);
        let start = Utc::now();
        let later = start + ChronoDuration::seconds(301);
        let (decision, count, window_start) = budget.record_crash(3, start, later);
        assert_eq!(decision, RestartDecision::Allow);
        assert_eq!(count, 1);
        assert_eq!(window_start, later);
    }

    #[test]
    fn maybe_reset_clears_count_after_a_healthy_window() {
        let budget = RestartBudget::new(3, 300);
        let start = Utc::now();
        let later = start + ChronoDuration::seconds(301);
        let (count, window_start) = budget.maybe_reset(2, start, later);
        assert_eq!(count, 0);
        assert_eq!(window_start, later);
    }

    #[test]
    fn maybe_reset_is_a_no_op_inside_the_window() {
        let budget = RestartBudget::new(3, 300);
        let start = Utc::now();
        let soon = start + ChronoDuration::seconds(10);
        let (count, window_start) = budget.maybe_reset(2, start, soon);
        assert_eq!(count, 2);
        assert_eq!(window_start, start);
    }
}
