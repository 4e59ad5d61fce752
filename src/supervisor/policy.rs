//! Crash-loop protection for automatic respawns

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When to respawn after an unrequested exit.
///
/// A process that ran for at least `min_uptime` is respawned at once. Each
/// shorter run in a row doubles the delay, starting at `initial_delay` and
/// capped at `max_delay`; after `max_fast_crashes` of them in a row the
/// supervisor gives up. Zero `max_fast_crashes` never gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
    #[serde(with = "humantime_serde", default = "default_min_uptime")]
    pub min_uptime: Duration,
    #[serde(with = "humantime_serde", default = "default_initial_delay")]
    pub initial_delay: Duration,
    #[serde(with = "humantime_serde", default = "default_max_delay")]
    pub max_delay: Duration,
    #[serde(default = "default_max_fast_crashes")]
    pub max_fast_crashes: u32,
}

fn default_min_uptime() -> Duration {
    Duration::from_secs(10)
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_max_fast_crashes() -> u32 {
    5
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            min_uptime: default_min_uptime(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            max_fast_crashes: default_max_fast_crashes(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Immediate,
    After(Duration),
    GiveUp { fast_crashes: u32 },
}

/// Consecutive short runs seen so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrashTracker {
    pub fast_crashes: u32,
}

impl RestartPolicy {
    pub fn decide(&self, uptime: Duration, tracker: &mut CrashTracker) -> RestartDecision {
        if uptime >= self.min_uptime {
            tracker.fast_crashes = 0;
            return RestartDecision::Immediate;
        }

        tracker.fast_crashes += 1;
        if self.max_fast_crashes > 0 && tracker.fast_crashes >= self.max_fast_crashes {
            return RestartDecision::GiveUp {
                fast_crashes: tracker.fast_crashes,
            };
        }

        let doublings = (tracker.fast_crashes - 1).min(16);
        let delay = self
            .initial_delay
            .saturating_mul(1u32 << doublings)
            .min(self.max_delay);
        RestartDecision::After(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RestartPolicy {
        RestartPolicy {
            min_uptime: Duration::from_secs(10),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            max_fast_crashes: 5,
        }
    }

    #[test]
    fn test_long_runs_restart_immediately() {
        let mut tracker = CrashTracker { fast_crashes: 3 };
        assert_eq!(
            policy().decide(Duration::from_secs(60), &mut tracker),
            RestartDecision::Immediate
        );
        assert_eq!(tracker.fast_crashes, 0);
    }

    #[test]
    fn test_fast_crashes_back_off_then_give_up() {
        let policy = policy();
        let mut tracker = CrashTracker::default();
        let short = Duration::from_millis(200);

        let delays: Vec<_> = (0..4).map(|_| policy.decide(short, &mut tracker)).collect();
        assert_eq!(
            delays,
            vec![
                RestartDecision::After(Duration::from_secs(1)),
                RestartDecision::After(Duration::from_secs(2)),
                RestartDecision::After(Duration::from_secs(4)),
                RestartDecision::After(Duration::from_secs(5)),
            ]
        );
        assert_eq!(
            policy.decide(short, &mut tracker),
            RestartDecision::GiveUp { fast_crashes: 5 }
        );
    }

    #[test]
    fn test_zero_limit_never_gives_up() {
        let policy = RestartPolicy {
            max_fast_crashes: 0,
            ..policy()
        };
        let mut tracker = CrashTracker::default();
        for _ in 0..50 {
            assert!(matches!(
                policy.decide(Duration::ZERO, &mut tracker),
                RestartDecision::After(_)
            ));
        }
    }
}
