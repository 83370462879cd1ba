// src/controller/hang.rs

//! Inactivity watchdog.
//!
//! The controller ticks the monitor once per `HANG_TICK_INTERVAL` while a
//! process is active and resets it on every output or state change. Once
//! the count passes the maximum the monitor reports `Expired` and the
//! controller escalates.

use std::time::Duration;

pub const HANG_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_HANG_TICKS: u32 = 10;
const MIN_HANG_TICKS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HangCheck {
    Alive,
    Expired,
}

#[derive(Debug, Clone)]
pub struct HangMonitor {
    count: u32,
    /// `None` means unbounded.
    max_count: Option<u32>,
    waiting_for_user: bool,
}

impl Default for HangMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HangMonitor {
    pub fn new() -> Self {
        Self {
            count: 0,
            max_count: Some(DEFAULT_MAX_HANG_TICKS),
            waiting_for_user: false,
        }
    }

    /// Timeouts below two seconds are raised to two; zero or negative
    /// disables hang detection.
    pub fn set_timeout_s(&mut self, timeout_s: i64) {
        self.max_count = if timeout_s > 0 {
            Some(u32::try_from(timeout_s).unwrap_or(u32::MAX).max(MIN_HANG_TICKS))
        } else {
            None
        };
    }

    pub fn max_count(&self) -> Option<u32> {
        self.max_count
    }

    /// The configured limit as a wall-clock duration.
    pub fn timeout(&self) -> Option<Duration> {
        self.max_count
            .map(|ticks| HANG_TICK_INTERVAL.saturating_mul(ticks))
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn tick(&mut self) -> HangCheck {
        if self.waiting_for_user {
            return HangCheck::Alive;
        }
        self.count = self.count.saturating_add(1);
        match self.max_count {
            Some(max) if self.count > max => HangCheck::Expired,
            _ => HangCheck::Alive,
        }
    }

    /// While set, ticks are ignored (a prompt is being shown).
    pub fn set_waiting_for_user(&mut self, waiting: bool) {
        self.waiting_for_user = waiting;
    }

    pub fn is_waiting_for_user(&self) -> bool {
        self.waiting_for_user
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_max_ticks() {
        let mut monitor = HangMonitor::new();
        monitor.set_timeout_s(3);
        assert_eq!(monitor.tick(), HangCheck::Alive);
        assert_eq!(monitor.tick(), HangCheck::Alive);
        assert_eq!(monitor.tick(), HangCheck::Alive);
        assert_eq!(monitor.tick(), HangCheck::Expired);
    }

    #[test]
    fn reset_restarts_the_count() {
        let mut monitor = HangMonitor::new();
        monitor.set_timeout_s(2);
        monitor.tick();
        monitor.tick();
        monitor.reset();
        assert_eq!(monitor.tick(), HangCheck::Alive);
        assert_eq!(monitor.count(), 1);
    }

    #[test]
    fn timeout_has_a_floor_of_two_ticks() {
        let mut monitor = HangMonitor::new();
        monitor.set_timeout_s(1);
        assert_eq!(monitor.max_count(), Some(2));
        assert_eq!(monitor.timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn non_positive_timeout_is_unbounded() {
        let mut monitor = HangMonitor::new();
        monitor.set_timeout_s(0);
        assert_eq!(monitor.max_count(), None);
        assert_eq!(monitor.timeout(), None);
        for _ in 0..1000 {
            assert_eq!(monitor.tick(), HangCheck::Alive);
        }
    }

    #[test]
    fn ticks_are_ignored_while_prompting() {
        let mut monitor = HangMonitor::new();
        monitor.set_timeout_s(2);
        monitor.set_waiting_for_user(true);
        for _ in 0..5 {
            assert_eq!(monitor.tick(), HangCheck::Alive);
        }
        assert_eq!(monitor.count(), 0);
    }

    #[test]
    fn default_is_ten_seconds() {
        assert_eq!(HangMonitor::new().timeout(), Some(Duration::from_secs(10)));
    }
}
