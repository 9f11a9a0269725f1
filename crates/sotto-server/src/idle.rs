//! Per-session inactivity clock.
//!
//! Idleness is evaluated lazily at delivery time; there is no polling
//! timer. State lives only in memory: every process start begins with all
//! peers active, and entries die with their session.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::relay::SessionId;

#[derive(Debug, Default)]
pub struct IdleTracker {
    last_active: HashMap<SessionId, Instant>,
}

impl IdleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record activity for a session.
    pub fn touch(&mut self, session: SessionId) {
        self.touch_at(session, Instant::now());
    }

    pub fn touch_at(&mut self, session: SessionId, now: Instant) {
        self.last_active.insert(session, now);
    }

    /// Whether the session has been inactive for at least `threshold`.
    ///
    /// An unknown session counts as active: sessions are registered the
    /// moment they are admitted.
    pub fn is_idle(&self, session: SessionId, threshold: Duration) -> bool {
        self.is_idle_at(session, threshold, Instant::now())
    }

    pub fn is_idle_at(&self, session: SessionId, threshold: Duration, now: Instant) -> bool {
        match self.last_active.get(&session) {
            Some(last) => now.duration_since(*last) >= threshold,
            None => false,
        }
    }

    pub fn remove(&mut self, session: SessionId) {
        self.last_active.remove(&session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_session_is_active() {
        let mut tracker = IdleTracker::new();
        let session = SessionId::new();
        tracker.touch(session);
        assert!(!tracker.is_idle(session, Duration::from_secs(5)));
    }

    #[test]
    fn test_idle_boundary_is_inclusive() {
        let mut tracker = IdleTracker::new();
        let session = SessionId::new();
        let threshold = Duration::from_secs(5);

        let start = Instant::now();
        tracker.touch_at(session, start);

        // Strictly before the threshold: still active.
        assert!(!tracker.is_idle_at(session, threshold, start + threshold - Duration::from_millis(1)));
        // Exactly at the threshold or later: idle.
        assert!(tracker.is_idle_at(session, threshold, start + threshold));
        assert!(tracker.is_idle_at(session, threshold, start + threshold + Duration::from_secs(1)));
    }

    #[test]
    fn test_touch_resets_the_clock() {
        let mut tracker = IdleTracker::new();
        let session = SessionId::new();
        let threshold = Duration::from_secs(5);

        let start = Instant::now();
        tracker.touch_at(session, start);
        tracker.touch_at(session, start + Duration::from_secs(4));

        assert!(!tracker.is_idle_at(session, threshold, start + Duration::from_secs(6)));
        assert!(tracker.is_idle_at(session, threshold, start + Duration::from_secs(9)));
    }

    #[test]
    fn test_unknown_session_is_active() {
        let tracker = IdleTracker::new();
        assert!(!tracker.is_idle(SessionId::new(), Duration::ZERO));
    }

    #[test]
    fn test_removed_session_forgotten() {
        let mut tracker = IdleTracker::new();
        let session = SessionId::new();
        tracker.touch(session);
        tracker.remove(session);
        assert!(!tracker.is_idle(session, Duration::ZERO));
    }
}
