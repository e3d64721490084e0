//! Cooldown tracking.
//!
//! Maps a node group to the time (epoch milliseconds) of its last
//! successful scaling action. Not synchronized: the owner serializes access.

use std::collections::HashMap;

/// Last-scale timestamps per node group.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    last_scale: HashMap<String, u64>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `group` may scale at `now`. Groups never scaled are eligible;
    /// otherwise at least `cooldown_ms` must have elapsed.
    pub fn is_eligible(&self, group: &str, now: u64, cooldown_ms: u64) -> bool {
        self.remaining(group, now, cooldown_ms).is_none()
    }

    /// Time left in the cooldown window, if any.
    pub fn remaining(&self, group: &str, now: u64, cooldown_ms: u64) -> Option<u64> {
        let last = *self.last_scale.get(group)?;
        let elapsed = now.saturating_sub(last);
        (elapsed < cooldown_ms).then(|| cooldown_ms - elapsed)
    }

    /// Record a successful scaling action.
    pub fn record_scale(&mut self, group: &str, now: u64) {
        self.last_scale.insert(group.to_string(), now);
    }

    /// Drop a group's entry (group deleted).
    pub fn forget(&mut self, group: &str) {
        self.last_scale.remove(group);
    }

    pub fn last_scale(&self, group: &str) -> Option<u64> {
        self.last_scale.get(group).copied()
    }

    pub fn len(&self) -> usize {
        self.last_scale.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_scale.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN_MS: u64 = 180_000;

    #[test]
    fn never_scaled_is_eligible() {
        let tracker = CooldownTracker::new();
        assert!(tracker.is_eligible("web-pool", 0, COOLDOWN_MS));
        assert!(tracker.is_empty());
    }

    #[test]
    fn window_edges() {
        let mut tracker = CooldownTracker::new();
        let t = 1_700_000_000_000;
        tracker.record_scale("web-pool", t);

        assert!(!tracker.is_eligible("web-pool", t, COOLDOWN_MS));
        assert!(!tracker.is_eligible("web-pool", t + COOLDOWN_MS - 1, COOLDOWN_MS));
        assert!(tracker.is_eligible("web-pool", t + COOLDOWN_MS, COOLDOWN_MS));
        assert_eq!(tracker.remaining("web-pool", t + 1000, COOLDOWN_MS), Some(179_000));
    }

    #[test]
    fn zero_cooldown_is_always_eligible() {
        let mut tracker = CooldownTracker::new();
        tracker.record_scale("web-pool", 5);
        assert!(tracker.is_eligible("web-pool", 5, 0));
    }

    #[test]
    fn clock_going_backwards_stays_in_cooldown() {
        let mut tracker = CooldownTracker::new();
        tracker.record_scale("web-pool", 10_000);
        assert!(!tracker.is_eligible("web-pool", 9_000, COOLDOWN_MS));
    }

    #[test]
    fn groups_are_independent() {
        let mut tracker = CooldownTracker::new();
        tracker.record_scale("web-pool", 1000);
        assert!(tracker.is_eligible("batch-pool", 1000, COOLDOWN_MS));
    }

    #[test]
    fn forget_removes_entry() {
        let mut tracker = CooldownTracker::new();
        tracker.record_scale("web-pool", 1000);
        assert_eq!(tracker.len(), 1);

        tracker.forget("web-pool");
        assert!(tracker.is_empty());
        assert_eq!(tracker.last_scale("web-pool"), None);
        assert!(tracker.is_eligible("web-pool", 1001, COOLDOWN_MS));
    }
}
