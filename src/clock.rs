use crate::dashboard::VehicleId;
use crate::intersection::IntersectionId;
use serde::{Deserialize, Serialize};

/// Milliseconds on the engine's monotonic timeline.
pub type Millis = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerHandle(u64);

/// What a timer does when it fires. The engine dispatches it to the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerEvent {
    SignalsOff { vehicle: VehicleId },
    PhaseElapsed { intersection: IntersectionId },
}

/// The only timing primitive the state machines need.
pub trait Clock {
    fn now_ms(&self) -> Millis;

    /// Arms a one-shot timer `delay_ms` from now.
    fn after(&mut self, delay_ms: Millis, event: TimerEvent) -> TimerHandle;

    /// Cancels a timer that has not fired yet. Returns false if it was
    /// already fired or cancelled.
    fn cancel(&mut self, handle: TimerHandle) -> bool;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmedTimer {
    pub handle: TimerHandle,
    pub deadline: Millis,
    pub event: TimerEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimerStats {
    pub total_armed: u64,
    pub total_fired: u64,
    pub total_cancelled: u64,
    pub currently_armed: usize,
}

/// Deadline-ordered timer queue driven by an explicit timeline.
///
/// Nothing fires on its own: the owner calls [`TimerQueue::pop_due`] with the
/// current time. While popping, "now" moves to each timer's own deadline, so a
/// timer re-armed from a firing event is measured from when it was due rather
/// than from when the owner got around to polling.
#[derive(Debug)]
pub struct TimerQueue {
    now: Millis,
    next_handle: u64,
    // sorted by (deadline, handle)
    armed: Vec<ArmedTimer>,
    stats: TimerStats,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(now: Millis) -> Self {
        Self {
            now,
            next_handle: 1,
            armed: Vec::new(),
            stats: TimerStats::default(),
        }
    }

    /// Earliest armed deadline, if any.
    pub fn next_deadline(&self) -> Option<Millis> {
        self.armed.first().map(|timer| timer.deadline)
    }

    /// Removes and returns the earliest timer due at or before `now`.
    pub fn pop_due(&mut self, now: Millis) -> Option<(TimerHandle, TimerEvent)> {
        match self.armed.first() {
            Some(timer) if timer.deadline <= now => {}
            _ => return None,
        }

        let timer = self.armed.remove(0);
        self.now = self.now.max(timer.deadline);
        self.stats.total_fired += 1;
        self.stats.currently_armed = self.armed.len();

        Some((timer.handle, timer.event))
    }

    /// Moves the timeline forward. Time never runs backwards.
    pub fn set_now(&mut self, now: Millis) {
        self.now = self.now.max(now);
    }

    pub fn is_armed(&self, handle: TimerHandle) -> bool {
        self.armed.iter().any(|timer| timer.handle == handle)
    }

    pub fn deadline_of(&self, handle: TimerHandle) -> Option<Millis> {
        self.armed
            .iter()
            .find(|timer| timer.handle == handle)
            .map(|timer| timer.deadline)
    }

    pub fn get_armed(&self) -> &[ArmedTimer] {
        &self.armed
    }

    pub fn get_stats(&self) -> &TimerStats {
        &self.stats
    }
}

impl Clock for TimerQueue {
    fn now_ms(&self) -> Millis {
        self.now
    }

    fn after(&mut self, delay_ms: Millis, event: TimerEvent) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;

        let deadline = self.now.saturating_add(delay_ms);
        let timer = ArmedTimer {
            handle,
            deadline,
            event,
        };

        // Keep arming order among equal deadlines
        let insert_position = self
            .armed
            .iter()
            .position(|armed| armed.deadline > deadline)
            .unwrap_or(self.armed.len());
        self.armed.insert(insert_position, timer);

        self.stats.total_armed += 1;
        self.stats.currently_armed = self.armed.len();

        handle
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        let Some(index) = self.armed.iter().position(|timer| timer.handle == handle) else {
            return false;
        };

        self.armed.remove(index);
        self.stats.total_cancelled += 1;
        self.stats.currently_armed = self.armed.len();
        true
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn off(vehicle: VehicleId) -> TimerEvent {
        TimerEvent::SignalsOff { vehicle }
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let mut timers = TimerQueue::new();
        timers.after(300, off(3));
        timers.after(100, off(1));
        timers.after(200, off(2));

        assert_eq!(timers.next_deadline(), Some(100));
        assert!(timers.pop_due(50).is_none());

        let fired: Vec<TimerEvent> = core::iter::from_fn(|| timers.pop_due(1000))
            .map(|(_, event)| event)
            .collect();
        assert_eq!(fired, vec![off(1), off(2), off(3)]);
        assert_eq!(timers.get_stats().total_fired, 3);
    }

    #[test]
    fn test_equal_deadlines_keep_arming_order() {
        let mut timers = TimerQueue::new();
        let first = timers.after(100, off(1));
        let second = timers.after(100, off(2));

        assert_eq!(timers.pop_due(100).map(|(h, _)| h), Some(first));
        assert_eq!(timers.pop_due(100).map(|(h, _)| h), Some(second));
    }

    #[test]
    fn test_cancel_removes_timer_once() {
        let mut timers = TimerQueue::new();
        let handle = timers.after(100, off(1));

        assert!(timers.is_armed(handle));
        assert!(timers.cancel(handle));
        assert!(!timers.cancel(handle));
        assert!(timers.pop_due(1000).is_none());
        assert_eq!(timers.get_stats().total_cancelled, 1);
        assert_eq!(timers.get_stats().currently_armed, 0);
    }

    #[test]
    fn test_rearm_from_fire_is_measured_from_deadline() {
        let mut timers = TimerQueue::new();
        timers.after(2000, off(1));

        // polled late, at 2350
        let (_, event) = timers.pop_due(2350).unwrap();
        assert_eq!(event, off(1));
        assert_eq!(timers.now_ms(), 2000);

        let handle = timers.after(3000, off(1));
        assert_eq!(timers.deadline_of(handle), Some(5000));
    }

    #[test]
    fn test_time_never_runs_backwards() {
        let mut timers = TimerQueue::starting_at(500);
        timers.set_now(100);
        assert_eq!(timers.now_ms(), 500);
        timers.set_now(900);
        assert_eq!(timers.now_ms(), 900);
    }
}
