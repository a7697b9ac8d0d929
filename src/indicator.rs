//! Turn-signal edge detection with a trailing "signals off" debounce.
//!
//! The dashboard reports the indicator lamp itself, so a steadily blinking
//! indicator shows up as the bit toggling on and off. Every edge pushes the
//! "off" decision back by the debounce window; only when the lamp has been
//! quiet for a whole window is the signal considered switched off.

use crate::announce::SignalCommand;
use crate::clock::{Clock, Millis, TimerEvent, TimerHandle};
use crate::dashboard::{TelemetrySample, VehicleId};
use crate::sink::CommandSink;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Default debounce window. Has to be longer than the gap between lamp
/// on and lamp off while blinking.
pub const DEFAULT_DEBOUNCE_MS: Millis = 1100;

/// Shortest window accepted from configuration. Lamps blink at roughly
/// 500 ms on, 500 ms off, so anything shorter drops the signal mid-blink.
pub const MIN_DEBOUNCE_MS: Millis = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActiveSignal {
    #[default]
    Off,
    Left,
    Right,
    All,
}

impl ActiveSignal {
    const fn command(self) -> SignalCommand {
        match self {
            ActiveSignal::Off => SignalCommand::Off,
            ActiveSignal::Left => SignalCommand::Left,
            ActiveSignal::Right => SignalCommand::Right,
            ActiveSignal::All => SignalCommand::All,
        }
    }
}

/// Per-vehicle detector state. `active == Off` implies `!light_phase_on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignalState {
    pub active: ActiveSignal,
    pub light_phase_on: bool,
    pending_off: Option<TimerHandle>,
}

impl SignalState {
    pub const fn pending_off(&self) -> Option<TimerHandle> {
        self.pending_off
    }
}

enum Edge {
    On(ActiveSignal),
    Dark,
}

#[derive(Debug)]
pub struct IndicatorStateMachine {
    vehicles: HashMap<VehicleId, SignalState>,
    debounce_ms: Millis,
}

impl IndicatorStateMachine {
    pub fn new() -> Self {
        Self::with_debounce(DEFAULT_DEBOUNCE_MS)
    }

    pub fn with_debounce(debounce_ms: Millis) -> Self {
        Self {
            vehicles: HashMap::new(),
            debounce_ms,
        }
    }

    pub const fn debounce_ms(&self) -> Millis {
        self.debounce_ms
    }

    /// Feeds one telemetry sample. Emits at most one command.
    pub fn on_telemetry<C, S>(&mut self, sample: TelemetrySample, clock: &mut C, sink: &mut S)
    where
        C: Clock + ?Sized,
        S: CommandSink + ?Sized,
    {
        let vehicle = sample.vehicle;
        let debounce_ms = self.debounce_ms;
        let state = self.vehicles.entry(vehicle).or_default();

        let Some(edge) = detect_edge(state, sample) else {
            return;
        };

        if let Some(previous) = state.pending_off.take() {
            clock.cancel(previous);
        }
        state.pending_off = Some(clock.after(debounce_ms, TimerEvent::SignalsOff { vehicle }));

        match edge {
            Edge::On(signal) => {
                if state.active != signal {
                    debug!(vehicle, ?signal, "signal on");
                    sink.send_text(&signal.command().hidden_command(vehicle));
                }
                state.active = signal;
                state.light_phase_on = true;
            }
            Edge::Dark => {
                debug!(vehicle, signal = ?state.active, "signal lamp dark");
                state.light_phase_on = false;
            }
        }
    }

    /// Debounce timer fired. Ignores handles this vehicle no longer owns.
    pub fn on_signals_off<S>(&mut self, vehicle: VehicleId, handle: TimerHandle, sink: &mut S) -> bool
    where
        S: CommandSink + ?Sized,
    {
        let Some(state) = self.vehicles.get_mut(&vehicle) else {
            return false;
        };
        if state.pending_off != Some(handle) {
            return false;
        }

        debug!(vehicle, signal = ?state.active, "signals off");
        *state = SignalState::default();
        sink.send_text(&SignalCommand::Off.hidden_command(vehicle));
        true
    }

    /// Drops a vehicle's slot, cancelling its debounce timer without an
    /// "off" command.
    pub fn release_vehicle<C>(&mut self, vehicle: VehicleId, clock: &mut C) -> bool
    where
        C: Clock + ?Sized,
    {
        let Some(state) = self.vehicles.remove(&vehicle) else {
            return false;
        };
        if let Some(handle) = state.pending_off {
            clock.cancel(handle);
        }
        debug!(vehicle, "released vehicle");
        true
    }

    pub fn get_state(&self, vehicle: VehicleId) -> SignalState {
        self.vehicles.get(&vehicle).copied().unwrap_or_default()
    }

    pub fn tracked_vehicles(&self) -> usize {
        self.vehicles.len()
    }
}

impl Default for IndicatorStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

// First match wins: hazards before single sides, a side's dark edge before
// the other side's on edge.
fn detect_edge(state: &SignalState, sample: TelemetrySample) -> Option<Edge> {
    let left = sample.lights.left();
    let right = sample.lights.right();
    let active = state.active;
    let lit = state.light_phase_on;

    if left && right && (active != ActiveSignal::All || !lit) {
        return Some(Edge::On(ActiveSignal::All));
    }
    if left && !right && (active != ActiveSignal::Left || !lit) {
        return Some(Edge::On(ActiveSignal::Left));
    }
    if active == ActiveSignal::Left && lit && !left {
        return Some(Edge::Dark);
    }
    if right && !left && (active != ActiveSignal::Right || !lit) {
        return Some(Edge::On(ActiveSignal::Right));
    }
    if active == ActiveSignal::Right && lit && !right {
        return Some(Edge::Dark);
    }
    if active == ActiveSignal::All && lit && !left && !right {
        return Some(Edge::Dark);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TimerQueue;
    use crate::dashboard::DashLights;
    use crate::sink::RecordingSink;

    const LEFT: u32 = DashLights::SIGNAL_L;
    const RIGHT: u32 = DashLights::SIGNAL_R;
    const BOTH: u32 = DashLights::SIGNAL_L | DashLights::SIGNAL_R;

    fn feed(
        machine: &mut IndicatorStateMachine,
        timers: &mut TimerQueue,
        sink: &mut RecordingSink,
        lights: u32,
    ) {
        machine.on_telemetry(TelemetrySample::new(1, lights), timers, sink);
    }

    #[test]
    fn test_new_vehicle_starts_off() {
        let machine = IndicatorStateMachine::new();
        let state = machine.get_state(9);
        assert_eq!(state.active, ActiveSignal::Off);
        assert!(!state.light_phase_on);
        assert!(state.pending_off().is_none());
    }

    #[test]
    fn test_left_on_emits_once_and_arms_timer() {
        let mut machine = IndicatorStateMachine::new();
        let mut timers = TimerQueue::new();
        let mut sink = RecordingSink::new();

        feed(&mut machine, &mut timers, &mut sink, LEFT);

        assert_eq!(sink.texts(), vec!["/i DL_SIGNAL_L 1"]);
        let state = machine.get_state(1);
        assert_eq!(state.active, ActiveSignal::Left);
        assert!(state.light_phase_on);
        assert_eq!(timers.deadline_of(state.pending_off().unwrap()), Some(DEFAULT_DEBOUNCE_MS));
    }

    #[test]
    fn test_dark_edge_keeps_signal_and_rearms() {
        let mut machine = IndicatorStateMachine::new();
        let mut timers = TimerQueue::new();
        let mut sink = RecordingSink::new();

        feed(&mut machine, &mut timers, &mut sink, LEFT);
        let first = machine.get_state(1).pending_off().unwrap();

        timers.set_now(400);
        feed(&mut machine, &mut timers, &mut sink, 0);

        let state = machine.get_state(1);
        assert_eq!(state.active, ActiveSignal::Left);
        assert!(!state.light_phase_on);
        assert!(!timers.is_armed(first));
        assert_eq!(timers.deadline_of(state.pending_off().unwrap()), Some(400 + DEFAULT_DEBOUNCE_MS));
        assert_eq!(timers.get_armed().len(), 1);
        assert_eq!(sink.texts().len(), 1);
    }

    #[test]
    fn test_dark_samples_while_off_are_ignored() {
        let mut machine = IndicatorStateMachine::new();
        let mut timers = TimerQueue::new();
        let mut sink = RecordingSink::new();

        feed(&mut machine, &mut timers, &mut sink, 0);
        feed(&mut machine, &mut timers, &mut sink, DashLights::HANDBRAKE);

        assert!(sink.commands().is_empty());
        assert!(timers.next_deadline().is_none());
    }

    #[test]
    fn test_left_to_right_takes_a_dark_edge_first() {
        let mut machine = IndicatorStateMachine::new();
        let mut timers = TimerQueue::new();
        let mut sink = RecordingSink::new();

        feed(&mut machine, &mut timers, &mut sink, LEFT);
        feed(&mut machine, &mut timers, &mut sink, RIGHT);
        assert_eq!(machine.get_state(1).active, ActiveSignal::Left);
        assert!(!machine.get_state(1).light_phase_on);

        feed(&mut machine, &mut timers, &mut sink, RIGHT);
        assert_eq!(machine.get_state(1).active, ActiveSignal::Right);
        assert_eq!(sink.texts(), vec!["/i DL_SIGNAL_L 1", "/i DL_SIGNAL_R 1"]);
    }

    #[test]
    fn test_stale_handle_does_not_reset() {
        let mut machine = IndicatorStateMachine::new();
        let mut timers = TimerQueue::new();
        let mut sink = RecordingSink::new();

        feed(&mut machine, &mut timers, &mut sink, BOTH);
        let stale = machine.get_state(1).pending_off().unwrap();
        feed(&mut machine, &mut timers, &mut sink, 0);

        assert!(!machine.on_signals_off(1, stale, &mut sink));
        assert_eq!(machine.get_state(1).active, ActiveSignal::All);
        assert!(!machine.on_signals_off(42, stale, &mut sink));
    }

    #[test]
    fn test_release_vehicle_cancels_timer_silently() {
        let mut machine = IndicatorStateMachine::new();
        let mut timers = TimerQueue::new();
        let mut sink = RecordingSink::new();

        feed(&mut machine, &mut timers, &mut sink, LEFT);
        sink.clear();

        assert!(machine.release_vehicle(1, &mut timers));
        assert!(timers.next_deadline().is_none());
        assert_eq!(machine.tracked_vehicles(), 0);
        assert!(sink.commands().is_empty());
        assert!(!machine.release_vehicle(1, &mut timers));
    }
}
