use crate::announce::Announcement;
use crate::clock::{Clock, Millis, TimerEvent, TimerHandle, TimerQueue};
use crate::config::{AppConfig, IntersectionConfig};
use crate::dashboard::{TelemetrySample, VehicleId};
use crate::indicator::IndicatorStateMachine;
use crate::intersection::{ConfigurationError, IntersectionId, IntersectionScheduler, IntersectionStatus, Phase};
use crate::signal::LightId;
use crate::sink::CommandSink;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Everything that can happen to the engine besides a timer firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Telemetry(TelemetrySample),
    HiddenMessage(String),
    PlayerLeft(VehicleId),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineState {
    pub now_ms: Millis,
    pub telemetry_count: u64,
    pub announcements: u64,
    pub timers_fired: u64,
    pub stale_timers: u64,
}

/// Single owner of both state machines, their timers and the sink.
///
/// All mutation goes through `&mut self`, so telemetry and timer firings for
/// any vehicle or intersection are serialized with respect to each other.
#[derive(Debug)]
pub struct SignalEngine<S: CommandSink> {
    timers: TimerQueue,
    indicators: IndicatorStateMachine,
    intersections: IntersectionScheduler,
    sink: S,
    state: EngineState,
}

impl<S: CommandSink> SignalEngine<S> {
    pub fn new(debounce_ms: Millis, sink: S) -> Self {
        Self {
            timers: TimerQueue::new(),
            indicators: IndicatorStateMachine::with_debounce(debounce_ms),
            intersections: IntersectionScheduler::new(),
            sink,
            state: EngineState::default(),
        }
    }

    /// Builds an engine and starts every configured intersection at `now`.
    pub fn from_config(config: &AppConfig, sink: S, now: Millis) -> Result<Self, ConfigurationError> {
        let mut engine = Self::new(config.indicators.debounce_ms, sink);
        engine.timers.set_now(now);
        for intersection in &config.intersections {
            engine.add_intersection(intersection)?;
        }
        Ok(engine)
    }

    pub fn add_intersection(&mut self, config: &IntersectionConfig) -> Result<IntersectionId, ConfigurationError> {
        let id = self.create_intersection(&config.lights, config.phases.clone())?;
        info!(intersection = id.0, name = %config.name, "intersection running");
        Ok(id)
    }

    pub fn create_intersection(
        &mut self,
        light_ids: &[LightId],
        phases: Vec<Phase>,
    ) -> Result<IntersectionId, ConfigurationError> {
        self.intersections
            .create_intersection(light_ids, phases, &mut self.timers, &mut self.sink)
    }

    /// Fires due timers, then applies `input` at `now`.
    pub fn handle(&mut self, input: Input, now: Millis) {
        self.advance_to(now);

        match input {
            Input::Telemetry(sample) => {
                self.state.telemetry_count += 1;
                self.indicators
                    .on_telemetry(sample, &mut self.timers, &mut self.sink);
            }
            Input::HiddenMessage(text) => {
                if let Some(announcement) = Announcement::parse(&text) {
                    debug!(message = %text, "announcing");
                    self.state.announcements += 1;
                    self.sink.show_message(announcement.text());
                }
            }
            Input::PlayerLeft(vehicle) => {
                self.indicators.release_vehicle(vehicle, &mut self.timers);
            }
        }
    }

    /// Fires every timer due at or before `now`, in deadline order.
    pub fn advance_to(&mut self, now: Millis) {
        while let Some((handle, event)) = self.timers.pop_due(now) {
            self.dispatch(handle, event);
        }
        self.timers.set_now(now);
        self.state.now_ms = self.timers.now_ms();
    }

    fn dispatch(&mut self, handle: TimerHandle, event: TimerEvent) {
        self.state.timers_fired += 1;

        let owned = match event {
            TimerEvent::SignalsOff { vehicle } => {
                self.indicators.on_signals_off(vehicle, handle, &mut self.sink)
            }
            TimerEvent::PhaseElapsed { intersection } => self.intersections.on_phase_elapsed(
                intersection,
                handle,
                &mut self.timers,
                &mut self.sink,
            ),
        };

        if !owned {
            self.state.stale_timers += 1;
            debug!(?event, "ignored stale timer");
        }
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        self.timers.next_deadline()
    }

    pub fn now_ms(&self) -> Millis {
        self.timers.now_ms()
    }

    pub fn get_state(&self) -> &EngineState {
        &self.state
    }

    pub fn indicators(&self) -> &IndicatorStateMachine {
        &self.indicators
    }

    pub fn intersections(&self) -> &IntersectionScheduler {
        &self.intersections
    }

    pub fn intersection_status(&self, id: IntersectionId) -> Option<IntersectionStatus> {
        self.intersections.get_status(id)
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
