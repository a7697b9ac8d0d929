//! Cyclic traffic-light phase scheduling.
//!
//! Each intersection owns an ordered list of phases and walks through them
//! forever: on entering a phase every light is set, and a one-shot timer for
//! the phase duration moves the cycle on. Intersections share nothing but the
//! clock and the sink, so one of them stalling or being misconfigured never
//! touches another.

use crate::clock::{Clock, Millis, TimerEvent, TimerHandle};
use crate::signal::{encode, LightId, LogicalColor};
use crate::sink::CommandSink;
use heapless::Vec as BoundedVec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Light identifiers are a single byte on the wire.
pub const MAX_LIGHTS_PER_INTERSECTION: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntersectionId(pub usize);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    #[serde(alias = "time")]
    pub duration_s: f64,
    /// `colors[i]` drives `light_ids[i]`. Missing entries mean STOP.
    #[serde(default, alias = "states")]
    pub colors: Vec<LogicalColor>,
}

impl Phase {
    pub fn new(duration_s: f64, colors: Vec<LogicalColor>) -> Self {
        Self { duration_s, colors }
    }

    pub fn duration_ms(&self) -> Millis {
        if self.duration_s.is_finite() && self.duration_s > 0.0 {
            (self.duration_s * 1000.0).round() as Millis
        } else {
            0
        }
    }

    pub fn color_for(&self, light_index: usize) -> LogicalColor {
        self.colors
            .get(light_index)
            .copied()
            .unwrap_or(LogicalColor::Stop)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("intersection has no phases")]
    NoPhases,
    #[error("phase {phase} has invalid duration {duration_s}s, must be positive")]
    InvalidDuration { phase: usize, duration_s: f64 },
    #[error("intersection has {count} lights, at most {max} are supported")]
    TooManyLights { count: usize, max: usize },
}

/// Checks a phase table without starting anything.
pub fn validate(light_ids: &[LightId], phases: &[Phase]) -> Result<(), ConfigurationError> {
    if phases.is_empty() {
        return Err(ConfigurationError::NoPhases);
    }

    if light_ids.len() > MAX_LIGHTS_PER_INTERSECTION {
        return Err(ConfigurationError::TooManyLights {
            count: light_ids.len(),
            max: MAX_LIGHTS_PER_INTERSECTION,
        });
    }

    // sub-millisecond durations would re-arm at the same instant forever
    if let Some((phase, invalid)) = phases
        .iter()
        .enumerate()
        .find(|(_, phase)| phase.duration_ms() == 0)
    {
        return Err(ConfigurationError::InvalidDuration {
            phase,
            duration_s: invalid.duration_s,
        });
    }

    Ok(())
}

#[derive(Debug)]
struct Intersection {
    light_ids: BoundedVec<LightId, MAX_LIGHTS_PER_INTERSECTION>,
    phases: Vec<Phase>,
    current_phase: usize,
    pending: Option<TimerHandle>,
    completed_cycles: u64,
}

impl Intersection {
    fn enter_phase<C, S>(&mut self, id: IntersectionId, clock: &mut C, sink: &mut S)
    where
        C: Clock + ?Sized,
        S: CommandSink + ?Sized,
    {
        let phase = &self.phases[self.current_phase];

        for (index, &light) in self.light_ids.iter().enumerate() {
            sink.set_light_state(light, encode(phase.color_for(index)));
        }

        debug!(
            intersection = id.0,
            phase = self.current_phase,
            duration_ms = phase.duration_ms(),
            "entered phase"
        );

        if let Some(previous) = self.pending.take() {
            clock.cancel(previous);
        }
        self.pending = Some(clock.after(
            phase.duration_ms(),
            TimerEvent::PhaseElapsed { intersection: id },
        ));
    }
}

/// Status snapshot of one intersection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionStatus {
    pub id: IntersectionId,
    pub current_phase: usize,
    pub phase_count: usize,
    pub completed_cycles: u64,
    pub lights: Vec<(LightId, LogicalColor)>,
}

#[derive(Debug, Default)]
pub struct IntersectionScheduler {
    intersections: Vec<Intersection>,
}

impl IntersectionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the phase table, then starts the cycle at phase 0. Nothing
    /// is emitted or armed when validation fails.
    pub fn create_intersection<C, S>(
        &mut self,
        light_ids: &[LightId],
        phases: Vec<Phase>,
        clock: &mut C,
        sink: &mut S,
    ) -> Result<IntersectionId, ConfigurationError>
    where
        C: Clock + ?Sized,
        S: CommandSink + ?Sized,
    {
        validate(light_ids, &phases)?;

        let mut bounded = BoundedVec::new();
        for &light in light_ids {
            bounded
                .push(light)
                .map_err(|_| ConfigurationError::TooManyLights {
                    count: light_ids.len(),
                    max: MAX_LIGHTS_PER_INTERSECTION,
                })?;
        }

        let id = IntersectionId(self.intersections.len());
        info!(
            intersection = id.0,
            lights = light_ids.len(),
            phases = phases.len(),
            "starting intersection"
        );

        let mut intersection = Intersection {
            light_ids: bounded,
            phases,
            current_phase: 0,
            pending: None,
            completed_cycles: 0,
        };
        intersection.enter_phase(id, clock, sink);
        self.intersections.push(intersection);

        Ok(id)
    }

    /// Phase timer fired: advance cyclically and enter the next phase.
    pub fn on_phase_elapsed<C, S>(
        &mut self,
        id: IntersectionId,
        handle: TimerHandle,
        clock: &mut C,
        sink: &mut S,
    ) -> bool
    where
        C: Clock + ?Sized,
        S: CommandSink + ?Sized,
    {
        let Some(intersection) = self.intersections.get_mut(id.0) else {
            return false;
        };
        if intersection.pending != Some(handle) {
            return false;
        }
        intersection.pending = None;

        intersection.current_phase = (intersection.current_phase + 1) % intersection.phases.len();
        if intersection.current_phase == 0 {
            intersection.completed_cycles += 1;
        }
        intersection.enter_phase(id, clock, sink);
        true
    }

    pub fn current_phase(&self, id: IntersectionId) -> Option<usize> {
        self.intersections.get(id.0).map(|i| i.current_phase)
    }

    pub fn get_status(&self, id: IntersectionId) -> Option<IntersectionStatus> {
        let intersection = self.intersections.get(id.0)?;
        let phase = &intersection.phases[intersection.current_phase];

        Some(IntersectionStatus {
            id,
            current_phase: intersection.current_phase,
            phase_count: intersection.phases.len(),
            completed_cycles: intersection.completed_cycles,
            lights: intersection
                .light_ids
                .iter()
                .enumerate()
                .map(|(index, &light)| (light, phase.color_for(index)))
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.intersections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intersections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TimerQueue;
    use crate::sink::RecordingSink;

    #[test]
    fn test_duration_conversion() {
        assert_eq!(Phase::new(2.0, vec![]).duration_ms(), 2000);
        assert_eq!(Phase::new(0.25, vec![]).duration_ms(), 250);
        assert_eq!(Phase::new(-1.0, vec![]).duration_ms(), 0);
        assert_eq!(Phase::new(f64::NAN, vec![]).duration_ms(), 0);
    }

    #[test]
    fn test_color_for_pads_with_stop() {
        let phase = Phase::new(1.0, vec![LogicalColor::Go]);
        assert_eq!(phase.color_for(0), LogicalColor::Go);
        assert_eq!(phase.color_for(1), LogicalColor::Stop);
        assert_eq!(phase.color_for(50), LogicalColor::Stop);
    }

    #[test]
    fn test_validate_rejections() {
        assert_eq!(validate(&[1], &[]), Err(ConfigurationError::NoPhases));
        assert_eq!(
            validate(&[1], &[Phase::new(1.0, vec![]), Phase::new(0.0, vec![])]),
            Err(ConfigurationError::InvalidDuration { phase: 1, duration_s: 0.0 })
        );
        assert!(matches!(
            validate(&[1], &[Phase::new(0.0001, vec![])]),
            Err(ConfigurationError::InvalidDuration { phase: 0, .. })
        ));

        let lights: Vec<LightId> = (0..=64).collect();
        assert!(matches!(
            validate(&lights, &[Phase::new(1.0, vec![])]),
            Err(ConfigurationError::TooManyLights { count: 65, .. })
        ));
    }

    #[test]
    fn test_empty_light_list_is_allowed() {
        let mut scheduler = IntersectionScheduler::new();
        let mut timers = TimerQueue::new();
        let mut sink = RecordingSink::new();

        let id = scheduler
            .create_intersection(&[], vec![Phase::new(1.0, vec![LogicalColor::Go])], &mut timers, &mut sink)
            .unwrap();
        assert!(sink.commands().is_empty());
        assert_eq!(scheduler.current_phase(id), Some(0));
        assert_eq!(timers.next_deadline(), Some(1000));
    }

    #[test]
    fn test_status_reflects_current_phase() {
        let mut scheduler = IntersectionScheduler::new();
        let mut timers = TimerQueue::new();
        let mut sink = RecordingSink::new();

        let id = scheduler
            .create_intersection(
                &[4, 5],
                vec![
                    Phase::new(1.0, vec![LogicalColor::Go, LogicalColor::Stop]),
                    Phase::new(1.0, vec![LogicalColor::StopTransitioning]),
                ],
                &mut timers,
                &mut sink,
            )
            .unwrap();

        let (handle, _) = timers.pop_due(1000).unwrap();
        assert!(scheduler.on_phase_elapsed(id, handle, &mut timers, &mut sink));

        let status = scheduler.get_status(id).unwrap();
        assert_eq!(status.current_phase, 1);
        assert_eq!(status.phase_count, 2);
        assert_eq!(
            status.lights,
            vec![(4, LogicalColor::StopTransitioning), (5, LogicalColor::Stop)]
        );
    }

    #[test]
    fn test_stale_handle_is_ignored() {
        let mut scheduler = IntersectionScheduler::new();
        let mut timers = TimerQueue::new();
        let mut sink = RecordingSink::new();

        let id = scheduler
            .create_intersection(&[1], vec![Phase::new(1.0, vec![]), Phase::new(1.0, vec![])], &mut timers, &mut sink)
            .unwrap();
        let (handle, _) = timers.pop_due(1000).unwrap();
        assert!(scheduler.on_phase_elapsed(id, handle, &mut timers, &mut sink));

        // same handle again must not double-advance
        assert!(!scheduler.on_phase_elapsed(id, handle, &mut timers, &mut sink));
        assert_eq!(scheduler.current_phase(id), Some(1));
        assert!(!scheduler.on_phase_elapsed(IntersectionId(7), handle, &mut timers, &mut sink));
    }
}
