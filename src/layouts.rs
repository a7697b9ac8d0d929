//! Built-in intersection layouts. Pure data; the scheduler knows nothing
//! about them.

use crate::config::IntersectionConfig;
use crate::intersection::Phase;
use crate::signal::{LightId, LogicalColor};

const GO_WAIT_S: f64 = 2.0;
const GO_S: f64 = 30.0;
const STOP_WAIT_S: f64 = 3.0;
const STOP_S: f64 = 5.0;

use LogicalColor::{Go as G, GoTransitioning as GW, Off as O, Stop as S, StopTransitioning as SW};

/// Lights 1-5 are vehicle signals, 6 is the pedestrian signal and 7 its
/// blinking "hurry" lamp.
pub const CROSSROADS_LIGHTS: [LightId; 7] = [1, 2, 3, 4, 5, 6, 7];

pub const CROSSROADS_PHASES: [(f64, [LogicalColor; 7]); 14] = [
    (STOP_S, [S, S, S, S, S, S, O]),
    (GO_WAIT_S, [GW, S, GW, S, S, S, O]),
    // pedestrians go, hurry lamp blinks
    (1.0, [G, S, G, S, S, G, SW]),
    (1.0, [G, S, G, S, S, G, O]),
    (1.0, [G, S, G, S, S, G, SW]),
    (1.0, [G, S, G, S, S, G, O]),
    (1.0, [G, S, G, S, S, G, SW]),
    // pedestrians stop
    (GO_S - 5.0, [G, S, G, S, S, S, O]),
    (STOP_WAIT_S, [SW, S, SW, S, S, S, O]),
    (STOP_S, [S, S, S, S, S, S, O]),
    (GO_WAIT_S, [S, S, S, S, GW, S, O]),
    (5.0, [S, G, S, G, G, S, O]),
    (GO_S - 5.0, [S, S, S, S, G, S, O]),
    (STOP_WAIT_S, [S, S, S, S, SW, S, O]),
];

pub fn crossroads() -> IntersectionConfig {
    IntersectionConfig {
        name: "crossroads".to_string(),
        lights: CROSSROADS_LIGHTS.to_vec(),
        phases: CROSSROADS_PHASES
            .iter()
            .map(|(duration_s, colors)| Phase::new(*duration_s, colors.to_vec()))
            .collect(),
    }
}
