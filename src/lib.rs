//! # Driving InSim
//!
//! Believable turn indicators and traffic lights for Live for Speed.
//!
//! The library reads dashboard lights from OutGauge, works out when a car's
//! indicator is switched on or off, and drives any number of traffic-light
//! intersections through fixed phase cycles. Output goes to the simulator as
//! InSim packets.
//!
//! ## Quick Start
//!
//! ```rust
//! use driving_insim::engine::{Input, SignalEngine};
//! use driving_insim::dashboard::{DashLights, TelemetrySample};
//! use driving_insim::sink::RecordingSink;
//!
//! let mut engine = SignalEngine::new(1100, RecordingSink::new());
//!
//! engine.handle(Input::Telemetry(TelemetrySample::new(1, DashLights::SIGNAL_L)), 0);
//! engine.advance_to(5000);
//!
//! assert_eq!(engine.sink().texts(), vec!["/i DL_SIGNAL_L 1", "/i DL_SIGNAL_OFF 1"]);
//! ```
//!
//! ## Architecture
//!
//! - [`signal`] - Logical colors and their bulb encoding
//! - [`indicator`] - Turn-signal edge detection with debounce
//! - [`intersection`] - Cyclic traffic-light phase scheduling
//! - [`clock`] - Cancellable one-shot timers on an explicit timeline
//! - [`engine`] - Single owner of all state, timers and output
//! - [`protocol`] / [`outgauge`] - Wire codecs
//! - [`service`] - tokio runtime wiring it to the simulator

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod announce;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod indicator;
pub mod intersection;
pub mod layouts;
pub mod outgauge;
pub mod protocol;
pub mod service;
pub mod signal;
pub mod sink;

// Re-export main public types for convenience
pub use config::AppConfig;
pub use engine::{Input, SignalEngine};
pub use indicator::IndicatorStateMachine;
pub use intersection::{ConfigurationError, IntersectionScheduler, Phase};
pub use signal::{encode, LightBits, LogicalColor};
