//! Road-constrained GPS/IMU position fusion for mobile navigation.
//!
//! Two input streams drive the engine: satellite fixes at ~1 Hz and
//! inertial samples at ~50 Hz. Each fix runs the full pipeline (gating,
//! smoothing, Kalman update, map matching, deadband); each inertial
//! sample dead-reckons between fixes. Both produce a single
//! [`UnifiedPosition`] record carrying the raw, smoothed, kalman,
//! snapped and final views of the position so consumers can pick the one
//! they trust.
//!
//! The engine is pure computation: no threads, no async, no platform
//! bindings. The host adapter serialises sensor callbacks onto one queue
//! and feeds [`PositionEngine::on_fix`] / [`PositionEngine::on_inertial`].

pub mod config;
pub mod dead_reckoning;
pub mod engine;
pub mod filters;
pub mod gating;
pub mod geodesy;
pub mod map_match;
pub mod smoothing;
pub mod types;

pub use config::EngineConfig;
pub use dead_reckoning::DeadReckoner;
pub use engine::PositionEngine;
pub use filters::Kalman2d;
pub use gating::{FixGate, GateDecision, PriorityController};
pub use map_match::{
    RoadClass, RoadDataError, RoadMatcher, RoadRecord, RoadSegment, SnapOutcome, SnapResult,
};
pub use smoothing::ObservationSmoother;
pub use types::{
    EngineEvent, EngineOutput, EngineStats, GpsFix, ImuSample, PriorityClass, UnifiedPosition,
};
