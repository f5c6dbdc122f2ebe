use serde::{Deserialize, Serialize};

/// Engine configuration.
///
/// Arrives from the host as a JSON options map with camelCase keys; every
/// option is optional and falls back to the documented default.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    // ── Positioning request ──
    /// Initial priority class: HIGH when true, BALANCED otherwise.
    pub high_accuracy: bool,
    /// Nominal fix cadence, for the platform adapter.
    pub gps_interval_ms: u64,
    /// Nominal inertial cadence, for the platform adapter.
    pub imu_hz: u32,

    // ── Fix gating ──
    pub target_accuracy_m: f64,
    pub discard_accuracy_above_m: f64,
    /// Consecutive fixes at or under target accuracy before is_good.
    pub settle_samples: u32,
    pub good_hold_timeout_ms: u64,

    // ── Priority hysteresis ──
    pub promote_high_above_m: f64,
    pub demote_balanced_below_m: f64,
    pub min_switch_interval_ms: u64,

    // ── Emission ──
    pub deadband_meters: f64,

    // ── Snap to roads ──
    pub enable_snap_to_roads: bool,
    pub snap_confidence_threshold: f64,
    /// Snap acceptance ceiling, meters.
    pub max_snap_distance: f64,

    // ── Dead reckoning ──
    /// Weight given to the fix bearing when blending headings.
    pub gps_trust: f64,
    /// Horizontal accelerations under this magnitude are treated as noise (m/s^2).
    pub accel_noise_gate: f64,
    /// Inertial steps with dt above this are dropped (seconds).
    pub imu_dt_max_s: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            gps_interval_ms: 1000,
            imu_hz: 50,
            target_accuracy_m: 10.0,
            discard_accuracy_above_m: 30.0,
            settle_samples: 3,
            good_hold_timeout_ms: 10_000,
            promote_high_above_m: 15.0,
            demote_balanced_below_m: 12.0,
            min_switch_interval_ms: 5_000,
            deadband_meters: 1.5,
            enable_snap_to_roads: false,
            snap_confidence_threshold: 0.3,
            max_snap_distance: 50.0,
            gps_trust: 0.7,
            accel_noise_gate: 0.15,
            imu_dt_max_s: 2.0,
        }
    }
}
