use serde::{Deserialize, Serialize};

use crate::map_match::RoadClass;

/// A single satellite positioning fix.
///
/// Wire shape per the host protocol: `ts` (ms), `lat`/`lon` (degrees),
/// `acc` (meters), `spd` (m/s), `hdg` (compass degrees, 0-360).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GpsFix {
    #[serde(rename = "ts")]
    pub t_ms: u64,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "acc")]
    pub acc_m: f64,
    #[serde(rename = "spd")]
    pub speed_mps: f64,
    #[serde(rename = "hdg")]
    pub bearing_deg: f64,
}

/// One inertial sample in the device frame.
///
/// Accelerometer axes are m/s^2, gyroscope axes rad/s. The platform may
/// deliver raw or gravity-removed acceleration; the engine treats both
/// identically and does not attempt gravity compensation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ImuSample {
    #[serde(rename = "ts")]
    pub t_ms: u64,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    pub gx: f64,
    pub gy: f64,
    pub gz: f64,
}

/// Positioning accuracy class requested from the platform subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriorityClass {
    High,
    Balanced,
}

impl std::fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriorityClass::High => write!(f, "HIGH"),
            PriorityClass::Balanced => write!(f, "BALANCED"),
        }
    }
}

/// Side effects produced alongside position records.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// Fix dropped at the gate (bad or missing accuracy).
    FixRejected { t_ms: u64, acc_m: f64 },
    /// Priority class switched; the host should rebuild its positioning
    /// request with the new class.
    PriorityChanged {
        from: PriorityClass,
        to: PriorityClass,
        t_ms: u64,
    },
    /// Emission is pinned to the last-good position while fixes settle.
    HoldingLastGood { t_ms: u64, age_ms: u64 },
    /// Snap candidate found but rejected by confidence or distance.
    SnapRejected { confidence: f64, distance_m: f64 },
    /// Kalman innovation covariance was singular; the predicted state was kept.
    KalmanSingularSkipped { t_ms: u64 },
}

/// Result of feeding one input event to the engine.
#[derive(Clone, Debug, Default)]
pub struct EngineOutput {
    pub position: Option<UnifiedPosition>,
    pub events: Vec<EngineEvent>,
}

impl EngineOutput {
    pub(crate) fn events_only(events: Vec<EngineEvent>) -> Self {
        EngineOutput {
            position: None,
            events,
        }
    }
}

/// Running counters for diagnostics.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct EngineStats {
    pub fixes_accepted: u64,
    pub fixes_dropped: u64,
    pub fixes_held: u64,
    pub dr_steps: u64,
    pub snaps_applied: u64,
    pub snaps_rejected: u64,
    pub records_emitted: u64,
}

/// The unified output record: raw, smoothed, kalman, snapped and final
/// views of one position event in a single frame, so downstream consumers
/// can pick whichever they trust.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedPosition {
    pub ts: u64,
    pub lat: f64,
    pub lon: f64,
    pub acc: f64,
    pub spd: f64,
    /// Compass heading, always in [0, 360).
    pub hdg: f64,
    pub is_good: bool,
    pub priority: PriorityClass,

    pub hmm_lat: f64,
    pub hmm_lon: f64,
    /// Weighted RMS spread of the smoother window, meters.
    pub hmm_acc: f64,

    pub kalman_lat: f64,
    pub kalman_lon: f64,

    pub final_lat: f64,
    pub final_lon: f64,

    pub snap_enabled: bool,
    pub snap_lat: Option<f64>,
    pub snap_lon: Option<f64>,
    pub snap_confidence: f64,
    pub snap_distance: f64,
    /// -1 when no snap was applied.
    pub snap_road_id: i64,
    pub snap_road_type: Option<RoadClass>,
    pub snap_applied: bool,

    /// -1 when no roads are loaded.
    pub nearest_road_id: i64,
    pub nearest_road_name: Option<String>,
    pub nearest_road_type: Option<RoadClass>,
    pub nearest_road_distance: Option<f64>,
    pub nearest_road_full_address: Option<String>,

    /// True for inertial-only (dead-reckoned) records.
    pub dr: bool,
    pub using_last_good: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_wire_shape() {
        let json = r#"{"ts":1000,"lat":37.0,"lon":-122.0,"acc":8.0,"spd":3.5,"hdg":92.0}"#;
        let fix: GpsFix = serde_json::from_str(json).unwrap();
        assert_eq!(fix.t_ms, 1000);
        assert_eq!(fix.acc_m, 8.0);
        assert_eq!(fix.bearing_deg, 92.0);
    }

    #[test]
    fn test_imu_wire_shape() {
        let json = r#"{"ts":1020,"ax":0.1,"ay":-0.2,"az":9.8,"gx":0.0,"gy":0.0,"gz":0.05}"#;
        let s: ImuSample = serde_json::from_str(json).unwrap();
        assert_eq!(s.t_ms, 1020);
        assert_eq!(s.gz, 0.05);
    }

    #[test]
    fn test_priority_names() {
        assert_eq!(PriorityClass::High.to_string(), "HIGH");
        assert_eq!(
            serde_json::to_string(&PriorityClass::Balanced).unwrap(),
            "\"BALANCED\""
        );
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = UnifiedPosition {
            ts: 1000,
            lat: 37.0,
            lon: -122.0,
            acc: 8.0,
            spd: 0.0,
            hdg: 0.0,
            is_good: false,
            priority: PriorityClass::High,
            hmm_lat: 37.0,
            hmm_lon: -122.0,
            hmm_acc: 0.0,
            kalman_lat: 37.0,
            kalman_lon: -122.0,
            final_lat: 37.0,
            final_lon: -122.0,
            snap_enabled: false,
            snap_lat: None,
            snap_lon: None,
            snap_confidence: 0.0,
            snap_distance: 0.0,
            snap_road_id: -1,
            snap_road_type: None,
            snap_applied: false,
            nearest_road_id: -1,
            nearest_road_name: None,
            nearest_road_type: None,
            nearest_road_distance: None,
            nearest_road_full_address: None,
            dr: false,
            using_last_good: false,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"isGood\":false"));
        assert!(json.contains("\"kalmanLat\":37.0"));
        assert!(json.contains("\"snapRoadId\":-1"));
        assert!(json.contains("\"nearestRoadFullAddress\":null"));
        assert!(json.contains("\"dr\":false"));
    }
}
