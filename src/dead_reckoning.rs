use crate::config::EngineConfig;
use crate::geodesy::{blend_headings, normalize_heading, EARTH_RADIUS_M};
use crate::types::ImuSample;

/// Inertial-only position propagation between fixes.
///
/// Heading integrates gyro-z and is stored east-referenced (0 deg points
/// east, counterclockwise positive), which is the frame the displacement
/// decomposition below works in; compass bearings are converted at the
/// fix seam. Forward speed integrates the horizontal acceleration
/// magnitude, with a small noise gate so a phone resting on a seat does
/// not creep.
pub struct DeadReckoner {
    lat: f64,
    lon: f64,
    speed_mps: f64,
    heading_east_deg: f64,
    last_t_ms: u64,
    initialized: bool,

    gps_trust: f64,
    accel_noise_gate: f64,
    max_step_s: f64,
}

impl DeadReckoner {
    pub fn new(config: &EngineConfig) -> Self {
        DeadReckoner {
            lat: 0.0,
            lon: 0.0,
            speed_mps: 0.0,
            heading_east_deg: 0.0,
            last_t_ms: 0,
            initialized: false,
            gps_trust: config.gps_trust,
            accel_noise_gate: config.accel_noise_gate,
            max_step_s: config.imu_dt_max_s,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Re-seed from an emitted fix. The fix bearing is blended into the
    /// integrated heading with unit-vector averaging so wrap-around at
    /// 0/360 cannot fling the heading across the circle.
    pub fn seed(&mut self, lat: f64, lon: f64, speed_mps: f64, bearing_deg: f64, t_ms: u64) {
        let meas_east = normalize_heading(90.0 - bearing_deg);
        self.heading_east_deg = if self.initialized {
            blend_headings(self.heading_east_deg, meas_east, self.gps_trust)
        } else {
            meas_east
        };
        self.lat = lat;
        self.lon = lon;
        self.speed_mps = speed_mps.max(0.0);
        self.last_t_ms = t_ms;
        self.initialized = true;
    }

    /// Integrate one inertial sample. Returns the propagated position, or
    /// None when the step was dropped (not seeded, stale clock, or a gap
    /// too long to integrate across).
    pub fn step(&mut self, sample: &ImuSample) -> Option<(f64, f64)> {
        if !self.initialized {
            return None;
        }

        let dt = (sample.t_ms as i64 - self.last_t_ms as i64) as f64 / 1000.0;
        if dt <= 0.0 || dt > self.max_step_s {
            self.last_t_ms = sample.t_ms;
            return None;
        }

        self.heading_east_deg =
            normalize_heading(self.heading_east_deg + sample.gz * dt * 180.0 / std::f64::consts::PI);

        let mut accel = (sample.ax * sample.ax + sample.ay * sample.ay).sqrt();
        if accel.abs() < self.accel_noise_gate {
            accel = 0.0;
        }
        self.speed_mps = (self.speed_mps + accel * dt).max(0.0);

        let h = self.heading_east_deg.to_radians();
        let dx = self.speed_mps * dt * h.cos();
        let dy = self.speed_mps * dt * h.sin();

        let d_lat = (dy / EARTH_RADIUS_M).to_degrees();
        let d_lon = (dx / (EARTH_RADIUS_M * (self.lat.to_radians().cos() + 1e-9))).to_degrees();

        self.lat += d_lat;
        self.lon += d_lon;
        self.last_t_ms = sample.t_ms;

        Some((self.lat, self.lon))
    }

    pub fn position(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }

    pub fn speed_mps(&self) -> f64 {
        self.speed_mps
    }

    /// Current heading as a compass bearing in [0, 360).
    pub fn heading_compass_deg(&self) -> f64 {
        normalize_heading(90.0 - self.heading_east_deg)
    }

    pub fn reset(&mut self) {
        self.lat = 0.0;
        self.lon = 0.0;
        self.speed_mps = 0.0;
        self.heading_east_deg = 0.0;
        self.last_t_ms = 0;
        self.initialized = false;
    }
}
