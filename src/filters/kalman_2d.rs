use nalgebra::{Matrix2, Matrix2x4, Matrix4, Matrix4x2, Vector2, Vector4};

use crate::geodesy::METERS_PER_DEGREE;

/// Result of a measurement update.
#[derive(Clone, Copy, Debug)]
pub struct UpdateOutcome {
    pub lat: f64,
    pub lon: f64,
    /// True when the innovation covariance was singular and the update
    /// was skipped in favor of the predicted state.
    pub singular: bool,
}

/// 2-D constant-velocity Kalman filter over (lat, lon, lat_rate, lon_rate).
///
/// State is kept in degrees with velocity in deg/s; measurement accuracy
/// in meters is converted with a flat-earth approximation. The filter is
/// seeded by the first fix of a session and never re-initialised until
/// the engine resets.
pub struct Kalman2d {
    x: Vector4<f64>,
    p: Matrix4<f64>,
    q: Matrix4<f64>,
    last_t_ms: u64,
    initialized: bool,
}

impl Kalman2d {
    pub fn new() -> Self {
        Kalman2d {
            x: Vector4::zeros(),
            p: Matrix4::identity(),
            q: Matrix4::from_diagonal(&Vector4::new(1e-6, 1e-6, 1e-3, 1e-3)),
            last_t_ms: 0,
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Seed the filter from the first fix of the session.
    pub fn initialize(&mut self, lat: f64, lon: f64, acc_m: f64, t_ms: u64) {
        let acc_deg = acc_m / METERS_PER_DEGREE;
        let acc_var = acc_deg * acc_deg;
        self.x = Vector4::new(lat, lon, 0.0, 0.0);
        self.p = Matrix4::from_diagonal(&Vector4::new(acc_var, acc_var, 1.0, 1.0));
        self.last_t_ms = t_ms;
        self.initialized = true;
    }

    /// Advance the state to `t_ms` under the constant-velocity model.
    ///
    /// A non-positive step leaves the state untouched.
    pub fn predict(&mut self, t_ms: u64) -> (f64, f64) {
        let dt = (t_ms as i64 - self.last_t_ms as i64) as f64 / 1000.0;
        if dt <= 0.0 {
            return self.position();
        }

        let f = Matrix4::new(
            1.0, 0.0, dt, 0.0, //
            0.0, 1.0, 0.0, dt, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        self.x = f * self.x;
        self.p = f * self.p * f.transpose() + self.q;
        self.last_t_ms = t_ms;
        self.position()
    }

    /// Fold in a position measurement with the given accuracy.
    pub fn update(&mut self, lat: f64, lon: f64, acc_m: f64) -> UpdateOutcome {
        let acc_deg = acc_m / METERS_PER_DEGREE;
        let r = Matrix2::from_diagonal(&Vector2::new(acc_deg * acc_deg, acc_deg * acc_deg));
        let h = Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0,
        );

        let z = Vector2::new(lat, lon);
        let y = z - h * self.x;
        let s = h * self.p * h.transpose() + r;

        // Closed-form 2x2 inversion; a singular innovation keeps the prediction
        let s_inv = match s.try_inverse() {
            Some(inv) => inv,
            None => {
                let (plat, plon) = self.position();
                return UpdateOutcome {
                    lat: plat,
                    lon: plon,
                    singular: true,
                };
            }
        };

        let k: Matrix4x2<f64> = self.p * h.transpose() * s_inv;
        self.x += k * y;
        self.p = (Matrix4::identity() - k * h) * self.p;

        let (plat, plon) = self.position();
        UpdateOutcome {
            lat: plat,
            lon: plon,
            singular: false,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x[0], self.x[1])
    }

    pub fn velocity_deg_per_s(&self) -> (f64, f64) {
        (self.x[2], self.x[3])
    }

    #[cfg(test)]
    pub(crate) fn covariance(&self) -> &Matrix4<f64> {
        &self.p
    }

    pub fn reset(&mut self) {
        *self = Kalman2d::new();
    }
}

impl Default for Kalman2d {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Kalman2d {
        let mut kf = Kalman2d::new();
        kf.initialize(37.0, -122.0, 8.0, 1000);
        kf
    }

    #[test]
    fn test_initialization_seeds_position() {
        let kf = seeded();
        assert!(kf.is_initialized());
        assert_eq!(kf.position(), (37.0, -122.0));
        assert_eq!(kf.velocity_deg_per_s(), (0.0, 0.0));
    }

    #[test]
    fn test_predict_zero_or_negative_dt_is_noop() {
        let mut kf = seeded();
        let before = *kf.covariance();
        assert_eq!(kf.predict(1000), (37.0, -122.0));
        assert_eq!(kf.predict(500), (37.0, -122.0));
        assert_eq!(*kf.covariance(), before);
    }

    #[test]
    fn test_predict_grows_uncertainty() {
        let mut kf = seeded();
        let var_before = kf.covariance()[(0, 0)];
        kf.predict(2000);
        assert!(kf.covariance()[(0, 0)] > var_before);
    }

    #[test]
    fn test_update_pulls_toward_measurement() {
        let mut kf = seeded();
        kf.predict(2000);
        let out = kf.update(37.001, -122.001, 8.0);
        assert!(!out.singular);
        assert!(out.lat > 37.0 && out.lat < 37.001);
        assert!(out.lon < -122.0 && out.lon > -122.001);
    }

    #[test]
    fn test_converges_on_repeated_measurements() {
        let mut kf = seeded();
        for i in 1..30u64 {
            kf.predict(1000 + i * 1000);
            kf.update(37.0005, -122.0, 8.0);
        }
        let (lat, _) = kf.position();
        assert!((lat - 37.0005).abs() < 1e-5, "got {}", lat);
    }

    #[test]
    fn test_tracks_constant_velocity() {
        let mut kf = seeded();
        // ~1.1 m/s northward in degrees
        let rate = 1e-5;
        for i in 1..60u64 {
            let t = 1000 + i * 1000;
            kf.predict(t);
            kf.update(37.0 + rate * i as f64, -122.0, 5.0);
        }
        let (d_lat, _) = kf.velocity_deg_per_s();
        assert!((d_lat - rate).abs() < rate * 0.2, "got {}", d_lat);
    }

    #[test]
    fn test_covariance_stays_positive_semidefinite() {
        let mut kf = seeded();
        for i in 1..100u64 {
            let t = 1000 + i * 1000;
            kf.predict(t);
            let jitter = ((i % 7) as f64 - 3.0) * 1e-5;
            kf.update(37.0 + jitter, -122.0 - jitter, 3.0 + (i % 5) as f64);

            let eigenvalues = kf.covariance().symmetric_eigenvalues();
            for ev in eigenvalues.iter() {
                assert!(*ev >= -1e-12, "eigenvalue {} at step {}", ev, i);
            }
        }
    }

    #[test]
    fn test_covariance_stays_symmetric() {
        let mut kf = seeded();
        for i in 1..50u64 {
            kf.predict(1000 + i * 1000);
            kf.update(37.0001, -122.0001, 6.0);
        }
        let p = kf.covariance();
        for r in 0..4 {
            for c in 0..4 {
                assert!((p[(r, c)] - p[(c, r)]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_reset_deinitializes() {
        let mut kf = seeded();
        kf.reset();
        assert!(!kf.is_initialized());
    }
}
