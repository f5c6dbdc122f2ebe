use std::collections::VecDeque;

use crate::geodesy::haversine_m;

/// Fixes kept in the smoothing window.
const WINDOW_SIZE: usize = 10;

/// Guards the weight against missing or zero accuracy.
const ACCURACY_EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug)]
struct WindowFix {
    lat: f64,
    lon: f64,
    acc_m: f64,
}

/// Smoothed position with its own uncertainty estimate.
#[derive(Clone, Copy, Debug)]
pub struct SmoothedEstimate {
    pub lat: f64,
    pub lon: f64,
    /// Weighted RMS spread of the window around the mean, meters.
    /// Zero while the window holds fewer than two fixes.
    pub sigma_m: f64,
}

/// Sliding-window smoother over recent raw fixes.
///
/// The smoothed position is the inverse-accuracy-weighted mean of the
/// window, so precise fixes pull harder than sloppy ones. The spread of
/// the window around that mean doubles as an uncertainty estimate.
pub struct ObservationSmoother {
    window: VecDeque<WindowFix>,
}

impl ObservationSmoother {
    pub fn new() -> Self {
        ObservationSmoother {
            window: VecDeque::with_capacity(WINDOW_SIZE),
        }
    }

    /// Insert a fix, evicting the oldest once the window is full.
    pub fn push(&mut self, lat: f64, lon: f64, acc_m: f64) {
        self.window.push_back(WindowFix { lat, lon, acc_m });
        while self.window.len() > WINDOW_SIZE {
            self.window.pop_front();
        }
    }

    /// Weighted mean and spread of the current window.
    ///
    /// Returns None while the window is empty.
    pub fn estimate(&self) -> Option<SmoothedEstimate> {
        if self.window.is_empty() {
            return None;
        }

        let mut weight_sum = 0.0;
        let mut lat_sum = 0.0;
        let mut lon_sum = 0.0;
        for fix in &self.window {
            let w = 1.0 / fix.acc_m.max(ACCURACY_EPSILON);
            weight_sum += w;
            lat_sum += w * fix.lat;
            lon_sum += w * fix.lon;
        }
        let mean_lat = lat_sum / weight_sum;
        let mean_lon = lon_sum / weight_sum;

        let sigma_m = if self.window.len() < 2 {
            0.0
        } else {
            let mut dist_sq_sum = 0.0;
            for fix in &self.window {
                let w = 1.0 / fix.acc_m.max(ACCURACY_EPSILON);
                let d = haversine_m(mean_lat, mean_lon, fix.lat, fix.lon);
                dist_sq_sum += w * d * d;
            }
            (dist_sq_sum / weight_sum).sqrt()
        };

        Some(SmoothedEstimate {
            lat: mean_lat,
            lon: mean_lon,
            sigma_m,
        })
    }

    /// Current spread in meters, 0 with insufficient history.
    pub fn sigma_m(&self) -> f64 {
        self.estimate().map(|e| e.sigma_m).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }
}

impl Default for ObservationSmoother {
    fn default() -> Self {
        Self::new()
    }
}
