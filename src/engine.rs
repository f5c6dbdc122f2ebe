// engine.rs — pure computation core of the fusion pipeline
//
// Everything in this module is independent of:
//   - platform sensor acquisition and permission handling
//   - any async runtime or dispatch queue
//   - reverse geocoding, H3 indexing, UI
//
// It takes fix and inertial events in, produces unified position records
// and effect events out. The host adapter is responsible for serialising
// both input streams onto one queue; the engine itself is single-threaded
// and runs each event to completion in bounded work.

use crate::config::EngineConfig;
use crate::dead_reckoning::DeadReckoner;
use crate::filters::Kalman2d;
use crate::gating::{FixGate, GateDecision, PriorityController};
use crate::geodesy::{haversine_m, normalize_heading};
use crate::map_match::{
    build_segments, RoadClass, RoadDataError, RoadMatcher, RoadRecord, SnapOutcome, SnapResult,
};
use crate::smoothing::ObservationSmoother;
use crate::types::{
    EngineEvent, EngineOutput, EngineStats, GpsFix, ImuSample, PriorityClass, UnifiedPosition,
};

// ─── Cached road views ───────────────────────────────────────────────────────

/// Nearest-road answer flattened for record building; cached so
/// dead-reckoned records do not re-scan the road table at 50 Hz.
#[derive(Clone, Debug)]
struct NearestRoadView {
    id: i64,
    name: Option<String>,
    class: RoadClass,
    distance_m: f64,
    full_address: Option<String>,
}

#[derive(Clone, Debug)]
struct SnapView {
    lat: f64,
    lon: f64,
    confidence: f64,
    distance_m: f64,
    road_id: i64,
    road_class: Option<RoadClass>,
}

// ─── The engine ──────────────────────────────────────────────────────────────

/// Road-constrained position fusion engine.
///
/// Feed fixes with [`on_fix`](Self::on_fix) and inertial samples with
/// [`on_inertial`](Self::on_inertial); each call returns at most one
/// unified record plus any side effects. The per-event path never fails:
/// numerical anomalies degrade into valid output. Only the explicit road
/// data API returns errors.
pub struct PositionEngine {
    config: EngineConfig,

    gate: FixGate,
    priority: PriorityController,
    smoother: ObservationSmoother,
    kalman: Kalman2d,
    reckoner: DeadReckoner,
    matcher: RoadMatcher,

    /// Deadband anchor: the coordinates last emitted on the fix path.
    last_emitted: Option<(f64, f64)>,
    last_nearest: Option<NearestRoadView>,
    last_fix_acc_m: f64,
    last_is_good: bool,

    stats: EngineStats,
}

impl PositionEngine {
    pub fn new(config: EngineConfig) -> Self {
        PositionEngine {
            gate: FixGate::new(&config),
            priority: PriorityController::new(&config),
            smoother: ObservationSmoother::new(),
            kalman: Kalman2d::new(),
            reckoner: DeadReckoner::new(&config),
            matcher: RoadMatcher::new(),
            last_emitted: None,
            last_nearest: None,
            last_fix_acc_m: 0.0,
            last_is_good: false,
            stats: EngineStats::default(),
            config,
        }
    }

    // ── Fix pipeline ─────────────────────────────────────────────────────

    /// Run one satellite fix through the pipeline.
    pub fn on_fix(&mut self, fix: &GpsFix) -> EngineOutput {
        let mut events = Vec::new();

        if !fix.lat.is_finite() || !fix.lon.is_finite() {
            return EngineOutput::default();
        }

        // The priority controller sees every fix with a usable accuracy,
        // including ones the gate is about to drop past the discard ceiling.
        if let Some((from, to)) = self.priority.observe(fix.t_ms, fix.acc_m) {
            log::debug!("priority {} -> {} at {} ms", from, to, fix.t_ms);
            events.push(EngineEvent::PriorityChanged {
                from,
                to,
                t_ms: fix.t_ms,
            });
        }

        let gate_result = self.gate.evaluate(fix.t_ms, fix.acc_m);
        if gate_result.decision == GateDecision::Drop {
            self.stats.fixes_dropped += 1;
            log::debug!("fix at {} ms dropped, accuracy {}", fix.t_ms, fix.acc_m);
            events.push(EngineEvent::FixRejected {
                t_ms: fix.t_ms,
                acc_m: fix.acc_m,
            });
            return EngineOutput::events_only(events);
        }
        self.stats.fixes_accepted += 1;
        self.last_is_good = gate_result.is_good;
        self.last_fix_acc_m = fix.acc_m;

        // Nearest road always; snap only when enabled
        self.last_nearest = self
            .matcher
            .find_nearest_road(fix.lat, fix.lon)
            .map(|n| self.nearest_view(n));

        let snap = if self.config.enable_snap_to_roads {
            match self.matcher.snap_to_road(
                fix.lat,
                fix.lon,
                self.config.snap_confidence_threshold,
                self.config.max_snap_distance,
            ) {
                SnapOutcome::Accepted(result) => {
                    self.stats.snaps_applied += 1;
                    Some(self.snap_view(result))
                }
                SnapOutcome::Rejected {
                    confidence,
                    distance_m,
                } => {
                    self.stats.snaps_rejected += 1;
                    events.push(EngineEvent::SnapRejected {
                        confidence,
                        distance_m,
                    });
                    None
                }
                SnapOutcome::NoCandidates => None,
            }
        } else {
            None
        };

        // Snapped coordinates (when accepted) are the trusted ones
        let (good_lat, good_lon) = snap
            .as_ref()
            .map(|s| (s.lat, s.lon))
            .unwrap_or((fix.lat, fix.lon));
        if gate_result.is_good {
            self.gate.record_good(good_lat, good_lon, fix.t_ms, fix.acc_m);
        }

        self.smoother.push(fix.lat, fix.lon, fix.acc_m);
        let smoothed = self.smoother.estimate();

        let (kalman_lat, kalman_lon) = if !self.kalman.is_initialized() {
            self.kalman.initialize(fix.lat, fix.lon, fix.acc_m, fix.t_ms);
            self.kalman.position()
        } else {
            self.kalman.predict(fix.t_ms);
            let outcome = self.kalman.update(fix.lat, fix.lon, fix.acc_m);
            if outcome.singular {
                events.push(EngineEvent::KalmanSingularSkipped { t_ms: fix.t_ms });
            }
            (outcome.lat, outcome.lon)
        };

        // Base output: hold the last-good position while fixes settle
        let mut using_last_good = false;
        let (base_lat, base_lon) = if gate_result.decision == GateDecision::HoldLastGood {
            match self.gate.held_position(fix.t_ms) {
                Some(lg) => {
                    using_last_good = true;
                    self.stats.fixes_held += 1;
                    events.push(EngineEvent::HoldingLastGood {
                        t_ms: fix.t_ms,
                        age_ms: fix.t_ms.saturating_sub(lg.t_ms),
                    });
                    (lg.lat, lg.lon)
                }
                None => (kalman_lat, kalman_lon),
            }
        } else {
            (kalman_lat, kalman_lon)
        };

        // Deadband: sub-threshold motion re-emits the previous position
        let (final_lat, final_lon) = match self.last_emitted {
            Some((le_lat, le_lon))
                if haversine_m(le_lat, le_lon, base_lat, base_lon) < self.config.deadband_meters =>
            {
                (le_lat, le_lon)
            }
            _ => {
                self.last_emitted = Some((base_lat, base_lon));
                (base_lat, base_lon)
            }
        };

        // Inertial propagation continues from what consumers last saw
        self.reckoner.seed(
            final_lat,
            final_lon,
            fix.speed_mps.max(0.0),
            fix.bearing_deg,
            fix.t_ms,
        );

        let record = UnifiedPosition {
            ts: fix.t_ms,
            lat: fix.lat,
            lon: fix.lon,
            acc: fix.acc_m,
            spd: fix.speed_mps.max(0.0),
            hdg: normalize_heading(fix.bearing_deg),
            is_good: gate_result.is_good,
            priority: self.priority.current(),
            hmm_lat: smoothed.map(|s| s.lat).unwrap_or(fix.lat),
            hmm_lon: smoothed.map(|s| s.lon).unwrap_or(fix.lon),
            hmm_acc: smoothed.map(|s| s.sigma_m).unwrap_or(0.0),
            kalman_lat,
            kalman_lon,
            final_lat,
            final_lon,
            snap_enabled: self.config.enable_snap_to_roads,
            snap_lat: snap.as_ref().map(|s| s.lat),
            snap_lon: snap.as_ref().map(|s| s.lon),
            snap_confidence: snap.as_ref().map(|s| s.confidence).unwrap_or(0.0),
            snap_distance: snap.as_ref().map(|s| s.distance_m).unwrap_or(0.0),
            snap_road_id: snap.as_ref().map(|s| s.road_id).unwrap_or(-1),
            snap_road_type: snap.as_ref().and_then(|s| s.road_class),
            snap_applied: snap.is_some(),
            nearest_road_id: self.last_nearest.as_ref().map(|n| n.id).unwrap_or(-1),
            nearest_road_name: self.last_nearest.as_ref().and_then(|n| n.name.clone()),
            nearest_road_type: self.last_nearest.as_ref().map(|n| n.class),
            nearest_road_distance: self.last_nearest.as_ref().map(|n| n.distance_m),
            nearest_road_full_address: self
                .last_nearest
                .as_ref()
                .and_then(|n| n.full_address.clone()),
            dr: false,
            using_last_good,
        };

        self.stats.records_emitted += 1;
        EngineOutput {
            position: Some(record),
            events,
        }
    }

    // ── Inertial pipeline ────────────────────────────────────────────────

    /// Run one inertial sample. Emits a dead-reckoned record when the
    /// integrator is seeded and the step is usable; otherwise nothing.
    pub fn on_inertial(&mut self, sample: &ImuSample) -> EngineOutput {
        let Some((lat, lon)) = self.reckoner.step(sample) else {
            return EngineOutput::default();
        };
        self.stats.dr_steps += 1;

        // Predict-only: measurements arrive on the fix path
        let (kalman_lat, kalman_lon) = if self.kalman.is_initialized() {
            self.kalman.predict(sample.t_ms)
        } else {
            (lat, lon)
        };

        let smoothed = self.smoother.estimate();

        let record = UnifiedPosition {
            ts: sample.t_ms,
            lat,
            lon,
            acc: self.last_fix_acc_m,
            spd: self.reckoner.speed_mps(),
            hdg: self.reckoner.heading_compass_deg(),
            is_good: self.last_is_good,
            priority: self.priority.current(),
            hmm_lat: smoothed.map(|s| s.lat).unwrap_or(lat),
            hmm_lon: smoothed.map(|s| s.lon).unwrap_or(lon),
            hmm_acc: smoothed.map(|s| s.sigma_m).unwrap_or(0.0),
            kalman_lat,
            kalman_lon,
            final_lat: lat,
            final_lon: lon,
            snap_enabled: self.config.enable_snap_to_roads,
            snap_lat: None,
            snap_lon: None,
            snap_confidence: 0.0,
            snap_distance: 0.0,
            snap_road_id: -1,
            snap_road_type: None,
            snap_applied: false,
            nearest_road_id: self.last_nearest.as_ref().map(|n| n.id).unwrap_or(-1),
            nearest_road_name: self.last_nearest.as_ref().and_then(|n| n.name.clone()),
            nearest_road_type: self.last_nearest.as_ref().map(|n| n.class),
            nearest_road_distance: self.last_nearest.as_ref().map(|n| n.distance_m),
            nearest_road_full_address: self
                .last_nearest
                .as_ref()
                .and_then(|n| n.full_address.clone()),
            dr: true,
            using_last_good: false,
        };

        self.stats.records_emitted += 1;
        EngineOutput {
            position: Some(record),
            events: Vec::new(),
        }
    }

    // ── Road data API ────────────────────────────────────────────────────

    /// Validate and install road records. On error the road table is
    /// left exactly as it was.
    pub fn load_road_data(&mut self, records: &[RoadRecord]) -> Result<usize, RoadDataError> {
        let segments = build_segments(records)?;
        let loaded = self.matcher.load(segments);
        log::debug!("loaded {} road segments", loaded);
        Ok(loaded)
    }

    pub fn clear_road_data(&mut self) {
        self.matcher.clear();
        self.last_nearest = None;
        log::debug!("road table cleared");
    }

    pub fn road_count(&self) -> usize {
        self.matcher.len()
    }

    // ── Queries & lifecycle ──────────────────────────────────────────────

    /// Current smoother spread in meters (the `getHMMAccuracy` query).
    pub fn hmm_accuracy(&self) -> f64 {
        self.smoother.sigma_m()
    }

    pub fn priority(&self) -> PriorityClass {
        self.priority.current()
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Drop all per-session state: smoother window, deadband anchor,
    /// last-good hold, Kalman and DR initialisation, counters. Road data
    /// is retained until cleared explicitly.
    pub fn reset(&mut self) {
        self.gate.reset();
        self.priority = PriorityController::new(&self.config);
        self.smoother.clear();
        self.kalman.reset();
        self.reckoner.reset();
        self.last_emitted = None;
        self.last_nearest = None;
        self.last_fix_acc_m = 0.0;
        self.last_is_good = false;
        self.stats = EngineStats::default();
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn nearest_view(&self, nearest: crate::map_match::NearestRoad) -> NearestRoadView {
        let road = self.matcher.road(nearest.road_id);
        NearestRoadView {
            id: nearest.road_id,
            name: road.and_then(|r| r.name.clone()),
            class: road.map(|r| r.road_class).unwrap_or(RoadClass::Unknown),
            distance_m: nearest.distance_m,
            full_address: road.and_then(|r| r.full_address()),
        }
    }

    fn snap_view(&self, result: SnapResult) -> SnapView {
        SnapView {
            lat: result.snapped.0,
            lon: result.snapped.1,
            confidence: result.confidence,
            distance_m: result.distance_m,
            road_id: result.road_id,
            road_class: self.matcher.road(result.road_id).map(|r| r.road_class),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
