use crate::config::EngineConfig;
use crate::types::PriorityClass;

/// What the gate decided for an incoming fix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// Use the filtered position derived from this fix.
    Accept,
    /// Discard the fix entirely; nothing is emitted.
    Drop,
    /// Advance the filters but emit the last-good position.
    HoldLastGood,
}

/// Result of gating one fix.
#[derive(Clone, Copy, Debug)]
pub struct GateResult {
    pub decision: GateDecision,
    /// True once enough consecutive fixes met the target accuracy.
    pub is_good: bool,
}

/// Last position considered trustworthy, used to bridge noisy stretches.
#[derive(Clone, Copy, Debug)]
pub struct LastGood {
    pub lat: f64,
    pub lon: f64,
    pub t_ms: u64,
    pub acc_m: f64,
}

/// Accepts, drops or holds raw fixes based on reported accuracy.
///
/// A fix settles into "good" only after `settle_samples` consecutive fixes
/// at or under the target accuracy; a single bad fix resets the count.
/// While unsettled, emission pins to the last-good position as long as it
/// is fresh enough.
pub struct FixGate {
    target_accuracy_m: f64,
    discard_accuracy_above_m: f64,
    settle_samples: u32,
    good_hold_timeout_ms: u64,

    good_fix_count: u32,
    last_good: Option<LastGood>,
}

impl FixGate {
    pub fn new(config: &EngineConfig) -> Self {
        FixGate {
            target_accuracy_m: config.target_accuracy_m,
            discard_accuracy_above_m: config.discard_accuracy_above_m,
            settle_samples: config.settle_samples,
            good_hold_timeout_ms: config.good_hold_timeout_ms,
            good_fix_count: 0,
            last_good: None,
        }
    }

    /// Gate one fix by timestamp and reported accuracy.
    pub fn evaluate(&mut self, t_ms: u64, acc_m: f64) -> GateResult {
        if acc_m.is_nan() || acc_m <= 0.0 || acc_m > self.discard_accuracy_above_m {
            return GateResult {
                decision: GateDecision::Drop,
                is_good: false,
            };
        }

        if acc_m <= self.target_accuracy_m {
            self.good_fix_count += 1;
        } else {
            self.good_fix_count = 0;
        }
        let is_good = self.good_fix_count >= self.settle_samples;

        let decision = if is_good {
            GateDecision::Accept
        } else if self.held_position(t_ms).is_some() {
            GateDecision::HoldLastGood
        } else {
            GateDecision::Accept
        };

        GateResult { decision, is_good }
    }

    /// Record the trusted coordinates for this fix. The caller passes the
    /// snapped position when a snap was accepted, the raw one otherwise.
    pub fn record_good(&mut self, lat: f64, lon: f64, t_ms: u64, acc_m: f64) {
        self.last_good = Some(LastGood {
            lat,
            lon,
            t_ms,
            acc_m,
        });
    }

    /// The last-good position, if it is still within the hold timeout at `t_ms`.
    pub fn held_position(&self, t_ms: u64) -> Option<&LastGood> {
        self.last_good
            .as_ref()
            .filter(|lg| t_ms.saturating_sub(lg.t_ms) <= self.good_hold_timeout_ms)
    }

    pub fn last_good(&self) -> Option<&LastGood> {
        self.last_good.as_ref()
    }

    pub fn reset(&mut self) {
        self.good_fix_count = 0;
        self.last_good = None;
    }
}

/// Requested accuracy class with two-threshold hysteresis.
///
/// Accuracy above `promote_high_above_m` asks for HIGH, accuracy at or
/// under `demote_balanced_below_m` asks for BALANCED; the gap between the
/// thresholds plus the switch lock-out keeps the class from oscillating.
pub struct PriorityController {
    current: PriorityClass,
    last_switch_ms: Option<u64>,
    promote_high_above_m: f64,
    demote_balanced_below_m: f64,
    min_switch_interval_ms: u64,
}

impl PriorityController {
    pub fn new(config: &EngineConfig) -> Self {
        PriorityController {
            current: if config.high_accuracy {
                PriorityClass::High
            } else {
                PriorityClass::Balanced
            },
            last_switch_ms: None,
            promote_high_above_m: config.promote_high_above_m,
            demote_balanced_below_m: config.demote_balanced_below_m,
            min_switch_interval_ms: config.min_switch_interval_ms,
        }
    }

    pub fn current(&self) -> PriorityClass {
        self.current
    }

    /// Feed the accuracy of one fix. Returns (from, to) when the class
    /// switched; the host should rebuild its positioning request.
    pub fn observe(&mut self, t_ms: u64, acc_m: f64) -> Option<(PriorityClass, PriorityClass)> {
        if !acc_m.is_finite() || acc_m <= 0.0 {
            return None;
        }
        if let Some(last) = self.last_switch_ms {
            if t_ms.saturating_sub(last) < self.min_switch_interval_ms {
                return None;
            }
        }

        let target = if acc_m > self.promote_high_above_m {
            Some(PriorityClass::High)
        } else if acc_m <= self.demote_balanced_below_m {
            Some(PriorityClass::Balanced)
        } else {
            None
        };

        match target {
            Some(next) if next != self.current => {
                let from = self.current;
                self.current = next;
                self.last_switch_ms = Some(t_ms);
                Some((from, next))
            }
            _ => None,
        }
    }
}
