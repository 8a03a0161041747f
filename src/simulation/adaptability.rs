//! # Adaptive step-quality gate
//!
//! Every [`Body`](super::states::Body) owns one [`AdaptabilityController`].
//! Before a step of size `dt` is committed, the controller is shown a scalar
//! step-quality metric (the body's velocity differential, `|a| * dt`) and
//! decides whether the step is acceptable.
//!
//! ## Thresholds
//!
//! Three independent thresholds can be enabled, and are evaluated in order of
//! computational cost:
//!
//! 1. **absolute**: a fixed upper bound on the metric.
//! 2. **quantile**: the empirical quantile of previously accepted metric
//!    values (needs at least [`MIN_QUANTILE_SAMPLES`]). A configured quantile
//!    above `1.0` is extrapolated beyond the observed range.
//! 3. **deviation**: `mean + k * stddev` of the history (needs at least
//!    [`MIN_DEVIATION_SAMPLES`]).
//!
//! The step is acceptable when the metric is below the **largest** of the
//! thresholds that could be evaluated. So a single lenient rule is enough to
//! accept a step. As a consequence evaluation stops at the first threshold
//! that already clears the metric. A step with no applicable threshold (all
//! checks disabled, or not enough history yet) is always accepted.
//!
//! ## Rejection
//!
//! On rejection the controller remembers the violated threshold and
//! recommends a subdivision factor `ceil(metric / threshold)`, clamped to
//! `[2, ceil(dt / min_time_step)]`. Steps at or below `min_time_step` are
//! accepted unconditionally, which bounds the subdivision depth. The floor is
//! inclusive (`dt <= min_time_step`): a step of exactly `min_time_step` would
//! otherwise be rejected with nothing left to split it into.

use std::collections::VecDeque;

use crate::simulation::params::AdaptabilityParams;

/// The quantile of fewer samples is not meaningful
pub const MIN_QUANTILE_SAMPLES: usize = 10;

/// The deviation of fewer samples is not meaningful
pub const MIN_DEVIATION_SAMPLES: usize = 2;

/// Most recent samples left out of the extrapolated quantile
const EXTRAPOLATION_SKIPPED_RECENT: usize = 2;

/// Outcome of the most recent [`AdaptabilityController::check_ok`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CheckState {
    NotChecked,
    Accepted,
    Rejected {
        threshold: f64, // the largest threshold the metric failed to clear
        division: usize, // recommended subdivision factor, always >= 2
    },
}

impl CheckState {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CheckState::Accepted)
    }
}

#[derive(Debug, Clone)]
pub struct AdaptabilityController {
    params: AdaptabilityParams,
    history: VecDeque<f64>,
    state: CheckState,
}

impl AdaptabilityController {
    pub fn new(params: AdaptabilityParams) -> Self {
        Self {
            params,
            history: VecDeque::new(),
            state: CheckState::NotChecked,
        }
    }

    pub fn params(&self) -> &AdaptabilityParams {
        &self.params
    }

    pub fn is_enabled(&self) -> bool {
        self.params.is_adaptive
    }

    pub fn state(&self) -> CheckState {
        self.state
    }

    /// Previously accepted metric values, oldest first
    pub fn history(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().copied()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Threshold violated by the last check, `None` unless it was rejected
    pub fn last_failure_threshold(&self) -> Option<f64> {
        match self.state {
            CheckState::Rejected { threshold, .. } => Some(threshold),
            _ => None,
        }
    }

    /// Subdivision factor the last check asks for (1 when nothing was rejected)
    pub fn recommended_division(&self) -> usize {
        match self.state {
            CheckState::Rejected { division, .. } => division,
            _ => 1,
        }
    }

    /// Record a metric value. Does nothing while adaptivity is disabled
    pub fn store_value(&mut self, value: f64) {
        if !self.params.is_adaptive || !value.is_finite() {
            return;
        }
        self.history.push_back(value);
        if let Some(window) = self.params.history_window {
            while self.history.len() > window {
                self.history.pop_front();
            }
        }
    }

    /// Decide whether a step of `time_step` is acceptable.
    ///
    /// `metric` maps a trial step size to the step-quality value. It must
    /// shrink with the step size, otherwise subdividing cannot help.
    /// Calling this repeatedly with the same inputs yields the same state,
    /// and it never grows the history.
    pub fn check_ok<F>(&mut self, time_step: f64, metric: F) -> CheckState
    where
        F: Fn(f64) -> f64,
    {
        self.state = self.evaluate(time_step, metric);
        self.state
    }

    fn evaluate<F>(&self, time_step: f64, metric: F) -> CheckState
    where
        F: Fn(f64) -> f64,
    {
        if !self.params.is_adaptive || time_step <= self.params.min_time_step {
            return CheckState::Accepted;
        }

        let actual = metric(time_step);

        // Ordered by computational cost
        let thresholds: [fn(&Self) -> Option<f64>; 3] = [
            Self::threshold_by_absolute,
            Self::threshold_by_quantile,
            Self::threshold_by_deviation,
        ];

        let mut worst: Option<f64> = None;
        for threshold in thresholds {
            if let Some(value) = threshold(self) {
                if actual < value {
                    return CheckState::Accepted;
                }
                worst = Some(worst.map_or(value, |w| w.max(value)));
            }
        }

        match worst {
            None => CheckState::Accepted,
            Some(threshold) => CheckState::Rejected {
                threshold,
                division: self.division_for(actual, threshold, time_step),
            },
        }
    }

    fn division_for(&self, actual: f64, threshold: f64, time_step: f64) -> usize {
        // time_step > min_time_step here, so the ceiling is at least 2
        let upper = ceil_to_usize(time_step / self.params.min_time_step).max(2);
        let ratio = actual / threshold;
        let wanted = if threshold > 0.0 && ratio.is_finite() {
            ceil_to_usize(ratio)
        } else {
            upper
        };
        wanted.clamp(2, upper)
    }

    fn threshold_by_absolute(&self) -> Option<f64> {
        self.params.max_absolute_value
    }

    fn threshold_by_quantile(&self) -> Option<f64> {
        let quantile = self.params.max_quantile?;
        if self.history.len() < MIN_QUANTILE_SAMPLES {
            return None;
        }
        if quantile <= 1.0 {
            quantile_higher(&sorted(self.history.iter().copied()), quantile)
        } else {
            let settled = self.history.len() - EXTRAPOLATION_SKIPPED_RECENT;
            let samples: Vec<f64> = self.history.iter().copied().take(settled).collect();
            extrapolated_quantile(&samples, quantile, self.params.quantile_ignored_extremes)
        }
    }

    fn threshold_by_deviation(&self) -> Option<f64> {
        let k = self.params.max_deviation?;
        if self.history.len() < MIN_DEVIATION_SAMPLES {
            return None;
        }
        let samples: Vec<f64> = self.history.iter().copied().collect();
        Some(mean(&samples)? + k * std_dev(&samples)?)
    }
}

// helpers ===========================================================================

fn ceil_to_usize(value: f64) -> usize {
    if value.is_nan() || value <= 0.0 {
        0
    } else if value >= usize::MAX as f64 {
        usize::MAX
    } else {
        value.ceil() as usize
    }
}

fn sorted(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = values.collect();
    v.sort_by(f64::total_cmp);
    v
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation
fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Empirical quantile without interpolation, rounding the rank up:
/// `sorted[ceil(q * (n - 1))]`
fn quantile_higher(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let last = sorted.len() - 1;
    let rank = (q.clamp(0.0, 1.0) * last as f64).ceil() as usize;
    sorted.get(rank.min(last)).copied()
}

/// Threshold beyond the observed range for a configured quantile `q > 1`.
///
/// The spread between the `ignored` and `1 - ignored` quantiles is scaled up
/// to the full range (divided by the retained fraction) and added to the
/// mean `q - 0.5` times. At `q = 1` this lands near the observed maximum of a
/// uniform-ish sample, and grows linearly past it.
fn extrapolated_quantile(samples: &[f64], q: f64, ignored: f64) -> Option<f64> {
    let sorted = sorted(samples.iter().copied());
    let low = quantile_higher(&sorted, ignored)?;
    let high = quantile_higher(&sorted, 1.0 - ignored)?;
    let spread = (high - low) / (1.0 - 2.0 * ignored);
    Some(mean(samples)? + (q - 0.5) * spread)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quantile_higher_rounds_rank_up() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile_higher(&v, 0.0), Some(1.0));
        assert_eq!(quantile_higher(&v, 0.5), Some(3.0));
        assert_eq!(quantile_higher(&v, 0.6), Some(4.0));
        assert_eq!(quantile_higher(&v, 1.0), Some(5.0));
        assert_eq!(quantile_higher(&[], 0.5), None);
    }

    #[test]
    fn population_std_dev() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&v).unwrap(), 5.0);
        assert_relative_eq!(std_dev(&v).unwrap(), 2.0);
    }

    #[test]
    fn extrapolation_grows_past_the_maximum() {
        let v: Vec<f64> = (1..=20_u32).map(f64::from).collect();
        let at_one = extrapolated_quantile(&v, 1.0, 0.1).unwrap();
        let at_two = extrapolated_quantile(&v, 2.0, 0.1).unwrap();
        assert!(at_two > 20.0, "extrapolated threshold {at_two} not beyond max");
        assert!(at_two > at_one);
    }

    #[test]
    fn division_is_clamped() {
        let params = AdaptabilityParams {
            is_adaptive: true,
            max_absolute_value: Some(1.0),
            min_time_step: 0.125,
            ..AdaptabilityParams::default()
        };
        let c = AdaptabilityController::new(params);
        assert_eq!(c.division_for(1.1, 1.0, 1.0), 2);
        assert_eq!(c.division_for(3.5, 1.0, 1.0), 4);
        assert_eq!(c.division_for(1e9, 1.0, 1.0), 8);
        assert_eq!(c.division_for(5.0, 0.0, 1.0), 8);
    }

    #[test]
    fn window_bounds_history() {
        let params = AdaptabilityParams {
            is_adaptive: true,
            history_window: Some(3),
            ..AdaptabilityParams::default()
        };
        let mut c = AdaptabilityController::new(params);
        for v in 1..=5_u32 {
            c.store_value(f64::from(v));
        }
        assert_eq!(c.history().collect::<Vec<_>>(), vec![3.0, 4.0, 5.0]);
    }
}
