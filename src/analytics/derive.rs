//! Guarded division for derived metrics.
//!
//! Every ratio a report computes goes through here. A zero or null
//! denominator resolves to `None` (rendered as JSON `null`) instead of
//! failing, and the occurrence is recorded as a [`DataQualityWarning`].

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};

use super::types::DataQualityWarning;
use crate::model::Value;

/// Safe division returning `None` when the denominator is zero or the
/// quotient overflows.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator.is_zero() {
        None
    } else {
        numerator.checked_div(denominator)
    }
}

/// `value / total` with NULLIF semantics: a null operand or a zero total
/// yields the null sentinel.
pub fn ratio_to_total(value: &Value, total: &Value) -> Option<Decimal> {
    safe_div(value.as_decimal()?, total.as_decimal()?)
}

/// Round half away from zero, matching `ROUND(numeric, dp)`.
pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Per-invocation division guard.
///
/// Collects how often each metric hit the sentinel so the report can return
/// the counts alongside its rows. Never shared between invocations.
#[derive(Debug, Default)]
pub struct DivisionGuard {
    sentinels: BTreeMap<&'static str, usize>,
}

impl DivisionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Guarded `numerator / denominator`.
    ///
    /// A null numerator propagates as null without counting as a warning;
    /// only a missing or zero denominator does.
    pub fn ratio(
        &mut self,
        metric: &'static str,
        numerator: Option<Decimal>,
        denominator: Option<Decimal>,
    ) -> Option<Decimal> {
        let numerator = numerator?;
        match denominator.and_then(|d| safe_div(numerator, d)) {
            Some(q) => Some(q),
            None => {
                *self.sentinels.entry(metric).or_default() += 1;
                None
            }
        }
    }

    /// [`ratio`](Self::ratio) over row values.
    pub fn ratio_values(&mut self, metric: &'static str, numerator: &Value, denominator: &Value) -> Value {
        self.ratio(metric, numerator.as_decimal(), denominator.as_decimal())
            .into()
    }

    /// Number of sentinel substitutions recorded so far for `metric`.
    pub fn occurrences(&self, metric: &str) -> usize {
        self.sentinels.get(metric).copied().unwrap_or(0)
    }

    /// Log and hand over the collected warnings, one per metric.
    pub fn into_warnings(self, report: &str) -> Vec<DataQualityWarning> {
        self.sentinels
            .into_iter()
            .map(|(metric, occurrences)| {
                tracing::warn!(
                    report,
                    metric,
                    occurrences,
                    "guarded division resolved to null"
                );
                DataQualityWarning {
                    metric: metric.to_string(),
                    occurrences,
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
