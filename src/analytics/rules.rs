//! Business rule tables.
//!
//! Each table is an ordered list evaluated top to bottom; the first matching
//! rule wins. Thresholds are the reporting heuristics the dashboards were
//! built on and are kept exactly as-is.

use serde::Serialize;

// ---------------------------------------------------------------------------
// RFM segmentation
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum RfmSegment {
    Champions,
    Loyal,
    New,
    AtRisk,
    Lost,
    Potential,
}

impl RfmSegment {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Champions => "Champions",
            Self::Loyal => "Loyal",
            Self::New => "New",
            Self::AtRisk => "At Risk",
            Self::Lost => "Lost",
            Self::Potential => "Potential",
        }
    }
}

impl std::fmt::Display for RfmSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive score bound on one RFM axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bound {
    Any,
    AtLeast(i64),
    AtMost(i64),
}

impl Bound {
    fn admits(self, score: i64) -> bool {
        match self {
            Self::Any => true,
            Self::AtLeast(n) => score >= n,
            Self::AtMost(n) => score <= n,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RfmRule {
    pub recency: Bound,
    pub frequency: Bound,
    pub monetary: Bound,
    pub segment: RfmSegment,
}

impl RfmRule {
    pub fn matches(&self, r: i64, f: i64, m: i64) -> bool {
        self.recency.admits(r) && self.frequency.admits(f) && self.monetary.admits(m)
    }
}

/// Segment rules in priority order. Anything unmatched is `Potential`.
pub const RFM_RULES: &[RfmRule] = &[
    RfmRule {
        recency: Bound::AtLeast(4),
        frequency: Bound::AtLeast(4),
        monetary: Bound::AtLeast(4),
        segment: RfmSegment::Champions,
    },
    RfmRule {
        recency: Bound::AtLeast(3),
        frequency: Bound::AtLeast(3),
        monetary: Bound::AtLeast(3),
        segment: RfmSegment::Loyal,
    },
    RfmRule {
        recency: Bound::AtLeast(4),
        frequency: Bound::AtMost(2),
        monetary: Bound::Any,
        segment: RfmSegment::New,
    },
    RfmRule {
        recency: Bound::AtMost(2),
        frequency: Bound::AtLeast(3),
        monetary: Bound::Any,
        segment: RfmSegment::AtRisk,
    },
    RfmRule {
        recency: Bound::AtMost(2),
        frequency: Bound::AtMost(2),
        monetary: Bound::Any,
        segment: RfmSegment::Lost,
    },
];

/// Classify R/F/M quintile scores.
pub fn rfm_segment(r: i64, f: i64, m: i64) -> RfmSegment {
    RFM_RULES
        .iter()
        .find(|rule| rule.matches(r, f, m))
        .map_or(RfmSegment::Potential, |rule| rule.segment)
}

// ---------------------------------------------------------------------------
// Churn risk
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ChurnRisk {
    High,
    Medium,
    Low,
    Active,
}

impl ChurnRisk {
    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Active => "Active",
        }
    }
}

impl std::fmt::Display for ChurnRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// `(days strictly greater than, band)` in priority order.
pub const CHURN_BANDS: &[(i64, ChurnRisk)] = &[
    (180, ChurnRisk::High),
    (90, ChurnRisk::Medium),
    (30, ChurnRisk::Low),
];

pub fn churn_risk(days_since_last_purchase: i64) -> ChurnRisk {
    CHURN_BANDS
        .iter()
        .find(|(threshold, _)| days_since_last_purchase > *threshold)
        .map_or(ChurnRisk::Active, |(_, band)| *band)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
