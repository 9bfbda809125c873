//! Change Calculator Module
//! Significance filtering, percent-change ranking and extreme selection.

use crate::data::DepartmentTotals;
use serde::Serialize;
use tracing::{debug, info};

/// Minimum per-term headcount for a department to be compared.
pub const MIN_DEPARTMENT_TOTAL: i64 = 50;

/// Number of gainers and of losers kept for display.
pub const TOP_BOTTOM_K: usize = 8;

/// A department with its rounded percent change between terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedDepartment {
    pub department: String,
    pub total_current: i64,
    pub total_prior: i64,
    pub percent_change: i64,
}

/// Which end of the ranking an entry of the display set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RankGroup {
    Top,
    Bottom,
}

/// Top-K gainers followed by bottom-K losers, each slice in rank order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplaySet {
    pub top: Vec<RankedDepartment>,
    pub bottom: Vec<RankedDepartment>,
    /// Length of the ranking the slices were cut from.
    pub ranked_len: usize,
}

impl DisplaySet {
    pub fn len(&self) -> usize {
        self.top.len() + self.bottom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_empty() && self.bottom.is_empty()
    }

    /// Entries in display order: `top ++ bottom`, tagged with their group.
    pub fn iter(&self) -> impl Iterator<Item = (RankGroup, &RankedDepartment)> {
        self.top
            .iter()
            .map(|d| (RankGroup::Top, d))
            .chain(self.bottom.iter().map(|d| (RankGroup::Bottom, d)))
    }

    /// 1-based positions in the full ranking, aligned with [`Self::iter`].
    pub fn ranks(&self) -> impl Iterator<Item = usize> + '_ {
        let bottom_start = self.ranked_len - self.bottom.len();
        (1..=self.top.len()).chain((1..=self.bottom.len()).map(move |i| bottom_start + i))
    }
}

/// Handles the filter/rank/select stages over department totals.
pub struct TrendCalculator;

impl TrendCalculator {
    /// Keep departments with at least `min_total` students in both terms.
    pub fn filter_significant(totals: Vec<DepartmentTotals>, min_total: i64) -> Vec<DepartmentTotals> {
        let before = totals.len();
        let kept: Vec<DepartmentTotals> = totals
            .into_iter()
            .filter(|t| {
                let keep = t.total_current >= min_total && t.total_prior >= min_total;
                if !keep {
                    debug!(
                        department = %t.department,
                        current = t.total_current,
                        prior = t.total_prior,
                        "dropped small department"
                    );
                }
                keep
            })
            .collect();
        info!(before, kept = kept.len(), min_total, "applied significance filter");
        kept
    }

    /// `round(100 * (current - prior) / prior)` with ties rounded to even.
    ///
    /// Callers guarantee `prior > 0` by filtering first.
    pub fn percent_change(current: i64, prior: i64) -> i64 {
        let ratio = 100.0 * (current - prior) as f64 / prior as f64;
        ratio.round_ties_even() as i64
    }

    /// Attach percent change and sort descending. The sort is stable, so
    /// equal changes keep their input order.
    pub fn rank(totals: Vec<DepartmentTotals>) -> Vec<RankedDepartment> {
        let mut ranked: Vec<RankedDepartment> = totals
            .into_iter()
            .map(|t| RankedDepartment {
                percent_change: Self::percent_change(t.total_current, t.total_prior),
                department: t.department,
                total_current: t.total_current,
                total_prior: t.total_prior,
            })
            .collect();
        ranked.sort_by(|a, b| b.percent_change.cmp(&a.percent_change));
        ranked
    }

    /// `ranked[..k] ++ ranked[len-k..]`. When fewer than `2k` departments
    /// are ranked the two slices overlap and entries appear twice.
    pub fn select_extremes(ranked: &[RankedDepartment], k: usize) -> DisplaySet {
        let take = k.min(ranked.len());
        let display = DisplaySet {
            top: ranked[..take].to_vec(),
            bottom: ranked[ranked.len() - take..].to_vec(),
            ranked_len: ranked.len(),
        };
        if ranked.len() < 2 * k {
            debug!(ranked = ranked.len(), k, "top and bottom selections overlap");
        }
        display
    }
}
