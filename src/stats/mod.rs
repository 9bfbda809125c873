//! Stats module - Percent change, significance filter and ranking

mod calculator;

pub use calculator::{
    DisplaySet, RankGroup, RankedDepartment, TrendCalculator, MIN_DEPARTMENT_TOTAL, TOP_BOTTOM_K,
};
