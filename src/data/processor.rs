//! Data Processor Module
//! Joins the two term frames, canonicalizes department names and sums
//! headcounts per department.

use super::columns::{
    COURSE_DEPARTMENT, COURSE_DEPARTMENT_PRIOR, COURSE_ID, DEPARTMENT, U_GRAD, U_GRAD_CURRENT,
    U_GRAD_PRIOR,
};
use super::DepartmentNames;
use polars::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Undergraduate headcount of one canonical department in both terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentTotals {
    pub department: String,
    pub total_current: i64,
    pub total_prior: i64,
}

/// Handles joining and aggregation of term frames.
pub struct DataProcessor;

impl DataProcessor {
    /// Pair current-term courses with their prior-term rows.
    ///
    /// Left join on `course_id`, then keep only rows whose raw department
    /// label is identical in both terms. Current-only courses have a null
    /// prior label and fall out at the equality filter.
    ///
    /// Output columns: [course_id, department, u_grad_current, u_grad_prior]
    pub fn join_terms(current: &DataFrame, prior: &DataFrame) -> Result<DataFrame, ProcessorError> {
        let prior_lf = prior.clone().lazy().select([
            col(COURSE_ID),
            col(U_GRAD).alias(U_GRAD_PRIOR),
            col(COURSE_DEPARTMENT).alias(COURSE_DEPARTMENT_PRIOR),
        ]);

        let joined = current
            .clone()
            .lazy()
            .join(
                prior_lf,
                [col(COURSE_ID)],
                [col(COURSE_ID)],
                JoinArgs::new(JoinType::Left),
            )
            .filter(col(COURSE_DEPARTMENT).eq(col(COURSE_DEPARTMENT_PRIOR)))
            .select([
                col(COURSE_ID),
                col(COURSE_DEPARTMENT).alias(DEPARTMENT),
                col(U_GRAD).alias(U_GRAD_CURRENT),
                col(U_GRAD_PRIOR),
            ])
            .collect()?;

        info!(
            current = current.height(),
            prior = prior.height(),
            joined = joined.height(),
            "joined terms on course_id"
        );
        Ok(joined)
    }

    /// Replace the `department` column with canonical names.
    pub fn canonicalize_departments(
        mut joined: DataFrame,
        names: &DepartmentNames,
    ) -> Result<DataFrame, ProcessorError> {
        let canonical: Vec<Option<String>> = joined
            .column(DEPARTMENT)?
            .str()?
            .into_iter()
            .map(|label| label.map(|label| names.canonicalize(label).to_string()))
            .collect();

        joined.with_column(Column::new(DEPARTMENT.into(), canonical))?;
        Ok(joined)
    }

    /// Sum both headcounts per department, sorted by department name.
    pub fn aggregate(joined: &DataFrame) -> Result<Vec<DepartmentTotals>, ProcessorError> {
        let grouped = joined
            .clone()
            .lazy()
            .group_by([col(DEPARTMENT)])
            .agg([col(U_GRAD_CURRENT).sum(), col(U_GRAD_PRIOR).sum()])
            .collect()?;

        let departments = grouped.column(DEPARTMENT)?.str()?;
        let current = grouped.column(U_GRAD_CURRENT)?.i64()?;
        let prior = grouped.column(U_GRAD_PRIOR)?.i64()?;

        let mut totals: Vec<DepartmentTotals> = departments
            .into_iter()
            .zip(current)
            .zip(prior)
            .filter_map(|((department, current), prior)| {
                Some(DepartmentTotals {
                    department: department?.to_string(),
                    total_current: current.unwrap_or(0),
                    total_prior: prior.unwrap_or(0),
                })
            })
            .collect();
        totals.sort_by(|a, b| a.department.cmp(&b.department));

        info!(departments = totals.len(), "aggregated department totals");
        Ok(totals)
    }
}
