//! Enrollment Change Pipeline
//! Runs every stage once, top to bottom: fetch, load, join, canonicalize,
//! aggregate, filter, rank, select, render.

use crate::charts::{ChartSpec, DivergingBarRenderer, RenderError};
use crate::config::PipelineConfig;
use crate::data::{DataLoader, DataProcessor, DepartmentNames, LoaderError, ProcessorError};
use crate::fetch::{FetchError, Fetcher, TableSource};
use crate::report::{ReportError, SummaryReport};
use crate::stats::{DisplaySet, RankedDepartment, TrendCalculator};
use polars::prelude::DataFrame;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("fetch stage: could not set up HTTP client: {0}")]
    Client(#[source] FetchError),
    #[error("fetch stage failed for the {term} term: {source}")]
    Retrieval {
        term: &'static str,
        #[source]
        source: FetchError,
    },
    #[error("load stage failed for the {term} term: {source}")]
    Schema {
        term: &'static str,
        #[source]
        source: LoaderError,
    },
    #[error("cleanup of downloaded export failed: {0}")]
    Cleanup(#[source] std::io::Error),
    #[error("processing stage failed: {0}")]
    Processing(#[from] ProcessorError),
    #[error(
        "no department has at least {min_total} undergraduates in both terms \
         ({aggregated} departments before filtering)"
    )]
    DataIntegrity { min_total: i64, aggregated: usize },
    #[error("render stage failed: {0}")]
    Render(#[from] RenderError),
    #[error("summary stage failed: {0}")]
    Report(#[from] ReportError),
}

/// What a successful run charted.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub ranked: Vec<RankedDepartment>,
    pub display: DisplaySet,
}

pub struct EnrollmentPipeline<'a> {
    config: &'a PipelineConfig,
    names: DepartmentNames,
}

impl<'a> EnrollmentPipeline<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            names: DepartmentNames::default(),
        }
    }

    pub fn run(&self) -> Result<PipelineOutcome, PipelineError> {
        let fetcher = Fetcher::new(Duration::from_secs(self.config.request_timeout_secs))
            .map_err(PipelineError::Client)?;
        let (current, prior) = self.load_terms(&fetcher)?;
        let outcome = self.analyze(&current, &prior)?;

        let spec = ChartSpec {
            title: self.config.title(),
            subtitle: self.config.subtitle(),
            caption: self.config.caption(),
            legend_title: format!("Undergraduates\nin {}", self.config.current_label()),
            axis_limit: self.config.axis_limit,
            width: self.config.chart.width,
            height: self.config.chart.height,
        };
        DivergingBarRenderer::render(&outcome.display, &spec, &self.config.output)?;

        if let Some(path) = &self.config.summary {
            SummaryReport::new(&outcome.display, self.config).write(path)?;
            info!(path = %path.display(), "wrote summary");
        }

        Ok(outcome)
    }

    /// Fetch and load both terms as `(current, prior)`. Downloads are
    /// removed before this returns, whether loading succeeded or not.
    pub fn load_terms(&self, fetcher: &Fetcher) -> Result<(DataFrame, DataFrame), PipelineError> {
        let prior_table = fetcher
            .fetch(&TableSource::parse(&self.config.prior.source))
            .map_err(|source| PipelineError::Retrieval {
                term: "prior",
                source,
            })?;
        let current_table = fetcher
            .fetch(&TableSource::parse(&self.config.current.source))
            .map_err(|source| PipelineError::Retrieval {
                term: "current",
                source,
            })?;

        let loader = DataLoader::new(self.config.header_skip);
        let prior = loader.load(prior_table.path());
        let current = loader.load(current_table.path());

        prior_table.close().map_err(PipelineError::Cleanup)?;
        current_table.close().map_err(PipelineError::Cleanup)?;

        let prior = prior.map_err(|source| PipelineError::Schema {
            term: "prior",
            source,
        })?;
        let current = current.map_err(|source| PipelineError::Schema {
            term: "current",
            source,
        })?;
        Ok((current, prior))
    }

    /// Join through selection. Fails when the significance filter leaves
    /// nothing to chart.
    pub fn analyze(
        &self,
        current: &DataFrame,
        prior: &DataFrame,
    ) -> Result<PipelineOutcome, PipelineError> {
        let joined = DataProcessor::join_terms(current, prior)?;
        let joined = DataProcessor::canonicalize_departments(joined, &self.names)?;
        let totals = DataProcessor::aggregate(&joined)?;

        let aggregated = totals.len();
        let min_total = self.config.min_department_total;
        let significant = TrendCalculator::filter_significant(totals, min_total);
        if significant.is_empty() {
            return Err(PipelineError::DataIntegrity {
                min_total,
                aggregated,
            });
        }

        let ranked = TrendCalculator::rank(significant);
        let selection = TrendCalculator::select_extremes(&ranked, self.config.top_bottom_k);
        info!(
            ranked = ranked.len(),
            displayed = selection.len(),
            "selected departments for display"
        );
        Ok(PipelineOutcome {
            ranked,
            display: selection,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::columns::{COURSE_DEPARTMENT, COURSE_ID, U_GRAD};
    use polars::df;
    use std::io::Write;

    fn term(rows: &[(&str, i64, &str)]) -> DataFrame {
        let ids: Vec<&str> = rows.iter().map(|r| r.0).collect();
        let counts: Vec<i64> = rows.iter().map(|r| r.1).collect();
        let departments: Vec<&str> = rows.iter().map(|r| r.2).collect();
        df!(
            COURSE_ID => ids,
            U_GRAD => counts,
            COURSE_DEPARTMENT => departments
        )
        .expect("term frame")
    }

    #[test]
    fn small_department_is_excluded() {
        let config = PipelineConfig::default();
        let pipeline = EnrollmentPipeline::new(&config);
        let current = term(&[("c1", 40, "Econ"), ("c2", 30, "Econ"), ("m1", 120, "Math")]);
        let prior = term(&[("c1", 20, "Econ"), ("c2", 20, "Econ"), ("m1", 60, "Math")]);

        let outcome = pipeline.analyze(&current, &prior).unwrap();
        let names: Vec<&str> = outcome.ranked.iter().map(|r| r.department.as_str()).collect();
        assert_eq!(names, vec!["Math"]);
    }

    #[test]
    fn only_small_departments_is_a_data_integrity_error() {
        let config = PipelineConfig::default();
        let pipeline = EnrollmentPipeline::new(&config);
        let current = term(&[("c1", 40, "Econ"), ("c2", 30, "Econ")]);
        let prior = term(&[("c1", 20, "Econ"), ("c2", 20, "Econ")]);

        let err = pipeline.analyze(&current, &prior).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DataIntegrity {
                min_total: 50,
                aggregated: 1
            }
        ));
    }

    #[test]
    fn doubling_department_reports_one_hundred_percent() {
        let mut config = PipelineConfig::default();
        config.min_department_total = 30;
        let pipeline = EnrollmentPipeline::new(&config);
        let current = term(&[("c1", 60, "Math")]);
        let prior = term(&[("c1", 30, "Math")]);

        let outcome = pipeline.analyze(&current, &prior).unwrap();
        assert_eq!(outcome.ranked.len(), 1);
        assert_eq!(outcome.ranked[0].percent_change, 100);
        assert_eq!(outcome.display.top, outcome.ranked);
        assert_eq!(outcome.display.bottom, outcome.ranked);
    }

    #[test]
    fn prior_total_below_minimum_is_filtered_even_when_current_passes() {
        let config = PipelineConfig::default();
        let pipeline = EnrollmentPipeline::new(&config);
        let current = term(&[("m1", 60, "Math"), ("h1", 120, "History")]);
        let prior = term(&[("m1", 30, "Math"), ("h1", 100, "History")]);

        let outcome = pipeline.analyze(&current, &prior).unwrap();
        let names: Vec<&str> = outcome.ranked.iter().map(|r| r.department.as_str()).collect();
        assert_eq!(names, vec!["History"]);
        assert_eq!(outcome.display.len(), 2);
    }

    #[test]
    fn verbose_labels_are_charted_under_canonical_names() {
        let config = PipelineConfig::default();
        let pipeline = EnrollmentPipeline::new(&config);
        let current = term(&[
            ("a1", 90, "African & African Amer Studies"),
            ("e1", 400, "Electrical Eng & Computer Sci"),
            ("e2", 200, "Electrical Eng & Computer Sci"),
        ]);
        let prior = term(&[
            ("a1", 100, "African & African Amer Studies"),
            ("e1", 300, "Electrical Eng & Computer Sci"),
            ("e2", 200, "Electrical Eng & Computer Sci"),
        ]);

        let outcome = pipeline.analyze(&current, &prior).unwrap();
        let ranked: Vec<(&str, i64)> = outcome
            .ranked
            .iter()
            .map(|r| (r.department.as_str(), r.percent_change))
            .collect();
        assert_eq!(ranked, vec![("EECS", 20), ("African Studies", -10)]);
    }

    #[test]
    fn local_exports_load_and_rank() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, body: &str| {
            let path = dir.path().join(name);
            let mut file = std::fs::File::create(&path).unwrap();
            write!(file, "Enrollment by Course\nUndergraduate and Graduate\nAs of census\n{body}").unwrap();
            path
        };
        let prior = write(
            "spring-2018.csv",
            "Course ID,Course Name,U Grad,Course Department\n\
             S1,Probability,100,Statistics\n\
             S2,Regression,100,Statistics\n\
             H1,Modern Europe,80,History\n\
             X1,,500,History\n",
        );
        let current = write(
            "spring-2019.csv",
            "Course ID,Course Name,U Grad,Course Department\n\
             S1,Probability,150,Statistics\n\
             S2,Regression,120,Statistics\n\
             H1,Modern Europe,60,History\n\
             N1,New Seminar,90,History\n",
        );

        let mut config = PipelineConfig::default();
        config.prior.source = prior.to_string_lossy().into_owned();
        config.current.source = current.to_string_lossy().into_owned();
        let pipeline = EnrollmentPipeline::new(&config);
        let fetcher = Fetcher::new(Duration::from_secs(5)).unwrap();

        let (current_df, prior_df) = pipeline.load_terms(&fetcher).unwrap();
        assert_eq!(prior_df.height(), 3);
        assert_eq!(current_df.height(), 4);
        assert!(prior.exists() && current.exists());

        let outcome = pipeline.analyze(&current_df, &prior_df).unwrap();
        let ranked: Vec<(&str, i64)> = outcome
            .ranked
            .iter()
            .map(|r| (r.department.as_str(), r.percent_change))
            .collect();
        assert_eq!(ranked, vec![("Statistics", 35), ("History", -25)]);
    }

    #[test]
    fn missing_export_names_the_term() {
        let mut config = PipelineConfig::default();
        config.prior.source = "/nonexistent/prior.xlsx".to_string();
        config.current.source = "/nonexistent/current.xlsx".to_string();
        let pipeline = EnrollmentPipeline::new(&config);
        let fetcher = Fetcher::new(Duration::from_secs(5)).unwrap();

        let err = pipeline.load_terms(&fetcher).unwrap_err();
        assert!(matches!(err, PipelineError::Retrieval { term: "prior", .. }));
        assert!(err.to_string().starts_with("fetch stage"));
    }
}
