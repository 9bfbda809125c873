//! Pipeline configuration.
//! Every field has a default; a JSON file and CLI flags override them.

use crate::stats::{MIN_DEPARTMENT_TOTAL, TOP_BOTTOM_K};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("No source given for the {0} term")]
    MissingSource(&'static str),
    #[error("{field} must be at least 1, got {value}")]
    NotPositive { field: &'static str, value: i64 },
}

const PRIOR_LABEL: &str = "Spring 2018";
const CURRENT_LABEL: &str = "Spring 2019";

/// One term export and the label it is shown under.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TermConfig {
    pub label: Option<String>,
    /// http(s) URL or local path.
    pub source: String,
}

/// Canvas size and text of the rendered chart.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub caption: Option<String>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 1400,
            height: 900,
            title: None,
            subtitle: None,
            caption: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    pub prior: TermConfig,
    pub current: TermConfig,
    /// Preamble rows above the header in each export.
    pub header_skip: usize,
    pub min_department_total: i64,
    pub top_bottom_k: usize,
    /// Value axis spans `[-axis_limit, axis_limit]` percent.
    pub axis_limit: i64,
    pub output: PathBuf,
    /// Optional JSON dump of the charted departments.
    pub summary: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub chart: ChartConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prior: TermConfig::default(),
            current: TermConfig::default(),
            header_skip: 3,
            min_department_total: MIN_DEPARTMENT_TOTAL,
            top_bottom_k: TOP_BOTTOM_K,
            axis_limit: 60,
            output: PathBuf::from("enrollment_change.png"),
            summary: None,
            request_timeout_secs: 60,
            chart: ChartConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prior.source.trim().is_empty() {
            return Err(ConfigError::MissingSource("prior"));
        }
        if self.current.source.trim().is_empty() {
            return Err(ConfigError::MissingSource("current"));
        }
        let checks = [
            ("min_department_total", self.min_department_total),
            ("top_bottom_k", self.top_bottom_k as i64),
            ("axis_limit", self.axis_limit),
        ];
        for (field, value) in checks {
            if value < 1 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        Ok(())
    }

    pub fn prior_label(&self) -> &str {
        self.prior.label.as_deref().unwrap_or(PRIOR_LABEL)
    }

    pub fn current_label(&self) -> &str {
        self.current.label.as_deref().unwrap_or(CURRENT_LABEL)
    }

    pub fn title(&self) -> String {
        self.chart.title.clone().unwrap_or_else(|| {
            "Which departments gained and lost the most undergraduates?".to_string()
        })
    }

    pub fn subtitle(&self) -> String {
        self.chart.subtitle.clone().unwrap_or_else(|| {
            format!(
                "Percent change in undergraduate course enrollment, {} to {}",
                self.prior_label(),
                self.current_label()
            )
        })
    }

    pub fn caption(&self) -> String {
        self.chart.caption.clone().unwrap_or_else(|| {
            format!(
                "Departments with fewer than {} undergraduates in either term are excluded. \
                 Only courses offered by the same department in both terms are counted.",
                self.min_department_total
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_sources() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.prior.source = "prior.xlsx".to_string();
        config.current.source = "current.xlsx".to_string();
        config
    }

    #[test]
    fn defaults_match_analysis_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.header_skip, 3);
        assert_eq!(config.min_department_total, 50);
        assert_eq!(config.top_bottom_k, 8);
        assert_eq!(config.axis_limit, 60);
        assert_eq!(config.prior_label(), "Spring 2018");
        assert_eq!(config.current_label(), "Spring 2019");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json(
            r#"{
                "current": { "source": "https://example.edu/sp19.xlsx" },
                "top_bottom_k": 5,
                "chart": { "title": "Enrollment shifts" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.current.source, "https://example.edu/sp19.xlsx");
        assert_eq!(config.current_label(), "Spring 2019");
        assert_eq!(config.top_bottom_k, 5);
        assert_eq!(config.min_department_total, 50);
        assert_eq!(config.chart.width, 1400);
        assert_eq!(config.title(), "Enrollment shifts");
    }

    #[test]
    fn validate_requires_sources() {
        let err = PipelineConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingSource("prior")));
        assert!(with_sources().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_threshold() {
        let mut config = with_sources();
        config.min_department_total = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NotPositive {
                field: "min_department_total",
                value: 0
            }
        ));
    }

    #[test]
    fn derived_text_mentions_terms_and_threshold() {
        let config = with_sources();
        assert!(config.subtitle().contains("Spring 2018 to Spring 2019"));
        assert!(config.caption().contains("fewer than 50"));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = PipelineConfig::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
