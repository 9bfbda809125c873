//! Summary Report Module
//! Writes the charted departments as a JSON document next to the chart.

use crate::config::PipelineConfig;
use crate::stats::{DisplaySet, RankGroup, RankedDepartment};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write summary: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode summary: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
pub struct SummaryEntry<'a> {
    pub rank: usize,
    pub group: RankGroup,
    #[serde(flatten)]
    pub department: &'a RankedDepartment,
}

#[derive(Debug, Serialize)]
pub struct SummaryReport<'a> {
    pub prior_label: &'a str,
    pub current_label: &'a str,
    pub min_department_total: i64,
    pub top_bottom_k: usize,
    pub ranked_departments: usize,
    pub departments: Vec<SummaryEntry<'a>>,
}

impl<'a> SummaryReport<'a> {
    pub fn new(display: &'a DisplaySet, config: &'a PipelineConfig) -> Self {
        let departments = display
            .ranks()
            .zip(display.iter())
            .map(|(rank, (group, department))| SummaryEntry {
                rank,
                group,
                department,
            })
            .collect();

        Self {
            prior_label: config.prior_label(),
            current_label: config.current_label(),
            min_department_total: config.min_department_total,
            top_bottom_k: config.top_bottom_k,
            ranked_departments: display.ranked_len,
            departments,
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
