//! Term Export Loader Module
//! Decodes a registrar export (workbook or CSV), normalizes its header and
//! projects it to the course/headcount/department columns using Polars.

use super::columns::{COURSE_DEPARTMENT, COURSE_ID, COURSE_NAME, REQUIRED, U_GRAD};
use calamine::{open_workbook_auto, Data, Reader};
use polars::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to decode export: {0}")]
    Polars(#[from] PolarsError),
    #[error("Failed to open workbook {path}: {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },
    #[error("Workbook {0} has no worksheets")]
    NoWorksheet(PathBuf),
    #[error("Header row {row} not found, export has {rows} rows")]
    MissingHeader { row: usize, rows: usize },
    #[error("Missing required columns {missing:?} (found {found:?})")]
    MissingColumns {
        missing: Vec<String>,
        found: Vec<String>,
    },
}

/// On-disk encoding of a term export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    /// Any spreadsheet calamine understands (xlsx, xlsm, xls, ods).
    Excel,
}

impl TableFormat {
    /// Detect the format from a file extension. Registrar exports are
    /// workbooks, so anything that is not CSV is read as one.
    pub fn from_extension(extension: Option<&str>) -> Self {
        match extension {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => TableFormat::Csv,
            _ => TableFormat::Excel,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::from_extension(path.extension().and_then(|ext| ext.to_str()))
    }
}

/// Loads one term export into a `(course_id, u_grad, course_department)` frame.
pub struct DataLoader {
    header_skip: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new(3)
    }
}

impl DataLoader {
    /// `header_skip` is the number of preamble rows above the header row.
    pub fn new(header_skip: usize) -> Self {
        Self { header_skip }
    }

    /// Load, validate and project a term export.
    pub fn load(&self, path: &Path) -> Result<DataFrame, LoaderError> {
        let format = TableFormat::from_path(path);
        let mut df = match format {
            TableFormat::Csv => self.read_csv(path)?,
            TableFormat::Excel => self.read_workbook(path)?,
        };
        debug!(path = %path.display(), ?format, rows = df.height(), "decoded export");

        let normalized = unique_names(
            df.get_column_names()
                .iter()
                .map(|name| normalize_column_name(name.as_str())),
        );
        df.set_column_names(normalized)?;
        Self::check_required(&df)?;

        let raw_rows = df.height();
        let projected = Self::project(df)?;
        info!(
            path = %path.display(),
            raw_rows,
            courses = projected.height(),
            "loaded term export"
        );
        Ok(projected)
    }

    fn read_csv(&self, path: &Path) -> Result<DataFrame, LoaderError> {
        let df = LazyCsvReader::new(path)
            .with_skip_rows(self.header_skip)
            .with_has_header(true)
            .with_infer_schema_length(Some(10000))
            .with_ignore_errors(true)
            .finish()?
            .collect()?;
        Ok(df)
    }

    /// Read the first worksheet as string columns. Calamine trims leading
    /// empty rows from the used range, so the preamble skip is measured from
    /// the sheet's first physical row.
    fn read_workbook(&self, path: &Path) -> Result<DataFrame, LoaderError> {
        let workbook_error = |source: calamine::Error| LoaderError::Workbook {
            path: path.to_path_buf(),
            source,
        };
        let mut workbook = open_workbook_auto(path).map_err(workbook_error)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| LoaderError::NoWorksheet(path.to_path_buf()))?
            .map_err(workbook_error)?;

        let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
        let header_index = self.header_skip.saturating_sub(first_row);
        let rows: Vec<&[Data]> = range.rows().collect();

        let header = rows.get(header_index).ok_or(LoaderError::MissingHeader {
            row: self.header_skip,
            rows: first_row + rows.len(),
        })?;
        let names = unique_names(
            header
                .iter()
                .enumerate()
                .map(|(i, cell)| cell_text(cell).unwrap_or_else(|| format!("column_{i}"))),
        );

        let body = &rows[header_index + 1..];
        let mut values: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(body.len()); names.len()];
        for row in body {
            for (i, column) in values.iter_mut().enumerate() {
                column.push(row.get(i).and_then(cell_text));
            }
        }

        let columns = names
            .into_iter()
            .zip(values)
            .map(|(name, vals)| Column::new(name.into(), vals))
            .collect();
        Ok(DataFrame::new(columns)?)
    }

    fn check_required(df: &DataFrame) -> Result<(), LoaderError> {
        let found: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let missing: Vec<String> = REQUIRED
            .iter()
            .filter(|required| !found.iter().any(|name| name == *required))
            .map(|required| required.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(LoaderError::MissingColumns { missing, found })
        }
    }

    /// Drop placeholder rows without a course name (blank or whitespace)
    /// and keep the three columns the join needs. Missing headcounts count as zero.
    fn project(df: DataFrame) -> Result<DataFrame, LoaderError> {
        let projected = df
            .lazy()
            .with_column(
                col(COURSE_NAME)
                    .cast(DataType::String)
                    .str()
                    .strip_chars(lit(NULL)),
            )
            .filter(
                col(COURSE_NAME)
                    .is_not_null()
                    .and(col(COURSE_NAME).neq(lit(""))),
            )
            .select([
                col(COURSE_ID).cast(DataType::String),
                col(U_GRAD)
                    .cast(DataType::Float64)
                    .cast(DataType::Int64)
                    .fill_null(lit(0i64)),
                col(COURSE_DEPARTMENT).cast(DataType::String),
            ])
            .collect()?;
        Ok(projected)
    }
}

/// Lower-case a header and join its alphanumeric runs with `_`,
/// so `Course ID`, `COURSE_ID` and ` course  id ` all read `course_id`.
pub fn normalize_column_name(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Suffix repeated (or blank) names so every column is addressable.
fn unique_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let name = if name.is_empty() {
                format!("column_{i}")
            } else {
                name
            };
            let count = seen.entry(name.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                name
            } else {
                format!("{name}_{count}")
            }
        })
        .collect()
}

/// Text form of a worksheet cell; integral floats lose their `.0`.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(format!("{}", *f as i64)),
        other => Some(other.to_string()),
    }
}
