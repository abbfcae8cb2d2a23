//! Typed failures raised by the loading and aggregation stages

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("required column `{0}` is missing from the dataset")]
    MissingColumn(String),
    #[error("could not parse invoice date `{value}` at row {row}")]
    InvalidDate { value: String, row: usize },
    #[error("could not read input file")]
    Io(#[from] std::io::Error),
    #[error("could not parse spreadsheet")]
    Spreadsheet(#[from] calamine::Error),
    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),
}

/// Fail with [`AnalysisError::MissingColumn`] unless `name` is a column of `df`.
pub fn require_column(df: &polars::prelude::DataFrame, name: &str) -> Result<(), AnalysisError> {
    if df.column(name).is_err() {
        return Err(AnalysisError::MissingColumn(name.to_string()));
    }
    Ok(())
}
