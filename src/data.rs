//! Dataset loading and cleaning using Calamine and Polars

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use anyhow::Context;
use calamine::{open_workbook_auto, Data, DataType as _, Range, Reader};
use encoding_rs::Encoding;
use polars::prelude::*;
use tracing::{debug, info};

use crate::encoding::detect_encoding;
use crate::error::{require_column, AnalysisError};

pub const CUSTOMER_ID: &str = "CustomerID";
pub const INVOICE_DATE: &str = "InvoiceDate";
pub const STOCK_CODE: &str = "StockCode";
pub const QUANTITY: &str = "Quantity";
pub const UNIT_PRICE: &str = "UnitPrice";
pub const TOTAL_REVENUE: &str = "Total_Revenue";

/// Layout used for workbook date cells
const DATE_CELL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Load a transaction export and derive `Total_Revenue`
///
/// The file is parsed as a spreadsheet first. When that fails because the file
/// is not a workbook, it is decoded with the detected text encoding and parsed
/// as CSV instead. I/O failures are never retried.
///
/// # Arguments
/// * `path` - Path to the workbook or delimited-text file
///
/// # Returns
/// * Raw table, plus `Total_Revenue` when `Quantity` and `UnitPrice` exist
pub fn load_dataset(path: impl AsRef<Path>) -> crate::Result<DataFrame> {
    let path = path.as_ref();
    info!("Trying to import data from {}", path.display());

    let guess = detect_encoding(path)?;

    let df = match read_spreadsheet(path) {
        Ok(df) => {
            info!("Read file as Excel.");
            df
        }
        Err(err) if is_format_error(&err) => {
            debug!("Spreadsheet parse failed: {:?}", err);
            let df = read_delimited(path, guess.encoding)?;
            info!("Read file as CSV.");
            df
        }
        Err(err) => {
            return Err(anyhow::Error::new(err)
                .context(format!("Failed to load {}", path.display())))
        }
    };

    info!("Columns in the DataFrame: {:?}", df.get_column_names());

    with_total_revenue(df)
}

/// Append `Total_Revenue = Quantity * UnitPrice` when both columns exist
pub fn with_total_revenue(df: DataFrame) -> crate::Result<DataFrame> {
    if df.column(QUANTITY).is_err() || df.column(UNIT_PRICE).is_err() {
        return Ok(df);
    }

    let df = df
        .lazy()
        .with_column((col(QUANTITY) * col(UNIT_PRICE)).alias(TOTAL_REVENUE))
        .collect()?;
    Ok(df)
}

/// Drop rows without a customer and rows with a negative (or missing) value
/// in any numeric column
///
/// Every integer or float column takes part, identifiers included. A column
/// with no values at all loads as text on both parse paths, so it never
/// filters rows here; typed as an all-null numeric column it would drop every row.
pub fn clean_data(df: DataFrame) -> crate::Result<DataFrame> {
    require_column(&df, CUSTOMER_ID)?;

    let predicate = numeric_columns(&df)
        .into_iter()
        .fold(col(CUSTOMER_ID).is_not_null(), |acc, name| {
            acc.and(col(name).gt_eq(lit(0)))
        });

    let before = df.height();
    let cleaned = df.lazy().filter(predicate).collect()?;
    debug!(
        "Cleaning kept {} of {} rows",
        cleaned.height(),
        before
    );

    Ok(cleaned)
}

/// Names of the integer and floating-point columns of `df`
pub fn numeric_columns(df: &DataFrame) -> Vec<PlSmallStr> {
    df.get_columns()
        .iter()
        .filter(|column| column.dtype().is_integer() || column.dtype().is_float())
        .map(|column| column.name().clone())
        .collect()
}

/// Parse UTF-8 delimited text with a header row
pub fn parse_csv(utf8: Vec<u8>) -> crate::Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(utf8))
        .finish()
        .context("Failed to parse delimited text")?;
    Ok(df)
}

fn read_delimited(path: &Path, encoding: &'static Encoding) -> crate::Result<DataFrame> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let (text, used, _) = encoding.decode(&bytes);
    debug!("Decoded {} as {}", path.display(), used.name());

    parse_csv(text.into_owned().into_bytes())
}

/// Whether a spreadsheet failure means "not a workbook" rather than an I/O problem
fn is_format_error(err: &AnalysisError) -> bool {
    match err {
        AnalysisError::Spreadsheet(calamine::Error::Io(_))
        | AnalysisError::Spreadsheet(calamine::Error::Xlsx(calamine::XlsxError::Io(_))) => false,
        AnalysisError::Spreadsheet(_) => true,
        _ => false,
    }
}

fn read_spreadsheet(path: &Path) -> Result<DataFrame, AnalysisError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(calamine::Error::Msg("workbook has no worksheets"))??;

    range_to_frame(&range)
}

/// Convert the first sheet into a frame, using its first row as the header
fn range_to_frame(range: &Range<Data>) -> Result<DataFrame, AnalysisError> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(DataFrame::empty());
    };
    let body: Vec<&[Data]> = rows.collect();

    let columns = header_names(header)
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let cells: Vec<Option<&Data>> = body.iter().map(|row| row.get(idx)).collect();
            cells_to_column(name, &cells)
        })
        .collect();

    Ok(DataFrame::new(columns)?)
}

fn header_names(header: &[Data]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    header
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let base = match cell {
                Data::Empty => format!("Unnamed: {}", idx),
                Data::String(s) => s.trim().to_string(),
                other => other.to_string(),
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            name
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Int,
    Float,
    Bool,
    Text,
}

fn cell_kind(cell: &Data) -> Option<CellKind> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::Int(_) => Some(CellKind::Int),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some(CellKind::Int),
        Data::Float(_) => Some(CellKind::Float),
        Data::Bool(_) => Some(CellKind::Bool),
        _ => Some(CellKind::Text),
    }
}

/// Narrowest type holding every non-empty cell; all-empty columns are text
fn column_kind(cells: &[Option<&Data>]) -> CellKind {
    let mut kind = None;
    for cell_kind in cells.iter().flatten().filter_map(|cell| cell_kind(cell)) {
        kind = Some(match (kind, cell_kind) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(CellKind::Int), CellKind::Float) | (Some(CellKind::Float), CellKind::Int) => {
                CellKind::Float
            }
            _ => return CellKind::Text,
        });
    }
    kind.unwrap_or(CellKind::Text)
}

fn cells_to_column(name: String, cells: &[Option<&Data>]) -> Column {
    let name = PlSmallStr::from(name);
    match column_kind(cells) {
        CellKind::Int => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|cell| match cell {
                    Some(Data::Int(i)) => Some(*i),
                    Some(Data::Float(f)) => Some(*f as i64),
                    _ => None,
                })
                .collect();
            Column::new(name, values)
        }
        CellKind::Float => {
            let values: Vec<Option<f64>> = cells
                .iter()
                .map(|cell| match cell {
                    Some(Data::Int(i)) => Some(*i as f64),
                    Some(Data::Float(f)) => Some(*f),
                    _ => None,
                })
                .collect();
            Column::new(name, values)
        }
        CellKind::Bool => {
            let values: Vec<Option<bool>> = cells
                .iter()
                .map(|cell| match cell {
                    Some(Data::Bool(b)) => Some(*b),
                    _ => None,
                })
                .collect();
            Column::new(name, values)
        }
        CellKind::Text => {
            let values: Vec<Option<String>> =
                cells.iter().map(|cell| cell.and_then(cell_text)).collect();
            Column::new(name, values)
        }
    }
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::DateTime(_) | Data::DateTimeIso(_) => Some(
            cell.as_datetime()
                .map(|dt: chrono::NaiveDateTime| dt.format(DATE_CELL_FORMAT).to_string())
                .unwrap_or_else(|| cell.to_string()),
        ),
        other => Some(other.to_string()),
    }
}
