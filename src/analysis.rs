//! Purchase-behaviour aggregates over a cleaned transaction table

use polars::prelude::*;
use tracing::debug;

use crate::data::{CUSTOMER_ID, INVOICE_DATE, QUANTITY, STOCK_CODE, TOTAL_REVENUE, UNIT_PRICE};
use crate::error::{require_column, AnalysisError};

pub const PURCHASES: &str = "purchases";
pub const QUARTER: &str = "Quarter";
pub const INVOICE_TIMESTAMP: &str = "InvoiceTimestamp";
pub const AVG_QUANTITY: &str = "avg_quantity";
pub const AVG_UNIT_PRICE: &str = "avg_unit_price";

const QUARTER_START: &str = "quarter_start";

const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// The four aggregates printed for one dataset
#[derive(Debug)]
pub struct AnalysisReport {
    /// `CustomerID` -> `purchases`, only customers at or above the threshold
    pub loyal_customers: DataFrame,
    /// `Quarter` -> summed `Total_Revenue`, ascending by quarter
    pub quarterly_revenue: DataFrame,
    /// `StockCode` -> summed `Quantity`, largest first
    pub high_demand: DataFrame,
    /// `StockCode` -> `avg_quantity`, `avg_unit_price`
    pub product_summary: DataFrame,
}

/// Compute every aggregate over a cleaned table
pub fn run_analysis(
    df: &DataFrame,
    min_purchases: usize,
    top_n: usize,
) -> crate::Result<AnalysisReport> {
    Ok(AnalysisReport {
        loyal_customers: loyal_customers(df, min_purchases)?,
        quarterly_revenue: quarterly_revenue(df)?,
        high_demand: high_demand_products(df, top_n)?,
        product_summary: product_summary(df)?,
    })
}

/// Customers with at least `min_purchases` rows, ordered by `CustomerID`
pub fn loyal_customers(df: &DataFrame, min_purchases: usize) -> crate::Result<DataFrame> {
    require_column(df, CUSTOMER_ID)?;

    let loyal = df
        .clone()
        .lazy()
        .filter(col(CUSTOMER_ID).is_not_null())
        .group_by([col(CUSTOMER_ID)])
        .agg([len().alias(PURCHASES)])
        .filter(col(PURCHASES).gt_eq(lit(min_purchases as u64)))
        .sort([CUSTOMER_ID], SortMultipleOptions::default())
        .collect()?;

    debug!("{} loyal customers", loyal.height());
    Ok(loyal)
}

/// Revenue summed per calendar quarter, one row per observed quarter
///
/// Rows with a null `InvoiceDate` are skipped. Any other value that does not
/// parse as a date fails with [`AnalysisError::InvalidDate`]. The input table is
/// left untouched. Quarters are ordered chronologically.
pub fn quarterly_revenue(df: &DataFrame) -> crate::Result<DataFrame> {
    require_column(df, TOTAL_REVENUE)?;

    let revenue = with_quarters(df)?
        .lazy()
        .filter(col(INVOICE_TIMESTAMP).is_not_null())
        .group_by([col(QUARTER)])
        .agg([
            col(TOTAL_REVENUE).sum(),
            col(INVOICE_TIMESTAMP).min().alias(QUARTER_START),
        ])
        .sort([QUARTER_START], SortMultipleOptions::default())
        .select([col(QUARTER), col(TOTAL_REVENUE)])
        .collect()?;

    Ok(revenue)
}

/// Copy of `df` with the parsed `InvoiceTimestamp` and its `Quarter` label
/// (e.g. `2011Q4`)
pub fn with_quarters(df: &DataFrame) -> crate::Result<DataFrame> {
    require_column(df, INVOICE_DATE)?;

    let parsed = df
        .clone()
        .lazy()
        .with_column(invoice_timestamp().alias(INVOICE_TIMESTAMP))
        .collect()?;
    ensure_dates_parsed(&parsed)?;

    let timestamp = col(INVOICE_TIMESTAMP);
    let labelled = parsed
        .lazy()
        .with_column(
            concat_str(
                [
                    timestamp.clone().dt().year().cast(DataType::String),
                    lit("Q"),
                    timestamp.dt().quarter().cast(DataType::String),
                ],
                "",
                false,
            )
            .alias(QUARTER),
        )
        .collect()?;

    Ok(labelled)
}

/// `InvoiceDate` as a datetime, trying each accepted layout in turn
fn invoice_timestamp() -> Expr {
    let text = col(INVOICE_DATE).cast(DataType::String);

    let datetimes = DATETIME_FORMATS.iter().map(|format| {
        text.clone().str().to_datetime(
            Some(TimeUnit::Microseconds),
            None,
            lenient_format(format),
            lit("raise"),
        )
    });
    let dates = DATE_FORMATS.iter().map(|format| {
        text.clone()
            .str()
            .to_date(lenient_format(format))
            .cast(DataType::Datetime(TimeUnit::Microseconds, None))
    });

    coalesce(&datetimes.chain(dates).collect::<Vec<_>>())
}

/// Exact-match format that yields null instead of failing
fn lenient_format(format: &str) -> StrptimeOptions {
    StrptimeOptions {
        format: Some(format.into()),
        strict: false,
        exact: true,
        ..Default::default()
    }
}

/// Fail on the first non-null `InvoiceDate` that no layout could parse
fn ensure_dates_parsed(parsed: &DataFrame) -> crate::Result<()> {
    let raw = string_column(parsed, INVOICE_DATE)?;
    let stamps = parsed.column(INVOICE_TIMESTAMP)?.cast(&DataType::Int64)?;

    for (row, (value, stamp)) in raw.into_iter().zip(stamps.i64()?).enumerate() {
        if let (Some(value), None) = (value, stamp) {
            return Err(AnalysisError::InvalidDate { value, row }.into());
        }
    }
    Ok(())
}

/// The `top_n` items by total quantity, largest first
///
/// Equal totals are ordered by `StockCode`.
pub fn high_demand_products(df: &DataFrame, top_n: usize) -> crate::Result<DataFrame> {
    require_column(df, STOCK_CODE)?;
    require_column(df, QUANTITY)?;

    let top = df
        .clone()
        .lazy()
        .filter(col(STOCK_CODE).is_not_null())
        .group_by([col(STOCK_CODE)])
        .agg([col(QUANTITY).sum()])
        .sort(
            [QUANTITY, STOCK_CODE],
            SortMultipleOptions::default()
                .with_order_descending_multi([true, false])
                .with_nulls_last(true),
        )
        .limit(IdxSize::try_from(top_n).unwrap_or(IdxSize::MAX))
        .collect()?;

    Ok(top)
}

/// Mean quantity and mean unit price per item, ordered by `StockCode`
pub fn product_summary(df: &DataFrame) -> crate::Result<DataFrame> {
    require_column(df, STOCK_CODE)?;
    require_column(df, QUANTITY)?;
    require_column(df, UNIT_PRICE)?;

    let summary = df
        .clone()
        .lazy()
        .filter(col(STOCK_CODE).is_not_null())
        .group_by([col(STOCK_CODE)])
        .agg([
            col(QUANTITY).mean().alias(AVG_QUANTITY),
            col(UNIT_PRICE).mean().alias(AVG_UNIT_PRICE),
        ])
        .sort([STOCK_CODE], SortMultipleOptions::default())
        .collect()?;

    Ok(summary)
}

/// Read a column as `f64` values, casting integers
pub fn float_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<f64>>> {
    let values = df
        .column(name)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .collect();
    Ok(values)
}

/// Read a column as text values, casting non-string types
pub fn string_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<String>>> {
    let values = df
        .column(name)?
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect();
    Ok(values)
}
