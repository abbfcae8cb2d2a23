//! Plain-text rendering of the analysis results

use std::fmt::Write;

use crate::analysis::{float_column, AnalysisReport};
use crate::data::TOTAL_REVENUE;

/// Render every aggregate as a titled section
///
/// # Arguments
/// * `report` - Aggregates computed by [`crate::analysis::run_analysis`]
/// * `min_purchases` - Threshold the loyal-customer table was built with
/// * `top_n` - Size the high-demand table was limited to
pub fn render_report(
    report: &AnalysisReport,
    min_purchases: usize,
    top_n: usize,
) -> crate::Result<String> {
    let mut out = String::new();

    writeln!(
        out,
        "=== Loyal Customers (at least {} purchases) ===",
        min_purchases
    )?;
    writeln!(out, "{}", report.loyal_customers)?;

    writeln!(out, "\n=== Quarterly Revenue ===")?;
    writeln!(out, "{}", report.quarterly_revenue)?;
    let total: f64 = float_column(&report.quarterly_revenue, TOTAL_REVENUE)?
        .into_iter()
        .flatten()
        .sum();
    writeln!(out, "Total revenue: {:.2}", total)?;

    writeln!(out, "\n=== Top {} Products by Quantity ===", top_n)?;
    writeln!(out, "{}", report.high_demand)?;

    writeln!(out, "\n=== Product Summary ===")?;
    writeln!(out, "{}", report.product_summary)?;

    Ok(out)
}

pub fn print_report(report: &AnalysisReport, min_purchases: usize, top_n: usize) -> crate::Result<()> {
    print!("{}", render_report(report, min_purchases, top_n)?);
    Ok(())
}
