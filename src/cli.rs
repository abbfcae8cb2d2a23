//! Command-line interface definitions and argument parsing

use clap::Parser;

/// Print customer purchase-behaviour aggregates for a sales export
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the workbook or delimited-text export
    #[arg(short, long, default_value = "Customer_Behavior.xlsx")]
    pub input: String,

    /// Minimum number of purchases for a customer to count as loyal
    #[arg(short, long, default_value = "5")]
    pub min_purchases: usize,

    /// Number of best-selling items to list
    #[arg(short = 'n', long, default_value = "5")]
    pub top_n: usize,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Reject parameter combinations that cannot produce a report
    pub fn validate(&self) -> crate::Result<()> {
        if self.top_n == 0 {
            anyhow::bail!("--top-n must be at least 1");
        }
        Ok(())
    }
}
