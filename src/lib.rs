//! PurchaseFlow: customer purchase-behaviour aggregates for sales exports
//!
//! This library loads a transaction table from a spreadsheet or delimited-text
//! file, cleans it, and computes loyalty, quarterly revenue, demand and
//! per-product summaries using Polars.

pub mod analysis;
pub mod answers;
pub mod cli;
pub mod data;
pub mod encoding;
pub mod error;
pub mod report;

// Re-export public items for easier access
pub use analysis::{
    high_demand_products, loyal_customers, product_summary, quarterly_revenue, run_analysis,
    AnalysisReport,
};
pub use answers::conceptual_answers;
pub use cli::Args;
pub use data::{clean_data, load_dataset};
pub use encoding::{detect_encoding, EncodingGuess};
pub use error::AnalysisError;
pub use report::print_report;

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
