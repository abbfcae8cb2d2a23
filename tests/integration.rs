//! Integration tests for PurchaseFlow

use purchaseflow::analysis::{float_column, string_column, PURCHASES, QUARTER};
use purchaseflow::data::{
    parse_csv, with_total_revenue, CUSTOMER_ID, QUANTITY, STOCK_CODE, TOTAL_REVENUE, UNIT_PRICE,
};
use purchaseflow::{
    clean_data, high_demand_products, load_dataset, loyal_customers, quarterly_revenue,
    run_analysis, AnalysisError,
};
use polars::prelude::DataType;
use std::collections::HashMap;
use std::io::Write;
use tempfile::NamedTempFile;

const HEADER: &str = "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country";

/// Create a test CSV file with sample data
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();

    // Customer 17850 - five purchases
    writeln!(file, "536365,85123A,WHITE HANGING HEART T-LIGHT HOLDER,6,2010-12-01 08:26:00,2.55,17850,United Kingdom").unwrap();
    writeln!(file, "536365,71053,WHITE METAL LANTERN,6,2010-12-01 08:26:00,3.39,17850,United Kingdom").unwrap();
    writeln!(file, "536366,22633,HAND WARMER UNION JACK,6,2011-01-10 08:28:00,1.85,17850,United Kingdom").unwrap();
    writeln!(file, "536370,85123A,WHITE HANGING HEART T-LIGHT HOLDER,12,2011-02-01 09:00:00,2.55,17850,United Kingdom").unwrap();
    writeln!(file, "536371,22752,SET 7 BABUSHKA NESTING BOXES,2,2011-05-05 10:15:00,7.65,17850,United Kingdom").unwrap();

    // Customer 13047 - four purchases, one of them a return
    writeln!(file, "536367,84406B,CREAM CUPID HEARTS COAT HANGER,8,2010-12-01 08:34:00,2.75,13047,United Kingdom").unwrap();
    writeln!(file, "536372,84406B,CREAM CUPID HEARTS COAT HANGER,4,2011-03-01 08:34:00,2.75,13047,United Kingdom").unwrap();
    writeln!(file, "536373,21730,GLASS STAR FROSTED T-LIGHT HOLDER,12,2011-07-05 10:15:00,1.25,13047,United Kingdom").unwrap();
    writeln!(file, "C536374,21730,GLASS STAR FROSTED T-LIGHT HOLDER,-12,2011-07-06 10:15:00,1.25,13047,United Kingdom").unwrap();

    // Anonymous purchases
    writeln!(file, "536375,22457,NATURAL SLATE HEART CHALKBOARD,40,2011-08-15 09:00:00,3.25,,United Kingdom").unwrap();
    writeln!(file, "536376,22457,NATURAL SLATE HEART CHALKBOARD,40,2011-08-15 09:00:00,3.25,,United Kingdom").unwrap();

    file
}

#[test]
fn test_end_to_end_pipeline() {
    let test_file = create_test_csv();

    let raw = load_dataset(test_file.path()).unwrap();
    assert_eq!(raw.height(), 11);

    let cleaned = clean_data(raw).unwrap();
    assert_eq!(cleaned.height(), 8);

    let report = run_analysis(&cleaned, 5, 5).unwrap();

    let loyal_ids = float_column(&report.loyal_customers, CUSTOMER_ID).unwrap();
    assert_eq!(loyal_ids, vec![Some(17850.0)]);

    assert_eq!(report.quarterly_revenue.height(), 4);
    assert_eq!(report.high_demand.height(), 5);
    assert_eq!(report.product_summary.height(), 6);
}

#[test]
fn test_reference_scenario() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "CustomerID,Quantity,UnitPrice,InvoiceDate,StockCode").unwrap();
    writeln!(file, "1,2,5,2023-01-10,A").unwrap();
    writeln!(file, ",1,1,2023-01-11,B").unwrap();
    writeln!(file, "1,-3,2,2023-02-01,A").unwrap();

    let cleaned = clean_data(load_dataset(file.path()).unwrap()).unwrap();
    assert_eq!(cleaned.height(), 1);
    assert_eq!(
        float_column(&cleaned, TOTAL_REVENUE).unwrap(),
        vec![Some(10.0)]
    );

    let quarterly = quarterly_revenue(&cleaned).unwrap();
    assert_eq!(
        string_column(&quarterly, QUARTER).unwrap(),
        vec![Some("2023Q1".to_string())]
    );
    assert_eq!(
        float_column(&quarterly, TOTAL_REVENUE).unwrap(),
        vec![Some(10.0)]
    );
}

/// Workbook with a date-formatted `InvoiceDate`, a blank `CustomerID` and a return
fn fixture_workbook() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/customer_behavior.xlsx")
}

#[test]
fn test_workbook_pipeline() {
    let raw = load_dataset(fixture_workbook()).unwrap();
    assert_eq!(raw.height(), 4);
    assert_eq!(raw.column(CUSTOMER_ID).unwrap().dtype(), &DataType::Int64);
    assert_eq!(raw.column(CUSTOMER_ID).unwrap().null_count(), 1);
    assert_eq!(raw.column(QUANTITY).unwrap().dtype(), &DataType::Int64);
    assert_eq!(
        string_column(&raw, "InvoiceDate").unwrap()[0].as_deref(),
        Some("2023-01-10 00:00:00")
    );

    let cleaned = clean_data(raw).unwrap();
    assert_eq!(cleaned.height(), 2);
    assert_eq!(
        float_column(&cleaned, TOTAL_REVENUE).unwrap(),
        vec![Some(10.0), Some(6.0)]
    );

    let quarterly = quarterly_revenue(&cleaned).unwrap();
    assert_eq!(
        string_column(&quarterly, QUARTER).unwrap(),
        vec![Some("2023Q1".to_string()), Some("2023Q2".to_string())]
    );
    assert_eq!(
        float_column(&quarterly, TOTAL_REVENUE).unwrap(),
        vec![Some(10.0), Some(6.0)]
    );
}

#[test]
fn test_cleaned_rows_are_valid() {
    let test_file = create_test_csv();
    let cleaned = clean_data(load_dataset(test_file.path()).unwrap()).unwrap();

    assert_eq!(cleaned.column(CUSTOMER_ID).unwrap().null_count(), 0);
    for name in purchaseflow::data::numeric_columns(&cleaned) {
        let values = float_column(&cleaned, name.as_str()).unwrap();
        assert!(values.iter().all(|v| v.map_or(false, |v| v >= 0.0)), "{}", name);
    }
}

#[test]
fn test_total_revenue_matches_inputs() {
    let test_file = create_test_csv();
    let raw = load_dataset(test_file.path()).unwrap();

    let quantity = float_column(&raw, QUANTITY).unwrap();
    let price = float_column(&raw, UNIT_PRICE).unwrap();
    let revenue = float_column(&raw, TOTAL_REVENUE).unwrap();

    for ((q, p), r) in quantity.iter().zip(&price).zip(&revenue) {
        assert_eq!(r.unwrap(), q.unwrap() * p.unwrap());
    }
}

#[test]
fn test_loyal_customers_respect_threshold() {
    let test_file = create_test_csv();
    let cleaned = clean_data(load_dataset(test_file.path()).unwrap()).unwrap();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for id in string_column(&cleaned, CUSTOMER_ID).unwrap().into_iter().flatten() {
        *counts.entry(id).or_default() += 1;
    }

    for threshold in 1..=6 {
        let loyal = loyal_customers(&cleaned, threshold).unwrap();
        let ids: Vec<String> = string_column(&loyal, CUSTOMER_ID)
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        let purchases = float_column(&loyal, PURCHASES).unwrap();

        for (id, purchases) in ids.iter().zip(purchases) {
            assert_eq!(purchases.unwrap() as usize, counts[id]);
            assert!(counts[id] >= threshold);
        }
        let expected = counts.values().filter(|&&c| c >= threshold).count();
        assert_eq!(ids.len(), expected);
    }
}

#[test]
fn test_quarterly_revenue_conserves_total() {
    let test_file = create_test_csv();
    let cleaned = clean_data(load_dataset(test_file.path()).unwrap()).unwrap();

    let quarterly = quarterly_revenue(&cleaned).unwrap();
    let by_quarter: f64 = float_column(&quarterly, TOTAL_REVENUE)
        .unwrap()
        .into_iter()
        .flatten()
        .sum();
    let overall: f64 = float_column(&cleaned, TOTAL_REVENUE)
        .unwrap()
        .into_iter()
        .flatten()
        .sum();

    assert!((by_quarter - overall).abs() < 1e-9);
}

#[test]
fn test_high_demand_products_are_largest() {
    let test_file = create_test_csv();
    let cleaned = clean_data(load_dataset(test_file.path()).unwrap()).unwrap();

    let all = high_demand_products(&cleaned, usize::MAX).unwrap();
    let all_totals: Vec<f64> = float_column(&all, QUANTITY)
        .unwrap()
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(all.height(), 6);

    for top_n in 1..=8 {
        let top = high_demand_products(&cleaned, top_n).unwrap();
        let totals: Vec<f64> = float_column(&top, QUANTITY)
            .unwrap()
            .into_iter()
            .flatten()
            .collect();

        assert_eq!(totals.len(), top_n.min(6));
        assert!(totals.windows(2).all(|w| w[0] >= w[1]));
        let smallest = totals.last().copied().unwrap();
        assert!(all_totals[totals.len()..].iter().all(|&t| t <= smallest));
    }

    let top = high_demand_products(&cleaned, 1).unwrap();
    assert_eq!(
        string_column(&top, STOCK_CODE).unwrap(),
        vec![Some("85123A".to_string())]
    );
}

#[test]
fn test_text_fallback_matches_direct_parse() {
    let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    writeln!(file, "536365,85123A,WHITE HANGING HEART T-LIGHT HOLDER,6,2010-12-01 08:26:00,2.55,17850,United Kingdom").unwrap();
    writeln!(file, "536367,84406B,CREAM CUPID HEARTS COAT HANGER,8,2010-12-01 08:34:00,2.75,,United Kingdom").unwrap();
    file.flush().unwrap();

    let loaded = load_dataset(file.path()).unwrap();

    let bytes = std::fs::read(file.path()).unwrap();
    let direct = with_total_revenue(parse_csv(bytes).unwrap()).unwrap();

    assert!(loaded.equals_missing(&direct));
}

#[test]
fn test_single_byte_encoding_is_decoded() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"CustomerID,StockCode,Description,Quantity,UnitPrice,InvoiceDate\n")
        .unwrap();
    file.write_all(b"12680,22727,ALARM CLOCK CAF\xc9 CR\xc8ME,4,3.75,2011-12-09 12:50:00\n")
        .unwrap();
    file.write_all(b"12680,22726,R\xc9VEIL VINTAGE ROUGE,4,3.75,2011-12-09 12:50:00\n")
        .unwrap();
    file.flush().unwrap();

    let df = load_dataset(file.path()).unwrap();
    assert_eq!(df.height(), 2);

    let descriptions = string_column(&df, "Description").unwrap();
    assert_eq!(descriptions[0].as_deref(), Some("ALARM CLOCK CAFÉ CRÈME"));
    assert_eq!(descriptions[1].as_deref(), Some("RÉVEIL VINTAGE ROUGE"));
}

#[test]
fn test_error_handling() {
    // Missing file
    assert!(load_dataset("does/not/exist/Customer_Behavior.xlsx").is_err());

    // Missing CustomerID column
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "StockCode,Quantity,UnitPrice").unwrap();
    writeln!(file, "85123A,6,2.55").unwrap();

    let raw = load_dataset(file.path()).unwrap();
    let err = clean_data(raw).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AnalysisError>(),
        Some(AnalysisError::MissingColumn(_))
    ));
}
