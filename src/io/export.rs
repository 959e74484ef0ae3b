//! CSV and JSON renderings of the product set.
//!
//! Both formats share one row type per product line, so the JSON keys are
//! exactly the CSV headers and appear in the same order. Absent values are an
//! empty CSV field and a JSON `null`.

use serde::{Deserialize, Serialize};

use crate::domain::{CanonicalProduct, DepositRate};
use crate::error::AppError;

/// A row type with a fixed column order.
pub trait ExportRow: Serialize {
    /// Column names in export order; must match the serde renames.
    const COLUMNS: &'static [&'static str];

    /// Identifies the row in error messages.
    fn row_id(&self) -> &str;
}

/// One exported row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(rename = "Brand ID")]
    pub brand_id: String,
    #[serde(rename = "Brand Name")]
    pub brand_name: String,
    #[serde(rename = "Product ID")]
    pub product_id: String,
    #[serde(rename = "Product Name")]
    pub product_name: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Description")]
    pub description: String,

    #[serde(rename = "Variable Rate (%)")]
    pub variable_rate: Option<f64>,
    #[serde(rename = "Fixed Rate 1Yr (%)")]
    pub fixed_rate_1y: Option<f64>,
    #[serde(rename = "Fixed Rate 2Yr (%)")]
    pub fixed_rate_2y: Option<f64>,
    #[serde(rename = "Fixed Rate 3Yr (%)")]
    pub fixed_rate_3y: Option<f64>,
    #[serde(rename = "Fixed Rate 4Yr (%)")]
    pub fixed_rate_4y: Option<f64>,
    #[serde(rename = "Fixed Rate 5Yr (%)")]
    pub fixed_rate_5y: Option<f64>,
    #[serde(rename = "Comparison Rate (%)")]
    pub comparison_rate: Option<f64>,

    #[serde(rename = "Loan Purpose")]
    pub loan_purpose: String,
    #[serde(rename = "Repayment Type")]
    pub repayment_type: String,
    #[serde(rename = "Offset Available")]
    pub offset: String,
    #[serde(rename = "Redraw Available")]
    pub redraw: String,
    #[serde(rename = "Split Loan Available")]
    pub split_loan: String,
    #[serde(rename = "Construction Available")]
    pub construction: String,

    #[serde(rename = "Application Fee ($)")]
    pub application_fee: Option<f64>,
    #[serde(rename = "Annual Fee ($)")]
    pub annual_fee: Option<f64>,
    #[serde(rename = "Monthly Fee ($)")]
    pub monthly_fee: Option<f64>,
    #[serde(rename = "Exit Fee ($)")]
    pub exit_fee: Option<f64>,
    #[serde(rename = "Valuation Fee ($)")]
    pub valuation_fee: Option<f64>,
    #[serde(rename = "Settlement Fee ($)")]
    pub settlement_fee: Option<f64>,
    #[serde(rename = "Other Fees")]
    pub other_fees: String,

    #[serde(rename = "Features")]
    pub features: String,
    #[serde(rename = "Eligibility")]
    pub eligibility: String,
    #[serde(rename = "Constraints")]
    pub constraints: String,
    #[serde(rename = "Min Amount ($)")]
    pub min_amount: Option<f64>,
    #[serde(rename = "Max Amount ($)")]
    pub max_amount: Option<f64>,

    #[serde(rename = "Application URL")]
    pub application_url: String,
    #[serde(rename = "Last Updated")]
    pub last_updated: String,

    #[serde(rename = "Monthly Repayment $300K")]
    pub repayment_300k: Option<f64>,
    #[serde(rename = "Monthly Repayment $500K")]
    pub repayment_500k: Option<f64>,
    #[serde(rename = "Monthly Repayment $750K")]
    pub repayment_750k: Option<f64>,
    #[serde(rename = "Monthly Repayment $1M")]
    pub repayment_1m: Option<f64>,

    #[serde(rename = "Data Source")]
    pub data_source: String,
}

impl From<&CanonicalProduct> for ProductRecord {
    fn from(p: &CanonicalProduct) -> Self {
        let [r300, r500, r750, r1m] = p.repayments.amounts.map(|r| r.amount());
        Self {
            brand_id: p.brand_id.clone(),
            brand_name: p.brand_name.clone(),
            product_id: p.product_id.clone(),
            product_name: p.product_name.clone(),
            category: p.category.clone(),
            description: p.description.clone(),
            variable_rate: p.rates.variable,
            fixed_rate_1y: p.rates.fixed[0],
            fixed_rate_2y: p.rates.fixed[1],
            fixed_rate_3y: p.rates.fixed[2],
            fixed_rate_4y: p.rates.fixed[3],
            fixed_rate_5y: p.rates.fixed[4],
            comparison_rate: p.rates.comparison,
            loan_purpose: p.loan_purpose.label().to_string(),
            repayment_type: p.repayment_type.label().to_string(),
            offset: p.flags.offset.yes_no().to_string(),
            redraw: p.flags.redraw.yes_no().to_string(),
            split_loan: p.flags.split_loan.yes_no().to_string(),
            construction: p.flags.construction.yes_no().to_string(),
            application_fee: p.fees.application,
            annual_fee: p.fees.annual,
            monthly_fee: p.fees.monthly,
            exit_fee: p.fees.exit,
            valuation_fee: p.fees.valuation,
            settlement_fee: p.fees.settlement,
            other_fees: p.fees.other.clone(),
            features: p.features.clone(),
            eligibility: p.eligibility.clone(),
            constraints: p.constraints.clone(),
            min_amount: p.min_amount,
            max_amount: p.max_amount,
            application_url: p.application_url.clone(),
            last_updated: p.last_updated.clone(),
            repayment_300k: r300,
            repayment_500k: r500,
            repayment_750k: r750,
            repayment_1m: r1m,
            data_source: p.data_source.clone(),
        }
    }
}

impl ExportRow for ProductRecord {
    const COLUMNS: &'static [&'static str] = &COLUMNS;

    fn row_id(&self) -> &str {
        &self.product_id
    }
}

pub fn to_records(products: &[CanonicalProduct]) -> Vec<ProductRecord> {
    products.iter().map(ProductRecord::from).collect()
}

/// One exported term deposit rate variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositRecord {
    #[serde(rename = "Brand ID")]
    pub brand_id: String,
    #[serde(rename = "Brand Name")]
    pub brand_name: String,
    #[serde(rename = "Product ID")]
    pub product_id: String,
    #[serde(rename = "Product Name")]
    pub product_name: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Rate Type")]
    pub rate_type: String,
    #[serde(rename = "Interest Rate (%)")]
    pub interest_rate: Option<f64>,
    #[serde(rename = "Term")]
    pub term: String,
    #[serde(rename = "Term (Months)")]
    pub term_months: Option<u32>,
    #[serde(rename = "Min Deposit ($)")]
    pub min_deposit: Option<f64>,
    #[serde(rename = "Max Deposit ($)")]
    pub max_deposit: Option<f64>,
    #[serde(rename = "Interest Payment")]
    pub interest_payment: String,
    #[serde(rename = "Promotional")]
    pub promotional: String,
    #[serde(rename = "Application URL")]
    pub application_url: String,
    #[serde(rename = "Last Updated")]
    pub last_updated: String,
    #[serde(rename = "Data Source")]
    pub data_source: String,
}

impl From<&DepositRate> for DepositRecord {
    fn from(r: &DepositRate) -> Self {
        Self {
            brand_id: r.brand_id.clone(),
            brand_name: r.brand_name.clone(),
            product_id: r.product_id.clone(),
            product_name: r.product_name.clone(),
            description: r.description.clone(),
            rate_type: r.rate_type.clone(),
            interest_rate: r.interest_rate,
            term: r.term_label(),
            term_months: r.term_months,
            min_deposit: r.min_deposit,
            max_deposit: r.max_deposit,
            interest_payment: r.interest_payment.clone(),
            promotional: if r.promotional { "Y" } else { "N" }.to_string(),
            application_url: r.application_url.clone(),
            last_updated: r.last_updated.clone(),
            data_source: r.data_source.clone(),
        }
    }
}

impl ExportRow for DepositRecord {
    const COLUMNS: &'static [&'static str] = &DEPOSIT_COLUMNS;

    fn row_id(&self) -> &str {
        &self.product_id
    }
}

pub fn to_deposit_records(rates: &[DepositRate]) -> Vec<DepositRecord> {
    rates.iter().map(DepositRecord::from).collect()
}

/// Header row plus one line per record.
pub fn render_csv<R: ExportRow>(records: &[R]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if records.is_empty() {
        // serde only emits headers alongside the first record.
        writer
            .write_record(R::COLUMNS)
            .map_err(|e| AppError::sink(format!("Failed to write CSV header: {e}")))?;
    }
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| AppError::sink(format!("Failed to write CSV row for '{}': {e}", record.row_id())))?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::sink(format!("Failed to flush CSV output: {e}")))
}

pub fn render_json<R: Serialize>(records: &[R]) -> Result<Vec<u8>, AppError> {
    serde_json::to_vec_pretty(records).map_err(|e| AppError::sink(format!("Failed to render JSON output: {e}")))
}

/// Column names in export order; must match the `ProductRecord` renames.
pub const COLUMNS: [&str; 38] = [
    "Brand ID",
    "Brand Name",
    "Product ID",
    "Product Name",
    "Category",
    "Description",
    "Variable Rate (%)",
    "Fixed Rate 1Yr (%)",
    "Fixed Rate 2Yr (%)",
    "Fixed Rate 3Yr (%)",
    "Fixed Rate 4Yr (%)",
    "Fixed Rate 5Yr (%)",
    "Comparison Rate (%)",
    "Loan Purpose",
    "Repayment Type",
    "Offset Available",
    "Redraw Available",
    "Split Loan Available",
    "Construction Available",
    "Application Fee ($)",
    "Annual Fee ($)",
    "Monthly Fee ($)",
    "Exit Fee ($)",
    "Valuation Fee ($)",
    "Settlement Fee ($)",
    "Other Fees",
    "Features",
    "Eligibility",
    "Constraints",
    "Min Amount ($)",
    "Max Amount ($)",
    "Application URL",
    "Last Updated",
    "Monthly Repayment $300K",
    "Monthly Repayment $500K",
    "Monthly Repayment $750K",
    "Monthly Repayment $1M",
    "Data Source",
];

/// Term deposit column names in export order.
pub const DEPOSIT_COLUMNS: [&str; 16] = [
    "Brand ID",
    "Brand Name",
    "Product ID",
    "Product Name",
    "Description",
    "Rate Type",
    "Interest Rate (%)",
    "Term",
    "Term (Months)",
    "Min Deposit ($)",
    "Max Deposit ($)",
    "Interest Payment",
    "Promotional",
    "Application URL",
    "Last Updated",
    "Data Source",
];
