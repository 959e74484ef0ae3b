//! Term deposit records and the product line selector.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which product category a run collects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ProductLine {
    #[default]
    Mortgages,
    TermDeposits,
}

impl ProductLine {
    /// CDR `productCategory` value.
    pub fn category(self) -> &'static str {
        match self {
            ProductLine::Mortgages => "RESIDENTIAL_MORTGAGES",
            ProductLine::TermDeposits => "TERM_DEPOSITS",
        }
    }

    /// Prefix of the product output files.
    pub fn file_stem(self) -> &'static str {
        match self {
            ProductLine::Mortgages => "mortgages",
            ProductLine::TermDeposits => "term_deposits",
        }
    }
}

/// One advertised rate variant of a term deposit product: a (rate type, term,
/// deposit tier) combination. Products without rate entries yield a single
/// variant with no rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DepositRate {
    pub brand_id: String,
    pub brand_name: String,
    pub product_id: String,
    pub product_name: String,
    pub description: String,
    /// `FIXED`, `BONUS`, `INTRODUCTORY`...; empty when the source gave none.
    pub rate_type: String,
    /// Annual rate in percent.
    pub interest_rate: Option<f64>,
    pub term_months: Option<u32>,
    pub min_deposit: Option<f64>,
    pub max_deposit: Option<f64>,
    pub interest_payment: String,
    pub promotional: bool,
    pub application_url: String,
    pub last_updated: String,
    pub data_source: String,
}

impl DepositRate {
    pub fn brand_label(&self) -> String {
        if self.brand_id.trim().is_empty() {
            self.brand_name.trim().to_lowercase()
        } else {
            self.brand_id.trim().to_string()
        }
    }

    /// Identity used for cross-source deduplication: brand, product and the
    /// variant (rate type, term, lower tier bound).
    pub fn dedup_key(&self) -> (String, String, String) {
        let variant = format!(
            "{}|{}|{}",
            self.rate_type,
            self.term_months.map(|m| m.to_string()).unwrap_or_default(),
            self.min_deposit.map(|v| v.to_string()).unwrap_or_default()
        );
        (self.brand_label(), self.product_id.trim().to_string(), variant)
    }

    /// `3 months`, `1 year`, `1y 6m`; `Not Specified` without a term.
    pub fn term_label(&self) -> String {
        match self.term_months {
            None => "Not Specified".to_string(),
            Some(0) => "Under 1 month".to_string(),
            Some(1) => "1 month".to_string(),
            Some(m) if m < 12 => format!("{m} months"),
            Some(12) => "1 year".to_string(),
            Some(m) if m % 12 == 0 => format!("{} years", m / 12),
            Some(m) => format!("{}y {}m", m / 12, m % 12),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(term_months: Option<u32>) -> DepositRate {
        DepositRate {
            brand_id: "bank".to_string(),
            brand_name: "Bank".to_string(),
            product_id: "td-1".to_string(),
            product_name: "Term Deposit".to_string(),
            description: String::new(),
            rate_type: "FIXED".to_string(),
            interest_rate: Some(4.5),
            term_months,
            min_deposit: Some(5000.0),
            max_deposit: None,
            interest_payment: String::new(),
            promotional: false,
            application_url: String::new(),
            last_updated: String::new(),
            data_source: "test".to_string(),
        }
    }

    #[test]
    fn term_labels() {
        assert_eq!(variant(Some(3)).term_label(), "3 months");
        assert_eq!(variant(Some(12)).term_label(), "1 year");
        assert_eq!(variant(Some(24)).term_label(), "2 years");
        assert_eq!(variant(Some(18)).term_label(), "1y 6m");
        assert_eq!(variant(None).term_label(), "Not Specified");
        assert_eq!(variant(Some(0)).term_label(), "Under 1 month");
    }

    #[test]
    fn variants_of_one_product_have_distinct_keys() {
        let short = variant(Some(3));
        let long = variant(Some(12));
        assert_ne!(short.dedup_key(), long.dedup_key());
        assert_eq!(short.dedup_key().0, "bank");
        assert_eq!(variant(Some(3)).dedup_key(), short.dedup_key());
    }

    #[test]
    fn product_line_categories() {
        assert_eq!(ProductLine::default(), ProductLine::Mortgages);
        assert_eq!(ProductLine::TermDeposits.category(), "TERM_DEPOSITS");
        assert_eq!(ProductLine::TermDeposits.file_stem(), "term_deposits");
    }
}
