use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MalltaxError, Result};
use crate::settings::Settings;

/// Per-mall processing profile, as written in a JSON profile file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    #[serde(alias = "mallName")]
    pub mall_name: Option<String>,
    pub sheet: Option<String>,
    #[serde(alias = "headerRow")]
    pub header_row: Option<usize>,
    #[serde(alias = "headerScanRows")]
    pub header_scan_rows: Option<usize>,
    #[serde(alias = "useTaxTypeClassification")]
    pub use_tax_type_classification: bool,
    #[serde(alias = "dateColumn")]
    pub date_column: Option<String>,
    #[serde(alias = "taxExemptColumn")]
    pub tax_exempt_column: Option<String>,
    #[serde(alias = "taxableColumn")]
    pub taxable_column: Option<String>,
    #[serde(alias = "taxTypeColumn")]
    pub tax_type_column: Option<String>,
    #[serde(alias = "amountColumn")]
    pub amount_column: Option<String>,
    #[serde(alias = "amountColumns")]
    pub amount_columns: Vec<String>,
    #[serde(alias = "useMultiColumnSum")]
    pub use_multi_column_sum: bool,
    #[serde(alias = "taxExemptValues")]
    pub tax_exempt_values: Vec<String>,
    #[serde(alias = "taxableValues")]
    pub taxable_values: Vec<String>,
}

/// The validated mode for one run. Exactly one is active.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingMode {
    Traditional {
        date_column: String,
        tax_exempt_column: String,
        taxable_column: String,
    },
    TaxType {
        date_column: String,
        tax_type_column: String,
        amount_columns: Vec<String>,
        tax_exempt_values: Vec<String>,
        taxable_values: Vec<String>,
    },
}

impl ProcessingMode {
    pub fn date_column(&self) -> &str {
        match self {
            Self::Traditional { date_column, .. } | Self::TaxType { date_column, .. } => date_column,
        }
    }

    /// Every configured column name, date first.
    pub fn required_columns(&self) -> Vec<&str> {
        match self {
            Self::Traditional {
                date_column,
                tax_exempt_column,
                taxable_column,
            } => vec![date_column.as_str(), tax_exempt_column.as_str(), taxable_column.as_str()],
            Self::TaxType {
                date_column,
                tax_type_column,
                amount_columns,
                ..
            } => {
                let mut cols = vec![date_column.as_str(), tax_type_column.as_str()];
                cols.extend(amount_columns.iter().map(String::as_str));
                cols
            }
        }
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ProcessingOptions {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Fill unset scan depth and empty keyword lists from user settings.
    pub fn with_defaults(mut self, settings: &Settings) -> Self {
        if self.header_scan_rows.is_none() {
            self.header_scan_rows = Some(settings.header_scan_rows);
        }
        if self.tax_exempt_values.is_empty() {
            self.tax_exempt_values = settings.tax_exempt_values.clone();
        }
        if self.taxable_values.is_empty() {
            self.taxable_values = settings.taxable_values.clone();
        }
        self
    }

    /// Check required fields for the active mode, listing every missing one.
    pub fn validate(&self) -> Result<ProcessingMode> {
        let mut missing = Vec::new();
        let date_column = present(&self.date_column);
        if date_column.is_none() {
            missing.push("date_column".to_string());
        }

        if !self.use_tax_type_classification {
            let tax_exempt_column = present(&self.tax_exempt_column);
            let taxable_column = present(&self.taxable_column);
            if tax_exempt_column.is_none() {
                missing.push("tax_exempt_column".to_string());
            }
            if taxable_column.is_none() {
                missing.push("taxable_column".to_string());
            }
            return match (date_column, tax_exempt_column, taxable_column) {
                (Some(date_column), Some(tax_exempt_column), Some(taxable_column)) => {
                    Ok(ProcessingMode::Traditional {
                        date_column,
                        tax_exempt_column,
                        taxable_column,
                    })
                }
                _ => Err(MalltaxError::MissingOptions(missing)),
            };
        }

        let tax_type_column = present(&self.tax_type_column);
        if tax_type_column.is_none() {
            missing.push("tax_type_column".to_string());
        }
        let amount_columns: Vec<String> = if self.use_multi_column_sum {
            self.amount_columns
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            present(&self.amount_column).into_iter().collect()
        };
        if amount_columns.is_empty() {
            if self.use_multi_column_sum && missing.is_empty() {
                return Err(MalltaxError::NoAmountColumns);
            }
            missing.push(if self.use_multi_column_sum {
                "amount_columns".to_string()
            } else {
                "amount_column".to_string()
            });
        }
        if self.tax_exempt_values.is_empty() && self.taxable_values.is_empty() {
            missing.push("tax_exempt_values/taxable_values".to_string());
        }

        match (date_column, tax_type_column) {
            (Some(date_column), Some(tax_type_column)) if missing.is_empty() => {
                Ok(ProcessingMode::TaxType {
                    date_column,
                    tax_type_column,
                    amount_columns,
                    tax_exempt_values: self.tax_exempt_values.clone(),
                    taxable_values: self.taxable_values.clone(),
                })
            }
            _ => Err(MalltaxError::MissingOptions(missing)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tax_type() -> ProcessingOptions {
        ProcessingOptions {
            use_tax_type_classification: true,
            date_column: Some("주문일자".into()),
            tax_type_column: Some("과세구분".into()),
            amount_column: Some("결제금액".into()),
            tax_exempt_values: vec!["면세".into()],
            taxable_values: vec!["과세".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_traditional_mode() {
        let opts = ProcessingOptions {
            date_column: Some("일자".into()),
            tax_exempt_column: Some("면세".into()),
            taxable_column: Some("과세".into()),
            ..Default::default()
        };
        let mode = opts.validate().unwrap();
        assert_eq!(mode.required_columns(), vec!["일자", "면세", "과세"]);
    }

    #[test]
    fn test_traditional_lists_all_missing() {
        let opts = ProcessingOptions {
            taxable_column: Some("  ".into()),
            ..Default::default()
        };
        match opts.validate().unwrap_err() {
            MalltaxError::MissingOptions(missing) => {
                assert_eq!(missing, vec!["date_column", "tax_exempt_column", "taxable_column"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_tax_type_single_amount() {
        let mode = tax_type().validate().unwrap();
        assert_eq!(mode.required_columns(), vec!["주문일자", "과세구분", "결제금액"]);
        assert_eq!(mode.date_column(), "주문일자");
    }

    #[test]
    fn test_multi_column_sum_needs_columns() {
        let opts = ProcessingOptions {
            use_multi_column_sum: true,
            ..tax_type()
        };
        assert!(matches!(opts.validate(), Err(MalltaxError::NoAmountColumns)));

        let opts = ProcessingOptions {
            use_multi_column_sum: true,
            amount_columns: vec!["카드".into(), "현금".into()],
            ..tax_type()
        };
        let mode = opts.validate().unwrap();
        assert_eq!(mode.required_columns(), vec!["주문일자", "과세구분", "카드", "현금"]);
    }

    #[test]
    fn test_tax_type_missing_fields() {
        let opts = ProcessingOptions {
            use_tax_type_classification: true,
            ..Default::default()
        };
        match opts.validate().unwrap_err() {
            MalltaxError::MissingOptions(missing) => assert_eq!(
                missing,
                vec![
                    "date_column",
                    "tax_type_column",
                    "amount_column",
                    "tax_exempt_values/taxable_values"
                ]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_profile_accepts_camel_case() {
        let json = r#"{
            "mallName": "스마트스토어",
            "useTaxTypeClassification": true,
            "dateColumn": "주문일자",
            "taxTypeColumn": "과세유형",
            "useMultiColumnSum": true,
            "amountColumns": ["카드", "포인트"]
        }"#;
        let opts: ProcessingOptions = serde_json::from_str(json).unwrap();
        assert_eq!(opts.mall_name.as_deref(), Some("스마트스토어"));
        assert_eq!(opts.amount_columns.len(), 2);
        let opts = opts.with_defaults(&Settings::default());
        assert!(opts.tax_exempt_values.contains(&"면세".to_string()));
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_load_profile_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mall.json");
        std::fs::write(&path, r#"{"date_column": "일자", "tax_exempt_column": "면세", "taxable_column": "과세"}"#).unwrap();
        let opts = ProcessingOptions::load(&path).unwrap();
        assert!(!opts.use_tax_type_classification);
        assert!(opts.validate().is_ok());
    }
}
