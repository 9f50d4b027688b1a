pub mod columns;
pub mod headers;
pub mod init;
pub mod process;
pub mod summary;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::error::Result;
use crate::export::ExportFormat;
use crate::options::ProcessingOptions;
use crate::settings::{shellexpand_path, Settings};

#[derive(Parser)]
#[command(
    name = "malltax",
    version,
    about = "Normalize mall back-office spreadsheet exports into monthly tax-exempt/taxable totals."
)]
pub struct Cli {
    /// Show debug logging (header scores, dialects, skipped rows)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write default settings to ~/.config/malltax/settings.json.
    Init {
        /// Directory for exported summaries
        #[arg(long = "output-dir")]
        output_dir: Option<String>,
        /// Overwrite existing settings
        #[arg(long)]
        force: bool,
    },
    /// Process one or more mall exports and write a summary.
    Process {
        /// Spreadsheet or CSV files to process
        #[arg(required = true)]
        files: Vec<String>,
        #[command(flatten)]
        options: OptionArgs,
        /// Output file (default: <output_dir>/malltax-YYYYMMDD-HHMMSS.<format>)
        #[arg(short, long)]
        output: Option<String>,
        /// Export format
        #[arg(long, value_enum)]
        format: Option<ExportFormat>,
        /// Print totals without writing an export
        #[arg(long = "no-export")]
        no_export: bool,
        /// Stop at the first file that fails
        #[arg(long = "fail-fast")]
        fail_fast: bool,
    },
    /// Show where the header was found and why.
    Headers {
        /// Spreadsheet or CSV file
        file: String,
        /// Sheet name (default: first sheet)
        #[arg(long)]
        sheet: Option<String>,
        /// Rows to scan for a header
        #[arg(long = "scan-rows")]
        scan_rows: Option<usize>,
    },
    /// List the reconstructed column names of a sheet.
    Columns {
        /// Spreadsheet or CSV file
        file: String,
        /// Sheet name (default: first sheet)
        #[arg(long)]
        sheet: Option<String>,
        /// Force the header row (0-based)
        #[arg(long = "header-row")]
        header_row: Option<usize>,
    },
    /// Print the summary of an exported xlsx or csv file.
    Summary {
        /// Exported summary file
        file: String,
    },
}

/// Processing options given as flags; they override values from `--profile`.
#[derive(Args, Debug, Default, Clone)]
pub struct OptionArgs {
    /// JSON processing profile for this mall
    #[arg(long)]
    pub profile: Option<String>,
    /// Mall name shown in the summary (default: file name)
    #[arg(long = "mall")]
    pub mall_name: Option<String>,
    /// Sheet name (default: first sheet)
    #[arg(long)]
    pub sheet: Option<String>,
    /// Force the header row (0-based)
    #[arg(long = "header-row")]
    pub header_row: Option<usize>,
    /// Classify rows by a tax-type column instead of separate amount columns
    #[arg(long = "tax-type")]
    pub tax_type: bool,
    #[arg(long = "date-column")]
    pub date_column: Option<String>,
    #[arg(long = "exempt-column")]
    pub tax_exempt_column: Option<String>,
    #[arg(long = "taxable-column")]
    pub taxable_column: Option<String>,
    #[arg(long = "tax-type-column")]
    pub tax_type_column: Option<String>,
    #[arg(long = "amount-column")]
    pub amount_column: Option<String>,
    /// Sum several amount columns per row (comma-separated)
    #[arg(long = "amount-columns", value_delimiter = ',')]
    pub amount_columns: Vec<String>,
    /// Tax-type values meaning tax-exempt (comma-separated)
    #[arg(long = "exempt-values", value_delimiter = ',')]
    pub tax_exempt_values: Vec<String>,
    /// Tax-type values meaning taxable (comma-separated)
    #[arg(long = "taxable-values", value_delimiter = ',')]
    pub taxable_values: Vec<String>,
}

fn override_with(target: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *target = value;
    }
}

impl OptionArgs {
    /// Profile first, flags on top, settings for anything still unset.
    pub fn resolve(self, settings: &Settings) -> Result<ProcessingOptions> {
        let mut opts = match &self.profile {
            Some(path) => ProcessingOptions::load(&expand(path))?,
            None => ProcessingOptions::default(),
        };
        override_with(&mut opts.mall_name, self.mall_name);
        override_with(&mut opts.sheet, self.sheet);
        override_with(&mut opts.date_column, self.date_column);
        override_with(&mut opts.tax_exempt_column, self.tax_exempt_column);
        override_with(&mut opts.taxable_column, self.taxable_column);
        override_with(&mut opts.tax_type_column, self.tax_type_column);
        override_with(&mut opts.amount_column, self.amount_column);
        if self.header_row.is_some() {
            opts.header_row = self.header_row;
        }
        if self.tax_type {
            opts.use_tax_type_classification = true;
        }
        if !self.amount_columns.is_empty() {
            opts.amount_columns = self.amount_columns;
            opts.use_multi_column_sum = true;
        }
        if !self.tax_exempt_values.is_empty() {
            opts.tax_exempt_values = self.tax_exempt_values;
        }
        if !self.taxable_values.is_empty() {
            opts.taxable_values = self.taxable_values;
        }
        Ok(opts.with_defaults(settings))
    }
}

pub(crate) fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_profile() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("mall.json");
        std::fs::write(
            &profile,
            r#"{"mallName": "쿠팡", "dateColumn": "주문일", "taxExemptColumn": "면세", "taxableColumn": "과세"}"#,
        )
        .unwrap();
        let args = OptionArgs {
            profile: Some(profile.to_string_lossy().to_string()),
            date_column: Some("결제일".into()),
            ..Default::default()
        };
        let opts = args.resolve(&Settings::default()).unwrap();
        assert_eq!(opts.mall_name.as_deref(), Some("쿠팡"));
        assert_eq!(opts.date_column.as_deref(), Some("결제일"));
        assert_eq!(opts.tax_exempt_column.as_deref(), Some("면세"));
        assert_eq!(opts.header_scan_rows, Some(10));
    }

    #[test]
    fn test_amount_columns_enable_multi_sum() {
        let args = OptionArgs {
            tax_type: true,
            amount_columns: vec!["카드".into(), "현금".into()],
            ..Default::default()
        };
        let opts = args.resolve(&Settings::default()).unwrap();
        assert!(opts.use_tax_type_classification);
        assert!(opts.use_multi_column_sum);
        assert!(!opts.tax_exempt_values.is_empty());
    }

    #[test]
    fn test_cli_parses_process() {
        let cli = Cli::try_parse_from([
            "malltax",
            "-v",
            "process",
            "a.xlsx",
            "b.csv",
            "--tax-type",
            "--amount-columns",
            "카드,현금",
            "--format",
            "csv",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Process {
                files,
                options,
                format,
                ..
            } => {
                assert_eq!(files, vec!["a.xlsx", "b.csv"]);
                assert_eq!(options.amount_columns, vec!["카드", "현금"]);
                assert_eq!(format, Some(ExportFormat::Csv));
            }
            _ => panic!("expected process"),
        }
    }
}
