use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::aggregate::calculate_totals;
use crate::error::Result;
use crate::extractor::read_tabular_data;
use crate::models::CalculationResult;
use crate::options::ProcessingOptions;
use crate::workbook::load_sheet;

/// Result of running one input file through the pipeline.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub checksum: Option<String>,
    pub result: Result<CalculationResult>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Mall name from the options, else the file stem.
fn mall_name(path: &Path, options: &ProcessingOptions) -> String {
    options
        .mall_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        })
}

/// Load, extract and aggregate a single file.
pub fn process_file(path: &Path, options: &ProcessingOptions) -> Result<CalculationResult> {
    let sheet = load_sheet(path, options.sheet.as_deref())?;
    let records = read_tabular_data(&sheet.grid, &sheet.merges, options)?;
    Ok(calculate_totals(&mall_name(path, options), &records))
}

fn run_one(path: &Path, options: &ProcessingOptions) -> FileOutcome {
    let result = process_file(path, options);
    match &result {
        Ok(r) => tracing::info!(file = %path.display(), months = r.monthly_totals.len(), "processed"),
        Err(e) => tracing::warn!(file = %path.display(), error = %e, "file failed"),
    }
    FileOutcome {
        path: path.to_path_buf(),
        checksum: compute_checksum(path).ok(),
        result,
    }
}

fn warn_duplicates(outcomes: &[FileOutcome]) {
    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for o in outcomes {
        let Some(sum) = o.checksum.as_deref() else {
            continue;
        };
        if let Some(first) = seen.insert(sum, &o.path) {
            tracing::warn!(
                file = %o.path.display(),
                same_as = %first.display(),
                "identical file content processed twice"
            );
        }
    }
}

/// Run every file independently. Outcomes keep their source path; order is not significant.
///
/// With `fail_fast`, files are run in order and the batch stops at the first failure.
pub fn process_files(paths: &[PathBuf], options: &ProcessingOptions, fail_fast: bool) -> Vec<FileOutcome> {
    let outcomes = if fail_fast {
        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            let outcome = run_one(path, options);
            let failed = !outcome.is_ok();
            outcomes.push(outcome);
            if failed {
                break;
            }
        }
        outcomes
    } else {
        run_all(paths, options)
    };
    warn_duplicates(&outcomes);
    outcomes
}

#[cfg(feature = "parallel")]
fn run_all(paths: &[PathBuf], options: &ProcessingOptions) -> Vec<FileOutcome> {
    use rayon::prelude::*;
    paths.par_iter().map(|p| run_one(p, options)).collect()
}

#[cfg(not(feature = "parallel"))]
fn run_all(paths: &[PathBuf], options: &ProcessingOptions) -> Vec<FileOutcome> {
    paths.iter().map(|p| run_one(p, options)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MalltaxError;

    fn options() -> ProcessingOptions {
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

    fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_process_file_uses_stem_as_mall_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "11번가.csv",
            "주문일자,과세구분,결제금액\n2024-01-15,면세,1000\n2024-02-01,과세,\"2,500\"\n합계,,3500\n",
        );
        let result = process_file(&path, &options()).unwrap();
        assert_eq!(result.mall_name, "11번가");
        assert_eq!(result.monthly_totals.len(), 2);
        assert_eq!(result.yearly_total.tax_exempt, 1000.0);
        assert_eq!(result.yearly_total.taxable, 2500.0);
    }

    #[test]
    fn test_batch_continues_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_csv(dir.path(), "good.csv", "주문일자,과세구분,결제금액\n2024-01-15,면세,1000\n");
        let bad = write_csv(dir.path(), "bad.csv", "날짜,금액\n2024-01-15,1000\n");
        let outcomes = process_files(&[bad.clone(), good.clone()], &options(), false);
        assert_eq!(outcomes.len(), 2);
        let by_path = |p: &Path| outcomes.iter().find(|o| o.path.as_path() == p).unwrap();
        assert!(matches!(by_path(bad.as_path()).result, Err(MalltaxError::MissingColumns { .. })));
        assert!(by_path(good.as_path()).is_ok());
        assert!(by_path(good.as_path()).checksum.is_some());
    }

    #[test]
    fn test_fail_fast_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_csv(dir.path(), "good.csv", "주문일자,과세구분,결제금액\n2024-01-15,면세,1000\n");
        let missing = dir.path().join("missing.xlsx");
        let outcomes = process_files(&[missing, good], &options(), true);
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].is_ok());
        assert!(outcomes[0].checksum.is_none());
    }

    #[test]
    fn test_compute_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_csv(dir.path(), "a.csv", "x");
        let b = write_csv(dir.path(), "b.csv", "x");
        assert_eq!(compute_checksum(&a).unwrap(), compute_checksum(&b).unwrap());
        assert_eq!(compute_checksum(&a).unwrap().len(), 64);
    }
}
