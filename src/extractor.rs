use std::collections::{BTreeMap, HashSet};

use crate::columns::resolve_columns;
use crate::dialect::{header_columns, HeaderColumn, HeaderSet};
use crate::error::{MalltaxError, Result};
use crate::header::{detect_header_row_within, HEADER_SCAN_ROWS};
use crate::merge::resolve_merges;
use crate::models::{Grid, MergeRegion, MonthlyRecord};
use crate::normalize::{amount_from_cell, is_summary_row, parse_amount, parse_date, year_month, DateContext};
use crate::options::{ProcessingMode, ProcessingOptions};

/// Where the header sits and what its columns are called.
#[derive(Debug, Clone)]
pub struct HeaderLayout {
    pub resolved: Grid,
    pub header_set: HeaderSet,
    pub confidence: u32,
    pub columns: Vec<HeaderColumn>,
}

impl HeaderLayout {
    pub fn data_start(&self) -> usize {
        self.header_set.last_row() + 1
    }
}

fn sheet_label(options: &ProcessingOptions) -> String {
    options.sheet.clone().unwrap_or_else(|| "(first sheet)".to_string())
}

/// Resolve merges, locate the header and reconstruct column names.
pub fn analyze_headers(grid: &Grid, merges: &[MergeRegion], options: &ProcessingOptions) -> Result<HeaderLayout> {
    if grid.is_empty() {
        return Err(MalltaxError::EmptySheet(sheet_label(options)));
    }
    let resolved = resolve_merges(grid, merges);
    let (header_set, confidence) = match options.header_row {
        Some(row) if row >= grid.height() => {
            return Err(MalltaxError::HeaderRowOutOfRange {
                row,
                rows: grid.height(),
            });
        }
        Some(row) => (HeaderSet::Single(row), 100),
        None => {
            let scan_rows = options.header_scan_rows.unwrap_or(HEADER_SCAN_ROWS);
            let detection = detect_header_row_within(&resolved, options.sheet.as_deref(), scan_rows);
            (detection.header_set, detection.confidence)
        }
    };
    let columns = header_columns(grid, &resolved, &header_set);
    Ok(HeaderLayout {
        resolved,
        header_set,
        confidence,
        columns,
    })
}

pub fn get_column_headers(grid: &Grid, merges: &[MergeRegion], options: &ProcessingOptions) -> Result<Vec<String>> {
    let layout = analyze_headers(grid, merges, options)?;
    Ok(layout.columns.into_iter().map(|c| c.name).collect())
}

// ---------------------------------------------------------------------------
// Tax-type classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxClass {
    Exempt,
    Taxable,
}

fn matches_keyword(value: &str, keyword: &str) -> bool {
    let k = keyword.trim().to_lowercase();
    !k.is_empty() && (value == k || value.contains(&k))
}

/// Exempt keywords are checked first so "비과세" is not read as "과세".
/// `None` means neither list matched.
pub fn classify_tax_type(value: &str, exempt: &[String], taxable: &[String]) -> Option<TaxClass> {
    let v = value.trim().to_lowercase();
    if v.is_empty() {
        return None;
    }
    if exempt.iter().any(|k| matches_keyword(&v, k)) {
        return Some(TaxClass::Exempt);
    }
    if taxable.iter().any(|k| matches_keyword(&v, k)) {
        return Some(TaxClass::Taxable);
    }
    None
}

// ---------------------------------------------------------------------------
// Row extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SkipCounts {
    summary: usize,
    date: usize,
    amount: usize,
}

/// Read dated rows below the header and emit monthly records for the active mode.
pub fn read_tabular_data(grid: &Grid, merges: &[MergeRegion], options: &ProcessingOptions) -> Result<Vec<MonthlyRecord>> {
    let mode = options.validate()?;
    let layout = analyze_headers(grid, merges, options)?;
    let indices = resolve_columns(&mode.required_columns(), &layout.columns)?;
    let ctx = DateContext::from_grid(grid);
    let data = &layout.resolved;
    let date_col = indices[0];
    let mut skipped = SkipCounts::default();
    let mut warned_context = false;

    let rows = (layout.data_start()..data.height()).filter(|&r| !data.is_row_empty(r));
    let mut dated = Vec::new();
    for r in rows {
        let date_cell = data.get(r, date_col);
        if is_summary_row(date_cell) {
            skipped.summary += 1;
            continue;
        }
        match parse_date(date_cell, &ctx) {
            Ok(date) => dated.push((r, year_month(date))),
            Err(MalltaxError::MissingDateContext(raw)) => {
                if !warned_context {
                    tracing::warn!(value = %raw, "day-only dates need a \"YYYY년 MM월\" title, rows skipped");
                    warned_context = true;
                }
                skipped.date += 1;
            }
            Err(e) => {
                tracing::trace!(row = r, error = %e, "row skipped");
                skipped.date += 1;
            }
        }
    }

    let records: Vec<MonthlyRecord> = match &mode {
        ProcessingMode::Traditional { .. } => {
            let (exempt_col, taxable_col) = (indices[1], indices[2]);
            dated
                .into_iter()
                .filter_map(|(r, (year, month))| {
                    let tax_exempt = amount_from_cell(data.get(r, exempt_col));
                    let taxable = amount_from_cell(data.get(r, taxable_col));
                    match (tax_exempt, taxable) {
                        (Some(tax_exempt), Some(taxable)) => Some(MonthlyRecord {
                            year,
                            month,
                            tax_exempt,
                            taxable,
                        }),
                        _ => {
                            skipped.amount += 1;
                            None
                        }
                    }
                })
                .collect()
        }
        ProcessingMode::TaxType {
            tax_exempt_values,
            taxable_values,
            ..
        } => {
            let type_col = indices[1];
            let amount_cols = &indices[2..];
            let mut buckets: BTreeMap<(i32, u32), MonthlyRecord> = BTreeMap::new();
            let mut unknown: HashSet<String> = HashSet::new();
            for (r, (year, month)) in dated {
                let amount: f64 = amount_cols.iter().map(|&c| parse_amount(data.get(r, c))).sum();
                if amount == 0.0 || !amount.is_finite() {
                    skipped.amount += 1;
                    continue;
                }
                let type_value = data.get(r, type_col).display();
                let class = classify_tax_type(&type_value, tax_exempt_values, taxable_values)
                    .unwrap_or_else(|| {
                        if unknown.insert(type_value.clone()) {
                            tracing::warn!(value = %type_value, row = r, "unrecognized tax type, counted as taxable");
                        }
                        TaxClass::Taxable
                    });
                let bucket = buckets.entry((year, month)).or_insert(MonthlyRecord {
                    year,
                    month,
                    tax_exempt: 0.0,
                    taxable: 0.0,
                });
                match class {
                    TaxClass::Exempt => bucket.tax_exempt += amount,
                    TaxClass::Taxable => bucket.taxable += amount,
                }
            }
            buckets.into_values().collect()
        }
    };

    tracing::debug!(
        date_column = mode.date_column(),
        header_confidence = layout.confidence,
        dialect = layout.header_set.dialect().map_or("single_row", |d| d.key()),
        records = records.len(),
        skipped_summary = skipped.summary,
        skipped_date = skipped.date,
        skipped_amount = skipped.amount,
        "rows extracted"
    );
    Ok(records)
}
