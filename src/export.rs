use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};

use crate::error::{MalltaxError, Result};
use crate::models::{CalculationResult, YearlyTotal};

pub const SUMMARY_SHEET: &str = "요약";
const SUMMARY_HEADERS: [&str; 4] = ["쇼핑몰", "면세", "과세", "합계"];
const DETAIL_HEADERS: [&str; 5] = ["연도", "월", "면세", "과세", "합계"];

const SHEET_NAME_MAX: usize = 31;
const SHEET_NAME_FORBIDDEN: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Summary sheet plus one detail sheet per mall
    #[default]
    Xlsx,
    /// Summary only, one line per mall
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "xlsx" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// One line of the summary: mall name and its yearly totals.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub mall_name: String,
    pub yearly_total: YearlyTotal,
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Worksheet names are capped at 31 chars, exclude `[]:*?/\` and must be
/// unique ignoring case.
fn sheet_name(mall_name: &str, taken: &mut HashSet<String>) -> String {
    let cleaned: String = mall_name
        .chars()
        .map(|c| if SHEET_NAME_FORBIDDEN.contains(&c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'').to_string();
    let base = if cleaned.is_empty() { "mall".to_string() } else { cleaned };

    let mut suffix = 1;
    loop {
        let tail = if suffix == 1 { String::new() } else { format!(" ({suffix})") };
        let room = SHEET_NAME_MAX - tail.chars().count();
        let name: String = base.chars().take(room).collect::<String>() + &tail;
        if taken.insert(name.to_lowercase()) {
            return name;
        }
        suffix += 1;
    }
}

pub fn render_xlsx(results: &[CalculationResult]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let mut taken = HashSet::from([SUMMARY_SHEET.to_lowercase()]);

    let summary = workbook.add_worksheet();
    summary.set_name(SUMMARY_SHEET)?;
    for (col, header) in SUMMARY_HEADERS.iter().enumerate() {
        summary.write_string(0, col as u16, *header)?;
    }
    for (i, result) in results.iter().enumerate() {
        let row = i as u32 + 1;
        let y = &result.yearly_total;
        summary.write_string(row, 0, &result.mall_name)?;
        summary.write_number(row, 1, y.tax_exempt)?;
        summary.write_number(row, 2, y.taxable)?;
        summary.write_number(row, 3, y.total)?;
    }

    for result in results {
        let name = sheet_name(&result.mall_name, &mut taken);
        let detail = workbook.add_worksheet();
        detail.set_name(&name)?;
        for (col, header) in DETAIL_HEADERS.iter().enumerate() {
            detail.write_string(0, col as u16, *header)?;
        }
        for (i, m) in result.monthly_totals.iter().enumerate() {
            let row = i as u32 + 1;
            detail.write_number(row, 0, f64::from(m.year))?;
            detail.write_number(row, 1, f64::from(m.month))?;
            detail.write_number(row, 2, m.tax_exempt)?;
            detail.write_number(row, 3, m.taxable)?;
            detail.write_number(row, 4, m.total)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

pub fn render_csv(results: &[CalculationResult]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(SUMMARY_HEADERS)?;
    for result in results {
        let y = &result.yearly_total;
        writer.write_record([
            result.mall_name.clone(),
            y.tax_exempt.to_string(),
            y.taxable.to_string(),
            y.total.to_string(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| MalltaxError::Io(e.into_error()))
}

pub fn render(results: &[CalculationResult], format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Xlsx => render_xlsx(results),
        ExportFormat::Csv => render_csv(results),
    }
}

/// Serialize `results` and write them to `path`, creating parent directories.
pub fn export_results(results: &[CalculationResult], format: ExportFormat, path: &Path) -> Result<()> {
    let bytes = render(results, format)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    tracing::info!(path = %path.display(), malls = results.len(), "exported");
    Ok(())
}

// ---------------------------------------------------------------------------
// Reading back
// ---------------------------------------------------------------------------

fn data_number(cell: Option<&Data>) -> f64 {
    match cell {
        Some(Data::Float(f)) => *f,
        Some(Data::Int(i)) => *i as f64,
        Some(Data::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn summary_from_xlsx(bytes: Vec<u8>) -> Result<Vec<SummaryRow>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook.worksheet_range(SUMMARY_SHEET)?;
    Ok(range
        .rows()
        .skip(1)
        .filter_map(|row| {
            let mall_name = row.first().map(|c| c.to_string())?;
            if mall_name.trim().is_empty() {
                return None;
            }
            Some(SummaryRow {
                mall_name,
                yearly_total: YearlyTotal {
                    tax_exempt: data_number(row.get(1)),
                    taxable: data_number(row.get(2)),
                    total: data_number(row.get(3)),
                },
            })
        })
        .collect())
}

fn summary_from_csv(bytes: &[u8]) -> Result<Vec<SummaryRow>> {
    let mut reader = csv::Reader::from_reader(bytes);
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let num = |i: usize| record.get(i).and_then(|v| v.trim().parse().ok()).unwrap_or(0.0);
        rows.push(SummaryRow {
            mall_name: record.get(0).unwrap_or_default().to_string(),
            yearly_total: YearlyTotal {
                tax_exempt: num(1),
                taxable: num(2),
                total: num(3),
            },
        });
    }
    Ok(rows)
}

/// Re-read the summary of an export produced by [`render`].
pub fn read_summary(bytes: Vec<u8>, format: ExportFormat) -> Result<Vec<SummaryRow>> {
    match format {
        ExportFormat::Xlsx => summary_from_xlsx(bytes),
        ExportFormat::Csv => summary_from_csv(&bytes),
    }
}

pub fn read_summary_file(path: &Path) -> Result<Vec<SummaryRow>> {
    let format = ExportFormat::from_path(path)
        .ok_or_else(|| MalltaxError::UnsupportedFile(path.display().to_string()))?;
    read_summary(std::fs::read(path)?, format)
}
