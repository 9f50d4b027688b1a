use std::io::{Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto, Data, Dimensions, Range, Reader, Sheets};

use crate::error::{MalltaxError, Result};
use crate::models::{Cell, Grid, MergeRegion};
use crate::normalize::excel_serial_to_date;

/// One loaded worksheet: absolute-coordinate grid plus its merge regions.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub grid: Grid,
    pub merges: Vec<MergeRegion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Spreadsheet,
    Csv,
}

fn source_kind(path: &Path) -> Result<SourceKind> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(SourceKind::Spreadsheet),
        "csv" => Ok(SourceKind::Csv),
        _ => Err(MalltaxError::UnsupportedFile(path.display().to_string())),
    }
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => match excel_serial_to_date(dt.as_f64()) {
            Some(date) => Cell::Date(date),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// calamine ranges start at the first used cell; pad so indices are absolute.
fn range_to_grid(range: &Range<Data>) -> Grid {
    let Some((row0, col0)) = range.start() else {
        return Grid::default();
    };
    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row0 as usize];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; col0 as usize];
        cells.extend(row.iter().map(convert_cell));
        rows.push(cells);
    }
    Grid::new(rows)
}

fn to_merge_region(dim: &Dimensions) -> MergeRegion {
    MergeRegion::new(
        dim.start.0 as usize,
        dim.start.1 as usize,
        dim.end.0 as usize,
        dim.end.1 as usize,
    )
}

fn pick_sheet(names: &[String], wanted: Option<&str>) -> Result<String> {
    match wanted {
        Some(name) => names
            .iter()
            .find(|n| n.as_str() == name)
            .or_else(|| names.iter().find(|n| n.trim().eq_ignore_ascii_case(name.trim())))
            .cloned()
            .ok_or_else(|| MalltaxError::SheetNotFound(name.to_string())),
        None => names
            .first()
            .cloned()
            .ok_or_else(|| MalltaxError::SheetNotFound("(no sheets)".to_string())),
    }
}

/// Merge regions of one sheet. The xlsb and ods readers do not report them.
fn sheet_merges<RS: Read + Seek>(workbook: &mut Sheets<RS>, name: &str) -> Result<Vec<MergeRegion>> {
    let dims: Vec<Dimensions> = match workbook {
        Sheets::Xlsx(xlsx) => {
            xlsx.load_merged_regions()?;
            xlsx.worksheet_merge_cells(name).transpose()?.unwrap_or_default()
        }
        Sheets::Xls(xls) => xls.worksheet_merge_cells(name).unwrap_or_default(),
        _ => Vec::new(),
    };
    Ok(dims.iter().map(to_merge_region).collect())
}

fn load_spreadsheet(path: &Path, sheet: Option<&str>) -> Result<Sheet> {
    let mut workbook = open_workbook_auto(path)?;
    let name = pick_sheet(&workbook.sheet_names(), sheet)?;
    let range = workbook.worksheet_range(&name)?;
    let merges = sheet_merges(&mut workbook, &name)?;
    Ok(Sheet {
        grid: range_to_grid(&range),
        name,
        merges,
    })
}

fn load_csv(path: &Path) -> Result<Sheet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    let text = String::from_utf8_lossy(field);
                    if text.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(text.into_owned())
                    }
                })
                .collect(),
        );
    }
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Sheet {
        name,
        grid: Grid::new(rows),
        merges: Vec::new(),
    })
}

/// Load one sheet (the first when `sheet` is `None`) from a spreadsheet or CSV file.
pub fn load_sheet(path: &Path, sheet: Option<&str>) -> Result<Sheet> {
    let loaded = match source_kind(path)? {
        SourceKind::Spreadsheet => load_spreadsheet(path, sheet)?,
        SourceKind::Csv => {
            if let Some(name) = sheet {
                tracing::debug!(sheet = name, "sheet selection ignored for csv input");
            }
            load_csv(path)?
        }
    };
    tracing::debug!(
        file = %path.display(),
        sheet = %loaded.name,
        rows = loaded.grid.height(),
        merges = loaded.merges.len(),
        "sheet loaded"
    );
    Ok(loaded)
}

pub fn sheet_names(path: &Path) -> Result<Vec<String>> {
    match source_kind(path)? {
        SourceKind::Spreadsheet => Ok(open_workbook_auto(path)?.sheet_names()),
        SourceKind::Csv => Ok(vec![load_csv(path)?.name]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_xlsxwriter::{Format, Workbook};

    fn write_fixture(path: &Path) {
        let mut workbook = Workbook::new();
        let merge = Format::new();
        let date = Format::new().set_num_format("yyyy-mm-dd");

        let sheet = workbook.add_worksheet();
        sheet.set_name("주문내역").unwrap();
        sheet.write_string(0, 0, "2024년 01월 매출").unwrap();
        sheet.merge_range(2, 0, 3, 0, "주문번호", &merge).unwrap();
        sheet.merge_range(2, 1, 3, 1, "주문일자", &merge).unwrap();
        sheet.merge_range(2, 2, 2, 3, "결제금액", &merge).unwrap();
        sheet.write_string(3, 2, "면세금액").unwrap();
        sheet.write_string(3, 3, "과세금액").unwrap();
        sheet.write_number(4, 0, 1.0).unwrap();
        sheet.write_number_with_format(4, 1, 45306.0, &date).unwrap();
        sheet.write_number(4, 2, 1000.0).unwrap();
        sheet.write_number(4, 3, 500.0).unwrap();

        let other = workbook.add_worksheet();
        other.set_name("Other").unwrap();
        other.write_string(3, 2, "offset").unwrap();

        workbook.save(path).unwrap();
    }

    #[test]
    fn test_load_xlsx_with_merges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mall.xlsx");
        write_fixture(&path);

        let sheet = load_sheet(&path, None).unwrap();
        assert_eq!(sheet.name, "주문내역");
        assert_eq!(sheet.merges.len(), 3);
        assert!(sheet.merges.contains(&MergeRegion::new(2, 2, 2, 3)));
        assert_eq!(sheet.grid.get(2, 2), &Cell::text("결제금액"));
        assert_eq!(sheet.grid.get(3, 0), &Cell::Empty);
        assert_eq!(
            sheet.grid.get(4, 1),
            &Cell::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
        assert_eq!(sheet.grid.get(4, 2), &Cell::Number(1000.0));
    }

    #[test]
    fn test_merges_read_through_auto_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auto.xlsx");
        write_fixture(&path);

        let mut workbook = open_workbook_auto(&path).unwrap();
        let merges = sheet_merges(&mut workbook, "주문내역").unwrap();
        assert_eq!(merges.len(), 3);
        assert!(merges.contains(&MergeRegion::new(2, 0, 3, 0)));
        assert!(sheet_merges(&mut workbook, "Other").unwrap().is_empty());
    }

    #[test]
    fn test_range_offset_is_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mall.xlsx");
        write_fixture(&path);

        let sheet = load_sheet(&path, Some("Other")).unwrap();
        assert_eq!(sheet.grid.height(), 4);
        assert_eq!(sheet.grid.get(3, 2), &Cell::text("offset"));
        assert!(sheet.merges.is_empty());
    }

    #[test]
    fn test_unknown_sheet_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mall.xlsx");
        write_fixture(&path);
        assert!(matches!(
            load_sheet(&path, Some("없는시트")),
            Err(MalltaxError::SheetNotFound(_))
        ));
        assert_eq!(sheet_names(&path).unwrap(), vec!["주문내역", "Other"]);
    }

    #[test]
    fn test_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coupang.csv");
        std::fs::write(&path, "주문일자,과세구분,결제금액\n2024-01-15,면세,\"1,000\"\n,,\n2024-01-16,과세\n").unwrap();
        let sheet = load_sheet(&path, None).unwrap();
        assert_eq!(sheet.name, "coupang");
        assert_eq!(sheet.grid.height(), 4);
        assert_eq!(sheet.grid.get(1, 2), &Cell::text("1,000"));
        assert!(sheet.grid.is_row_empty(2));
        assert_eq!(sheet.grid.get(3, 2), &Cell::Empty);
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            load_sheet(Path::new("notes.txt"), None),
            Err(MalltaxError::UnsupportedFile(_))
        ));
    }
}
