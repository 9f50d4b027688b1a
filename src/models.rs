use chrono::NaiveDate;
use serde::Serialize;

/// A raw spreadsheet value. Typing beyond this is inferred downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

static EMPTY_CELL: Cell = Cell::Empty;

impl Cell {
    pub fn text<S: Into<String>>(s: S) -> Self {
        Self::Text(s.into())
    }

    /// Empty cells and whitespace-only text both count as empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Display form used for header names and keyword matching.
    pub fn display(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                    format!("{n:.0}")
                } else {
                    n.to_string()
                }
            }
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Positional rows of cells. Rows may be ragged; missing cells read as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Widest row actually present.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.iter().all(Cell::is_empty))
    }

    pub fn get(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn row(&self, row: usize) -> &[Cell] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn set(&mut self, row: usize, col: usize, cell: Cell) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let r = &mut self.rows[row];
        if r.len() <= col {
            r.resize(col + 1, Cell::Empty);
        }
        r[col] = cell;
    }

    pub fn non_empty_count(&self, row: usize) -> usize {
        self.row(row).iter().filter(|c| !c.is_empty()).count()
    }

    pub fn is_row_empty(&self, row: usize) -> bool {
        self.non_empty_count(row) == 0
    }

    /// Index of the last non-empty cell in `row`.
    pub fn last_non_empty(&self, row: usize) -> Option<usize> {
        self.row(row).iter().rposition(|c| !c.is_empty())
    }
}

/// Inclusive rectangle; the origin is `(start_row, start_col)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRegion {
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
}

impl MergeRegion {
    pub fn new(start_row: usize, start_col: usize, end_row: usize, end_col: usize) -> Self {
        Self {
            start_row: start_row.min(end_row),
            start_col: start_col.min(end_col),
            end_row: start_row.max(end_row),
            end_col: start_col.max(end_col),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyRecord {
    pub year: i32,
    pub month: u32,
    pub tax_exempt: f64,
    pub taxable: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthlyTotal {
    pub year: i32,
    pub month: u32,
    pub tax_exempt: f64,
    pub taxable: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct YearlyTotal {
    pub tax_exempt: f64,
    pub taxable: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationResult {
    pub mall_name: String,
    pub monthly_totals: Vec<MonthlyTotal>,
    pub yearly_total: YearlyTotal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ragged_rows_read_as_empty() {
        let grid = Grid::new(vec![
            vec![Cell::text("a"), Cell::text("b"), Cell::text("c")],
            vec![Cell::text("x")],
        ]);
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.get(1, 2), &Cell::Empty);
        assert_eq!(grid.get(9, 9), &Cell::Empty);
    }

    #[test]
    fn test_whitespace_text_is_empty() {
        assert!(Cell::text("  ").is_empty());
        assert!(!Cell::Number(0.0).is_empty());
    }

    #[test]
    fn test_display_integral_number() {
        assert_eq!(Cell::Number(2024.0).display(), "2024");
        assert_eq!(Cell::Number(1.5).display(), "1.5");
    }

    #[test]
    fn test_last_non_empty() {
        let grid = Grid::new(vec![vec![Cell::text("a"), Cell::Empty, Cell::text("c"), Cell::text(" ")]]);
        assert_eq!(grid.last_non_empty(0), Some(2));
        assert_eq!(grid.last_non_empty(1), None);
    }
}
