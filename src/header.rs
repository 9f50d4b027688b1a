use crate::dialect::{detect_header_set, HeaderSet};
use crate::models::{Cell, Grid};
use crate::normalize::{is_numeric_cell, parse_amount_str};

pub const HEADER_SCAN_ROWS: usize = 10;

const FILL_RATIO_MIN: f64 = 0.5;
const TEXT_RATIO_MIN: f64 = 0.7;
const NUMERIC_FOLLOW_MIN: f64 = 0.5;

const SCORE_FILLED: u32 = 20;
const SCORE_PER_KEYWORD: u32 = 15;
const SCORE_TEXT_ROW: u32 = 25;
const SCORE_PATTERN_CHANGE: u32 = 30;
const SCORE_BLANK_ABOVE: u32 = 10;
const SCORE_CLEAN_PUNCTUATION: u32 = 5;

const DEFAULT_CONFIDENCE: u32 = 30;

/// Header vocabulary: date, amount, total, product, order, shipping, type and sales terms.
pub(crate) const HEADER_KEYWORDS: &[&str] = &[
    "날짜", "일자", "일시", "기간", "금액", "매출", "합계", "총액", "상품", "주문", "배송",
    "구분", "유형", "판매", "결제", "정산", "과세", "면세", "수량", "단가",
    "date", "amount", "total", "product", "order", "shipping", "delivery", "type", "sales",
    "price", "item", "qty",
];

const DATA_PUNCTUATION: &[char] = &[
    '!', '@', '#', '$', '%', '^', '&', '*', '=', '+', '|', ';', ':', '<', '>', '?', ',', '₩', '"',
];

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCandidate {
    pub row: usize,
    pub score: u32,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderDetection {
    pub header_row: usize,
    pub confidence: u32,
    pub reasons: Vec<String>,
    pub candidates: Vec<HeaderCandidate>,
    pub header_set: HeaderSet,
}

impl HeaderDetection {
    pub fn is_multi_row(&self) -> bool {
        self.header_set.is_multi_row()
    }

    pub fn header_rows(&self) -> Vec<usize> {
        self.header_set.rows()
    }
}

pub(crate) fn keyword_hits(text: &str) -> bool {
    let lower = text.to_lowercase();
    HEADER_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn is_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || ('\u{AC00}'..='\u{D7A3}').contains(&c) || ('\u{3131}'..='\u{318E}').contains(&c)
}

/// Text that is not a bare number, or that carries Korean/Latin letters.
pub(crate) fn is_text_like(cell: &Cell) -> bool {
    match cell {
        Cell::Text(s) => {
            let t = s.trim();
            !t.is_empty() && (parse_amount_str(t).is_none() || t.chars().any(is_letter))
        }
        _ => false,
    }
}

pub(crate) fn text_ratio(grid: &Grid, row: usize) -> f64 {
    let filled: Vec<&Cell> = grid.row(row).iter().filter(|c| !c.is_empty()).collect();
    if filled.is_empty() {
        return 0.0;
    }
    filled.iter().filter(|c| is_text_like(c)).count() as f64 / filled.len() as f64
}

pub(crate) fn numeric_ratio(grid: &Grid, row: usize) -> f64 {
    let filled: Vec<&Cell> = grid.row(row).iter().filter(|c| !c.is_empty()).collect();
    if filled.is_empty() {
        return 0.0;
    }
    filled.iter().filter(|c| is_numeric_cell(c)).count() as f64 / filled.len() as f64
}

fn scan_width(grid: &Grid, scan_rows: usize) -> usize {
    (0..scan_rows.min(grid.height()))
        .filter_map(|r| grid.last_non_empty(r))
        .map(|c| c + 1)
        .max()
        .unwrap_or(0)
}

fn score_row(grid: &Grid, row: usize, width: usize) -> HeaderCandidate {
    let mut score = 0;
    let mut reasons = Vec::new();
    let cells = grid.row(row);
    let filled = grid.non_empty_count(row);

    let fill_ratio = if width == 0 { 0.0 } else { filled as f64 / width as f64 };
    if fill_ratio > FILL_RATIO_MIN {
        score += SCORE_FILLED;
        reasons.push(format!("{filled}/{width} cells filled"));
    }

    let keywords = cells
        .iter()
        .filter(|c| !c.is_empty() && keyword_hits(&c.display()))
        .count() as u32;
    if keywords > 0 {
        score += SCORE_PER_KEYWORD * keywords;
        reasons.push(format!("{keywords} header keyword(s)"));
    }

    let text_row = text_ratio(grid, row) > TEXT_RATIO_MIN;
    if text_row {
        score += SCORE_TEXT_ROW;
        reasons.push("mostly text".to_string());
    }

    if text_row && numeric_ratio(grid, row + 1) > NUMERIC_FOLLOW_MIN {
        score += SCORE_PATTERN_CHANGE;
        reasons.push("numeric row follows".to_string());
    }

    if row == 0 || grid.is_row_empty(row - 1) {
        score += SCORE_BLANK_ABOVE;
        reasons.push("nothing above".to_string());
    }

    let punctuated = cells
        .iter()
        .any(|c| c.display().contains(DATA_PUNCTUATION));
    if !punctuated {
        score += SCORE_CLEAN_PUNCTUATION;
        reasons.push("no data punctuation".to_string());
    }

    HeaderCandidate { row, score, reasons }
}

/// Score the first `scan_rows` non-empty rows, best first. Ties keep the lower row.
pub fn rank_header_candidates(grid: &Grid, scan_rows: usize) -> Vec<HeaderCandidate> {
    let width = scan_width(grid, scan_rows);
    let mut candidates: Vec<HeaderCandidate> = (0..scan_rows.min(grid.height()))
        .filter(|&r| !grid.is_row_empty(r))
        .map(|r| score_row(grid, r, width))
        .collect();
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates
}

pub fn detect_header_row(grid: &Grid, sheet_hint: Option<&str>) -> HeaderDetection {
    detect_header_row_within(grid, sheet_hint, HEADER_SCAN_ROWS)
}

pub fn detect_header_row_within(grid: &Grid, sheet_hint: Option<&str>, scan_rows: usize) -> HeaderDetection {
    let candidates = rank_header_candidates(grid, scan_rows);
    let (header_row, confidence, reasons) = match candidates.first() {
        Some(best) if best.score > 0 => (best.row, best.score.min(100), best.reasons.clone()),
        _ => (
            0,
            DEFAULT_CONFIDENCE,
            vec!["no header-like row found, defaulting to row 0".to_string()],
        ),
    };
    let header_set = detect_header_set(grid, header_row);
    tracing::debug!(
        sheet = sheet_hint.unwrap_or("-"),
        header_row,
        confidence,
        header_set = ?header_set,
        "header detected"
    );
    HeaderDetection {
        header_row,
        confidence,
        reasons,
        candidates,
        header_set,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Cell {
        Cell::text(s)
    }

    fn n(v: f64) -> Cell {
        Cell::Number(v)
    }

    #[test]
    fn test_plain_header_first_row() {
        let grid = Grid::new(vec![
            vec![t("Order No"), t("Order Date"), t("Amount"), t("Tax Type")],
            vec![n(1.0), n(45306.0), n(12000.0), t("과세")],
            vec![n(2.0), n(45307.0), n(3000.0), t("면세")],
        ]);
        let det = detect_header_row(&grid, None);
        assert_eq!(det.header_row, 0);
        assert!(det.confidence >= 80, "confidence {}", det.confidence);
        assert!(!det.is_multi_row());
    }

    #[test]
    fn test_header_without_keywords_still_confident() {
        let grid = Grid::new(vec![
            vec![t("alpha"), t("beta"), t("gamma")],
            vec![n(1.0), n(2.0), n(3.0)],
        ]);
        let det = detect_header_row(&grid, Some("Sheet1"));
        assert_eq!(det.header_row, 0);
        assert!(det.confidence >= 80, "confidence {}", det.confidence);
    }

    #[test]
    fn test_header_after_title_rows() {
        let grid = Grid::new(vec![
            vec![t("2024년 03월 판매 내역")],
            vec![],
            vec![t("조회기간: 2024-03-01 ~ 2024-03-31")],
            vec![],
            vec![t("주문번호"), t("주문일자"), t("상품명"), t("결제금액")],
            vec![n(1001.0), t("2024-03-02"), t("사과"), n(15000.0)],
            vec![n(1002.0), t("2024-03-05"), t("배"), n(22000.0)],
        ]);
        let det = detect_header_row(&grid, None);
        assert_eq!(det.header_row, 4);
    }

    #[test]
    fn test_header_directly_below_title() {
        let grid = Grid::new(vec![
            vec![t("정산 보고서")],
            vec![t("col a"), t("col b"), t("col c")],
            vec![n(1.0), n(2.0), n(3.0)],
        ]);
        assert_eq!(detect_header_row(&grid, None).header_row, 1);
    }

    #[test]
    fn test_blank_grid_defaults_to_row_zero() {
        let grid = Grid::new(vec![vec![], vec![]]);
        let det = detect_header_row(&grid, None);
        assert_eq!(det.header_row, 0);
        assert_eq!(det.confidence, 30);
        assert!(det.candidates.is_empty());
    }

    #[test]
    fn test_confidence_is_capped() {
        let grid = Grid::new(vec![
            vec![t("주문일자"), t("상품명"), t("결제금액"), t("과세구분"), t("배송비")],
            vec![t("2024-01-01"), n(1.0), n(2.0), n(3.0), n(4.0)],
        ]);
        let det = detect_header_row(&grid, None);
        assert_eq!(det.confidence, 100);
        assert!(det.candidates[0].score > 100);
    }

    #[test]
    fn test_ties_keep_lower_row() {
        let grid = Grid::new(vec![vec![t("x")], vec![], vec![t("y")]]);
        let ranked = rank_header_candidates(&grid, 10);
        assert_eq!(ranked[0].score, ranked[1].score);
        assert_eq!(ranked[0].row, 0);
    }

    #[test]
    fn test_scan_width_stays_inside_window() {
        let grid = Grid::new(vec![
            vec![t("정산내역")],
            vec![t("주문일자"), t("면세"), t("과세")],
            vec![t("2024-01-02"), n(1.0), n(2.0), n(3.0), n(4.0), n(5.0)],
        ]);
        assert_eq!(scan_width(&grid, 2), 3);
        assert_eq!(scan_width(&grid, 10), 6);
    }

    #[test]
    fn test_text_like_rules() {
        assert!(is_text_like(&t("상품명")));
        assert!(is_text_like(&t("1000원")));
        assert!(!is_text_like(&t("1,000")));
        assert!(!is_text_like(&n(5.0)));
    }
}
