use std::collections::HashSet;

use crate::header::{keyword_hits, numeric_ratio, text_ratio};
use crate::models::{Cell, Grid};
use crate::normalize::{parse_date_str, DateContext};

// ---------------------------------------------------------------------------
// Vocabulary
// ---------------------------------------------------------------------------

/// Sub-header labels that almost always sit under a merged parent.
const STRONG_SUBHEADERS: &[&str] = &[
    "면세금액", "과세금액", "결제금액", "면세매출", "과세매출", "비과세금액",
    "tax-exemptamount", "taxexemptamount", "taxableamount", "paymentamount", "taxfreeamount",
];

/// Labels that name the tax/exempt split.
const TAX_TYPE_TOKENS: &[&str] = &["면세", "과세", "비과세", "영세", "tax", "free", "exempt"];

/// Parent labels: order, coupon, settlement and payment-method groups.
const CATEGORY_TOKENS: &[&str] = &[
    "주문", "쿠폰", "정산", "결제", "할인", "포인트", "결제수단",
    "order", "coupon", "settlement", "payment",
];

const DATE_TOKENS: &[&str] = &["일자", "날짜", "일시", "date"];

const SEPARATORS: &[char] = &['>', '|', '/'];

const INDICATOR_COLUMNS: usize = 20;
const MAX_INDICATOR_WEIGHT: f64 = 3.0;

const STRONG_RATIO_MIN: f64 = 0.3;
const STRONG_HITS_MIN: usize = 2;
const MERGED_RATIO_MIN: f64 = 0.4;
const MERGED_RAW_HITS_MIN: usize = 2;
const KEYWORD_DENSITY_MIN: f64 = 0.2;
const KEYWORD_RAW_HITS_MIN: usize = 1;

const REPEATING_MIN_CATEGORIES: usize = 2;
const REPEATING_MIN_SUBTYPES: usize = 3;

const FLAT_CHILD_COMPLETENESS: f64 = 0.6;
const FLAT_PARENT_TAX_RATIO: f64 = 0.5;

/// A combined header naming more date columns than this is assumed to have
/// spread a date parent over unrelated children and is rebuilt child-first.
pub const DATE_COLUMN_LIMIT: usize = 2;

fn squash(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn contains_any(text: &str, tokens: &[&str]) -> bool {
    let s = squash(text);
    !s.is_empty() && tokens.iter().any(|t| s.contains(t))
}

fn is_tax_type_label(text: &str) -> bool {
    contains_any(text, TAX_TYPE_TOKENS)
}

fn is_category_label(text: &str) -> bool {
    contains_any(text, CATEGORY_TOKENS)
}

fn is_date_label(text: &str) -> bool {
    contains_any(text, DATE_TOKENS)
}

fn cell_text(grid: &Grid, row: usize, col: usize) -> String {
    grid.get(row, col).display()
}

fn row_extent(grid: &Grid, rows: &[usize]) -> usize {
    rows.iter()
        .filter_map(|&r| grid.last_non_empty(r))
        .map(|c| c + 1)
        .max()
        .unwrap_or(0)
}

/// Numbers or date strings below a header mean the header ended.
fn looks_like_data_row(grid: &Grid, row: usize) -> bool {
    if numeric_ratio(grid, row) > 0.5 {
        return true;
    }
    let ctx = DateContext::default();
    grid.row(row).iter().any(|cell| match cell {
        Cell::Date(_) => true,
        Cell::Text(s) => parse_date_str(s, &ctx).is_ok(),
        _ => false,
    })
}

/// A row that can act as the upper half of a two-row header.
fn is_parent_row(grid: &Grid, row: usize) -> bool {
    let distinct: HashSet<String> = grid
        .row(row)
        .iter()
        .filter(|c| !c.is_empty())
        .map(Cell::display)
        .collect();
    distinct.len() >= 2 && text_ratio(grid, row) > 0.7 && !looks_like_data_row(grid, row)
}

// ---------------------------------------------------------------------------
// Header sets and dialects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderDialect {
    /// Category labels above a row of repeating tax/exempt subtypes.
    RepeatingSubtype,
    /// Horizontally merged parents over child labels.
    MergedParentChild,
    /// Two stacked header rows flagged by sub-header keywords.
    SimpleTwoRow,
}

/// Dialects in the order they are tried.
const ALL_DIALECTS: &[HeaderDialect] = &[
    HeaderDialect::RepeatingSubtype,
    HeaderDialect::MergedParentChild,
    HeaderDialect::SimpleTwoRow,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderSet {
    Single(usize),
    Multi {
        dialect: HeaderDialect,
        primary: usize,
        parent: usize,
        child: usize,
        confidence: u32,
    },
}

impl HeaderSet {
    pub fn primary(&self) -> usize {
        match self {
            Self::Single(row) => *row,
            Self::Multi { primary, .. } => *primary,
        }
    }

    pub fn rows(&self) -> Vec<usize> {
        match self {
            Self::Single(row) => vec![*row],
            Self::Multi { parent, child, .. } => vec![*parent, *child],
        }
    }

    pub fn is_multi_row(&self) -> bool {
        matches!(self, Self::Multi { .. })
    }

    /// Last header row; data starts below it.
    pub fn last_row(&self) -> usize {
        self.rows().into_iter().max().unwrap_or(0)
    }

    pub fn dialect(&self) -> Option<HeaderDialect> {
        match self {
            Self::Single(_) => None,
            Self::Multi { dialect, .. } => Some(*dialect),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Indicators {
    columns: usize,
    merged_pairs: usize,
    strong_hits: usize,
    keyword_hits: usize,
    separator_hits: usize,
}

impl Indicators {
    fn measure(grid: &Grid, parent: usize, child: usize) -> Self {
        let mut ind = Self::default();
        let width = row_extent(grid, &[parent, child]).min(INDICATOR_COLUMNS);
        for c in 0..width {
            let p = cell_text(grid, parent, c);
            let ch = cell_text(grid, child, c);
            if p.is_empty() && ch.is_empty() {
                continue;
            }
            ind.columns += 1;
            if !p.is_empty() && (ch.is_empty() || ch == p) {
                ind.merged_pairs += 1;
            }
            if !ch.is_empty() && ch != p {
                if STRONG_SUBHEADERS.iter().any(|k| squash(&ch).contains(k)) {
                    ind.strong_hits += 1;
                } else if keyword_hits(&ch) {
                    ind.keyword_hits += 1;
                }
            }
            if p.contains(SEPARATORS) || ch.contains(SEPARATORS) {
                ind.separator_hits += 1;
            }
        }
        ind
    }

    fn raw_hits(&self) -> usize {
        self.merged_pairs + self.strong_hits + self.keyword_hits + self.separator_hits
    }

    fn ratio(&self, n: usize) -> f64 {
        if self.columns == 0 {
            0.0
        } else {
            n as f64 / self.columns as f64
        }
    }

    fn indicator_ratio(&self) -> f64 {
        if self.columns == 0 {
            return 0.0;
        }
        let weighted = 2 * self.merged_pairs + 3 * self.strong_hits + self.keyword_hits + self.separator_hits;
        weighted as f64 / (self.columns as f64 * MAX_INDICATOR_WEIGHT)
    }

    fn merged_ratio(&self) -> f64 {
        self.ratio(self.merged_pairs)
    }

    fn keyword_density(&self) -> f64 {
        self.ratio(self.strong_hits + self.keyword_hits)
    }
}

fn confidence_from(ratio: f64) -> u32 {
    ((ratio * 100.0).round() as u32).clamp(1, 100)
}

/// Rows that could pair with `primary` as (parent, child).
fn generic_pair(grid: &Grid, primary: usize) -> Option<(usize, usize)> {
    let below = primary + 1;
    if below < grid.height() && !grid.is_row_empty(below) && !looks_like_data_row(grid, below) {
        return Some((primary, below));
    }
    if primary > 0 && is_parent_row(grid, primary - 1) {
        return Some((primary - 1, primary));
    }
    None
}

fn subtype_labels(grid: &Grid, row: usize) -> (usize, bool) {
    let labels: Vec<String> = grid
        .row(row)
        .iter()
        .map(Cell::display)
        .filter(|t| is_tax_type_label(t))
        .collect();
    let distinct: HashSet<&String> = labels.iter().collect();
    (labels.len(), distinct.len() < labels.len())
}

fn category_labels(grid: &Grid, row: usize) -> usize {
    grid.row(row)
        .iter()
        .map(Cell::display)
        .filter(|t| is_category_label(t))
        .count()
}

fn repeating_subtype(grid: &Grid, categories: usize, subtypes: usize) -> Option<u32> {
    let cats = category_labels(grid, categories);
    let (subs, repeats) = subtype_labels(grid, subtypes);
    if cats >= REPEATING_MIN_CATEGORIES && subs >= REPEATING_MIN_SUBTYPES && repeats {
        Some((50 + 10 * subs as u32).min(100))
    } else {
        None
    }
}

impl HeaderDialect {
    pub fn key(&self) -> &'static str {
        match self {
            Self::RepeatingSubtype => "repeating_subtype",
            Self::MergedParentChild => "merged_parent_child",
            Self::SimpleTwoRow => "simple_two_row",
        }
    }

    pub fn detect(&self, grid: &Grid, primary: usize) -> Option<HeaderSet> {
        let (parent, child, confidence) = match self {
            Self::RepeatingSubtype => {
                let above = primary.checked_sub(1);
                let below = primary + 1;
                if let Some(c) = above.and_then(|a| repeating_subtype(grid, a, primary)) {
                    (primary - 1, primary, c)
                } else if below < grid.height() {
                    let c = repeating_subtype(grid, primary, below)?;
                    (primary, below, c)
                } else {
                    return None;
                }
            }
            Self::MergedParentChild => {
                let (parent, child) = generic_pair(grid, primary)?;
                let ind = Indicators::measure(grid, parent, child);
                if ind.merged_ratio() > MERGED_RATIO_MIN && ind.raw_hits() > MERGED_RAW_HITS_MIN {
                    (parent, child, confidence_from(ind.merged_ratio()))
                } else {
                    return None;
                }
            }
            Self::SimpleTwoRow => {
                let (parent, child) = generic_pair(grid, primary)?;
                let ind = Indicators::measure(grid, parent, child);
                let strong = ind.indicator_ratio() > STRONG_RATIO_MIN && ind.strong_hits >= STRONG_HITS_MIN;
                let dense = ind.keyword_density() > KEYWORD_DENSITY_MIN && ind.raw_hits() > KEYWORD_RAW_HITS_MIN;
                if strong || dense {
                    (parent, child, confidence_from(ind.indicator_ratio().max(ind.keyword_density())))
                } else {
                    return None;
                }
            }
        };
        Some(HeaderSet::Multi {
            dialect: *self,
            primary,
            parent,
            child,
            confidence,
        })
    }
}

/// Decide whether the header at `primary` spans two rows.
pub fn detect_header_set(grid: &Grid, primary: usize) -> HeaderSet {
    ALL_DIALECTS
        .iter()
        .find_map(|d| d.detect(grid, primary))
        .unwrap_or(HeaderSet::Single(primary))
}

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderColumn {
    pub index: usize,
    pub name: String,
}

fn dedupe(columns: Vec<HeaderColumn>) -> Vec<HeaderColumn> {
    let mut seen = HashSet::new();
    columns
        .into_iter()
        .filter(|c| seen.insert(c.name.clone()))
        .collect()
}

/// Column names from a single header row; blank columns are dropped.
pub fn single_row_columns(grid: &Grid, row: usize) -> Vec<HeaderColumn> {
    let extent = grid.last_non_empty(row).map_or(0, |c| c + 1);
    let columns = (0..extent)
        .filter_map(|c| {
            let name = cell_text(grid, row, c);
            (!name.is_empty()).then_some(HeaderColumn { index: c, name })
        })
        .collect();
    dedupe(columns)
}

fn completeness(grid: &Grid, row: usize, extent: usize) -> f64 {
    if extent == 0 {
        return 0.0;
    }
    (0..extent).filter(|&c| !grid.get(row, c).is_empty()).count() as f64 / extent as f64
}

/// Two complete rows with no merge gaps are a flat layout, not parent/child.
fn is_flat_layout(raw: &Grid, parent: usize, child: usize) -> bool {
    let extent = row_extent(raw, &[parent, child]);
    if extent == 0 {
        return false;
    }
    let parent_tax = raw
        .row(parent)
        .iter()
        .filter(|c| is_tax_type_label(&c.display()))
        .count() as f64;
    let gaps = (0..extent).any(|c| raw.get(parent, c).is_empty() && !raw.get(child, c).is_empty());
    completeness(raw, child, extent) >= FLAT_CHILD_COMPLETENESS
        && parent_tax < FLAT_PARENT_TAX_RATIO * extent as f64
        && !gaps
}

fn nearest_left_parent(grid: &Grid, parent: usize, col: usize) -> Option<String> {
    (0..col)
        .rev()
        .map(|c| cell_text(grid, parent, c))
        .find(|t| !t.is_empty())
}

/// Join two header rows column by column as "parent > child".
pub fn combine_multi_row_headers(grid: &Grid, parent: usize, child: usize) -> Vec<HeaderColumn> {
    let extent = row_extent(grid, &[parent, child]);
    let mut columns = Vec::new();
    for c in 0..extent {
        let mut upper = cell_text(grid, parent, c);
        let lower = cell_text(grid, child, c);
        if upper.is_empty() && !lower.is_empty() && is_tax_type_label(&lower) {
            if let Some(left) = nearest_left_parent(grid, parent, c) {
                if is_category_label(&left) {
                    upper = left;
                }
            }
        }
        let name = match (upper.is_empty(), lower.is_empty()) {
            (false, false) if upper == lower => upper,
            (false, false) => format!("{upper} > {lower}"),
            (false, true) => upper,
            (true, false) => lower,
            (true, true) => continue,
        };
        columns.push(HeaderColumn { index: c, name });
    }
    dedupe(columns)
}

/// Child label where present, parent otherwise.
fn child_first_columns(grid: &Grid, parent: usize, child: usize) -> Vec<HeaderColumn> {
    let extent = row_extent(grid, &[parent, child]);
    let columns = (0..extent)
        .filter_map(|c| {
            let lower = cell_text(grid, child, c);
            let name = if lower.is_empty() { cell_text(grid, parent, c) } else { lower };
            (!name.is_empty()).then_some(HeaderColumn { index: c, name })
        })
        .collect();
    dedupe(columns)
}

/// Build the ordered, de-duplicated column list for a header set.
///
/// `raw` is the sheet as loaded; `resolved` has merges filled in.
pub fn header_columns(raw: &Grid, resolved: &Grid, set: &HeaderSet) -> Vec<HeaderColumn> {
    let HeaderSet::Multi {
        dialect,
        primary,
        parent,
        child,
        ..
    } = set
    else {
        return single_row_columns(resolved, set.primary());
    };

    if *dialect == HeaderDialect::SimpleTwoRow && is_flat_layout(raw, *parent, *child) {
        let extent = row_extent(raw, &[*parent, *child]);
        let other = if *primary == *parent { *child } else { *parent };
        let source = if completeness(raw, other, extent) > completeness(raw, *primary, extent) {
            other
        } else {
            *primary
        };
        tracing::debug!(row = source, "flat two-row header, using one row");
        return single_row_columns(resolved, source);
    }

    let combined = combine_multi_row_headers(resolved, *parent, *child);
    let date_columns = combined.iter().filter(|c| is_date_label(&c.name)).count();
    if date_columns > DATE_COLUMN_LIMIT {
        tracing::debug!(date_columns, "implausible date mappings, rebuilding header child-first");
        return child_first_columns(resolved, *parent, *child);
    }
    combined
}
