use once_cell::sync::Lazy;
use regex::Regex;

use crate::dialect::HeaderColumn;
use crate::error::{MalltaxError, Result};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static TOKEN_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s>/|()\[\]_\-:·]+").unwrap());

/// Newlines to spaces, collapse whitespace, trim, lowercase.
pub fn normalize_column_name(name: &str) -> String {
    let flat = name.replace(['\r', '\n'], " ");
    WHITESPACE.replace_all(flat.trim(), " ").to_lowercase()
}

fn tokens(name: &str) -> Vec<String> {
    TOKEN_SPLIT
        .split(&normalize_column_name(name))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Matcher strategies, tried in order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnMatcher {
    Exact,
    Normalized,
    /// Exported headers like "결제금액 > 면세(원)" configured as "면세 결제금액".
    TokenPattern,
}

const ALL_MATCHERS: &[ColumnMatcher] = &[
    ColumnMatcher::Exact,
    ColumnMatcher::Normalized,
    ColumnMatcher::TokenPattern,
];

impl ColumnMatcher {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Normalized => "normalized",
            Self::TokenPattern => "token_pattern",
        }
    }

    pub fn find(&self, wanted: &str, columns: &[HeaderColumn]) -> Option<usize> {
        match self {
            Self::Exact => columns.iter().find(|c| c.name == wanted).map(|c| c.index),
            Self::Normalized => {
                let want = normalize_column_name(wanted);
                columns
                    .iter()
                    .find(|c| normalize_column_name(&c.name) == want)
                    .map(|c| c.index)
            }
            Self::TokenPattern => {
                let want = tokens(wanted);
                if want.is_empty() {
                    return None;
                }
                columns
                    .iter()
                    .filter_map(|c| token_match_cost(&want, &c.name).map(|cost| (cost, c.index)))
                    .min_by_key(|&(cost, _)| cost)
                    .map(|(_, index)| index)
            }
        }
    }
}

/// Characters `name` carries beyond the wanted tokens, or `None` unless every
/// wanted token starts some token of `name`. "과세금액" never matches inside
/// "비과세금액".
fn token_match_cost(want: &[String], name: &str) -> Option<usize> {
    let have = tokens(name);
    let want_len: usize = want.iter().map(|t| t.chars().count()).sum();
    let have_len: usize = have.iter().map(|t| t.chars().count()).sum();
    if have.concat() == want.concat() {
        return Some(0);
    }
    want.iter()
        .all(|w| have.iter().any(|h| h.starts_with(w.as_str())))
        .then(|| have_len.saturating_sub(want_len))
}

/// Resolve one configured name to a column index, first matcher wins.
pub fn find_column(wanted: &str, columns: &[HeaderColumn]) -> Option<usize> {
    ALL_MATCHERS.iter().find_map(|m| {
        let hit = m.find(wanted, columns);
        if hit.is_some() && *m != ColumnMatcher::Exact {
            tracing::debug!(column = wanted, matcher = m.key(), "column matched loosely");
        }
        hit
    })
}

/// Resolve every configured name; fails listing all names that did not match.
pub fn resolve_columns(wanted: &[&str], columns: &[HeaderColumn]) -> Result<Vec<usize>> {
    let mut found = Vec::with_capacity(wanted.len());
    let mut missing = Vec::new();
    for name in wanted {
        match find_column(name, columns) {
            Some(idx) => found.push(idx),
            None => missing.push(name.to_string()),
        }
    }
    if missing.is_empty() {
        Ok(found)
    } else {
        Err(MalltaxError::MissingColumns {
            missing,
            available: columns.iter().map(|c| c.name.clone()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<HeaderColumn> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| HeaderColumn {
                index: i * 2,
                name: n.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(normalize_column_name("  결제\n금액  "), "결제 금액");
        assert_eq!(normalize_column_name("Order   Date"), "order date");
    }

    #[test]
    fn test_exact_match_first() {
        let columns = cols(&["주문일자", "주문 일자"]);
        assert_eq!(find_column("주문 일자", &columns), Some(2));
    }

    #[test]
    fn test_normalized_match() {
        let columns = cols(&["Order\nDate", "Amount"]);
        assert_eq!(find_column("order date", &columns), Some(0));
        assert_eq!(ColumnMatcher::Exact.find("order date", &columns), None);
    }

    #[test]
    fn test_token_pattern_match() {
        let columns = cols(&["주문일자", "결제금액 > 면세(원)", "결제금액 > 과세(원)"]);
        assert_eq!(find_column("면세 결제금액", &columns), Some(2));
        assert_eq!(find_column("과세", &columns), Some(4));
    }

    #[test]
    fn test_token_pattern_skips_negated_bucket() {
        let columns = cols(&["주문일자", "결제금액 > 비과세금액", "결제금액 > 과세금액"]);
        assert_eq!(find_column("과세금액", &columns), Some(4));
        assert_eq!(find_column("비과세금액", &columns), Some(2));
    }

    #[test]
    fn test_token_pattern_prefers_least_extra_text() {
        let columns = cols(&["과세구분코드", "과세구분", "결제 금액"]);
        assert_eq!(find_column("과세", &columns), Some(2));
        assert_eq!(find_column("결제금액", &columns), Some(4));
        assert_eq!(find_column("면세", &columns), None);
    }

    #[test]
    fn test_missing_columns_are_all_listed() {
        let columns = cols(&["주문일자", "금액"]);
        let err = resolve_columns(&["주문일자", "면세", "과세"], &columns).unwrap_err();
        match err {
            MalltaxError::MissingColumns { missing, available } => {
                assert_eq!(missing, vec!["면세", "과세"]);
                assert_eq!(available, vec!["주문일자", "금액"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolve_columns_keeps_order() {
        let columns = cols(&["a", "b", "c"]);
        assert_eq!(resolve_columns(&["c", "a"], &columns).unwrap(), vec![4, 0]);
    }
}
