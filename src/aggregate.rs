use std::collections::BTreeMap;

use crate::models::{CalculationResult, MonthlyRecord, MonthlyTotal, YearlyTotal};

/// Group records by (year, month), ascending, and roll them up into a yearly total.
pub fn calculate_totals(mall_name: &str, records: &[MonthlyRecord]) -> CalculationResult {
    let mut months: BTreeMap<(i32, u32), (f64, f64)> = BTreeMap::new();
    for r in records {
        let entry = months.entry((r.year, r.month)).or_insert((0.0, 0.0));
        entry.0 += r.tax_exempt;
        entry.1 += r.taxable;
    }

    let monthly_totals: Vec<MonthlyTotal> = months
        .into_iter()
        .map(|((year, month), (tax_exempt, taxable))| MonthlyTotal {
            year,
            month,
            tax_exempt,
            taxable,
            total: tax_exempt + taxable,
        })
        .collect();

    let yearly_total = monthly_totals.iter().fold(YearlyTotal::default(), |acc, m| YearlyTotal {
        tax_exempt: acc.tax_exempt + m.tax_exempt,
        taxable: acc.taxable + m.taxable,
        total: acc.total + m.total,
    });

    CalculationResult {
        mall_name: mall_name.to_string(),
        monthly_totals,
        yearly_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(year: i32, month: u32, tax_exempt: f64, taxable: f64) -> MonthlyRecord {
        MonthlyRecord {
            year,
            month,
            tax_exempt,
            taxable,
        }
    }

    #[test]
    fn test_groups_and_sorts_months() {
        let records = vec![
            rec(2024, 2, 100.0, 10.0),
            rec(2023, 12, 5.0, 0.0),
            rec(2024, 1, 1000.0, 500.0),
            rec(2024, 2, 50.0, 40.0),
        ];
        let result = calculate_totals("쿠팡", &records);
        assert_eq!(result.mall_name, "쿠팡");
        let keys: Vec<(i32, u32)> = result.monthly_totals.iter().map(|m| (m.year, m.month)).collect();
        assert_eq!(keys, vec![(2023, 12), (2024, 1), (2024, 2)]);
        let feb = result.monthly_totals[2];
        assert_eq!(feb.tax_exempt, 150.0);
        assert_eq!(feb.taxable, 50.0);
        assert_eq!(feb.total, 200.0);
    }

    #[test]
    fn test_yearly_total_is_sum_of_months() {
        let records = vec![rec(2024, 1, 1000.0, 500.0), rec(2024, 1, 200.0, 0.0), rec(2024, 3, 0.0, 300.0)];
        let result = calculate_totals("mall", &records);
        assert_eq!(
            result.yearly_total,
            YearlyTotal {
                tax_exempt: 1200.0,
                taxable: 800.0,
                total: 2000.0
            }
        );
        let sum: f64 = result.monthly_totals.iter().map(|m| m.total).sum();
        assert_eq!(sum, result.yearly_total.total);
    }

    #[test]
    fn test_january_and_february_totals() {
        let records = vec![
            rec(2024, 2, 1_500_000.0, 750_000.0),
            rec(2024, 1, 1_000_000.0, 500_000.0),
            rec(2024, 1, 2_000_000.0, 1_000_000.0),
        ];
        let result = calculate_totals("mall", &records);
        assert_eq!(
            result.monthly_totals[0],
            MonthlyTotal {
                year: 2024,
                month: 1,
                tax_exempt: 3_000_000.0,
                taxable: 1_500_000.0,
                total: 4_500_000.0
            }
        );
        assert_eq!(result.monthly_totals[1].month, 2);
        assert_eq!(
            result.yearly_total,
            YearlyTotal {
                tax_exempt: 4_500_000.0,
                taxable: 2_250_000.0,
                total: 6_750_000.0
            }
        );
    }

    #[test]
    fn test_no_records() {
        let result = calculate_totals("empty", &[]);
        assert!(result.monthly_totals.is_empty());
        assert_eq!(result.yearly_total, YearlyTotal::default());
    }
}
