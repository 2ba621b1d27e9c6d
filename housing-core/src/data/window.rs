//! Year-range windowing and the canonical row order.

use serde::{Deserialize, Serialize};

use crate::domain::DatasetRow;

/// Inclusive `[from_year, to_year]` range applied before any modeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingWindow {
    pub from_year: i32,
    pub to_year: i32,
}

impl Default for TrainingWindow {
    fn default() -> Self {
        Self {
            from_year: 2010,
            to_year: 2025,
        }
    }
}

impl TrainingWindow {
    pub fn new(from_year: i32, to_year: i32) -> Self {
        Self { from_year, to_year }
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.from_year..=self.to_year).contains(&year)
    }

    /// Drop rows outside the window and put the rest in canonical order.
    pub fn apply(&self, rows: Vec<DatasetRow>) -> Vec<DatasetRow> {
        let mut kept: Vec<DatasetRow> = rows
            .into_iter()
            .filter(|row| self.contains(row.year()))
            .collect();
        canonical_sort(&mut kept);
        kept
    }
}

/// Sort ascending by (year, quarter, district_code).
///
/// Downstream fold boundaries are row positions in this order.
pub fn canonical_sort(rows: &mut [DatasetRow]) {
    rows.sort_by(|a, b| {
        a.time_key
            .cmp(&b.time_key)
            .then_with(|| a.district_code.cmp(&b.district_code))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TimeKey;

    fn row(code: &str, year: i32, quarter: u8) -> DatasetRow {
        DatasetRow {
            district_code: code.into(),
            time_key: TimeKey::new(year, quarter).unwrap(),
            price_per_sqm: 1.0,
            inflation_core_q: None,
        }
    }

    #[test]
    fn bounds_are_inclusive() {
        let window = TrainingWindow::new(2023, 2024);
        let rows = vec![
            row("a", 2022, 4),
            row("a", 2023, 1),
            row("a", 2024, 4),
            row("a", 2025, 1),
        ];
        let kept = window.apply(rows);
        let years: Vec<i32> = kept.iter().map(|r| r.year()).collect();
        assert_eq!(years, vec![2023, 2024]);
    }

    #[test]
    fn canonical_order_is_time_then_district() {
        let window = TrainingWindow::new(2000, 3000);
        let rows = vec![
            row("b", 2024, 1),
            row("a", 2024, 1),
            row("c", 2023, 4),
            row("a", 2023, 2),
        ];
        let kept = window.apply(rows);
        let order: Vec<(String, TimeKey)> = kept
            .iter()
            .map(|r| (r.district_code.clone(), r.time_key))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a".to_string(), TimeKey::new(2023, 2).unwrap()),
                ("c".to_string(), TimeKey::new(2023, 4).unwrap()),
                ("a".to_string(), TimeKey::new(2024, 1).unwrap()),
                ("b".to_string(), TimeKey::new(2024, 1).unwrap()),
            ]
        );
    }

    #[test]
    fn inverted_window_is_empty() {
        let window = TrainingWindow::new(2025, 2010);
        assert!(window.apply(vec![row("a", 2020, 1)]).is_empty());
    }
}
