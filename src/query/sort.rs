use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::filter::{Column, ColumnKind};
use crate::models::Application;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: Column,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(column: Column) -> Self {
        Self {
            column,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: Column) -> Self {
        Self {
            column,
            direction: SortDirection::Desc,
        }
    }
}

/// Case-folded comparison with a raw tie break, so "apple" and "Apple" sort
/// together but still have a total order.
pub fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

pub fn compare(a: &Application, b: &Application, column: Column) -> Ordering {
    match column.kind() {
        ColumnKind::Date => a.date_applied.timestamp_millis().cmp(&b.date_applied.timestamp_millis()),
        ColumnKind::Text => match column {
            Column::Company => compare_text(&a.company.name, &b.company.name),
            Column::Position => compare_text(&a.position, &b.position),
            Column::Location => compare_text(&a.location, &b.location),
            Column::Salary => compare_text(&a.salary, &b.salary),
            Column::Notes => compare_text(&a.notes, &b.notes),
            other => compare_text(&other.display(a), &other.display(b)),
        },
    }
}

/// Stable sort of `view` (indices into `items`).
pub fn sort(items: &[Application], view: &mut [usize], spec: SortSpec) {
    view.sort_by(|&i, &j| {
        let ordering = compare(&items[i], &items[j], spec.column);
        match spec.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewApplication;
    use crate::repository::Entity;
    use chrono::{Duration, Utc};

    fn items() -> Vec<Application> {
        let now = Utc::now();
        [("Zeta", "beta co", 3), ("alpha", "Alpha Inc", 1), ("Mid", "gamma", 2)]
            .into_iter()
            .enumerate()
            .map(|(i, (position, company, days))| {
                let mut new = NewApplication::new(position, company);
                new.date_applied = now - Duration::days(days);
                Application::from_new(format!("app-{i}"), new)
            })
            .collect()
    }

    #[test]
    fn text_sort_ignores_case() {
        let items = items();
        let mut view = vec![0, 1, 2];
        sort(&items, &mut view, SortSpec::asc(Column::Position));
        assert_eq!(view, vec![1, 2, 0]);
    }

    #[test]
    fn company_sort_reads_embedded_snapshot() {
        let items = items();
        let mut view = vec![0, 1, 2];
        sort(&items, &mut view, SortSpec::asc(Column::Company));
        assert_eq!(view, vec![1, 0, 2]);
    }

    #[test]
    fn dates_sort_chronologically() {
        let items = items();
        let mut view = vec![0, 1, 2];
        sort(&items, &mut view, SortSpec::asc(Column::DateApplied));
        assert_eq!(view, vec![0, 2, 1]);
    }

    #[test]
    fn descending_reverses_unique_keys() {
        let items = items();
        for column in [Column::Position, Column::Company, Column::DateApplied] {
            let mut asc = vec![0, 1, 2];
            let mut desc = vec![0, 1, 2];
            sort(&items, &mut asc, SortSpec::asc(column));
            sort(&items, &mut desc, SortSpec::desc(column));
            asc.reverse();
            assert_eq!(asc, desc, "column {column}");
        }
    }

    #[test]
    fn equal_keys_keep_collection_order() {
        let mut items = items();
        for app in &mut items {
            app.location = "Remote".into();
        }
        let mut view = vec![0, 1, 2];
        sort(&items, &mut view, SortSpec::desc(Column::Location));
        assert_eq!(view, vec![0, 1, 2]);
    }
}
