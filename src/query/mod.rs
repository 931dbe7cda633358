//! Derived, filtered and sorted views over the application collection.
//!
//! The pure pieces (`matches`, `filter`, `sort`, `compute_stats`) take an
//! explicit `now`. [`QueryEngine`] wraps them with the UI-held state and the
//! debouncing of the volatile inputs.

mod debounce;
mod filter;
mod sort;
mod stats;

pub use debounce::Debouncer;
pub use filter::{
    filter, format_date, matches, Column, ColumnFilters, ColumnKind, Criteria, DateRange, QuickFilter, SalaryFilter,
    StageFilter,
};
pub use sort::{compare, compare_text, sort, SortDirection, SortSpec};
pub use stats::{compute_stats, Stats};

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::trace;

use crate::models::Application;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Holds a collection plus the search/filter/sort state and keeps the
/// filtered view and the aggregate stats current.
///
/// The view is recomputed whenever the collection, an applied filter or the
/// sort changes. Stats are recomputed only when the collection changes.
pub struct QueryEngine {
    items: Vec<Application>,
    search: Debouncer<String>,
    columns: Debouncer<ColumnFilters>,
    quick: QuickFilter,
    sort: Option<SortSpec>,
    view: Vec<usize>,
    stats: Stats,
    clock: fn() -> DateTime<Utc>,
}

impl QueryEngine {
    pub fn new(items: Vec<Application>, debounce: Duration) -> Self {
        Self::with_clock(items, debounce, Utc::now)
    }

    /// Engine whose notion of "now" comes from `clock`.
    pub fn with_clock(items: Vec<Application>, debounce: Duration, clock: fn() -> DateTime<Utc>) -> Self {
        let mut engine = Self {
            items: Vec::new(),
            search: Debouncer::new(debounce),
            columns: Debouncer::new(debounce),
            quick: QuickFilter::default(),
            sort: None,
            view: Vec::new(),
            stats: compute_stats(&[], clock()),
            clock,
        };
        engine.set_items(items);
        engine
    }

    /// Replace the collection; stats and view are rebuilt.
    pub fn set_items(&mut self, items: Vec<Application>) {
        self.items = items;
        self.stats = compute_stats(&self.items, (self.clock)());
        self.recompute();
    }

    /// Returns `true` if the view was recomputed right away (first value).
    pub fn set_search(&mut self, search: impl Into<String>, at: Instant) -> bool {
        let applied = self.search.push(search.into(), at);
        if applied {
            self.recompute();
        }
        applied
    }

    /// Set or, with an empty value, clear one column filter. Debounced like
    /// the search string.
    pub fn set_column_filter(&mut self, column: Column, value: &str, at: Instant) -> bool {
        let mut columns = self.columns.latest().cloned().unwrap_or_default();
        if value.trim().is_empty() {
            columns.remove(&column);
        } else {
            columns.insert(column, value.to_string());
        }
        let applied = self.columns.push(columns, at);
        if applied {
            self.recompute();
        }
        applied
    }

    pub fn set_quick_filter(&mut self, quick: QuickFilter) {
        self.quick = quick;
        self.recompute();
    }

    pub fn set_sort(&mut self, sort: Option<SortSpec>) {
        self.sort = sort;
        self.recompute();
    }

    /// Apply debounced inputs whose delay has elapsed. Returns whether the
    /// view changed.
    pub fn tick(&mut self, at: Instant) -> bool {
        let search = self.search.poll(at);
        let columns = self.columns.poll(at);
        if search || columns {
            self.recompute();
            return true;
        }
        false
    }

    /// Apply every pending input immediately.
    pub fn flush(&mut self) -> bool {
        let search = self.search.flush();
        let columns = self.columns.flush();
        if search || columns {
            self.recompute();
            return true;
        }
        false
    }

    /// When the next debounced input falls due, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.search.deadline(), self.columns.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn items(&self) -> &[Application] {
        &self.items
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// The search string currently applied to the view.
    pub fn search(&self) -> &str {
        self.search.value().map(String::as_str).unwrap_or("")
    }

    /// The search string most recently typed, applied or not.
    pub fn pending_search(&self) -> &str {
        self.search.latest().map(String::as_str).unwrap_or("")
    }

    pub fn column_filters(&self) -> ColumnFilters {
        self.columns.value().cloned().unwrap_or_default()
    }

    pub fn quick_filter(&self) -> QuickFilter {
        self.quick
    }

    pub fn sort_spec(&self) -> Option<SortSpec> {
        self.sort
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// The application at `position` in the filtered, sorted view.
    pub fn get(&self, position: usize) -> Option<&Application> {
        self.view.get(position).and_then(|&i| self.items.get(i))
    }

    pub fn filtered(&self) -> impl Iterator<Item = &Application> + '_ {
        self.view.iter().map(move |&i| &self.items[i])
    }

    pub fn filtered_items(&self) -> Vec<Application> {
        self.filtered().cloned().collect()
    }

    /// Position of the application with `id` in the current view.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.view.iter().position(|&i| self.items[i].id == id)
    }

    fn recompute(&mut self) {
        let empty = ColumnFilters::new();
        let criteria = Criteria {
            search: self.search.value().map(String::as_str).unwrap_or(""),
            columns: self.columns.value().unwrap_or(&empty),
            quick: &self.quick,
        };
        let mut view = filter(&self.items, &criteria, (self.clock)());
        if let Some(spec) = self.sort {
            sort(&self.items, &mut view, spec);
        }
        trace!(total = self.items.len(), visible = view.len(), "view recomputed");
        self.view = view;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewApplication, Stage};
    use crate::repository::Entity;

    fn app(id: &str, position: &str, company: &str, stage: Stage) -> Application {
        let mut new = NewApplication::new(position, company);
        new.stage = stage;
        Application::from_new(id.to_string(), new)
    }

    fn items() -> Vec<Application> {
        vec![
            app("1", "Rust Engineer", "Acme", Stage::Applied),
            app("2", "Go Engineer", "Globex", Stage::Interview),
            app("3", "Designer", "Initech", Stage::Offer),
        ]
    }

    #[test]
    fn first_search_applies_then_burst_debounces() {
        let mut engine = QueryEngine::new(items(), DEFAULT_DEBOUNCE);
        let t0 = Instant::now();

        assert!(engine.set_search("engineer", t0));
        assert_eq!(engine.len(), 2);

        assert!(!engine.set_search("r", t0 + Duration::from_millis(10)));
        assert!(!engine.set_search("ru", t0 + Duration::from_millis(20)));
        assert!(!engine.set_search("rust", t0 + Duration::from_millis(30)));
        assert_eq!(engine.len(), 2);
        assert_eq!(engine.pending_search(), "rust");

        assert!(!engine.tick(t0 + Duration::from_millis(100)));
        let due = engine.next_deadline().expect("deadline");
        assert!(engine.tick(due));
        assert_eq!(engine.search(), "rust");
        assert_eq!(engine.len(), 1);
        assert!(!engine.tick(due + Duration::from_secs(5)));
    }

    #[test]
    fn column_filters_accumulate_through_debounce() {
        let mut engine = QueryEngine::new(items(), DEFAULT_DEBOUNCE);
        let t0 = Instant::now();
        assert!(engine.set_column_filter(Column::Position, "engineer", t0));
        assert_eq!(engine.len(), 2);
        engine.set_column_filter(Column::Company, "glob", t0);
        assert!(engine.flush());
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.column_filters().len(), 2);

        engine.set_column_filter(Column::Company, "", t0);
        engine.flush();
        assert_eq!(engine.len(), 2);
    }

    #[test]
    fn stats_ignore_filters() {
        let mut engine = QueryEngine::new(items(), DEFAULT_DEBOUNCE);
        let before = engine.stats().clone();
        engine.set_quick_filter(QuickFilter {
            stage: StageFilter::Only(Stage::Offer),
            ..QuickFilter::default()
        });
        engine.set_search("designer", Instant::now());
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.stats(), &before);
        assert_eq!(engine.stats().total, 3);
    }

    #[test]
    fn filtered_view_is_subset_and_sorted() {
        let mut engine = QueryEngine::new(items(), DEFAULT_DEBOUNCE);
        engine.set_sort(Some(SortSpec::desc(Column::Company)));
        let ids: Vec<&str> = engine.filtered().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
        assert_eq!(engine.position_of("1"), Some(2));
        assert_eq!(engine.get(0).map(|a| a.id.as_str()), Some("3"));
        for app in engine.filtered() {
            assert!(engine.items().contains(app));
        }
    }

    #[test]
    fn replacing_items_recomputes_stats() {
        let mut engine = QueryEngine::new(items(), DEFAULT_DEBOUNCE);
        assert_eq!(engine.stats().count(Stage::Offer), 1);
        engine.set_items(Vec::new());
        assert_eq!(engine.stats().total, 0);
        assert_eq!(engine.stats().success_rate, 0.0);
        assert!(engine.is_empty());
    }
}
